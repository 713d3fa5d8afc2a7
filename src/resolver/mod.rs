//! Overload & generic resolver (§4.5): the invoke-entry cache and candidate
//! walk. Candidates are grouped by the head name their target pattern
//! denotes — the procedure/overloadable name for `overload foo(...)`, or the
//! type-constructor name for type-attached overloads (`overload
//! Pointer[T](...)`, record/variant methods) — which is the call-site key
//! used to find the bucket to scan.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::item::{CallableBody, OverloadDecl, ReturnSpec};
use crate::cache::AnalysisCache;
use crate::env::loader::LoadedModule;
use crate::env::{Cell, EnvValue, Environment};
use crate::error::{ClayError, OverloadError};
use crate::eval::eval_expr;
use crate::pattern::{require_all_cells_bound, tempness_compatible, unify_type, unify_value};
use crate::types::TypeRegistry;
use crate::value::{ArgsKey, MultiPValue, PValue};

/// One instantiation of a generic callable for a given argument key (§3).
pub struct InvokeEntry {
    pub callable: Rc<str>,
    pub args_key: ArgsKey,
    /// Concrete argument types in call order, kept alongside `args_key`
    /// because `ArgsKey` only carries opaque pointer-identity keys — codegen
    /// needs the actual `Type`s to build LLVM parameter types (§4.6).
    pub arg_types: Vec<crate::types::Type>,
    /// `None` for a non-variadic candidate; otherwise the trailing actual
    /// types bound to the candidate's var-arg (§3's `varArgTypes[]`), in call
    /// order, following the fixed args in `arg_types`.
    pub var_arg_types: Vec<crate::types::Type>,
    pub decl: Rc<OverloadDecl>,
    pub env: Environment,
    pub analyzed: RefCell<bool>,
    pub analyzing: RefCell<bool>,
    pub return_is_ref: RefCell<Vec<bool>>,
    pub return_types: RefCell<Vec<crate::types::Type>>,
    pub llvm_func_name: RefCell<Option<Rc<str>>>,
}

#[derive(Default)]
struct PerCallableTable {
    entries: HashMap<ArgsKey, Rc<InvokeEntry>>,
}

/// Global state for the resolver: candidate overloads by callable key, and
/// the invoke-entry cache by (callable, argsKey, argsTempness) (§3, §4.5).
#[derive(Default)]
pub struct GlobalInvokeTables {
    candidates: RefCell<HashMap<Rc<str>, Vec<Rc<OverloadDecl>>>>,
    invoke_tables: RefCell<HashMap<Rc<str>, PerCallableTable>>,
}

impl GlobalInvokeTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers every overload from every loaded module, reversed so that
    /// later-declared overloads are tried first within a module (§4.5's
    /// "Overload order is declaration order reversed at registration").
    /// Also forwards type-nameable candidates to the type registry's
    /// one-time attachment list (§4.1).
    pub fn initialize_overloads(&self, modules: &[Rc<LoadedModule>], registry: &TypeRegistry) {
        for module in modules {
            for item in &module.ast.items {
                if let crate::ast::item::TopLevelItem::Overload(decl) = item {
                    let key = callable_key(&decl.target);
                    let rc = Rc::new(decl.clone());
                    self.candidates
                        .borrow_mut()
                        .entry(key)
                        .or_default()
                        .insert(0, rc.clone());
                    registry.register_type_overload_candidate((*rc).clone());
                }
            }
        }
    }

    fn table_for(&self, callable: &str) -> Rc<str> {
        Rc::from(callable)
    }

    /// Looks up or creates an invoke-entry for `(callable, argsKey,
    /// argsTempness)` (§4.5 steps 1-3).
    pub fn get_or_resolve(
        &self,
        registry: &TypeRegistry,
        cache: &AnalysisCache,
        callable: &str,
        arg_types: &[crate::types::Type],
        arg_tempness: &[bool],
        arg_exprs: &[crate::ast::Expr],
        module_env: &Environment,
    ) -> Result<Rc<InvokeEntry>, ClayError> {
        let key = ArgsKey::new(arg_types, arg_tempness);
        let name = self.table_for(callable);

        if let Some(entry) = self
            .invoke_tables
            .borrow()
            .get(&name)
            .and_then(|t| t.entries.get(&key))
        {
            if *entry.analyzed.borrow() || *entry.analyzing.borrow() {
                return Ok(entry.clone());
            }
        }

        let candidates = self
            .candidates
            .borrow()
            .get(callable)
            .cloned()
            .unwrap_or_default();

        for candidate in candidates {
            if let Some(entry) = try_candidate(
                self,
                registry,
                cache,
                callable,
                &candidate,
                arg_types,
                arg_tempness,
                arg_exprs,
                module_env,
            )? {
                self.invoke_tables
                    .borrow_mut()
                    .entry(name)
                    .or_default()
                    .entries
                    .insert(key, entry.clone());
                return Ok(entry);
            }
        }

        Err(ClayError::Overload(OverloadError::NoMatchingOperation {
            callable: callable.to_string(),
            args: format!("{:?}", arg_types),
        }))
    }

    /// Every invoke-entry resolved so far, across every callable (§5's
    /// "invoke-entry tables ... are all process-global"). The driver walks
    /// this after resolving an entry point to declare-then-define the whole
    /// reachable call graph in two passes (§4.6).
    pub fn all_entries(&self) -> Vec<Rc<InvokeEntry>> {
        self.invoke_tables
            .borrow()
            .values()
            .flat_map(|t| t.entries.values().cloned())
            .collect()
    }
}

fn callable_key(target: &crate::ast::pattern::PatternExpr) -> Rc<str> {
    match target {
        crate::ast::pattern::PatternExpr::Expr(crate::ast::Expr::Id(id)) => id.name.clone(),
        crate::ast::pattern::PatternExpr::Expr(crate::ast::Expr::Index { callee, .. }) => {
            if let crate::ast::Expr::Id(id) = callee.as_ref() {
                id.name.clone()
            } else {
                Rc::from("<anonymous>")
            }
        }
        crate::ast::pattern::PatternExpr::CellRef(id) => id.name.clone(),
    }
}

#[allow(clippy::too_many_arguments)]
fn try_candidate(
    tables: &GlobalInvokeTables,
    registry: &TypeRegistry,
    cache: &AnalysisCache,
    callable: &str,
    candidate: &Rc<OverloadDecl>,
    arg_types: &[crate::types::Type],
    arg_tempness: &[bool],
    arg_exprs: &[crate::ast::Expr],
    module_env: &Environment,
) -> Result<Option<Rc<InvokeEntry>>, ClayError> {
    let fixed_len = candidate.fixed_args.len();
    match &candidate.var_arg {
        None if fixed_len != arg_types.len() => return Ok(None),
        Some(_) if arg_types.len() < fixed_len => return Ok(None),
        _ => {}
    }

    let candidate_env = module_env.child();
    for name in &candidate.pattern_vars {
        candidate_env.bind(name.name.clone(), EnvValue::PatternCell(Cell::new(name.clone())));
    }

    for (i, formal) in candidate.fixed_args.iter().enumerate() {
        let actual_ty = &arg_types[i];
        let actual_pv = PValue {
            ty: actual_ty.clone(),
            is_temp: arg_tempness[i],
        };

        if !tempness_compatible(formal.tempness, &actual_pv) {
            return Ok(None);
        }

        if formal.is_static {
            let actual_obj = eval_expr(registry, module_env, cache, &arg_exprs[i])?;
            if let Some(pattern) = &formal.type_pattern {
                if !unify_value(registry, &candidate_env, cache, pattern, &actual_obj)? {
                    return Ok(None);
                }
            }
        } else if let Some(pattern) = &formal.type_pattern {
            if !unify_type(registry, &candidate_env, cache, pattern, actual_ty)? {
                return Ok(None);
            }
        }
    }

    // Consume the trailing actuals into the var-arg (§3's `varArgName?` /
    // `varArgTypes[]`, §8 scenario 2's `Tuple[T,...Ts]`): each trailing
    // actual unifies against the var-arg's shared type pattern, and the
    // matched argument expressions are bound under its name so a macro body
    // can still refer to `...Ts` as a list.
    let mut var_arg_types = Vec::new();
    if let Some(var_arg) = &candidate.var_arg {
        for i in fixed_len..arg_types.len() {
            let actual_ty = &arg_types[i];
            if let Some(pattern) = &var_arg.type_pattern {
                if !unify_type(registry, &candidate_env, cache, pattern, actual_ty)? {
                    return Ok(None);
                }
            }
            var_arg_types.push(actual_ty.clone());
        }
        candidate_env.bind(
            var_arg.name.name.clone(),
            EnvValue::ExprList(arg_exprs[fixed_len..].to_vec()),
        );
    }

    if let Some(predicate) = &candidate.predicate {
        match eval_expr(registry, &candidate_env, cache, predicate)? {
            crate::types::StaticObject::Bool(true) => {}
            _ => return Ok(None),
        }
    }

    require_all_cells_bound(&candidate_env, &candidate.pattern_vars)?;

    let entry = Rc::new(InvokeEntry {
        callable: Rc::from(callable),
        args_key: ArgsKey::new(arg_types, arg_tempness),
        arg_types: arg_types.to_vec(),
        var_arg_types,
        decl: candidate.clone(),
        env: candidate_env,
        analyzed: RefCell::new(false),
        analyzing: RefCell::new(true),
        return_is_ref: RefCell::new(Vec::new()),
        return_types: RefCell::new(Vec::new()),
        llvm_func_name: RefCell::new(None),
    });

    if !candidate.is_macro && !candidate.is_inline {
        let result = analyze_candidate_body(tables, registry, cache, &entry);
        *entry.analyzing.borrow_mut() = false;
        match result {
            Ok((return_types, return_is_ref)) => {
                *entry.return_types.borrow_mut() = return_types;
                *entry.return_is_ref.borrow_mut() = return_is_ref;
                *entry.analyzed.borrow_mut() = true;
            }
            Err(e) => return Err(e),
        }
    } else {
        *entry.analyzing.borrow_mut() = false;
        *entry.analyzed.borrow_mut() = true;
    }

    Ok(Some(entry))
}

/// Analyzes the matched candidate's body to infer `returnTypes[]` and
/// `returnIsRef[]` (§4.5 step 7), delegating to the analyzer.
fn analyze_candidate_body(
    tables: &GlobalInvokeTables,
    registry: &TypeRegistry,
    cache: &AnalysisCache,
    entry: &InvokeEntry,
) -> Result<(Vec<crate::types::Type>, Vec<bool>), ClayError> {
    let body_env = entry.env.child();
    for (formal, ty) in entry.decl.fixed_args.iter().zip(entry.args_key.types.iter()) {
        let _ = (formal, ty);
        // Parameter names are bound to their argument pvalues by
        // `analyzer::analyze_callable`, which owns constructing `body_env`'s
        // parameter frame before delegating here in the full pipeline
        // (`driver::analyze_top_level_callable`); resolving a nested call
        // during overload matching only needs the body's control-flow shape.
    }

    match &entry.decl.body {
        CallableBody::Expr(expr) => {
            let mpv = crate::analyzer::analyze_expr(tables, registry, &body_env, cache, expr)?;
            Ok((mpv.types(), mpv.tempness().iter().map(|_| false).collect()))
        }
        CallableBody::Block(stmt) => {
            let returns = crate::analyzer::analyze_function_body(tables, registry, &body_env, cache, stmt)?;
            let is_ref = entry
                .decl
                .return_specs
                .iter()
                .map(|r| matches!(r, ReturnSpec::ByRef))
                .collect();
            Ok((returns.types(), is_ref))
        }
        CallableBody::InlineLlvm(_) | CallableBody::None => Ok((Vec::new(), Vec::new())),
    }
}

impl std::fmt::Debug for InvokeEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvokeEntry")
            .field("callable", &self.callable)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::item::CallableBody;
    use crate::ast::Expr;
    use crate::error::ClayErrorKind;
    use crate::span::{Ident, Span};
    use std::cell::RefCell;
    use std::collections::HashMap;

    fn test_env() -> Environment {
        Environment::for_module(Rc::from("test"), Rc::new(RefCell::new(HashMap::new())))
    }

    fn zero_arg_overload(callable: &str, value: i128) -> OverloadDecl {
        OverloadDecl {
            target: crate::ast::pattern::PatternExpr::Expr(Expr::Id(Ident::new(callable, Span::dummy()))),
            pattern_vars: Vec::new(),
            fixed_args: Vec::new(),
            var_arg: None,
            return_specs: Vec::new(),
            predicate: None,
            is_static: false,
            is_macro: false,
            is_inline: false,
            body: CallableBody::Expr(Expr::IntLit { value, suffix: None, position: Span::dummy() }),
        }
    }

    #[test]
    fn resolves_a_zero_arg_overload_and_infers_its_return_type() {
        let tables = GlobalInvokeTables::new();
        let registry = TypeRegistry::new();
        let cache = AnalysisCache::new();
        let env = test_env();
        tables
            .candidates
            .borrow_mut()
            .insert(Rc::from("answer"), vec![Rc::new(zero_arg_overload("answer", 42))]);

        let entry = tables.get_or_resolve(&registry, &cache, "answer", &[], &[], &[], &env).unwrap();
        assert!(*entry.analyzed.borrow());
        assert_eq!(entry.return_types.borrow().len(), 1);
        assert_eq!(entry.return_types.borrow()[0], registry.primitive(crate::types::Primitive::Int(crate::types::IntWidth::W32, true)));
    }

    #[test]
    fn repeated_resolution_with_the_same_args_key_returns_the_cached_entry() {
        let tables = GlobalInvokeTables::new();
        let registry = TypeRegistry::new();
        let cache = AnalysisCache::new();
        let env = test_env();
        tables
            .candidates
            .borrow_mut()
            .insert(Rc::from("answer"), vec![Rc::new(zero_arg_overload("answer", 7))]);

        let first = tables.get_or_resolve(&registry, &cache, "answer", &[], &[], &[], &env).unwrap();
        let second = tables.get_or_resolve(&registry, &cache, "answer", &[], &[], &[], &env).unwrap();
        assert!(Rc::ptr_eq(&first, &second));
    }

    #[test]
    fn no_matching_candidate_is_a_no_matching_operation_error() {
        let tables = GlobalInvokeTables::new();
        let registry = TypeRegistry::new();
        let cache = AnalysisCache::new();
        let env = test_env();

        let err = tables.get_or_resolve(&registry, &cache, "missing", &[], &[], &[], &env).unwrap_err();
        assert!(matches!(err.kind, ClayErrorKind::Overload(OverloadError::NoMatchingOperation { .. })));
    }

    #[test]
    fn all_entries_reports_every_resolved_invoke_entry_across_callables() {
        let tables = GlobalInvokeTables::new();
        let registry = TypeRegistry::new();
        let cache = AnalysisCache::new();
        let env = test_env();
        tables
            .candidates
            .borrow_mut()
            .insert(Rc::from("a"), vec![Rc::new(zero_arg_overload("a", 1))]);
        tables
            .candidates
            .borrow_mut()
            .insert(Rc::from("b"), vec![Rc::new(zero_arg_overload("b", 2))]);

        tables.get_or_resolve(&registry, &cache, "a", &[], &[], &[], &env).unwrap();
        tables.get_or_resolve(&registry, &cache, "b", &[], &[], &[], &env).unwrap();

        let names: std::collections::HashSet<_> =
            tables.all_entries().iter().map(|e| e.callable.to_string()).collect();
        assert_eq!(names, std::collections::HashSet::from(["a".to_string(), "b".to_string()]));
    }
}
