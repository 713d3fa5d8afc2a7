//! Driver (§6, §9): the `Context` struct that owns one compilation's
//! process-global state (type registry, invoke-entry tables, module loader)
//! and the two entry points, `codegen_exe`/`codegen_shared_lib`, that turn a
//! resolved `main` (or a library's public surface) into a fully defined LLVM
//! module. The external CLI (`src/bin/clayc.rs`) is the only caller.

use std::rc::Rc;

use inkwell::context::Context as LlvmContext;
use inkwell::module::Module as LlvmModule;

use crate::ast::item::Module;
use crate::cache::AnalysisCache;
use crate::codegen::{self, CodegenContext};
use crate::env::loader::{LoadedModule, ModuleLoader};
use crate::error::{ClayError, NameError};
use crate::resolver::GlobalInvokeTables;
use crate::types::TypeRegistry;

/// One compilation's process-global state (§5's "Implementation note"):
/// threaded by reference through the analyzer, resolver and codegen instead
/// of living behind `static`/`lazy_static`.
pub struct Context {
    pub registry: TypeRegistry,
    pub tables: GlobalInvokeTables,
    pub loader: ModuleLoader,
}

impl Context {
    pub fn new(modules: Vec<Module>, target_os: impl Into<String>, target_bits: u8) -> Result<Self, ClayError> {
        let registry = TypeRegistry::new();
        let loader = ModuleLoader::new(modules, target_os, target_bits);
        loader.install_primitives(&registry)?;
        Ok(Context {
            registry,
            tables: GlobalInvokeTables::new(),
            loader,
        })
    }

    /// Loads `entry_dotted_name` and everything it transitively imports
    /// (§4.7), then registers every loaded module's overload candidates
    /// (§4.5). `prelude` is loaded first if present; its absence is not an
    /// error, since a bare core invocation may supply a program with no
    /// operator syntax and thus no dependency on it.
    pub fn load_program(&self, entry_dotted_name: &str) -> Result<Rc<LoadedModule>, ClayError> {
        match self.loader.load("prelude") {
            Ok(_) => {}
            Err(ClayError { kind: crate::error::ClayErrorKind::Name(NameError::ModuleNotFound { .. }), .. }) => {}
            Err(e) => return Err(e),
        }

        let entry = self.loader.load(entry_dotted_name)?;
        self.tables
            .initialize_overloads(&self.loader.loaded_modules(), &self.registry);
        Ok(entry)
    }

    /// Resolves `callable` with zero arguments against `entry`'s
    /// environment, then declares and defines every invoke-entry the
    /// resolver reaches transitively (§4.6): resolution itself walks the
    /// whole call graph via `analyzer::analyze_call`'s nested
    /// `get_or_resolve` calls, so by the time the root entry is resolved
    /// every callee already has an `InvokeEntry` in `self.tables`. Codegen
    /// is then a flat two-pass loop — declare every entry first so that
    /// `codegen_call` always finds an already-declared target, then define
    /// each body — rather than a recursive per-call walk.
    fn codegen_reachable<'ctx>(
        &self,
        llvm: &'ctx LlvmContext,
        entry: &Rc<LoadedModule>,
        module_name: &str,
        callable: &str,
    ) -> Result<(CodegenContext<'ctx, '_>, Rc<crate::resolver::InvokeEntry>), ClayError> {
        let env = entry.environment();
        let cache = AnalysisCache::new();
        let root = self
            .tables
            .get_or_resolve(&self.registry, &cache, callable, &[], &[], &[], &env)?;

        let ctx = CodegenContext::new(llvm, module_name, &self.registry, &self.tables);

        for e in self.tables.all_entries() {
            codegen::declare_invoke_entry(&ctx, &e);
        }
        for e in self.tables.all_entries() {
            codegen::codegen_invoke_entry(&ctx, &cache, &e)?;
        }

        Ok((ctx, root))
    }

    /// `codegenExe(module)` (§6): resolves the user's `main`, codegens the
    /// reachable call graph, and synthesizes the process entry point that
    /// calls `prelude_initializeCommandLine` then `prelude_callMain` on the
    /// resolved `main` invoke-entry, matching the "Output" contract's
    /// `main(Int argc, RawPointer argv) -> Int` shape. Falls back to calling
    /// the resolved `main` directly when the prelude helpers are absent
    /// (a bare core invocation without the prelude module loaded).
    pub fn codegen_exe<'ctx>(
        &self,
        llvm: &'ctx LlvmContext,
        entry: &Rc<LoadedModule>,
        module_name: &str,
    ) -> Result<LlvmModule<'ctx>, ClayError> {
        let (ctx, main_entry) = self.codegen_reachable(llvm, entry, module_name, "main")?;

        let i32_ty = ctx.llvm.i32_type();
        let ptr_ty = ctx.llvm.ptr_type(inkwell::AddressSpace::default());
        let fn_type = i32_ty.fn_type(&[i32_ty.into(), ptr_ty.into()], false);
        let process_main = ctx.module.add_function("main", fn_type, None);
        let entry_bb = ctx.llvm.append_basic_block(process_main, "entry");
        ctx.builder.position_at_end(entry_bb);

        let argc = process_main.get_nth_param(0).unwrap();
        let argv = process_main.get_nth_param(1).unwrap();
        if let Some(init) = ctx.module.get_function("prelude_initializeCommandLine") {
            ctx.builder.build_call(init, &[argc.into(), argv.into()], "init_cmdline").unwrap();
        }

        let main_name = main_entry
            .llvm_func_name
            .borrow()
            .clone()
            .ok_or_else(|| ClayError::Internal("main was resolved but never declared"))?;
        let main_fn = ctx
            .module
            .get_function(&main_name)
            .ok_or_else(|| ClayError::Internal("main's declared function is missing from the module"))?;

        let status = if let Some(call_main) = ctx.module.get_function("prelude_callMain") {
            ctx.builder
                .build_call(call_main, &[main_fn.as_global_value().as_pointer_value().into()], "call_main")
                .unwrap()
                .try_as_basic_value()
                .left()
        } else {
            ctx.builder.build_call(main_fn, &[], "call_main").unwrap().try_as_basic_value().left()
        };

        let ret = match status {
            Some(v) if v.is_int_value() => v.into_int_value(),
            _ => i32_ty.const_int(0, false),
        };
        ctx.builder.build_return(Some(&ret)).unwrap();

        Ok(ctx.module)
    }

    /// `codegenSharedLib(module)` (§6): unlike an executable, a library has
    /// no single root call that drives resolution — the caller is
    /// responsible for having already resolved each exported symbol's
    /// concrete instantiation (via `self.tables.get_or_resolve`) for every
    /// public name in `entry` it wants emitted. This entry point then just
    /// declares and defines whatever invoke-entries are in the tables, with
    /// no synthesized process entry point.
    pub fn codegen_shared_lib<'ctx>(
        &self,
        llvm: &'ctx LlvmContext,
        _entry: &Rc<LoadedModule>,
        module_name: &str,
    ) -> Result<LlvmModule<'ctx>, ClayError> {
        let cache = AnalysisCache::new();
        let ctx = CodegenContext::new(llvm, module_name, &self.registry, &self.tables);

        for e in self.tables.all_entries() {
            codegen::declare_invoke_entry(&ctx, &e);
        }
        for e in self.tables.all_entries() {
            codegen::codegen_invoke_entry(&ctx, &cache, &e)?;
        }

        Ok(ctx.module)
    }
}
