//! Environments: linked maps `name -> object` (§3), plus the module loader
//! (§4.7). Modeled on the teacher's `Frame`/`Scope` split — a chain of
//! `Rc<RefCell<Frame>>` stack frames terminating at a module — generalized
//! from a single variable/type/constant namespace to the full set of object
//! kinds an Environment binds in Clay.

pub mod loader;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::item::{RecordDecl, VariantDecl};
use crate::error::{ClayError, NameError};
use crate::span::Ident;
use crate::types::{StaticObject, Type, ValueHolder};
use crate::value::PValue;

/// A unification variable (§4.2). Cells are shared (`Rc`) because the same
/// cell is both installed in the candidate's environment and referenced from
/// the invoke-entry once bound.
#[derive(Debug)]
pub struct Cell {
    pub name: Ident,
    pub bound: RefCell<Option<StaticObject>>,
}

impl Cell {
    pub fn new(name: Ident) -> Rc<Cell> {
        Rc::new(Cell {
            name,
            bound: RefCell::new(None),
        })
    }

    pub fn get(&self) -> Option<StaticObject> {
        self.bound.borrow().clone()
    }
}

/// Everything an environment name can be bound to (§3's Environments
/// paragraph). This is the Rust stand-in for the source's untagged "any
/// object" environment entries.
#[derive(Clone)]
pub enum EnvValue {
    Expr(crate::ast::Expr),
    ExprList(Vec<crate::ast::Expr>),
    Type(Type),
    Procedure(Rc<str>),
    Overloadable(Rc<str>),
    Record(Rc<RecordDecl>),
    Variant(Rc<VariantDecl>),
    Module(Rc<str>),
    Identifier(Ident),
    ValueHolder(ValueHolder),
    PatternCell(Rc<Cell>),
    PValue(PValue),
}

impl std::fmt::Debug for EnvValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnvValue::Expr(_) => write!(f, "Expr(..)"),
            EnvValue::ExprList(_) => write!(f, "ExprList(..)"),
            EnvValue::Type(t) => write!(f, "{:?}", t),
            EnvValue::Procedure(n) => write!(f, "Procedure({})", n),
            EnvValue::Overloadable(n) => write!(f, "Overloadable({})", n),
            EnvValue::Record(r) => write!(f, "Record({})", r.name),
            EnvValue::Variant(v) => write!(f, "Variant({})", v.name),
            EnvValue::Module(n) => write!(f, "Module({})", n),
            EnvValue::Identifier(i) => write!(f, "#{}", i.name),
            EnvValue::ValueHolder(v) => write!(f, "{:?}", v),
            EnvValue::PatternCell(c) => write!(f, "Cell({})", c.name.name),
            EnvValue::PValue(p) => write!(f, "{:?}", p),
        }
    }
}

impl EnvValue {
    pub fn as_static_object(&self) -> Option<StaticObject> {
        match self {
            EnvValue::Type(t) => Some(StaticObject::Type(t.clone())),
            EnvValue::Record(r) => Some(StaticObject::Record(r.clone())),
            EnvValue::Variant(v) => Some(StaticObject::Variant(v.clone())),
            EnvValue::Procedure(n) => Some(StaticObject::Procedure(n.clone())),
            EnvValue::Overloadable(n) => Some(StaticObject::Overloadable(n.clone())),
            EnvValue::Module(n) => Some(StaticObject::Module(n.clone())),
            EnvValue::Identifier(i) => Some(StaticObject::Identifier(i.clone())),
            EnvValue::ValueHolder(v) => Some(StaticObject::ValueHolder(v.clone())),
            EnvValue::PatternCell(c) => c.get(),
            _ => None,
        }
    }
}

type Frame = HashMap<Rc<str>, EnvValue>;

/// A chain of frames terminating at a module's `all-symbols` table (§3).
/// Cloning an `Environment` is cheap (`Rc` frames) and is how the resolver
/// forks a fresh environment per candidate without disturbing the caller's.
#[derive(Clone)]
pub struct Environment {
    frames: Vec<Rc<RefCell<Frame>>>,
    module_symbols: Rc<RefCell<Frame>>,
    module_name: Rc<str>,
}

impl Environment {
    pub fn for_module(module_name: Rc<str>, module_symbols: Rc<RefCell<Frame>>) -> Self {
        Environment {
            frames: Vec::new(),
            module_symbols,
            module_name,
        }
    }

    pub fn child(&self) -> Self {
        let mut frames = self.frames.clone();
        frames.push(Rc::new(RefCell::new(HashMap::new())));
        Environment {
            frames,
            module_symbols: self.module_symbols.clone(),
            module_name: self.module_name.clone(),
        }
    }

    pub fn bind(&self, name: Rc<str>, value: EnvValue) {
        let frame = self
            .frames
            .last()
            .unwrap_or(&self.module_symbols);
        frame.borrow_mut().insert(name, value);
    }

    pub fn lookup(&self, name: &str) -> Result<EnvValue, ClayError> {
        for frame in self.frames.iter().rev() {
            if let Some(v) = frame.borrow().get(name) {
                return Ok(v.clone());
            }
        }
        if let Some(v) = self.module_symbols.borrow().get(name) {
            return Ok(v.clone());
        }
        Err(ClayError::Name(NameError::Undefined(
            crate::error::UndefinedName {
                name: name.to_string(),
            },
        )))
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }
}
