//! Error taxonomy (§7). Every fallible subsystem reports one of the kind
//! groups below; each carries its own payload struct with a hand-written
//! `Display`, matching the per-variant error-struct style the rest of this
//! crate uses rather than a single stringly-typed error.
//!
//! Propagation is via `Result`/`?` throughout; only the CLI driver's `main`
//! converts a top-level `Err` into a printed diagnostic and a non-zero exit
//! status (§7's "abort via a single fatal path", realized without an
//! in-library process abort).

use std::fmt;

use crate::span::Span;

#[derive(Debug, Clone)]
pub struct UndefinedName {
    pub name: String,
}
impl fmt::Display for UndefinedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "undefined name `{}`", self.name)
    }
}

#[derive(Debug, Clone)]
pub struct DuplicateBinding {
    pub name: String,
}
impl fmt::Display for DuplicateBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}` is already bound in this scope", self.name)
    }
}

#[derive(Debug, Clone)]
pub struct AmbiguousImport {
    pub name: String,
    pub candidates: Vec<String>,
}
impl fmt::Display for AmbiguousImport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "`{}` is ambiguous among imports: {}",
            self.name,
            self.candidates.join(", ")
        )
    }
}

#[derive(Debug, Clone)]
pub enum NameError {
    Undefined(UndefinedName),
    Duplicate(DuplicateBinding),
    Ambiguous(AmbiguousImport),
    ModuleNotFound { dotted_name: String, searched: Vec<String> },
    Cycle { dotted_name: String },
}
impl fmt::Display for NameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameError::Undefined(e) => write!(f, "{}", e),
            NameError::Duplicate(e) => write!(f, "{}", e),
            NameError::Ambiguous(e) => write!(f, "{}", e),
            NameError::ModuleNotFound { dotted_name, searched } => write!(
                f,
                "could not find module `{}` (searched: {})",
                dotted_name,
                searched.join(", ")
            ),
            NameError::Cycle { dotted_name } => {
                write!(f, "import cycle detected while loading `{}`", dotted_name)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub enum TypeError {
    ExpectingType { found: String },
    ExpectingRecord { found: String },
    ExpectingTuple { found: String },
    ExpectingPointer { found: String },
    ArgumentMismatch { expected: String, found: String },
    ReturnTypeDivergence { first: String, second: String },
}
impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeError::ExpectingType { found } => write!(f, "expecting a type, found {}", found),
            TypeError::ExpectingRecord { found } => write!(f, "expecting a record, found {}", found),
            TypeError::ExpectingTuple { found } => write!(f, "expecting a tuple, found {}", found),
            TypeError::ExpectingPointer { found } => write!(f, "expecting a pointer, found {}", found),
            TypeError::ArgumentMismatch { expected, found } => {
                write!(f, "expected argument of type {}, found {}", expected, found)
            }
            TypeError::ReturnTypeDivergence { first, second } => write!(
                f,
                "branches disagree on return type: {} vs {}",
                first, second
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub enum OverloadError {
    NoMatchingOperation { callable: String, args: String },
    AddressOfTemporary,
    ReturnTemporaryByRef,
    AmbiguousRecursion { callable: String },
}
impl fmt::Display for OverloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverloadError::NoMatchingOperation { callable, args } => {
                write!(f, "no matching operation for {}({})", callable, args)
            }
            OverloadError::AddressOfTemporary => {
                write!(f, "cannot take address of a temporary")
            }
            OverloadError::ReturnTemporaryByRef => {
                write!(f, "cannot return a temporary by reference")
            }
            OverloadError::AmbiguousRecursion { callable } => {
                write!(f, "cannot determine return types for {} (unstable recursive instantiation)", callable)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub enum StaticEvalError {
    OutOfRangeLiteral { literal: String, width: String },
    OutOfRangeIndex { index: i128, len: usize },
    WrongArity { procedure: String, expected: usize, found: usize },
    UnresolvedCell { name: String },
    IndexingNonConstructor { found: String },
}
impl fmt::Display for StaticEvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaticEvalError::OutOfRangeLiteral { literal, width } => {
                write!(f, "literal {} out of range for {}", literal, width)
            }
            StaticEvalError::OutOfRangeIndex { index, len } => {
                write!(f, "static index {} out of range (length {})", index, len)
            }
            StaticEvalError::WrongArity { procedure, expected, found } => write!(
                f,
                "`{}` expects {} static argument(s), found {}",
                procedure, expected, found
            ),
            StaticEvalError::UnresolvedCell { name } => {
                write!(f, "pattern cell `{}` was never bound", name)
            }
            StaticEvalError::IndexingNonConstructor { found } => {
                write!(f, "cannot index {}: not a type constructor or alias", found)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub enum LinkageError {
    DuplicateCallingConvention { name: String },
    DllimportAfterDllexport { name: String },
    InvalidAttribute { attribute: String },
}
impl fmt::Display for LinkageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkageError::DuplicateCallingConvention { name } => {
                write!(f, "`{}` declares more than one calling convention", name)
            }
            LinkageError::DllimportAfterDllexport { name } => {
                write!(f, "`{}` cannot be both dllimport and dllexport", name)
            }
            LinkageError::InvalidAttribute { attribute } => {
                write!(f, "invalid external attribute `{}`", attribute)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct InternalError {
    pub message: String,
}
impl fmt::Display for InternalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "internal compiler error: {}", self.message)
    }
}

#[derive(Debug, Clone)]
pub enum ClayErrorKind {
    Name(NameError),
    Type(TypeError),
    Overload(OverloadError),
    StaticEval(StaticEvalError),
    Linkage(LinkageError),
    Internal(InternalError),
}

/// Top-level error: a kind plus the location stack accumulated by every
/// `LocationContext`/invoke frame active when it was raised (§7).
#[derive(Debug, Clone)]
pub struct ClayError {
    pub kind: ClayErrorKind,
    pub location_stack: Vec<Span>,
}

impl ClayError {
    pub fn new(kind: ClayErrorKind) -> Self {
        ClayError {
            kind,
            location_stack: Vec::new(),
        }
    }

    pub fn with_location(mut self, span: Span) -> Self {
        self.location_stack.push(span);
        self
    }

    #[allow(non_snake_case)]
    pub fn Type(e: TypeError) -> Self {
        ClayError::new(ClayErrorKind::Type(e))
    }
    #[allow(non_snake_case)]
    pub fn Name(e: NameError) -> Self {
        ClayError::new(ClayErrorKind::Name(e))
    }
    #[allow(non_snake_case)]
    pub fn Overload(e: OverloadError) -> Self {
        ClayError::new(ClayErrorKind::Overload(e))
    }
    #[allow(non_snake_case)]
    pub fn StaticEval(e: StaticEvalError) -> Self {
        ClayError::new(ClayErrorKind::StaticEval(e))
    }
    #[allow(non_snake_case)]
    pub fn Linkage(e: LinkageError) -> Self {
        ClayError::new(ClayErrorKind::Linkage(e))
    }
    #[allow(non_snake_case)]
    pub fn Internal(message: impl Into<String>) -> Self {
        ClayError::new(ClayErrorKind::Internal(InternalError {
            message: message.into(),
        }))
    }
}

impl fmt::Display for ClayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ClayErrorKind::Name(e) => write!(f, "{}", e)?,
            ClayErrorKind::Type(e) => write!(f, "{}", e)?,
            ClayErrorKind::Overload(e) => write!(f, "{}", e)?,
            ClayErrorKind::StaticEval(e) => write!(f, "{}", e)?,
            ClayErrorKind::Linkage(e) => write!(f, "{}", e)?,
            ClayErrorKind::Internal(e) => write!(f, "{}", e)?,
        }
        for frame in self.location_stack.iter().rev() {
            write!(f, "\n  at {}", frame)?;
        }
        Ok(())
    }
}

impl std::error::Error for ClayError {}
