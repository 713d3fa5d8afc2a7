//! Source locations threaded through the AST and carried by every diagnostic.
//!
//! Spans intentionally compare equal regardless of position: AST nodes derive
//! `PartialEq` for structural comparisons (e.g. in the evaluator's constant
//! folding and in tests) and a span difference must never make two otherwise
//! identical nodes compare unequal.

use std::rc::Rc;

#[derive(Debug, Default, Clone, Eq, serde::Serialize, serde::Deserialize)]
pub struct Span {
    pub start: (usize, usize),
    pub end: (usize, usize),
    pub source_name: Rc<str>,
}

impl Span {
    pub fn dummy() -> Self {
        Span {
            start: (0, 0),
            end: (0, 0),
            source_name: Rc::from("<generated>"),
        }
    }

    pub fn merge(&self, other: &Span) -> Span {
        Span {
            start: self.start,
            end: other.end,
            source_name: self.source_name.clone(),
        }
    }
}

impl PartialEq for Span {
    fn eq(&self, _other: &Span) -> bool {
        true
    }
}

impl std::hash::Hash for Span {
    fn hash<H: std::hash::Hasher>(&self, _state: &mut H) {
        // spans never participate in hashing, matching their always-equal `PartialEq`
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.source_name,
            self.start.0 + 1,
            self.start.1 + 1
        )
    }
}

/// An interned identifier: cheap to clone and compare, carrying its declaration span.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Ident {
    pub name: Rc<str>,
    pub position: Span,
}

impl Ident {
    pub fn new(name: impl Into<Rc<str>>, position: Span) -> Self {
        Ident {
            name: name.into(),
            position,
        }
    }
}

impl PartialEq for Ident {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}
impl Eq for Ident {}

impl std::hash::Hash for Ident {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl std::fmt::Display for Ident {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}
