//! Goto labels, one table per function body.

use std::collections::HashMap;

use scopec_ast::Ident;
use scopec_lexer::Span;

use crate::error::{ResolveError, ResolveErrorKind};

#[derive(Debug, Default)]
pub struct LabelTable {
    defined: HashMap<String, Span>,
    /// Gotos seen so far, checked once the body is closed
    pending: Vec<Ident>,
}

impl LabelTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, label: &Ident) -> Result<(), ResolveError> {
        if let Some(prior) = self.defined.get(&label.name) {
            return Err(ResolveError::new(
                ResolveErrorKind::DuplicateLabel { name: label.name.clone() },
                label.span,
            )
            .with_prior(*prior));
        }
        self.defined.insert(label.name.clone(), label.span);
        Ok(())
    }

    pub fn goto(&mut self, label: &Ident) {
        self.pending.push(label.clone());
    }

    /// Report the first goto (in source order) whose label was never defined.
    pub fn finish(self) -> Result<(), ResolveError> {
        match self.pending.iter().find(|l| !self.defined.contains_key(&l.name)) {
            Some(label) => Err(ResolveError::new(
                ResolveErrorKind::UndefinedLabel { name: label.name.clone() },
                label.span,
            )),
            None => Ok(()),
        }
    }
}
