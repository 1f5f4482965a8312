use scopec_lexer::Span;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveErrorKind {
    #[error("duplicate declaration of '{name}'")]
    DuplicateDeclaration { name: String },

    #[error("conflicting linkage for '{name}'")]
    ConflictingLinkage { name: String },

    #[error("multiple default labels in one switch")]
    DuplicateDefaultLabel,

    #[error("use of undeclared identifier '{name}'")]
    UnresolvedIdentifier { name: String },

    #[error("invalid lvalue: left side of assignment must be a variable")]
    InvalidLvalue,

    #[error("function '{name}' cannot be defined inside another function")]
    NestedFunctionDefinition { name: String },

    #[error("block-scope extern declaration of '{name}' cannot have an initializer")]
    ExternInitializer { name: String },

    #[error("function '{name}' declared 'static' inside a block")]
    StaticBlockFunction { name: String },

    #[error("duplicate label '{name}'")]
    DuplicateLabel { name: String },

    #[error("use of undefined label '{name}'")]
    UndefinedLabel { name: String },
}

/// Errors during scope resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveError {
    pub kind: ResolveErrorKind,
    pub span: Span,
    /// The earlier declaration or label this one clashes with
    pub prior: Option<Span>,
}

impl ResolveError {
    pub fn new(kind: ResolveErrorKind, span: Span) -> Self {
        Self { kind, span, prior: None }
    }

    pub fn with_prior(mut self, prior: Span) -> Self {
        self.prior = Some(prior);
        self
    }

    pub fn message(&self) -> String {
        self.kind.to_string()
    }

    /// Label text for the `prior` span when rendering a diagnostic.
    pub fn prior_note(&self) -> &'static str {
        match self.kind {
            ResolveErrorKind::DuplicateDefaultLabel => "first default label is here",
            ResolveErrorKind::DuplicateLabel { .. } => "label first defined here",
            _ => "previous declaration is here",
        }
    }
}

impl std::fmt::Display for ResolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {}..{}", self.kind, self.span.start, self.span.end)
    }
}

impl std::error::Error for ResolveError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_other_phases() {
        let err = ResolveError::new(
            ResolveErrorKind::DuplicateDeclaration { name: "b".to_string() },
            Span::new(10, 11),
        )
        .with_prior(Span::new(2, 3));
        assert_eq!(err.to_string(), "duplicate declaration of 'b' at 10..11");
        assert_eq!(err.prior, Some(Span::new(2, 3)));
        assert_eq!(err.prior_note(), "previous declaration is here");
    }
}
