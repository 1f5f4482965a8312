//! Rendering of compiler errors with ariadne

use ariadne::{Color, Config, Label, Report, ReportKind, Source};
use scopec_eval::EvalError;
use scopec_lexer::{LexError, Span};
use scopec_parser::ParseError;
use scopec_resolve::ResolveError;

/// An error from any phase, ready to render against its source
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub phase: &'static str,
    pub message: String,
    pub span: Span,
    pub note: Option<(Span, &'static str)>,
}

impl From<LexError> for Diagnostic {
    fn from(e: LexError) -> Self {
        Self { phase: "lex", message: e.message, span: e.span, note: None }
    }
}

impl From<ParseError> for Diagnostic {
    fn from(e: ParseError) -> Self {
        Self { phase: "syntax", message: e.message, span: e.span, note: None }
    }
}

impl From<ResolveError> for Diagnostic {
    fn from(e: ResolveError) -> Self {
        let note = e.prior.map(|prior| (prior, e.prior_note()));
        Self { phase: "resolve", message: e.message(), span: e.span, note }
    }
}

impl From<EvalError> for Diagnostic {
    fn from(e: EvalError) -> Self {
        Self { phase: "runtime", message: e.message, span: e.span, note: None }
    }
}

/// Render `diag` as an ariadne report. Rendering goes to a string so reports
/// from files checked in parallel never interleave.
pub fn render(path: &str, source: &str, diag: &Diagnostic, color: bool) -> String {
    let mut report = Report::build(ReportKind::Error, path, diag.span.start)
        .with_config(Config::default().with_color(color))
        .with_message(format!("{} error", diag.phase))
        .with_label(
            Label::new((path, diag.span.start..diag.span.end))
                .with_message(&diag.message)
                .with_color(Color::Red),
        );

    if let Some((prior, note)) = diag.note {
        report = report.with_label(
            Label::new((path, prior.start..prior.end))
                .with_message(note)
                .with_color(Color::Blue),
        );
    }

    let mut out = Vec::new();
    match report.finish().write((path, Source::from(source)), &mut out) {
        Ok(()) => String::from_utf8_lossy(&out).into_owned(),
        Err(_) => format!("error: {} at {}..{}\n", diag.message, diag.span.start, diag.span.end),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scopec_resolve::Resolver;

    #[test]
    fn test_resolve_error_keeps_prior_span() {
        let source = "int main(void) { int a; int a; return 0; }";
        let program = scopec_parser::Parser::parse(source).unwrap();
        let diag = Diagnostic::from(Resolver::resolve(program).unwrap_err());

        assert_eq!(diag.phase, "resolve");
        assert_eq!(diag.message, "duplicate declaration of 'a'");
        let (prior, note) = diag.note.unwrap();
        assert_eq!(&source[prior.start..prior.end], "a");
        assert!(prior.start < diag.span.start);
        assert_eq!(note, "previous declaration is here");
    }

    #[test]
    fn test_render_without_color() {
        let source = "int main(void) { return y; }";
        let diag = Diagnostic {
            phase: "resolve",
            message: "use of undeclared identifier 'y'".to_string(),
            span: Span::new(24, 25),
            note: None,
        };
        let text = render("test.c", source, &diag, false);
        assert!(text.contains("resolve error"));
        assert!(text.contains("use of undeclared identifier 'y'"));
        assert!(text.contains("test.c"));
        assert!(!text.contains('\u{1b}'));
    }
}
