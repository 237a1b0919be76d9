use crate::span::Span;

/// A compiler diagnostic (error or warning) tied to a source span.
#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub span: Span,
    pub notes: Vec<String>,
    pub help: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl Diagnostic {
    pub fn error(message: String, span: Span) -> Self {
        Self {
            severity: Severity::Error,
            message,
            span,
            notes: Vec::new(),
            help: None,
        }
    }

    pub fn warning(message: String, span: Span) -> Self {
        Self {
            severity: Severity::Warning,
            message,
            span,
            notes: Vec::new(),
            help: None,
        }
    }

    pub fn with_note(mut self, note: String) -> Self {
        self.notes.push(note);
        self
    }

    pub fn with_help(mut self, help: String) -> Self {
        self.help = Some(help);
        self
    }

    fn report<'a>(
        &'a self,
        filename: &'a str,
        colored: bool,
    ) -> ariadne::Report<'a, (&'a str, std::ops::Range<usize>)> {
        use ariadne::{Color, Config, Label, Report, ReportKind};

        let (kind, color) = match self.severity {
            Severity::Error => (ReportKind::Error, Color::Red),
            Severity::Warning => (ReportKind::Warning, Color::Yellow),
        };

        let mut label = Label::new((filename, self.span.start as usize..self.span.end as usize))
            .with_message(&self.message);
        if colored {
            label = label.with_color(color);
        }

        let mut report = Report::build(kind, filename, self.span.start as usize)
            .with_config(Config::default().with_color(colored))
            .with_message(&self.message)
            .with_label(label);

        for note in &self.notes {
            report = report.with_note(note);
        }

        if let Some(help) = &self.help {
            report = report.with_help(help);
        }

        report.finish()
    }

    /// Render the diagnostic to stderr using ariadne.
    pub fn render(&self, filename: &str, source: &str) {
        use ariadne::Source;

        if let Err(err) = self
            .report(filename, true)
            .eprint((filename, Source::from(source)))
        {
            eprintln!("error: {} (while rendering: {})", self.message, err);
        }
    }

    /// Render the diagnostic without colors into a string.
    pub fn render_plain(&self, filename: &str, source: &str) -> String {
        use ariadne::Source;

        let mut out = Vec::new();
        if self
            .report(filename, false)
            .write((filename, Source::from(source)), &mut out)
            .is_err()
        {
            return self.message.clone();
        }
        String::from_utf8_lossy(&out).into_owned()
    }
}

/// Render a list of diagnostics.
pub fn render_diagnostics(diagnostics: &[Diagnostic], filename: &str, source: &str) {
    for diag in diagnostics {
        diag.render(filename, source);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_construction() {
        let span = Span::new(10, 15);
        let d = Diagnostic::error("unknown opcode".to_string(), span);
        assert_eq!(d.severity, Severity::Error);
        assert_eq!(d.message, "unknown opcode");
        assert_eq!(d.span.start, 10);
        assert_eq!(d.span.end, 15);
        assert!(d.notes.is_empty());
        assert!(d.help.is_none());
    }

    #[test]
    fn test_chained_builders() {
        let d = Diagnostic::warning("unused decl".to_string(), Span::new(0, 5))
            .with_note("declared here".to_string())
            .with_help("remove it".to_string())
            .with_note("never read".to_string());
        assert_eq!(d.severity, Severity::Warning);
        assert_eq!(d.notes.len(), 2);
        assert_eq!(d.help.as_deref(), Some("remove it"));
    }

    #[test]
    fn test_render_does_not_panic() {
        let source = "kernel k\nblock b\n  frob (1) V1(0)<1>:d\n";
        let d = Diagnostic::error("unknown opcode 'frob'".to_string(), Span::new(18, 22))
            .with_help("expected mov, add, mul, ...".to_string());
        d.render("test.visa", source);
    }

    #[test]
    fn test_render_plain_mentions_message() {
        let source = "kernel k\n";
        let d = Diagnostic::error("expected block".to_string(), Span::new(0, 6));
        let text = d.render_plain("k.visa", source);
        assert!(text.contains("expected block"));
    }
}
