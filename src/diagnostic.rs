// Copyright 2025 Cornell University
// released under MIT License

use std::io::Write;

use codespan_reporting::diagnostic::{
    Diagnostic as CodespanDiagnostic, Label as CodespanLabel, LabelStyle, Severity,
};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{Buffer, Color, ColorChoice, ColorSpec, WriteColor};
use log::warn;

use crate::errors::Error;
use crate::syntax::Span;

/// Severity of diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Error,
    Warning,
}

/// A label representing a part of the source code
#[derive(Debug, Clone, PartialEq, Eq)]
struct Label {
    message: Option<String>,
    span: Span,
}

impl Label {
    fn to_codespan_label(&self, fileid: usize) -> CodespanLabel<usize> {
        CodespanLabel::new(LabelStyle::Primary, fileid, self.span.start..self.span.end)
            .with_message(self.message.clone().unwrap_or_default())
    }
}

/// Diagnostic of a particular part of source code
struct Diagnostic {
    message: String,
    level: Level,
    location: Option<(usize, Label)>,
}

impl Diagnostic {
    fn emit(&self, buffer: &mut Buffer, files: &SimpleFiles<String, String>) -> std::io::Result<()> {
        if let Some((fileid, label)) = &self.location {
            let severity = match self.level {
                Level::Error => Severity::Error,
                Level::Warning => Severity::Warning,
            };

            let diagnostic = CodespanDiagnostic::new(severity)
                .with_message(&self.message)
                .with_labels(vec![label.to_codespan_label(*fileid)]);

            let config = term::Config::default();
            term::emit(buffer, &config, files, &diagnostic)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
        } else {
            let color = match self.level {
                Level::Error => Color::Red,
                Level::Warning => Color::Yellow,
            };
            let title = match self.level {
                Level::Error => "error",
                Level::Warning => "warning",
            };

            buffer.set_color(ColorSpec::new().set_bold(true).set_fg(Some(color)))?;
            write!(buffer, "{title}")?;
            buffer.set_color(&ColorSpec::new())?;
            writeln!(buffer, ": {}", self.message)
        }
    }
}

/// Collects rendered diagnostics for one or more source files.
pub struct DiagnosticHandler {
    files: SimpleFiles<String, String>,
    error_string: String,
    /// `color_choice` indicates whether to emit error messages w/ ANSI colors
    color_choice: ColorChoice,
}

impl Default for DiagnosticHandler {
    /// Default `DiagnosticHandler` does not emit colored error messages
    fn default() -> Self {
        Self::new(ColorChoice::Never)
    }
}

impl DiagnosticHandler {
    pub fn new(color_choice: ColorChoice) -> Self {
        Self {
            files: SimpleFiles::new(),
            error_string: String::new(),
            color_choice,
        }
    }

    fn create_buffer(&self) -> Buffer {
        if self.color_choice == ColorChoice::Never {
            Buffer::no_color()
        } else {
            Buffer::ansi()
        }
    }

    pub fn add_file(&mut self, name: String, content: String) -> usize {
        self.files.add(name, content)
    }

    /// Everything emitted so far
    pub fn error_string(&self) -> &str {
        &self.error_string
    }

    /// Renders `message`, pointing at `span` in file `fileid` when given.
    pub fn emit_diagnostic(
        &mut self,
        fileid: usize,
        message: &str,
        span: Option<Span>,
        level: Level,
    ) {
        let location = span.map(|span| {
            (
                fileid,
                Label {
                    message: None,
                    span,
                },
            )
        });
        self.emit(message, location, level);
    }

    fn emit(&mut self, message: &str, location: Option<(usize, Label)>, level: Level) {
        let mut buffer = self.create_buffer();
        let diagnostic = Diagnostic {
            message: message.to_string(),
            level,
            location,
        };
        if let Err(e) = diagnostic.emit(&mut buffer, &self.files) {
            warn!("failed to render diagnostic: {e}");
            return;
        }
        self.error_string
            .push_str(&String::from_utf8_lossy(buffer.as_slice()));
    }

    /// Renders a pipeline error against the file it came from. The span is
    /// labelled with the error itself, without the block or test it is in.
    pub fn report(&mut self, fileid: usize, error: &Error) {
        let label = match error {
            Error::Io { .. } => None,
            Error::Parse(e) => Some(e.message.clone()),
            Error::Compile(e) => Some(e.kind().to_string()),
            Error::Type(e) => Some(e.kind().to_string()),
        };
        let location = error.span().map(|span| {
            (
                fileid,
                Label {
                    message: label,
                    span,
                },
            )
        });
        self.emit(&error.to_string(), location, Level::Error);
    }
}
