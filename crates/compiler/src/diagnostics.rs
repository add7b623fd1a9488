//! Shared diagnostics for the compiler pipeline.
//!
//! Every phase buffers its findings in a [`DiagnosticBag`] instead of
//! aborting: a phase succeeds iff its error list is empty, and the driver
//! reports everything after the phase completes. Warnings never block a
//! downstream phase.

use std::fmt;
use std::rc::Rc;

/// A position in the source text. Lines and columns are 1-based; the byte
/// offset indexes the raw source buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: Rc<str>,
    pub line: u32,
    pub column: u32,
    pub offset: usize,
}

impl SourceLocation {
    pub fn new(file: Rc<str>, line: u32, column: u32, offset: usize) -> Self {
        SourceLocation {
            file,
            line,
            column,
            offset,
        }
    }

    /// A location for nodes synthesized by the compiler itself.
    pub fn builtin() -> Self {
        SourceLocation {
            file: Rc::from("<builtin>"),
            line: 0,
            column: 0,
            offset: 0,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// A single reported problem with its source position.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub location: SourceLocation,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.location, self.severity, self.message)
    }
}

/// Collector shared by all phases. Errors and warnings are kept separate so
/// the driver can gate downstream phases on errors alone.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticBag {
    errors: Vec<Diagnostic>,
    warnings: Vec<Diagnostic>,
}

impl DiagnosticBag {
    pub fn new() -> Self {
        DiagnosticBag::default()
    }

    pub fn error(&mut self, location: SourceLocation, message: impl Into<String>) {
        self.errors.push(Diagnostic {
            severity: Severity::Error,
            message: message.into(),
            location,
        });
    }

    pub fn warning(&mut self, location: SourceLocation, message: impl Into<String>) {
        self.warnings.push(Diagnostic {
            severity: Severity::Warning,
            message: message.into(),
            location,
        });
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }

    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }

    /// Merge another bag into this one, preserving report order.
    pub fn absorb(&mut self, other: DiagnosticBag) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// All diagnostics, errors first, in the order they were recorded.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.errors.iter().chain(self.warnings.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(line: u32, column: u32) -> SourceLocation {
        SourceLocation::new(Rc::from("test.c"), line, column, 0)
    }

    #[test]
    fn test_display_format() {
        let mut bag = DiagnosticBag::new();
        bag.error(loc(3, 7), "unexpected token");
        let rendered = bag.errors()[0].to_string();
        assert_eq!(rendered, "test.c:3:7: error: unexpected token");
    }

    #[test]
    fn test_errors_gate_warnings_do_not() {
        let mut bag = DiagnosticBag::new();
        bag.warning(loc(1, 1), "implicit conversion");
        assert!(!bag.has_errors());
        bag.error(loc(2, 1), "redefinition of 'x'");
        assert!(bag.has_errors());
        assert_eq!(bag.warnings().len(), 1);
    }

    #[test]
    fn test_absorb_preserves_order() {
        let mut first = DiagnosticBag::new();
        first.error(loc(1, 1), "first");
        let mut second = DiagnosticBag::new();
        second.error(loc(2, 1), "second");
        first.absorb(second);
        let messages: Vec<_> = first.errors().iter().map(|d| d.message.as_str()).collect();
        assert_eq!(messages, vec!["first", "second"]);
    }
}
