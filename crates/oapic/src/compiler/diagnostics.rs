//! Diagnostics accumulated across a compiler run.
//!
//! Warnings never abort the pipeline; fatal conditions surface as typed
//! errors from the stage that found them. The collector is owned by the
//! caller so independent runs never share state.

use std::{cell::RefCell, fmt};

use strum::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display)]
pub enum Severity {
  #[strum(to_string = "note")]
  Note,
  #[strum(to_string = "warning")]
  Warning,
  #[strum(to_string = "error")]
  Error,
}

/// One reportable finding, anchored to the source document when possible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
  pub severity: Severity,
  pub message: DiagnosticMessage,
  pub file: Option<String>,
  pub line: Option<usize>,
  /// Free-form key/value context, e.g. the operation id or schema key.
  pub context: Vec<(String, String)>,
}

impl Diagnostic {
  #[must_use]
  pub fn warning(message: DiagnosticMessage) -> Self {
    Self {
      severity: Severity::Warning,
      message,
      file: None,
      line: None,
      context: Vec::new(),
    }
  }

  #[must_use]
  pub fn note(message: DiagnosticMessage) -> Self {
    Self {
      severity: Severity::Note,
      ..Self::warning(message)
    }
  }

  #[must_use]
  pub fn error(message: DiagnosticMessage) -> Self {
    Self {
      severity: Severity::Error,
      ..Self::warning(message)
    }
  }

  #[must_use]
  pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.context.push((key.into(), value.into()));
    self
  }

  #[must_use]
  pub fn at(mut self, file: Option<String>, line: Option<usize>) -> Self {
    self.file = file;
    self.line = line;
    self
  }
}

impl fmt::Display for Diagnostic {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}: {}", self.severity, self.message)?;
    if let Some(file) = &self.file {
      write!(f, " [{file}")?;
      if let Some(line) = self.line {
        write!(f, ":{line}")?;
      }
      write!(f, "]")?;
    }
    for (key, value) in &self.context {
      write!(f, " ({key}={value})")?;
    }
    Ok(())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum DiagnosticMessage {
  #[strum(to_string = "failed to translate schema '{schema_key}': {detail}")]
  SchemaTranslationFailed { schema_key: String, detail: String },
  #[strum(to_string = "failed to translate operation '{method} {path}': {detail}")]
  OperationTranslationFailed {
    method: String,
    path: String,
    detail: String,
  },
  #[strum(to_string = "unsupported parameter '{name}' in '{location}': {detail}")]
  UnsupportedParameter {
    name: String,
    location: String,
    detail: String,
  },
  #[strum(to_string = "multipart property '{property}' has an ambiguous shape: {detail}")]
  AmbiguousMultipartPart { property: String, detail: String },
  #[strum(to_string = "identifier '{raw}' was disambiguated to '{safe}'")]
  NameDisambiguated { raw: String, safe: String },
  #[strum(to_string = "schema '{schema_key}' failed strict validation: {detail}")]
  SchemaStrictness { schema_key: String, detail: String },
  #[strum(to_string = "reference '{ref_path}' could not be resolved: {detail}")]
  DanglingReference { ref_path: String, detail: String },
  #[strum(to_string = "{0}")]
  Other(String),
}

/// Sink for diagnostics, provided by the caller of the pipeline.
pub trait DiagnosticCollector {
  fn emit(&self, diagnostic: Diagnostic);

  fn emit_all(&self, diagnostics: impl IntoIterator<Item = Diagnostic>)
  where
    Self: Sized,
  {
    for diagnostic in diagnostics {
      self.emit(diagnostic);
    }
  }
}

/// Prints diagnostics to stderr as they arrive.
#[derive(Debug, Default)]
pub struct PrintingCollector;

impl DiagnosticCollector for PrintingCollector {
  fn emit(&self, diagnostic: Diagnostic) {
    eprintln!("{diagnostic}");
  }
}

/// Accumulates diagnostics in memory, for tests and for exit-code decisions.
#[derive(Debug, Default)]
pub struct CollectingCollector {
  collected: RefCell<Vec<Diagnostic>>,
}

impl CollectingCollector {
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  #[must_use]
  pub fn diagnostics(&self) -> Vec<Diagnostic> {
    self.collected.borrow().clone()
  }

  #[must_use]
  pub fn warning_count(&self) -> usize {
    self
      .collected
      .borrow()
      .iter()
      .filter(|d| d.severity == Severity::Warning)
      .count()
  }

  #[must_use]
  pub fn has_errors(&self) -> bool {
    self.collected.borrow().iter().any(|d| d.severity == Severity::Error)
  }
}

impl DiagnosticCollector for CollectingCollector {
  fn emit(&self, diagnostic: Diagnostic) {
    self.collected.borrow_mut().push(diagnostic);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn display_includes_location_and_context() {
    let diagnostic = Diagnostic::warning(DiagnosticMessage::Other("something odd".into()))
      .at(Some("api.yaml".into()), Some(12))
      .with_context("operation", "listPets");

    assert_eq!(diagnostic.to_string(), "warning: something odd [api.yaml:12] (operation=listPets)");
  }

  #[test]
  fn collecting_collector_tracks_severities() {
    let collector = CollectingCollector::new();
    collector.emit(Diagnostic::warning(DiagnosticMessage::Other("w".into())));
    collector.emit(Diagnostic::error(DiagnosticMessage::Other("e".into())));

    assert_eq!(collector.warning_count(), 1);
    assert!(collector.has_errors());
    assert_eq!(collector.diagnostics().len(), 2);
  }
}
