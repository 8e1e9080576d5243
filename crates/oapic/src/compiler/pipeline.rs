//! Top-level compile pipeline: validate, filter, then one translation run
//! per requested mode.

use std::cell::Cell;

use anyhow::{Context, bail};

use crate::compiler::{
  config::Config,
  diagnostics::{Diagnostic, DiagnosticCollector, Severity},
  graph::SchemaGraph,
  ir::SourceFile,
  parser::ParsedDocument,
  translator::{TranslationContext, translator_for},
  validator::validate,
};

/// Counts warnings flowing to the caller's sink so warnings-as-errors can be
/// enforced without requiring a particular collector type.
struct CountingCollector<'a> {
  inner: &'a dyn DiagnosticCollector,
  warnings: Cell<usize>,
}

impl DiagnosticCollector for CountingCollector<'_> {
  fn emit(&self, diagnostic: Diagnostic) {
    if diagnostic.severity >= Severity::Warning {
      self.warnings.set(self.warnings.get() + 1);
    }
    self.inner.emit(diagnostic);
  }
}

/// Compiles a parsed document into one source file per configured mode.
///
/// Fatal validation problems abort before translation; per-item translation
/// problems become diagnostics and the rest of the document proceeds.
pub fn compile(
  document: &ParsedDocument,
  config: &Config,
  collector: &dyn DiagnosticCollector,
) -> anyhow::Result<Vec<SourceFile>> {
  let counting = CountingCollector {
    inner: collector,
    warnings: Cell::new(0),
  };

  validate(document, &counting).context("document validation failed")?;

  let filtered;
  let spec = match config.filter.as_ref() {
    Some(criteria) => {
      filtered = crate::compiler::filter::filter(&document.spec, criteria);
      &filtered
    }
    None => &document.spec,
  };

  let mut graph = SchemaGraph::build(spec);
  graph.detect_cycles();

  let mut files = Vec::with_capacity(config.modes.len());
  for mode in &config.modes {
    // Fresh registry and memo per mode: runs stay independent and
    // deterministic.
    let mut ctx = TranslationContext::new(spec, &graph, config, &counting);
    let file = translator_for(*mode)
      .translate_file(&mut ctx)
      .with_context(|| format!("translation failed in {mode} mode"))?;
    files.push(file);
  }

  if config.warnings_as_errors && counting.warnings.get() > 0 {
    bail!("{} warning(s) treated as errors", counting.warnings.get());
  }

  Ok(files)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::compiler::{
    config::GeneratorMode,
    diagnostics::CollectingCollector,
    filter::FilterCriteria,
    parser::{DocumentFormat, parse},
  };

  const DOC: &str = r##"{
    "openapi": "3.1.0",
    "info": { "title": "Inventory", "version": "1.0.0" },
    "paths": {
      "/items": {
        "get": {
          "operationId": "listItems",
          "parameters": [
            { "name": "session", "in": "cookie", "schema": { "type": "string" } }
          ],
          "responses": {
            "200": {
              "description": "ok",
              "content": {
                "application/json": {
                  "schema": { "type": "array", "items": { "$ref": "#/components/schemas/Item" } }
                }
              }
            }
          }
        }
      }
    },
    "components": {
      "schemas": {
        "Item": {
          "type": "object",
          "required": ["sku"],
          "properties": { "sku": { "type": "string" } }
        }
      }
    }
  }"##;

  fn parsed() -> ParsedDocument {
    parse(DOC.as_bytes(), DocumentFormat::Json).unwrap()
  }

  #[test]
  fn one_file_per_configured_mode() {
    let mut config = Config::default();
    config.modes = vec![GeneratorMode::Types, GeneratorMode::Client, GeneratorMode::Server];
    let collector = CollectingCollector::new();

    let files = compile(&parsed(), &config, &collector).unwrap();
    let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["types.rs", "client.rs", "server.rs"]);
  }

  #[test]
  fn warnings_as_errors_fails_the_run() {
    let mut config = Config::default();
    config.warnings_as_errors = true;
    let collector = CollectingCollector::new();

    // The cookie parameter produces an unsupported-parameter warning.
    let result = compile(&parsed(), &config, &collector);
    assert!(result.is_err());
    assert_eq!(collector.warning_count(), 1);
  }

  #[test]
  fn warnings_alone_do_not_abort() {
    let config = Config::default();
    let collector = CollectingCollector::new();

    let files = compile(&parsed(), &config, &collector).unwrap();
    assert!(!files.is_empty());
    assert_eq!(collector.warning_count(), 1);
  }

  #[test]
  fn validation_failure_aborts_before_translation() {
    let doc = parse(
      br##"{
        "openapi": "3.1.0",
        "info": { "title": "t", "version": "1" },
        "paths": {
          "/broken": { "get": { "operationId": "broken", "responses": {} } }
        }
      }"##,
      DocumentFormat::Json,
    )
    .unwrap();
    let collector = CollectingCollector::new();

    assert!(compile(&doc, &Config::default(), &collector).is_err());
  }

  #[test]
  fn filter_restricts_translated_components() {
    let mut config = Config::default();
    let mut criteria = FilterCriteria::default();
    criteria.operation_ids.insert("listItems".to_string());
    config.filter = Some(criteria);
    let collector = CollectingCollector::new();

    let files = compile(&parsed(), &config, &collector).unwrap();
    assert!(
      files[0]
        .declarations
        .iter()
        .any(|d| d.type_name().is_some_and(|n| n.short_name() == "Item"))
    );
  }

  #[test]
  fn empty_filter_yields_empty_output() {
    let mut config = Config::default();
    config.filter = Some(FilterCriteria::default());
    let collector = CollectingCollector::new();

    let files = compile(&parsed(), &config, &collector).unwrap();
    let file = &files[0];
    assert!(file.declarations.iter().all(|d| d.type_name().is_none()));
  }

  #[test]
  fn repeat_compilation_is_byte_identical() {
    let config = Config::default();
    let collector = CollectingCollector::new();

    let first = compile(&parsed(), &config, &collector).unwrap();
    let second = compile(&parsed(), &config, &collector).unwrap();
    assert_eq!(first, second);
  }
}
