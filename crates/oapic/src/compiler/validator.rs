//! Structural and semantic validation of a parsed document.
//!
//! Fatal findings (zero-response operations, reference cycles, dangling
//! refs) abort before translation. Strictness findings are forwarded to the
//! diagnostic collector as warnings and translation proceeds.

use oas3::spec::ObjectOrReference;

use crate::compiler::{
  diagnostics::{Diagnostic, DiagnosticCollector, DiagnosticMessage},
  graph::SchemaGraph,
  parser::ParsedDocument,
};

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
  #[error("operation '{method} {path}' declares no responses")]
  NoResponses { method: String, path: String },

  #[error("reference cycle through components: {}", cycle.join(" -> "))]
  ReferenceCycle { cycle: Vec<String> },

  #[error("unresolvable reference to component schema '{component}'")]
  DanglingSchemaRef { component: String },

  #[error("unresolvable reference in operation '{method} {path}': {detail}")]
  DanglingOperationRef {
    method: String,
    path: String,
    detail: String,
  },
}

/// Validates the document, emitting warnings into `collector`.
///
/// # Errors
///
/// Returns the first fatal finding. Warnings are emitted but never abort.
pub fn validate(document: &ParsedDocument, collector: &dyn DiagnosticCollector) -> Result<(), ValidationError> {
  let spec = &document.spec;

  let mut graph = SchemaGraph::build(spec);

  if let Some(component) = graph.unresolved().first() {
    return Err(ValidationError::DanglingSchemaRef {
      component: component.clone(),
    });
  }

  if let Some(cycle) = graph.detect_cycles().into_iter().next() {
    return Err(ValidationError::ReferenceCycle { cycle });
  }

  check_operations(document, collector)?;
  check_schema_strictness(document, collector);

  Ok(())
}

fn check_operations(document: &ParsedDocument, _collector: &dyn DiagnosticCollector) -> Result<(), ValidationError> {
  let spec = &document.spec;

  for (path, method, operation) in spec.operations() {
    let has_responses = operation.responses.as_ref().is_some_and(|r| !r.is_empty());
    if !has_responses {
      return Err(ValidationError::NoResponses {
        method: method.to_string(),
        path: path.to_string(),
      });
    }

    for param_ref in &operation.parameters {
      if let ObjectOrReference::Ref { ref_path, .. } = param_ref
        && param_ref.resolve(spec).is_err()
      {
        return Err(dangling(method.as_str(), &path, ref_path));
      }
    }

    if let Some(body_ref) = &operation.request_body
      && let ObjectOrReference::Ref { ref_path, .. } = body_ref
      && body_ref.resolve(spec).is_err()
    {
      return Err(dangling(method.as_str(), &path, ref_path));
    }

    if let Some(responses) = &operation.responses {
      for response_ref in responses.values() {
        if let ObjectOrReference::Ref { ref_path, .. } = response_ref
          && response_ref.resolve(spec).is_err()
        {
          return Err(dangling(method.as_str(), &path, ref_path));
        }
      }
    }
  }

  Ok(())
}

fn dangling(method: &str, path: &str, ref_path: &str) -> ValidationError {
  ValidationError::DanglingOperationRef {
    method: method.to_string(),
    path: path.to_string(),
    detail: format!("'{ref_path}' does not resolve"),
  }
}

/// Strictness checks that would be pedantic to fail on: forwarded as
/// warnings so an otherwise-correct document still translates.
fn check_schema_strictness(document: &ParsedDocument, collector: &dyn DiagnosticCollector) {
  let Some(components) = &document.spec.components else {
    return;
  };

  for (key, schema_ref) in &components.schemas {
    let ObjectOrReference::Object(schema) = schema_ref else {
      continue;
    };

    for required in &schema.required {
      let declared = schema.properties.contains_key(required);
      if !declared && schema.all_of.is_empty() && schema.additional_properties.is_none() {
        collector.emit(
          Diagnostic::warning(DiagnosticMessage::SchemaStrictness {
            schema_key: key.clone(),
            detail: format!("required property '{required}' is not declared in 'properties'"),
          })
          .at(document.source_path.clone(), None),
        );
      }
    }

    if !schema.one_of.is_empty() && !schema.any_of.is_empty() {
      collector.emit(Diagnostic::warning(DiagnosticMessage::SchemaStrictness {
        schema_key: key.clone(),
        detail: "schema mixes oneOf and anyOf; oneOf takes precedence".to_string(),
      }));
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::compiler::{
    diagnostics::CollectingCollector,
    parser::{DocumentFormat, parse},
  };

  fn parse_doc(json: &str) -> ParsedDocument {
    parse(json.as_bytes(), DocumentFormat::Json).unwrap()
  }

  #[test]
  fn accepts_well_formed_document() {
    let doc = parse_doc(
      r##"{
        "openapi": "3.0.0",
        "info": { "title": "t", "version": "1" },
        "paths": {
          "/pets": {
            "get": { "responses": { "200": { "description": "ok" } } }
          }
        }
      }"##,
    );
    let collector = CollectingCollector::new();
    validate(&doc, &collector).unwrap();
    assert!(!collector.has_errors());
  }

  #[test]
  fn rejects_operation_without_responses() {
    let doc = parse_doc(
      r##"{
        "openapi": "3.0.0",
        "info": { "title": "t", "version": "1" },
        "paths": { "/pets": { "get": { "responses": {} } } }
      }"##,
    );
    let collector = CollectingCollector::new();
    let err = validate(&doc, &collector).unwrap_err();
    assert!(matches!(err, ValidationError::NoResponses { .. }));
  }

  #[test]
  fn rejects_schema_reference_cycle() {
    let doc = parse_doc(
      r##"{
        "openapi": "3.0.0",
        "info": { "title": "t", "version": "1" },
        "paths": {},
        "components": { "schemas": {
          "A": { "properties": { "b": { "$ref": "#/components/schemas/B" } } },
          "B": { "properties": { "a": { "$ref": "#/components/schemas/A" } } }
        } }
      }"##,
    );
    let collector = CollectingCollector::new();
    let err = validate(&doc, &collector).unwrap_err();
    match err {
      ValidationError::ReferenceCycle { cycle } => assert_eq!(cycle.len(), 2),
      other => panic!("expected ReferenceCycle, got {other}"),
    }
  }

  #[test]
  fn rejects_dangling_parameter_ref() {
    let doc = parse_doc(
      r##"{
        "openapi": "3.0.0",
        "info": { "title": "t", "version": "1" },
        "paths": {
          "/pets": {
            "get": {
              "parameters": [ { "$ref": "#/components/parameters/Missing" } ],
              "responses": { "200": { "description": "ok" } }
            }
          }
        }
      }"##,
    );
    let collector = CollectingCollector::new();
    let err = validate(&doc, &collector).unwrap_err();
    assert!(matches!(err, ValidationError::DanglingOperationRef { .. }));
  }

  #[test]
  fn undeclared_required_property_is_warning_not_error() {
    let doc = parse_doc(
      r##"{
        "openapi": "3.0.0",
        "info": { "title": "t", "version": "1" },
        "paths": {},
        "components": { "schemas": {
          "Pet": { "type": "object", "required": ["ghost"], "properties": { "name": { "type": "string" } } }
        } }
      }"##,
    );
    let collector = CollectingCollector::new();
    validate(&doc, &collector).unwrap();
    assert_eq!(collector.warning_count(), 1);
  }
}
