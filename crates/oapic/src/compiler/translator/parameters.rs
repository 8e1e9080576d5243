//! Parameter merging, typing, and serialization planning.

use oas3::spec::{Parameter, ParameterIn, ParameterStyle, PathItem};

use super::{
  TranslationResult,
  schema::{SchemaShape, SchemaTranslator, classify},
};
use crate::compiler::{
  diagnostics::{Diagnostic, DiagnosticMessage},
  ir::{
    CodingStrategy, ParameterLocation, ParameterPlan, PathSegment, PathTemplate, Primitive, SerializationStyle,
    TypeUsage,
  },
  naming::TypeName,
};

/// Merges path-level and operation-level parameters.
///
/// De-duplication key is (name, location): an operation-level parameter
/// shadows a path-level one with the same key; everything else is retained,
/// path-level entries first.
pub(crate) fn merge_parameters(
  spec: &oas3::Spec,
  path_item: Option<&PathItem>,
  operation: &oas3::spec::Operation,
) -> Vec<Parameter> {
  let mut merged: Vec<Parameter> = Vec::new();

  if let Some(item) = path_item {
    merged.extend(item.parameters.iter().filter_map(|r| r.resolve(spec).ok()));
  }

  for param in operation.parameters.iter().filter_map(|r| r.resolve(spec).ok()) {
    merged.retain(|existing| existing.location != param.location || existing.name != param.name);
    merged.push(param);
  }

  merged
}

/// Splits a path template into ordered literal and placeholder segments.
pub(crate) fn parse_path_template(path: &str) -> TranslationResult<PathTemplate> {
  let mut segments = Vec::new();
  let mut literal = String::new();
  let mut chars = path.chars();

  while let Some(ch) = chars.next() {
    if ch != '{' {
      literal.push(ch);
      continue;
    }
    if !literal.is_empty() {
      segments.push(PathSegment::Literal(std::mem::take(&mut literal)));
    }
    let mut placeholder = String::new();
    loop {
      match chars.next() {
        Some('}') => break,
        Some(inner) => placeholder.push(inner),
        None => anyhow::bail!("unterminated path placeholder in `{path}`"),
      }
    }
    if placeholder.is_empty() {
      anyhow::bail!("empty path placeholder in `{path}`");
    }
    segments.push(PathSegment::Placeholder { ident: placeholder });
  }
  if !literal.is_empty() {
    segments.push(PathSegment::Literal(literal));
  }

  // Routing captures one placeholder per slash-delimited segment, so a
  // template like `/pets/{id}.{format}` is not dispatchable.
  let mut captures_in_segment = 0usize;
  for segment in &segments {
    match segment {
      PathSegment::Literal(text) => {
        if text.contains('/') {
          captures_in_segment = 0;
        }
      }
      PathSegment::Placeholder { .. } => {
        captures_in_segment += 1;
        if captures_in_segment > 1 {
          anyhow::bail!("multiple placeholders in one path segment of `{path}`");
        }
      }
    }
  }

  Ok(PathTemplate { segments })
}

fn location_of(location: ParameterIn) -> ParameterLocation {
  match location {
    ParameterIn::Path => ParameterLocation::Path,
    ParameterIn::Query => ParameterLocation::Query,
    ParameterIn::Header => ParameterLocation::Header,
    ParameterIn::Cookie => ParameterLocation::Cookie,
  }
}

/// Default serialization style per location.
fn default_style(location: ParameterLocation) -> SerializationStyle {
  match location {
    ParameterLocation::Query | ParameterLocation::Cookie => SerializationStyle::Form,
    ParameterLocation::Path | ParameterLocation::Header => SerializationStyle::Simple,
  }
}

fn declared_style(param: &Parameter) -> Option<SerializationStyle> {
  match param.style {
    None => None,
    Some(ParameterStyle::Simple) => Some(SerializationStyle::Simple),
    Some(ParameterStyle::Form) => Some(SerializationStyle::Form),
    Some(ParameterStyle::SpaceDelimited) => Some(SerializationStyle::SpaceDelimited),
    Some(ParameterStyle::PipeDelimited) => Some(SerializationStyle::PipeDelimited),
    Some(_) => None,
  }
}

fn coding_for(usage: &TypeUsage) -> CodingStrategy {
  match &usage.base {
    crate::compiler::ir::TypeBase::Primitive(_) => CodingStrategy::String,
    crate::compiler::ir::TypeBase::Binary => CodingStrategy::Binary,
    _ => CodingStrategy::Json,
  }
}

/// Plans one parameter, or diagnoses and skips it when the location/style
/// combination is unsupported.
pub(crate) fn plan_parameter(
  translator: &mut SchemaTranslator<'_, '_>,
  input_name: &TypeName,
  member_scope: &str,
  param: &Parameter,
  nested: &mut Vec<crate::compiler::ir::Declaration>,
) -> TranslationResult<Option<ParameterPlan>> {
  let location = location_of(param.location);

  if location == ParameterLocation::Cookie {
    translator.context().collector.emit(Diagnostic::warning(DiagnosticMessage::UnsupportedParameter {
      name: param.name.clone(),
      location: location.to_string(),
      detail: "cookie parameters are not supported".to_string(),
    }));
    return Ok(None);
  }

  let style = match declared_style(param) {
    Some(style) => style,
    None if param.style.is_some() => {
      translator.context().collector.emit(Diagnostic::warning(DiagnosticMessage::UnsupportedParameter {
        name: param.name.clone(),
        location: location.to_string(),
        detail: format!("serialization style {:?} is not supported", param.style),
      }));
      return Ok(None);
    }
    None => default_style(location),
  };
  let explode = param.explode.unwrap_or(style == SerializationStyle::Form);

  // Path substitution is direct string replacement, so only simple,
  // non-explode path parameters are expressible.
  if location == ParameterLocation::Path && (style != SerializationStyle::Simple || explode) {
    translator.context().collector.emit(Diagnostic::warning(DiagnosticMessage::UnsupportedParameter {
      name: param.name.clone(),
      location: location.to_string(),
      detail: "only simple-style, non-explode path parameters are supported".to_string(),
    }));
    return Ok(None);
  }

  if location == ParameterLocation::Header && style != SerializationStyle::Simple {
    translator.context().collector.emit(Diagnostic::warning(DiagnosticMessage::UnsupportedParameter {
      name: param.name.clone(),
      location: location.to_string(),
      detail: "header parameters support only simple style".to_string(),
    }));
    return Ok(None);
  }

  let required = param.required.unwrap_or(location == ParameterLocation::Path);

  let mut ty = match param.schema.as_ref() {
    Some(schema_ref) => translator.usage_for(input_name, &param.name, schema_ref, nested)?,
    None => {
      translator.context().collector.emit(
        Diagnostic::warning(DiagnosticMessage::UnsupportedParameter {
          name: param.name.clone(),
          location: location.to_string(),
          detail: "parameter has no schema, defaulting to String".to_string(),
        })
        .with_context("parameter", &param.name),
      );
      TypeUsage::primitive(Primitive::String)
    }
  };
  if !required {
    ty = ty.with_optional();
  }

  let coding = coding_for(&ty);
  let member = translator.context().registry.member_name(&param.name, member_scope);

  Ok(Some(
    ParameterPlan::builder()
      .ident(member.safe)
      .wire_name(param.name.clone())
      .location(location)
      .style(style)
      .explode(explode)
      .coding(coding)
      .ty(ty)
      .required(required)
      .build(),
  ))
}

/// Path placeholders with no declared parameter still need a slot; they
/// default to required strings.
pub(crate) fn synthesize_missing_path_params(
  translator: &mut SchemaTranslator<'_, '_>,
  member_scope: &str,
  template: &PathTemplate,
  planned: &[ParameterPlan],
) -> Vec<ParameterPlan> {
  let mut synthesized = Vec::new();
  for placeholder in template.placeholders() {
    let declared = planned
      .iter()
      .any(|p| p.location == ParameterLocation::Path && p.wire_name == placeholder);
    if declared {
      continue;
    }
    let member = translator.context().registry.member_name(placeholder, member_scope);
    synthesized.push(
      ParameterPlan::builder()
        .ident(member.safe)
        .wire_name(placeholder.to_string())
        .location(ParameterLocation::Path)
        .style(SerializationStyle::Simple)
        .explode(false)
        .coding(CodingStrategy::String)
        .ty(TypeUsage::primitive(Primitive::String))
        .required(true)
        .build(),
    );
  }
  synthesized
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::compiler::{
    config::Config, diagnostics::CollectingCollector, graph::SchemaGraph, translator::TranslationContext,
  };

  fn spec_with_operation(parameters: &str, op_parameters: &str) -> oas3::Spec {
    let json = format!(
      r#"{{
        "openapi": "3.1.0",
        "info": {{ "title": "t", "version": "1" }},
        "paths": {{
          "/items/{{id}}": {{
            "parameters": {parameters},
            "get": {{
              "operationId": "getItem",
              "parameters": {op_parameters},
              "responses": {{ "200": {{ "description": "ok" }} }}
            }}
          }}
        }}
      }}"#
    );
    oas3::from_json(&json).unwrap()
  }

  fn merged_for(spec: &oas3::Spec) -> Vec<Parameter> {
    let path_item = spec.paths.as_ref().unwrap().get("/items/{id}").unwrap();
    let operation = path_item.get.as_ref().unwrap();
    merge_parameters(spec, Some(path_item), operation)
  }

  #[test]
  fn operation_level_shadows_path_level_by_name_and_location() {
    let spec = spec_with_operation(
      r#"[{ "name": "test", "in": "query", "schema": { "type": "integer" } }]"#,
      r#"[{ "name": "test", "in": "query", "schema": { "type": "string" } }]"#,
    );
    let merged = merged_for(&spec);

    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].name, "test");
    let schema = merged[0].schema.as_ref().unwrap().resolve(&spec).unwrap();
    assert!(matches!(classify(&schema, None), SchemaShape::Primitive(Primitive::String)));
  }

  #[test]
  fn same_name_different_location_keeps_both() {
    let spec = spec_with_operation(
      r#"[{ "name": "test", "in": "query", "schema": { "type": "integer" } }]"#,
      r#"[{ "name": "test", "in": "header", "schema": { "type": "string" } }]"#,
    );
    let merged = merged_for(&spec);

    assert_eq!(merged.len(), 2);
    assert_eq!(merged[0].location, ParameterIn::Query);
    assert_eq!(merged[1].location, ParameterIn::Header);
  }

  #[test]
  fn path_level_entries_come_first() {
    let spec = spec_with_operation(
      r#"[{ "name": "shared", "in": "query", "schema": { "type": "string" } }]"#,
      r#"[{ "name": "own", "in": "query", "schema": { "type": "string" } }]"#,
    );
    let merged = merged_for(&spec);

    assert_eq!(merged[0].name, "shared");
    assert_eq!(merged[1].name, "own");
  }

  #[test]
  fn path_template_splits_literals_and_placeholders() {
    let template = parse_path_template("/pets/{petId}/photos/{photoId}").unwrap();
    assert_eq!(
      template.segments,
      vec![
        PathSegment::Literal("/pets/".into()),
        PathSegment::Placeholder { ident: "petId".into() },
        PathSegment::Literal("/photos/".into()),
        PathSegment::Placeholder { ident: "photoId".into() },
      ]
    );
  }

  #[test]
  fn unterminated_placeholder_is_rejected() {
    assert!(parse_path_template("/pets/{petId").is_err());
  }

  #[test]
  fn two_placeholders_in_one_segment_are_rejected() {
    assert!(parse_path_template("/pets/{petId}.{format}").is_err());
    assert!(parse_path_template("/{owner}/{petId}").is_ok());
  }

  fn plan_one(param_json: &str) -> (Option<ParameterPlan>, CollectingCollector) {
    let spec = spec_with_operation("[]", &format!("[{param_json}]"));
    let mut graph = SchemaGraph::build(&spec);
    graph.detect_cycles();
    let config = Config::default();
    let collector = CollectingCollector::new();
    let plan = {
      let mut ctx = TranslationContext::new(&spec, &graph, &config, &collector);
      let mut translator = SchemaTranslator::new(&mut ctx);
      let merged = {
        let path_item = spec.paths.as_ref().unwrap().get("/items/{id}").unwrap();
        let operation = path_item.get.as_ref().unwrap();
        merge_parameters(&spec, None, operation)
      };
      let input_name = translator.context().registry.type_name("GetItemInput", crate::compiler::naming::ComponentKind::Schema);
      let mut nested = Vec::new();
      plan_parameter(&mut translator, &input_name, "scope", &merged[0], &mut nested).unwrap()
    };
    (plan, collector)
  }

  #[test]
  fn cookie_parameters_are_diagnosed_and_skipped() {
    let (plan, collector) = plan_one(r#"{ "name": "session", "in": "cookie", "schema": { "type": "string" } }"#);
    assert!(plan.is_none());
    assert_eq!(collector.warning_count(), 1);
  }

  #[test]
  fn query_defaults_to_form_explode() {
    let (plan, _) = plan_one(r#"{ "name": "tags", "in": "query", "schema": { "type": "array", "items": { "type": "string" } } }"#);
    let plan = plan.unwrap();
    assert_eq!(plan.style, SerializationStyle::Form);
    assert!(plan.explode);
    assert!(plan.ty.array);
    assert!(plan.ty.optional);
  }

  #[test]
  fn pipe_delimited_without_explode_keeps_separator() {
    let (plan, _) = plan_one(
      r#"{ "name": "ids", "in": "query", "style": "pipeDelimited", "explode": false, "schema": { "type": "array", "items": { "type": "integer" } } }"#,
    );
    let plan = plan.unwrap();
    assert_eq!(plan.style, SerializationStyle::PipeDelimited);
    assert!(!plan.explode);
    assert_eq!(plan.style.separator(), '|');
  }

  #[test]
  fn exploded_path_parameter_is_diagnosed() {
    let (plan, collector) = plan_one(
      r#"{ "name": "id", "in": "path", "required": true, "explode": true, "schema": { "type": "string" } }"#,
    );
    assert!(plan.is_none());
    assert_eq!(collector.warning_count(), 1);
  }

  #[test]
  fn path_parameters_are_required_by_default() {
    let (plan, _) = plan_one(r#"{ "name": "id", "in": "path", "schema": { "type": "string" } }"#);
    let plan = plan.unwrap();
    assert!(plan.required);
    assert!(!plan.ty.optional);
  }
}
