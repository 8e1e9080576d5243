//! Per-operation translation: Input/Output synthesis and the wire plan
//! shared by the client and server translators.

use http::Method;
use oas3::spec::{Operation, PathItem, Response};

use super::{
  TranslationContext, TranslationResult,
  content::{accept_entries, classify_content_type, content_case},
  parameters::{merge_parameters, parse_path_template, plan_parameter, synthesize_missing_path_params},
  schema::SchemaTranslator,
};
use crate::compiler::{
  diagnostics::{Diagnostic, DiagnosticMessage},
  ir::{
    ContentCase, Declaration, InputDecl, OperationPlan, OperationSignature, ResponseArm, ResponseEnumDecl, StatusMatch,
  },
  naming::TypeName,
};

/// Catch-all case preserving responses outside the documented set.
pub(crate) const UNDOCUMENTED_CASE: &str = "Undocumented";

/// Everything produced for one operation.
#[derive(Debug, Clone)]
pub(crate) struct TranslatedOperation {
  pub input: InputDecl,
  pub output: ResponseEnumDecl,
  pub plan: OperationPlan,
}

/// Translates every operation in the document, diagnosing and skipping the
/// ones that fail.
pub(crate) fn translate_operations(ctx: &mut TranslationContext<'_>) -> Vec<TranslatedOperation> {
  let spec = ctx.spec;
  let operations: Vec<(String, Method, &Operation)> = spec.operations().collect();

  let mut translated = Vec::new();
  for (path, method, operation) in operations {
    let path_item = spec.paths.as_ref().and_then(|paths| paths.get(&path));
    match translate_operation(ctx, &path, &method, path_item, operation) {
      Ok(op) => translated.push(op),
      Err(err) => {
        ctx.collector.emit(Diagnostic::warning(DiagnosticMessage::OperationTranslationFailed {
          method: method.to_string(),
          path: path.clone(),
          detail: format!("{err:#}"),
        }));
      }
    }
  }
  ctx.flush_naming_diagnostics();
  translated
}

fn translate_operation(
  ctx: &mut TranslationContext<'_>,
  path: &str,
  method: &Method,
  path_item: Option<&PathItem>,
  operation: &Operation,
) -> TranslationResult<TranslatedOperation> {
  let spec = ctx.spec;
  let raw_name = operation.operation_id.clone().unwrap_or_else(|| {
    let words: String = path
      .chars()
      .map(|c| if matches!(c, '/' | '{' | '}') { ' ' } else { c })
      .collect();
    format!("{} {}", method.as_str().to_lowercase(), words.trim())
  });

  let operations_root = TypeName::root("operations", "operations");
  let method_ident = ctx.registry.member_name(&raw_name, "operations::methods").safe;
  let input_name = ctx.registry.child_type_name(&operations_root, &format!("{raw_name} input"));
  let output_name = ctx.registry.child_type_name(&operations_root, &format!("{raw_name} output"));

  let mut translator = SchemaTranslator::new(ctx);

  // Parameters: merged path/operation level, then synthesized placeholders.
  let template = parse_path_template(path)?;
  let member_scope = format!("{}::members", input_name.safe_path());
  let mut nested = Vec::new();
  let mut parameters = Vec::new();
  for param in merge_parameters(spec, path_item, operation) {
    if let Some(plan) = plan_parameter(&mut translator, &input_name, &member_scope, &param, &mut nested)? {
      parameters.push(plan);
    }
  }
  let synthesized = synthesize_missing_path_params(&mut translator, &member_scope, &template, &parameters);
  parameters.extend(synthesized);

  // Request body: one case per content type.
  let mut body_cases = Vec::new();
  let mut body_required = false;
  if let Some(body_ref) = operation.request_body.as_ref() {
    let body = body_ref.resolve(spec)?;
    body_required = body.required.unwrap_or(false);
    let case_scope = format!("{}::body", input_name.safe_path());
    for (content_type, media) in &body.content {
      let suffix = classify_content_type(content_type).case_suffix();
      let proposal = if suffix.is_empty() { "Json" } else { suffix };
      let case_ident = translator.context().registry.unique_name(proposal, &case_scope).safe;
      body_cases.push(content_case(
        &mut translator,
        &input_name,
        "body",
        case_ident,
        content_type,
        media,
        &mut nested,
      )?);
    }
  }

  let input = InputDecl::builder()
    .name(input_name.clone())
    .docs(operation_docs(operation))
    .parameters(parameters.clone())
    .body(body_cases.clone())
    .body_required(body_required)
    .nested(std::mem::take(&mut nested))
    .build();

  // Responses: declared order with default forced last, then the catch-all.
  let mut output_nested = Vec::new();
  let arms = response_arms(&mut translator, &output_name, operation, &mut output_nested)?;
  let accept = {
    let mut content_types: Vec<String> = Vec::new();
    for arm in &arms {
      for case in &arm.content {
        if !content_types.contains(&case.content_type) {
          content_types.push(case.content_type.clone());
        }
      }
    }
    accept_entries(&content_types)
  };

  let output = ResponseEnumDecl::builder()
    .name(output_name.clone())
    .docs(vec![format!("Outcomes of `{raw_name}`.")])
    .arms(arms.clone())
    .nested(output_nested)
    .build();

  let signature = OperationSignature::builder()
    .ident(method_ident)
    .docs(operation_docs(operation))
    .input(input_name)
    .output(output_name)
    .build();

  let plan = OperationPlan::builder()
    .signature(signature)
    .method(method.clone())
    .path(template)
    .parameters(parameters)
    .request_body(body_cases)
    .body_required(body_required)
    .accept(accept)
    .responses(arms)
    .build();

  Ok(TranslatedOperation { input, output, plan })
}

fn operation_docs(operation: &Operation) -> Vec<String> {
  operation
    .summary
    .as_deref()
    .or(operation.description.as_deref())
    .map(|text| text.lines().map(str::to_owned).collect())
    .unwrap_or_default()
}

/// Parses a response-map key into a status matcher.
fn parse_status(key: &str) -> Option<StatusMatch> {
  if key.eq_ignore_ascii_case("default") {
    return Some(StatusMatch::Default);
  }
  if let Ok(code) = key.parse::<u16>() {
    return (100..=599).contains(&code).then_some(StatusMatch::Exact(code));
  }
  let mut chars = key.chars();
  let class = chars.next()?.to_digit(10)?;
  if (1..=5).contains(&class) && chars.as_str().eq_ignore_ascii_case("XX") {
    return Some(StatusMatch::Range(class as u8));
  }
  None
}

fn status_case_label(status: StatusMatch) -> String {
  match status {
    StatusMatch::Exact(code) => http::StatusCode::from_u16(code)
      .ok()
      .and_then(|status| status.canonical_reason())
      .map(str::to_owned)
      .unwrap_or_else(|| format!("Status {code}")),
    StatusMatch::Range(1) => "Informational".to_string(),
    StatusMatch::Range(2) => "Success".to_string(),
    StatusMatch::Range(3) => "Redirection".to_string(),
    StatusMatch::Range(4) => "Client Error".to_string(),
    StatusMatch::Range(5) => "Server Error".to_string(),
    StatusMatch::Range(_) => "Status Range".to_string(),
    StatusMatch::Default => "Default".to_string(),
  }
}

fn response_arms(
  translator: &mut SchemaTranslator<'_, '_>,
  output_name: &TypeName,
  operation: &Operation,
  nested: &mut Vec<Declaration>,
) -> TranslationResult<Vec<ResponseArm>> {
  let spec = translator.context().spec;
  let arm_scope = format!("{}::arms", output_name.safe_path());

  let mut declared: Vec<(StatusMatch, Response)> = Vec::new();
  if let Some(responses) = operation.responses.as_ref() {
    for (key, response_ref) in responses {
      let Some(status) = parse_status(key) else {
        anyhow::bail!("response key `{key}` is not a status code, range, or `default`");
      };
      declared.push((status, response_ref.resolve(spec)?));
    }
  }

  // Default always sorts last, preserving the relative order of the rest.
  declared.sort_by_key(|(status, _)| matches!(status, StatusMatch::Default));

  let mut arms = Vec::new();
  for (status, response) in &declared {
    let label = status_case_label(*status);
    let ident = translator.context().registry.unique_name(&pascal(&label), &arm_scope).safe;

    let case_scope = format!("{}::{}::content", output_name.safe_path(), ident);
    let mut content = Vec::new();
    for (content_type, media) in &response.content {
      let suffix = classify_content_type(content_type).case_suffix();
      let proposal = if suffix.is_empty() { "Json" } else { suffix };
      let case_ident = translator.context().registry.unique_name(proposal, &case_scope).safe;
      let label = format!("{ident} body");
      content.push(content_case(
        translator,
        output_name,
        &label,
        case_ident,
        content_type,
        media,
        nested,
      )?);
    }

    let docs = response.description.clone().map(|d| vec![d]).unwrap_or_default();
    arms.push(ResponseArm::builder().ident(ident).status(*status).docs(docs).content(content).build());
  }

  let undocumented_ident = translator.context().registry.unique_name(UNDOCUMENTED_CASE, &arm_scope).safe;
  arms.push(
    ResponseArm::builder()
      .ident(undocumented_ident)
      .status(StatusMatch::Default)
      .docs(vec!["Any response outside the documented set.".to_string()])
      .content(Vec::<ContentCase>::new())
      .catch_all(true)
      .build(),
  );

  Ok(arms)
}

fn pascal(label: &str) -> String {
  label
    .split_whitespace()
    .map(|word| {
      let mut chars = word.chars().filter(|c| c.is_ascii_alphanumeric());
      match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
        None => String::new(),
      }
    })
    .collect()
}
