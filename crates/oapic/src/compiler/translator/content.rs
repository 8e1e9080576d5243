//! Content-type classification, body cases, multipart plans, and the
//! Accept header.

use mediatype::MediaType as ParsedMediaType;
use oas3::spec::{MediaType, ObjectOrReference, ObjectSchema};

use super::{
  TranslationResult,
  schema::{SchemaShape, SchemaTranslator, classify},
};
use crate::compiler::{
  diagnostics::{Diagnostic, DiagnosticMessage},
  ir::{
    AcceptEntry, ContentCase, ContentCategory, Declaration, MultipartPartPlan, PartContentSource, PartRepetition,
    Primitive, StreamFormat, TypeBase, TypeUsage,
  },
  naming::TypeName,
};

/// Structural kind of a content type, before any schema is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ContentKind {
  Json,
  UrlEncoded,
  Multipart,
  Text,
  Binary,
  Stream(StreamFormat),
}

impl ContentKind {
  /// Suffix distinguishing same-status cases with different transports.
  pub(crate) fn case_suffix(self) -> &'static str {
    match self {
      Self::Json => "",
      Self::UrlEncoded => "Form",
      Self::Multipart => "Multipart",
      Self::Text => "Text",
      Self::Binary => "Binary",
      Self::Stream(StreamFormat::EventStream) => "EventStream",
      Self::Stream(StreamFormat::JsonLines) => "JsonLines",
      Self::Stream(StreamFormat::JsonSeq) => "JsonSeq",
    }
  }
}

/// Classifies a media type string. Unparseable content types default to JSON,
/// matching the most common authoring mistake.
pub(crate) fn classify_content_type(content_type: &str) -> ContentKind {
  let Ok(media) = ParsedMediaType::parse(content_type) else {
    return ContentKind::Json;
  };

  let suffix = media.suffix.as_ref().map(mediatype::Name::as_str);

  match (media.ty.as_str(), media.subty.as_str(), suffix) {
    ("multipart", _, _) => ContentKind::Multipart,
    ("text", "event-stream", _) => ContentKind::Stream(StreamFormat::EventStream),
    ("application", "jsonl" | "x-ndjson" | "jsonlines", _) => ContentKind::Stream(StreamFormat::JsonLines),
    ("application", "json-seq", _) | (_, _, Some("json-seq")) => ContentKind::Stream(StreamFormat::JsonSeq),
    ("application", "x-www-form-urlencoded", _) => ContentKind::UrlEncoded,
    ("application", "json", _) | (_, _, Some("json")) => ContentKind::Json,
    ("image" | "audio" | "video", _, _) | ("application", "pdf" | "octet-stream", _) => ContentKind::Binary,
    ("application" | "text", _, _) => ContentKind::Text,
    _ => ContentKind::Json,
  }
}

/// Builds one body case for a (content type, media object) pair.
pub(crate) fn content_case(
  translator: &mut SchemaTranslator<'_, '_>,
  parent: &TypeName,
  label: &str,
  case_ident: String,
  content_type: &str,
  media: &MediaType,
  nested: &mut Vec<Declaration>,
) -> TranslationResult<ContentCase> {
  let kind = classify_content_type(content_type);

  let schema_usage = |translator: &mut SchemaTranslator<'_, '_>, nested: &mut Vec<Declaration>| {
    media
      .schema
      .as_ref()
      .map(|schema_ref| translator.usage_for(parent, label, schema_ref, nested))
      .transpose()
      .map(|usage| usage.unwrap_or_else(|| TypeUsage::of(TypeBase::JsonValue)))
  };

  let (category, ty) = match kind {
    ContentKind::Json => (ContentCategory::Json, schema_usage(translator, nested)?),
    ContentKind::UrlEncoded => (ContentCategory::UrlEncoded, schema_usage(translator, nested)?),
    ContentKind::Text => (ContentCategory::Text, TypeUsage::primitive(Primitive::String)),
    ContentKind::Binary => (ContentCategory::Binary, TypeUsage::of(TypeBase::Binary)),
    ContentKind::Stream(format) => {
      let element = schema_usage(translator, nested)?;
      let ty = TypeUsage::of(TypeBase::Stream {
        format,
        element: Box::new(element),
      });
      (ContentCategory::Stream(format), ty)
    }
    ContentKind::Multipart => {
      let parts = multipart_plans(translator, parent, label, media, nested)?;
      let ty = schema_usage(translator, nested)?;
      (ContentCategory::Multipart(parts), ty)
    }
  };

  Ok(
    ContentCase::builder()
      .ident(case_ident)
      .content_type(content_type.to_string())
      .category(category)
      .ty(ty)
      .build(),
  )
}

/// Derives per-part plans from a multipart media object.
///
/// Ambiguous property shapes are diagnosed and the part is skipped rather
/// than failing the whole body.
pub(crate) fn multipart_plans(
  translator: &mut SchemaTranslator<'_, '_>,
  parent: &TypeName,
  label: &str,
  media: &MediaType,
  nested: &mut Vec<Declaration>,
) -> TranslationResult<Vec<MultipartPartPlan>> {
  let Some(schema_ref) = media.schema.as_ref() else {
    return Ok(Vec::new());
  };
  let schema = match schema_ref {
    ObjectOrReference::Object(inline) => inline.clone(),
    ObjectOrReference::Ref { .. } => schema_ref.resolve(translator.context().spec)?,
  };

  let part_scope = format!("{}::{}::parts", parent.safe_path(), label);
  let mut plans = Vec::new();

  for (prop_name, prop_ref) in &schema.properties {
    let prop_schema = match prop_ref {
      ObjectOrReference::Object(inline) => inline.clone(),
      ObjectOrReference::Ref { .. } => prop_ref.resolve(translator.context().spec)?,
    };

    let (repetition, element) = match classify(&prop_schema, None) {
      SchemaShape::Array => {
        let element = prop_schema.items.as_ref().and_then(|boxed| match boxed.as_ref() {
          oas3::spec::Schema::Object(obj_ref) => Some(obj_ref.as_ref().clone()),
          oas3::spec::Schema::Boolean(_) => None,
        });
        match element {
          Some(element_ref) => {
            let resolved = match &element_ref {
              ObjectOrReference::Object(inline) => inline.clone(),
              ObjectOrReference::Ref { .. } => element_ref.resolve(translator.context().spec)?,
            };
            (PartRepetition::Repeated, resolved)
          }
          None => {
            emit_ambiguous(translator, prop_name, "array items carry no schema");
            continue;
          }
        }
      }
      _ => (PartRepetition::Single, prop_schema.clone()),
    };

    let encoding = media.encoding.get(prop_name);
    let source = match encoding.and_then(|e| e.content_type.clone()) {
      Some(explicit) => PartContentSource::Explicit(explicit),
      None => match classify(&element, None) {
        SchemaShape::Object | SchemaShape::AllOf(_) | SchemaShape::OneOf(_) | SchemaShape::AnyOf(_) => {
          PartContentSource::InferredStructured
        }
        SchemaShape::Primitive(_) | SchemaShape::Enum(_) => PartContentSource::InferredRaw,
        SchemaShape::Array => {
          emit_ambiguous(translator, prop_name, "nested arrays have no content-type inference rule");
          continue;
        }
        SchemaShape::Untyped => {
          emit_ambiguous(translator, prop_name, "schema carries no type information");
          continue;
        }
        SchemaShape::Overridden(_) => unreachable!("overrides apply to named components only"),
      },
    };

    let headers: Vec<String> = encoding.map(|e| e.headers.keys().cloned().collect()).unwrap_or_default();

    let ident = translator.context().registry.member_name(prop_name, &part_scope).safe;
    let mut ty = translator.usage_for(parent, prop_name, prop_ref, nested)?;
    if !schema.required.iter().any(|r| r == prop_name) {
      ty = ty.with_optional();
    }

    plans.push(
      MultipartPartPlan::builder()
        .ident(ident)
        .wire_name(prop_name.clone())
        .repetition(repetition)
        .source(source)
        .ty(ty)
        .headers(headers)
        .build(),
    );
  }

  Ok(plans)
}

fn emit_ambiguous(translator: &mut SchemaTranslator<'_, '_>, property: &str, detail: &str) {
  translator.context().collector.emit(Diagnostic::warning(DiagnosticMessage::AmbiguousMultipartPart {
    property: property.to_string(),
    detail: detail.to_string(),
  }));
}

/// Accept-header entries for an operation's documented response content
/// types. Only emitted when there is a real choice to negotiate.
pub(crate) fn accept_entries(content_types: &[String]) -> Vec<AcceptEntry> {
  if content_types.len() < 2 {
    return Vec::new();
  }
  content_types
    .iter()
    .map(|content_type| AcceptEntry {
      content_type: content_type.clone(),
      quality: None,
    })
    .collect()
}
