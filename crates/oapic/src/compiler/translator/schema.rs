//! Schema-to-declaration translation.
//!
//! Dispatch is by [`SchemaShape`], a closed classification matched in a fixed
//! priority order: configured override, `allOf`, `oneOf`, `anyOf`, `enum`,
//! object, array, primitive. Component translations are memoized in the
//! context so every reference site resolves to the identical type name.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Context, bail};
use oas3::spec::{Discriminator, ObjectOrReference, ObjectSchema, Schema, SchemaType, SchemaTypeSet};

use super::{TranslationContext, TranslationResult};
use crate::compiler::{
  config::TypeOverride,
  diagnostics::{Diagnostic, DiagnosticMessage},
  graph::schema_ref_key_of,
  ir::{
    AdditionalProperties, AnyOfDecl, Declaration, FieldDecl, OneOfDecl, Primitive, StructDecl, TypeAliasDecl, TypeBase,
    TypeUsage, UnionDispatch, UnionVariant, ValueCase, ValueEnumDecl,
  },
  naming::{ComponentKind, TypeName, discriminator_case},
};

/// Closed classification of a schema's shape. First match wins; every
/// variant carries exactly what its translation needs.
#[derive(Debug)]
pub(crate) enum SchemaShape<'s> {
  Overridden(&'s TypeOverride),
  AllOf(&'s [ObjectOrReference<ObjectSchema>]),
  OneOf(&'s [ObjectOrReference<ObjectSchema>]),
  AnyOf(&'s [ObjectOrReference<ObjectSchema>]),
  Enum(&'s [serde_json::Value]),
  Object,
  Array,
  Primitive(Primitive),
  /// No type information at all: an arbitrary JSON value.
  Untyped,
}

/// Classifies a schema, honoring a configured override first.
pub(crate) fn classify<'s>(schema: &'s ObjectSchema, type_override: Option<&'s TypeOverride>) -> SchemaShape<'s> {
  if let Some(over) = type_override {
    return SchemaShape::Overridden(over);
  }
  if !schema.all_of.is_empty() {
    return SchemaShape::AllOf(&schema.all_of);
  }
  if !schema.one_of.is_empty() {
    return SchemaShape::OneOf(&schema.one_of);
  }
  if !schema.any_of.is_empty() {
    return SchemaShape::AnyOf(&schema.any_of);
  }
  if !schema.enum_values.is_empty() {
    return SchemaShape::Enum(&schema.enum_values);
  }

  match effective_type(schema) {
    Some(SchemaType::Object) => SchemaShape::Object,
    Some(SchemaType::Array) => SchemaShape::Array,
    Some(SchemaType::String) => SchemaShape::Primitive(Primitive::String),
    Some(SchemaType::Integer) => SchemaShape::Primitive(Primitive::Integer),
    Some(SchemaType::Number) => SchemaShape::Primitive(Primitive::Number),
    Some(SchemaType::Boolean) => SchemaShape::Primitive(Primitive::Boolean),
    Some(SchemaType::Null) | None => {
      if !schema.properties.is_empty() {
        SchemaShape::Object
      } else {
        SchemaShape::Untyped
      }
    }
  }
}

/// The non-null type of a schema, treating `[T, null]` as nullable `T`.
fn effective_type(schema: &ObjectSchema) -> Option<SchemaType> {
  match schema.schema_type.as_ref()? {
    SchemaTypeSet::Single(single) => Some(*single),
    SchemaTypeSet::Multiple(types) => types.iter().copied().find(|t| *t != SchemaType::Null),
  }
}

/// True when the schema admits an explicit null alongside its type.
pub(crate) fn is_nullable(schema: &ObjectSchema) -> bool {
  match schema.schema_type.as_ref() {
    Some(SchemaTypeSet::Multiple(types)) => types.contains(&SchemaType::Null),
    _ => false,
  }
}

pub(crate) struct SchemaTranslator<'a, 'c> {
  ctx: &'c mut TranslationContext<'a>,
}

impl<'a, 'c> SchemaTranslator<'a, 'c> {
  pub(crate) fn new(ctx: &'c mut TranslationContext<'a>) -> Self {
    Self { ctx }
  }

  pub(crate) fn context(&mut self) -> &mut TranslationContext<'a> {
    self.ctx
  }

  /// Translates every component schema into the context's declaration list.
  ///
  /// Per-schema failures are diagnosed and skipped so one unsupported shape
  /// never aborts the rest of the document.
  pub(crate) fn translate_components(&mut self) {
    let keys: Vec<String> = self.ctx.graph.schemas().keys().cloned().collect();
    for key in keys {
      if let Err(err) = self.component_usage(&key) {
        self.ctx.collector.emit(
          Diagnostic::warning(DiagnosticMessage::SchemaTranslationFailed {
            schema_key: key.clone(),
            detail: format!("{err:#}"),
          })
          .with_context("schema", key),
        );
      }
    }
    self.ctx.flush_naming_diagnostics();
  }

  /// Memoized translation of one named component schema.
  pub(crate) fn component_usage(&mut self, component_key: &str) -> TranslationResult<TypeUsage> {
    if let Some(usage) = self.ctx.memoized(component_key) {
      return Ok(usage);
    }

    if let Some(over) = self.ctx.config.override_for(component_key) {
      let usage = TypeUsage::of(TypeBase::External(over.rust_path.clone()));
      self.ctx.memoize(component_key, usage.clone());
      return Ok(usage);
    }

    let name = self.ctx.registry.type_name(component_key, ComponentKind::Schema);
    let mut usage = TypeUsage::named(name.clone());
    if self.ctx.graph.is_cyclic(component_key) {
      usage = usage.with_boxed();
    }
    // Memoize before descending so self-referential schemas terminate.
    self.ctx.memoize(component_key, usage.clone());

    let graph = self.ctx.graph;
    let Some(schema) = graph.schemas().get(component_key) else {
      bail!("component schema `{component_key}` is not in the document");
    };

    let decl = self.component_declaration(&name, schema)?;
    self.ctx.push_component_decl(decl);
    Ok(usage)
  }

  fn component_declaration(&mut self, name: &TypeName, schema: &ObjectSchema) -> TranslationResult<Declaration> {
    match classify(schema, None) {
      SchemaShape::Overridden(_) => unreachable!("overrides are handled before naming"),
      SchemaShape::AllOf(branches) => {
        let merged = self.merge_all_of(schema, branches)?;
        Ok(Declaration::Struct(self.build_struct(name, &merged)?))
      }
      SchemaShape::OneOf(branches) => Ok(Declaration::OneOf(self.build_one_of(name, schema, branches)?)),
      SchemaShape::AnyOf(branches) => Ok(Declaration::AnyOf(self.build_any_of(name, schema, branches)?)),
      SchemaShape::Enum(values) => Ok(Declaration::ValueEnum(self.build_value_enum(name, schema, values)?)),
      SchemaShape::Object => Ok(Declaration::Struct(self.build_struct(name, schema)?)),
      SchemaShape::Array | SchemaShape::Primitive(_) | SchemaShape::Untyped => {
        // Named aliases keep primitive/array components addressable.
        let mut nested = Vec::new();
        let target = self.inline_usage(name, "item", schema, &mut nested)?;
        for hoisted in nested {
          self.ctx.push_component_decl(hoisted);
        }
        Ok(Declaration::TypeAlias(
          TypeAliasDecl::builder().name(name.clone()).docs(doc_lines(schema)).target(target).build(),
        ))
      }
    }
  }

  /// Resolves a schema reference-or-inline at a property/content site.
  ///
  /// References resolve through the component memo; inline objects, enums,
  /// and unions are hoisted as declarations named under `parent` and pushed
  /// into `nested`.
  pub(crate) fn usage_for(
    &mut self,
    parent: &TypeName,
    label: &str,
    obj_ref: &ObjectOrReference<ObjectSchema>,
    nested: &mut Vec<Declaration>,
  ) -> TranslationResult<TypeUsage> {
    match obj_ref {
      ObjectOrReference::Ref { ref_path, .. } => {
        let Some(key) = schema_ref_key_of(obj_ref) else {
          bail!("reference `{ref_path}` does not point into components/schemas");
        };
        self.component_usage(&key)
      }
      ObjectOrReference::Object(inline) => self.inline_usage(parent, label, inline, nested),
    }
  }

  fn inline_usage(
    &mut self,
    parent: &TypeName,
    label: &str,
    schema: &ObjectSchema,
    nested: &mut Vec<Declaration>,
  ) -> TranslationResult<TypeUsage> {
    let usage = match classify(schema, None) {
      SchemaShape::Overridden(_) => unreachable!("overrides apply to named components only"),
      SchemaShape::Primitive(primitive) => TypeUsage::primitive(primitive),
      SchemaShape::Untyped => TypeUsage::of(TypeBase::JsonValue),
      SchemaShape::Array => {
        let items = schema.items.as_ref().and_then(|boxed| match boxed.as_ref() {
          Schema::Object(obj_ref) => Some(obj_ref.as_ref().clone()),
          Schema::Boolean(_) => None,
        });
        match items {
          Some(items_ref) => self.usage_for(parent, label, &items_ref, nested)?.with_array(),
          None => TypeUsage::of(TypeBase::JsonValue).with_array(),
        }
      }
      SchemaShape::AllOf(branches) => {
        let child = self.ctx.registry.child_type_name(parent, label);
        let branches = branches.to_vec();
        let merged = self.merge_all_of(schema, &branches)?;
        let decl = self.build_struct(&child, &merged)?;
        nested.push(Declaration::Struct(decl));
        TypeUsage::named(child)
      }
      SchemaShape::OneOf(branches) => {
        let child = self.ctx.registry.child_type_name(parent, label);
        let branches = branches.to_vec();
        let decl = self.build_one_of(&child, schema, &branches)?;
        nested.push(Declaration::OneOf(decl));
        TypeUsage::named(child)
      }
      SchemaShape::AnyOf(branches) => {
        let child = self.ctx.registry.child_type_name(parent, label);
        let branches = branches.to_vec();
        let decl = self.build_any_of(&child, schema, &branches)?;
        nested.push(Declaration::AnyOf(decl));
        TypeUsage::named(child)
      }
      SchemaShape::Enum(values) => {
        let child = self.ctx.registry.child_type_name(parent, label);
        let values = values.to_vec();
        let decl = self.build_value_enum(&child, schema, &values)?;
        nested.push(Declaration::ValueEnum(decl));
        TypeUsage::named(child)
      }
      SchemaShape::Object => {
        let child = self.ctx.registry.child_type_name(parent, label);
        let decl = self.build_struct(&child, schema)?;
        nested.push(Declaration::Struct(decl));
        TypeUsage::named(child)
      }
    };

    if is_nullable(schema) {
      if self.ctx.config.nullable_as_optional {
        Ok(usage.with_optional())
      } else {
        Ok(usage.with_nullable())
      }
    } else {
      Ok(usage)
    }
  }

  /// Flattens `allOf` branches into one object schema: property union, with
  /// every branch's required set enforced.
  fn merge_all_of(
    &mut self,
    schema: &ObjectSchema,
    branches: &[ObjectOrReference<ObjectSchema>],
  ) -> TranslationResult<ObjectSchema> {
    let mut properties = BTreeMap::new();
    let mut required = BTreeSet::new();
    let mut discriminator: Option<Discriminator> = None;
    let mut additional = None;

    for branch in branches {
      let resolved = branch.resolve(self.ctx.spec).context("resolving allOf branch")?;
      let flat = if resolved.all_of.is_empty() {
        resolved
      } else {
        let inner = resolved.all_of.clone();
        self.merge_all_of(&resolved, &inner)?
      };
      properties.extend(flat.properties.clone());
      required.extend(flat.required.iter().cloned());
      if discriminator.is_none() {
        discriminator = flat.discriminator.clone();
      }
      if additional.is_none() {
        additional = flat.additional_properties.clone();
      }
    }

    // Sibling keys on the allOf schema itself participate too.
    properties.extend(schema.properties.clone());
    required.extend(schema.required.iter().cloned());

    let mut merged = schema.clone();
    merged.all_of.clear();
    merged.properties = properties;
    merged.required = required.into_iter().collect();
    if merged.discriminator.is_none() {
      merged.discriminator = discriminator;
    }
    if merged.additional_properties.is_none() {
      merged.additional_properties = additional;
    }
    Ok(merged)
  }

  fn build_struct(&mut self, name: &TypeName, schema: &ObjectSchema) -> TranslationResult<StructDecl> {
    let member_scope = format!("{}::members", name.safe_path());
    let mut fields = Vec::new();
    let mut nested = Vec::new();

    for (prop_name, prop_ref) in &schema.properties {
      let required = schema.required.iter().any(|r| r == prop_name);
      let member = self.ctx.registry.member_name(prop_name, &member_scope);
      let mut ty = self.usage_for(name, prop_name, prop_ref, &mut nested)?;
      if !required {
        ty = ty.with_optional();
      }

      let docs = match prop_ref {
        ObjectOrReference::Object(inline) => doc_lines(inline),
        ObjectOrReference::Ref { .. } => Vec::new(),
      };

      fields.push(
        FieldDecl::builder()
          .ident(member.safe)
          .wire_name(prop_name.clone())
          .ty(ty)
          .required(required)
          .docs(docs)
          .build(),
      );
    }

    let additional = match schema.additional_properties.as_ref() {
      None => AdditionalProperties::Allowed,
      Some(Schema::Boolean(flag)) => {
        if flag.0 {
          AdditionalProperties::Any
        } else {
          AdditionalProperties::Disallowed
        }
      }
      Some(Schema::Object(obj_ref)) => {
        let value_ty = self.usage_for(name, "additional_properties", obj_ref, &mut nested)?;
        AdditionalProperties::Typed(Box::new(value_ty))
      }
    };

    Ok(
      StructDecl::builder()
        .name(name.clone())
        .docs(doc_lines(schema))
        .fields(fields)
        .additional(additional)
        .nested(nested)
        .build(),
    )
  }

  fn build_value_enum(
    &mut self,
    name: &TypeName,
    schema: &ObjectSchema,
    values: &[serde_json::Value],
  ) -> TranslationResult<ValueEnumDecl> {
    let case_scope = format!("{}::cases", name.safe_path());
    let mut cases = Vec::new();

    for value in values {
      let raw = match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Null => "null".to_string(),
        other => bail!("unsupported enum value `{other}` in `{}`", name.raw_path()),
      };
      let issued = self.ctx.registry.case_name(&raw, &case_scope);
      cases.push(ValueCase {
        ident: issued.safe,
        wire_value: value.clone(),
      });
    }

    Ok(ValueEnumDecl::builder().name(name.clone()).docs(doc_lines(schema)).cases(cases).build())
  }

  fn build_one_of(
    &mut self,
    name: &TypeName,
    schema: &ObjectSchema,
    branches: &[ObjectOrReference<ObjectSchema>],
  ) -> TranslationResult<OneOfDecl> {
    let variant_scope = format!("{}::variants", name.safe_path());
    let mapping = schema.discriminator.as_ref().and_then(|d| d.mapping.as_ref());

    let mut variants = Vec::new();
    let mut nested = Vec::new();
    let mut wire_mapping = Vec::new();

    for (index, branch) in branches.iter().enumerate() {
      let (ident, ty) = match branch {
        ObjectOrReference::Ref { .. } => {
          let Some(key) = schema_ref_key_of(branch) else {
            bail!("union branch in `{}` is not a schema reference", name.raw_path());
          };
          let mapping_key = mapping.and_then(|m| {
            m.iter()
              .find(|(_, target)| crate::compiler::graph::schema_ref_key(target).as_deref() == Some(key.as_str()))
              .map(|(wire, _)| wire.as_str())
          });
          let (wire, decl_name) = discriminator_case(mapping_key, &key);
          let proposal = type_proposal(&decl_name, self.ctx);
          let issued = self.ctx.registry.unique_name(&proposal, &variant_scope);
          if schema.discriminator.is_some() {
            wire_mapping.push((wire, issued.safe.clone()));
          }
          (issued.safe, self.component_usage(&key)?)
        }
        ObjectOrReference::Object(inline) => {
          let proposal = infer_variant_label(inline, index);
          let issued = self.ctx.registry.unique_name(&proposal, &variant_scope);
          let ty = self.inline_usage(name, &issued.safe, inline, &mut nested)?;
          (issued.safe, ty)
        }
      };
      variants.push(UnionVariant::builder().ident(ident).ty(ty).build());
    }

    let dispatch = match schema.discriminator.as_ref() {
      Some(disc) => UnionDispatch::Discriminated {
        property: disc.property_name.clone(),
        mapping: wire_mapping,
      },
      None => UnionDispatch::Ordered,
    };

    Ok(
      OneOfDecl::builder()
        .name(name.clone())
        .docs(doc_lines(schema))
        .dispatch(dispatch)
        .variants(variants)
        .nested(nested)
        .build(),
    )
  }

  fn build_any_of(
    &mut self,
    name: &TypeName,
    schema: &ObjectSchema,
    branches: &[ObjectOrReference<ObjectSchema>],
  ) -> TranslationResult<AnyOfDecl> {
    let slot_scope = format!("{}::slots", name.safe_path());
    let mut slots = Vec::new();
    let mut nested = Vec::new();

    for (index, branch) in branches.iter().enumerate() {
      let label = match branch {
        ObjectOrReference::Ref { .. } => schema_ref_key_of(branch)
          .unwrap_or_else(|| format!("variant{index}")),
        ObjectOrReference::Object(inline) => infer_variant_label(inline, index),
      };
      let issued = self.ctx.registry.member_name(&label, &slot_scope);
      let ty = self.usage_for(name, &label, branch, &mut nested)?.with_optional();
      slots.push(UnionVariant::builder().ident(issued.safe).ty(ty).build());
    }

    Ok(
      AnyOfDecl::builder()
        .name(name.clone())
        .docs(doc_lines(schema))
        .branches(slots)
        .nested(nested)
        .build(),
    )
  }
}

fn type_proposal(raw: &str, ctx: &TranslationContext<'_>) -> String {
  crate::compiler::naming::identifiers::to_type_ident_with(raw, ctx.config.naming.strategy, &ctx.config.naming.table)
}

/// Variant label for an inline union branch without a usable name.
fn infer_variant_label(schema: &ObjectSchema, index: usize) -> String {
  if !schema.enum_values.is_empty() {
    return "Enum".to_string();
  }
  match schema.schema_type.as_ref() {
    Some(SchemaTypeSet::Single(single)) => match single {
      SchemaType::String => "String".to_string(),
      SchemaType::Number => "Number".to_string(),
      SchemaType::Integer => "Integer".to_string(),
      SchemaType::Boolean => "Boolean".to_string(),
      SchemaType::Array => "Array".to_string(),
      SchemaType::Object => "Object".to_string(),
      SchemaType::Null => "Null".to_string(),
    },
    Some(SchemaTypeSet::Multiple(_)) => "Mixed".to_string(),
    None => format!("Variant{index}"),
  }
}

fn doc_lines(schema: &ObjectSchema) -> Vec<String> {
  schema
    .description
    .as_deref()
    .map(|text| text.lines().map(str::to_owned).collect())
    .unwrap_or_default()
}
