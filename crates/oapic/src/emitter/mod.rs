//! Renders the declaration tree into Rust source text.
//!
//! Token assembly with `quote`, formatting through `syn` + `prettyplease`.
//! The translators decide everything semantic; this layer only spells it.

pub(crate) mod api;
pub(crate) mod types;

use anyhow::Context;
use proc_macro2::TokenStream;
use quote::{format_ident, quote};

use crate::compiler::{
  config::{Config, Visibility},
  ir::{Declaration, SourceFile, StreamFormat, TypeBase, TypeUsage},
  naming::TypeName,
};

pub(crate) fn visibility_tokens(visibility: Visibility) -> TokenStream {
  match visibility {
    Visibility::Public => quote! { pub },
    Visibility::Crate => quote! { pub(crate) },
    Visibility::Private => quote! {},
  }
}

/// Namespace components stripped when flattening a hierarchical name into a
/// single declaration identifier.
const NAMESPACE_ROOTS: &[&str] = &[
  "components",
  "schemas",
  "parameters",
  "request_bodies",
  "responses",
  "headers",
  "operations",
];

/// Flattens a hierarchical type name into the emitted identifier.
pub(crate) fn flat_ident(name: &TypeName) -> proc_macro2::Ident {
  let mut parts: Vec<&str> = Vec::new();
  for component in name.components() {
    if parts.is_empty() && NAMESPACE_ROOTS.contains(&component.safe.as_str()) {
      continue;
    }
    parts.push(component.safe.as_str());
  }
  let joined = parts.join("");
  let cleaned = joined.strip_prefix("r#").unwrap_or(&joined);
  format_ident!("{cleaned}")
}

/// Builds a member identifier, honoring `r#` escapes from the name registry.
/// `format_ident!` rejects raw-identifier strings, so those go through
/// `Ident::new_raw`.
pub(crate) fn member_ident(safe: &str) -> proc_macro2::Ident {
  match safe.strip_prefix("r#") {
    Some(raw) => proc_macro2::Ident::new_raw(raw, proc_macro2::Span::call_site()),
    None => format_ident!("{safe}"),
  }
}

/// Renders a type usage at a reference site.
pub(crate) fn type_tokens(usage: &TypeUsage) -> TokenStream {
  let mut tokens = base_tokens(&usage.base);
  if usage.boxed {
    tokens = quote! { Box<#tokens> };
  }
  if usage.array {
    tokens = quote! { Vec<#tokens> };
  }
  if usage.nullable {
    tokens = quote! { Option<#tokens> };
  }
  if usage.optional {
    tokens = quote! { Option<#tokens> };
  }
  tokens
}

pub(crate) fn base_tokens(base: &TypeBase) -> TokenStream {
  match base {
    TypeBase::Primitive(primitive) => {
      let ident = format_ident!("{}", primitive.to_string());
      quote! { #ident }
    }
    TypeBase::Named(name) => {
      let ident = flat_ident(name);
      quote! { #ident }
    }
    TypeBase::External(path) => syn::parse_str::<syn::Type>(path)
      .map(|ty| quote! { #ty })
      .unwrap_or_else(|_| quote! { serde_json::Value }),
    TypeBase::JsonValue => quote! { serde_json::Value },
    TypeBase::Binary => quote! { Vec<u8> },
    TypeBase::Stream { format, element } => {
      let element = type_tokens(element);
      let error = match format {
        StreamFormat::EventStream => quote! { oapic_support::EventStreamError<std::io::Error> },
        StreamFormat::JsonLines | StreamFormat::JsonSeq => quote! { oapic_support::JsonStreamError<std::io::Error> },
      };
      quote! {
        oapic_support::StreamingBody<futures::stream::BoxStream<'static, Result<#element, #error>>>
      }
    }
  }
}

/// True when the usage (transitively) carries a stream, which rules out
/// derived `Clone`/`PartialEq`/serde.
pub(crate) fn uses_stream(usage: &TypeUsage) -> bool {
  matches!(usage.base, TypeBase::Stream { .. })
}

pub(crate) fn doc_tokens(lines: &[String]) -> TokenStream {
  let docs = lines.iter().map(|line| {
    let text = format!(" {line}");
    quote! { #[doc = #text] }
  });
  quote! { #(#docs)* }
}

pub(crate) fn declaration_tokens(decl: &Declaration, config: &Config) -> TokenStream {
  match decl {
    Declaration::Struct(d) => types::struct_tokens(d, config),
    Declaration::ValueEnum(d) => types::value_enum_tokens(d, config),
    Declaration::OneOf(d) => types::one_of_tokens(d, config),
    Declaration::AnyOf(d) => types::any_of_tokens(d, config),
    Declaration::TypeAlias(d) => types::alias_tokens(d, config),
    Declaration::Input(d) => types::input_tokens(d, config),
    Declaration::ResponseEnum(d) => types::response_enum_tokens(d, config),
    Declaration::ApiTrait(d) => api::trait_tokens(d, config),
    Declaration::Client(d) => api::client_tokens(d, config),
    Declaration::Server(d) => api::server_tokens(d, config),
  }
}

/// Renders one generated file to formatted source text.
pub fn render(file: &SourceFile, config: &Config) -> anyhow::Result<String> {
  let imports: Vec<TokenStream> = file
    .imports
    .iter()
    .filter_map(|import| syn::parse_str::<syn::Path>(import).ok())
    .map(|path| quote! { use #path; })
    .collect();

  let declarations: Vec<TokenStream> = file.declarations.iter().map(|d| declaration_tokens(d, config)).collect();

  let tokens = quote! {
    #(#imports)*
    #(#declarations)*
  };

  let parsed = syn::parse2(tokens).context("generated tokens are not a valid file")?;
  let formatted = prettyplease::unparse(&parsed);

  let mut out = String::new();
  for line in &file.comment {
    out.push_str("//! ");
    out.push_str(line);
    out.push('\n');
  }
  if !file.comment.is_empty() {
    out.push('\n');
  }
  out.push_str(&formatted);
  Ok(out)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::compiler::ir::Primitive;

  fn name(short: &str) -> TypeName {
    TypeName::root("components", "components").child("schemas", "schemas").child(short, short)
  }

  #[test]
  fn flat_idents_strip_namespace_roots() {
    assert_eq!(flat_ident(&name("Pet")).to_string(), "Pet");

    let nested = name("Order").child("shipping", "Shipping");
    assert_eq!(flat_ident(&nested).to_string(), "OrderShipping");
  }

  #[test]
  fn wrapping_order_is_box_vec_null_option() {
    let usage = TypeUsage::named(name("Pet")).with_boxed().with_array().with_nullable().with_optional();
    assert_eq!(type_tokens(&usage).to_string(), "Option < Option < Vec < Box < Pet > > > >");
  }

  #[test]
  fn member_idents_round_trip_raw_escapes() {
    assert_eq!(member_ident("r#type").to_string(), "r#type");
    assert_eq!(member_ident("pet_id").to_string(), "pet_id");
  }

  #[test]
  fn primitives_render_directly() {
    let usage = TypeUsage::primitive(Primitive::Integer);
    assert_eq!(type_tokens(&usage).to_string(), "i64");
  }

  #[test]
  fn stream_usages_render_through_the_support_runtime() {
    let usage = TypeUsage::of(TypeBase::Stream {
      format: StreamFormat::JsonLines,
      element: Box::new(TypeUsage::named(name("Event"))),
    });
    let rendered = type_tokens(&usage).to_string();
    assert!(rendered.contains("StreamingBody"));
    assert!(rendered.contains("JsonStreamError"));
  }
}
