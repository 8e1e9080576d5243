//! Token emission for data declarations: structs, enums, unions, aliases,
//! operation inputs and response sums.

use proc_macro2::TokenStream;
use quote::{format_ident, quote};

use super::{declaration_tokens, doc_tokens, flat_ident, member_ident, type_tokens, uses_stream, visibility_tokens};
use crate::compiler::{
  config::Config,
  ir::{
    AdditionalProperties, AnyOfDecl, FieldDecl, InputDecl, OneOfDecl, ResponseEnumDecl, StructDecl, TypeAliasDecl,
    UnionDispatch, ValueEnumDecl,
  },
};

/// Embeds a JSON wire value as a `serde_json::json!` literal.
fn json_value_tokens(value: &serde_json::Value) -> TokenStream {
  match value {
    serde_json::Value::Null => quote! { serde_json::Value::Null },
    serde_json::Value::Bool(b) => quote! { serde_json::json!(#b) },
    serde_json::Value::Number(n) => {
      if let Some(i) = n.as_i64() {
        quote! { serde_json::json!(#i) }
      } else {
        let f = n.as_f64().unwrap_or_default();
        quote! { serde_json::json!(#f) }
      }
    }
    serde_json::Value::String(s) => quote! { serde_json::json!(#s) },
    other => {
      // Composite wire values are rejected upstream; keep the arm total.
      let text = other.to_string();
      quote! { serde_json::from_str::<serde_json::Value>(#text).unwrap_or(serde_json::Value::Null) }
    }
  }
}

fn data_derives(streaming: bool) -> TokenStream {
  if streaming {
    quote! { #[derive(Debug)] }
  } else {
    quote! { #[derive(Debug, Clone, PartialEq)] }
  }
}

fn field_tokens(field: &FieldDecl, config: &Config) -> TokenStream {
  let vis = visibility_tokens(config.visibility);
  let ident = member_ident(&field.ident);
  let ty = type_tokens(&field.ty);
  let docs = doc_tokens(&field.docs);

  let plain = field.ident.strip_prefix("r#").unwrap_or(&field.ident);
  let rename = if plain == field.wire_name {
    quote! {}
  } else {
    let wire = &field.wire_name;
    quote! { #[serde(rename = #wire)] }
  };

  let presence = match (field.ty.optional, field.ty.nullable) {
    (true, true) => quote! {
      #[serde(default, skip_serializing_if = "Option::is_none", with = "oapic_support::double_option")]
    },
    (true, false) => quote! { #[serde(default, skip_serializing_if = "Option::is_none")] },
    _ => quote! {},
  };

  quote! {
    #docs
    #rename
    #presence
    #vis #ident: #ty
  }
}

pub(crate) fn struct_tokens(decl: &StructDecl, config: &Config) -> TokenStream {
  let vis = visibility_tokens(config.visibility);
  let name = flat_ident(&decl.name);
  let docs = doc_tokens(&decl.docs);
  let streaming = decl.fields.iter().any(|f| uses_stream(&f.ty));

  let mut fields: Vec<TokenStream> = decl.fields.iter().map(|f| field_tokens(f, config)).collect();

  let mut container_serde = quote! {};
  match &decl.additional {
    AdditionalProperties::Allowed => {}
    AdditionalProperties::Disallowed => {
      container_serde = quote! { #[serde(deny_unknown_fields)] };
    }
    AdditionalProperties::Any => {
      fields.push(quote! {
        /// Undeclared keys, preserved across decode and encode.
        #[serde(flatten)]
        #vis additional_properties: std::collections::BTreeMap<String, serde_json::Value>
      });
    }
    AdditionalProperties::Typed(value_ty) => {
      let value = type_tokens(value_ty);
      fields.push(quote! {
        /// Undeclared keys, preserved across decode and encode.
        #[serde(flatten)]
        #vis additional_properties: std::collections::BTreeMap<String, #value>
      });
    }
  }

  let derives = if streaming {
    data_derives(true)
  } else {
    quote! { #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)] }
  };
  let nested: Vec<TokenStream> = decl.nested.iter().map(|d| declaration_tokens(d, config)).collect();

  quote! {
    #docs
    #derives
    #container_serde
    #vis struct #name {
      #(#fields),*
    }
    #(#nested)*
  }
}

pub(crate) fn value_enum_tokens(decl: &ValueEnumDecl, config: &Config) -> TokenStream {
  let vis = visibility_tokens(config.visibility);
  let name = flat_ident(&decl.name);
  let name_text = name.to_string();
  let docs = doc_tokens(&decl.docs);

  let cases: Vec<proc_macro2::Ident> = decl.cases.iter().map(|c| member_ident(&c.ident)).collect();
  let wires: Vec<TokenStream> = decl.cases.iter().map(|c| json_value_tokens(&c.wire_value)).collect();

  quote! {
    #docs
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #vis enum #name {
      #(#cases),*
    }

    impl serde::Serialize for #name {
      fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
      where
        S: serde::Serializer,
      {
        let wire = match self {
          #(Self::#cases => #wires),*
        };
        wire.serialize(serializer)
      }
    }

    impl<'de> serde::Deserialize<'de> for #name {
      fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
      where
        D: serde::Deserializer<'de>,
      {
        let value = serde_json::Value::deserialize(deserializer)?;
        #(
          if value == #wires {
            return Ok(Self::#cases);
          }
        )*
        Err(serde::de::Error::custom(format!("value {value} is not a member of {}", #name_text)))
      }
    }
  }
}

pub(crate) fn one_of_tokens(decl: &OneOfDecl, config: &Config) -> TokenStream {
  let vis = visibility_tokens(config.visibility);
  let name = flat_ident(&decl.name);
  let name_text = name.to_string();
  let docs = doc_tokens(&decl.docs);

  let idents: Vec<proc_macro2::Ident> = decl.variants.iter().map(|v| member_ident(&v.ident)).collect();
  let types: Vec<TokenStream> = decl.variants.iter().map(|v| type_tokens(&v.ty)).collect();

  let deserialize_body = match &decl.dispatch {
    UnionDispatch::Discriminated { property, mapping } => {
      let arms: Vec<TokenStream> = mapping
        .iter()
        .map(|(wire, variant)| {
          let variant = member_ident(variant);
          quote! {
            #wire => serde_json::from_value(value).map(Self::#variant).map_err(serde::de::Error::custom),
          }
        })
        .collect();
      quote! {
        let value = serde_json::Value::deserialize(deserializer)?;
        let tag = value
          .get(#property)
          .and_then(serde_json::Value::as_str)
          .ok_or_else(|| serde::de::Error::custom(format!("missing discriminator `{}` in {}", #property, #name_text)))?
          .to_string();
        match tag.as_str() {
          #(#arms)*
          unknown => Err(serde::de::Error::custom(format!(
            "unknown discriminator value `{unknown}` for `{}` in {}",
            #property, #name_text
          ))),
        }
      }
    }
    UnionDispatch::Ordered => quote! {
      let value = serde_json::Value::deserialize(deserializer)?;
      #(
        if let Ok(variant) = serde_json::from_value(value.clone()) {
          return Ok(Self::#idents(variant));
        }
      )*
      Err(serde::de::Error::custom(format!("value matched no variant of {}", #name_text)))
    },
  };

  let nested: Vec<TokenStream> = decl.nested.iter().map(|d| declaration_tokens(d, config)).collect();

  quote! {
    #docs
    #[derive(Debug, Clone, PartialEq)]
    #vis enum #name {
      #(#idents(#types)),*
    }

    impl serde::Serialize for #name {
      fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
      where
        S: serde::Serializer,
      {
        match self {
          #(Self::#idents(inner) => inner.serialize(serializer)),*
        }
      }
    }

    impl<'de> serde::Deserialize<'de> for #name {
      fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
      where
        D: serde::Deserializer<'de>,
      {
        #deserialize_body
      }
    }

    #(#nested)*
  }
}

pub(crate) fn any_of_tokens(decl: &AnyOfDecl, config: &Config) -> TokenStream {
  let vis = visibility_tokens(config.visibility);
  let name = flat_ident(&decl.name);
  let name_text = name.to_string();
  let docs = doc_tokens(&decl.docs);

  let idents: Vec<proc_macro2::Ident> = decl.branches.iter().map(|b| member_ident(&b.ident)).collect();
  let types: Vec<TokenStream> = decl.branches.iter().map(|b| type_tokens(&b.ty)).collect();
  let fields: Vec<TokenStream> = idents
    .iter()
    .zip(&types)
    .map(|(ident, ty)| quote! { #vis #ident: #ty })
    .collect();

  let nested: Vec<TokenStream> = decl.nested.iter().map(|d| declaration_tokens(d, config)).collect();

  quote! {
    #docs
    #[derive(Debug, Clone, PartialEq, Default)]
    #vis struct #name {
      #(#fields),*
    }

    impl serde::Serialize for #name {
      fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
      where
        S: serde::Serializer,
      {
        let mut merged = serde_json::Map::new();
        let mut scalar: Option<serde_json::Value> = None;
        #(
          if let Some(slot) = &self.#idents {
            match serde_json::to_value(slot).map_err(serde::ser::Error::custom)? {
              serde_json::Value::Object(entries) => merged.extend(entries),
              other => scalar = Some(other),
            }
          }
        )*
        match scalar {
          Some(value) if merged.is_empty() => value.serialize(serializer),
          _ => serde_json::Value::Object(merged).serialize(serializer),
        }
      }
    }

    impl<'de> serde::Deserialize<'de> for #name {
      fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
      where
        D: serde::Deserializer<'de>,
      {
        let value = serde_json::Value::deserialize(deserializer)?;
        let decoded = Self {
          #(#idents: serde_json::from_value(value.clone()).ok()),*
        };
        let mut any = false;
        #(any |= decoded.#idents.is_some();)*
        if any {
          Ok(decoded)
        } else {
          Err(serde::de::Error::custom(format!("value matched no branch of {}", #name_text)))
        }
      }
    }

    #(#nested)*
  }
}

pub(crate) fn alias_tokens(decl: &TypeAliasDecl, config: &Config) -> TokenStream {
  let vis = visibility_tokens(config.visibility);
  let name = flat_ident(&decl.name);
  let docs = doc_tokens(&decl.docs);
  let target = type_tokens(&decl.target);

  quote! {
    #docs
    #vis type #name = #target;
  }
}

pub(crate) fn input_tokens(decl: &InputDecl, config: &Config) -> TokenStream {
  let vis = visibility_tokens(config.visibility);
  let name = flat_ident(&decl.name);
  let docs = doc_tokens(&decl.docs);
  let streaming = decl.body.iter().any(|case| uses_stream(&case.ty));

  let mut fields: Vec<TokenStream> = Vec::new();
  for parameter in &decl.parameters {
    let ident = member_ident(&parameter.ident);
    let ty = type_tokens(&parameter.ty);
    let location = parameter.location.to_string();
    let wire = &parameter.wire_name;
    let doc = format!(" The `{wire}` {location} parameter.");
    fields.push(quote! {
      #[doc = #doc]
      #vis #ident: #ty
    });
  }

  let mut body_enum = quote! {};
  match decl.body.len() {
    0 => {}
    1 => {
      let ty = type_tokens(&decl.body[0].ty);
      let ty = if decl.body_required { ty } else { quote! { Option<#ty> } };
      fields.push(quote! { #vis body: #ty });
    }
    _ => {
      let body_name = format_ident!("{name}Body");
      let cases: Vec<TokenStream> = decl
        .body
        .iter()
        .map(|case| {
          let ident = member_ident(&case.ident);
          let ty = type_tokens(&case.ty);
          let doc = format!(" `{}` payload.", case.content_type);
          quote! {
            #[doc = #doc]
            #ident(#ty)
          }
        })
        .collect();
      let derives = data_derives(streaming);
      body_enum = quote! {
        #derives
        #vis enum #body_name {
          #(#cases),*
        }
      };
      let ty = if decl.body_required {
        quote! { #body_name }
      } else {
        quote! { Option<#body_name> }
      };
      fields.push(quote! { #vis body: #ty });
    }
  }

  let derives = data_derives(streaming);
  let builder = if streaming { quote! {} } else { quote! { #[derive(bon::Builder)] } };
  let nested: Vec<TokenStream> = decl.nested.iter().map(|d| declaration_tokens(d, config)).collect();

  quote! {
    #docs
    #derives
    #builder
    #vis struct #name {
      #(#fields),*
    }
    #body_enum
    #(#nested)*
  }
}

pub(crate) fn response_enum_tokens(decl: &ResponseEnumDecl, config: &Config) -> TokenStream {
  let vis = visibility_tokens(config.visibility);
  let name = flat_ident(&decl.name);
  let docs = doc_tokens(&decl.docs);
  let streaming = decl
    .arms
    .iter()
    .any(|arm| arm.content.iter().any(|case| uses_stream(&case.ty)));

  let mut arms: Vec<TokenStream> = Vec::new();
  let mut content_enums: Vec<TokenStream> = Vec::new();
  for arm in &decl.arms {
    let ident = member_ident(&arm.ident);
    let arm_docs = doc_tokens(&arm.docs);
    if arm.catch_all {
      arms.push(quote! {
        #arm_docs
        #ident { status: u16, body: Vec<u8> }
      });
      continue;
    }
    match arm.content.len() {
      0 => arms.push(quote! {
        #arm_docs
        #ident
      }),
      1 => {
        let ty = type_tokens(&arm.content[0].ty);
        arms.push(quote! {
          #arm_docs
          #ident(#ty)
        });
      }
      _ => {
        let sum_name = format_ident!("{}{}Body", name, ident);
        let cases: Vec<TokenStream> = arm
          .content
          .iter()
          .map(|case| {
            let case_ident = member_ident(&case.ident);
            let ty = type_tokens(&case.ty);
            let doc = format!(" `{}` payload.", case.content_type);
            quote! {
              #[doc = #doc]
              #case_ident(#ty)
            }
          })
          .collect();
        let derives = data_derives(streaming);
        content_enums.push(quote! {
          /// Negotiated body alternatives for one response arm.
          #derives
          #vis enum #sum_name {
            #(#cases),*
          }
        });
        arms.push(quote! {
          #arm_docs
          #ident(#sum_name)
        });
      }
    }
  }

  let derives = data_derives(streaming);
  let nested: Vec<TokenStream> = decl.nested.iter().map(|d| declaration_tokens(d, config)).collect();

  quote! {
    #docs
    #derives
    #vis enum #name {
      #(#arms),*
    }
    #(#content_enums)*
    #(#nested)*
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::compiler::{
    ir::{ContentCase, ContentCategory, Primitive, ResponseArm, StatusMatch, TypeUsage, UnionVariant, ValueCase},
    naming::TypeName,
  };

  fn schema_name(short: &str) -> TypeName {
    TypeName::root("components", "components").child("schemas", "schemas").child(short, short)
  }

  fn config() -> Config {
    Config::default()
  }

  #[test]
  fn optional_nullable_fields_use_the_double_option_adapter() {
    let decl = StructDecl::builder()
      .name(schema_name("Pet"))
      .fields(vec![
        FieldDecl::builder()
          .ident("nickname".to_string())
          .wire_name("nickname".to_string())
          .ty(TypeUsage::primitive(Primitive::String).with_nullable().with_optional())
          .required(false)
          .build(),
      ])
      .build();

    let rendered = struct_tokens(&decl, &config()).to_string();
    assert!(rendered.contains("double_option"));
    assert!(rendered.contains("skip_serializing_if"));
  }

  #[test]
  fn renamed_fields_carry_a_serde_rename() {
    let decl = StructDecl::builder()
      .name(schema_name("Pet"))
      .fields(vec![
        FieldDecl::builder()
          .ident("r#type".to_string())
          .wire_name("type".to_string())
          .ty(TypeUsage::primitive(Primitive::String))
          .required(true)
          .build(),
      ])
      .build();

    let rendered = struct_tokens(&decl, &config()).to_string();
    assert!(rendered.contains("r#type"));
    assert!(!rendered.contains("rename"));
  }

  #[test]
  fn disallowed_additional_properties_deny_unknown_fields() {
    let decl = StructDecl::builder()
      .name(schema_name("Strict"))
      .additional(AdditionalProperties::Disallowed)
      .build();
    assert!(struct_tokens(&decl, &config()).to_string().contains("deny_unknown_fields"));
  }

  #[test]
  fn any_additional_properties_flatten_into_a_map() {
    let decl = StructDecl::builder()
      .name(schema_name("Open"))
      .additional(AdditionalProperties::Any)
      .build();
    let rendered = struct_tokens(&decl, &config()).to_string();
    assert!(rendered.contains("flatten"));
    assert!(rendered.contains("additional_properties"));
  }

  #[test]
  fn value_enums_encode_their_wire_literals() {
    let decl = ValueEnumDecl::builder()
      .name(schema_name("Status"))
      .cases(vec![
        ValueCase {
          ident: "Active".to_string(),
          wire_value: serde_json::json!("active"),
        },
        ValueCase {
          ident: "_42".to_string(),
          wire_value: serde_json::json!(42),
        },
      ])
      .build();

    let rendered = value_enum_tokens(&decl, &config()).to_string();
    assert!(rendered.contains("active"));
    assert!(rendered.contains("42"));
    assert!(rendered.contains("is not a member of"));
  }

  #[test]
  fn discriminated_unions_fail_on_unknown_tag_values() {
    let decl = OneOfDecl::builder()
      .name(schema_name("Shape"))
      .dispatch(UnionDispatch::Discriminated {
        property: "kind".to_string(),
        mapping: vec![("circle".to_string(), "Circle".to_string())],
      })
      .variants(vec![
        UnionVariant::builder()
          .ident("Circle".to_string())
          .ty(TypeUsage::named(schema_name("Circle")))
          .build(),
      ])
      .build();

    let rendered = one_of_tokens(&decl, &config()).to_string();
    assert!(rendered.contains("unknown discriminator value"));
    assert!(rendered.contains("missing discriminator"));
  }

  #[test]
  fn ordered_unions_try_variants_in_declared_order() {
    let decl = OneOfDecl::builder()
      .name(schema_name("IdOrName"))
      .dispatch(UnionDispatch::Ordered)
      .variants(vec![
        UnionVariant::builder()
          .ident("Integer".to_string())
          .ty(TypeUsage::primitive(Primitive::Integer))
          .build(),
        UnionVariant::builder()
          .ident("String".to_string())
          .ty(TypeUsage::primitive(Primitive::String))
          .build(),
      ])
      .build();

    let rendered = one_of_tokens(&decl, &config()).to_string();
    assert!(rendered.contains("Integer (i64) , String (String)"));
    assert!(rendered.contains("matched no variant"));
  }

  #[test]
  fn any_of_structs_require_at_least_one_branch() {
    let decl = AnyOfDecl::builder()
      .name(schema_name("Mixed"))
      .branches(vec![
        UnionVariant::builder()
          .ident("base".to_string())
          .ty(TypeUsage::named(schema_name("Base")).with_optional())
          .build(),
      ])
      .build();

    let rendered = any_of_tokens(&decl, &config()).to_string();
    assert!(rendered.contains("matched no branch"));
    assert!(rendered.contains("struct Mixed"));
  }

  #[test]
  fn catch_all_arms_carry_the_raw_status_and_body() {
    let decl = ResponseEnumDecl::builder()
      .name(TypeName::root("operations", "operations").child("list output", "ListOutput"))
      .arms(vec![
        ResponseArm::builder()
          .ident("Ok".to_string())
          .status(StatusMatch::Exact(200))
          .build(),
        ResponseArm::builder()
          .ident("Undocumented".to_string())
          .status(StatusMatch::Default)
          .catch_all(true)
          .build(),
      ])
      .build();

    let rendered = response_enum_tokens(&decl, &config()).to_string();
    assert!(rendered.contains("Undocumented { status : u16 , body : Vec < u8 > }"));
  }

  #[test]
  fn multi_content_arms_get_a_nested_body_sum() {
    let decl = ResponseEnumDecl::builder()
      .name(TypeName::root("operations", "operations").child("fetch output", "FetchOutput"))
      .arms(vec![
        ResponseArm::builder()
          .ident("Ok".to_string())
          .status(StatusMatch::Exact(200))
          .content(vec![
            ContentCase::builder()
              .ident("Json".to_string())
              .content_type("application/json".to_string())
              .category(ContentCategory::Json)
              .ty(TypeUsage::named(schema_name("Pet")))
              .build(),
            ContentCase::builder()
              .ident("Binary".to_string())
              .content_type("application/octet-stream".to_string())
              .category(ContentCategory::Binary)
              .ty(TypeUsage::of(crate::compiler::ir::TypeBase::Binary))
              .build(),
          ])
          .build(),
      ])
      .build();

    let rendered = response_enum_tokens(&decl, &config()).to_string();
    assert!(rendered.contains("enum FetchOutputOkBody"));
    assert!(rendered.contains("Ok (FetchOutputOkBody)"));
  }
}
