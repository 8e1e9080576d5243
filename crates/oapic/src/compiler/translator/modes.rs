//! The three terminal modes. All share schema and operation translation;
//! they differ only in which transport-facing declarations they add.

use super::{
  FileTranslator, TranslationContext, TranslationResult,
  operation::{TranslatedOperation, translate_operations},
  schema::SchemaTranslator,
};
use crate::compiler::{
  config::GeneratorMode,
  ir::{ApiTraitDecl, ClientDecl, Declaration, OperationSignature, ServerDecl, SourceFile},
  naming::identifiers::to_type_ident,
};

/// Schema components plus translated operations, shared by every mode.
fn translate_common(ctx: &mut TranslationContext<'_>) -> (Vec<Declaration>, Vec<TranslatedOperation>) {
  SchemaTranslator::new(ctx).translate_components();
  let operations = translate_operations(ctx);

  let mut declarations = ctx.take_component_decls();
  for op in &operations {
    declarations.push(Declaration::Input(op.input.clone()));
    declarations.push(Declaration::ResponseEnum(op.output.clone()));
  }
  (declarations, operations)
}

fn api_trait_ident(ctx: &TranslationContext<'_>) -> String {
  let title = &ctx.spec.info.title;
  let base = to_type_ident(title, &ctx.config.naming.table);
  format!("{base}Api")
}

fn api_trait(ident: &str, operations: &[TranslatedOperation]) -> ApiTraitDecl {
  let methods: Vec<OperationSignature> = operations.iter().map(|op| op.plan.signature.clone()).collect();
  ApiTraitDecl::builder()
    .ident(ident.to_string())
    .docs(vec!["One fallible async method per operation.".to_string()])
    .methods(methods)
    .build()
}

fn file_comment(ctx: &TranslationContext<'_>, mode: GeneratorMode) -> Vec<String> {
  vec![
    format!("Generated from `{}` v{} ({mode} mode).", ctx.spec.info.title, ctx.spec.info.version),
    "Do not edit by hand.".to_string(),
  ]
}

fn source_file(ctx: &TranslationContext<'_>, mode: GeneratorMode, declarations: Vec<Declaration>) -> SourceFile {
  SourceFile::builder()
    .name(format!("{mode}.rs"))
    .mode(mode)
    .comment(file_comment(ctx, mode))
    .imports(ctx.config.additional_imports.clone())
    .declarations(declarations)
    .build()
}

/// Data declarations and the operation protocol, no transport.
pub(crate) struct TypesTranslator;

impl FileTranslator for TypesTranslator {
  fn mode(&self) -> GeneratorMode {
    GeneratorMode::Types
  }

  fn translate_file(&self, ctx: &mut TranslationContext<'_>) -> TranslationResult<SourceFile> {
    let (mut declarations, operations) = translate_common(ctx);
    let trait_ident = api_trait_ident(ctx);
    declarations.push(Declaration::ApiTrait(api_trait(&trait_ident, &operations)));
    Ok(source_file(ctx, self.mode(), declarations))
  }
}

/// Everything in types mode plus a concrete client over an injected
/// transport.
pub(crate) struct ClientTranslator;

impl FileTranslator for ClientTranslator {
  fn mode(&self) -> GeneratorMode {
    GeneratorMode::Client
  }

  fn translate_file(&self, ctx: &mut TranslationContext<'_>) -> TranslationResult<SourceFile> {
    let (mut declarations, operations) = translate_common(ctx);
    let trait_ident = api_trait_ident(ctx);
    declarations.push(Declaration::ApiTrait(api_trait(&trait_ident, &operations)));
    declarations.push(Declaration::Client(
      ClientDecl::builder()
        .ident(format!("{trait_ident}Client"))
        .api_trait(trait_ident)
        .operations(operations.iter().map(|op| op.plan.clone()).collect::<Vec<_>>())
        .build(),
    ));
    Ok(source_file(ctx, self.mode(), declarations))
  }
}

/// Everything in types mode plus routing and extraction against an injected
/// server transport.
pub(crate) struct ServerTranslator;

impl FileTranslator for ServerTranslator {
  fn mode(&self) -> GeneratorMode {
    GeneratorMode::Server
  }

  fn translate_file(&self, ctx: &mut TranslationContext<'_>) -> TranslationResult<SourceFile> {
    let (mut declarations, operations) = translate_common(ctx);
    let trait_ident = api_trait_ident(ctx);
    declarations.push(Declaration::ApiTrait(api_trait(&trait_ident, &operations)));
    declarations.push(Declaration::Server(
      ServerDecl::builder()
        .ident(format!("{trait_ident}Router"))
        .api_trait(trait_ident)
        .operations(operations.iter().map(|op| op.plan.clone()).collect::<Vec<_>>())
        .build(),
    ));
    Ok(source_file(ctx, self.mode(), declarations))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::compiler::{
    config::Config, diagnostics::CollectingCollector, graph::SchemaGraph, translator::translator_for,
  };

  const PETSTORE: &str = r##"{
    "openapi": "3.1.0",
    "info": { "title": "Pet Store", "version": "2.0.0" },
    "paths": {
      "/pets": {
        "get": {
          "operationId": "listPets",
          "responses": {
            "200": {
              "description": "ok",
              "content": {
                "application/json": {
                  "schema": { "type": "array", "items": { "$ref": "#/components/schemas/Pet" } }
                }
              }
            }
          }
        }
      }
    },
    "components": {
      "schemas": {
        "Pet": {
          "type": "object",
          "required": ["name"],
          "properties": { "name": { "type": "string" } }
        }
      }
    }
  }"##;

  fn translate(mode: GeneratorMode) -> SourceFile {
    let spec = oas3::from_json(PETSTORE).unwrap();
    let mut graph = SchemaGraph::build(&spec);
    graph.detect_cycles();
    let config = Config::default();
    let collector = CollectingCollector::new();
    let mut ctx = TranslationContext::new(&spec, &graph, &config, &collector);
    translator_for(mode).translate_file(&mut ctx).unwrap()
  }

  #[test]
  fn types_mode_has_protocol_but_no_transport() {
    let file = translate(GeneratorMode::Types);
    assert_eq!(file.name, "types.rs");
    assert!(file.declarations.iter().any(|d| matches!(d, Declaration::ApiTrait(_))));
    assert!(!file.declarations.iter().any(|d| matches!(d, Declaration::Client(_))));
    assert!(!file.declarations.iter().any(|d| matches!(d, Declaration::Server(_))));
  }

  #[test]
  fn client_mode_adds_a_client_over_the_protocol() {
    let file = translate(GeneratorMode::Client);
    let client = file
      .declarations
      .iter()
      .find_map(|d| match d {
        Declaration::Client(c) => Some(c),
        _ => None,
      })
      .unwrap();
    assert_eq!(client.ident, "PetStoreApiClient");
    assert_eq!(client.api_trait, "PetStoreApi");
    assert_eq!(client.operations.len(), 1);
  }

  #[test]
  fn server_mode_adds_a_router_over_the_protocol() {
    let file = translate(GeneratorMode::Server);
    let server = file
      .declarations
      .iter()
      .find_map(|d| match d {
        Declaration::Server(s) => Some(s),
        _ => None,
      })
      .unwrap();
    assert_eq!(server.ident, "PetStoreApiRouter");
    assert_eq!(server.operations[0].signature.ident, "list_pets");
  }

  #[test]
  fn all_modes_share_component_declarations() {
    for mode in [GeneratorMode::Types, GeneratorMode::Client, GeneratorMode::Server] {
      let file = translate(mode);
      assert!(
        file
          .declarations
          .iter()
          .any(|d| d.type_name().is_some_and(|n| n.short_name() == "Pet")),
        "{mode} mode is missing the Pet component"
      );
    }
  }
}
