//! The structured source representation.
//!
//! A data-only declaration tree: the translators build it, the emitter
//! renders it. Nothing here owns behavior beyond small accessors, so the
//! whole tree is comparable in tests and stable across runs.

use http::Method;

use crate::compiler::{config::GeneratorMode, naming::TypeName};

/// One generated file for one mode.
#[derive(Debug, Clone, PartialEq, bon::Builder)]
pub struct SourceFile {
  pub name: String,
  pub mode: GeneratorMode,
  /// Top-of-file comment lines, without comment markers.
  #[builder(default)]
  pub comment: Vec<String>,
  /// Extra `use` paths, already joined with configured additional imports.
  #[builder(default)]
  pub imports: Vec<String>,
  #[builder(default)]
  pub declarations: Vec<Declaration>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
  Struct(StructDecl),
  ValueEnum(ValueEnumDecl),
  OneOf(OneOfDecl),
  AnyOf(AnyOfDecl),
  TypeAlias(TypeAliasDecl),
  ApiTrait(ApiTraitDecl),
  Client(ClientDecl),
  Server(ServerDecl),
  ResponseEnum(ResponseEnumDecl),
  Input(InputDecl),
}

impl Declaration {
  #[must_use]
  pub fn type_name(&self) -> Option<&TypeName> {
    match self {
      Self::Struct(d) => Some(&d.name),
      Self::ValueEnum(d) => Some(&d.name),
      Self::OneOf(d) => Some(&d.name),
      Self::AnyOf(d) => Some(&d.name),
      Self::TypeAlias(d) => Some(&d.name),
      Self::ResponseEnum(d) => Some(&d.name),
      Self::Input(d) => Some(&d.name),
      Self::ApiTrait(_) | Self::Client(_) | Self::Server(_) => None,
    }
  }
}

/// Rust-primitive bases a schema can resolve to without a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Primitive {
  #[strum(to_string = "String")]
  String,
  #[strum(to_string = "i64")]
  Integer,
  #[strum(to_string = "f64")]
  Number,
  #[strum(to_string = "bool")]
  Boolean,
}

/// Formats modeled as lazy, single-pass element sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamFormat {
  EventStream,
  JsonLines,
  JsonSeq,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeBase {
  Primitive(Primitive),
  /// Reference to a generated declaration. Referenced, not owned.
  Named(TypeName),
  /// User-supplied override path; the compiler emits no declaration for it.
  External(String),
  /// Arbitrary JSON value sink.
  JsonValue,
  /// Raw bytes.
  Binary,
  /// Single-pass stream of decoded elements.
  Stream {
    format: StreamFormat,
    element: Box<TypeUsage>,
  },
}

/// A use of a type at a reference site, with its wrapping.
///
/// `optional` (property not required) and `nullable` (schema admits null)
/// are tracked separately: an optional nullable property must distinguish
/// absent from present-but-null.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeUsage {
  pub base: TypeBase,
  pub optional: bool,
  pub nullable: bool,
  pub array: bool,
  pub boxed: bool,
}

impl TypeUsage {
  #[must_use]
  pub fn of(base: TypeBase) -> Self {
    Self {
      base,
      optional: false,
      nullable: false,
      array: false,
      boxed: false,
    }
  }

  #[must_use]
  pub fn named(name: TypeName) -> Self {
    Self::of(TypeBase::Named(name))
  }

  #[must_use]
  pub fn primitive(primitive: Primitive) -> Self {
    Self::of(TypeBase::Primitive(primitive))
  }

  #[must_use]
  pub fn with_optional(mut self) -> Self {
    self.optional = true;
    self
  }

  #[must_use]
  pub fn with_nullable(mut self) -> Self {
    self.nullable = true;
    self
  }

  #[must_use]
  pub fn with_array(mut self) -> Self {
    self.array = true;
    self
  }

  #[must_use]
  pub fn with_boxed(mut self) -> Self {
    self.boxed = true;
    self
  }

  /// True when the usage is a single-pass stream that must not be replayed.
  #[must_use]
  pub fn is_single_pass(&self) -> bool {
    matches!(self.base, TypeBase::Stream { .. })
  }
}

/// Policy for object keys not declared in `properties`.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AdditionalProperties {
  /// Unknown keys silently ignored (OpenAPI default).
  #[default]
  Allowed,
  /// Decoding fails on any unknown key.
  Disallowed,
  /// Unknown keys collected as arbitrary JSON and re-emitted on encode.
  Any,
  /// Unknown keys collected subject to a value schema.
  Typed(Box<TypeUsage>),
}

#[derive(Debug, Clone, PartialEq, bon::Builder)]
pub struct FieldDecl {
  /// Safe member identifier.
  pub ident: String,
  /// Wire name, preserved verbatim for (de)serialization.
  pub wire_name: String,
  pub ty: TypeUsage,
  #[builder(default)]
  pub required: bool,
  #[builder(default)]
  pub docs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, bon::Builder)]
pub struct StructDecl {
  pub name: TypeName,
  #[builder(default)]
  pub docs: Vec<String>,
  #[builder(default)]
  pub fields: Vec<FieldDecl>,
  #[builder(default)]
  pub additional: AdditionalProperties,
  /// Nested inline declarations hoisted into this type's namespace.
  #[builder(default)]
  pub nested: Vec<Declaration>,
}

/// One case of a closed value enum; the raw wire value round-trips verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueCase {
  pub ident: String,
  pub wire_value: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, bon::Builder)]
pub struct ValueEnumDecl {
  pub name: TypeName,
  #[builder(default)]
  pub docs: Vec<String>,
  #[builder(default)]
  pub cases: Vec<ValueCase>,
}

/// How a oneOf union selects its branch during decoding.
#[derive(Debug, Clone, PartialEq)]
pub enum UnionDispatch {
  /// Read the discriminator property, dispatch in constant time. Unknown
  /// values fail with a dedicated unknown-discriminator error.
  Discriminated {
    property: String,
    /// wire value → variant ident, in declaration order.
    mapping: Vec<(String, String)>,
  },
  /// Try each branch in declared order; first success wins, all-fail errors.
  Ordered,
}

#[derive(Debug, Clone, PartialEq, bon::Builder)]
pub struct UnionVariant {
  pub ident: String,
  pub ty: TypeUsage,
}

#[derive(Debug, Clone, PartialEq, bon::Builder)]
pub struct OneOfDecl {
  pub name: TypeName,
  #[builder(default)]
  pub docs: Vec<String>,
  pub dispatch: UnionDispatch,
  #[builder(default)]
  pub variants: Vec<UnionVariant>,
  #[builder(default)]
  pub nested: Vec<Declaration>,
}

/// anyOf container: one optional slot per branch. Decoding tries every
/// branch independently and keeps the successes (at least one must);
/// encoding emits exactly the populated slots.
#[derive(Debug, Clone, PartialEq, bon::Builder)]
pub struct AnyOfDecl {
  pub name: TypeName,
  #[builder(default)]
  pub docs: Vec<String>,
  #[builder(default)]
  pub branches: Vec<UnionVariant>,
  #[builder(default)]
  pub nested: Vec<Declaration>,
}

#[derive(Debug, Clone, PartialEq, bon::Builder)]
pub struct TypeAliasDecl {
  pub name: TypeName,
  #[builder(default)]
  pub docs: Vec<String>,
  pub target: TypeUsage,
}

// ---------------------------------------------------------------------------
// Operation-level declarations
// ---------------------------------------------------------------------------

/// Protocol describing every operation: one fallible async method each.
#[derive(Debug, Clone, PartialEq, bon::Builder)]
pub struct ApiTraitDecl {
  pub ident: String,
  #[builder(default)]
  pub docs: Vec<String>,
  #[builder(default)]
  pub methods: Vec<OperationSignature>,
}

#[derive(Debug, Clone, PartialEq, bon::Builder)]
pub struct OperationSignature {
  pub ident: String,
  #[builder(default)]
  pub docs: Vec<String>,
  pub input: TypeName,
  pub output: TypeName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ParameterLocation {
  #[strum(to_string = "path")]
  Path,
  #[strum(to_string = "query")]
  Query,
  #[strum(to_string = "header")]
  Header,
  #[strum(to_string = "cookie")]
  Cookie,
}

/// Serialization style subset the compiler supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerializationStyle {
  Simple,
  Form,
  SpaceDelimited,
  PipeDelimited,
}

impl SerializationStyle {
  /// Join separator used when explode=false.
  #[must_use]
  pub fn separator(self) -> char {
    match self {
      Self::Simple | Self::Form => ',',
      Self::SpaceDelimited => ' ',
      Self::PipeDelimited => '|',
    }
  }
}

/// How a parameter value round-trips through its wire representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodingStrategy {
  /// Plain string conversion (`Display`/`FromStr`).
  String,
  /// JSON-encoded value inside the parameter text.
  Json,
  /// Raw bytes, percent-encoded where the location requires it.
  Binary,
}

/// One parameter bound to its resolved type and serialization plan.
#[derive(Debug, Clone, PartialEq, bon::Builder)]
pub struct ParameterPlan {
  pub ident: String,
  pub wire_name: String,
  pub location: ParameterLocation,
  pub style: SerializationStyle,
  pub explode: bool,
  pub coding: CodingStrategy,
  pub ty: TypeUsage,
  #[builder(default)]
  pub required: bool,
}

/// Path template as an ordered literal/placeholder sequence. Placeholder
/// substitution percent-encodes for path-segment position; this is direct
/// substitution, not RFC 6570 expansion.
#[derive(Debug, Clone, PartialEq)]
pub enum PathSegment {
  Literal(String),
  Placeholder { ident: String },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PathTemplate {
  pub segments: Vec<PathSegment>,
}

impl PathTemplate {
  #[must_use]
  pub fn placeholders(&self) -> impl Iterator<Item = &str> {
    self.segments.iter().filter_map(|s| match s {
      PathSegment::Placeholder { ident } => Some(ident.as_str()),
      PathSegment::Literal(_) => None,
    })
  }
}

/// Content classification driving body (de)serialization.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentCategory {
  Json,
  UrlEncoded,
  Multipart(Vec<MultipartPartPlan>),
  Text,
  Binary,
  Stream(StreamFormat),
}

impl ContentCategory {
  #[must_use]
  pub fn is_stream(&self) -> bool {
    matches!(self, Self::Stream(_))
  }
}

/// Repetition of a multipart part within the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartRepetition {
  Single,
  /// Array property: one part emitted per element, same part name.
  Repeated,
}

/// Where a part's content type came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartContentSource {
  /// Declared in the encoding object.
  Explicit(String),
  /// Object/array-of-object schema: structured JSON transport inferred.
  InferredStructured,
  /// Primitive schema: raw/binary transport inferred.
  InferredRaw,
}

#[derive(Debug, Clone, PartialEq, bon::Builder)]
pub struct MultipartPartPlan {
  pub ident: String,
  pub wire_name: String,
  pub repetition: PartRepetition,
  pub source: PartContentSource,
  pub ty: TypeUsage,
  /// Per-part header fields preserved through encode/decode.
  #[builder(default)]
  pub headers: Vec<String>,
}

/// One body alternative of a request or response.
#[derive(Debug, Clone, PartialEq, bon::Builder)]
pub struct ContentCase {
  /// Case identifier within the content sum type.
  pub ident: String,
  pub content_type: String,
  pub category: ContentCategory,
  pub ty: TypeUsage,
}

/// Per-operation input container: one slot per populated location group,
/// plus the body.
#[derive(Debug, Clone, PartialEq, bon::Builder)]
pub struct InputDecl {
  pub name: TypeName,
  #[builder(default)]
  pub docs: Vec<String>,
  #[builder(default)]
  pub parameters: Vec<ParameterPlan>,
  #[builder(default)]
  pub body: Vec<ContentCase>,
  #[builder(default)]
  pub body_required: bool,
  #[builder(default)]
  pub nested: Vec<Declaration>,
}

/// Status matcher for one response arm, in client dispatch priority order:
/// exact match first, then range, then the undocumented fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusMatch {
  Exact(u16),
  /// `2XX`-style class range: 1..=5.
  Range(u8),
  Default,
}

#[derive(Debug, Clone, PartialEq, bon::Builder)]
pub struct ResponseArm {
  pub ident: String,
  pub status: StatusMatch,
  #[builder(default)]
  pub docs: Vec<String>,
  /// Multiple entries mean a nested content sum type.
  #[builder(default)]
  pub content: Vec<ContentCase>,
  /// The appended undocumented arm carries the raw status and body.
  #[builder(default)]
  pub catch_all: bool,
}

/// Per-operation output sum type. The `undocumented` case is always present
/// so servers returning outside the documented set never hard-fail a client.
#[derive(Debug, Clone, PartialEq, bon::Builder)]
pub struct ResponseEnumDecl {
  pub name: TypeName,
  #[builder(default)]
  pub docs: Vec<String>,
  #[builder(default)]
  pub arms: Vec<ResponseArm>,
  #[builder(default)]
  pub nested: Vec<Declaration>,
}

/// Accept-header entry the client sends when several response content types
/// are documented.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptEntry {
  pub content_type: String,
  /// `0.0..=1.0`; `None` omits the parameter (implicit 1.0).
  pub quality: Option<f32>,
}

/// Everything a client method needs to build the request and dispatch the
/// response; the inverse plan serves the server translator.
#[derive(Debug, Clone, PartialEq, bon::Builder)]
pub struct OperationPlan {
  pub signature: OperationSignature,
  pub method: Method,
  pub path: PathTemplate,
  #[builder(default)]
  pub parameters: Vec<ParameterPlan>,
  #[builder(default)]
  pub request_body: Vec<ContentCase>,
  #[builder(default)]
  pub body_required: bool,
  #[builder(default)]
  pub accept: Vec<AcceptEntry>,
  #[builder(default)]
  pub responses: Vec<ResponseArm>,
}

#[derive(Debug, Clone, PartialEq, bon::Builder)]
pub struct ClientDecl {
  pub ident: String,
  pub api_trait: String,
  #[builder(default)]
  pub operations: Vec<OperationPlan>,
}

#[derive(Debug, Clone, PartialEq, bon::Builder)]
pub struct ServerDecl {
  pub ident: String,
  pub api_trait: String,
  #[builder(default)]
  pub operations: Vec<OperationPlan>,
}
