//! Token emission for the operation surface: the API trait, the
//! transport-injected client, and the router shell for servers.
//!
//! Clients and servers speak plain `http` request/response pairs with
//! buffered `Vec<u8>` bodies; the injected transport owns connections.

use proc_macro2::TokenStream;
use quote::{format_ident, quote};

use super::{base_tokens, doc_tokens, flat_ident, member_ident, type_tokens, visibility_tokens};
use crate::compiler::{
  config::Config,
  ir::{
    ApiTraitDecl, ClientDecl, ContentCase, ContentCategory, MultipartPartPlan, OperationPlan, ParameterLocation,
    ParameterPlan, PartContentSource, PartRepetition, PathSegment, Primitive, ResponseArm, ServerDecl, StatusMatch,
    StreamFormat, TypeBase,
  },
};

pub(crate) fn trait_tokens(decl: &ApiTraitDecl, config: &Config) -> TokenStream {
  let vis = visibility_tokens(config.visibility);
  let name = format_ident!("{}", decl.ident);
  let docs = doc_tokens(&decl.docs);

  let methods: Vec<TokenStream> = decl
    .methods
    .iter()
    .map(|method| {
      let ident = member_ident(&method.ident);
      let method_docs = doc_tokens(&method.docs);
      let input = flat_ident(&method.input);
      let output = flat_ident(&method.output);
      quote! {
        #method_docs
        fn #ident(&self, input: #input) -> impl std::future::Future<Output = anyhow::Result<#output>> + Send;
      }
    })
    .collect();

  quote! {
    #docs
    #vis trait #name: Send + Sync {
      #(#methods)*
    }
  }
}

fn method_tokens(method: &http::Method) -> TokenStream {
  let ident = format_ident!("{}", method.as_str());
  quote! { http::Method::#ident }
}

/// Status a server answers with for one response arm.
fn arm_status(status: &StatusMatch) -> u16 {
  match status {
    StatusMatch::Exact(code) => *code,
    StatusMatch::Range(class) => u16::from(*class) * 100,
    StatusMatch::Default => 200,
  }
}

fn find_path_param<'a>(plan: &'a OperationPlan, ident: &str) -> Option<&'a ParameterPlan> {
  plan
    .parameters
    .iter()
    .find(|p| p.location == ParameterLocation::Path && p.ident == ident)
}

/// Renders a parameter value into text, given a `value` reference binding.
fn parameter_text(param: &ParameterPlan) -> TokenStream {
  if param.ty.array {
    let separator = param.style.separator().to_string();
    quote! { value.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(#separator) }
  } else if param.coding == crate::compiler::ir::CodingStrategy::Json {
    quote! { serde_json::to_string(value)? }
  } else {
    quote! { value.to_string() }
  }
}

/// Literal path text is encoded once at generation time; only placeholder
/// values need runtime encoding. `/` stays verbatim so separators survive.
const PATH_LITERAL_ENCODE: &percent_encoding::AsciiSet = &percent_encoding::CONTROLS
  .add(b' ')
  .add(b'"')
  .add(b'#')
  .add(b'%')
  .add(b'<')
  .add(b'>')
  .add(b'?')
  .add(b'`')
  .add(b'{')
  .add(b'}');

fn path_statements(plan: &OperationPlan) -> Vec<TokenStream> {
  plan
    .path
    .segments
    .iter()
    .map(|segment| match segment {
      PathSegment::Literal(text) => {
        let encoded = percent_encoding::utf8_percent_encode(text, PATH_LITERAL_ENCODE).to_string();
        quote! { path.push_str(#encoded); }
      }
      PathSegment::Placeholder { ident } => match find_path_param(plan, ident) {
        Some(param) => {
          let field = member_ident(&param.ident);
          let rendered = parameter_text(param);
          quote! {
            {
              let value = &input.#field;
              let rendered = #rendered;
              path.push_str(&percent_encoding::utf8_percent_encode(&rendered, PATH_SEGMENT_ENCODE).to_string());
            }
          }
        }
        None => {
          let literal = format!("{{{ident}}}");
          quote! { path.push_str(#literal); }
        }
      },
    })
    .collect()
}

fn query_statements(plan: &OperationPlan) -> Vec<TokenStream> {
  plan
    .parameters
    .iter()
    .filter(|p| p.location == ParameterLocation::Query)
    .map(|param| {
      let field = member_ident(&param.ident);
      let wire = &param.wire_name;
      let inner = if param.ty.array && param.explode {
        quote! {
          for item in value {
            query.push((#wire.to_string(), item.to_string()));
          }
        }
      } else {
        let rendered = parameter_text(param);
        quote! { query.push((#wire.to_string(), #rendered)); }
      };
      if param.ty.optional {
        quote! {
          if let Some(value) = input.#field.as_ref() {
            #inner
          }
        }
      } else {
        quote! {
          {
            let value = &input.#field;
            #inner
          }
        }
      }
    })
    .collect()
}

fn header_statements(plan: &OperationPlan) -> Vec<TokenStream> {
  plan
    .parameters
    .iter()
    .filter(|p| p.location == ParameterLocation::Header)
    .map(|param| {
      let field = member_ident(&param.ident);
      let wire = &param.wire_name;
      let rendered = parameter_text(param);
      let inner = quote! { builder = builder.header(#wire, #rendered); };
      if param.ty.optional {
        quote! {
          if let Some(value) = input.#field.as_ref() {
            #inner
          }
        }
      } else {
        quote! {
          {
            let value = &input.#field;
            #inner
          }
        }
      }
    })
    .collect()
}

/// Part payload bytes from an owned element binding named `item`.
fn part_bytes(part: &MultipartPartPlan) -> TokenStream {
  match &part.ty.base {
    TypeBase::Binary => quote! { item },
    TypeBase::Primitive(Primitive::String) => quote! { item.into_bytes() },
    TypeBase::Primitive(_) => quote! { item.to_string().into_bytes() },
    _ => quote! { serde_json::to_vec(&item)? },
  }
}

fn part_content_type(part: &MultipartPartPlan) -> String {
  match &part.source {
    PartContentSource::Explicit(content_type) => content_type.clone(),
    PartContentSource::InferredStructured => "application/json".to_string(),
    PartContentSource::InferredRaw => {
      if matches!(part.ty.base, TypeBase::Binary) {
        "application/octet-stream".to_string()
      } else {
        "text/plain".to_string()
      }
    }
  }
}

/// Builds `parts` from an owned multipart struct binding named `body`.
fn multipart_part_statements(parts: &[MultipartPartPlan]) -> Vec<TokenStream> {
  parts
    .iter()
    .map(|part| {
      let field = member_ident(&part.ident);
      let wire = &part.wire_name;
      let bytes = part_bytes(part);
      let content_type = part_content_type(part);
      let push = quote! {
        parts.push(oapic_support::multipart::Part::new(#wire, #bytes).with_content_type(#content_type));
      };
      let per_value = if part.repetition == PartRepetition::Repeated {
        quote! {
          for item in slot {
            #push
          }
        }
      } else {
        quote! {
          let item = slot;
          #push
        }
      };
      if part.ty.optional {
        quote! {
          if let Some(slot) = body.#field {
            #per_value
          }
        }
      } else {
        quote! {
          {
            let slot = body.#field;
            #per_value
          }
        }
      }
    })
    .collect()
}

/// Statements that drain an owned single-pass stream binding named `body`
/// into a `Vec<u8>` named `encoded`.
fn stream_encode_statements(format: StreamFormat) -> TokenStream {
  let frame = match format {
    StreamFormat::JsonLines => quote! {
      encoded.extend_from_slice(&serde_json::to_vec(&item)?);
      encoded.push(b'\n');
    },
    StreamFormat::JsonSeq => quote! {
      encoded.push(0x1e);
      encoded.extend_from_slice(&serde_json::to_vec(&item)?);
      encoded.push(b'\n');
    },
    StreamFormat::EventStream => quote! {
      encoded.extend_from_slice(b"data: ");
      encoded.extend_from_slice(&serde_json::to_vec(&item)?);
      encoded.extend_from_slice(b"\n\n");
    },
  };
  quote! {
    let mut encoded: Vec<u8> = Vec::new();
    let mut source = body.iterate()?;
    while let Some(item) = futures::StreamExt::next(&mut source).await {
      let item = item?;
      #frame
    }
  }
}

/// Request-side encoding of one owned body case binding named `body`.
/// Sets `payload` and the content type on a mutable `builder`.
fn encode_request_case(case: &ContentCase) -> TokenStream {
  let content_type = &case.content_type;
  let header = quote! { builder = builder.header(http::header::CONTENT_TYPE, #content_type); };
  match &case.category {
    ContentCategory::Json => quote! {
      #header
      payload = serde_json::to_vec(&body)?;
    },
    ContentCategory::UrlEncoded => quote! {
      #header
      payload = oapic_support::urlencoded::encode(&body)?.into_bytes();
    },
    ContentCategory::Text => quote! {
      #header
      payload = body.into_bytes();
    },
    ContentCategory::Binary => quote! {
      #header
      payload = body;
    },
    ContentCategory::Multipart(parts) => {
      let part_statements = multipart_part_statements(parts);
      quote! {
        let mut parts: Vec<oapic_support::multipart::Part> = Vec::new();
        #(#part_statements)*
        let (boundary, encoded) = oapic_support::multipart::encode(&parts);
        builder = builder.header(
          http::header::CONTENT_TYPE,
          format!("multipart/form-data; boundary={boundary}"),
        );
        payload = encoded;
      }
    }
    ContentCategory::Stream(format) => {
      let drain = stream_encode_statements(*format);
      quote! {
        #header
        let mut body = body;
        #drain
        payload = encoded;
      }
    }
  }
}

fn stream_decoder_tokens(format: StreamFormat) -> TokenStream {
  match format {
    StreamFormat::JsonLines => quote! { oapic_support::JsonLinesDecoder::new(byte_stream) },
    StreamFormat::JsonSeq => quote! { oapic_support::JsonSeqDecoder::new(byte_stream) },
    StreamFormat::EventStream => quote! { oapic_support::EventStream::new(byte_stream) },
  }
}

/// Expression producing one decoded body case value from an owned
/// `body: Vec<u8>`.
fn decode_case_expr(case: &ContentCase) -> TokenStream {
  match &case.category {
    ContentCategory::Json => quote! { serde_json::from_slice(&body)? },
    ContentCategory::Text => quote! { String::from_utf8(body)? },
    ContentCategory::Binary => quote! { body },
    ContentCategory::UrlEncoded => quote! {
      serde_json::from_value(serde_json::Value::Object(oapic_support::urlencoded::decode(
        std::str::from_utf8(&body)?,
      )))?
    },
    ContentCategory::Multipart(_) => quote! {
      {
        let content_type = content_type_of(&parts.headers);
        let boundary = content_type
          .split("boundary=")
          .nth(1)
          .map(|b| b.trim_matches('"').to_string())
          .ok_or_else(|| anyhow::anyhow!("multipart body without a boundary parameter"))?;
        let mut object = serde_json::Map::new();
        for part in oapic_support::multipart::decode(&boundary, &body)? {
          let structured = part.content_type.as_deref().is_some_and(|ct| ct.contains("json"));
          let value = if structured {
            serde_json::from_slice(&part.body)?
          } else {
            serde_json::Value::String(String::from_utf8_lossy(&part.body).into_owned())
          };
          match object.get_mut(&part.name) {
            Some(serde_json::Value::Array(items)) => items.push(value),
            Some(existing) => {
              let first = existing.take();
              *existing = serde_json::Value::Array(vec![first, value]);
            }
            None => {
              object.insert(part.name.clone(), value);
            }
          }
        }
        serde_json::from_value(serde_json::Value::Object(object))?
      }
    },
    ContentCategory::Stream(format) => {
      let decoder = stream_decoder_tokens(*format);
      quote! {
        {
          let bytes = oapic_support::bytes::Bytes::from(body);
          let byte_stream = futures::stream::once(async move { Ok::<oapic_support::bytes::Bytes, std::io::Error>(bytes) });
          let decoded = #decoder;
          let boxed: futures::stream::BoxStream<'static, _> = Box::pin(decoded);
          oapic_support::StreamingBody::single_pass(boxed)
        }
      }
    }
  }
}

fn content_type_base(content_type: &str) -> String {
  content_type.split(';').next().unwrap_or(content_type).trim().to_string()
}

/// Client-side success return for one response arm.
fn client_arm_success(output: &proc_macro2::Ident, arm: &ResponseArm) -> TokenStream {
  let ident = member_ident(&arm.ident);
  if arm.catch_all {
    return quote! { return Ok(#output::#ident { status, body }); };
  }
  match arm.content.len() {
    0 => quote! { return Ok(#output::#ident); },
    1 => {
      let decode = decode_case_expr(&arm.content[0]);
      quote! {
        let value = #decode;
        return Ok(#output::#ident(value));
      }
    }
    _ => {
      let sum = format_ident!("{}{}Body", output, ident);
      let branches: Vec<TokenStream> = arm
        .content
        .iter()
        .map(|case| {
          let base = content_type_base(&case.content_type);
          let case_ident = member_ident(&case.ident);
          let decode = decode_case_expr(case);
          quote! {
            if content_type.starts_with(#base) {
              let value = #decode;
              return Ok(#output::#ident(#sum::#case_ident(value)));
            }
          }
        })
        .collect();
      quote! {
        let content_type = content_type_of(&parts.headers);
        #(#branches)*
        anyhow::bail!("status {status} answered with unexpected content type `{content_type}`");
      }
    }
  }
}

/// Splits arms into dispatch tiers: exact, class range, declared default,
/// then the undocumented catch-all.
fn partition_arms(arms: &[ResponseArm]) -> (Vec<&ResponseArm>, Vec<&ResponseArm>, Option<&ResponseArm>, Option<&ResponseArm>) {
  let mut exact = Vec::new();
  let mut ranges = Vec::new();
  let mut declared_default = None;
  let mut catch_all = None;
  for arm in arms {
    if arm.catch_all {
      catch_all = Some(arm);
      continue;
    }
    match arm.status {
      StatusMatch::Exact(_) => exact.push(arm),
      StatusMatch::Range(_) => ranges.push(arm),
      StatusMatch::Default => declared_default = Some(arm),
    }
  }
  (exact, ranges, declared_default, catch_all)
}

fn client_dispatch(output: &proc_macro2::Ident, arms: &[ResponseArm]) -> TokenStream {
  let (exact, ranges, declared_default, catch_all) = partition_arms(arms);

  let exact_checks: Vec<TokenStream> = exact
    .iter()
    .map(|arm| {
      let StatusMatch::Exact(code) = arm.status else {
        return quote! {};
      };
      let success = client_arm_success(output, arm);
      quote! {
        if status == #code {
          #success
        }
      }
    })
    .collect();

  let range_checks: Vec<TokenStream> = ranges
    .iter()
    .map(|arm| {
      let StatusMatch::Range(class) = arm.status else {
        return quote! {};
      };
      let low = u16::from(class) * 100;
      let high = low + 100;
      let success = client_arm_success(output, arm);
      quote! {
        if (#low..#high).contains(&status) {
          #success
        }
      }
    })
    .collect();

  let fallback = match (declared_default, catch_all) {
    (Some(arm), _) => client_arm_success(output, arm),
    (None, Some(arm)) => client_arm_success(output, arm),
    (None, None) => quote! { anyhow::bail!("status {status} matched no response arm"); },
  };

  quote! {
    #(#exact_checks)*
    #(#range_checks)*
    #fallback
  }
}

fn accept_header_value(plan: &OperationPlan) -> Option<String> {
  if plan.accept.is_empty() {
    return None;
  }
  let rendered: Vec<String> = plan
    .accept
    .iter()
    .map(|entry| match entry.quality {
      Some(q) => format!("{};q={q}", entry.content_type),
      None => entry.content_type.clone(),
    })
    .collect();
  Some(rendered.join(", "))
}

fn client_body_statements(plan: &OperationPlan) -> TokenStream {
  let core = match plan.request_body.len() {
    0 => quote! {},
    1 => {
      let encode = encode_request_case(&plan.request_body[0]);
      if plan.body_required {
        quote! {
          {
            let body = input.body;
            #encode
          }
        }
      } else {
        quote! {
          if let Some(body) = input.body {
            #encode
          }
        }
      }
    }
    _ => {
      let arms: Vec<TokenStream> = plan
        .request_body
        .iter()
        .map(|case| {
          let case_ident = member_ident(&case.ident);
          let encode = encode_request_case(case);
          quote! {
            BodyChoice::#case_ident(body) => {
              #encode
            }
          }
        })
        .collect();
      let matcher = quote! {
        match chosen {
          #(#arms)*
        }
      };
      if plan.body_required {
        quote! {
          {
            let chosen = input.body;
            #matcher
          }
        }
      } else {
        quote! {
          if let Some(chosen) = input.body {
            #matcher
          }
        }
      }
    }
  };
  quote! {
    let mut payload: Vec<u8> = Vec::new();
    #core
  }
}

fn client_method(plan: &OperationPlan, body_enum: Option<&proc_macro2::Ident>) -> TokenStream {
  let ident = member_ident(&plan.signature.ident);
  let input_ty = flat_ident(&plan.signature.input);
  let output_ty = flat_ident(&plan.signature.output);
  let method = method_tokens(&plan.method);
  let path_stmts = path_statements(plan);
  let query_stmts = query_statements(plan);
  let header_stmts = header_statements(plan);

  let accept = match accept_header_value(plan) {
    Some(value) => quote! { builder = builder.header(http::header::ACCEPT, #value); },
    None => quote! {},
  };

  let body_stmts = client_body_statements(plan);
  // The nested body enum name is file-scoped; alias it for the match arms.
  let body_alias = match body_enum {
    Some(name) if plan.request_body.len() > 1 => quote! { type BodyChoice = #name; },
    _ => quote! {},
  };

  let dispatch = client_dispatch(&output_ty, &plan.responses);

  quote! {
    async fn #ident(&self, input: #input_ty) -> anyhow::Result<#output_ty> {
      #body_alias
      let mut path = self.base_path.clone();
      #(#path_stmts)*
      let mut query: Vec<(String, String)> = Vec::new();
      #(#query_stmts)*
      if !query.is_empty() {
        let rendered: Vec<String> = query
          .iter()
          .map(|(k, v)| {
            format!(
              "{}={}",
              percent_encoding::utf8_percent_encode(k, QUERY_ENCODE),
              percent_encoding::utf8_percent_encode(v, QUERY_ENCODE)
            )
          })
          .collect();
        path.push('?');
        path.push_str(&rendered.join("&"));
      }

      let mut builder = http::Request::builder().method(#method).uri(&path);
      #(#header_stmts)*
      #accept
      #body_stmts

      let request = builder.body(payload)?;
      let response = self.transport.execute(request).await?;
      let status = response.status().as_u16();
      let (parts, body) = response.into_parts();
      let _ = &parts;
      #dispatch
    }
  }
}

pub(crate) fn client_tokens(decl: &ClientDecl, config: &Config) -> TokenStream {
  let vis = visibility_tokens(config.visibility);
  let client = format_ident!("{}", decl.ident);
  let api_trait = format_ident!("{}", decl.api_trait);
  let transport = format_ident!("{}Transport", decl.ident);

  let methods: Vec<TokenStream> = decl
    .operations
    .iter()
    .map(|plan| {
      let input_ty = flat_ident(&plan.signature.input);
      let body_enum = format_ident!("{input_ty}Body");
      client_method(plan, Some(&body_enum))
    })
    .collect();

  quote! {
    /// Transport injected into the generated client. Implementations own
    /// connections, TLS, and retries for replayable requests.
    #vis trait #transport: Send + Sync {
      fn execute(
        &self,
        request: http::Request<Vec<u8>>,
      ) -> impl std::future::Future<Output = std::io::Result<http::Response<Vec<u8>>>> + Send;
    }

    const PATH_SEGMENT_ENCODE: &percent_encoding::AsciiSet = &percent_encoding::CONTROLS
      .add(b' ')
      .add(b'"')
      .add(b'#')
      .add(b'%')
      .add(b'/')
      .add(b'<')
      .add(b'>')
      .add(b'?')
      .add(b'`')
      .add(b'{')
      .add(b'}');

    const QUERY_ENCODE: &percent_encoding::AsciiSet = &percent_encoding::CONTROLS
      .add(b' ')
      .add(b'"')
      .add(b'#')
      .add(b'%')
      .add(b'&')
      .add(b'+')
      .add(b'<')
      .add(b'>')
      .add(b'=');

    fn content_type_of(headers: &http::HeaderMap) -> String {
      headers
        .get(http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/json")
        .to_string()
    }

    #vis struct #client<T> {
      transport: T,
      base_path: String,
    }

    impl<T: #transport> #client<T> {
      #vis fn new(transport: T) -> Self {
        Self {
          transport,
          base_path: String::new(),
        }
      }

      /// Prefixes every request path, e.g. `/v2` or a full mount point.
      #vis fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
      }
    }

    impl<T: #transport> #api_trait for #client<T> {
      #(#methods)*
    }
  }
}

/// One slash-delimited chunk of a route pattern.
struct RouteChunk {
  prefix: String,
  capture: Option<String>,
  suffix: String,
}

fn route_chunks(plan: &OperationPlan) -> Vec<RouteChunk> {
  // Reassemble the template text, then split on `/`. A chunk is either
  // pure literal or literal-wrapped around a single capture.
  let mut text = String::new();
  for segment in &plan.path.segments {
    match segment {
      PathSegment::Literal(literal) => text.push_str(literal),
      PathSegment::Placeholder { ident } => {
        text.push('\u{0}');
        text.push_str(ident);
        text.push('\u{0}');
      }
    }
  }

  text
    .trim_matches('/')
    .split('/')
    .filter(|chunk| !chunk.is_empty())
    .map(|chunk| {
      let mut pieces = chunk.split('\u{0}');
      let prefix = pieces.next().unwrap_or("").to_string();
      let capture = pieces.next().map(str::to_string);
      let suffix = pieces.next().unwrap_or("").to_string();
      RouteChunk {
        prefix,
        capture,
        suffix,
      }
    })
    .collect()
}

fn element_type(param: &ParameterPlan) -> TokenStream {
  base_tokens(&param.ty.base)
}

/// Parse an owned `text: String` into the parameter's element type,
/// yielding `Result<_, _>` handled by the caller.
fn parse_element(param: &ParameterPlan) -> TokenStream {
  let element = element_type(param);
  if param.coding == crate::compiler::ir::CodingStrategy::Json {
    quote! { serde_json::from_str::<#element>(&text).map_err(anyhow::Error::from) }
  } else {
    quote! { text.parse::<#element>().map_err(anyhow::Error::from) }
  }
}

fn server_path_captures(plan: &OperationPlan, chunks: &[RouteChunk]) -> Vec<TokenStream> {
  chunks
    .iter()
    .enumerate()
    .filter_map(|(index, chunk)| {
      let capture = chunk.capture.as_ref()?;
      let param = find_path_param(plan, capture)?;
      let field = member_ident(&param.ident);
      let prefix_len = chunk.prefix.len();
      let suffix_len = chunk.suffix.len();
      let parse = parse_element(param);
      let separator = param.style.separator().to_string();
      let assemble = if param.ty.array {
        quote! {
          let mut items = Vec::new();
          for piece in decoded.split(#separator) {
            let text = piece.to_string();
            match #parse {
              Ok(item) => items.push(item),
              Err(_) => return Self::bad_request(),
            }
          }
          let #field = items;
        }
      } else {
        quote! {
          let text = decoded;
          let #field = match #parse {
            Ok(value) => value,
            Err(_) => return Self::bad_request(),
          };
        }
      };
      Some(quote! {
        let raw = &segments[#index][#prefix_len..segments[#index].len() - #suffix_len];
        let decoded = match percent_encoding::percent_decode_str(raw).decode_utf8() {
          Ok(text) => text.into_owned(),
          Err(_) => return Self::bad_request(),
        };
        #assemble
      })
    })
    .collect()
}

fn server_query_captures(plan: &OperationPlan) -> Vec<TokenStream> {
  plan
    .parameters
    .iter()
    .filter(|p| p.location == ParameterLocation::Query)
    .map(|param| {
      let field = member_ident(&param.ident);
      let wire = &param.wire_name;
      let parse = parse_element(param);
      let separator = param.style.separator().to_string();

      if param.ty.array {
        let gather = if param.explode {
          quote! { oapic_support::urlencoded::values(&query, #wire) }
        } else {
          quote! {
            oapic_support::urlencoded::value(&query, #wire)
              .map(|joined| joined.split(#separator).map(str::to_string).collect::<Vec<_>>())
              .unwrap_or_default()
          }
        };
        let collect = quote! {
          let mut items = Vec::new();
          for text in raw_values {
            match #parse {
              Ok(item) => items.push(item),
              Err(_) => return Self::bad_request(),
            }
          }
        };
        if param.ty.optional {
          quote! {
            let raw_values: Vec<String> = #gather;
            let #field = if raw_values.is_empty() {
              None
            } else {
              #collect
              Some(items)
            };
          }
        } else {
          quote! {
            let raw_values: Vec<String> = #gather;
            #collect
            let #field = items;
          }
        }
      } else if param.ty.optional {
        quote! {
          let #field = match oapic_support::urlencoded::value(&query, #wire) {
            Some(text) => match #parse {
              Ok(value) => Some(value),
              Err(_) => return Self::bad_request(),
            },
            None => None,
          };
        }
      } else {
        quote! {
          let #field = match oapic_support::urlencoded::value(&query, #wire) {
            Some(text) => match #parse {
              Ok(value) => value,
              Err(_) => return Self::bad_request(),
            },
            None => return Self::bad_request(),
          };
        }
      }
    })
    .collect()
}

fn server_header_captures(plan: &OperationPlan) -> Vec<TokenStream> {
  plan
    .parameters
    .iter()
    .filter(|p| p.location == ParameterLocation::Header)
    .map(|param| {
      let field = member_ident(&param.ident);
      let wire = &param.wire_name;
      let parse = parse_element(param);
      if param.ty.optional {
        quote! {
          let #field = match parts.headers.get(#wire).and_then(|v| v.to_str().ok()) {
            Some(raw) => {
              let text = raw.to_string();
              match #parse {
                Ok(value) => Some(value),
                Err(_) => return Self::bad_request(),
              }
            }
            None => None,
          };
        }
      } else {
        quote! {
          let #field = match parts.headers.get(#wire).and_then(|v| v.to_str().ok()) {
            Some(raw) => {
              let text = raw.to_string();
              match #parse {
                Ok(value) => value,
                Err(_) => return Self::bad_request(),
              }
            }
            None => return Self::bad_request(),
          };
        }
      }
    })
    .collect()
}

fn server_body_capture(plan: &OperationPlan, body_enum: &proc_macro2::Ident) -> TokenStream {
  match plan.request_body.len() {
    0 => quote! {},
    1 => {
      let decode = decode_case_expr(&plan.request_body[0]);
      if plan.body_required {
        quote! {
          let body = match (|| -> anyhow::Result<_> { Ok(#decode) })() {
            Ok(value) => value,
            Err(_) => return Self::bad_request(),
          };
        }
      } else {
        quote! {
          let body = if body.is_empty() {
            None
          } else {
            match (|| -> anyhow::Result<_> { Ok(#decode) })() {
              Ok(value) => Some(value),
              Err(_) => return Self::bad_request(),
            }
          };
        }
      }
    }
    _ => {
      let branches: Vec<TokenStream> = plan
        .request_body
        .iter()
        .map(|case| {
          let base = content_type_base(&case.content_type);
          let case_ident = member_ident(&case.ident);
          let decode = decode_case_expr(case);
          quote! {
            if request_content_type.starts_with(#base) {
              match (|| -> anyhow::Result<_> { Ok(#decode) })() {
                Ok(value) => Some(#body_enum::#case_ident(value)),
                Err(_) => return Self::bad_request(),
              }
            } else
          }
        })
        .collect();
      let selected = quote! {
        let selected = #(#branches)* {
          return Self::unsupported_media_type();
        };
      };
      if plan.body_required {
        quote! {
          let request_content_type = content_type_of(&parts.headers);
          #selected
          let Some(body) = selected else {
            return Self::bad_request();
          };
        }
      } else {
        quote! {
          let request_content_type = content_type_of(&parts.headers);
          let body = if body.is_empty() {
            None
          } else {
            #selected
            selected
          };
        }
      }
    }
  }
}

/// Response-side encode of one owned case value binding named `body`:
/// produces `encoded` bytes and `response_content_type`.
fn encode_response_case(case: &ContentCase) -> TokenStream {
  let content_type = &case.content_type;
  match &case.category {
    ContentCategory::Json => quote! {
      let response_content_type = #content_type.to_string();
      let encoded = serde_json::to_vec(&body)?;
    },
    ContentCategory::UrlEncoded => quote! {
      let response_content_type = #content_type.to_string();
      let encoded = oapic_support::urlencoded::encode(&body)?.into_bytes();
    },
    ContentCategory::Text => quote! {
      let response_content_type = #content_type.to_string();
      let encoded = body.into_bytes();
    },
    ContentCategory::Binary => quote! {
      let response_content_type = #content_type.to_string();
      let encoded = body;
    },
    ContentCategory::Multipart(parts) => {
      let part_statements = multipart_part_statements(parts);
      quote! {
        let mut parts: Vec<oapic_support::multipart::Part> = Vec::new();
        #(#part_statements)*
        let (boundary, encoded) = oapic_support::multipart::encode(&parts);
        let response_content_type = format!("multipart/form-data; boundary={boundary}");
      }
    }
    ContentCategory::Stream(format) => {
      let drain = stream_encode_statements(*format);
      quote! {
        let response_content_type = #content_type.to_string();
        let mut body = body;
        #drain
      }
    }
  }
}

fn server_respond_arm(output: &proc_macro2::Ident, arm: &ResponseArm) -> TokenStream {
  let ident = member_ident(&arm.ident);
  if arm.catch_all {
    return quote! {
      #output::#ident { status, body } => {
        Ok(http::Response::builder().status(status).body(body)?)
      }
    };
  }

  let status = arm_status(&arm.status);
  match arm.content.len() {
    0 => quote! {
      #output::#ident => Ok(http::Response::builder().status(#status).body(Vec::new())?),
    },
    1 => {
      let encode = encode_response_case(&arm.content[0]);
      quote! {
        #output::#ident(body) => {
          #encode
          Ok(
            http::Response::builder()
              .status(#status)
              .header(http::header::CONTENT_TYPE, response_content_type)
              .body(encoded)?,
          )
        }
      }
    }
    _ => {
      let sum = format_ident!("{}{}Body", output, ident);
      let documented: Vec<&str> = arm.content.iter().map(|case| case.content_type.as_str()).collect();
      let documented_first = documented[0];
      let cases: Vec<TokenStream> = arm
        .content
        .iter()
        .map(|case| {
          let case_ident = member_ident(&case.ident);
          let content_type = &case.content_type;
          let encode = encode_response_case(case);
          quote! {
            #sum::#case_ident(body) => {
              if negotiated != #content_type {
                return Self::not_acceptable();
              }
              #encode
              Ok(
                http::Response::builder()
                  .status(#status)
                  .header(http::header::CONTENT_TYPE, response_content_type)
                  .body(encoded)?,
              )
            }
          }
        })
        .collect();
      quote! {
        #output::#ident(chosen) => {
          let negotiated = oapic_support::media_range::negotiate_header(accept, &[#(#documented),*])
            .unwrap_or(#documented_first);
          match chosen {
            #(#cases)*
          }
        }
      }
    }
  }
}

fn server_route(plan: &OperationPlan) -> TokenStream {
  let method = method_tokens(&plan.method);
  let op_ident = member_ident(&plan.signature.ident);
  let input_ty = flat_ident(&plan.signature.input);
  let output_ty = flat_ident(&plan.signature.output);
  let body_enum = format_ident!("{input_ty}Body");

  let chunks = route_chunks(plan);
  let chunk_count = chunks.len();
  let mut conditions = vec![quote! { parts.method == #method }, quote! { segments.len() == #chunk_count }];
  for (index, chunk) in chunks.iter().enumerate() {
    if chunk.capture.is_none() {
      let literal = chunk.prefix.clone();
      conditions.push(quote! { segments[#index] == #literal });
    } else {
      if !chunk.prefix.is_empty() {
        let prefix = chunk.prefix.clone();
        conditions.push(quote! { segments[#index].starts_with(#prefix) });
      }
      if !chunk.suffix.is_empty() {
        let suffix = chunk.suffix.clone();
        conditions.push(quote! { segments[#index].ends_with(#suffix) });
      }
      let min_len = chunk.prefix.len() + chunk.suffix.len();
      if min_len > 0 {
        conditions.push(quote! { segments[#index].len() >= #min_len });
      }
    }
  }

  let path_captures = server_path_captures(plan, &chunks);
  let query_captures = server_query_captures(plan);
  let header_captures = server_header_captures(plan);
  let body_capture = server_body_capture(plan, &body_enum);

  let mut input_fields: Vec<TokenStream> = plan
    .parameters
    .iter()
    .filter(|p| p.location != ParameterLocation::Cookie)
    .map(|p| {
      let field = member_ident(&p.ident);
      quote! { #field }
    })
    .collect();
  if !plan.request_body.is_empty() {
    input_fields.push(quote! { body });
  }

  let needs_query = plan.parameters.iter().any(|p| p.location == ParameterLocation::Query);
  let query_init = if needs_query {
    quote! { let query = oapic_support::urlencoded::decode(parts.uri.query().unwrap_or("")); }
  } else {
    quote! {}
  };

  let respond_arms: Vec<TokenStream> = plan.responses.iter().map(|arm| server_respond_arm(&output_ty, arm)).collect();

  quote! {
    if #(#conditions)&&* {
      #(#path_captures)*
      #query_init
      #(#query_captures)*
      #(#header_captures)*
      #body_capture
      let input = #input_ty { #(#input_fields),* };
      let output = self.service.#op_ident(input).await?;
      return match output {
        #(#respond_arms)*
      };
    }
  }
}

pub(crate) fn server_tokens(decl: &ServerDecl, config: &Config) -> TokenStream {
  let vis = visibility_tokens(config.visibility);
  let router = format_ident!("{}", decl.ident);
  let api_trait = format_ident!("{}", decl.api_trait);

  let routes: Vec<TokenStream> = decl.operations.iter().map(server_route).collect();

  quote! {
    fn content_type_of(headers: &http::HeaderMap) -> String {
      headers
        .get(http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/json")
        .to_string()
    }

    /// Routes buffered HTTP exchanges onto a service implementation.
    #vis struct #router<S> {
      service: S,
    }

    impl<S: #api_trait> #router<S> {
      #vis fn new(service: S) -> Self {
        Self { service }
      }

      fn bad_request() -> anyhow::Result<http::Response<Vec<u8>>> {
        Ok(http::Response::builder().status(400).body(Vec::new())?)
      }

      fn unsupported_media_type() -> anyhow::Result<http::Response<Vec<u8>>> {
        Ok(http::Response::builder().status(415).body(Vec::new())?)
      }

      fn not_acceptable() -> anyhow::Result<http::Response<Vec<u8>>> {
        Ok(http::Response::builder().status(406).body(Vec::new())?)
      }

      /// Dispatches one request; unmatched routes answer 404.
      #vis async fn handle(&self, request: http::Request<Vec<u8>>) -> anyhow::Result<http::Response<Vec<u8>>> {
        let (parts, body) = request.into_parts();
        let path = parts.uri.path().to_string();
        let segments: Vec<&str> = path.trim_matches('/').split('/').filter(|s| !s.is_empty()).collect();
        let accept = parts.headers.get(http::header::ACCEPT).and_then(|v| v.to_str().ok());
        let _ = &body;
        let _ = accept;
        #(#routes)*
        Ok(http::Response::builder().status(404).body(Vec::new())?)
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::compiler::{
    ir::{
      AcceptEntry, CodingStrategy, ContentCase, OperationSignature, PathTemplate, SerializationStyle, TypeUsage,
    },
    naming::TypeName,
  };

  fn op_name(short: &str) -> TypeName {
    TypeName::root("operations", "operations").child(short, short)
  }

  fn signature() -> OperationSignature {
    OperationSignature::builder()
      .ident("list_pets".to_string())
      .input(op_name("ListPetsInput"))
      .output(op_name("ListPetsOutput"))
      .build()
  }

  fn template() -> PathTemplate {
    PathTemplate {
      segments: vec![
        PathSegment::Literal("/pets/".to_string()),
        PathSegment::Placeholder {
          ident: "pet_id".to_string(),
        },
      ],
    }
  }

  fn path_param() -> ParameterPlan {
    ParameterPlan::builder()
      .ident("pet_id".to_string())
      .wire_name("petId".to_string())
      .location(ParameterLocation::Path)
      .style(SerializationStyle::Simple)
      .explode(false)
      .coding(CodingStrategy::String)
      .ty(TypeUsage::primitive(Primitive::Integer))
      .required(true)
      .build()
  }

  fn basic_plan() -> OperationPlan {
    OperationPlan::builder()
      .signature(signature())
      .method(http::Method::GET)
      .path(template())
      .parameters(vec![path_param()])
      .responses(vec![
        ResponseArm::builder()
          .ident("Ok".to_string())
          .status(StatusMatch::Exact(200))
          .content(vec![
            ContentCase::builder()
              .ident("Json".to_string())
              .content_type("application/json".to_string())
              .category(ContentCategory::Json)
              .ty(TypeUsage::named(op_name("Pet")))
              .build(),
          ])
          .build(),
        ResponseArm::builder()
          .ident("Undocumented".to_string())
          .status(StatusMatch::Default)
          .catch_all(true)
          .build(),
      ])
      .build()
  }

  #[test]
  fn path_placeholders_substitute_percent_encoded_values() {
    let rendered = client_method(&basic_plan(), None).to_string();
    assert!(rendered.contains("utf8_percent_encode"));
    assert!(rendered.contains("pet_id"));
    assert!(!rendered.contains("{pet_id}"));
  }

  #[test]
  fn literal_path_text_is_encoded_at_generation_time() {
    let mut plan = basic_plan();
    plan.path = PathTemplate {
      segments: vec![PathSegment::Literal("/pet store/all".to_string())],
    };
    plan.parameters.clear();

    let rendered = client_method(&plan, None).to_string();
    assert!(rendered.contains("/pet%20store/all"));
    assert!(!rendered.contains("pet store"));
  }

  #[test]
  fn exact_status_checks_precede_the_catch_all() {
    let rendered = client_method(&basic_plan(), None).to_string();
    let exact = rendered.find("status == 200u16").expect("exact check");
    let fallback = rendered.find("Undocumented { status , body }").expect("catch-all");
    assert!(exact < fallback);
  }

  #[test]
  fn accept_header_lists_documented_content_types() {
    let mut plan = basic_plan();
    plan.accept = vec![
      AcceptEntry {
        content_type: "application/json".to_string(),
        quality: None,
      },
      AcceptEntry {
        content_type: "text/plain".to_string(),
        quality: Some(0.5),
      },
    ];
    assert_eq!(
      accept_header_value(&plan).as_deref(),
      Some("application/json, text/plain;q=0.5")
    );
  }

  #[test]
  fn route_chunks_split_on_slashes_and_keep_captures() {
    let chunks = route_chunks(&basic_plan());
    assert_eq!(chunks.len(), 2);
    assert!(chunks[0].capture.is_none());
    assert_eq!(chunks[0].prefix, "pets");
    assert_eq!(chunks[1].capture.as_deref(), Some("pet_id"));
  }

  #[test]
  fn server_routes_match_method_and_segment_count() {
    let rendered = server_route(&basic_plan()).to_string();
    assert!(rendered.contains("http :: Method :: GET"));
    assert!(rendered.contains("segments . len () == 2usize"));
    assert!(rendered.contains("bad_request"));
  }

  #[test]
  fn multi_content_responses_negotiate_against_the_accept_header() {
    let mut plan = basic_plan();
    plan.responses[0].content.push(
      ContentCase::builder()
        .ident("Text".to_string())
        .content_type("text/plain".to_string())
        .category(ContentCategory::Text)
        .ty(TypeUsage::primitive(Primitive::String))
        .build(),
    );

    let rendered = server_route(&plan).to_string();
    assert!(rendered.contains("negotiate_header"));
    assert!(rendered.contains("\"application/json\" , \"text/plain\""));
    assert!(rendered.contains("not_acceptable"));

    let shell = server_tokens(
      &ServerDecl {
        ident: "PetsRouter".to_string(),
        api_trait: "PetsApi".to_string(),
        operations: vec![plan],
      },
      &Config::default(),
    )
    .to_string();
    assert!(shell.contains("http :: header :: ACCEPT"));
    assert!(shell.contains("fn not_acceptable"));
  }

  #[test]
  fn single_content_responses_skip_negotiation() {
    let rendered = server_route(&basic_plan()).to_string();
    assert!(!rendered.contains("negotiate_header"));
  }

  #[test]
  fn range_arms_answer_with_the_class_representative_status() {
    assert_eq!(arm_status(&StatusMatch::Range(2)), 200);
    assert_eq!(arm_status(&StatusMatch::Range(5)), 500);
    assert_eq!(arm_status(&StatusMatch::Exact(418)), 418);
  }

  #[test]
  fn stream_request_bodies_drain_through_framed_encoders() {
    let drained = stream_encode_statements(StreamFormat::JsonSeq).to_string();
    assert!(drained.contains("0x1e"));
    let sse = stream_encode_statements(StreamFormat::EventStream).to_string();
    assert!(sse.contains("data"));
  }

  #[test]
  fn stream_responses_decode_into_single_pass_bodies() {
    let case = ContentCase::builder()
      .ident("JsonLines".to_string())
      .content_type("application/jsonl".to_string())
      .category(ContentCategory::Stream(StreamFormat::JsonLines))
      .ty(TypeUsage::named(op_name("Event")))
      .build();
    let rendered = decode_case_expr(&case).to_string();
    assert!(rendered.contains("JsonLinesDecoder"));
    assert!(rendered.contains("single_pass"));
  }
}
