//! The document-to-declarations half of the pipeline.
//!
//! A parsed OpenAPI document flows through validation, optional filtering,
//! reference graph analysis, and translation into the declaration tree the
//! emitter renders.

pub mod config;
pub mod diagnostics;
pub mod filter;
pub mod graph;
pub mod ir;
pub mod naming;
pub mod parser;
pub mod pipeline;
pub mod translator;
pub mod validator;

pub use config::{Config, GeneratorMode, Visibility};
pub use diagnostics::{CollectingCollector, Diagnostic, DiagnosticCollector, DiagnosticMessage, Severity};
pub use parser::{DocumentFormat, ParseError, ParsedDocument, parse};
pub use pipeline::compile;
