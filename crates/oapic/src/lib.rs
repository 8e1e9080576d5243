//! An OpenAPI v3.x document compiler producing typed Rust source artifacts.
//!
//! The pipeline runs in two halves: [`compiler`] parses, validates,
//! optionally filters, and translates a document into a declaration tree;
//! [`emitter`] renders that tree as formatted Rust source, one file per
//! requested generation mode.
//!
//! ```no_run
//! use oapic::compiler::{self, Config, DocumentFormat};
//!
//! # fn main() -> anyhow::Result<()> {
//! let bytes = std::fs::read("openapi.yaml")?;
//! let document = compiler::parse(&bytes, DocumentFormat::Yaml)?;
//! let config = Config::default();
//! let collector = compiler::CollectingCollector::new();
//! let files = compiler::compile(&document, &config, &collector)?;
//! for file in &files {
//!   let source = oapic::emitter::render(file, &config)?;
//!   std::fs::write(&file.name, source)?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod compiler;
pub mod emitter;
