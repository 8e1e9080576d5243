use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "oapic")]
#[command(author, version, about = "OpenAPI to Rust code compiler")]
pub struct Cli {
  #[command(subcommand)]
  pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
  /// List information from an OpenAPI document
  List {
    #[command(subcommand)]
    list_command: ListCommands,
  },
  /// Check a document for fatal problems without generating code
  Validate(ValidateCommand),
  /// Generate Rust code from an OpenAPI document
  Generate(GenerateCommand),
}

#[derive(Subcommand, Debug)]
pub enum ListCommands {
  /// List all operations defined in the document
  Operations {
    /// Path to the OpenAPI document (JSON or YAML)
    #[arg(short, long, value_name = "FILE")]
    input: PathBuf,
  },
}

#[derive(Args, Debug)]
pub struct ValidateCommand {
  /// Path to the OpenAPI document (JSON or YAML)
  #[arg(short, long, value_name = "FILE")]
  pub input: PathBuf,

  /// Exit with an error when any warning is emitted
  #[arg(long, default_value_t = false)]
  pub warnings_as_errors: bool,
}

#[derive(Args, Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct GenerateCommand {
  /// Generation modes, one output file each (comma-separated)
  #[arg(short, long, value_enum, value_delimiter = ',', default_value = "types")]
  pub mode: Vec<CliMode>,

  /// Path to the OpenAPI document (JSON or YAML)
  #[arg(short, long, value_name = "FILE")]
  pub input: PathBuf,

  /// Directory where the generated files will be written
  #[arg(short, long, value_name = "DIR")]
  pub output: PathBuf,

  /// Visibility applied to generated declarations
  #[arg(long, value_enum, default_value = "public")]
  pub visibility: CliVisibility,

  /// Naming strategy for generated identifiers
  #[arg(long, value_enum, default_value = "conservative")]
  pub naming: CliNaming,

  /// Extra `use` path prepended to every generated file (repeatable)
  #[arg(long = "import", value_name = "PATH")]
  pub imports: Vec<String>,

  /// Keep only operations carrying one of these tags (comma-separated)
  #[arg(long, value_name = "TAGS", value_delimiter = ',')]
  pub tags: Option<Vec<String>>,

  /// Keep only operations under one of these path templates (comma-separated)
  #[arg(long, value_name = "PATHS", value_delimiter = ',')]
  pub paths: Option<Vec<String>>,

  /// Keep only operations with one of these ids (comma-separated)
  #[arg(long, value_name = "IDS", value_delimiter = ',')]
  pub operations: Option<Vec<String>>,

  /// Component schemas to retain even when unreferenced (comma-separated)
  #[arg(long, value_name = "KEYS", value_delimiter = ',')]
  pub schemas: Option<Vec<String>>,

  /// Replace a generated type with an external one (repeatable, KEY=RUST_PATH)
  #[arg(long = "type-override", value_name = "KEY=PATH")]
  pub type_overrides: Vec<String>,

  /// Collapse nullable schemas into plain Option, dropping the
  /// absent-versus-null distinction
  #[arg(long, default_value_t = false)]
  pub nullable_as_optional: bool,

  /// Exit with an error when any warning is emitted
  #[arg(long, default_value_t = false)]
  pub warnings_as_errors: bool,

  /// Suppress non-essential output (errors only)
  #[arg(short, long, default_value_t = false)]
  pub quiet: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum CliMode {
  Types,
  Client,
  Server,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum CliVisibility {
  Public,
  Crate,
  Private,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum CliNaming {
  Conservative,
  Idiomatic,
}
