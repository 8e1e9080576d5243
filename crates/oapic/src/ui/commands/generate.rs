use std::{
  collections::{BTreeMap, BTreeSet},
  path::PathBuf,
};

use anyhow::{Context, bail};
use oapic::{
  compiler::{
    CollectingCollector, Config, DocumentFormat, GeneratorMode, Visibility, compile,
    config::TypeOverride,
    filter::FilterCriteria,
    naming::{NamingOptions, NamingStrategy},
    parse,
  },
  emitter,
};

use crate::ui::cli::{CliMode, CliNaming, CliVisibility, GenerateCommand};

#[derive(Debug, Clone)]
pub struct GenerateConfig {
  pub input: PathBuf,
  pub output: PathBuf,
  pub compiler: Config,
  pub quiet: bool,
}

impl GenerateConfig {
  pub fn from_command(command: GenerateCommand) -> anyhow::Result<Self> {
    let GenerateCommand {
      mode,
      input,
      output,
      visibility,
      naming,
      imports,
      tags,
      paths,
      operations,
      schemas,
      type_overrides,
      nullable_as_optional,
      warnings_as_errors,
      quiet,
    } = command;

    let mut modes: Vec<GeneratorMode> = Vec::new();
    for cli_mode in mode {
      let mode = match cli_mode {
        CliMode::Types => GeneratorMode::Types,
        CliMode::Client => GeneratorMode::Client,
        CliMode::Server => GeneratorMode::Server,
      };
      if !modes.contains(&mode) {
        modes.push(mode);
      }
    }

    let compiler = Config {
      modes,
      visibility: match visibility {
        CliVisibility::Public => Visibility::Public,
        CliVisibility::Crate => Visibility::Crate,
        CliVisibility::Private => Visibility::Private,
      },
      additional_imports: imports,
      filter: build_filter(tags, paths, operations, schemas),
      naming: NamingOptions {
        strategy: match naming {
          CliNaming::Conservative => NamingStrategy::Conservative,
          CliNaming::Idiomatic => NamingStrategy::Idiomatic,
        },
        ..NamingOptions::default()
      },
      type_overrides: parse_type_overrides(type_overrides)?,
      nullable_as_optional,
      warnings_as_errors,
    };

    Ok(Self {
      input,
      output,
      compiler,
      quiet,
    })
  }
}

fn build_filter(
  tags: Option<Vec<String>>,
  paths: Option<Vec<String>>,
  operations: Option<Vec<String>>,
  schemas: Option<Vec<String>>,
) -> Option<FilterCriteria> {
  if tags.is_none() && paths.is_none() && operations.is_none() && schemas.is_none() {
    return None;
  }

  let collect = |entries: Option<Vec<String>>| -> BTreeSet<String> { entries.into_iter().flatten().collect() };

  Some(FilterCriteria {
    tags: collect(tags),
    paths: collect(paths),
    operation_ids: collect(operations),
    schemas: collect(schemas),
  })
}

fn parse_type_overrides(entries: Vec<String>) -> anyhow::Result<BTreeMap<String, TypeOverride>> {
  let mut overrides = BTreeMap::new();
  for entry in entries {
    let (key, rust_path) = entry
      .split_once('=')
      .ok_or_else(|| anyhow::anyhow!("invalid type override '{entry}': expected KEY=RUST_PATH"))?;
    overrides.insert(
      key.to_string(),
      TypeOverride {
        rust_path: rust_path.to_string(),
      },
    );
  }
  Ok(overrides)
}

pub async fn generate_code(config: GenerateConfig) -> anyhow::Result<()> {
  let bytes = tokio::fs::read(&config.input)
    .await
    .with_context(|| format!("failed to read {}", config.input.display()))?;
  let document = parse(&bytes, DocumentFormat::from_path(&config.input))?;

  if !config.quiet {
    println!("loaded OpenAPI {} document from {}", document.version, config.input.display());
  }

  let collector = CollectingCollector::new();
  let files = compile(&document, &config.compiler, &collector)?;

  for diagnostic in collector.diagnostics() {
    eprintln!("{diagnostic}");
  }

  tokio::fs::create_dir_all(&config.output)
    .await
    .with_context(|| format!("failed to create {}", config.output.display()))?;

  for file in &files {
    let rendered = emitter::render(file, &config.compiler)?;
    let path = config.output.join(&file.name);
    tokio::fs::write(&path, rendered)
      .await
      .with_context(|| format!("failed to write {}", path.display()))?;
    if !config.quiet {
      println!("wrote {} ({} declarations)", path.display(), file.declarations.len());
    }
  }

  if collector.has_errors() {
    bail!("generation finished with errors");
  }

  Ok(())
}
