use anyhow::{Context, bail};
use oapic::compiler::{CollectingCollector, DocumentFormat, parse, validator::validate};

use crate::ui::cli::ValidateCommand;

pub async fn validate_document(command: &ValidateCommand) -> anyhow::Result<()> {
  let bytes = tokio::fs::read(&command.input)
    .await
    .with_context(|| format!("failed to read {}", command.input.display()))?;
  let document = parse(&bytes, DocumentFormat::from_path(&command.input))?;

  let collector = CollectingCollector::new();
  let outcome = validate(&document, &collector);

  for diagnostic in collector.diagnostics() {
    eprintln!("{diagnostic}");
  }

  outcome?;

  let warnings = collector.warning_count();
  if command.warnings_as_errors && warnings > 0 {
    bail!("{warnings} warning(s) treated as errors");
  }

  println!(
    "{}: OpenAPI {} document is valid ({warnings} warning(s))",
    command.input.display(),
    document.version
  );

  Ok(())
}
