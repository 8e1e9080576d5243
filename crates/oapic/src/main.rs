#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]

use clap::Parser;

use crate::ui::{Cli, Commands, ListCommands};

mod ui;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  let cli = Cli::parse();

  match cli.command {
    Commands::List { list_command } => match list_command {
      ListCommands::Operations { input } => ui::commands::list_operations(&input).await?,
    },
    Commands::Validate(command) => ui::commands::validate_document(&command).await?,
    Commands::Generate(command) => {
      let config = ui::commands::GenerateConfig::from_command(command)?;
      ui::commands::generate_code(config).await?;
    }
  }

  Ok(())
}
