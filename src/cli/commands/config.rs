//! Config command - show or initialize configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager};
use crate::error::ScanfoldResult;
use console::style;

/// Execute the config command
pub async fn execute(args: ConfigArgs, manager: &ConfigManager) -> ScanfoldResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(manager).await?,
        Some(ConfigAction::Path) => println!("{}", manager.path().display()),
        Some(ConfigAction::Init { force }) => init_config(manager, force).await?,
    }

    Ok(())
}

async fn show_config(manager: &ConfigManager) -> ScanfoldResult<()> {
    let config = manager.load().await?;
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

async fn init_config(manager: &ConfigManager, force: bool) -> ScanfoldResult<()> {
    let path = manager.path();

    if path.exists() && !force {
        println!(
            "{} Config already exists at {}",
            style("!").yellow(),
            path.display()
        );
        println!("  Use --force to overwrite");
        return Ok(());
    }

    manager.save(&Config::default()).await?;
    println!(
        "{} Configuration initialized at {}",
        style("✓").green(),
        path.display()
    );

    Ok(())
}
