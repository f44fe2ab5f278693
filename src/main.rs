/*!
 * Snip Modules - Host Entry Point
 *
 * Loads every module package in a directory, each into its own boundary,
 * prints the capability catalog of the modules that survive and runs each
 * effect once against a blank surface.
 */

use clap::Parser;
use miette::IntoDiagnostic;
use std::path::PathBuf;
use tracing::{info, warn};

use snip_modules::capability::{Effect, Rect, Surface};
use snip_modules::{init_tracing, Capability, ModuleCatalog, ModuleConfig, ModuleManager};

/// Load capture-editor modules from a directory
#[derive(Parser, Debug)]
#[command(name = "snip-modules", version, about, long_about = None)]
struct Cli {
    /// Directory scanned for module packages
    #[arg(default_value = "modules", env = "SNIP_MODULE_DIR")]
    dir: PathBuf,

    /// JSON configuration file; otherwise defaults plus SNIP_* overrides
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> miette::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ModuleConfig::from_file(path)?,
        None => {
            let config = ModuleConfig::from_env();
            config.validate()?;
            config
        }
    };

    info!("Snip module host starting...");
    info!(
        dir = %cli.dir.display(),
        extension = %config.package_extension,
        lease_secs = config.lease.initial.as_secs(),
        "Configuration loaded"
    );

    let mut manager = ModuleManager::new(config);
    let loaded = manager.load_from(&cli.dir, &Capability::ALL);
    info!(loaded, "Module directory scanned");

    for host in manager.hosts().to_vec() {
        let catalog = ModuleCatalog::build(&host)?;
        info!(
            module = %catalog.module(),
            boundary = %host.name(),
            effects = ?catalog.snapshot().effects,
            selections = ?catalog.snapshot().selections,
            screenshots = ?catalog.snapshot().screenshots,
            export_actions = ?catalog.snapshot().export_actions,
            "Module catalog"
        );

        for entry in &catalog.effects {
            let mut surface = Surface::new(Rect::new(0, 0, 640, 480));
            let applied = entry
                .create()
                .into_diagnostic()
                .and_then(|mut effect| {
                    effect
                        .apply(&mut surface)
                        .map_err(|e| miette::miette!("{:#}", e))
                });
            match applied {
                Ok(()) => info!(
                    effect = %entry.display_name(),
                    commands = surface.commands.len(),
                    icon = entry.icon().is_some(),
                    "Effect applied"
                ),
                Err(e) => warn!(effect = %entry.display_name(), error = %e, "Effect failed"),
            }
        }
    }

    manager.dispose();
    info!("Snip module host stopped");
    Ok(())
}
