use crate::utils;
use colored::Colorize;
use hciflow_config::HciConfig;
use std::path::Path;

pub async fn handle(config: &HciConfig, manifest: Option<&Path>) -> anyhow::Result<()> {
    println!("{}", "Checking configuration...".blue());
    println!("API: {}", config.api_url.cyan());
    if config.insecure {
        println!("{}", "TLS certificate verification is disabled".yellow());
    }

    if let Some(path) = manifest {
        let manifest = utils::load_manifest(path)?;
        println!(
            "{} {} ({} entities)",
            "✓ Manifest is valid:".green(),
            path.display(),
            manifest.entities.len()
        );
        for entry in &manifest.entities {
            println!("    - {}", entry.label().cyan());
        }
    }

    let engine = utils::build_engine(config)?;
    match engine.directory().organizations().await {
        Ok(organizations) => {
            println!(
                "{} ({} organizations visible)",
                "✓ API is reachable".green().bold(),
                organizations.entries().len()
            );
        }
        Err(e) => {
            eprintln!();
            eprintln!("{}", "✗ API check failed".red().bold());
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}
