use crate::utils;
use colored::Colorize;
use hciflow_cloud::ApplyResult;
use hciflow_config::HciConfig;
use std::path::Path;
use std::time::Instant;

/// Entities are deleted in reverse manifest order, dependents first
pub async fn handle(config: &HciConfig, manifest: &Path, yes: bool) -> anyhow::Result<()> {
    let manifest = utils::load_manifest(manifest)?;
    let targets: Vec<_> = manifest.entities.iter().rev().filter(|e| e.id.is_some()).collect();

    if targets.is_empty() {
        println!("{}", "Nothing to destroy: no entity in the manifest has an id.".yellow());
        return Ok(());
    }

    println!("{}", "The following entities will be deleted:".bold());
    for entry in &targets {
        println!("  {} {}", "-".red(), entry.label().cyan());
    }

    if !yes {
        println!();
        println!("Pass --yes to delete them");
        return Ok(());
    }

    let engine = utils::build_engine(config)?;
    println!();

    let start = Instant::now();
    let mut result = ApplyResult::new();
    for entry in targets {
        let outcome = engine.destroy(entry).await;
        result.record(entry.label(), &outcome);
    }
    result.duration_ms = start.elapsed().as_millis() as u64;

    for outcome in result.succeeded.iter().chain(&result.failed) {
        utils::print_outcome(outcome);
    }

    println!();
    println!(
        "{} deleted, {} failed ({} ms)",
        result.succeeded.len(),
        result.failed.len(),
        result.duration_ms
    );
    if !result.is_success() {
        std::process::exit(1);
    }
    Ok(())
}
