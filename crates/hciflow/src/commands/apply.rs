use crate::utils;
use colored::Colorize;
use hciflow_cloud::ApplyResult;
use hciflow_config::HciConfig;
use std::path::Path;
use std::time::Instant;

pub async fn handle(config: &HciConfig, manifest: &Path) -> anyhow::Result<()> {
    let manifest = utils::load_manifest(manifest)?;
    let engine = utils::build_engine(config)?;

    println!("{}", "Applying...".blue());
    println!();

    let start = Instant::now();
    let mut result = ApplyResult::new();
    for entry in &manifest.entities {
        let outcome = engine.apply(entry).await;
        let id = outcome.remote_id.as_deref().or(entry.id.as_deref()).unwrap_or("(new)");
        result.record(format!("{} {}", entry.kind(), id), &outcome);
    }
    result.duration_ms = start.elapsed().as_millis() as u64;

    for outcome in result.succeeded.iter().chain(&result.failed) {
        utils::print_outcome(outcome);
    }

    println!();
    println!(
        "{} succeeded, {} failed ({} ms)",
        result.succeeded.len(),
        result.failed.len(),
        result.duration_ms
    );
    if !result.is_success() {
        std::process::exit(1);
    }
    Ok(())
}
