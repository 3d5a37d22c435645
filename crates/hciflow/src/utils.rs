use anyhow::Context;
use colored::Colorize;
use hciflow_cloud::{
    ActionResult, Engine, EngineOptions, LifecycleState, Manifest, ResizeErrorPolicy,
};
use hciflow_cloud_http::{HttpApiClient, HttpClientConfig};
use hciflow_config::HciConfig;
use std::path::Path;
use std::sync::Arc;

/// Load the configuration from `path`, or discover it
pub fn load_config(path: Option<&Path>) -> anyhow::Result<HciConfig> {
    let config = match path {
        Some(path) => HciConfig::load_from(Some(path)),
        None => HciConfig::load(),
    };
    config.context("Failed to load configuration")
}

pub fn load_manifest(path: &Path) -> anyhow::Result<Manifest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest {}", path.display()))?;
    serde_yaml::from_str(&content).with_context(|| format!("Invalid manifest {}", path.display()))
}

pub fn build_engine(config: &HciConfig) -> anyhow::Result<Engine> {
    let client = HttpApiClient::new(HttpClientConfig {
        api_url: config.api_url.clone(),
        api_key: config.api_key.clone(),
        insecure: config.insecure,
        timeout: None,
    })?;
    let resize_errors = if config.propagate_resize_errors {
        ResizeErrorPolicy::Propagate
    } else {
        ResizeErrorPolicy::Discard
    };
    Ok(Engine::new(Arc::new(client), EngineOptions { resize_errors }))
}

/// Print one line per entity outcome
pub fn print_outcome(outcome: &ActionResult) {
    match &outcome.error {
        None => {
            let state = match outcome.state {
                LifecycleState::Absent => "deleted".to_string(),
                state => state.to_string(),
            };
            let mut line = format!("  {} {} {}", "✓".green(), outcome.label.cyan(), state);
            if !outcome.applied.is_empty() {
                line.push_str(&format!(" [{}]", outcome.applied.join(", ")));
            }
            if !outcome.tasks.is_empty() {
                let tasks = format!(" (tasks: {})", outcome.tasks.join(", "));
                line.push_str(&tasks.dimmed().to_string());
            }
            println!("{line}");
        }
        Some(error) => {
            eprintln!("  {} {}", "✗".red(), outcome.label.cyan());
            eprintln!("    {}", error);
        }
    }
}
