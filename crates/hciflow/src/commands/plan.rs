use crate::utils;
use colored::Colorize;
use hciflow_cloud::{Action, ActionType, Plan};
use hciflow_config::HciConfig;
use std::path::Path;

pub async fn handle(config: &HciConfig, manifest: &Path) -> anyhow::Result<()> {
    let manifest = utils::load_manifest(manifest)?;
    let engine = utils::build_engine(config)?;

    println!("{}", "Planning...".blue());
    println!();

    let mut actions = Vec::new();
    let mut failed = 0;
    for entry in &manifest.entities {
        match engine.plan(entry).await {
            Ok(action) => {
                print_action(&action);
                actions.push(action);
            }
            Err(e) => {
                failed += 1;
                eprintln!("  {} {}", "✗".red(), entry.label().cyan());
                eprintln!("    {}", e);
            }
        }
    }

    let plan = Plan::new(actions);
    println!();
    if plan.has_changes {
        println!("{} {}", "Plan:".bold(), plan.summary());
    } else {
        println!("{}", "No changes. Everything is up to date.".green());
    }

    if failed > 0 {
        eprintln!("{}", format!("{failed} entities could not be planned").red());
        std::process::exit(1);
    }
    Ok(())
}

fn print_action(action: &Action) {
    let marker = match action.action_type {
        ActionType::Create => "+".green(),
        ActionType::Replace => "-/+".red(),
        ActionType::Update => "~".yellow(),
        ActionType::NoChange => "=".dimmed(),
    };
    println!("  {} {}", marker, action.description());
}
