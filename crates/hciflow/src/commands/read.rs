use crate::utils;
use colored::Colorize;
use hciflow_cloud::EntityKind;
use hciflow_config::HciConfig;

pub async fn handle(
    config: &HciConfig,
    kind: EntityKind,
    id: &str,
    environment_id: Option<&str>,
) -> anyhow::Result<()> {
    let engine = utils::build_engine(config)?;

    match engine.read(kind, id, environment_id.unwrap_or_default()).await? {
        Some(observed) => {
            println!("{}", serde_json::to_string_pretty(&observed)?);
        }
        None => {
            eprintln!("{} {} {} does not exist", "✗".red(), kind, id.cyan());
            std::process::exit(1);
        }
    }

    Ok(())
}
