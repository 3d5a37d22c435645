use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file {0} given by HCIFLOW_CONFIG_PATH does not exist")]
    ConfigFileNotFound(PathBuf),

    #[error(
        "API key is not configured. Set HCI_API_KEY or add api_key to one of:\n\
        - ./hciflow.yaml, ./.hciflow.yaml\n\
        - ~/.config/hciflow/config.yaml\n\
        or point HCIFLOW_CONFIG_PATH at a config file"
    )]
    MissingApiKey,

    #[error("Invalid value '{value}' for {name}")]
    InvalidValue { name: &'static str, value: String },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
