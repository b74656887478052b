mod settings;


use config::{Config, ConfigError, Environment, File};

use settings::PartialSettings;

pub use settings::{BroadcastSettings, ConnectorSettings, LoggingSettings, Settings};

/// Loads the configuration from `config/default` and environment variables.
pub fn load_config() -> Result<Settings, ConfigError> {
    load_config_from("config/default")
}

/// Loads the configuration from the file at `path` (any format the `config`
/// crate understands, extension optional) and `CHANLINK__*` environment
/// variables, then merges it with default values.
///
/// The file is optional; environment variables win over the file.
pub fn load_config_from(path: &str) -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name(path).required(false))
        .add_source(Environment::with_prefix("CHANLINK").separator("__"));

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(merge(partial, Settings::default()))
}

fn merge(partial: PartialSettings, default: Settings) -> Settings {
    let broadcast = partial.broadcast.unwrap_or_default();
    let connector = partial.connector.unwrap_or_default();
    let logging = partial.logging.unwrap_or_default();

    Settings {
        broadcast: BroadcastSettings {
            group: broadcast.group.unwrap_or(default.broadcast.group),
            node_name: broadcast.node_name.unwrap_or(default.broadcast.node_name),
        },
        connector: ConnectorSettings {
            connect_timeout_ms: connector
                .connect_timeout_ms
                .unwrap_or(default.connector.connect_timeout_ms),
        },
        logging: LoggingSettings {
            level: logging.level.unwrap_or(default.logging.level),
        },
    }
}
