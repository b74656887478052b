use serde::Deserialize;

/// Top-level configuration settings.
///
/// Groups the broadcaster identity, connector tuning and logging.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Settings {
    pub broadcast: BroadcastSettings,
    pub connector: ConnectorSettings,
    pub logging: LoggingSettings,
}

/// Identity of a broadcaster.
///
/// `group` scopes discovery traffic; `node_name` is stamped on every
/// message as its sender.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BroadcastSettings {
    pub group: String,
    pub node_name: String,
}

/// Outgoing connection tuning.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ConnectorSettings {
    pub connect_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LoggingSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Missing values are filled in from [`Settings::default`].
#[derive(Debug, Default, Deserialize)]
pub struct PartialSettings {
    pub broadcast: Option<PartialBroadcastSettings>,
    pub connector: Option<PartialConnectorSettings>,
    pub logging: Option<PartialLoggingSettings>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PartialBroadcastSettings {
    pub group: Option<String>,
    pub node_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PartialConnectorSettings {
    pub connect_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
}

impl Default for ConnectorSettings {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 5000,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            broadcast: BroadcastSettings {
                group: "default".to_string(),
                node_name: "node".to_string(),
            },
            connector: ConnectorSettings::default(),
            logging: LoggingSettings {
                level: "info".to_string(),
            },
        }
    }
}
