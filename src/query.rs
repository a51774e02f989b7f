use serde::Serialize;
use std::collections::BTreeMap;

/// Result of a [basic stat](https://wiki.vg/Query#Basic_stat) request.
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct SimpleResponse {
    /// Message of the day.
    pub motd: String,
    pub game_type: String,
    pub map: String,
    pub num_players: u32,
    pub max_players: u32,
    pub host_port: u16,
    pub host_ip: String,
}

impl std::fmt::Display for SimpleResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            serde_json::to_string_pretty(self).map_err(|_| std::fmt::Error)?
        )
    }
}

/// Result of a [full stat](https://wiki.vg/Query#Full_stat) request.
///
/// The well-known keys (`hostname`, `gametype`, `map`, `numplayers`,
/// `maxplayers`, `hostport`, `hostip`) are lifted into typed fields and never
/// appear in [FullResponse::info]. Everything else the server sends, such as
/// `game_id`, `version` or `plugins`, stays in `info`.
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct FullResponse {
    /// Sent by the server under the `hostname` key.
    pub motd: String,
    pub game_type: String,
    pub map: String,
    pub num_players: u32,
    pub max_players: u32,
    pub host_port: u16,
    pub host_ip: String,
    /// Remaining key/value pairs, keys in the casing the server used.
    pub info: BTreeMap<String, String>,
    /// Online player names in the order the server sent them.
    pub players: Vec<String>,
}

impl std::fmt::Display for FullResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            serde_json::to_string_pretty(self).map_err(|_| std::fmt::Error)?
        )
    }
}

impl FullResponse {
    /// Game id, always `MINECRAFT` for vanilla servers.
    pub fn game_id(&self) -> Option<&str> {
        self.info_value("game_id")
    }

    pub fn version(&self) -> Option<&str> {
        self.info_value("version")
    }

    /// Server mod and its plugin list, parsed from the `plugins` entry.
    ///
    /// Plugin format: `[SERVER_MOD_NAME[: PLUGIN_NAME(; PLUGIN_NAME...)]]`.
    /// Vanilla servers send an empty value, which yields `None`.
    pub fn plugins(&self) -> Option<ModPlugin> {
        ModPlugin::parse(self.info_value("plugins")?)
    }

    fn info_value(&self, key: &str) -> Option<&str> {
        self.info
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

/// Server mod name with the plugins it reports.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ModPlugin {
    pub mod_name: String,
    pub plugins: Vec<String>,
}

impl std::fmt::Display for ModPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            serde_json::to_string_pretty(self).map_err(|_| std::fmt::Error)?
        )
    }
}

impl ModPlugin {
    pub fn parse(plugin_str: &str) -> Option<Self> {
        let plugin_str = plugin_str.trim();

        if plugin_str.is_empty() {
            return None;
        }

        // Only the first colon separates the mod name, plugin names may contain more.
        match plugin_str.split_once(':') {
            Some((mod_name, plugins)) => Some(Self {
                mod_name: mod_name.trim().into(),
                plugins: plugins
                    .split(';')
                    .map(|x| x.trim())
                    .filter(|x| !x.is_empty())
                    .map(String::from)
                    .collect(),
            }),
            None => Some(Self {
                mod_name: plugin_str.into(),
                plugins: vec![],
            }),
        }
    }
}
