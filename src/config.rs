//! Persistent application configuration model and defaults.

use std::time::Duration;

use crate::sampler::DEFAULT_SELECTION_BUDGET;
use crate::threshold::{RawThreshold, KIND_PERCENTAGE};

pub const DEFAULT_SERVER_URL: &str = "http://localhost:32400";
const DEFAULT_SELECTION_TIMEOUT_SECS: u64 = DEFAULT_SELECTION_BUDGET.as_secs();
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
const MIN_TIMEOUT_SECS: u64 = 1;
const MAX_TIMEOUT_SECS: u64 = 120;

/// Root configuration persisted to `config.toml`.
///
/// The auth token is deliberately absent; it lives in the system keyring.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Config {
    #[serde(default)]
    /// Media server connection.
    pub server: ServerConfig,
    #[serde(default)]
    /// Library chosen for album selection.
    pub library: LibraryConfig,
    #[serde(default)]
    /// Unrated-track threshold, stored verbatim.
    pub threshold: ThresholdConfig,
    #[serde(default)]
    /// Time budgets for selection and individual requests.
    pub selection: SelectionConfig,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_url")]
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct LibraryConfig {
    /// Empty when no library has been chosen yet.
    #[serde(default)]
    pub selected_library_id: String,
}

/// Raw threshold settings. Values are strings so that hand edits reach
/// `normalize_policy` unchanged.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct ThresholdConfig {
    #[serde(default = "default_threshold_kind")]
    pub kind: String,
    #[serde(default = "default_threshold_value", deserialize_with = "string_or_integer")]
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct SelectionConfig {
    #[serde(default = "default_selection_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_server_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}

fn default_threshold_kind() -> String {
    KIND_PERCENTAGE.to_string()
}

fn default_threshold_value() -> String {
    RawThreshold::default().value
}

fn default_selection_timeout_secs() -> u64 {
    DEFAULT_SELECTION_TIMEOUT_SECS
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

/// Accepts `value = 50` as well as `value = "50"` for hand-edited files.
fn string_or_integer<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(serde::Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Integer(i64),
    }
    Ok(match <Raw as serde::Deserialize>::deserialize(deserializer)? {
        Raw::Text(text) => text,
        Raw::Integer(number) => number.to_string(),
    })
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: default_server_url(),
        }
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self::from(RawThreshold::default())
    }
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_SELECTION_TIMEOUT_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl From<RawThreshold> for ThresholdConfig {
    fn from(raw: RawThreshold) -> Self {
        Self {
            kind: raw.kind,
            value: raw.value,
        }
    }
}

impl ThresholdConfig {
    pub fn raw(&self) -> RawThreshold {
        RawThreshold {
            kind: self.kind.clone(),
            value: self.value.clone(),
        }
    }
}

impl LibraryConfig {
    pub fn selected(&self) -> Option<&str> {
        let trimmed = self.selected_library_id.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}

impl SelectionConfig {
    pub fn selection_budget(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Normalizes values that would otherwise break the client.
///
/// Threshold settings are left untouched: their fallback rules apply at
/// selection time.
pub fn sanitize_config(mut config: Config) -> Config {
    let url = config.server.url.trim().trim_end_matches('/');
    config.server.url = if url.is_empty() {
        default_server_url()
    } else {
        url.to_string()
    };
    config.library.selected_library_id = config.library.selected_library_id.trim().to_string();
    config.selection.timeout_secs = config
        .selection
        .timeout_secs
        .clamp(MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS);
    config.selection.request_timeout_secs = config
        .selection
        .request_timeout_secs
        .clamp(MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS);
    config
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{sanitize_config, Config, DEFAULT_SERVER_URL};

    #[test]
    fn test_default_config_has_expected_values() {
        let config = Config::default();

        assert_eq!(config.server.url, DEFAULT_SERVER_URL);
        assert_eq!(config.library.selected(), None);
        assert_eq!(config.threshold.kind, "percentage");
        assert_eq!(config.threshold.value, "50");
        assert_eq!(config.selection.selection_budget(), Duration::from_secs(10));
        assert_eq!(config.selection.request_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_partial_config_deserialization_fills_defaults() {
        let partial_config_toml = r#"
[server]
url = "http://nas.local:32400"

[threshold]
kind = "count"
"#;

        let parsed: Config = toml::from_str(partial_config_toml).expect("config should parse");
        assert_eq!(parsed.server.url, "http://nas.local:32400");
        assert_eq!(parsed.threshold.kind, "count");
        assert_eq!(parsed.threshold.value, "50");
        assert_eq!(parsed.selection.timeout_secs, 10);
        assert!(parsed.library.selected_library_id.is_empty());
    }

    #[test]
    fn test_threshold_value_accepts_bare_integer() {
        let parsed: Config = toml::from_str("[threshold]\nkind = \"count\"\nvalue = 4\n")
            .expect("config should parse");
        assert_eq!(parsed.threshold.value, "4");
    }

    #[test]
    fn test_invalid_threshold_values_survive_parsing_verbatim() {
        let parsed: Config =
            toml::from_str("[threshold]\nkind = \"sometimes\"\nvalue = \"many\"\n")
                .expect("config should parse");
        assert_eq!(parsed.threshold.kind, "sometimes");
        assert_eq!(parsed.threshold.value, "many");
    }

    #[test]
    fn test_sanitize_config_trims_url_and_clamps_timeouts() {
        let mut input = Config::default();
        input.server.url = " http://plex.local:32400/ ".to_string();
        input.library.selected_library_id = " 4 ".to_string();
        input.selection.timeout_secs = 0;
        input.selection.request_timeout_secs = 9_000;

        let sanitized = sanitize_config(input);
        assert_eq!(sanitized.server.url, "http://plex.local:32400");
        assert_eq!(sanitized.library.selected(), Some("4"));
        assert_eq!(sanitized.selection.timeout_secs, 1);
        assert_eq!(sanitized.selection.request_timeout_secs, 120);
    }

    #[test]
    fn test_sanitize_config_restores_empty_server_url() {
        let mut input = Config::default();
        input.server.url = "   ".to_string();
        assert_eq!(sanitize_config(input).server.url, DEFAULT_SERVER_URL);
    }
}
