use std::path::{Path, PathBuf};

use log::{info, warn};
use toml_edit::{value, DocumentMut, Item, Table};

use crate::config::{sanitize_config, Config};

const APP_DIR_NAME: &str = "audiograde";
const CONFIG_FILE_NAME: &str = "config.toml";

fn set_table_value_preserving_decor(table: &mut Table, key: &str, item: Item) {
    let existing_value_decor = table
        .get(key)
        .and_then(|current| current.as_value().map(|value| value.decor().clone()));
    table[key] = item;
    if let Some(existing_value_decor) = existing_value_decor {
        if let Some(next_value) = table[key].as_value_mut() {
            *next_value.decor_mut() = existing_value_decor;
        }
    }
}

fn set_table_scalar_if_changed<T, F>(
    table: &mut Table,
    key: &str,
    previous_value: T,
    next_value: T,
    to_item: F,
) where
    T: PartialEq,
    F: FnOnce(T) -> Item,
{
    if table.contains_key(key) && previous_value == next_value {
        return;
    }
    set_table_value_preserving_decor(table, key, to_item(next_value));
}

fn ensure_section_table<'a>(document: &'a mut DocumentMut, key: &str) -> &'a mut Table {
    let root = document.as_table_mut();
    let should_replace = !matches!(root.get(key), Some(item) if item.is_table());
    if should_replace {
        root.insert(key, Item::Table(Table::new()));
    }
    root.get_mut(key)
        .and_then(Item::as_table_mut)
        .expect("section table inserted above")
}

fn write_config_to_document(document: &mut DocumentMut, previous: &Config, config: &Config) {
    let server = ensure_section_table(document, "server");
    set_table_scalar_if_changed(
        server,
        "url",
        previous.server.url.as_str(),
        config.server.url.as_str(),
        value,
    );

    let library = ensure_section_table(document, "library");
    set_table_scalar_if_changed(
        library,
        "selected_library_id",
        previous.library.selected_library_id.as_str(),
        config.library.selected_library_id.as_str(),
        value,
    );

    let threshold = ensure_section_table(document, "threshold");
    set_table_scalar_if_changed(
        threshold,
        "kind",
        previous.threshold.kind.as_str(),
        config.threshold.kind.as_str(),
        value,
    );
    set_table_scalar_if_changed(
        threshold,
        "value",
        previous.threshold.value.as_str(),
        config.threshold.value.as_str(),
        value,
    );

    let selection = ensure_section_table(document, "selection");
    set_table_scalar_if_changed(
        selection,
        "timeout_secs",
        previous.selection.timeout_secs,
        config.selection.timeout_secs,
        |secs| value(i64::try_from(secs).unwrap_or(i64::MAX)),
    );
    set_table_scalar_if_changed(
        selection,
        "request_timeout_secs",
        previous.selection.request_timeout_secs,
        config.selection.request_timeout_secs,
        |secs| value(i64::try_from(secs).unwrap_or(i64::MAX)),
    );
}

/// Rewrites `existing_text` with the values of `config`, keeping comments,
/// ordering and unknown keys of the existing document.
pub fn serialize_config_with_preserved_comments(
    existing_text: &str,
    config: &Config,
) -> Result<String, String> {
    let previous = toml::from_str::<Config>(existing_text)
        .map_err(|err| format!("failed to parse existing config as Config: {}", err))?;
    let mut document = existing_text
        .parse::<DocumentMut>()
        .map_err(|err| format!("failed to parse existing config as TOML document: {}", err))?;
    write_config_to_document(&mut document, &previous, config);
    Ok(document.to_string())
}

/// Default location of the settings file.
pub fn default_config_path() -> Result<PathBuf, String> {
    let config_dir =
        dirs::config_dir().ok_or_else(|| "no configuration directory on this system".to_string())?;
    Ok(config_dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Loads settings, falling back to defaults when the file is missing or broken.
pub fn load_config_file(path: &Path) -> Config {
    let config_content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            info!(
                "Config file not found. Using default settings. path={}",
                path.display()
            );
            return Config::default();
        }
        Err(err) => {
            warn!(
                "Failed to read config file {}. Using default settings. error={}",
                path.display(),
                err
            );
            return Config::default();
        }
    };

    match toml::from_str::<Config>(&config_content) {
        Ok(config) => sanitize_config(config),
        Err(err) => {
            warn!(
                "Failed to parse config file {}. Using default settings. error={}",
                path.display(),
                err
            );
            Config::default()
        }
    }
}

pub fn persist_config_file(config: &Config, path: &Path) -> Result<(), String> {
    let existing_text = std::fs::read_to_string(path).ok();
    let config_text = match existing_text {
        Some(existing_text) => {
            match serialize_config_with_preserved_comments(&existing_text, config) {
                Ok(updated_text) => updated_text,
                Err(err) => {
                    warn!(
                        "Failed to preserve config comments for {} ({}). Falling back to plain serialization.",
                        path.display(),
                        err
                    );
                    toml::to_string(config)
                        .map_err(|err| format!("failed to serialize config: {err}"))?
                }
            }
        }
        None => toml::to_string(config).map_err(|err| format!("failed to serialize config: {err}"))?,
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|err| {
            format!("failed to create config directory {}: {err}", parent.display())
        })?;
    }
    std::fs::write(path, config_text)
        .map_err(|err| format!("failed to persist config to {}: {err}", path.display()))
}

/// Deletes the settings file. A missing file is not an error.
pub fn remove_config_file(path: &Path) -> Result<(), String> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(format!(
            "failed to remove config file {}: {err}",
            path.display()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        load_config_file, persist_config_file, remove_config_file,
        serialize_config_with_preserved_comments,
    };
    use crate::config::Config;

    #[test]
    fn test_serialize_preserves_comments_and_unknown_keys() {
        let existing = r#"# my plex box
[server]
url = "http://nas.local:32400" # LAN address

[threshold]
# how picky to be
kind = "percentage"
value = "50"

[extra]
keep_me = true
"#;
        let mut config: Config = toml::from_str(existing).expect("config should parse");
        config.threshold.kind = "count".to_string();
        config.threshold.value = "3".to_string();

        let updated =
            serialize_config_with_preserved_comments(existing, &config).expect("serialize");

        assert!(updated.contains("# my plex box"));
        assert!(updated.contains("# how picky to be"));
        assert!(updated.contains("# LAN address"));
        assert!(updated.contains("kind = \"count\""));
        assert!(updated.contains("value = \"3\""));
        assert!(updated.contains("keep_me = true"));
        let reparsed: Config = toml::from_str(&updated).expect("updated config should parse");
        assert_eq!(reparsed, config);
    }

    #[test]
    fn test_persist_then_load_round_trip_creates_parent_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.library.selected_library_id = "7".to_string();

        persist_config_file(&config, &path).expect("persist");

        assert_eq!(load_config_file(&path), config);
    }

    #[test]
    fn test_load_missing_or_broken_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("missing.toml");
        assert_eq!(load_config_file(&missing), Config::default());

        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "[server\nurl = ").expect("write");
        assert_eq!(load_config_file(&broken), Config::default());
    }

    #[test]
    fn test_persist_over_broken_file_rewrites_it() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "not toml at all [").expect("write");

        persist_config_file(&Config::default(), &path).expect("persist");

        assert_eq!(load_config_file(&path), Config::default());
    }

    #[test]
    fn test_remove_config_file_ignores_missing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        remove_config_file(&path).expect("missing file is fine");

        persist_config_file(&Config::default(), &path).expect("persist");
        remove_config_file(&path).expect("remove");
        assert!(!path.exists());
    }
}
