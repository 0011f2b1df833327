//! Credential-storage helpers for the media server auth token.

use keyring::Entry;

const PLEX_SERVICE_NAME: &str = "audiograde.plex";

fn plex_entry(server_url: &str) -> Result<Entry, String> {
    Entry::new(PLEX_SERVICE_NAME, server_url)
        .map_err(|err| format!("failed to create keyring entry for server '{server_url}': {err}"))
}

fn keyring_error_hint(error: &str) -> Option<String> {
    if error.contains("org.freedesktop.DBus.Error.ServiceUnknown") {
        return Some(
            "no Secret Service provider is available. Start GNOME Keyring or KeePassXC Secret Service, or pass the token with --token / PLEX_TOKEN."
                .to_string(),
        );
    }
    None
}

fn format_keyring_error(operation: &str, server_url: &str, error: &str) -> String {
    let base = format!("{operation} failed in system keyring for server '{server_url}': {error}");
    match keyring_error_hint(error) {
        Some(hint) => format!("{base}. Hint: {hint}"),
        None => base,
    }
}

/// Saves the auth token for a server into the OS keyring.
pub fn set_plex_token(server_url: &str, token: &str) -> Result<(), String> {
    let entry = plex_entry(server_url)?;
    entry.set_password(token).map_err(|err| {
        let detail = format!("failed to set keyring password: {err}");
        format_keyring_error("save Plex token", server_url, detail.as_str())
    })
}

/// Loads the auth token for a server from the OS keyring.
pub fn get_plex_token(server_url: &str) -> Result<Option<String>, String> {
    let entry = plex_entry(server_url)?;
    match entry.get_password() {
        Ok(token) => Ok(Some(token)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(err) => {
            let detail = format!("failed to get keyring password: {err}");
            Err(format_keyring_error(
                "load Plex token",
                server_url,
                detail.as_str(),
            ))
        }
    }
}

/// Removes the stored auth token. A missing entry is not an error.
pub fn delete_plex_token(server_url: &str) -> Result<(), String> {
    let entry = plex_entry(server_url)?;
    match entry.delete_password() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(err) => {
            let detail = format!("failed to delete keyring password: {err}");
            Err(format_keyring_error(
                "forget Plex token",
                server_url,
                detail.as_str(),
            ))
        }
    }
}
