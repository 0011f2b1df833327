mod app_runtime;
mod backends;
mod catalog;
mod cli;
mod config;
mod config_persistence;
mod integration_keyring;
mod media_urls;
mod rating_writer;
mod recently_shown;
mod sampler;
mod threshold;

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::Parser;
use log::{debug, info};

use app_runtime::{render_album, RaterSession};
use backends::plex::PlexAdapter;
use backends::{MediaBackendAdapter, PlexServerAuth};
use catalog::{music_libraries, RatingBatch};
use cli::{Args, Command};
use config::{sanitize_config, Config, ThresholdConfig};
use config_persistence::{
    default_config_path, load_config_file, persist_config_file, remove_config_file,
};
use sampler::{AlbumSampler, SelectionError};
use threshold::{normalize_policy, RawThreshold};

fn resolve_token(args: &Args, config: &Config) -> Result<String, String> {
    if let Some(token) = args.token.as_deref().map(str::trim) {
        if !token.is_empty() {
            return Ok(token.to_string());
        }
    }
    integration_keyring::get_plex_token(&config.server.url)?.ok_or_else(|| {
        format!(
            "no token stored for {}. Run `audiograde login --server URL --token TOKEN` first.",
            config.server.url
        )
    })
}

fn connect(args: &Args, config: &Config) -> Result<PlexAdapter, String> {
    let token = resolve_token(args, config)?;
    Ok(PlexAdapter::new(
        PlexServerAuth::new(&config.server.url, &token),
        config.selection.request_timeout(),
    ))
}

fn login(args: &Args, config: &mut Config, config_file: &Path, server: &str) -> Result<(), String> {
    let token = args
        .token
        .as_deref()
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| "login needs a token: pass --token or set PLEX_TOKEN".to_string())?;
    let auth = PlexServerAuth::new(server, token);
    let adapter = PlexAdapter::new(auth.clone(), config.selection.request_timeout());
    adapter
        .test_connection()
        .map_err(|err| format!("could not connect to {}: {err}", auth.endpoint))?;

    if config.server.url != auth.endpoint {
        config.library.selected_library_id.clear();
    }
    config.server.url = auth.endpoint.clone();
    *config = sanitize_config(config.clone());
    persist_config_file(config, config_file)?;
    integration_keyring::set_plex_token(&config.server.url, &auth.token)?;
    info!("Logged in to {}", config.server.url);
    Ok(())
}

fn logout(config: &mut Config, config_file: &Path) -> Result<(), String> {
    integration_keyring::delete_plex_token(&config.server.url)?;
    config.library.selected_library_id.clear();
    persist_config_file(config, config_file)?;
    info!("Logged out of {}", config.server.url);
    Ok(())
}

fn reset(config: &Config, config_file: &Path) -> Result<(), String> {
    integration_keyring::delete_plex_token(&config.server.url)?;
    remove_config_file(config_file)?;
    info!("Removed settings at {}", config_file.display());
    Ok(())
}

fn print_settings(config: &Config, config_file: &Path) {
    let policy = normalize_policy(&config.threshold.raw());
    println!("config file: {}", config_file.display());
    println!("server:      {}", config.server.url);
    println!(
        "library:     {}",
        config.library.selected().unwrap_or("(not selected)")
    );
    println!(
        "threshold:   {} {} (stored as kind={:?} value={:?}; {policy})",
        policy.kind(),
        policy.value(),
        config.threshold.kind,
        config.threshold.value
    );
    println!("timeout:     {}s", config.selection.timeout_secs);
}

fn run(mut args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config_file: PathBuf = match args.config.clone() {
        Some(path) => path,
        None => default_config_path()?,
    };
    let mut config = load_config_file(&config_file);
    debug!(
        "Loaded settings from {} (server={})",
        config_file.display(),
        config.server.url
    );

    let command = args.command.take().unwrap_or(Command::Rate);
    match command {
        Command::Login { server } => {
            login(&args, &mut config, &config_file, &server)?;
            println!("Connected to {}.", config.server.url);
        }
        Command::Logout => {
            logout(&mut config, &config_file)?;
            println!("Logged out.");
        }
        Command::Reset => {
            reset(&config, &config_file)?;
            println!("All local settings removed.");
        }
        Command::Libraries => {
            let adapter = connect(&args, &config)?;
            let libraries = music_libraries(&adapter)?;
            if libraries.is_empty() {
                println!("No music libraries found.");
            }
            for library in libraries {
                let marker = if config.library.selected() == Some(library.id.as_str()) {
                    '*'
                } else {
                    ' '
                };
                println!("{marker} {:>4}  {}", library.id, library.title);
            }
        }
        Command::UseLibrary { id } => {
            config.library.selected_library_id = id.trim().to_string();
            persist_config_file(&config, &config_file)?;
            println!("Using library {}.", config.library.selected_library_id);
        }
        Command::Threshold { kind, value } => {
            let raw = RawThreshold {
                kind: kind.as_str().to_string(),
                value: value.trim().to_string(),
            };
            let policy = normalize_policy(&raw);
            config.threshold = ThresholdConfig::from(raw);
            persist_config_file(&config, &config_file)?;
            println!("Showing albums with {policy}.");
        }
        Command::Settings => print_settings(&config, &config_file),
        Command::Next => {
            let adapter = connect(&args, &config)?;
            let mut session =
                RaterSession::new(adapter, AlbumSampler::new(), config, config_file);
            let library = session.resolve_library()?;
            debug!(
                "Selecting from {} with {}",
                library.title,
                normalize_policy(&session.config().threshold.raw())
            );
            match session.next_album(&library.id) {
                Ok(album) => println!("{}", render_album(album, &RatingBatch::new())),
                Err(SelectionError::NotFound { .. }) => {
                    println!("No albums found matching the current criteria.")
                }
                Err(err) => return Err(err.into()),
            }
        }
        Command::Rate => {
            let adapter = connect(&args, &config)?;
            let mut session =
                RaterSession::new(adapter, AlbumSampler::new(), config, config_file);
            let library = session.resolve_library()?;
            println!("Library: {}", library.title);
            let stdin = io::stdin();
            let stdout = io::stdout();
            session.run_interactive(&library.id, stdin.lock(), stdout.lock())?;
            io::stdout().flush()?;
        }
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut clog = colog::default_builder();
    clog.filter(
        None,
        if args.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        },
    );
    clog.init();

    std::panic::set_hook(Box::new(|panic_info| {
        let current_thread = std::thread::current();
        let thread_name = current_thread.name().unwrap_or("unnamed");
        log::error!("panic in thread '{}': {}", thread_name, panic_info);
    }));

    run(args)
}
