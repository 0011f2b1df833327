//! Command-line interface definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "audiograde")]
#[command(about = "Surface random albums with unrated tracks from a Plex library and rate them")]
#[command(version)]
pub struct Args {
    /// Settings file (defaults to the user config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Auth token, overriding the one stored in the system keyring
    #[arg(long, env = "PLEX_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum ThresholdKind {
    /// Minimum share of unrated tracks, 0-100
    Percentage,
    /// Minimum number of unrated tracks, 1-1000
    Count,
}

impl ThresholdKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Percentage => crate::threshold::KIND_PERCENTAGE,
            Self::Count => crate::threshold::KIND_COUNT,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Verify a server connection and store its URL and the `--token` value
    Login {
        /// Server base URL, e.g. http://localhost:32400
        #[arg(long)]
        server: String,
    },
    /// Forget the stored token and selected library
    Logout,
    /// Delete all local settings and the stored token
    Reset,
    /// List music libraries on the server
    Libraries,
    /// Select the library albums are drawn from
    UseLibrary {
        /// Library id as shown by `libraries`
        id: String,
    },
    /// Set which albums qualify
    Threshold {
        kind: ThresholdKind,
        /// Stored as given; out-of-range values are clamped when albums are
        /// evaluated and unreadable ones fall back to the default
        value: String,
    },
    /// Show the effective settings
    Settings,
    /// Pick one album and print it
    Next,
    /// Interactive rating loop (the default)
    Rate,
}
