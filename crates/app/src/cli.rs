//! Command line definition.

use clap::{Parser, Subcommand};
use tally_infrastructure::config::{ENV_API_BASE_URL, ENV_SESSION_URL};

/// Authenticated client for the Tally backend.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Backend base URL
    #[arg(long, env = ENV_API_BASE_URL, global = true)]
    pub base_url: Option<String>,

    /// Session service base URL
    #[arg(long, env = ENV_SESSION_URL, global = true)]
    pub session_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Value given on the command line for an environment variable.
    pub fn override_for(&self, name: &str) -> Option<String> {
        match name {
            ENV_API_BASE_URL => self.base_url.clone(),
            ENV_SESSION_URL => self.session_url.clone(),
            _ => None,
        }
    }
}

/// Request to issue.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Send a GET request
    Get {
        /// Path relative to the base URL
        path: String,
        /// Query parameter as key=value (repeatable)
        #[arg(short, long = "query", value_parser = parse_key_val)]
        query: Vec<(String, String)>,
    },
    /// Send a POST request
    Post {
        /// Path relative to the base URL
        path: String,
        /// JSON body
        #[arg(short, long)]
        data: Option<String>,
    },
    /// Send a PUT request
    Put {
        /// Path relative to the base URL
        path: String,
        /// JSON body
        #[arg(short, long)]
        data: Option<String>,
    },
    /// Send a PATCH request
    Patch {
        /// Path relative to the base URL
        path: String,
        /// JSON body
        #[arg(short, long)]
        data: Option<String>,
    },
    /// Send a DELETE request
    Delete {
        /// Path relative to the base URL
        path: String,
    },
    /// Show the current session's token status
    Status,
}

fn parse_key_val(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))
}
