// Linkauth — CLI Module
//
// Command-line interface using clap derive macros. Connection settings are
// global flags with environment fallback.
// Subcommands: serve, add, list, get, field, modify, delete, exists, authenticate.

mod commands;

use std::net::SocketAddr;

use clap::{Parser, Subcommand};

pub use commands::execute;

use crate::config::{
    Settings, DEFAULT_BIND, DEFAULT_RABBIT_URL, DEFAULT_REALM, DEFAULT_REDIS_URL,
};
use crate::error::Result;
use crate::messenger::{RetryPolicy, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_SLEEP_START};

/// Linkauth — credential store with an audited HTTP gateway.
#[derive(Parser, Debug)]
#[command(name = "linkauth")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Keyed store URL.
    #[arg(long, global = true, env = "LINKAUTH_REDIS_URL", default_value = DEFAULT_REDIS_URL)]
    pub redis_url: String,

    /// AMQP broker URL for jobs and audit events.
    #[arg(long, global = true, env = "LINKAUTH_RABBIT_URL", default_value = DEFAULT_RABBIT_URL)]
    pub rabbit_url: String,

    /// Address the gateway listens on.
    #[arg(long, global = true, env = "LINKAUTH_BIND", default_value = DEFAULT_BIND)]
    pub bind: SocketAddr,

    /// Realm advertised in Basic-Auth challenges.
    #[arg(long, global = true, env = "LINKAUTH_REALM", default_value = DEFAULT_REALM)]
    pub realm: String,

    /// Consecutive failed broker connects before giving up.
    #[arg(long, global = true, env = "LINKAUTH_MAX_RETRIES", default_value_t = DEFAULT_MAX_RETRIES)]
    pub max_retries: u32,

    /// Base of the quadratic reconnect backoff, in seconds.
    #[arg(long, global = true, env = "LINKAUTH_RETRY_SLEEP_START", default_value_t = DEFAULT_RETRY_SLEEP_START)]
    pub retry_sleep_start: f64,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Validate the connection flags into runtime settings.
    pub fn settings(&self) -> Result<Settings> {
        Settings::new(
            self.redis_url.clone(),
            self.rabbit_url.clone(),
            self.bind,
            self.realm.clone(),
            RetryPolicy {
                max_retries: self.max_retries,
                retry_sleep_start: self.retry_sleep_start,
            },
        )
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP gateway until interrupted.
    Serve,

    /// Add a new user.
    Add {
        username: String,

        /// The password. For production use, prefer the environment
        /// variable to avoid shell history exposure.
        #[arg(long, env = "LINKAUTH_PASSWORD", hide_env_values = true)]
        password: String,

        /// The password is already an argon2 PHC string; store it as-is.
        #[arg(long)]
        encrypted: bool,

        /// Mark the account as a system (service) account.
        #[arg(long)]
        system: bool,

        /// Extra field as `name=value`; may be repeated.
        #[arg(long = "field", value_parser = parse_field)]
        fields: Vec<(String, String)>,
    },

    /// List all users (passwords redacted).
    List,

    /// Show one user (password redacted).
    Get { username: String },

    /// Show a single field of a user.
    Field { username: String, field: String },

    /// Change fields of an existing user.
    Modify {
        username: String,

        #[arg(long, env = "LINKAUTH_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        #[arg(long, requires = "password")]
        encrypted: bool,

        /// Set or clear the system-account flag.
        #[arg(long)]
        system: Option<bool>,

        /// Field as `name=value`; may be repeated.
        #[arg(long = "field", value_parser = parse_field)]
        fields: Vec<(String, String)>,
    },

    /// Delete a user.
    Delete { username: String },

    /// Check whether a user exists.
    Exists { username: String },

    /// Check a user's password.
    Authenticate {
        username: String,

        #[arg(long, env = "LINKAUTH_PASSWORD", hide_env_values = true)]
        password: String,

        /// Require a system account.
        #[arg(long)]
        system: bool,
    },
}

/// Parse a `name=value` pair.
fn parse_field(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(format!("expected name=value, got {:?}", raw)),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
