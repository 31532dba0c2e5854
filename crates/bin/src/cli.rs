//! CLI argument definitions for the liftcash-session binary.

use std::{path::PathBuf, time::Duration};

use clap::{Parser, Subcommand};
use liftcash_session::{
    Network, SessionConfig, SessionMode,
    config::ConfigError,
    constants::{COMMUNITY_SERVICE, ECONOMY_SERVICE},
};

use crate::output::OutputFormat;

/// Lift Cash session manager
#[derive(Parser, Debug)]
#[command(name = "liftcash-session")]
#[command(about = "Log in to Lift Cash and inspect the current session")]
#[command(version)]
pub struct Cli {
    /// Output format
    #[arg(long, default_value = "human", global = true)]
    pub format: OutputFormat,

    #[command(flatten)]
    pub config: ConfigArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the current session
    Status,
    /// Log in through the identity provider
    Login,
    /// Log out and forget the stored credential
    Logout,
    /// Print the session and every change this process makes, until interrupted
    Watch,
    /// Check that the replica host answers
    Health(HealthArgs),
}

/// Session configuration, read once at startup
#[derive(clap::Args, Debug)]
pub struct ConfigArgs {
    /// Synthesize a signed-in user instead of using the identity provider
    #[arg(long, env = "LIFTCASH_DEMO_MODE")]
    pub demo: bool,

    /// Network name; `ic` is mainnet, anything else a local replica
    #[arg(long, default_value = "local", env = "DFX_NETWORK")]
    pub network: String,

    /// Identity provider URL (defaults per network)
    #[arg(long, env = "LIFTCASH_IDENTITY_PROVIDER")]
    pub identity_provider: Option<String>,

    /// Replica host URL (defaults per network)
    #[arg(long, env = "LIFTCASH_HOST")]
    pub host: Option<String>,

    /// Canister id of the community service
    #[arg(long, env = "CANISTER_ID_COMMUNITY_BACKEND")]
    pub community_canister: Option<String>,

    /// Canister id of the economy service
    #[arg(long, env = "CANISTER_ID_ECONOMY_BACKEND")]
    pub economy_canister: Option<String>,

    /// Seconds to wait for the identity provider; 0 waits forever
    #[arg(long, default_value_t = 300, env = "LIFTCASH_LOGIN_TIMEOUT")]
    pub login_timeout: u64,

    /// Requested delegation lifetime in seconds
    #[arg(long, default_value_t = 8 * 60 * 60, env = "LIFTCASH_MAX_TIME_TO_LIVE")]
    pub max_time_to_live: u64,

    /// Loopback port for the login callback; 0 picks a free port
    #[arg(long, default_value_t = 0, env = "LIFTCASH_CALLBACK_PORT")]
    pub callback_port: u16,

    /// Directory for session.json; storage stays in memory when unset
    #[arg(short = 'D', long, env = "LIFTCASH_DATA_DIR")]
    pub data_dir: Option<PathBuf>,
}

impl ConfigArgs {
    pub fn to_config(&self) -> Result<SessionConfig, ConfigError> {
        let mut config = SessionConfig::new(
            SessionMode::from_demo_flag(self.demo),
            Network::from_name(&self.network),
        )?
        .with_login_timeout_secs(self.login_timeout)
        .with_callback_port(self.callback_port);
        config.max_time_to_live = Duration::from_secs(self.max_time_to_live);

        if let Some(url) = &self.identity_provider {
            config = config.with_identity_provider(url)?;
        }
        if let Some(url) = &self.host {
            config = config.with_host(url)?;
        }
        if let Some(id) = &self.community_canister {
            config = config.with_canister_id(COMMUNITY_SERVICE, id)?;
        }
        if let Some(id) = &self.economy_canister {
            config = config.with_canister_id(ECONOMY_SERVICE, id)?;
        }
        if let Some(dir) = &self.data_dir {
            config = config.with_data_dir(dir);
        }
        Ok(config)
    }
}

/// Arguments for the health command
#[derive(clap::Args, Debug)]
pub struct HealthArgs {
    /// Timeout in seconds
    #[arg(short, long, default_value_t = 5)]
    pub timeout: u64,
}
