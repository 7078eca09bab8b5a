pub mod discover;
pub mod order;
pub mod relocate;
pub mod show;

use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use portall_common::config::{DEFAULT_MAX_MERGE_DEFERRALS, EngineConfig};
use portall_common::model::port::PortKey;
use portall_core::AuthorityConfig;
use portall_core::authority::DEFAULT_BASE_URL;

#[derive(Parser)]
#[command(name = "portall")]
#[command(about = "Keep a Portall port registry tidy from the terminal.")]
pub struct CommandLine {
    /// Base URL of the Portall server
    #[arg(long, global = true, env = "PORTALL_URL", default_value = DEFAULT_BASE_URL)]
    pub url: String,

    /// Request timeout in seconds
    #[arg(long, global = true, env = "PORTALL_TIMEOUT_SECS", default_value_t = 10)]
    pub timeout: u64,

    /// Times a discovered batch may wait behind a busy host before it is dropped
    #[arg(
        long,
        global = true,
        env = "PORTALL_MAX_DEFERRALS",
        default_value_t = DEFAULT_MAX_MERGE_DEFERRALS
    )]
    pub max_deferrals: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print every host and its ports in display order
    #[command(alias = "s")]
    Show,
    /// Move a port to another host, or to another position on the same host
    #[command(alias = "mv")]
    Move {
        /// Port as `80`, `80/tcp` or `53/udp`
        port: PortKey,
        source: String,
        target: String,
        /// Drop position in the target host's list (appends when omitted)
        #[arg(long, short)]
        position: Option<usize>,
    },
    /// Persist a new port order for one host
    #[command(alias = "o")]
    Order {
        host: String,
        /// Every port of the host, in the new order
        #[arg(required = true)]
        ports: Vec<PortKey>,
    },
    /// Import published ports from a container platform
    #[command(alias = "d")]
    Discover {
        #[command(subcommand)]
        from: DiscoverFrom,
    },
}

#[derive(Subcommand)]
pub enum DiscoverFrom {
    /// A Docker daemon listening on TCP
    Docker(DockerArgs),
    /// A Portainer instance
    Portainer(PortainerArgs),
}

#[derive(Args)]
pub struct DockerArgs {
    /// Address recorded for ports bound to all interfaces
    #[arg(long, env = "PORTALL_DOCKER_HOST_IP")]
    pub host_ip: String,

    /// Daemon URL, e.g. `tcp://192.168.1.10:2375`
    #[arg(long, env = "PORTALL_DOCKER_URL")]
    pub socket_url: String,
}

#[derive(Args)]
pub struct PortainerArgs {
    #[arg(long, env = "PORTALL_PORTAINER_URL")]
    pub url: String,

    /// API access token
    #[arg(long, env = "PORTALL_PORTAINER_TOKEN", hide_env_values = true)]
    pub token: String,

    /// Portainer environment id
    #[arg(long, default_value_t = portall_plugins::portainer::DEFAULT_ENDPOINT)]
    pub endpoint: u32,
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn authority_config(&self) -> AuthorityConfig {
        AuthorityConfig {
            base_url: self.url.clone(),
            timeout: Duration::from_secs(self.timeout),
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_merge_deferrals: self.max_deferrals,
        }
    }
}
