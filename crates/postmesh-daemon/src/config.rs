//! CLI argument parsing, environment and config file support.
//!
//! Resolution precedence, lowest to highest: built-in defaults, JSON
//! config file, environment variables, CLI flags. The environment
//! variable set matches what the relay consumes at startup:
//! `P2P_BOOTSTRAPPERS`, `P2P_ANNOUNCES`, `P2P_PORT`, `P2P_PEER_ID`,
//! `P2P_SWARM_KEY`, plus `HTTP_PORT` and `SYNC_TOPIC`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use postmesh_types::{PostmeshError, Result};

/// Default HTTP listen port.
const DEFAULT_HTTP_PORT: u16 = 6612;

/// Default peer transport port.
const DEFAULT_P2P_PORT: u16 = 9000;

/// Default gossip sync topic.
const DEFAULT_SYNC_TOPIC: &str = "sync-topic";

// ---------------------------------------------------------------------------
// CLI arguments (manual parsing, no clap dependency)
// ---------------------------------------------------------------------------

/// Parsed command-line arguments.
#[derive(Default)]
pub struct CliArgs {
    pub http_port: Option<u16>,
    pub p2p_port: Option<u16>,
    pub peer_id_file: Option<PathBuf>,
    pub swarm_key_file: Option<PathBuf>,
    pub bootstrap: Vec<String>,
    pub announce: Vec<String>,
    pub topic: Option<String>,
    pub config_path: Option<PathBuf>,
}

impl CliArgs {
    /// Parses CLI arguments from `std::env::args`.
    pub fn parse_from_env() -> Self {
        let args: Vec<String> = std::env::args().collect();
        let mut cli = Self::default();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--http-port" => {
                    i += 1;
                    cli.http_port = args.get(i).and_then(|s| s.parse().ok());
                }
                "--p2p-port" => {
                    i += 1;
                    cli.p2p_port = args.get(i).and_then(|s| s.parse().ok());
                }
                "--peer-id" => {
                    i += 1;
                    cli.peer_id_file = args.get(i).map(PathBuf::from);
                }
                "--swarm-key" => {
                    i += 1;
                    cli.swarm_key_file = args.get(i).map(PathBuf::from);
                }
                "--bootstrap" => {
                    i += 1;
                    if let Some(addr) = args.get(i) {
                        cli.bootstrap.push(addr.clone());
                    }
                }
                "--announce" => {
                    i += 1;
                    if let Some(addr) = args.get(i) {
                        cli.announce.push(addr.clone());
                    }
                }
                "--topic" => {
                    i += 1;
                    cli.topic = args.get(i).cloned();
                }
                "--config" => {
                    i += 1;
                    cli.config_path = args.get(i).map(PathBuf::from);
                }
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                other => {
                    eprintln!("unknown argument: {other}");
                    eprintln!("use --help for usage information");
                    std::process::exit(1);
                }
            }
            i += 1;
        }

        cli
    }
}

// ---------------------------------------------------------------------------
// Config file (JSON)
// ---------------------------------------------------------------------------

/// JSON config file format.
///
/// Example `relay.json`:
/// ```json
/// {
///   "http_port": 6612,
///   "p2p_port": 9011,
///   "peer_id_file": "./peers/.relay1.peerId",
///   "swarm_key_file": "./peers/.swarmKey",
///   "bootstrap_addresses": [
///     "/ip4/203.0.113.1/tcp/9000/p2p/12D3KooW..."
///   ],
///   "sync_topic": "sync-topic"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DaemonConfigFile {
    pub http_port: Option<u16>,
    pub p2p_port: Option<u16>,
    pub peer_id_file: Option<String>,
    pub swarm_key_file: Option<String>,
    pub bootstrap_addresses: Option<Vec<String>>,
    pub announce_addresses: Option<Vec<String>>,
    pub discovery_topics: Option<Vec<String>>,
    pub sync_topic: Option<String>,
}

impl DaemonConfigFile {
    /// Loads and parses a JSON config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| PostmeshError::ConfigError {
            reason: format!("failed to read config file '{}': {e}", path.display()),
        })?;
        serde_json::from_str(&text).map_err(|e| PostmeshError::ConfigError {
            reason: format!("invalid config JSON '{}': {e}", path.display()),
        })
    }
}

// ---------------------------------------------------------------------------
// Resolved config
// ---------------------------------------------------------------------------

/// Fully resolved daemon configuration with all defaults applied.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub http_port: u16,
    pub p2p_port: u16,
    pub peer_id_file: Option<PathBuf>,
    pub swarm_key_file: Option<PathBuf>,
    pub bootstrap: Vec<String>,
    pub announce: Vec<String>,
    pub discovery_topics: Vec<String>,
    pub sync_topic: String,
}

impl DaemonConfig {
    /// Resolves the effective configuration from file, environment and
    /// CLI.
    pub fn resolve(cli: &CliArgs) -> Result<Self> {
        let file = match &cli.config_path {
            Some(path) => DaemonConfigFile::load(path)?,
            None => DaemonConfigFile::default(),
        };
        Ok(Self::merge(file, read_env(), cli))
    }

    /// Applies the precedence: defaults < file < env < CLI.
    fn merge(file: DaemonConfigFile, env: EnvConfig, cli: &CliArgs) -> Self {
        let bootstrap = if !cli.bootstrap.is_empty() {
            cli.bootstrap.clone()
        } else {
            env.bootstrap
                .or(file.bootstrap_addresses)
                .unwrap_or_default()
        };
        let announce = if !cli.announce.is_empty() {
            cli.announce.clone()
        } else {
            env.announce.or(file.announce_addresses).unwrap_or_default()
        };

        Self {
            http_port: cli
                .http_port
                .or(env.http_port)
                .or(file.http_port)
                .unwrap_or(DEFAULT_HTTP_PORT),
            p2p_port: cli
                .p2p_port
                .or(env.p2p_port)
                .or(file.p2p_port)
                .unwrap_or(DEFAULT_P2P_PORT),
            peer_id_file: cli
                .peer_id_file
                .clone()
                .or(env.peer_id_file.map(PathBuf::from))
                .or(file.peer_id_file.map(PathBuf::from)),
            swarm_key_file: cli
                .swarm_key_file
                .clone()
                .or(env.swarm_key_file.map(PathBuf::from))
                .or(file.swarm_key_file.map(PathBuf::from)),
            bootstrap,
            announce,
            discovery_topics: file.discovery_topics.unwrap_or_default(),
            sync_topic: cli
                .topic
                .clone()
                .or(env.sync_topic)
                .or(file.sync_topic)
                .unwrap_or_else(|| DEFAULT_SYNC_TOPIC.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

#[derive(Default)]
struct EnvConfig {
    http_port: Option<u16>,
    p2p_port: Option<u16>,
    peer_id_file: Option<String>,
    swarm_key_file: Option<String>,
    bootstrap: Option<Vec<String>>,
    announce: Option<Vec<String>>,
    sync_topic: Option<String>,
}

fn read_env() -> EnvConfig {
    EnvConfig {
        http_port: env_port("HTTP_PORT"),
        p2p_port: env_port("P2P_PORT"),
        peer_id_file: env_string("P2P_PEER_ID"),
        swarm_key_file: env_string("P2P_SWARM_KEY"),
        bootstrap: env_string("P2P_BOOTSTRAPPERS").map(|s| split_list(&s)),
        announce: env_string("P2P_ANNOUNCES").map(|s| split_list(&s)),
        sync_topic: env_string("SYNC_TOPIC"),
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn env_port(name: &str) -> Option<u16> {
    env_string(name).and_then(|value| value.trim().parse().ok())
}

/// Splits a comma-separated list, dropping empty entries.
fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

fn print_help() {
    println!(
        r#"postmesh-daemon - wallet-signed message relay node

USAGE:
    postmesh-daemon [OPTIONS]

OPTIONS:
    --http-port <PORT>      HTTP listen port (default: 6612)
    --p2p-port <PORT>       Peer transport port (default: 9000)
    --peer-id <PATH>        Peer identity file (generated when missing)
    --swarm-key <PATH>      Private swarm key file
    --bootstrap <ADDR>      Add a bootstrap multiaddr (repeatable, required)
    --announce <ADDR>       Add an announced multiaddr (repeatable)
    --topic <NAME>          Gossip sync topic (default: sync-topic)
    --config <PATH>         Load settings from a JSON config file
    -h, --help              Show this help

EXAMPLES:
    # Run a relay on custom ports with a persisted identity
    postmesh-daemon --http-port 6612 --p2p-port 9011 \
        --peer-id ./peers/.relay1.peerId \
        --bootstrap /ip4/203.0.113.1/tcp/9000/p2p/12D3KooW...

ENVIRONMENT:
    P2P_BOOTSTRAPPERS       Comma-separated bootstrap multiaddrs (required
                            unless --bootstrap or a config file is given)
    P2P_ANNOUNCES           Comma-separated announced multiaddrs
    P2P_PORT                Peer transport port
    P2P_PEER_ID             Peer identity file path
    P2P_SWARM_KEY           Swarm key file path
    HTTP_PORT               HTTP listen port
    SYNC_TOPIC              Gossip sync topic
    RUST_LOG                Log level filter (default: info)
"#
    );
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_list_drops_blank_entries() {
        let list = split_list("/ip4/1.2.3.4/tcp/9000, ,/ip4/5.6.7.8/tcp/9000,");
        assert_eq!(list.len(), 2);
        assert_eq!(list[0], "/ip4/1.2.3.4/tcp/9000");
    }

    #[test]
    fn cli_overrides_file_values() {
        let file = DaemonConfigFile {
            http_port: Some(8000),
            p2p_port: Some(9100),
            bootstrap_addresses: Some(vec!["/ip4/9.9.9.9/tcp/9000".into()]),
            sync_topic: Some("file-topic".into()),
            ..DaemonConfigFile::default()
        };
        let cli = CliArgs {
            http_port: Some(6612),
            bootstrap: vec!["/ip4/1.1.1.1/tcp/9000".into()],
            ..CliArgs::default()
        };

        let cfg = DaemonConfig::merge(file, EnvConfig::default(), &cli);
        assert_eq!(cfg.http_port, 6612);
        assert_eq!(cfg.p2p_port, 9100);
        assert_eq!(cfg.bootstrap, vec!["/ip4/1.1.1.1/tcp/9000".to_string()]);
        assert_eq!(cfg.sync_topic, "file-topic");
    }

    #[test]
    fn defaults_apply_when_nothing_is_configured() {
        let cfg = DaemonConfig::merge(
            DaemonConfigFile::default(),
            EnvConfig::default(),
            &CliArgs::default(),
        );
        assert_eq!(cfg.http_port, DEFAULT_HTTP_PORT);
        assert_eq!(cfg.p2p_port, DEFAULT_P2P_PORT);
        assert_eq!(cfg.sync_topic, DEFAULT_SYNC_TOPIC);
        assert!(cfg.bootstrap.is_empty());
        assert!(cfg.peer_id_file.is_none());
    }
}
