//! Relay - multi-agent web app builder orchestrator
//!
//! Launcher: loads configuration and either serves the orchestrator or, with
//! `--check`, probes every configured agent once and exits.

use anyhow::Context;
use relay_core::config::{load_config, load_from_file};
use relay_core::RelayConfig;
use relay_server::AppState;
use std::path::PathBuf;

const USAGE: &str = "Usage: relay [--port <port>] [--config <file>] [--check]";

/// Command-line arguments
#[derive(Debug, Default, PartialEq)]
struct Args {
    /// Port override
    port: Option<u16>,
    /// Explicit config file, bypassing the search
    config: Option<PathBuf>,
    /// Probe agents and exit
    check: bool,
    help: bool,
}

impl Args {
    /// Parse command-line arguments
    fn parse() -> anyhow::Result<Self> {
        Self::from_args(std::env::args().skip(1))
    }

    fn from_args(args: impl IntoIterator<Item = String>) -> anyhow::Result<Self> {
        let mut parsed = Self::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--port" | "-p" => {
                    let value = args.next().context("--port needs a value")?;
                    let port = value
                        .parse()
                        .with_context(|| format!("invalid port: {}", value))?;
                    parsed.port = Some(port);
                }
                "--config" | "-c" => {
                    let value = args.next().context("--config needs a path")?;
                    parsed.config = Some(PathBuf::from(value));
                }
                "--check" => parsed.check = true,
                "--help" | "-h" => parsed.help = true,
                other => anyhow::bail!("unknown argument: {}\n{}", other, USAGE),
            }
        }

        Ok(parsed)
    }
}

fn resolve_config(args: &Args) -> anyhow::Result<RelayConfig> {
    let mut config = match &args.config {
        Some(path) => load_from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => load_config(&std::env::current_dir()?)?,
    };
    if let Some(port) = args.port {
        config.server.port = port;
    }
    Ok(config)
}

/// Probe every agent; fails if any is unreachable
async fn check_agents(config: RelayConfig) -> anyhow::Result<()> {
    let state = AppState::new(config)?;
    let health = state.registry.health_all(state.transport.as_ref()).await;
    let addresses = state.registry.list_all();

    let mut unhealthy = 0;
    for (agent, healthy) in &health {
        let address = addresses.get(agent).map(String::as_str).unwrap_or("?");
        let mark = if *healthy { "ok" } else { "DOWN" };
        println!("{:<10} {:<5} {}", agent, mark, address);
        if !healthy {
            unhealthy += 1;
        }
    }

    if unhealthy > 0 {
        anyhow::bail!("{} of {} agents not responding", unhealthy, health.len());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse()?;
    if args.help {
        println!("{}", USAGE);
        return Ok(());
    }

    relay_server::init_tracing();
    tracing::debug!("Launching with {:?}", args);
    let config = resolve_config(&args)?;

    if args.check {
        return check_agents(config).await;
    }

    relay_server::run_server(config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(args: &[&str]) -> anyhow::Result<Args> {
        Args::from_args(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_no_args() {
        assert_eq!(parse(&[]).unwrap(), Args::default());
    }

    #[test]
    fn test_all_flags() {
        let args = parse(&["--port", "9000", "--config", "relay.toml", "--check"]).unwrap();
        assert_eq!(
            args,
            Args {
                port: Some(9000),
                config: Some(PathBuf::from("relay.toml")),
                check: true,
                help: false,
            }
        );
    }

    #[test]
    fn test_bad_port_and_unknown_flag() {
        assert!(parse(&["--port", "eighty"]).is_err());
        assert!(parse(&["--port"]).is_err());
        assert!(parse(&["--verbose"]).is_err());
    }
}
