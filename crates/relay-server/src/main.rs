//! Relay Server Binary
//!
//! Standalone entry point - delegates to lib.

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;
    let mut config = relay_core::load_config(&cwd)?;

    if let Some(port) = std::env::var("PORT").ok().and_then(|p| p.parse().ok()) {
        config.server.port = port;
    }

    relay_server::run_server(config).await
}
