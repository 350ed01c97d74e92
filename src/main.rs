use envconfig::Envconfig;
use kube::Client;
use tracing::info;
use vm_gateway::{bootstrap::build_api_server, config::GatewayConfig, init_tracing};

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    init_tracing("info");

    // Ensure rustls uses the aws-lc-rs provider explicitly.
    // This avoids runtime errors when no default provider is set.
    if let Err(e) = rustls::crypto::CryptoProvider::install_default(
        rustls::crypto::aws_lc_rs::default_provider(),
    ) {
        // It's fine if a compatible provider was already installed.
        tracing::debug!(
            ?e,
            "CryptoProvider already installed or incompatible; proceeding"
        );
    }

    let cfg = GatewayConfig::init_from_env()?;
    info!(?cfg, "Starting vm-gateway");

    let client = Client::try_default().await?;
    let server = build_api_server(client, cfg).await?;
    server.serve().await
}
