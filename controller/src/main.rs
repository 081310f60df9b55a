use clap::Parser;
use kube::Client;
use kube::config::{Kubeconfig, KubeConfigOptions, Config as KubeConfig};
use replicon_common::cli::{ClusterArgs, TlsArgs};
use rustls::server::WebPkiClientVerifier;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

mod client;
mod health;
mod http;
mod reconcile;
mod scale;
mod state;
#[cfg(test)]
mod test_support;
mod util;

use client::KubeClient;

/// Top-level CLI configuration for the binary.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    tls: TlsArgs,

    #[command(flatten)]
    cluster: ClusterArgs,
}

/// Resolves `POD_NAMESPACE`, falling back to the compile-time default,
/// mirroring `server/client.go`'s `getEnv`.
fn pod_namespace() -> String {
    std::env::var("POD_NAMESPACE").unwrap_or_else(|_| replicon_types::DEFAULT_NAMESPACE.to_string())
}

/// Parses a Go-style `:8443`/`0.0.0.0:8443` bind address into a `SocketAddr`.
fn parse_bind_address(addr: &str) -> anyhow::Result<SocketAddr> {
    let addr = if let Some(port) = addr.strip_prefix(':') {
        format!("0.0.0.0:{port}")
    } else {
        addr.to_string()
    };
    Ok(addr.parse()?)
}

async fn build_client(cluster: &ClusterArgs) -> anyhow::Result<Client> {
    let client = match &cluster.kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path)?;
            let options = KubeConfigOptions {
                cluster: None,
                context: None,
                user: None,
            };
            let mut config = KubeConfig::from_custom_kubeconfig(kubeconfig, &options).await?;
            if let Some(master) = &cluster.master {
                config.cluster_url = master.parse()?;
            }
            Client::try_from(config)?
        }
        None => Client::try_default().await?,
    };
    Ok(client)
}

/// Builds the `rustls::ServerConfig` requiring and verifying client
/// certificates against the CA bundle, matching the original's
/// `tls.Config{ClientAuth: tls.RequireAndVerifyClientCert, ClientCAs: ...,
/// MinVersion: tls.VersionTLS12}` (`main.go`).
fn build_tls_config(tls: &TlsArgs) -> anyhow::Result<rustls::ServerConfig> {
    let cert_chain = load_certs(&tls.tls_cert_file)?;
    let private_key = load_private_key(&tls.tls_private_key_file)?;

    let mut roots = rustls::RootCertStore::empty();
    for cert in load_certs(&tls.ca_cert_file)? {
        roots.add(cert)?;
    }
    let verifier = WebPkiClientVerifier::builder(Arc::new(roots)).build()?;

    let config = rustls::ServerConfig::builder()
        .with_client_cert_verifier(verifier)
        .with_single_cert(cert_chain, private_key)?;
    Ok(config)
}

fn load_certs(path: &str) -> anyhow::Result<Vec<rustls::pki_types::CertificateDer<'static>>> {
    let file = std::fs::File::open(path)?;
    let mut reader = std::io::BufReader::new(file);
    Ok(rustls_pemfile::certs(&mut reader).collect::<Result<Vec<_>, _>>()?)
}

fn load_private_key(path: &str) -> anyhow::Result<rustls::pki_types::PrivateKeyDer<'static>> {
    let file = std::fs::File::open(path)?;
    let mut reader = std::io::BufReader::new(file);
    rustls_pemfile::private_key(&mut reader)?
        .ok_or_else(|| anyhow::anyhow!("no private key found in {path}"))
}

/// Does the actual work of the binary. Every error returned from here is a
/// startup or runtime failure; `main` is the only place that decides what
/// that means for the process exit code.
async fn run() -> anyhow::Result<()> {
    replicon_common::init_colors();

    let cli = Cli::parse();

    if cli.tls.tls_cert_file.is_empty()
        || cli.tls.tls_private_key_file.is_empty()
        || cli.tls.ca_cert_file.is_empty()
    {
        anyhow::bail!("tls_cert_file, tls_private_key_file and ca_cert_file are all required");
    }

    let namespace = pod_namespace();
    let client = build_client(&cli.cluster).await?;
    let kube_client = KubeClient::new(client, namespace);

    let shutdown = CancellationToken::new();

    let engine_shutdown = shutdown.clone();
    let engine_client = kube_client.clone();
    let engine = tokio::spawn(async move { reconcile::run(engine_client, engine_shutdown).await });

    let control_addr = parse_bind_address(&cli.tls.listen_address)?;
    let tls_config = build_tls_config(&cli.tls)?;
    let rustls_config = axum_server::tls_rustls::RustlsConfig::from_config(Arc::new(tls_config));
    let control_router = http::router(kube_client.clone());
    let control_shutdown = shutdown.clone();
    let control_server = tokio::spawn(async move {
        let handle = axum_server::Handle::new();
        let watcher_handle = handle.clone();
        tokio::spawn(async move {
            control_shutdown.cancelled().await;
            watcher_handle.graceful_shutdown(Some(std::time::Duration::from_secs(10)));
        });
        axum_server::bind_rustls(control_addr, rustls_config)
            .handle(handle)
            .serve(control_router.into_make_service())
            .await
    });

    let health_addr = parse_bind_address(&cli.tls.health_address)?;
    let health_router = health::router(kube_client.clone());
    let health_shutdown = shutdown.clone();
    let health_server = tokio::spawn(async move {
        let listener = tokio::net::TcpListener::bind(health_addr).await?;
        axum::serve(listener, health_router)
            .with_graceful_shutdown(async move { health_shutdown.cancelled().await })
            .await
    });

    replicon_common::log::info(format!(
        "replicon-controller listening: control={control_addr} health={health_addr}"
    ));

    replicon_common::shutdown::shutdown_signal().await;
    replicon_common::log::info("shutdown signal received, stopping");
    shutdown.cancel();

    if let Err(e) = control_server.await? {
        replicon_common::log::error(format!("control listener shutdown error: {e}"));
    }
    if let Err(e) = health_server.await? {
        replicon_common::log::error(format!("health listener shutdown error: {e}"));
    }
    engine.await??;

    Ok(())
}

/// Mirrors the original's `main()`, which prints any `run()` error to
/// stderr and calls `os.Exit(0)` regardless (spec.md §6: "Exit code is 0 on
/// both clean shutdown and startup error."). `#[tokio::main]` itself is not
/// used on `main` so that a returned `Err` never reaches the runtime's own
/// exit-code-1 handling.
fn main() {
    let default_panic = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        default_panic(info);
        std::process::exit(0);
    }));

    let result = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to start tokio runtime")
        .block_on(run());

    if let Err(e) = result {
        eprintln!("{e}");
        std::process::exit(0);
    }
}
