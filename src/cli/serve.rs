//! HTTP API server command.

use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;

use virtrest::api::state::ApiState;
use virtrest::config::VirtrestConfig;
use virtrest::error::Error;
use virtrest::hypervisor;
use virtrest::Result;

/// Start the HTTP API server.
#[derive(Parser, Debug)]
#[command(about = "Start the HTTP API server for domain lifecycle control")]
#[command(after_long_help = "\
Each request opens its own hypervisor session; nothing is cached between requests.

API ENDPOINTS:
  GET    /ping                         Health check
  GET    /domains                      List domains
  GET    /domains/:name                Get domain
  POST   /domains/:name/create         Boot domain
  POST   /domains/:name/shutdown       Graceful shutdown
  POST   /domains/:name/destroy        Forced power off
  POST   /domains/:name/reboot         Reboot domain
  POST   /domains/:name/suspend        Pause domain
  POST   /domains/:name/resume         Unpause domain
  GET    /openapi.json                 OpenAPI document

EXAMPLES:
  virtrest serve                       Listen on 127.0.0.1:8080 (default)
  virtrest serve -l 0.0.0.0:9000       Listen on all interfaces, port 9000
  virtrest serve --uri mock:///default Serve the built-in mock hypervisor")]
pub struct ServeCmd {
    /// Address and port to listen on [default: 127.0.0.1:8080]
    #[arg(short, long, value_name = "ADDR:PORT")]
    listen: Option<String>,

    /// Hypervisor URI [default: qemu:///system]
    #[arg(short, long, value_name = "URI")]
    uri: Option<String>,
}

impl ServeCmd {
    /// Run the serve command.
    pub fn run(self, mut config: VirtrestConfig) -> Result<()> {
        if let Some(listen) = self.listen {
            config.listen = listen;
        }
        if let Some(uri) = self.uri {
            config.uri = uri;
        }

        // Parse listen address
        let addr: SocketAddr = config.listen.parse().map_err(|e| {
            Error::config(format!("invalid listen address '{}': {}", config.listen, e))
        })?;

        let backend = hypervisor::connect_backend(&config.uri)?;
        tracing::info!(backend = backend.name(), uri = %config.uri, "using hypervisor");

        let state = ApiState::new(backend).with_request_timeout(config.request_timeout());

        // Create the runtime with signal handling enabled
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(Error::Io)?;

        runtime.block_on(run_server(addr, Arc::new(state)))
    }
}

async fn run_server(addr: SocketAddr, state: Arc<ApiState>) -> Result<()> {
    // Security warning if binding to all interfaces
    if addr.ip().is_unspecified() {
        eprintln!(
            "WARNING: Server is listening on all interfaces ({}).",
            addr.ip()
        );
        eprintln!("         The API has no authentication - any network client can control these VMs.");
        eprintln!("         Consider using --listen 127.0.0.1:8080 for local-only access.");
    }

    let app = virtrest::api::create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(Error::Io)?;

    tracing::info!(address = %addr, "starting HTTP API server");
    println!("virtrest API server listening on http://{}", addr);

    // In-flight requests finish, so their sessions drain normally.
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(Error::Io)?;

    Ok(())
}

/// Wait for shutdown signal.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
    eprintln!("\nShutting down server...");
}
