//! DB Router - Main entry point.
//!
//! Opens every backend listed in the properties file, then serves the routed
//! session over MCP (stdio or streamable HTTP).

use clap::Parser;
use db_router::config::{Config, TransportMode};
use db_router::router::{SqlxConnector, open_session};
use db_router::transport::{HttpTransport, StdioTransport, Transport};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr so they never mix with the stdio transport.
fn init_tracing(config: &Config) {
    if !config.enable_logs {
        return;
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse configuration from command line and environment
    let config = Config::parse();

    // Initialize logging
    init_tracing(&config);

    info!(
        transport = %config.transport,
        config = %config.config.display(),
        "Starting DB Router v{}",
        env!("CARGO_PKG_VERSION")
    );

    let proxy = match config.load_proxy_config() {
        Ok(proxy) => proxy,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            eprintln!("The properties file lists the routed backends, indexed from 0:");
            eprintln!("  items=2");
            eprintln!("  db0_url=mysql://localhost/orders");
            eprintln!("  db0_name=orders");
            eprintln!("  db0_user=app");
            eprintln!("  db0_password=secret");
            eprintln!("  db0_regexp=^(INSERT|UPDATE|DELETE)");
            eprintln!("  db1_url=sqlite:reports.db");
            eprintln!("  db1_name=reports");
            eprintln!("  db1_regexp=^SELECT");
            eprintln!("  default=reports");
            std::process::exit(1);
        }
    };

    for backend in &proxy.backends {
        info!(
            backend = %backend.name,
            db_type = %backend.db_type,
            url = %backend.masked_url(),
            pattern = %backend.pattern,
            "Connecting backend"
        );
    }

    let connector = SqlxConnector {
        connect_timeout: config.connect_timeout_duration(),
    };
    let session = Arc::new(Mutex::new(open_session(&proxy, &connector).await?));

    // Run the appropriate transport
    let result = match config.transport {
        TransportMode::Stdio => {
            info!("Using stdio transport");
            let transport = StdioTransport::new(session);
            transport.run().await
        }
        TransportMode::Http => {
            info!(
                host = %config.http_host,
                port = config.http_port,
                endpoint = %config.mcp_endpoint,
                "Using HTTP transport"
            );
            let transport = HttpTransport::new(
                session,
                &config.http_host,
                config.http_port,
                &config.mcp_endpoint,
            );
            transport.run().await
        }
    };

    if let Err(e) = result {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}
