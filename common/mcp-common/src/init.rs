//! Server initialization utilities
//!
//! Tracing setup and the `serve_stdio!` macro shared by the MCP servers.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing for an MCP server
///
/// Logs go to stderr because stdout carries the MCP protocol. `RUST_LOG`
/// refines the filter; the given crate logs at `info` by default.
/// `LOG_FORMAT=json` switches to structured JSON lines.
pub fn init_tracing(crate_name: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::from_default_env().add_directive(format!("{}=info", crate_name).parse()?);
    let registry = tracing_subscriber::registry().with(filter);

    if json_requested(std::env::var("LOG_FORMAT").ok().as_deref()) {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(false),
            )
            .try_init()?;
    }

    Ok(())
}

fn json_requested(format: Option<&str>) -> bool {
    format.is_some_and(|v| v.trim().eq_ignore_ascii_case("json"))
}

/// Generate `main` for a stdio MCP server
///
/// `$constructor` is an async function returning `Result<Server, E>` where
/// `E` converts into `anyhow::Error`. Construction failures (bad config,
/// unreachable database) end the process with a logged error instead of a
/// panic.
///
/// ```rust,ignore
/// mcp_common::serve_stdio!(QueryMcpServer::connect, "query_mcp");
/// ```
#[macro_export]
macro_rules! serve_stdio {
    ($constructor:path, $crate_name:expr) => {
        #[tokio::main]
        async fn main() -> anyhow::Result<()> {
            use rmcp::ServiceExt;

            $crate::init_tracing($crate_name)?;

            tracing::info!(concat!("Starting ", $crate_name, " MCP Server"));

            let server = match $constructor().await {
                Ok(server) => server,
                Err(e) => {
                    let e: anyhow::Error = e.into();
                    tracing::error!("Failed to start server: {:#}", e);
                    return Err(e);
                }
            };
            let service = server.serve(rmcp::transport::stdio()).await?;

            tracing::info!("Server running, waiting for requests...");

            service.waiting().await?;

            tracing::info!("Server shutting down");
            Ok(())
        }
    };
}
