//! # larp server
//!
//! Serves the character and campaign slices over axum, with the OpenAPI
//! reference at `/api` and a liveness probe at `/health`.
//!
//! ## Example
//! ```no_run
//! use larp_server::Server;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     Server::builder()
//!         .port(4583)
//!         .ruleset_dir("rules")
//!         .build()?
//!         .run()
//!         .await
//! }
//! ```

mod router;

use anyhow::{Context, Result};
use axum_server::Handle;
use axum_server::tls_rustls::RustlsConfig;
use larp::domain::config::ApiConfig;
use larp::kernel::server::state::ApiState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};

/// A fluent builder for configuring and initializing the [`Server`].
#[must_use = "builders do nothing unless you call .build()"]
#[derive(Debug, Default)]
pub struct ServerBuilder {
    cfg: ApiConfig,
}

impl ServerBuilder {
    /// Set up the server's configuration.
    pub fn config(mut self, cfg: ApiConfig) -> Self {
        self.cfg = cfg;
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.cfg.server.port = port;
        self
    }

    /// Directory holding the ruleset and its definitions.
    pub fn ruleset_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cfg.rules.ruleset_dir = dir.into();
        self
    }

    fn validate_ssl_config(&self) -> Result<()> {
        if let Some(ssl) = &self.cfg.server.ssl {
            if !ssl.cert.exists() {
                anyhow::bail!("SSL certificate not found at: {}", ssl.cert.display());
            }
            if !ssl.key.exists() {
                anyhow::bail!("SSL key not found at: {}", ssl.key.display());
            }

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let metadata = ssl.key.metadata()?;
                if metadata.permissions().mode() & 0o077 != 0 {
                    tracing::warn!(
                        "SECURITY: SSL Private Key {} has insecure permissions (should be 600)",
                        ssl.key.display()
                    );
                }
            }
        }
        Ok(())
    }

    /// Consumes the builder and initializes the server.
    ///
    /// # Process
    /// 1. Checks the TLS files when SSL is configured
    /// 2. Loads the ruleset and builds every feature slice
    /// 3. Registers the slices with the application state
    ///
    /// # Errors
    /// Returns an error if:
    /// * SSL certificate/key files are missing
    /// * The ruleset cannot be loaded (or, in strict mode, has broken definitions)
    ///
    /// # Examples
    /// ```no_run
    /// # use larp_server::Server;
    /// # fn example() -> anyhow::Result<()> {
    /// let server = Server::builder().build()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn build(self) -> Result<Server> {
        self.validate_ssl_config()?;

        let address = SocketAddr::new(self.cfg.server.address, self.cfg.server.port);
        info!(
            address = %address,
            ruleset_dir = %self.cfg.rules.ruleset_dir.display(),
            "Initializing server"
        );

        let slices = larp::init(&self.cfg).context("Platform bootstrap failed")?;

        let state = ApiState::builder()
            .config(self.cfg)
            .register_slices(slices)
            .build()
            .context("Failed to finalize API state registry")?;
        info!(slices = ?state.slice_names(), "Feature slices registered");
        Ok(Server { state })
    }
}

/// A fully initialized server instance ready to run.
///
/// This struct is returned by [`ServerBuilder::build`] and contains
/// all necessary runtime state.
#[must_use = "call .run().await to start the server"]
#[derive(Debug)]
pub struct Server {
    state: ApiState,
}

impl Server {
    /// Returns a new [`ServerBuilder`] to configure the server.
    ///
    /// This is the recommended way to initialize the server.
    ///
    /// # Examples
    /// ```no_run
    /// # use larp_server::Server;
    /// # async fn example() -> anyhow::Result<()> {
    /// Server::builder().port(4583).build()?.run().await
    /// # }
    /// ```
    pub fn builder() -> ServerBuilder {
        ServerBuilder::default()
    }

    /// Starts the server and runs until the shutdown signal is received.
    ///
    /// # Errors
    /// Returns an error if the server fails to bind to the configured address
    /// or if SSL/TLS setup fails.
    ///
    /// # Examples
    /// ```no_run
    /// # use larp_server::Server;
    /// # async fn example() -> anyhow::Result<()> {
    /// Server::builder().ruleset_dir("rules").build()?.run().await
    /// # }
    /// ```
    pub async fn run(self) -> Result<()> {
        let server = self.state.config.server.clone();
        let address = SocketAddr::new(server.address, server.port);
        let grace = Duration::from_secs(server.shutdown_grace_secs);
        let app = router::init(self.state).into_make_service();

        let handle = Handle::<SocketAddr>::new();
        tokio::spawn(drain_on_signal(handle.clone(), grace));

        match &server.ssl {
            Some(ssl) => {
                let tls = RustlsConfig::from_pem_file(&ssl.cert, &ssl.key)
                    .await
                    .context("Failed to load SSL/TLS certificates")?;
                info!(%address, "Listening on https://{address}");
                axum_server::bind_rustls(address, tls).handle(handle).serve(app).await.context("HTTPS server failed")?;
            }
            None => {
                info!(%address, "Listening on http://{address}");
                axum_server::bind(address).handle(handle).serve(app).await.context("HTTP server failed")?;
            }
        }

        info!("Server stopped");
        Ok(())
    }

    /// Returns a reference to the application state.
    #[must_use]
    pub const fn state(&self) -> &ApiState {
        &self.state
    }
}

/// Waits for a shutdown signal, then gives open connections `grace` to finish.
async fn drain_on_signal(handle: Handle<SocketAddr>, grace: Duration) {
    if let Err(e) = shutdown_signal().await {
        error!("Error while waiting for shutdown signal: {e}");
        return;
    }
    info!(grace_secs = grace.as_secs(), "Shutdown signal received, draining connections");
    handle.graceful_shutdown(Some(grace));
}

/// Listens for shutdown signals (Ctrl+C, SIGTERM).
///
/// This function waits for either:
/// * SIGINT (Ctrl+C)
/// * SIGTERM (sent by process managers like systemd)
async fn shutdown_signal() -> Result<()> {
    let ctrl_c = async { signal::ctrl_c().await.context("Failed to install Ctrl+C handler") };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("Failed to install SIGTERM handler")?
            .recv()
            .await;
        Ok::<_, anyhow::Error>(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Result<()>>();

    tokio::select! {
        res = ctrl_c => {
            res.context("Ctrl+C signal received")?;
        },
        res = terminate => {
            res.context("SIGTERM signal received")?;
        },
    }

    Ok(())
}
