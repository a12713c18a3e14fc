//! # HTTP Server
//!
//! Serves the backup routes and, when configured, runs the automatic backup
//! schedule in the same process until shutdown.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::backup_routes::backup_routes;
use super::config::HttpServerConfig;
use crate::observability::{log_event, log_event_with_fields, Event};
use crate::scheduler::run_schedule;
use crate::vault::Vault;

pub struct HttpServer {
    config: HttpServerConfig,
    vault: Arc<Vault>,
    router: Router,
}

impl HttpServer {
    /// Server using the vault's own HTTP configuration
    pub fn new(vault: Arc<Vault>) -> Self {
        let config = vault.config().http.clone();
        Self::with_config(vault, config)
    }

    pub fn with_config(vault: Arc<Vault>, config: HttpServerConfig) -> Self {
        let router = Self::build_router(&config, vault.clone());
        Self {
            config,
            vault,
            router,
        }
    }

    fn build_router(config: &HttpServerConfig, vault: Arc<Vault>) -> Router {
        let cors = if config.cors_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<_> = config
                .cors_origins
                .iter()
                .filter_map(|s| s.parse().ok())
                .collect();

            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        };

        Router::new()
            .merge(backup_routes(vault))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
    }

    pub fn socket_addr(&self) -> String {
        self.config.socket_addr()
    }

    /// The router (for testing)
    pub fn router(self) -> Router {
        self.router
    }

    /// Serve until `shutdown` resolves. In-flight requests are allowed to
    /// finish; the scheduler loop stops after any running backup.
    pub async fn start<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr: SocketAddr = self.config.socket_addr().parse().map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid socket address {}: {}", self.config.socket_addr(), e),
            )
        })?;

        let (stop_tx, stop_rx) = watch::channel(false);

        let scheduler = if self.config.run_scheduler && self.vault.auto_backup_enabled() {
            match self.vault.schedule() {
                Ok(schedule) => {
                    let job = self.vault.auto_job();
                    let mut stop = stop_rx.clone();
                    Some(tokio::spawn(async move {
                        run_schedule(job, schedule, async move {
                            let _ = stop.changed().await;
                        })
                        .await;
                    }))
                }
                Err(e) => {
                    tracing::error!(error = %e, "automatic backups not scheduled");
                    None
                }
            }
        } else {
            None
        };

        let listener = TcpListener::bind(addr).await?;
        log_event_with_fields(Event::ServerStart, &[("addr", &addr.to_string())]);

        drop(stop_rx);
        let served = axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.await;
                let _ = stop_tx.send(true);
            })
            .await;

        if let Some(handle) = scheduler {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "scheduler task ended abnormally");
            }
        }
        log_event(Event::ServerStop);

        served
    }
}
