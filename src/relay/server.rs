use crate::{
    analysis::ANALYZE_PATH,
    config::RelayConfig,
    error::{RelayError, Result, StereocamError},
    events::EventBus,
};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer};
use tracing::{info, warn};

use super::handlers::{analyze_image_handler, health_handler};
use super::upstream::VisionModel;

/// Shared state for the Axum server
#[derive(Clone)]
pub struct ServerState {
    pub(crate) model: Arc<dyn VisionModel>,
    pub(crate) event_bus: Arc<EventBus>,
}

/// HTTP relay forwarding still images and prompts to the vision model
pub struct RelayServer {
    pub(crate) config: RelayConfig,
    pub(crate) model: Arc<dyn VisionModel>,
    pub(crate) event_bus: Arc<EventBus>,
}

impl RelayServer {
    pub fn new(config: RelayConfig, model: Arc<dyn VisionModel>, event_bus: Arc<EventBus>) -> Self {
        Self {
            config,
            model,
            event_bus,
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.config.ip, self.config.port)
    }

    /// Routes with permissive CORS and the configured body limit
    pub fn router(&self) -> Router {
        let state = ServerState {
            model: Arc::clone(&self.model),
            event_bus: Arc::clone(&self.event_bus),
        };
        let body_limit = self.config.body_limit_mb.saturating_mul(1024 * 1024);

        Router::new()
            .route(ANALYZE_PATH, post(analyze_image_handler))
            .route("/health", get(health_handler))
            .layer(RequestBodyLimitLayer::new(body_limit))
            .layer(DefaultBodyLimit::disable())
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    /// Bind and serve until `shutdown` resolves
    pub async fn serve<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = self.bind().await?;
        self.serve_on(listener, shutdown).await
    }

    /// Bind the configured address. Requests queue on the listener until
    /// [`serve_on`](Self::serve_on) starts accepting them.
    pub async fn bind(&self) -> Result<TcpListener> {
        let addr = self.address();
        info!("Starting analysis relay on {}", addr);

        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| RelayError::BindFailed {
                address: addr.clone(),
                source: e,
            })?;
        Ok(listener)
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve_on<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.router();
        match listener.local_addr() {
            Ok(addr) => info!("Server running on http://{}", addr),
            Err(e) => warn!("Serving on a listener with no local address: {}", e),
        }

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| RelayError::StartupFailed {
                details: format!("Server error: {}", e),
            })?;

        info!("Analysis relay stopped");
        Ok(())
    }
}

/// Base URL a local client should use to reach a relay bound at `addr`.
/// Wildcard binds are reached over loopback.
pub fn local_base_url(addr: SocketAddr) -> String {
    let ip = match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        ip => ip,
    };
    format!("http://{}", SocketAddr::new(ip, addr.port()))
}

/// Relay server builder for configuration
pub struct RelayServerBuilder {
    config: Option<RelayConfig>,
    model: Option<Arc<dyn VisionModel>>,
    event_bus: Option<Arc<EventBus>>,
}

impl RelayServerBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            model: None,
            event_bus: None,
        }
    }

    pub fn config(mut self, config: RelayConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn model(mut self, model: Arc<dyn VisionModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn build(self) -> Result<RelayServer> {
        let config = self.config.ok_or_else(|| {
            StereocamError::Relay(RelayError::StartupFailed {
                details: "Relay configuration is required".to_string(),
            })
        })?;

        let model = self.model.ok_or_else(|| {
            StereocamError::Relay(RelayError::StartupFailed {
                details: "Vision model is required".to_string(),
            })
        })?;

        let event_bus = self.event_bus.unwrap_or_else(|| Arc::new(EventBus::default()));

        Ok(RelayServer::new(config, model, event_bus))
    }
}

impl Default for RelayServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
