//! HTTP surface: public verification, admin console, health and OpenAPI.

pub mod handlers;
mod openapi;

pub use openapi::openapi;

use crate::fields::{
    AdminController, CredentialHasher, FieldSet, FieldStore, FileAuditSink, HashParams,
    UnlockEngine, ValuePolicy,
};
use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Extension, MatchedPath},
    http::{HeaderName, HeaderValue, Request},
    middleware,
    response::Json,
    routing::{get, post},
    Router,
};
use handlers::admin_auth::{require_admin, AdminCredentials};
use secrecy::SecretString;
use std::{
    net::{IpAddr, Ipv6Addr, SocketAddr},
    path::PathBuf,
    sync::Arc,
    time::Duration,
};
use tokio::{net::TcpListener, task::JoinHandle};
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{error, info, info_span, warn, Span};
use ulid::Ulid;

pub const MAX_BODY_BYTES: usize = 8 * 1024;
const AUDIT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct Config {
    listen: IpAddr,
    port: u16,
    store_path: PathBuf,
    audit_log_path: PathBuf,
    fields: FieldSet,
    value_policy: ValuePolicy,
    hash_params: HashParams,
    admin_user: String,
    admin_password: SecretString,
}

impl Config {
    #[must_use]
    pub fn new(store_path: PathBuf, audit_log_path: PathBuf, admin_password: SecretString) -> Self {
        Self {
            listen: IpAddr::V6(Ipv6Addr::UNSPECIFIED),
            port: 8080,
            store_path,
            audit_log_path,
            fields: FieldSet::default(),
            value_policy: ValuePolicy::default(),
            hash_params: HashParams::default(),
            admin_user: "admin".to_string(),
            admin_password,
        }
    }

    #[must_use]
    pub fn with_listen(mut self, listen: IpAddr, port: u16) -> Self {
        self.listen = listen;
        self.port = port;
        self
    }

    #[must_use]
    pub fn with_fields(mut self, fields: FieldSet) -> Self {
        self.fields = fields;
        self
    }

    #[must_use]
    pub fn with_value_policy(mut self, policy: ValuePolicy) -> Self {
        self.value_policy = policy;
        self
    }

    #[must_use]
    pub fn with_hash_params(mut self, params: HashParams) -> Self {
        self.hash_params = params;
        self
    }

    #[must_use]
    pub fn with_admin_user(mut self, user: String) -> Self {
        self.admin_user = user;
        self
    }

    #[must_use]
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.listen, self.port)
    }
}

/// Everything the handlers need, shared through `Extension` layers.
#[derive(Clone)]
pub struct Services {
    pub store: Arc<FieldStore>,
    pub engine: Arc<UnlockEngine>,
    pub admin: Arc<AdminController>,
    pub audit: Arc<FileAuditSink>,
    pub credentials: Arc<AdminCredentials>,
}

impl Services {
    /// Wire the store, hasher and audit writer. Must run inside a Tokio
    /// runtime; the returned handle completes once every `Services` clone is
    /// dropped and the audit queue is drained.
    ///
    /// # Errors
    /// Returns an error if the hash parameters are rejected.
    pub fn new(config: &Config) -> Result<(Self, JoinHandle<()>)> {
        let hasher =
            CredentialHasher::new(config.hash_params).context("Invalid hash parameters")?;
        let store = Arc::new(FieldStore::new(config.store_path.clone(), config.fields));
        let (audit, writer) = FileAuditSink::spawn(config.audit_log_path.clone());
        let audit = Arc::new(audit);

        let engine = Arc::new(UnlockEngine::new(
            store.clone(),
            hasher.clone(),
            audit.clone(),
            config.value_policy,
        ));
        let admin = Arc::new(AdminController::new(
            store.clone(),
            hasher,
            audit.clone(),
            config.value_policy,
        ));
        let credentials = Arc::new(AdminCredentials::new(
            config.admin_user.clone(),
            config.admin_password.clone(),
        ));

        Ok((
            Self {
                store,
                engine,
                admin,
                audit,
                credentials,
            },
            writer,
        ))
    }
}

/// Build the application router.
#[must_use]
pub fn router(services: &Services) -> Router {
    let admin = Router::new()
        .route("/state", get(handlers::admin::state))
        .route("/set", post(handlers::admin::set_password))
        .route("/reset", post(handlers::admin::reset))
        .route("/clear", post(handlers::admin::clear))
        .route("/clear-all", post(handlers::admin::clear_all))
        .route("/test", post(handlers::admin::test_password))
        .route("/log", get(handlers::admin::log))
        .route_layer(middleware::from_fn_with_state(
            services.credentials.clone(),
            require_admin,
        ));

    Router::new()
        .route("/api/verify", post(handlers::verify::verify))
        .route("/api/status", get(handlers::verify::status))
        .nest("/api/admin", admin)
        .route(
            "/health",
            get(handlers::health::health).options(handlers::health::health),
        )
        .route("/openapi.json", get(|| async { Json(openapi()) }))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(services.store.clone()))
                .layer(Extension(services.engine.clone()))
                .layer(Extension(services.admin.clone()))
                .layer(Extension(services.audit.clone())),
        )
}

/// Start the server
/// # Errors
/// Return error if the field record cannot be initialized or the listener fails
pub async fn new(config: Config) -> Result<()> {
    let (services, audit_writer) = Services::new(&config)?;

    // Create the initial record up front so a bad path fails at startup.
    let fields = services
        .store
        .load()
        .await
        .with_context(|| format!("Failed to load {}", services.store.path().display()))?;
    info!(
        fields = fields.len(),
        configured = fields.values().filter(|field| field.has_secret()).count(),
        "Field record loaded from {}",
        services.store.path().display()
    );

    let app = router(&services);
    drop(services);

    let addr = config.socket_addr();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("Listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    if tokio::time::timeout(AUDIT_DRAIN_TIMEOUT, audit_writer)
        .await
        .is_err()
    {
        warn!("Audit writer did not drain before shutdown");
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {err}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!("Failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Gracefully shutdown");
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
