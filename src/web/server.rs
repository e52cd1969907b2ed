//! Web server: sign-in, member pages and the admin panel

use axum::{
    extract::{Host, Query, State},
    handler::HandlerWithoutStateExt,
    http::{header::SET_COOKIE, HeaderMap, StatusCode, Uri},
    response::{AppendHeaders, Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    BoxError, Router,
};
use axum_server::tls_rustls::RustlsConfig;
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use super::admin::admin_router;
use super::auth::{
    clear_oauth_state_cookie, create_logout_cookie, create_oauth_state_cookie,
    create_session_cookie, get_oauth_state, get_session_token, login_page, CallbackParams,
};
use super::member;
use super::oauth::IdentityProvider;
use crate::config::ClubConfig;
use crate::managers::{SharedBookingManager, SharedMemberManager};
use crate::session::{MemberSession, SharedSessionStore};

/// Web server configuration
pub struct WebServerConfig {
    /// HTTPS port (main server)
    pub https_port: u16,
    /// HTTP port (redirects to HTTPS, or serves everything with `--http-only`)
    pub http_port: u16,
    /// Path to certificate PEM file (cert + CA bundle)
    pub cert_path: PathBuf,
    /// Path to private key PEM file
    pub key_path: PathBuf,
    /// Serve plain HTTP only (local development)
    pub http_only: bool,
}

impl Default for WebServerConfig {
    fn default() -> Self {
        Self {
            https_port: 443,
            http_port: 80,
            cert_path: PathBuf::from("certs/cert.pem"),
            key_path: PathBuf::from("certs/key.pem"),
            http_only: false,
        }
    }
}

impl WebServerConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            https_port: std::env::var("HTTPS_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.https_port),
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.http_port),
            cert_path: std::env::var("TLS_CERT_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.cert_path),
            key_path: std::env::var("TLS_KEY_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.key_path),
            http_only: false,
        }
    }
}

/// Ports configuration for HTTP to HTTPS redirect
#[derive(Clone, Copy)]
struct Ports {
    http: u16,
    https: u16,
}

/// Shared state for web handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ClubConfig>,
    pub identity: IdentityProvider,
    pub sessions: SharedSessionStore,
    pub members: SharedMemberManager,
    pub bookings: SharedBookingManager,
}

/// All routes
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/login", get(login))
        .route("/callback", get(oauth_callback))
        .route("/logout", get(logout))
        .route("/dashboard", get(member::dashboard))
        .route("/dashboard/settle", post(member::settle))
        .route("/bookings", get(member::bookings_page))
        .route("/bookings/wizard/open", post(member::wizard_open))
        .route("/bookings/wizard/court", post(member::wizard_court))
        .route("/bookings/wizard/date", post(member::wizard_date))
        .route("/bookings/wizard/slot", post(member::wizard_slot))
        .route("/bookings/wizard/confirm", post(member::wizard_confirm))
        .route("/bookings/wizard/next", post(member::wizard_next))
        .route("/bookings/wizard/back", post(member::wizard_back))
        .route("/bookings/wizard/close", post(member::wizard_close))
        .nest("/admin", admin_router())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Start the web server
pub async fn start_web_server(config: WebServerConfig, state: AppState) -> anyhow::Result<()> {
    let base_url = state.identity.base_url.clone();
    let sessions = state.sessions.clone();
    let app = router(state);

    // Expired sessions are only hidden on lookup; sweep them periodically
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(3600));
        loop {
            interval.tick().await;
            let removed = sessions.cleanup_expired().await;
            if removed > 0 {
                info!("Removed {} expired sessions", removed);
            }
        }
    });

    info!("Identity provider redirect URI: {}/callback", base_url);

    if config.http_only {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        warn!("Serving plain HTTP on http://{} (development only)", addr);
        axum::serve(listener, app).await?;
        return Ok(());
    }

    let ports = Ports {
        http: config.http_port,
        https: config.https_port,
    };

    info!("Loading TLS certificates:");
    info!("  Certificate: {}", config.cert_path.display());
    info!("  Private key: {}", config.key_path.display());

    if !config.cert_path.exists() {
        return Err(anyhow::anyhow!(
            "Certificate file not found: {}",
            config.cert_path.display()
        ));
    }
    if !config.key_path.exists() {
        return Err(anyhow::anyhow!(
            "Private key file not found: {}",
            config.key_path.display()
        ));
    }

    let tls_config = RustlsConfig::from_pem_file(&config.cert_path, &config.key_path)
        .await
        .map_err(|e| {
            anyhow::anyhow!(
                "Failed to load TLS certificates: {}\n  Certificate: {}\n  Private key: {}",
                e,
                config.cert_path.display(),
                config.key_path.display()
            )
        })?;

    tokio::spawn(redirect_http_to_https(ports));

    let https_addr = SocketAddr::from(([0, 0, 0, 0], config.https_port));
    info!("Web server listening on https://0.0.0.0:{}", config.https_port);
    info!("HTTP redirect server on http://0.0.0.0:{}", config.http_port);

    axum_server::bind_rustls(https_addr, tls_config)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}

/// Redirect all HTTP requests to HTTPS
async fn redirect_http_to_https(ports: Ports) {
    fn make_https(host: &str, uri: Uri, https_port: u16) -> Result<Uri, BoxError> {
        let mut parts = uri.into_parts();

        parts.scheme = Some(axum::http::uri::Scheme::HTTPS);

        if parts.path_and_query.is_none() {
            parts.path_and_query = Some("/".parse()?);
        }

        let authority: axum::http::uri::Authority = host.parse()?;
        let bare_host = authority.host();

        // Only add port if it's not the default HTTPS port
        if https_port == 443 {
            parts.authority = Some(bare_host.parse()?);
        } else {
            parts.authority = Some(format!("{bare_host}:{https_port}").parse()?);
        }

        Ok(Uri::from_parts(parts)?)
    }

    let redirect = move |Host(host): Host, uri: Uri| async move {
        match make_https(&host, uri, ports.https) {
            Ok(uri) => Ok(Redirect::permanent(&uri.to_string())),
            Err(error) => {
                warn!(%error, "Failed to convert URI to HTTPS");
                Err(StatusCode::BAD_REQUEST)
            }
        }
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], ports.http));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind HTTP redirect server on port {}: {}", ports.http, e);
            return;
        }
    };

    info!("HTTP redirect server listening on {}", addr);

    if let Err(e) = axum::serve(listener, redirect.into_make_service()).await {
        error!("HTTP redirect server error: {}", e);
    }
}

/// Health check endpoint
async fn health() -> &'static str {
    "Club server running"
}

/// GET / - Dashboard when signed in, sign-in page otherwise
async fn root(headers: HeaderMap, State(state): State<AppState>) -> Redirect {
    match get_session_token(&headers) {
        Some(token) if state.sessions.get_session(&token).await.is_some() => {
            Redirect::to("/dashboard")
        }
        _ => Redirect::to("/login"),
    }
}

/// GET /login - Sign-in page with a fresh OAuth state
async fn login(State(state): State<AppState>) -> impl IntoResponse {
    sign_in_page(&state, None)
}

fn sign_in_page(state: &AppState, message: Option<&str>) -> Response {
    let oauth_state = uuid::Uuid::new_v4().to_string();
    let url = state.identity.authorize_url(&oauth_state);
    (
        AppendHeaders([(SET_COOKIE, create_oauth_state_cookie(&oauth_state))]),
        Html(login_page(&state.config.name, &url, message)),
    )
        .into_response()
}

/// GET /callback - Identity provider callback
async fn oauth_callback(
    headers: HeaderMap,
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Response {
    if let Some(error) = params.error {
        warn!("Identity provider returned an error: {}", error);
        return sign_in_page(&state, Some("Sign-in was cancelled or refused."));
    }

    let expected = get_oauth_state(&headers);
    if expected.is_none() || expected != params.state {
        warn!("OAuth state mismatch on callback");
        return sign_in_page(&state, Some("Your sign-in link expired. Please try again."));
    }

    let code = match params.code {
        Some(code) => code,
        None => return sign_in_page(&state, Some("Sign-in failed. Please try again.")),
    };

    let identity = match state.identity.sign_in(&code).await {
        Ok(identity) => identity,
        Err(e) => {
            error!("Sign-in failed: {}", e);
            return sign_in_page(&state, Some("Sign-in failed. Please try again."));
        }
    };

    let member = match state.members.ensure_member(&identity).await {
        Ok(member) => member,
        Err(e) => {
            error!("Failed to load member {}: {}", identity.id, e);
            return sign_in_page(&state, Some("Could not load your membership. Please try again."));
        }
    };

    let token = state
        .sessions
        .create_session(MemberSession::new(&member))
        .await;
    info!("Member {} ({}) signed in", member.display_name, member.id);

    (
        AppendHeaders([
            (SET_COOKIE, create_session_cookie(&token)),
            (SET_COOKIE, clear_oauth_state_cookie()),
        ]),
        Redirect::to("/dashboard"),
    )
        .into_response()
}

/// GET /logout - End the session and return to sign-in
async fn logout(headers: HeaderMap, State(state): State<AppState>) -> impl IntoResponse {
    if let Some(token) = get_session_token(&headers) {
        if let Some(session) = state.sessions.remove_session(&token).await {
            state.bookings.end_view(&session);
            info!("Member {} signed out", session.member_id);
        }
    }

    (
        AppendHeaders([(SET_COOKIE, create_logout_cookie())]),
        Redirect::to("/login"),
    )
}
