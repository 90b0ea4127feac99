//! HTTP server: page routes, sign-in and the editor

mod auth;
mod editor;
mod pages;

use anyhow::Result;
use axum::{
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tera::Context;
use tower_http::trace::TraceLayer;

use crate::auth::{OAuth, SessionStore, User};
use crate::content::{ContentError, RENDER_FALLBACK};
use crate::github::FetchError;
use crate::helpers::PageMeta;
use crate::templates::{page_context, TemplateRenderer};
use crate::Site;

/// Everything a request handler needs
pub struct AppState {
    pub site: Site,
    pub templates: TemplateRenderer,
    pub sessions: SessionStore,
    pub oauth: OAuth,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(site: Site) -> Result<Self> {
        let templates = TemplateRenderer::new()?;
        let sessions = SessionStore::new(site.config.auth.session_ttl_days);
        let oauth = OAuth::new(&site.config)?;
        if oauth.enabled().is_empty() {
            tracing::warn!("No sign-in provider is configured; the editor is unreachable");
        }
        Ok(Self {
            site,
            templates,
            sessions,
            oauth,
        })
    }

    /// The signed-in user of a request
    pub fn user(&self, headers: &HeaderMap) -> Option<User> {
        self.sessions.from_headers(headers).map(|s| s.user)
    }

    fn context(&self, meta: &PageMeta, user: Option<&User>) -> Context {
        page_context(&self.site.config, meta, user)
    }

    fn page(&self, status: StatusCode, template: &str, context: &Context) -> Response {
        match self.templates.render(template, context) {
            Ok(html) => (status, Html(html)).into_response(),
            Err(e) => {
                tracing::error!("Failed to render {}: {:#}", template, e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
            }
        }
    }

    fn not_found(&self, heading: &str, message: &str, user: Option<&User>) -> Response {
        let mut context = self.context(&PageMeta::simple(heading, message), user);
        context.insert("heading", heading);
        context.insert("message", message);
        self.page(StatusCode::NOT_FOUND, "not_found.html", &context)
    }

    fn error_page(
        &self,
        status: StatusCode,
        heading: &str,
        message: &str,
        user: Option<&User>,
    ) -> Response {
        let mut context = self.context(&PageMeta::simple(heading, message), user);
        context.insert("heading", heading);
        context.insert("message", message);
        self.page(status, "error.html", &context)
    }

    /// Map a failure to load a post or lesson to a page
    fn content_error(
        &self,
        error: &ContentError,
        not_found: (&str, &str),
        user: Option<&User>,
    ) -> Response {
        match error {
            ContentError::Fetch(FetchError::RateLimited { .. }) => {
                tracing::warn!("{}", error);
                self.error_page(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Temporarily Unavailable",
                    &error.to_string(),
                    user,
                )
            }
            ContentError::FrontMatter { .. } => {
                tracing::error!("{}", error);
                self.error_page(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Something went wrong",
                    RENDER_FALLBACK,
                    user,
                )
            }
            ContentError::Fetch(_) => {
                tracing::error!("{}", error);
                self.not_found(not_found.0, not_found.1, user)
            }
        }
    }
}

/// Build the application router
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(pages::home))
        .route("/blog", get(pages::blog_index))
        .route("/blog/:slug", get(pages::blog_post))
        .route("/tag/:tag", get(pages::tag))
        .route("/courses", get(pages::courses_index))
        .route("/courses/:course", get(pages::course))
        .route("/courses/:course/lesson/:slug", get(pages::lesson))
        .route("/api/rate-limit", get(pages::rate_limit))
        .route("/auth/signin", get(auth::signin_page))
        .route("/auth/signin/:provider", get(auth::signin_start))
        .route("/auth/callback/:provider", get(auth::callback))
        .route("/auth/signout", post(auth::signout))
        .route("/editor", get(editor::show).post(editor::publish))
        .fallback(pages::fallback)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the server
pub async fn start(site: Site, ip: &str, port: u16) -> Result<()> {
    let state = Arc::new(AppState::new(site)?);

    // Expired sessions are also dropped lazily; this keeps the map small
    let sweeper = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60 * 60));
        loop {
            interval.tick().await;
            let purged = sweeper.sessions.purge_expired();
            if purged > 0 {
                tracing::debug!("Purged {} expired sessions", purged);
            }
        }
    });

    let app = router(state);

    // Parse address - handle "localhost" specially
    let bind_ip = if ip == "localhost" { "127.0.0.1" } else { ip };
    let addr: SocketAddr = format!("{}:{}", bind_ip, port).parse()?;

    println!("Server running at http://{}:{}", ip, port);
    println!("Press Ctrl+C to stop.");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
