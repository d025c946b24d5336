//! axum routes for the change feed.

use crate::config::{FeedConfig, ServerConfig};
use crate::error::FeedError;
use crate::registry::ResourceRegistry;
use crate::session::{Session, SubscriptionRequest};
use crate::store::LogStore;
use axum::extract::{Query, State};
use axum::http::header::HeaderName;
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures::StreamExt;
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use tailfeed_protocol::WireEvent;
use tokio_util::sync::CancellationToken;

/// Path of the multi-resource feed.
pub const STREAMING_PATH: &str = "/changes/streaming";

/// Resumption header sent by reconnecting SSE clients.
pub static LAST_EVENT_ID: HeaderName = HeaderName::from_static("last-event-id");

/// Shared state behind every route.
#[derive(Clone)]
pub struct AppState {
    /// Source of log entries.
    pub store: Arc<dyn LogStore>,
    /// Known resources.
    pub registry: Arc<dyn ResourceRegistry>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Root token; sessions run on child tokens.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Creates state with a fresh shutdown token.
    pub fn new(
        store: Arc<dyn LogStore>,
        registry: Arc<dyn ResourceRegistry>,
        config: ServerConfig,
    ) -> Self {
        Self {
            store,
            registry,
            config: Arc::new(config),
            shutdown: CancellationToken::new(),
        }
    }
}

/// Returns the single-resource path for `resource`.
pub fn resource_path(resource: &str) -> String {
    format!("/{resource}{STREAMING_PATH}")
}

fn is_route_segment(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Builds the feed router.
///
/// Always serves [`STREAMING_PATH`]; when enabled in the configuration,
/// also serves one fixed-resource route per registered resource.
pub fn build_router(state: AppState) -> Router {
    let verbs = state.config.verbs.clone();
    let multi = FeedConfig::multi(verbs.clone());

    let mut router = Router::new().route(
        STREAMING_PATH,
        get(
            move |State(state): State<AppState>,
                  Query(params): Query<Vec<(String, String)>>,
                  headers: HeaderMap| open_feed(multi.clone(), state, params, headers),
        ),
    );

    if state.config.single_resource_routes {
        for name in state.registry.names() {
            if !is_route_segment(&name) {
                tracing::warn!(resource = %name, "skipping route for resource with unroutable name");
                continue;
            }
            let path = resource_path(&name);
            let feed = FeedConfig::single(name, verbs.clone());
            router = router.route(
                &path,
                get(
                    move |State(state): State<AppState>,
                          Query(params): Query<Vec<(String, String)>>,
                          headers: HeaderMap| {
                        open_feed(feed.clone(), state, params, headers)
                    },
                ),
            );
        }
    }

    router.with_state(state)
}

async fn open_feed(
    feed: FeedConfig,
    state: AppState,
    params: Vec<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, FeedError> {
    let last_event_id = match headers.get(&LAST_EVENT_ID) {
        Some(value) => Some(value.to_str().map_err(|_| {
            FeedError::InvalidCursor(String::from_utf8_lossy(value.as_bytes()).into_owned())
        })?),
        None => None,
    };

    let request =
        SubscriptionRequest::parse(&feed, state.registry.as_ref(), &params, last_event_id)
            .inspect_err(|err| tracing::debug!(error = %err, "subscription rejected"))?;

    let handle = Session::new(request, Arc::clone(&state.store), &state.config)
        .with_shutdown(&state.shutdown)
        .spawn();

    let events = handle
        .into_stream()
        .map(|event| Ok::<_, Infallible>(sse_event(event)));
    Ok(Sse::new(events).into_response())
}

fn sse_event(event: WireEvent) -> Event {
    Event::default()
        .id(event.id)
        .event(event.event)
        .data(event.data.to_string())
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl FeedError {
    /// Returns the HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        if self.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for FeedError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            error: self.code(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
