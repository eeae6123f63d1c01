//! HTTP surface of the song library

pub mod handlers;
pub mod response;

use crate::library::SongService;
use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::Router;
use std::time::{Duration, Instant};
use tracing::Instrument;

#[derive(Clone)]
pub struct AppState {
    pub service: SongService,
}

#[derive(Debug, Clone, Copy)]
pub struct RouterOptions {
    pub request_timeout: Duration,
    pub serve_stub: bool,
}

pub fn router(service: SongService, opts: RouterOptions) -> Router {
    let mut router = Router::new()
        .route("/health", get(handlers::health))
        .route("/songs", post(handlers::create_song).get(handlers::list_songs))
        .route("/songs/verses", get(handlers::song_verses))
        .route(
            "/songs/{id}",
            put(handlers::update_song).delete(handlers::delete_song),
        );

    if opts.serve_stub {
        router = router.route("/info", get(handlers::stub_info));
    }

    router
        .layer(middleware::from_fn_with_state(
            opts.request_timeout,
            request_deadline,
        ))
        .layer(middleware::from_fn(trace_request))
        .with_state(AppState { service })
}

/// Drop the handler future once the deadline passes, which cancels any
/// outbound enrichment call still in flight.
async fn request_deadline(State(limit): State<Duration>, req: Request, next: Next) -> Response {
    match tokio::time::timeout(limit, next.run(req)).await {
        Ok(resp) => resp,
        Err(_) => {
            tracing::warn!(timeout_ms = limit.as_millis() as u64, "request timed out");
            response::ApiError::timeout().into_response()
        }
    }
}

async fn trace_request(req: Request, next: Next) -> Response {
    let span = tracing::info_span!("request", method = %req.method(), path = %req.uri().path());
    async move {
        let started = Instant::now();
        let resp = next.run(req).await;
        tracing::info!(
            status = resp.status().as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "request finished"
        );
        resp
    }
    .instrument(span)
    .await
}
