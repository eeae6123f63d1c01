use super::response::{reply, ApiError};
use super::AppState;
use crate::enrich;
use crate::library::verses;
use crate::library::{Song, SongFilter};
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use std::collections::HashMap;

type Params = HashMap<String, String>;

const DEFAULT_PAGE: u32 = 1;
const DEFAULT_PAGE_SIZE: u32 = 5;

fn param<'a>(q: &'a Params, key: &str) -> &'a str {
    q.get(key).map(String::as_str).unwrap_or("")
}

/// Parse an optional integer parameter; present but malformed is an error.
fn int_param(q: &Params, key: &str, message: &str) -> Result<Option<i64>, ApiError> {
    match param(q, key) {
        "" => Ok(None),
        raw => raw
            .parse()
            .map(Some)
            .map_err(|_| ApiError::validation(message)),
    }
}

/// Parse a positive paging parameter, falling back to `default`.
/// Positive values larger than `u32` saturate rather than fall back, so an
/// oversized page lands past the end instead of on page one.
fn lenient_param(q: &Params, key: &str, default: u32) -> u32 {
    match param(q, key).parse::<i64>() {
        Ok(v) if v > 0 => u32::try_from(v).unwrap_or(u32::MAX),
        _ => {
            tracing::warn!(param = key, value = param(q, key), default, "invalid paging parameter, using default");
            default
        }
    }
}

fn path_id(path: Result<Path<i64>, PathRejection>) -> Result<i64, ApiError> {
    path.map(|Path(id)| id)
        .map_err(|_| ApiError::validation("invalid song id"))
}

/// Resolve the body id against the path id.
fn body_for(id: i64, body: Result<Json<Song>, JsonRejection>) -> Result<Song, ApiError> {
    let Json(mut song) = body.map_err(|e| {
        tracing::warn!(error = %e, "failed to decode body");
        ApiError::decode()
    })?;
    if song.id != 0 && song.id != id {
        return Err(ApiError::validation("song id in body does not match path"));
    }
    song.id = id;
    Ok(song)
}

pub async fn health() -> Response {
    reply(StatusCode::OK, "healthy")
}

pub async fn create_song(
    State(state): State<AppState>,
    body: Result<Json<Song>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(song) = body.map_err(|e| {
        tracing::warn!(error = %e, "failed to decode body");
        ApiError::decode()
    })?;

    let created = state
        .service
        .create(song)
        .await
        .map_err(|e| ApiError::from_service(e, "Can't create song"))?;

    Ok(reply(StatusCode::CREATED, created))
}

pub async fn list_songs(
    State(state): State<AppState>,
    Query(q): Query<Params>,
) -> Result<Response, ApiError> {
    let id = int_param(&q, "id", "invalid song id")?.unwrap_or(0);
    let limit = int_param(&q, "limit", "Invalid limit parameter")?
        .unwrap_or(i64::from(SongFilter::DEFAULT_LIMIT));
    let offset = int_param(&q, "offset", "Invalid offset parameter")?.unwrap_or(0);

    let limit = u32::try_from(limit)
        .ok()
        .filter(|l| *l > 0)
        .ok_or_else(|| ApiError::validation("limit must be a positive integer"))?;
    let offset = u32::try_from(offset)
        .map_err(|_| ApiError::validation("offset must be a non-negative integer"))?;

    let filter = SongFilter::new(
        param(&q, "group_name"),
        param(&q, "song"),
        param(&q, "releasedate"),
        id,
    )
    .with_page(limit, offset);

    let songs = state
        .service
        .list(&filter)
        .await
        .map_err(|e| ApiError::from_service(e, "can't get all songs"))?;

    Ok(reply(StatusCode::OK, songs))
}

pub async fn song_verses(
    State(state): State<AppState>,
    Query(q): Query<Params>,
) -> Result<Response, ApiError> {
    let id: i64 = param(&q, "id")
        .parse()
        .map_err(|_| ApiError::validation("invalid song id"))?;

    let page = lenient_param(&q, "page", DEFAULT_PAGE);
    let page_size = lenient_param(&q, "pageSize", DEFAULT_PAGE_SIZE);
    let offset = verses::page_offset(page, page_size);
    tracing::debug!(page, page_size, offset, "verse request");

    let filter = SongFilter::new(
        param(&q, "group_name"),
        param(&q, "song"),
        param(&q, "releasedate"),
        id,
    );

    let verses = state
        .service
        .verses(filter, page_size, offset)
        .await
        .map_err(|e| ApiError::from_service(e, "Error fetching paginated song text"))?;

    Ok(reply(StatusCode::OK, verses))
}

pub async fn update_song(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<Song>, JsonRejection>,
) -> Result<Response, ApiError> {
    let song = body_for(path_id(path)?, body)?;
    let ok = state
        .service
        .update(song)
        .await
        .map_err(|e| ApiError::from_service(e, "can't update song"))?;
    Ok(reply(StatusCode::OK, ok))
}

pub async fn delete_song(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<Song>, JsonRejection>,
) -> Result<Response, ApiError> {
    let song = body_for(path_id(path)?, body)?;
    let id = state
        .service
        .delete(song)
        .await
        .map_err(|e| ApiError::from_service(e, "can't delete this song"))?;
    Ok(reply(StatusCode::OK, id))
}

/// Placeholder metadata provider, answered with the bare song JSON.
pub async fn stub_info(Query(q): Query<Params>) -> Json<Song> {
    let today = time::OffsetDateTime::now_utc().date();
    Json(enrich::stub_details(param(&q, "song"), param(&q, "group"), today))
}
