use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use stremtmdb_common::{MediaKind, Result};

use super::views::{episode_mapping, season_mappings, series_mappings, Envelope, IdMapping};
use crate::server::AppContext;

pub const CACHE_SUCCESS: &str = "public, s-maxage=86400, max-age=86400";
pub const CACHE_FAILURE: &str = "no-store, no-cache, must-revalidate";

pub fn identity_routes() -> Router<AppContext> {
    Router::new()
        .route("/movie/:movie", get(get_movie).delete(delete_movie))
        .route("/series/:series", get(get_series).delete(delete_series))
        .route("/series/:series/:season", get(get_season))
        .route("/series/:series/:season/:episode", get(get_episode))
}

fn with_cache_control(
    status: StatusCode,
    cache: &'static str,
    body: impl IntoResponse,
) -> Response {
    let mut response = (status, body).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static(cache));
    response
}

/// Render a resolver result as an enveloped JSON response.
fn respond<T: Serialize>(ids: &[u64], result: Result<Option<T>>) -> Response {
    match result {
        Ok(Some(body)) => {
            with_cache_control(StatusCode::OK, CACHE_SUCCESS, Json(Envelope::found(body)))
        }
        Ok(None) => with_cache_control(
            StatusCode::NOT_FOUND,
            CACHE_FAILURE,
            Json(Envelope::<T>::failed(ids)),
        ),
        Err(e) => {
            tracing::error!(?ids, error = %e, "Identity resolution failed");
            with_cache_control(
                StatusCode::INTERNAL_SERVER_ERROR,
                CACHE_FAILURE,
                Json(Envelope::<T>::failed(ids)),
            )
        }
    }
}

async fn get_movie(State(ctx): State<AppContext>, Path(movie): Path<u64>) -> Response {
    let result = ctx
        .resolver
        .resolve_movie(movie)
        .await
        .map(|entry| entry.as_ref().map(IdMapping::from));
    respond(&[movie], result)
}

async fn get_series(State(ctx): State<AppContext>, Path(series): Path<u64>) -> Response {
    let result = ctx
        .resolver
        .resolve_series(series)
        .await
        .map(|seasons| seasons.as_deref().map(series_mappings));
    respond(&[series], result)
}

async fn get_season(
    State(ctx): State<AppContext>,
    Path((series, season)): Path<(u64, u32)>,
) -> Response {
    let result = ctx
        .resolver
        .resolve_season(series, season, true)
        .await
        .map(|outcomes| outcomes.as_deref().map(season_mappings));
    respond(&[series, u64::from(season)], result)
}

async fn get_episode(
    State(ctx): State<AppContext>,
    Path((series, season, episode)): Path<(u64, u32, u32)>,
) -> Response {
    let result = ctx
        .resolver
        .resolve_episode(series, season, episode)
        .await
        .map(|outcome| outcome.as_ref().and_then(episode_mapping));
    respond(&[series, u64::from(season), u64::from(episode)], result)
}

async fn purge(ctx: &AppContext, kind: MediaKind, title: u64) -> Response {
    match ctx.resolver.purge(kind, title).await {
        Ok(removed) => format!("Removed {removed} entries.").into_response(),
        Err(e) => {
            tracing::error!(kind = %kind, title, error = %e, "Purge failed");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Purge failed: {e}")).into_response()
        }
    }
}

async fn delete_movie(State(ctx): State<AppContext>, Path(movie): Path<u64>) -> Response {
    purge(&ctx, MediaKind::Movie, movie).await
}

async fn delete_series(State(ctx): State<AppContext>, Path(series): Path<u64>) -> Response {
    purge(&ctx, MediaKind::Episode, series).await
}
