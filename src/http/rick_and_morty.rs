use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::services::{
    Character, CharacterFilter, CharacterLookup, Episode, EpisodeFilter, Location, LocationFilter, Page,
};

pub async fn get_characters(
    State(state): State<AppState>,
    Query(filter): Query<CharacterFilter>,
) -> Result<Json<Page<Character>>, ApiError> {
    Ok(Json(state.rick_and_morty.characters(&filter).await?))
}

/// `ids` is a single id or a comma-separated list.
pub async fn get_characters_by_ids(
    State(state): State<AppState>,
    Path(ids): Path<String>,
) -> Result<Json<CharacterLookup>, ApiError> {
    Ok(Json(state.rick_and_morty.characters_by_ids(&ids).await?))
}

pub async fn get_locations(
    State(state): State<AppState>,
    Query(filter): Query<LocationFilter>,
) -> Result<Json<Page<Location>>, ApiError> {
    Ok(Json(state.rick_and_morty.locations(&filter).await?))
}

pub async fn get_episodes(
    State(state): State<AppState>,
    Query(filter): Query<EpisodeFilter>,
) -> Result<Json<Page<Episode>>, ApiError> {
    Ok(Json(state.rick_and_morty.episodes(&filter).await?))
}
