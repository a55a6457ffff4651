//! Watch-list routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, put},
};
use serde::{Deserialize, Serialize};

use crate::api::error::{ApiError, ApiResult};
use crate::api::server::AppState;
use crate::domain::{Game, LogLevel, StreamHandle, slugify};
use crate::error::Error;

const DEFAULT_STREAM_LIMIT: usize = 20;
const MAX_STREAM_LIMIT: usize = 100;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_games).post(add_game))
        .route("/reorder", put(reorder_games))
        .route("/{id}", delete(remove_game))
        .route("/{id}/streams", get(game_streams))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddGameRequest {
    #[serde(default)]
    pub name: String,
    pub display_name: Option<String>,
    #[serde(default, rename = "boxArtURL")]
    pub box_art_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderRequest {
    pub game_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct StreamsQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStreamsResponse {
    pub game: String,
    pub stream_count: usize,
    pub streams: Vec<StreamHandle>,
}

/// Games in priority order, then any not on the list.
async fn list_games(State(state): State<AppState>) -> ApiResult<Json<Vec<Game>>> {
    let mut ordered = state.store.ordered_games()?;
    let unlisted: Vec<Game> = state
        .store
        .get_games()?
        .into_values()
        .filter(|g| !ordered.iter().any(|o| o.id == g.id))
        .collect();
    ordered.extend(unlisted);
    Ok(Json(ordered))
}

async fn add_game(
    State(state): State<AppState>,
    Json(request): Json<AddGameRequest>,
) -> ApiResult<(StatusCode, Json<Game>)> {
    let name = request.name.trim();
    let slug = slugify(name);
    if slug.is_empty() {
        return Err(ApiError::validation("name is required"));
    }
    let display_name = request
        .display_name
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or(name);
    let game = Game {
        id: slug.clone(),
        name: slug,
        display_name: display_name.to_string(),
        box_art_url: request.box_art_url.unwrap_or_default(),
    };

    state.store.add_game(game.clone())?;
    state
        .journal
        .log(LogLevel::Info, format!("Added {} to the watch list", game.display_name));
    Ok((StatusCode::CREATED, Json(game)))
}

async fn remove_game(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if !state.store.remove_game(&id)? {
        return Err(Error::not_found("Game", id).into());
    }
    state
        .journal
        .log(LogLevel::Info, format!("Removed {id} from the watch list"));
    Ok(StatusCode::NO_CONTENT)
}

async fn reorder_games(
    State(state): State<AppState>,
    Json(request): Json<ReorderRequest>,
) -> ApiResult<Json<Vec<String>>> {
    state
        .store
        .reorder_games(request.game_ids.clone())?;
    Ok(Json(request.game_ids))
}

/// Live drop-enabled streams for a game, straight from the platform.
async fn game_streams(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<StreamsQuery>,
) -> ApiResult<Json<GameStreamsResponse>> {
    let game = state
        .store
        .get_game(&id)?
        .unwrap_or_else(|| Game::from_display_name(&id));
    let limit = query
        .limit
        .unwrap_or(DEFAULT_STREAM_LIMIT)
        .clamp(1, MAX_STREAM_LIMIT);

    let streams: Vec<StreamHandle> = state
        .catalog
        .discover_streams(&game, limit)
        .await?
        .into_iter()
        .map(|node| StreamHandle::from_node(node, &game.id))
        .collect();

    Ok(Json(GameStreamsResponse {
        game: game.id,
        stream_count: streams.len(),
        streams,
    }))
}
