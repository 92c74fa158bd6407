use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;

use crate::api::AppState;
use crate::domain::{Amount, GameId};
use crate::engine::{EliminationProjection, GameResult, RoundStandings};
use crate::error::AppError;
use crate::orchestration::GameView;

fn parse_game_id(input: &str) -> Result<GameId, AppError> {
    GameId::from_str(input).map_err(|_| AppError::BadRequest("Invalid game id".to_string()))
}

/// Latest published view, or a fresh build when the game is not polled.
async fn load_view(state: &AppState, game_id: GameId) -> Result<Arc<GameView>, AppError> {
    if let Some(view) = state.store.get(game_id).await {
        return Ok(view);
    }
    let view = state.orchestrator.build_view(game_id).await?;
    Ok(Arc::new(view))
}

fn format_tokens(amount: Amount, decimals: u32) -> String {
    amount
        .to_decimal(decimals)
        .map(|d| d.to_string())
        .unwrap_or_else(|| amount.to_string())
}

pub async fn get_game(
    Path(game_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<GameView>, AppError> {
    let game_id = parse_game_id(&game_id)?;
    let view = load_view(&state, game_id).await?;
    Ok(Json(view.as_ref().clone()))
}

pub async fn get_round(
    Path((game_id, round)): Path<(String, u32)>,
    State(state): State<AppState>,
) -> Result<Json<RoundStandings>, AppError> {
    let game_id = parse_game_id(&game_id)?;
    let view = load_view(&state, game_id).await?;
    view.round(round)
        .cloned()
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("round {} is not finalized", round)))
}

pub async fn get_projection(
    Path(game_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<EliminationProjection>, AppError> {
    let game_id = parse_game_id(&game_id)?;
    let view = load_view(&state, game_id).await?;
    view.projection
        .clone()
        .map(Json)
        .ok_or_else(|| AppError::NotFound("no round awaiting finalization".to_string()))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementsResponse {
    #[serde(flatten)]
    pub result: GameResult,
    pub prize_pool_tokens: String,
    /// Whole-token prize shares, aligned with `placements`.
    pub prize_share_tokens: Vec<String>,
}

pub async fn get_placements(
    Path(game_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<PlacementsResponse>, AppError> {
    let game_id = parse_game_id(&game_id)?;
    let view = load_view(&state, game_id).await?;
    let result = view
        .result
        .clone()
        .ok_or_else(|| AppError::NotFound("game is not finalized".to_string()))?;

    let decimals = state.config.token_decimals;
    let prize_share_tokens = result
        .placements
        .iter()
        .map(|p| format_tokens(p.prize_share, decimals))
        .collect();

    Ok(Json(PlacementsResponse {
        prize_pool_tokens: format_tokens(result.prize_pool, decimals),
        prize_share_tokens,
        result,
    }))
}
