use axum::extract::State;
use axum::Json;

use crate::api::AppState;

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Ready once every watched game has a published view.
pub async fn ready(State(state): State<AppState>) -> Json<serde_json::Value> {
    let mut published = 0usize;
    for game_id in &state.config.watch_games {
        if state.store.get(*game_id).await.is_some() {
            published += 1;
        }
    }
    let watched = state.config.watch_games.len();
    let status = if published == watched { "ready" } else { "warming" };
    Json(serde_json::json!({
        "status": status,
        "watchedGames": watched,
        "publishedViews": published,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_returns_ok() {
        let Json(body) = health().await;
        assert_eq!(body["status"], "ok");
    }
}
