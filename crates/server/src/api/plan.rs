//! Content plan handlers. Week and item indices in paths are 0-based.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use personaforge_core::{Command, ContentType, ItemEdit};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::run::{bad_body, dispatch, reject, AcceptedResponse, Rejection};
use crate::state::AppState;

/// Request body for rewriting a week
#[derive(Debug, Deserialize)]
pub struct RegenerateWeekBody {
    pub theme: String,
    /// Defaults to the run's output language
    pub language: Option<String>,
}

/// Request body for adding an item to a week
#[derive(Debug, Deserialize)]
pub struct AddContentBody {
    pub content_type: ContentType,
}

#[derive(Debug, Serialize)]
pub struct UpdateItemResponse {
    pub changed: bool,
}

pub async fn regenerate_week(
    State(state): State<Arc<AppState>>,
    Path(week): Path<usize>,
    body: Result<Json<RegenerateWeekBody>, JsonRejection>,
) -> Result<(StatusCode, Json<AcceptedResponse>), Rejection> {
    let Json(body) = body.map_err(|e| bad_body("regenerate_week", e))?;
    dispatch(
        &state,
        Command::RegenerateWeek {
            week,
            theme: body.theme,
            language: body.language,
        },
    )
}

pub async fn add_content(
    State(state): State<Arc<AppState>>,
    Path(week): Path<usize>,
    body: Result<Json<AddContentBody>, JsonRejection>,
) -> Result<(StatusCode, Json<AcceptedResponse>), Rejection> {
    let Json(body) = body.map_err(|e| bad_body("add_content", e))?;
    dispatch(
        &state,
        Command::AddContent {
            week,
            content_type: body.content_type,
        },
    )
}

/// Edit item text in place; applies immediately
pub async fn update_item(
    State(state): State<Arc<AppState>>,
    Path((week, item)): Path<(usize, usize)>,
    body: Result<Json<ItemEdit>, JsonRejection>,
) -> Result<Json<UpdateItemResponse>, Rejection> {
    let Json(edit) = body.map_err(|e| bad_body("update_item", e))?;
    let changed = state
        .pipeline()
        .update_item(week, item, edit)
        .map_err(|e| reject("update_item", e))?;
    Ok(Json(UpdateItemResponse { changed }))
}

/// Produce media for an empty or failed item
pub async fn generate_item(
    State(state): State<Arc<AppState>>,
    Path((week, item)): Path<(usize, usize)>,
) -> Result<(StatusCode, Json<AcceptedResponse>), Rejection> {
    dispatch(&state, Command::RegenerateItem { week, item })
}

/// Extend a ready video item
pub async fn extend_item(
    State(state): State<Arc<AppState>>,
    Path((week, item)): Path<(usize, usize)>,
) -> Result<(StatusCode, Json<AcceptedResponse>), Rejection> {
    dispatch(&state, Command::ExtendVideo { week, item })
}

/// Record a talking-head selfie reading the item's script or caption
pub async fn selfie_item(
    State(state): State<Arc<AppState>>,
    Path((week, item)): Path<(usize, usize)>,
) -> Result<(StatusCode, Json<AcceptedResponse>), Rejection> {
    dispatch(&state, Command::RecordSelfie { week, item })
}

/// Animate the photo of a ready image item
pub async fn animate_item(
    State(state): State<Arc<AppState>>,
    Path((week, item)): Path<(usize, usize)>,
) -> Result<(StatusCode, Json<AcceptedResponse>), Rejection> {
    dispatch(&state, Command::AnimatePhoto { week, item })
}
