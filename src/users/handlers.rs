use axum::{extract::State, routing::get, Json, Router};
use serde::Deserialize;
use tracing::instrument;

use crate::{
    auth::{extractors::AuthUser, repo_types::{ProfilePatch, PublicUser}},
    error::AppResult,
    extract::ApiJson,
    state::AppState,
};

/// `email` and `password` are not accepted here and are dropped if sent.
#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    #[serde(default, alias = "lastName")]
    pub last_name: Option<String>,
    pub age: Option<i32>,
}

impl From<UpdateProfileRequest> for ProfilePatch {
    fn from(r: UpdateProfileRequest) -> Self {
        Self {
            username: r.username,
            last_name: r.last_name,
            age: r.age,
        }
    }
}

pub fn profile_routes() -> Router<AppState> {
    Router::new().route("/users/profile", get(get_profile).put(update_profile))
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<PublicUser>> {
    Ok(Json(state.auth.profile(user_id).await?))
}

#[instrument(skip(state, body))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiJson(body): ApiJson<UpdateProfileRequest>,
) -> AppResult<Json<PublicUser>> {
    Ok(Json(state.auth.update_profile(user_id, body.into()).await?))
}
