use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use tracing::instrument;

use crate::{
    auth::{
        dto::{PublicUser, SignInRequest, SignInResponse, SignUpRequest, SignUpResponse},
        errors::AuthError,
    },
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(sign_up))
        .route("/signin", post(sign_in))
}

#[instrument(skip(state, payload))]
pub async fn sign_up(
    State(state): State<AppState>,
    Json(payload): Json<SignUpRequest>,
) -> Result<(StatusCode, Json<SignUpResponse>), AuthError> {
    let user = state.auth.sign_up(&payload.email, &payload.password).await?;
    Ok((
        StatusCode::CREATED,
        Json(SignUpResponse {
            user: PublicUser::from(&user),
        }),
    ))
}

/// No sign-out counterpart: tokens are stateless and the client discards them.
#[instrument(skip(state, payload))]
pub async fn sign_in(
    State(state): State<AppState>,
    Json(payload): Json<SignInRequest>,
) -> Result<Json<SignInResponse>, AuthError> {
    let signed = state.auth.sign_in(&payload.email, &payload.password).await?;
    Ok(Json(SignInResponse {
        user: PublicUser::from(&signed.user),
        token: signed.token,
    }))
}
