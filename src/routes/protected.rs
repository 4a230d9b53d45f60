use axum::{routing::get, Json, Router};
use serde::Serialize;
use tracing::instrument;

use crate::{
    auth::{extractors::AuthUser, PublicUser},
    state::AppState,
};

#[derive(Debug, Serialize)]
pub struct ProtectedResponse {
    pub message: String,
    pub user: PublicUser,
}

pub fn protected_routes() -> Router<AppState> {
    Router::new()
        .route("/protected_resource", get(protected_resource))
        .route("/me", get(me))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn protected_resource(AuthUser(user): AuthUser) -> Json<ProtectedResponse> {
    Json(ProtectedResponse {
        message: format!("hello, {}", user.email),
        user: PublicUser::from(&user),
    })
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn me(AuthUser(user): AuthUser) -> Json<PublicUser> {
    Json(PublicUser::from(&user))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protected_response_serialization() {
        let response = ProtectedResponse {
            message: "hello".into(),
            user: PublicUser {
                id: uuid::Uuid::new_v4(),
                email: "test@example.com".to_string(),
            },
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("test@example.com"));
        assert!(json.contains("message"));
        assert!(!json.contains("password"));
    }
}
