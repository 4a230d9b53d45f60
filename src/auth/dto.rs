use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::repo_types::User;

/// Request body for sign-up.
#[derive(Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
}

/// Request body for sign-in.
#[derive(Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// Response returned after sign-up.
#[derive(Debug, Serialize)]
pub struct SignUpResponse {
    pub user: PublicUser,
}

/// Response returned after sign-in.
#[derive(Debug, Serialize)]
pub struct SignInResponse {
    pub user: PublicUser,
    pub token: String,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
        }
    }
}
