use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT payload used for authentication.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: Uuid,      // user ID
    pub email: String,  // user email at issuance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>, // issued at (unix timestamp)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>, // expires at (unix timestamp)
    pub iss: String,    // issuer
    pub aud: String,    // audience
}
