pub mod protected;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    protected::protected_routes()
}
