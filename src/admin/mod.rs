//! Admin API for backend membership.
//!
//! # Routes
//! - `GET /admin/backends`: every backend with its health
//! - `POST /admin/backends`: register `{"address": ...}` (auth)
//! - `DELETE /admin/backends/{address}`: deregister (auth)

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::AppState;

pub fn setup_admin_router(state: AppState) -> Router<AppState> {
    let mutations = Router::new()
        .route("/admin/backends", post(add_backend))
        .route("/admin/backends/{address}", delete(remove_backend))
        .layer(middleware::from_fn_with_state(state, admin_auth_middleware));

    Router::new()
        .route("/admin/backends", get(list_backends))
        .merge(mutations)
}
