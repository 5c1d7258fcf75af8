use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::http::server::AppState;
use crate::load_balancer::{BackendView, HealthState};

#[derive(Debug, Deserialize)]
pub struct AddBackend {
    pub address: String,
}

#[derive(Debug, Serialize)]
pub struct BackendList {
    pub total: usize,
    pub healthy: usize,
    pub backends: Vec<BackendView>,
}

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("backend address must not be empty")]
    EmptyAddress,

    #[error("backend {0} is already registered")]
    AlreadyRegistered(String),

    #[error("backend {0} is not registered")]
    NotFound(String),
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let status = match self {
            AdminError::EmptyAddress => StatusCode::BAD_REQUEST,
            AdminError::AlreadyRegistered(_) => StatusCode::CONFLICT,
            AdminError::NotFound(_) => StatusCode::NOT_FOUND,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

pub async fn list_backends(State(state): State<AppState>) -> Json<BackendList> {
    let backends = state.registry.all();
    Json(BackendList {
        total: backends.len(),
        healthy: backends.iter().filter(|b| b.health == HealthState::Healthy).count(),
        backends,
    })
}

pub async fn add_backend(
    State(state): State<AppState>,
    Json(body): Json<AddBackend>,
) -> Result<(StatusCode, Json<BackendView>), AdminError> {
    let address = body.address.trim();
    if address.is_empty() {
        return Err(AdminError::EmptyAddress);
    }
    if !state.registry.add(address) {
        return Err(AdminError::AlreadyRegistered(address.to_string()));
    }

    // Just inserted; only a concurrent delete could make this miss.
    let view = state
        .registry
        .get(address)
        .ok_or_else(|| AdminError::NotFound(address.to_string()))?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn remove_backend(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<StatusCode, AdminError> {
    if state.registry.remove(&address) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AdminError::NotFound(address))
    }
}
