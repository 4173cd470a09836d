//! Registration endpoint handlers.

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use domain::models::Registration;
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::Identity;

/// Loads a registration the caller owns (or any, for admins).
async fn owned_registration(
    state: &AppState,
    identity: &Identity,
    registration_id: Uuid,
) -> Result<Registration, ApiError> {
    let registration = state.coordinator.get_registration(registration_id).await?;
    identity.require_owner_or_admin(registration.user_id)?;
    Ok(registration)
}

/// GET /api/v1/registrations/:registration_id
pub async fn get_registration(
    State(state): State<AppState>,
    identity: Identity,
    Path(registration_id): Path<Uuid>,
) -> Result<Json<Registration>, ApiError> {
    Ok(Json(
        owned_registration(&state, &identity, registration_id).await?,
    ))
}

/// Cancel a registration; the waitlist head is promoted if a seat frees up.
///
/// DELETE /api/v1/registrations/:registration_id
pub async fn cancel_registration(
    State(state): State<AppState>,
    identity: Identity,
    Path(registration_id): Path<Uuid>,
) -> Result<Json<Registration>, ApiError> {
    owned_registration(&state, &identity, registration_id).await?;
    let cancelled = state
        .coordinator
        .cancel_registration(registration_id)
        .await?;
    Ok(Json(cancelled))
}

/// Download the ticket document.
///
/// GET /api/v1/registrations/:registration_id/ticket
pub async fn download_ticket(
    State(state): State<AppState>,
    identity: Identity,
    Path(registration_id): Path<Uuid>,
) -> Result<Response, ApiError> {
    owned_registration(&state, &identity, registration_id).await?;
    let document = state.coordinator.render_ticket(registration_id).await?;

    let disposition = format!("attachment; filename=\"{}\"", document.filename);
    Ok((
        [
            (header::CONTENT_TYPE, document.content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        document.bytes,
    )
        .into_response())
}
