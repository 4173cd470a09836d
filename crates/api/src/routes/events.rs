//! Event and event equipment endpoint handlers.
//!
//! Any authenticated user may create events and register. Changes to an
//! event's equipment or its deletion are limited to the creator or an admin.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use domain::models::{
    AddEquipmentRequest, CreateEventRequest, EquipmentReservation, EventDetails,
    RegistrationOutcome, UpdateEquipmentQuantityRequest,
};
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::Identity;

/// Loads the event and checks the caller may manage it.
async fn authorize_event_owner(
    state: &AppState,
    identity: &Identity,
    event_id: Uuid,
) -> Result<(), ApiError> {
    let details = state.coordinator.get_event(event_id).await?;
    identity.require_owner_or_admin(details.event.created_by)
}

/// Create an event together with its equipment reservations.
///
/// POST /api/v1/events
pub async fn create_event(
    State(state): State<AppState>,
    identity: Identity,
    Json(request): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<EventDetails>), ApiError> {
    let details = state
        .coordinator
        .create_event_with_equipment(identity.user_id, request.event, request.equipment)
        .await?;

    Ok((StatusCode::CREATED, Json(details)))
}

/// GET /api/v1/events/:event_id
pub async fn get_event(
    State(state): State<AppState>,
    _identity: Identity,
    Path(event_id): Path<Uuid>,
) -> Result<Json<EventDetails>, ApiError> {
    Ok(Json(state.coordinator.get_event(event_id).await?))
}

/// Delete an event, releasing its stock and cancelling its registrations.
///
/// DELETE /api/v1/events/:event_id
pub async fn delete_event(
    State(state): State<AppState>,
    identity: Identity,
    Path(event_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    authorize_event_owner(&state, &identity, event_id).await?;
    state.coordinator.delete_event(event_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/events/:event_id/equipment
pub async fn add_equipment(
    State(state): State<AppState>,
    identity: Identity,
    Path(event_id): Path<Uuid>,
    Json(request): Json<AddEquipmentRequest>,
) -> Result<Json<EventDetails>, ApiError> {
    authorize_event_owner(&state, &identity, event_id).await?;
    let details = state
        .coordinator
        .add_equipment_to_event(event_id, request.equipment)
        .await?;
    Ok(Json(details))
}

/// PATCH /api/v1/events/:event_id/equipment/:equipment_id
pub async fn update_equipment_quantity(
    State(state): State<AppState>,
    identity: Identity,
    Path((event_id, equipment_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<UpdateEquipmentQuantityRequest>,
) -> Result<Json<EquipmentReservation>, ApiError> {
    authorize_event_owner(&state, &identity, event_id).await?;
    let line = state
        .coordinator
        .update_equipment_quantity(event_id, equipment_id, request.quantity)
        .await?;
    Ok(Json(line))
}

/// DELETE /api/v1/events/:event_id/equipment/:equipment_id
pub async fn remove_equipment(
    State(state): State<AppState>,
    identity: Identity,
    Path((event_id, equipment_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<EventDetails>, ApiError> {
    authorize_event_owner(&state, &identity, event_id).await?;
    let details = state
        .coordinator
        .remove_equipment_from_event(event_id, equipment_id)
        .await?;
    Ok(Json(details))
}

/// Register the caller for an event.
///
/// POST /api/v1/events/:event_id/register
pub async fn register(
    State(state): State<AppState>,
    identity: Identity,
    Path(event_id): Path<Uuid>,
) -> Result<(StatusCode, Json<RegistrationOutcome>), ApiError> {
    let outcome = state
        .coordinator
        .register_for_event(event_id, identity.user_id)
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}
