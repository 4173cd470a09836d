//! Equipment catalog endpoint handlers.
//!
//! Vendors list and restock their own equipment; admins moderate listings.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use domain::models::{
    CreateEquipmentRequest, EquipmentStock, RestockRequest, UpdateEquipmentStatusRequest,
};
use shared::jwt::Role;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::Identity;

/// POST /api/v1/equipment
pub async fn create_equipment(
    State(state): State<AppState>,
    identity: Identity,
    Json(request): Json<CreateEquipmentRequest>,
) -> Result<(StatusCode, Json<EquipmentStock>), ApiError> {
    identity.require_role(&[Role::Vendor])?;
    let equipment = state
        .catalog
        .list_equipment(identity.user_id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(equipment)))
}

/// GET /api/v1/equipment/:equipment_id
pub async fn get_equipment(
    State(state): State<AppState>,
    _identity: Identity,
    Path(equipment_id): Path<Uuid>,
) -> Result<Json<EquipmentStock>, ApiError> {
    Ok(Json(state.catalog.get_equipment(equipment_id).await?))
}

/// Approve or reject a listing. Stock counts are not touched.
///
/// PUT /api/v1/equipment/:equipment_id/status
pub async fn set_status(
    State(state): State<AppState>,
    identity: Identity,
    Path(equipment_id): Path<Uuid>,
    Json(request): Json<UpdateEquipmentStatusRequest>,
) -> Result<Json<EquipmentStock>, ApiError> {
    identity.require_role(&[Role::Admin])?;
    let equipment = state
        .catalog
        .set_status(equipment_id, request.status)
        .await?;
    Ok(Json(equipment))
}

/// POST /api/v1/equipment/:equipment_id/restock
pub async fn restock(
    State(state): State<AppState>,
    identity: Identity,
    Path(equipment_id): Path<Uuid>,
    Json(request): Json<RestockRequest>,
) -> Result<Json<EquipmentStock>, ApiError> {
    request.validate()?;
    let current = state.catalog.get_equipment(equipment_id).await?;
    identity.require_owner_or_admin(current.vendor_id)?;

    let equipment = state.catalog.restock(equipment_id, request.units).await?;
    Ok(Json(equipment))
}

/// DELETE /api/v1/equipment/:equipment_id
pub async fn delete_equipment(
    State(state): State<AppState>,
    identity: Identity,
    Path(equipment_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let current = state.catalog.get_equipment(equipment_id).await?;
    identity.require_owner_or_admin(current.vendor_id)?;

    state.catalog.delete_equipment(equipment_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
