//! Bearer token identity extractor.
//!
//! The identity provider is trusted: a valid token's subject is the user id and
//! its role claim decides vendor and admin privileges.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use shared::jwt::{extract_user_id, JwtError, Role};
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;

/// Authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub role: Role,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Rejects callers whose role is not in `roles`.
    pub fn require_role(&self, roles: &[Role]) -> Result<(), ApiError> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!(
                "Role {} may not perform this action",
                self.role
            )))
        }
    }

    /// Allows the owner of a resource or an admin.
    pub fn require_owner_or_admin(&self, owner_id: Uuid) -> Result<(), ApiError> {
        if self.user_id == owner_id || self.is_admin() {
            Ok(())
        } else {
            Err(ApiError::Forbidden(
                "Only the owner or an admin may perform this action".to_string(),
            ))
        }
    }
}

fn bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    let auth_header = parts
        .headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".to_string()))?;

    auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::Unauthorized("Invalid Authorization header format".to_string()))
}

#[async_trait]
impl FromRequestParts<AppState> for Identity {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(identity) = parts.extensions.get::<Identity>() {
            return Ok(*identity);
        }

        let token = bearer_token(parts)?;
        let claims = state.jwt.validate_token(token).map_err(|e| match e {
            JwtError::TokenExpired => ApiError::Unauthorized("Token has expired".to_string()),
            _ => ApiError::Unauthorized("Invalid or expired token".to_string()),
        })?;
        let user_id = extract_user_id(&claims)
            .map_err(|_| ApiError::Unauthorized("Invalid token subject".to_string()))?;

        let identity = Identity {
            user_id,
            role: claims.role,
        };
        parts.extensions.insert(identity);
        Ok(identity)
    }
}
