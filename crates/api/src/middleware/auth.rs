//! Admin identity extractor.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use kiosk_core::error::CoreError;
use kiosk_core::types::DbId;
use kiosk_core::verification::ActorContext;

use crate::auth::jwt::{validate_token, ROLE_ADMIN};
use crate::error::AppError;
use crate::state::AppState;

/// An authenticated admin, read from the `Authorization: Bearer` header.
///
/// Missing or invalid tokens are rejected with 401; valid tokens for any
/// other role with 403.
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub user_id: DbId,
    pub name: String,
}

impl AdminUser {
    /// Actor for a state-machine transition happening now.
    pub fn actor(&self) -> ActorContext {
        ActorContext {
            actor_id: self.user_id,
            actor_name: self.name.clone(),
            now: chrono::Utc::now(),
        }
    }
}

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized(
                    "Missing Authorization header".into(),
                ))
            })?;

        let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized(
                "Invalid Authorization format. Expected: Bearer <token>".into(),
            ))
        })?;

        let claims = validate_token(token, &state.config.jwt).map_err(|_| {
            AppError::Core(CoreError::Unauthorized("Invalid or expired token".into()))
        })?;

        if claims.role != ROLE_ADMIN {
            return Err(AppError::Core(CoreError::Forbidden(
                "Only admins can review returns".into(),
            )));
        }

        Ok(AdminUser {
            user_id: claims.sub,
            name: claims.name,
        })
    }
}
