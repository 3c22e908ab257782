// SPDX-License-Identifier: MIT

//! Admin routes: privileged account management.
//!
//! These mirror the privileged serverless functions of the hosted setup:
//! creating moderator accounts and deleting users with all their scan
//! records. Identity-provider account lifecycle (passwords, email
//! verification) stays outside this service; these endpoints manage only
//! the Firestore documents.

use crate::error::{AppError, Result};
use crate::middleware::auth::{load_role, AuthUser};
use crate::models::{Role, User};
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::{delete, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

/// Admin routes. Auth middleware is applied in routes/mod.rs; every handler
/// requires the admin role.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/admin/moderators", post(create_moderator))
        .route("/api/admin/users/{uid}", delete(delete_user))
        .route("/api/admin/users/{uid}/reset", post(reset_user))
}

/// Reject callers below admin.
async fn require_admin(state: &AppState, auth: &AuthUser) -> Result<()> {
    if load_role(state, &auth.uid).await? == Role::Admin {
        Ok(())
    } else {
        tracing::warn!(uid = %auth.uid, "Blocked non-admin request");
        Err(AppError::Forbidden)
    }
}

// ─── Moderator Creation ──────────────────────────────────────

#[derive(Deserialize, Validate)]
pub struct CreateModeratorRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    /// Identity-provider uid for the new moderator. The auth account is
    /// created in the provider's console; this binds the profile to it.
    #[validate(length(min = 1, max = 128))]
    pub uid: String,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CreateModeratorResponse {
    pub uid: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub role: Role,
}

/// Create a moderator profile document.
async fn create_moderator(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(request): Json<CreateModeratorRequest>,
) -> Result<Json<CreateModeratorResponse>> {
    require_admin(&state, &auth).await?;

    request
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    if state.db.get_user(&request.uid).await?.is_some() {
        return Err(AppError::BadRequest(format!(
            "User {} already exists",
            request.uid
        )));
    }

    let user = User {
        uid: request.uid.clone(),
        email: request.email,
        name: request.name,
        role: Role::Moderator,
        total_points: 0,
        created_at: chrono::Utc::now().to_rfc3339(),
    };
    state.db.upsert_user(&user).await?;

    tracing::info!(uid = %user.uid, by = %auth.uid, "Moderator created");

    Ok(Json(CreateModeratorResponse {
        uid: user.uid,
        role: user.role,
    }))
}

// ─── User Deletion ───────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DeleteUserResponse {
    pub uid: String,
    pub documents_deleted: usize,
}

/// Delete a user's profile and every scan referencing them.
async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(uid): Path<String>,
) -> Result<Json<DeleteUserResponse>> {
    require_admin(&state, &auth).await?;

    if uid == auth.uid {
        return Err(AppError::BadRequest(
            "Admins cannot delete their own account".to_string(),
        ));
    }

    let documents_deleted = state.db.delete_user_data(&uid).await?;

    tracing::info!(uid = %uid, by = %auth.uid, documents_deleted, "User deleted");

    Ok(Json(DeleteUserResponse {
        uid,
        documents_deleted,
    }))
}

// ─── Progress Reset ──────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ResetUserResponse {
    pub uid: String,
    pub scans_deleted: usize,
}

/// Reset an attendee's progress: remove all scans, zero the counter.
async fn reset_user(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(uid): Path<String>,
) -> Result<Json<ResetUserResponse>> {
    require_admin(&state, &auth).await?;

    if state.db.get_user(&uid).await?.is_none() {
        return Err(AppError::NotFound(format!("User {} not found", uid)));
    }

    let scans_deleted = state.db.reset_user_progress(&uid).await?;

    tracing::info!(uid = %uid, by = %auth.uid, scans_deleted, "User progress reset");

    Ok(Json(ResetUserResponse { uid, scans_deleted }))
}
