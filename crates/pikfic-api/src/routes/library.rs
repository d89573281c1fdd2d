//! Library maintenance routes.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use pikfic_core::error::StoryError;
use pikfic_persistence::gateway::ImportReport;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::ApiError;
use crate::identity::CurrentIdentity;
use crate::state::AppState;

/// POST /import
///
/// Copies the device-local library into the signed-in owner's remote library.
/// Stories already present remotely, and stories beyond the quota, are skipped.
/// Stories the remote backend refuses are listed as failed.
#[instrument(skip_all)]
async fn import_local(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
) -> Result<Json<ImportReport>, ApiError> {
    let identity = identity.ok_or(StoryError::IdentityRequired)?;
    let correlation_id = Uuid::new_v4();
    info!(%correlation_id, owner = %identity.owner_id, "handling import_local");

    let gateway = state.gateway(Some(&identity))?;
    let report = gateway
        .import_from(state.selector.local().as_ref())
        .await?;

    info!(
        imported = report.imported.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "local library imported"
    );
    Ok(Json(report))
}

/// Returns the router for library maintenance.
pub fn router() -> Router<AppState> {
    Router::new().route("/import", post(import_local))
}
