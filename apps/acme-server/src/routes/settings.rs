//! `GET /api/settings`

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use web_core::{SettingsGroup, diagnostic_groups};

use super::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/settings", get(settings))
}

/// `Acme Settings`, then the validator's diagnostic groups.
#[must_use]
pub fn settings_groups(state: &AppState) -> Vec<SettingsGroup> {
    let mut groups = vec![SettingsGroup::new(
        "Acme Settings",
        state.validator.settings().summary(),
    )];
    groups.extend(diagnostic_groups(state.validator.as_ref()));
    groups
}

async fn settings(State(state): State<AppState>) -> Json<Vec<SettingsGroup>> {
    Json(settings_groups(&state))
}
