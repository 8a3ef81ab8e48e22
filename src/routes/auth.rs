//! OAuth login, callback, and status endpoints.
//!
//! The code exchange itself is the provider's job; these routes only steer
//! the browser and persist the resulting credential.

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Query, State},
    response::Redirect,
    routing::get,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/login", get(login))
        .route("/auth/callback", get(callback))
        .route("/auth/status", get(status))
}

/// GET /auth/login - Redirect the browser to the provider consent screen
async fn login(State(state): State<AppState>) -> Redirect {
    Redirect::temporary(&state.provider.auth_url())
}

#[derive(Deserialize)]
struct CallbackParams {
    code: Option<String>,
    error: Option<String>,
}

/// GET /auth/callback - Exchange the authorization code for tokens
///
/// Failures send the browser back to the dashboard with an error marker
/// instead of surfacing a raw error page mid-flow.
async fn callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Redirect {
    if let Some(error) = params.error {
        return Redirect::temporary(&format!("/?error={}", error));
    }

    let Some(code) = params.code else {
        return Redirect::temporary("/?error=missing_code");
    };

    match state.provider.exchange_code(&code).await {
        Ok(tokens) => {
            if let Err(e) = state.credentials.put(tokens) {
                error!(error = %e, "failed to persist tokens");
                return Redirect::temporary("/?error=auth_failed");
            }
            info!("operator authenticated");
            Redirect::temporary("/?authenticated=true")
        }
        Err(e) => {
            error!(error = %e, "code exchange failed");
            Redirect::temporary("/?error=auth_failed")
        }
    }
}

#[derive(Serialize)]
struct AuthStatus {
    authenticated: bool,
}

/// GET /auth/status - Whether a credential is on file
async fn status(State(state): State<AppState>) -> Result<Json<AuthStatus>, ApiError> {
    let authenticated = state
        .credentials
        .get()
        .context("Failed to read stored tokens")?
        .is_some();

    Ok(Json(AuthStatus { authenticated }))
}
