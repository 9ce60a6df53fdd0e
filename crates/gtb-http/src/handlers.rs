use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use gtb_core::{domain::ChatIdentity, errors::Error};

use crate::{error::AppError, pages, HttpState};

/// GET /health
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Default, Deserialize)]
pub struct AuthorizeParams {
    pub chat: Option<String>,
}

/// GET /auth/github?chat=<id> - 302 to GitHub's authorization page.
pub async fn authorize(
    State(state): State<HttpState>,
    Query(params): Query<AuthorizeParams>,
) -> Result<Response, AppError> {
    let chat = ChatIdentity::new(params.chat.unwrap_or_default().trim());
    if chat.is_empty() {
        return Err(Error::MissingParameter("chat").into());
    }
    let url = state.linkage.begin_authorization(&chat)?;
    Ok((StatusCode::FOUND, [(header::LOCATION, url)]).into_response())
}

#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// GET /auth/github/callback?code&state - finish linking for the chat in `state`.
pub async fn callback(
    State(state): State<HttpState>,
    Query(params): Query<CallbackParams>,
) -> Result<Html<String>, AppError> {
    if let Some(err) = params.error.filter(|e| !e.is_empty()) {
        tracing::info!(error = %err, "authorization declined");
        return Err(AppError::Denied(params.error_description.unwrap_or(err)));
    }

    let code = params.code.unwrap_or_default();
    let chat = ChatIdentity::new(params.state.unwrap_or_default().trim());
    let record = state.linkage.complete_authorization(&code, &chat).await?;
    Ok(Html(pages::success_page(record.hosting_username.as_deref())))
}
