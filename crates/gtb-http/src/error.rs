//! Maps core errors to HTML error pages.

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

use gtb_core::errors::Error;

use crate::pages;

#[derive(Debug)]
pub enum AppError {
    /// The user declined on GitHub's consent screen.
    Denied(String),
    Core(Error),
}

impl From<Error> for AppError {
    fn from(e: Error) -> Self {
        AppError::Core(e)
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Denied(_) => StatusCode::BAD_REQUEST,
            AppError::Core(e) => match e {
                Error::MissingParameter(_) => StatusCode::BAD_REQUEST,
                Error::Unauthenticated => StatusCode::UNAUTHORIZED,
                Error::AuthExchange(_) | Error::Upstream { .. } => StatusCode::BAD_GATEWAY,
                Error::StoreRead(_)
                | Error::StoreWrite(_)
                | Error::Config(_)
                | Error::Io(_)
                | Error::Json(_)
                | Error::External(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn message(&self) -> String {
        match self {
            AppError::Denied(reason) => format!("Authorization was not granted: {reason}"),
            AppError::Core(e @ (Error::StoreRead(_) | Error::StoreWrite(_))) => {
                tracing::error!("callback store failure: {e}");
                "Your account could not be saved. Please try again later.".to_string()
            }
            AppError::Core(e) => e.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), "callback failed: {self:?}");
        }
        (status, Html(pages::error_page(&self.message()))).into_response()
    }
}
