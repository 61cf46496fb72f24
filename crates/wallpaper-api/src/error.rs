//! Error types for the wallpaper service
//!
//! `ServeError` carries unexpected faults out of the request pipeline.
//! `ApiError` is the set of user-visible failure responses; every request
//! failure ends up as one of them.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use std::fmt;
use wallpaper_store::StoreError;

/// Top-level error for startup and configuration
#[derive(Debug)]
pub enum WallpaperError {
    Store(StoreError),
    Io(Box<std::io::Error>),
    Config(String),
}

impl fmt::Display for WallpaperError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WallpaperError::Store(err) => write!(f, "Store error: {}", err),
            WallpaperError::Io(err) => write!(f, "IO error: {}", err),
            WallpaperError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for WallpaperError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WallpaperError::Store(err) => Some(err),
            WallpaperError::Io(err) => Some(err.as_ref()),
            WallpaperError::Config(_) => None,
        }
    }
}

impl From<StoreError> for WallpaperError {
    fn from(err: StoreError) -> Self {
        WallpaperError::Store(err)
    }
}

impl From<std::io::Error> for WallpaperError {
    fn from(err: std::io::Error) -> Self {
        WallpaperError::Io(Box::new(err))
    }
}

impl From<tracing_subscriber::filter::ParseError> for WallpaperError {
    fn from(err: tracing_subscriber::filter::ParseError) -> Self {
        WallpaperError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, WallpaperError>;

/// Unexpected fault while serving a request
#[derive(Debug)]
pub enum ServeError {
    Store(StoreError),
    MalformedIndex {
        index_name: String,
        source: serde_json::Error,
    },
}

impl fmt::Display for ServeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServeError::Store(err) => write!(f, "Store error: {}", err),
            ServeError::MalformedIndex { index_name, source } => {
                write!(f, "Malformed key index {}: {}", index_name, source)
            }
        }
    }
}

impl std::error::Error for ServeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServeError::Store(err) => Some(err),
            ServeError::MalformedIndex { source, .. } => Some(source),
        }
    }
}

impl From<StoreError> for ServeError {
    fn from(err: StoreError) -> Self {
        ServeError::Store(err)
    }
}

/// Failure to rebuild one partition's index
#[derive(Debug)]
pub enum RefreshError {
    List(StoreError),
    Encode(serde_json::Error),
    Write(StoreError),
}

impl fmt::Display for RefreshError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshError::List(err) => write!(f, "Listing failed: {}", err),
            RefreshError::Encode(err) => write!(f, "Encoding failed: {}", err),
            RefreshError::Write(err) => write!(f, "Index write failed: {}", err),
        }
    }
}

impl std::error::Error for RefreshError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RefreshError::List(err) | RefreshError::Write(err) => Some(err),
            RefreshError::Encode(err) => Some(err),
        }
    }
}

/// User-visible failure responses
#[derive(Debug)]
pub enum ApiError {
    /// The partition's index is missing or empty (503)
    ColdCache,
    /// The index named a key the blob store no longer has (404)
    IndexInconsistent,
    /// Anything else (500). The message is logged, never returned.
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::ColdCache => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::IndexInconsistent => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            ApiError::ColdCache => "Image service is warming up, please retry later.",
            ApiError::IndexInconsistent => "The selected image could not be retrieved.",
            ApiError::Internal(_) => "Internal server error.",
        }
    }
}

impl From<ServeError> for ApiError {
    fn from(err: ServeError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(msg) = &self {
            tracing::error!(error = %msg, "Internal server error");
        }

        (
            self.status(),
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.message(),
        )
            .into_response()
    }
}
