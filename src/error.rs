use log::error;
use serde_json::json;
use warp::{
    filters::{body::BodyDeserializeError, cors::CorsForbidden},
    http::StatusCode,
    reject::Reject,
    reply::{self, Reply},
    Rejection,
};

/// Domain error taxonomy. Every variant maps to a 4xx status except
/// `Storage`, which is surfaced as a generic 500 and logged in full.
#[derive(Debug)]
pub enum Error {
    Validation(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    Storage(anyhow::Error),
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::Validation(msg) => write!(f, "invalid request: {}", msg),
            Error::Unauthorized(msg) => write!(f, "unauthorized: {}", msg),
            Error::Forbidden(msg) => write!(f, "forbidden: {}", msg),
            Error::NotFound(msg) => write!(f, "not found: {}", msg),
            Error::Conflict(msg) => write!(f, "conflict: {}", msg),
            Error::Storage(e) => write!(f, "storage error: {}", e),
        }
    }
}

impl Reject for Error {}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Error::Storage(e)
    }
}

fn envelope(message: String, status: StatusCode) -> warp::reply::WithStatus<warp::reply::Json> {
    reply::with_status(
        reply::json(&json!({ "success": false, "message": message })),
        status,
    )
}

pub async fn return_error(r: Rejection) -> Result<impl Reply, Rejection> {
    if let Some(e) = r.find::<Error>() {
        if let Error::Storage(inner) = e {
            error!("storage error: {:#}", inner);
            return Ok(envelope("internal server error".to_string(), e.status()));
        }
        Ok(envelope(e.to_string(), e.status()))
    } else if let Some(e) = r.find::<BodyDeserializeError>() {
        Ok(envelope(e.to_string(), StatusCode::BAD_REQUEST))
    } else if let Some(e) = r.find::<CorsForbidden>() {
        Ok(envelope(e.to_string(), StatusCode::FORBIDDEN))
    } else if r.is_not_found() {
        Ok(envelope("route not found".to_string(), StatusCode::NOT_FOUND))
    } else {
        Ok(envelope(
            format!("unhandled rejection: {:?}", r),
            StatusCode::BAD_REQUEST,
        ))
    }
}
