//! Every failure which can be reported back to a caller. Each request either
//! produces a route or exactly one of these, none of them are retried
//! automatically.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RouteError>;

#[derive(Error, Debug)]
pub enum RouteError {
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Start and destination are {distance:.0}m apart, the maximum is {max:.0}m")]
    PointTooFarApart { distance: f64, max: f64 },
    #[error("The requested points are outside of the area covered by the map")]
    MapIncompatible,
    #[error("No route exists between start and destination")]
    NoRouteFound,
    #[error("A route only exists through way classes or ways excluded by the profile")]
    RouteExcludedByProfile,
    #[error("A prior request for session {0} is still running")]
    PriorRequestStillRunning(String),
    #[error("Server busy, {0} sessions are already active")]
    ServerBusy(usize),
    #[error("Request cancelled by client")]
    Cancelled,
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RouteError {
    /// Machine readable identifier for the error, returned to API clients
    pub fn code(&self) -> &'static str {
        match self {
            RouteError::BadRequest(_) => "bad_request",
            RouteError::PointTooFarApart { .. } => "point_too_far_apart",
            RouteError::MapIncompatible => "map_incompatible",
            RouteError::NoRouteFound => "no_route_found",
            RouteError::RouteExcludedByProfile => "route_excluded_by_profile",
            RouteError::PriorRequestStillRunning(_) => "prior_request_still_running",
            RouteError::ServerBusy(_) => "server_busy",
            RouteError::Cancelled => "cancelled",
            RouteError::Database(_) => "database_error",
            RouteError::Internal(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            RouteError::BadRequest(_) => StatusCode::BAD_REQUEST,
            RouteError::PointTooFarApart { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            RouteError::MapIncompatible | RouteError::NoRouteFound => StatusCode::NOT_FOUND,
            RouteError::RouteExcludedByProfile => StatusCode::CONFLICT,
            RouteError::PriorRequestStillRunning(_) => StatusCode::TOO_MANY_REQUESTS,
            RouteError::ServerBusy(_) => StatusCode::SERVICE_UNAVAILABLE,
            // Client closed request, as used by nginx
            RouteError::Cancelled => {
                StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST)
            }
            RouteError::Database(_) | RouteError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        match &self {
            RouteError::Database(_) | RouteError::Internal(_) => {
                log::error!("{self}")
            }
            _ => log::info!("{self}"),
        }

        let body = json!({
            "error": self.code(),
            "message": self.to_string(),
        });

        (self.status(), Json(body)).into_response()
    }
}
