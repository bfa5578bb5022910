use actix_web::http::StatusCode;
use actix_web::web::{JsonConfig, PathConfig, QueryConfig};
use actix_web::{error, HttpRequest, HttpResponse, ResponseError};
use serde::Serialize;

use crate::services::ServiceError;

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::InvalidTransition(_)
            | ServiceError::OrderNotPayable(_)
            | ServiceError::StaleIntent(_)
            | ServiceError::ConcurrentModification(_) => StatusCode::CONFLICT,
            ServiceError::GatewayUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: self.code(),
            message: self.to_string(),
        })
    }
}

/// Malformed bodies and query strings are validation failures
pub fn json_config() -> JsonConfig {
    JsonConfig::default().error_handler(|err, _req: &HttpRequest| {
        error::InternalError::from_response(
            err.to_string(),
            ServiceError::Validation(format!("Invalid request body: {err}")).error_response(),
        )
        .into()
    })
}

pub fn query_config() -> QueryConfig {
    QueryConfig::default().error_handler(|err, _req: &HttpRequest| {
        error::InternalError::from_response(
            err.to_string(),
            ServiceError::Validation(format!("Invalid query string: {err}")).error_response(),
        )
        .into()
    })
}

/// An unparseable id cannot name any resource
pub fn path_config() -> PathConfig {
    PathConfig::default().error_handler(|err, _req: &HttpRequest| {
        error::InternalError::from_response(
            err.to_string(),
            ServiceError::NotFound("Resource".to_string()).error_response(),
        )
        .into()
    })
}
