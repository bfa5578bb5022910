use actix_web::dev::Payload;
use actix_web::{FromRequest, HttpRequest};
use futures_util::future::{ready, Ready};
use uuid::Uuid;

use crate::services::{RequestContext, Role, ServiceError};

pub const USER_ID_HEADER: &str = "X-User-Id";
pub const USER_ROLE_HEADER: &str = "X-User-Role";
pub const CORRELATION_ID_HEADER: &str = "X-Correlation-Id";

fn header<'a>(req: &'a HttpRequest, name: &str) -> Option<&'a str> {
    req.headers().get(name).and_then(|value| value.to_str().ok())
}

fn extract(req: &HttpRequest) -> Result<RequestContext, ServiceError> {
    let user_id = header(req, USER_ID_HEADER)
        .ok_or_else(|| ServiceError::Unauthorized(format!("Missing {USER_ID_HEADER} header")))?;
    let user_id = Uuid::parse_str(user_id.trim())
        .map_err(|_| ServiceError::Unauthorized(format!("{USER_ID_HEADER} is not a valid id")))?;

    let role = match header(req, USER_ROLE_HEADER) {
        Some(role) => role.parse::<Role>()?,
        None => Role::Customer,
    };

    let mut ctx = RequestContext::new(user_id, role);
    if let Some(correlation_id) = header(req, CORRELATION_ID_HEADER).and_then(|v| Uuid::parse_str(v).ok()) {
        ctx.correlation_id = correlation_id;
    }
    Ok(ctx)
}

impl FromRequest for RequestContext {
    type Error = ServiceError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(extract(req))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_context_from_headers() {
        let user = Uuid::new_v4();
        let req = TestRequest::default()
            .insert_header((USER_ID_HEADER, user.to_string()))
            .insert_header((USER_ROLE_HEADER, "admin"))
            .to_http_request();

        let ctx = extract(&req).unwrap();
        assert_eq!(ctx.user_id, user);
        assert!(ctx.is_admin());
    }

    #[test]
    fn test_missing_or_bad_user_is_unauthorized() {
        let missing = TestRequest::default().to_http_request();
        assert_eq!(extract(&missing).unwrap_err().code(), "unauthorized");

        let bad = TestRequest::default().insert_header((USER_ID_HEADER, "nobody")).to_http_request();
        assert_eq!(extract(&bad).unwrap_err().code(), "unauthorized");
    }

    #[test]
    fn test_role_defaults_to_customer() {
        let req = TestRequest::default()
            .insert_header((USER_ID_HEADER, Uuid::new_v4().to_string()))
            .to_http_request();
        assert_eq!(extract(&req).unwrap().role, Role::Customer);
    }
}
