use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::order::OrderAggregate;
use super::errors::ServiceError;

// ============================================================================
// Request Context - who is acting
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Admin,
}

impl FromStr for Role {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "customer" => Ok(Role::Customer),
            "admin" => Ok(Role::Admin),
            other => Err(ServiceError::Unauthorized(format!("Unknown role: {other}"))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Customer => f.write_str("customer"),
            Role::Admin => f.write_str("admin"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
    pub user_id: Uuid,
    pub role: Role,
    /// Propagated onto every event the request produces
    pub correlation_id: Uuid,
}

impl RequestContext {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self {
            user_id,
            role,
            correlation_id: Uuid::new_v4(),
        }
    }

    pub fn customer(user_id: Uuid) -> Self {
        Self::new(user_id, Role::Customer)
    }

    pub fn admin(user_id: Uuid) -> Self {
        Self::new(user_id, Role::Admin)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> Result<(), ServiceError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ServiceError::Forbidden("This action requires the admin role".to_string()))
        }
    }

    /// Customers only ever see their own orders; others' look missing.
    pub fn ensure_can_access(&self, order: &OrderAggregate) -> Result<(), ServiceError> {
        if self.is_admin() || order.customer_id == self.user_id {
            Ok(())
        } else {
            Err(ServiceError::order_not_found())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!("Admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!(" customer ".parse::<Role>().unwrap(), Role::Customer);
        assert_eq!("root".parse::<Role>().unwrap_err().code(), "unauthorized");
    }

    #[test]
    fn test_require_admin() {
        assert!(RequestContext::admin(Uuid::new_v4()).require_admin().is_ok());
        assert_eq!(
            RequestContext::customer(Uuid::new_v4()).require_admin().unwrap_err().code(),
            "forbidden"
        );
    }
}
