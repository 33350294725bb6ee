use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user::UserRole;

/// Access-token payload. `tenant` pins the token to one tenant schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub tenant: String,
    pub role: UserRole,
    pub exp: usize,
    pub iat: usize,
}

impl Claims {
    pub fn new(user_id: Uuid, role: UserRole, tenant: &str, ttl_seconds: u64) -> Self {
        let iat = Utc::now().timestamp() as usize;
        Self {
            sub: user_id.to_string(),
            tenant: tenant.to_string(),
            role,
            iat,
            exp: iat + ttl_seconds as usize,
        }
    }
}

/// Refresh-token payload. `jti` is the primary key of the stored digest row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: String,
    pub jti: String,
    pub exp: usize,
    pub iat: usize,
}

impl RefreshClaims {
    pub fn new(user_id: Uuid, jti: Uuid, ttl_days: u64) -> Self {
        let iat = Utc::now().timestamp() as usize;
        Self {
            sub: user_id.to_string(),
            jti: jti.to_string(),
            iat,
            exp: iat + (ttl_days * 86_400) as usize,
        }
    }

    /// `(jti, user_id)`, or `None` if either is not a UUID.
    pub fn ids(&self) -> Option<(Uuid, Uuid)> {
        Some((self.jti.parse().ok()?, self.sub.parse().ok()?))
    }
}

/// Caller identity once the bearer token has been verified.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub tenant: String,
    pub role: UserRole,
}

impl AuthenticatedUser {
    /// Super-admins may act on any tenant; everyone else only on their own.
    pub fn may_access(&self, tenant: &str) -> bool {
        self.role == UserRole::SuperAdmin || self.tenant == tenant
    }
}

impl TryFrom<Claims> for AuthenticatedUser {
    type Error = uuid::Error;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: claims.sub.parse()?,
            tenant: claims.tenant,
            role: claims.role,
        })
    }
}
