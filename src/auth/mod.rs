//! Bearer-token authentication and role capabilities.
//!
//! Each request resolves its token once into an [`AuthContext`] that carries
//! the caller's identity and the capability set of their role. Resolved
//! contexts are cached per token for a bounded time.

pub mod cache;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use tracing::debug;
use uuid::Uuid;

use crate::{EcommerceError, Result};
pub use cache::TtlCache;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Admin,
    SuperAdmin,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    ManageCart,
    Checkout,
    ViewOwnOrders,
    CancelOwnOrder,
    ManageCatalog,
    ViewAllOrders,
    ManageOrders,
}

const CUSTOMER: &[Capability] =
    &[Capability::ManageCart, Capability::Checkout, Capability::ViewOwnOrders, Capability::CancelOwnOrder];
const ADMIN: &[Capability] = &[Capability::ManageCatalog, Capability::ViewAllOrders, Capability::ManageOrders];
const SUPER_ADMIN: &[Capability] = &[
    Capability::ManageCart,
    Capability::Checkout,
    Capability::ViewOwnOrders,
    Capability::CancelOwnOrder,
    Capability::ManageCatalog,
    Capability::ViewAllOrders,
    Capability::ManageOrders,
];

impl Role {
    pub fn capabilities(&self) -> &'static [Capability] {
        match self {
            Self::Customer => CUSTOMER,
            Self::Admin => ADMIN,
            Self::SuperAdmin => SUPER_ADMIN,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub exp: i64,
}

/// Identity resolved for the current request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub role: Role,
    capabilities: &'static [Capability],
}

impl AuthContext {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role, capabilities: role.capabilities() }
    }

    pub fn can(&self, capability: Capability) -> bool { self.capabilities.contains(&capability) }

    pub fn require(&self, capability: Capability) -> Result<()> {
        if self.can(capability) { Ok(()) } else { Err(EcommerceError::Forbidden) }
    }
}

#[derive(Clone)]
pub struct Authenticator {
    encoding: EncodingKey,
    decoding: DecodingKey,
    cache: TtlCache<String, AuthContext>,
}

impl Authenticator {
    pub fn new(secret: &str, cache_ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            cache: TtlCache::new(cache_ttl),
        }
    }

    /// Signs an access token; issuance proper lives with account management.
    pub fn issue(&self, user_id: Uuid, role: Role, valid_for: Duration) -> Result<String> {
        let exp = Utc::now().timestamp() + i64::try_from(valid_for.as_secs()).unwrap_or(i64::MAX / 2);
        encode(&Header::new(Algorithm::HS256), &Claims { sub: user_id, role, exp }, &self.encoding)
            .map_err(|e| EcommerceError::Validation(format!("cannot sign token: {e}")))
    }

    pub fn authenticate(&self, token: &str) -> Result<AuthContext> {
        if let Some(ctx) = self.cache.get(&token.to_string()) {
            return Ok(ctx);
        }
        let claims = decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map_err(|e| {
                debug!(error = %e, "rejected bearer token");
                EcommerceError::Unauthorized
            })?
            .claims;
        let ctx = AuthContext::new(claims.sub, claims.role);
        let remaining = u64::try_from(claims.exp - Utc::now().timestamp()).unwrap_or(0);
        self.cache.insert(token.to_string(), ctx.clone(), Some(Duration::from_secs(remaining)));
        Ok(ctx)
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator").field("cached", &self.cache.len()).finish_non_exhaustive()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    Arc<Authenticator>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = EcommerceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(EcommerceError::Unauthorized)?;
        Arc::<Authenticator>::from_ref(state).authenticate(token)
    }
}
