use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(feature = "axum")]
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::Json,
};

/// Tenant isolation root. Every other entity in the data model carries one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId(pub Uuid);

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantStatus {
    Active,
    Suspended,
    Deleted,
}

/// Qualitative accessibility of a file, used as a risk multiplier by the
/// scorer and reported by every adapter alongside each `FileInfo`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExposureLevel {
    Private,
    Internal,
    OrgWide,
    Public,
}

/// Tenant scoping carried through a request or job execution. Unlike the
/// teacher's `TenantContext` this carries no `schema_name` — isolation is by
/// `tenant_id`-filtered query, not by connection-level schema switching (see
/// `database.rs`).
#[derive(Debug, Clone, Copy)]
pub struct TenantContext {
    pub tenant_id: TenantId,
}

impl TenantContext {
    pub fn new(tenant_id: TenantId) -> Self {
        Self { tenant_id }
    }
}

/// Ambient per-request context. The core's only binding contract on this
/// type is the uniform `NOT_FOUND` behavior for cross-tenant access (§7);
/// authentication itself is produced by the external HTTP layer and attached
/// here before core handlers run.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub tenant_context: Option<TenantContext>,
    pub user_id: Option<Uuid>,
    pub request_id: String,
}

impl RequestContext {
    pub fn new() -> Self {
        Self {
            tenant_context: None,
            user_id: None,
            request_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn with_request_id(mut self, request_id: String) -> Self {
        self.request_id = request_id;
        self
    }

    pub fn with_tenant_context(mut self, tenant_context: TenantContext) -> Self {
        self.tenant_context = Some(tenant_context);
        self
    }

    pub fn with_user_id(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// The tenant a resource lookup should be scoped to, or `None` if the
    /// request carries no tenant context at all (never `None` once the
    /// external auth layer has populated this context; used defensively by
    /// handlers so an unauthenticated context can never leak cross-tenant).
    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_context.map(|ctx| ctx.tenant_id)
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "axum")]
#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<serde_json::Value>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .ok_or_else(|| {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(serde_json::json!({ "error": "Authentication required" })),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_context_without_tenant_has_no_tenant_id() {
        let ctx = RequestContext::new();
        assert!(ctx.tenant_id().is_none());
    }

    #[test]
    fn request_context_with_tenant_returns_tenant_id() {
        let tenant_id = TenantId(Uuid::new_v4());
        let ctx = RequestContext::new().with_tenant_context(TenantContext::new(tenant_id));
        assert_eq!(ctx.tenant_id(), Some(tenant_id));
    }
}
