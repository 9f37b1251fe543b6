//! Caller identity from request headers (`X-Tenant-ID`, `X-Actor-ID`), turned into an operation context.

use crate::service::OperationContext;
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use serde_json::json;

pub const TENANT_ID_HEADER: &str = "X-Tenant-ID";
pub const ACTOR_ID_HEADER: &str = "X-Actor-ID";

/// Scope key filled from the tenant header.
pub const TENANT_SCOPE_KEY: &str = "tenantId";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Caller {
    pub tenant_id: Option<String>,
    pub actor_id: Option<String>,
}

impl Caller {
    /// Tenant becomes scope `tenantId`, actor becomes `{"id": ...}`.
    pub fn context(&self) -> OperationContext {
        let mut ctx = OperationContext::new();
        if let Some(tenant) = &self.tenant_id {
            ctx = ctx.with_scope(TENANT_SCOPE_KEY, tenant.as_str());
        }
        if let Some(actor) = &self.actor_id {
            ctx = ctx.with_actor(json!({ "id": actor }));
        }
        ctx
    }
}

fn header(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Caller {
            tenant_id: header(parts, TENANT_ID_HEADER),
            actor_id: header(parts, ACTOR_ID_HEADER),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[tokio::test]
    async fn reads_trimmed_headers() {
        let (mut parts, _) = Request::builder()
            .header(TENANT_ID_HEADER, " acme ")
            .header(ACTOR_ID_HEADER, "")
            .body(())
            .unwrap()
            .into_parts();
        let caller = Caller::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(caller.tenant_id.as_deref(), Some("acme"));
        assert_eq!(caller.actor_id, None);

        let ctx = caller.context();
        assert_eq!(ctx.scope.unwrap()[TENANT_SCOPE_KEY], "acme");
        assert!(ctx.actor.is_none());
    }
}
