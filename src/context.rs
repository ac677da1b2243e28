use std::sync::OnceLock;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::{RpcError, ServiceError};

/// Request-scoped state threaded through one RPC call.
///
/// Created by the logging interceptor; the access interceptor fills in the
/// caller's identity at most once before any handler runs.
#[derive(Debug, Clone)]
pub struct CallContext {
    request_id: String,
    procedure: String,
    identity: OnceLock<Uuid>,
}

impl CallContext {
    pub fn new(request_id: impl Into<String>, procedure: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            procedure: procedure.into(),
            identity: OnceLock::new(),
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn procedure(&self) -> &str {
        &self.procedure
    }

    pub fn identity(&self) -> Option<Uuid> {
        self.identity.get().copied()
    }

    pub fn set_identity(&self, user_id: Uuid) -> Result<(), ServiceError> {
        self.identity
            .set(user_id)
            .map_err(|_| ServiceError::internal("call identity set twice"))
    }

    /// The authenticated caller, or `unauthenticated` when nobody is signed in.
    pub fn user_id(&self) -> Result<Uuid, RpcError> {
        self.identity().ok_or_else(RpcError::unauthenticated)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CallContext
where
    S: Send + Sync,
{
    type Rejection = RpcError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallContext>()
            .cloned()
            .ok_or_else(|| ServiceError::internal("call context missing").into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Code;

    #[test]
    fn identity_is_set_exactly_once() {
        let ctx = CallContext::new("req-1", "/task.v1.TaskService/ListTasks");
        assert!(ctx.identity().is_none());

        let first = Uuid::new_v4();
        ctx.set_identity(first).unwrap();
        assert!(ctx.set_identity(Uuid::new_v4()).is_err());
        assert_eq!(ctx.identity(), Some(first));
    }

    #[test]
    fn carries_request_id_and_procedure() {
        let ctx = CallContext::new("req-7", "/task.v1.TaskService/GetTask");
        assert_eq!(ctx.request_id(), "req-7");
        assert_eq!(ctx.procedure(), "/task.v1.TaskService/GetTask");
    }

    #[test]
    fn user_id_without_identity_is_unauthenticated() {
        let ctx = CallContext::new("req-1", "/user.v1.UserService/GetMe");
        let err = ctx.user_id().unwrap_err();
        assert_eq!(err.code, Code::Unauthenticated);
    }
}
