//! Token gate run in front of every RPC procedure.
//!
//! A call to an allow-listed procedure passes untouched. Anything else must
//! carry `Authorization: Bearer <token>` with a token the [`TokenService`]
//! accepts; the verified user id is then recorded in the [`CallContext`].

use std::{collections::HashSet, sync::Arc};

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{auth::jwt::TokenService, context::CallContext, error::RpcError};

/// What the gate needs to know about an inbound unary call.
pub trait UnaryCall {
    /// Fully-qualified procedure name, e.g. `/task.v1.TaskService/ListTasks`.
    fn procedure(&self) -> &str;
    /// First value of header `name`, if present and valid UTF-8.
    fn header(&self, name: &str) -> Option<&str>;
}

impl<B> UnaryCall for axum::http::Request<B> {
    fn procedure(&self) -> &str {
        self.uri().path()
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers().get(name).and_then(|v| v.to_str().ok())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Authenticated(Uuid),
}

#[derive(Clone)]
pub struct AccessInterceptor {
    tokens: Arc<TokenService>,
    public: Arc<HashSet<String>>,
}

impl AccessInterceptor {
    pub fn new<I, S>(tokens: Arc<TokenService>, public: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens,
            public: Arc::new(public.into_iter().map(Into::into).collect()),
        }
    }

    /// Decide whether `call` may proceed and as whom.
    pub fn check<C: UnaryCall + ?Sized>(&self, call: &C) -> Result<Access, RpcError> {
        let procedure = call.procedure();
        if self.public.contains(procedure) {
            return Ok(Access::Public);
        }

        let Some(token) = bearer_token(call.header(AUTHORIZATION.as_str())) else {
            debug!(procedure, "missing or malformed bearer header");
            return Err(RpcError::unauthenticated());
        };

        match self.tokens.verify(token) {
            Ok(user_id) => Ok(Access::Authenticated(user_id)),
            Err(_) => {
                debug!(procedure, "token rejected");
                Err(RpcError::unauthenticated())
            }
        }
    }
}

/// Token from a header of the exact form `Bearer <token>`.
fn bearer_token(value: Option<&str>) -> Option<&str> {
    let token = value?.strip_prefix("Bearer ")?;
    if token.is_empty() || token.chars().any(char::is_whitespace) {
        return None;
    }
    Some(token)
}

/// Middleware form of [`AccessInterceptor::check`]. Calls that arrive without
/// a [`CallContext`] get a fresh one.
pub async fn enforce(
    State(access): State<AccessInterceptor>,
    mut req: Request,
    next: Next,
) -> Response {
    if req.extensions().get::<CallContext>().is_none() {
        let ctx = CallContext::new(Uuid::new_v4().to_string(), req.uri().path());
        req.extensions_mut().insert(ctx);
    }
    let Some(ctx) = req.extensions().get::<CallContext>() else {
        return RpcError::unauthenticated().into_response();
    };

    match access.check(&req) {
        Ok(Access::Public) => {}
        Ok(Access::Authenticated(user_id)) => {
            if let Err(e) = ctx.set_identity(user_id) {
                return RpcError::from(e).into_response();
            }
        }
        Err(e) => {
            warn!(
                request_id = ctx.request_id(),
                procedure = ctx.procedure(),
                "call rejected"
            );
            return e.into_response();
        }
    }

    next.run(req).await
}
