use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use super::gate::{AccessGate, GateChain, GateError};
use super::policy::{InstanceId, PrincipalId};
use super::store::PolicyStore;
use crate::error::failure_response;

/// Header carrying the principal id established by the authentication layer.
pub const PRINCIPAL_HEADER: &str = "x-principal-id";

/// Path parameter naming the guarded instance.
pub const INSTANCE_PARAM: &str = "id";

/// Maps the raw path segment to the key policies are written against.
/// `None` rejects the segment as malformed.
pub type InstanceKey = fn(&str) -> Option<InstanceId>;

fn verbatim_key(raw: &str) -> Option<InstanceId> {
    Some(InstanceId(raw.to_string()))
}

/// State handed to [`enforce`] for one guarded route.
pub struct GuardState<S> {
    gate: Arc<AccessGate<S>>,
    chain: Arc<GateChain>,
    instance_key: InstanceKey,
}

impl<S> GuardState<S> {
    pub fn new(gate: Arc<AccessGate<S>>, chain: GateChain) -> Self {
        Self {
            gate,
            chain: Arc::new(chain),
            instance_key: verbatim_key,
        }
    }

    /// Canonicalize the path id before the chain sees it, so the gate and
    /// the handler agree on which instance a request names.
    pub fn with_instance_key(mut self, instance_key: InstanceKey) -> Self {
        self.instance_key = instance_key;
        self
    }
}

impl<S> Clone for GuardState<S> {
    fn clone(&self) -> Self {
        Self {
            gate: Arc::clone(&self.gate),
            chain: Arc::clone(&self.chain),
            instance_key: self.instance_key,
        }
    }
}

/// Anonymous callers map to an empty id, which resolves to no roles.
pub fn principal_from_headers(headers: &HeaderMap) -> PrincipalId {
    let raw = headers
        .get(PRINCIPAL_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .unwrap_or_default();
    PrincipalId(raw.to_string())
}

/// Route middleware running the chain and attaching the granted context.
pub async fn enforce<S>(
    State(guard): State<GuardState<S>>,
    params: Option<Path<HashMap<String, String>>>,
    mut request: Request,
    next: Next,
) -> Response
where
    S: PolicyStore + 'static,
{
    let principal = principal_from_headers(request.headers());
    let instance = match params.and_then(|Path(mut params)| params.remove(INSTANCE_PARAM)) {
        Some(raw) => match (guard.instance_key)(&raw) {
            Some(instance) => Some(instance),
            None => return GateError::MalformedInstance(raw).into_response(),
        },
        None => None,
    };

    match guard
        .gate
        .authorize(&principal, &guard.chain, instance.as_ref())
        .await
    {
        Ok(granted) => {
            request.extensions_mut().insert(granted);
            next.run(request).await
        }
        Err(err) => err.into_response(),
    }
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        failure_response(&self)
    }
}
