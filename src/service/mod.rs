pub mod civitai;

use futures_util::future::BoxFuture;
use serde_json::Value;

use crate::error::ImagegenError;
use crate::model::{ContinuationToken, GenerationRequest, JobsEnvelope};

/// Future produced by a service call that has not materialized yet.
pub type ServiceFuture<T> = BoxFuture<'static, Result<T, ImagegenError>>;

/// A service response that is either already here or still pending.
/// Consumers call [`MaybeDeferred::resolve`] and never branch on which one they got.
pub enum MaybeDeferred<T> {
    Ready(T),
    Deferred(ServiceFuture<T>),
}

impl<T> MaybeDeferred<T> {
    pub fn deferred<F>(fut: F) -> Self
    where
        F: Future<Output = Result<T, ImagegenError>> + Send + 'static,
    {
        Self::Deferred(Box::pin(fut))
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred(_))
    }

    pub async fn resolve(self) -> Result<T, ImagegenError> {
        match self {
            Self::Ready(value) => Ok(value),
            Self::Deferred(fut) => fut.await,
        }
    }
}

impl<T: Send + 'static> MaybeDeferred<T> {
    /// A deferred handle that fails when awaited.
    pub fn failed(err: ImagegenError) -> Self {
        Self::deferred(async move { Err(err) })
    }
}

/// Raw response body. `None` means the service returned nothing.
pub type ServiceResponse = MaybeDeferred<Option<Value>>;

/// Remote rendering service: one create operation, one status query.
pub trait GenerationService: Send + Sync {
    fn create(&self, request: &GenerationRequest) -> ServiceResponse;

    fn get_status(&self, token: &ContinuationToken) -> ServiceResponse;
}

/// `null`, `{}`, `[]` and `""` all count as "nothing came back".
pub fn is_empty_payload(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Parse a raw body into an envelope. Empty bodies yield `Ok(None)`;
/// anything else that doesn't fit the shape is a `MalformedPayload`.
pub fn decode_envelope(
    body: Option<Value>,
    stage: &str,
) -> Result<Option<JobsEnvelope>, ImagegenError> {
    let Some(body) = body.filter(|v| !is_empty_payload(v)) else {
        return Ok(None);
    };
    serde_json::from_value(body)
        .map(Some)
        .map_err(|e| ImagegenError::MalformedPayload(format!("{stage} response: {e}")))
}
