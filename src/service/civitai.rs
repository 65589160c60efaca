use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde_json::Value;

use crate::config::ServiceConfig;
use crate::error::ImagegenError;
use crate::model::{ContinuationToken, GenerationRequest};
use crate::service::{GenerationService, MaybeDeferred, ServiceResponse};

/// Max response body size accepted from the orchestration API.
pub const MAX_RESPONSE_BYTES: usize = 4 * 1024 * 1024;

/// Per-request timeout. Polls are cheap; creation may queue briefly.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// HTTP binding for the Civitai orchestration jobs API.
/// Every call is returned deferred: the request is sent when the handle is awaited.
#[derive(Clone)]
pub struct CivitaiService {
    client: Client,
    base_url: String,
    api_token: Option<String>,
}

impl CivitaiService {
    pub fn new(config: &ServiceConfig) -> Result<Self, ImagegenError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
        })
    }

    pub fn jobs_url(&self) -> String {
        format!("{}/v1/consumer/jobs", self.base_url)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }
}

impl GenerationService for CivitaiService {
    fn create(&self, request: &GenerationRequest) -> ServiceResponse {
        let body = match serde_json::to_value(request) {
            Ok(body) => body,
            Err(e) => {
                return MaybeDeferred::failed(ImagegenError::MalformedPayload(format!(
                    "failed to encode request: {e}"
                )));
            }
        };
        let req = self.authorize(self.client.post(self.jobs_url())).json(&body);

        MaybeDeferred::deferred(async move {
            let resp = req.send().await?;
            read_payload(resp).await
        })
    }

    fn get_status(&self, token: &ContinuationToken) -> ServiceResponse {
        let req = self
            .authorize(self.client.get(self.jobs_url()))
            .query(&[("token", token.as_str())]);

        MaybeDeferred::deferred(async move {
            let resp = req.send().await?;
            read_payload(resp).await
        })
    }
}

/// Map HTTP status to errors and read the body. Empty bodies and `null` become `None`.
async fn read_payload(resp: Response) -> Result<Option<Value>, ImagegenError> {
    let status = resp.status();

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(ImagegenError::AuthFailed(format!("HTTP {status}")));
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(ImagegenError::RateLimited);
    }

    // Cap content-length before buffering.
    if resp
        .content_length()
        .is_some_and(|len| len as usize > MAX_RESPONSE_BYTES)
    {
        return Err(ImagegenError::Upstream {
            message: "response too large".to_string(),
            status: Some(status.as_u16()),
        });
    }

    let bytes = resp.bytes().await?;
    if bytes.len() > MAX_RESPONSE_BYTES {
        return Err(ImagegenError::Upstream {
            message: format!("response too large: {} bytes", bytes.len()),
            status: Some(status.as_u16()),
        });
    }

    // Out-of-range params come back as 4xx; surface them instead of dropping the request.
    if !status.is_success() {
        let text = String::from_utf8_lossy(&bytes);
        return Err(ImagegenError::Upstream {
            message: format!("{status}: {text}"),
            status: Some(status.as_u16()),
        });
    }

    if status == StatusCode::NO_CONTENT || bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    let value: Value = serde_json::from_slice(&bytes)
        .map_err(|e| ImagegenError::MalformedPayload(format!("invalid JSON: {e}")))?;
    Ok((!value.is_null()).then_some(value))
}
