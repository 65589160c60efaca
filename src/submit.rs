use std::sync::Arc;

use crate::config::GeneratorConfig;
use crate::error::ImagegenError;
use crate::model::{
    AdditionalNetwork, GenerationParameters, GenerationRequest, PromptParams, SubmissionEnvelope,
    total_cost,
};
use crate::service::{GenerationService, decode_envelope};

const REQUEST_KIND: &str = "textToImage";

/// Builds generation payloads and sends them to the service's create operation.
pub struct Submitter {
    service: Arc<dyn GenerationService>,
    config: Arc<GeneratorConfig>,
}

impl Submitter {
    pub fn new(service: Arc<dyn GenerationService>, config: Arc<GeneratorConfig>) -> Self {
        Self { service, config }
    }

    pub fn build_request(
        &self,
        prompt: &str,
        negative_prompt: &str,
        params: &GenerationParameters,
    ) -> GenerationRequest {
        let additional_networks = if self.config.use_additional_network {
            vec![(
                self.config.network.clone(),
                AdditionalNetwork {
                    network_type: self.config.network_type.clone(),
                    strength: self.config.network_strength,
                },
            )]
        } else {
            Vec::new()
        };

        GenerationRequest {
            kind: REQUEST_KIND,
            model: self.config.model.clone(),
            params: PromptParams {
                prompt: prompt.to_string(),
                negative_prompt: negative_prompt.to_string(),
                params: params.clone(),
            },
            additional_networks,
        }
    }

    /// Submit one generation request.
    ///
    /// Returns `Ok(None)` when the service reports no job, either immediately or
    /// once a deferred response resolves. Service rejections and malformed
    /// bodies are errors.
    pub async fn submit(
        &self,
        prompt: &str,
        negative_prompt: &str,
        params: &GenerationParameters,
    ) -> Result<Option<SubmissionEnvelope>, ImagegenError> {
        if prompt.trim().is_empty() {
            return Err(ImagegenError::InvalidRequest("prompt must not be empty".into()));
        }

        let request = self.build_request(prompt, negative_prompt, params);
        tracing::info!(model = request.model, "submitting generation request");

        let response = self.service.create(&request);
        if response.is_deferred() {
            tracing::info!("deferred response returned, awaiting");
        }
        let body = response.resolve().await?;

        let envelope = match decode_envelope(body, "submission")? {
            Some(env) if !env.jobs.is_empty() => Some(env),
            Some(env) => {
                tracing::info!(token = %env.token, "submission listed no jobs");
                None
            }
            None => {
                tracing::info!("no job created");
                None
            }
        };

        let cost = total_cost(envelope.as_ref());
        match &envelope {
            Some(env) => tracing::info!(
                token = %env.token,
                jobs = env.jobs.len(),
                total_cost = cost,
                "generation request submitted"
            ),
            None => tracing::info!(total_cost = cost, "total cost"),
        }

        Ok(envelope)
    }
}
