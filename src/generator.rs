use std::sync::Arc;

use crate::config::GeneratorConfig;
use crate::error::ImagegenError;
use crate::model::GenerationParameters;
use crate::poll::{Poller, Sleeper};
use crate::service::GenerationService;
use crate::submit::Submitter;

/// Submit, poll, extract. One instance can serve many sequential requests;
/// concurrent requests each run their own loop with their own token.
pub struct ImageGenerator {
    config: Arc<GeneratorConfig>,
    submitter: Submitter,
    poller: Poller,
}

impl ImageGenerator {
    pub fn new(
        service: Arc<dyn GenerationService>,
        config: GeneratorConfig,
    ) -> Result<Self, ImagegenError> {
        let config = Arc::new(config);
        Ok(Self {
            submitter: Submitter::new(service.clone(), config.clone()),
            poller: Poller::new(service, &config)?,
            config,
        })
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.poller = self.poller.with_sleeper(sleeper);
        self
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn submitter(&self) -> &Submitter {
        &self.submitter
    }

    pub fn poller(&self) -> &Poller {
        &self.poller
    }

    /// Generate with the configured negative prompt and parameters.
    /// Returns no URLs when the service created no job.
    pub async fn generate_image(&self, prompt: &str) -> Result<Vec<String>, ImagegenError> {
        self.generate_image_with(prompt, &self.config.negative_prompt, &self.config.params)
            .await
    }

    pub async fn generate_image_with(
        &self,
        prompt: &str,
        negative_prompt: &str,
        params: &GenerationParameters,
    ) -> Result<Vec<String>, ImagegenError> {
        let Some(envelope) = self.submitter.submit(prompt, negative_prompt, params).await? else {
            return Ok(Vec::new());
        };
        self.poller.extract_urls(&envelope.token).await
    }
}
