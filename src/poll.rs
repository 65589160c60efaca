use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::config::GeneratorConfig;
use crate::error::ImagegenError;
use crate::model::{ContinuationToken, PollEnvelope};
use crate::service::{GenerationService, decode_envelope};

/// Suspends the poll loop between queries. Tests swap in a fake that only records.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration) -> BoxFuture<'_, ()>;
}

pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> BoxFuture<'_, ()> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Outcome of one status query. Cancellation is reported as
/// [`ImagegenError::Cancelled`] and never reaches the transition rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Polling,
    Fulfilled,
    TimedOut,
    Failed,
}

/// Transition rule applied after each status query.
///
/// Order matters: an empty response fails before anything else, and a fully
/// available envelope wins even if the ceiling has been reached.
pub fn next_state(
    envelope: Option<&PollEnvelope>,
    waited: Duration,
    ceiling: Duration,
) -> PollState {
    match envelope {
        None => PollState::Failed,
        Some(env) if env.all_available() => PollState::Fulfilled,
        Some(_) if waited >= ceiling => PollState::TimedOut,
        Some(_) => PollState::Polling,
    }
}

/// Polls a continuation token until every job is available or the ceiling is hit.
pub struct Poller {
    service: Arc<dyn GenerationService>,
    sleeper: Arc<dyn Sleeper>,
    interval: Duration,
    ceiling: Duration,
}

impl Poller {
    /// Fails on a config the loop could never finish with, such as a zero interval.
    pub fn new(
        service: Arc<dyn GenerationService>,
        config: &GeneratorConfig,
    ) -> Result<Self, ImagegenError> {
        config.validate()?;
        Ok(Self {
            service,
            sleeper: Arc::new(TokioSleeper),
            interval: config.poll_interval,
            ceiling: config.timeout,
        })
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn ceiling(&self) -> Duration {
        self.ceiling
    }

    /// Single status query. An empty response is an error, never retried.
    pub async fn poll(&self, token: &ContinuationToken) -> Result<PollEnvelope, ImagegenError> {
        self.query(token).await?.ok_or_else(empty_poll)
    }

    async fn query(
        &self,
        token: &ContinuationToken,
    ) -> Result<Option<PollEnvelope>, ImagegenError> {
        tracing::debug!(token = %token, "polling");
        let body = self.service.get_status(token).resolve().await?;
        let envelope = decode_envelope(body, "poll")?;
        if let Some(env) = &envelope {
            tracing::debug!(
                token = %token,
                jobs = env.jobs.len(),
                pending = env.pending_count(),
                "poll response"
            );
        }
        Ok(envelope)
    }

    pub async fn await_completion(
        &self,
        token: &ContinuationToken,
    ) -> Result<PollEnvelope, ImagegenError> {
        self.run(token, None).await
    }

    /// Like [`Poller::await_completion`], with an extra exit when `cancel` fires.
    pub async fn await_completion_until_cancelled(
        &self,
        token: &ContinuationToken,
        cancel: &CancellationToken,
    ) -> Result<PollEnvelope, ImagegenError> {
        self.run(token, Some(cancel)).await
    }

    /// Drive the loop to completion and return result URLs in job order.
    pub async fn extract_urls(
        &self,
        token: &ContinuationToken,
    ) -> Result<Vec<String>, ImagegenError> {
        let envelope = self.await_completion(token).await?;
        Ok(envelope.blob_urls())
    }

    async fn run(
        &self,
        token: &ContinuationToken,
        cancel: Option<&CancellationToken>,
    ) -> Result<PollEnvelope, ImagegenError> {
        let mut waited = Duration::ZERO;
        let mut polls: u32 = 0;
        tracing::info!(token = %token, "waiting for jobs");

        loop {
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                return Err(self.cancelled(token, waited));
            }

            polls += 1;
            let envelope = match self.query(token).await {
                Ok(env) => env,
                Err(e) => {
                    tracing::warn!(token = %token, polls, "poll failed: {e}");
                    return Err(e);
                }
            };

            let state = next_state(envelope.as_ref(), waited, self.ceiling);
            let envelope = match (state, envelope) {
                (PollState::Failed, _) | (_, None) => {
                    tracing::warn!(token = %token, polls, "empty poll response");
                    return Err(empty_poll());
                }
                (_, Some(env)) => env,
            };

            match state {
                PollState::Fulfilled => {
                    tracing::info!(
                        token = %token,
                        polls,
                        waited_secs = waited.as_secs(),
                        "all jobs available"
                    );
                    return Ok(envelope);
                }
                PollState::TimedOut => {
                    tracing::warn!(
                        token = %token,
                        polls,
                        pending = envelope.pending_count(),
                        "poll deadline exceeded"
                    );
                    return Err(ImagegenError::DeadlineExceeded {
                        ceiling_secs: self.ceiling.as_secs(),
                    });
                }
                PollState::Polling | PollState::Failed => {
                    tracing::debug!(
                        token = %token,
                        polls,
                        waited_secs = waited.as_secs(),
                        pending = envelope.pending_count(),
                        "job still in progress"
                    );
                }
            }

            match cancel {
                Some(cancel) => {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            return Err(self.cancelled(token, waited));
                        }
                        _ = self.sleeper.sleep(self.interval) => {}
                    }
                }
                None => self.sleeper.sleep(self.interval).await,
            }
            waited += self.interval;
        }
    }

    fn cancelled(&self, token: &ContinuationToken, waited: Duration) -> ImagegenError {
        tracing::warn!(token = %token, waited_secs = waited.as_secs(), "polling cancelled");
        ImagegenError::Cancelled {
            waited_secs: waited.as_secs(),
        }
    }
}

fn empty_poll() -> ImagegenError {
    ImagegenError::EmptyResponse("poll".to_string())
}
