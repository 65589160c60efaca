use std::fmt;

use serde::{Deserialize, Serialize};

/// Auxiliary network (e.g. a LoRA) applied on top of the checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdditionalNetwork {
    #[serde(rename = "type")]
    pub network_type: String,
    pub strength: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationParameters {
    pub scheduler: String,
    pub steps: u32,
    pub cfg_scale: f64,
    pub width: u32,
    pub height: u32,
    pub clip_skip: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptParams {
    pub prompt: String,
    pub negative_prompt: String,
    #[serde(flatten)]
    pub params: GenerationParameters,
}

/// Payload sent to the service's create operation. Built per call, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    #[serde(rename = "$type")]
    pub kind: &'static str,
    pub model: String,
    pub params: PromptParams,
    #[serde(skip_serializing_if = "Vec::is_empty", serialize_with = "serialize_networks")]
    pub additional_networks: Vec<(String, AdditionalNetwork)>,
}

/// Networks go over the wire as a map keyed by network URN, in insertion order.
fn serialize_networks<S: serde::Serializer>(
    networks: &[(String, AdditionalNetwork)],
    s: S,
) -> Result<S::Ok, S::Error> {
    use serde::ser::SerializeMap;
    let mut map = s.serialize_map(Some(networks.len()))?;
    for (urn, network) in networks {
        map.serialize_entry(urn, network)?;
    }
    map.end()
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    pub blob_key: String,
    #[serde(default)]
    pub available: bool,
    #[serde(default)]
    pub blob_url: String,
    #[serde(default)]
    pub blob_url_expiration_date: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub job_id: String,
    pub cost: f64,
    pub result: JobResult,
    pub scheduled: bool,
}

/// Opaque handle correlating a submission with its jobs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(transparent)]
pub struct ContinuationToken(String);

impl ContinuationToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContinuationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A token plus its jobs, in the order the service listed them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JobsEnvelope {
    pub token: ContinuationToken,
    pub jobs: Vec<Job>,
}

/// Envelope returned by the create operation.
pub type SubmissionEnvelope = JobsEnvelope;

/// Envelope returned by a status query.
pub type PollEnvelope = JobsEnvelope;

impl JobsEnvelope {
    /// True when every job has its result ready. Vacuously true for no jobs.
    pub fn all_available(&self) -> bool {
        self.jobs.iter().all(|job| job.result.available)
    }

    /// Result URLs in job order. Empty URLs are kept as-is.
    pub fn blob_urls(&self) -> Vec<String> {
        self.jobs.iter().map(|job| job.result.blob_url.clone()).collect()
    }

    pub fn pending_count(&self) -> usize {
        self.jobs.iter().filter(|job| !job.result.available).count()
    }
}

/// Sum of job costs. An absent envelope costs nothing.
pub fn total_cost(envelope: Option<&JobsEnvelope>) -> f64 {
    envelope.map_or(0.0, |env| env.jobs.iter().map(|job| job.cost).sum())
}
