//! Test doubles shared by the integration tests: a scripted generation
//! service and a sleeper that records instead of waiting.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use imagegen::config::GeneratorConfig;
use imagegen::error::ImagegenError;
use imagegen::model::{ContinuationToken, GenerationRequest};
use imagegen::poll::Sleeper;
use imagegen::service::{GenerationService, MaybeDeferred, ServiceResponse};

pub const TOKEN: &str = "eyJKb2JzIjpbIjMyOThkOGE3Il19";

/// One scripted service reply.
pub enum Reply {
    Ready(Option<Value>),
    Deferred(Option<Value>),
    Fail(ImagegenError),
}

impl Reply {
    fn into_response(self) -> ServiceResponse {
        match self {
            Reply::Ready(v) => MaybeDeferred::Ready(v),
            Reply::Deferred(v) => MaybeDeferred::deferred(async move {
                tokio::task::yield_now().await;
                Ok(v)
            }),
            Reply::Fail(e) => MaybeDeferred::failed(e),
        }
    }
}

#[derive(Default)]
pub struct ScriptedService {
    create_replies: Mutex<VecDeque<Reply>>,
    status_replies: Mutex<VecDeque<Reply>>,
    /// Returned for every status query once the script runs out.
    status_fallback: Mutex<Option<Value>>,
    pub creates: AtomicUsize,
    pub status_calls: AtomicUsize,
    pub last_request: Mutex<Option<GenerationRequest>>,
    pub tokens_seen: Mutex<Vec<String>>,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_create(self, reply: Reply) -> Self {
        self.create_replies.lock().unwrap().push_back(reply);
        self
    }

    pub fn on_status(self, reply: Reply) -> Self {
        self.status_replies.lock().unwrap().push_back(reply);
        self
    }

    pub fn status_forever(self, body: Value) -> Self {
        *self.status_fallback.lock().unwrap() = Some(body);
        self
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }
}

impl GenerationService for ScriptedService {
    fn create(&self, request: &GenerationRequest) -> ServiceResponse {
        self.creates.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        self.create_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Reply::Ready(None))
            .into_response()
    }

    fn get_status(&self, token: &ContinuationToken) -> ServiceResponse {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.tokens_seen.lock().unwrap().push(token.as_str().to_string());
        let scripted = self.status_replies.lock().unwrap().pop_front();
        match scripted {
            Some(reply) => reply.into_response(),
            None => {
                let fallback = self.status_fallback.lock().unwrap().clone();
                match fallback {
                    Some(body) => MaybeDeferred::Ready(Some(body)),
                    None => panic!("status script exhausted"),
                }
            }
        }
    }
}

/// Records requested sleeps and returns immediately.
/// Optionally cancels a token on the n-th sleep (1-based).
#[derive(Default)]
pub struct RecordingSleeper {
    pub sleeps: Mutex<Vec<Duration>>,
    cancel_on: Option<(usize, CancellationToken)>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancelling_on(nth: usize, token: CancellationToken) -> Self {
        Self {
            sleeps: Mutex::new(Vec::new()),
            cancel_on: Some((nth, token)),
        }
    }

    pub fn count(&self) -> usize {
        self.sleeps.lock().unwrap().len()
    }

    pub fn total(&self) -> Duration {
        self.sleeps.lock().unwrap().iter().sum()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) -> BoxFuture<'_, ()> {
        let n = {
            let mut sleeps = self.sleeps.lock().unwrap();
            sleeps.push(duration);
            sleeps.len()
        };
        if let Some((nth, token)) = &self.cancel_on
            && *nth == n
        {
            token.cancel();
        }
        Box::pin(async {})
    }
}

pub fn job(id: &str, cost: f64, available: bool, url: &str) -> Value {
    let mut result = json!({"blobKey": format!("KEY-{id}"), "available": available});
    if available {
        result["blobUrl"] = json!(url);
        result["blobUrlExpirationDate"] = json!("2026-10-20T00:00:00Z");
    }
    json!({"jobId": id, "cost": cost, "result": result, "scheduled": true})
}

pub fn envelope(jobs: Vec<Value>) -> Value {
    json!({"token": TOKEN, "jobs": jobs})
}

pub fn pending(n: usize) -> Value {
    envelope((0..n).map(|i| job(&format!("job-{i}"), 0.64, false, "")).collect())
}

pub fn config() -> GeneratorConfig {
    GeneratorConfig::default()
}
