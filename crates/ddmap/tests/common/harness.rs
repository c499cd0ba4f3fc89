//! Test harness for reconciler tests without network access.
//!
//! The `TestHarness` struct provides:
//! - A scripted HTTP double answering per `(method, path)` route
//! - A request log for asserting on what was sent
//! - A `ManualClock` so retry loops finish instantly

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;

use ddmap::{EngineSettings, HttpClient, HttpResponse, KindRegistry, ManualClock, Reconciler, Result};

/// One request seen by the double.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

/// A scripted answer.
#[derive(Debug, Clone)]
pub enum Answer {
    Fixed(HttpResponse),
    /// Answer with the request body under the given status.
    Echo(u16),
}

/// HTTP double. Each route replays its queued answers in order and then
/// keeps repeating the last one. Unrouted requests answer 599.
#[derive(Default)]
pub struct ScriptedHttp {
    routes: Mutex<HashMap<(Method, String), VecDeque<Answer>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedHttp {
    pub fn push(&self, method: Method, path: &str, answer: Answer) {
        self.routes
            .lock()
            .unwrap()
            .entry((method, path.to_string()))
            .or_default()
            .push_back(answer);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpClient for ScriptedHttp {
    async fn send(&self, method: Method, path: &str, body: Option<&Value>) -> Result<HttpResponse> {
        self.requests.lock().unwrap().push(RecordedRequest {
            method: method.clone(),
            path: path.to_string(),
            body: body.cloned(),
        });

        let mut routes = self.routes.lock().unwrap();
        let Some(queue) = routes.get_mut(&(method, path.to_string())) else {
            return Ok(HttpResponse::new(599, br#"{"errors": ["no route"]}"#.to_vec()));
        };
        let answer = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        Ok(match answer {
            Some(Answer::Fixed(response)) => response,
            Some(Answer::Echo(status)) => HttpResponse::new(
                status,
                body.map(|b| serde_json::to_vec(b).unwrap()).unwrap_or_default(),
            ),
            None => HttpResponse::new(599, Vec::new()),
        })
    }
}

/// Test harness providing a reconciler over scripted HTTP.
pub struct TestHarness {
    pub http: Arc<ScriptedHttp>,
    pub clock: Arc<ManualClock>,
    pub reconciler: Reconciler,
}

impl TestHarness {
    /// Create a harness with default settings.
    pub fn new() -> Self {
        Self::with_settings(EngineSettings::default())
    }

    pub fn with_settings(settings: EngineSettings) -> Self {
        let http = Arc::new(ScriptedHttp::default());
        let clock = Arc::new(ManualClock::new());
        let reconciler = Reconciler::new(KindRegistry::with_defaults(), http.clone(), settings)
            .with_clock(clock.clone());
        Self {
            http,
            clock,
            reconciler,
        }
    }

    /// Backoff starting at `base_ms` and capped at `max_ms`.
    pub fn with_backoff(base_ms: u64, max_ms: u64) -> Self {
        Self::with_settings(EngineSettings {
            retry_base_delay_ms: base_ms,
            retry_max_delay_ms: max_ms,
            ..EngineSettings::default()
        })
    }

    /// Queue a JSON answer for `method path`.
    pub fn respond(&self, method: Method, path: &str, status: u16, body: Value) -> &Self {
        let bytes = if body.is_null() {
            Vec::new()
        } else {
            serde_json::to_vec(&body).unwrap()
        };
        self.http
            .push(method, path, Answer::Fixed(HttpResponse::new(status, bytes)));
        self
    }

    /// Answer `method path` with whatever body was sent.
    pub fn echo(&self, method: Method, path: &str) -> &Self {
        self.http.push(method, path, Answer::Echo(200));
        self
    }

    /// Queue `count` 404 answers for `method path`.
    pub fn not_found(&self, method: Method, path: &str, count: usize) -> &Self {
        for _ in 0..count {
            self.respond(method.clone(), path, 404, serde_json::json!({"errors": ["Not found"]}));
        }
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.http.requests()
    }

    /// Requests matching `method` and `path`.
    pub fn requests_to(&self, method: Method, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.path == path)
            .collect()
    }

    /// Total time slept by retry loops.
    pub fn slept(&self) -> Duration {
        self.clock.sleeps().iter().sum()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
