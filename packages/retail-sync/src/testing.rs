//! Testing utilities including mock implementations.
//!
//! These are useful for exercising the pipeline without a live proxy:
//! a scripted [`MockGateway`] and a [`RecordingSink`] that keeps every
//! progress event for assertions.

use async_trait::async_trait;
use proxy_client::{ApiRequest, Envelope, Gateway, Outcome, SoftFailure};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};

use crate::traits::sink::{ProgressEvent, ProgressSink};

type Responder = Box<dyn Fn(&ApiRequest) -> Option<Outcome> + Send + Sync>;

/// A mock gateway with scripted answers.
///
/// Lookup order for each call: the queue scripted for the exact path, then
/// responders in registration order, then `SoftFail(Status(404))`.
#[derive(Default)]
pub struct MockGateway {
    /// Queued outcomes by exact logical path
    scripted: Arc<RwLock<HashMap<String, VecDeque<Outcome>>>>,

    /// Fallback answer functions
    responders: Vec<Responder>,

    /// Call tracking for assertions
    calls: Arc<RwLock<Vec<ApiRequest>>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an outcome for one exact path. Queued outcomes are served once each.
    pub fn with_response(self, path: impl Into<String>, outcome: Outcome) -> Self {
        self.scripted
            .write()
            .unwrap()
            .entry(path.into())
            .or_default()
            .push_back(outcome);
        self
    }

    /// Add a fallback answer function. Return `None` to pass.
    pub fn with_responder(
        mut self,
        responder: impl Fn(&ApiRequest) -> Option<Outcome> + Send + Sync + 'static,
    ) -> Self {
        self.responders.push(Box::new(responder));
        self
    }

    /// Serve offset pages of `items` for every path starting with `prefix`
    /// (data pages and search pages alike).
    pub fn with_dataset(self, prefix: impl Into<String>, items: Vec<Value>, total: Option<u64>) -> Self {
        let prefix = prefix.into();
        self.with_responder(move |request| {
            if !request.path.starts_with(&prefix) {
                return None;
            }
            let (offset, limit) = page_bounds(&request.path)?;
            Some(page(slice(&items, offset, limit), total))
        })
    }

    /// Answer every path starting with `prefix` with the same outcome.
    pub fn with_fixed(self, prefix: impl Into<String>, outcome: Outcome) -> Self {
        let prefix = prefix.into();
        self.with_responder(move |request| {
            request.path.starts_with(&prefix).then(|| outcome.clone())
        })
    }

    /// Get all calls made to this mock.
    pub fn calls(&self) -> Vec<ApiRequest> {
        self.calls.read().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }

    /// Calls whose path starts with `prefix`.
    pub fn calls_to(&self, prefix: &str) -> Vec<ApiRequest> {
        self.calls
            .read()
            .unwrap()
            .iter()
            .filter(|c| c.path.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Clear call history.
    pub fn clear_calls(&self) {
        self.calls.write().unwrap().clear();
    }
}

#[async_trait]
impl Gateway for MockGateway {
    async fn call(&self, request: &ApiRequest) -> Outcome {
        self.calls.write().unwrap().push(request.clone());

        let queued = self
            .scripted
            .write()
            .unwrap()
            .get_mut(&request.path)
            .and_then(VecDeque::pop_front);
        if let Some(outcome) = queued {
            return outcome;
        }

        self.responders
            .iter()
            .find_map(|responder| responder(request))
            .unwrap_or(Outcome::SoftFail(SoftFailure::Status(404)))
    }
}

/// A successful page with an optional reported total.
pub fn page(items: Vec<Value>, total: Option<u64>) -> Outcome {
    let envelope = Envelope::ok(Value::Array(items));
    Outcome::Success(match total {
        Some(total) => envelope.with_total(total),
        None => envelope,
    })
}

/// A successful single-shot answer.
pub fn ok(data: Value) -> Outcome {
    Outcome::Success(Envelope::ok(data))
}

/// `count` records `{_id: "{prefix}{n}"}` numbered from `start`.
pub fn records(prefix: &str, start: usize, count: usize) -> Vec<Value> {
    (start..start + count)
        .map(|n| json!({"_id": format!("{}{}", prefix, n), "name": format!("item {}", n)}))
        .collect()
}

/// `(offset, limit)` of a data page (`?offset=..&limit=..`) or search path (`/../{offset}/{limit}`).
pub fn page_bounds(path: &str) -> Option<(u64, u64)> {
    if let Some((_, query)) = path.split_once('?') {
        let mut offset = None;
        let mut limit = None;
        for pair in query.split('&') {
            match pair.split_once('=') {
                Some(("offset", v)) => offset = v.parse().ok(),
                Some(("limit", v)) => limit = v.parse().ok(),
                _ => {}
            }
        }
        return Some((offset?, limit?));
    }
    proxy_client::ApiPath::search_bounds(path)
}

fn slice(items: &[Value], offset: u64, limit: u64) -> Vec<Value> {
    items
        .iter()
        .skip(offset as usize)
        .take(limit as usize)
        .cloned()
        .collect()
}

/// A sink that keeps every event.
#[derive(Default, Clone)]
pub struct RecordingSink {
    events: Arc<RwLock<Vec<ProgressEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.read().unwrap().clone()
    }

    pub fn count(&self, predicate: impl Fn(&ProgressEvent) -> bool) -> usize {
        self.events.read().unwrap().iter().filter(|e| predicate(e)).count()
    }
}

impl ProgressSink for RecordingSink {
    fn emit(&self, event: ProgressEvent) {
        self.events.write().unwrap().push(event);
    }
}
