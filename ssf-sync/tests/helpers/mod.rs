//! Shared test helpers for ssf-sync integration tests

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use ssf_common::events::EventBus;
use ssf_sync::transport::{Transport, TransportError};
use ssf_sync::SyncEngine;
use tokio::sync::oneshot;

pub type Reply = Result<Option<Value>, TransportError>;

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub method: &'static str,
    pub path: String,
    pub body: Option<Value>,
}

/// In-memory service double
///
/// Replies are scripted per `METHOD path` and served in order; the last reply
/// for a route repeats once its queue drains. Individual calls can be held
/// back with [`ScriptedTransport::hold`].
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<String, VecDeque<Reply>>>,
    holds: Mutex<HashMap<usize, oneshot::Receiver<()>>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on(&self, method: &str, path: &str, reply: Reply) -> &Self {
        self.routes
            .lock()
            .unwrap()
            .entry(format!("{} {}", method, path))
            .or_default()
            .push_back(reply);
        self
    }

    /// Hold the n-th call (0-based, across all routes) until released
    pub fn hold(&self, index: usize) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.holds.lock().unwrap().insert(index, rx);
        tx
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, method: &str, path: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.method == method && c.path == path)
            .count()
    }

    async fn serve(&self, method: &'static str, path: &str, body: Option<Value>) -> Reply {
        let hold = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(Call {
                method,
                path: path.to_string(),
                body,
            });
            self.holds.lock().unwrap().remove(&(calls.len() - 1))
        };
        let reply = {
            let key = format!("{} {}", method, path);
            let mut routes = self.routes.lock().unwrap();
            let queue = routes
                .get_mut(&key)
                .unwrap_or_else(|| panic!("unscripted call: {}", key));
            if queue.len() > 1 {
                queue.pop_front().unwrap()
            } else {
                queue.front().cloned().unwrap()
            }
        };
        if let Some(hold) = hold {
            let _ = hold.await;
        }
        reply
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, path: &str) -> Reply {
        self.serve("GET", path, None).await
    }

    async fn post(&self, path: &str, body: Value) -> Reply {
        self.serve("POST", path, Some(body)).await
    }
}

pub fn engine(transport: &Arc<ScriptedTransport>) -> SyncEngine {
    SyncEngine::new(transport.clone(), EventBus::new(256))
}
