//! Scripted mirror transport for tests.
//!
//! Replies are looked up by exact URL first, then by the longest matching
//! mirror prefix. Unscripted URLs answer 404.

use std::sync::Mutex;
use std::time::Duration;

use reqwest::Url;
use serde_json::Value;

use super::client::MirrorTransport;
use super::error::MirrorError;

/// What a scripted mirror does with a request.
#[derive(Debug, Clone)]
pub enum Reply {
    Json(Value),
    Status(u16),
    Garbage,
    Hang,
}

#[derive(Default)]
pub struct ScriptedTransport {
    exact: Vec<(String, Duration, Reply)>,
    prefixes: Vec<(String, Duration, Reply)>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply to one exact URL.
    pub fn on(mut self, url: &str, reply: Reply) -> Self {
        self.exact.push((url.to_string(), Duration::ZERO, reply));
        self
    }

    /// Reply to every URL under a mirror base.
    pub fn on_mirror(self, base: &str, reply: Reply) -> Self {
        self.on_mirror_after(base, Duration::ZERO, reply)
    }

    /// Reply to every URL under a mirror base after a delay.
    pub fn on_mirror_after(mut self, base: &str, delay: Duration, reply: Reply) -> Self {
        self.prefixes.push((base.to_string(), delay, reply));
        self
    }

    /// URLs requested so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn lookup(&self, url: &str) -> (Duration, Reply) {
        if let Some((_, delay, reply)) = self.exact.iter().find(|(u, _, _)| u == url) {
            return (*delay, reply.clone());
        }
        self.prefixes
            .iter()
            .filter(|(base, _, _)| url.starts_with(base.as_str()))
            .max_by_key(|(base, _, _)| base.len())
            .map(|(_, delay, reply)| (*delay, reply.clone()))
            .unwrap_or((Duration::ZERO, Reply::Status(404)))
    }
}

impl MirrorTransport for ScriptedTransport {
    async fn get_json(&self, url: Url) -> Result<Value, MirrorError> {
        let (delay, reply) = {
            self.calls.lock().unwrap().push(url.to_string());
            self.lookup(url.as_str())
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match reply {
            Reply::Json(value) => Ok(value),
            Reply::Status(status) => Err(MirrorError::BadStatus { status }),
            Reply::Garbage => Err(MirrorError::BadBody {
                message: "expected value at line 1 column 1".to_string(),
            }),
            Reply::Hang => std::future::pending().await,
        }
    }
}
