//! Scriptable in-memory transport
//!
//! Replies are scripted per `(method, url)`. One-shot steps are consumed in
//! order; once they run out the sticky reply (if any) answers every call.
//! Requests nobody scripted succeed with `{}`.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use wrench_sync::{Method, Request, Transport, TransportError};

type Reply = Result<Value, TransportError>;

enum Step {
    Reply(Reply),
    /// Never completes; models a request lost on the wire
    Hang,
    /// Completes when the test sends the reply
    Held(oneshot::Receiver<Reply>),
}

#[derive(Default)]
struct Script {
    steps: VecDeque<Step>,
    always: Option<Reply>,
}

/// [`Transport`] double that records every request it sees
#[derive(Default)]
pub struct ScriptedTransport {
    scripts: Mutex<HashMap<(Method, String), Script>>,
    calls: Mutex<Vec<Request>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call to `method url` succeeds with `body`
    pub fn succeed_with(&self, method: Method, url: &str, body: Value) {
        self.edit(method, url, |s| s.always = Some(Ok(body)));
    }

    /// Every call to `method url` fails with `error`
    pub fn fail_always(&self, method: Method, url: &str, error: TransportError) {
        self.edit(method, url, |s| s.always = Some(Err(error)));
    }

    /// The next call to `method url` fails with `error`
    pub fn fail_once(&self, method: Method, url: &str, error: TransportError) {
        self.edit(method, url, |s| s.steps.push_back(Step::Reply(Err(error))));
    }

    /// The next call to `method url` never returns
    pub fn hang(&self, method: Method, url: &str) {
        self.edit(method, url, |s| s.steps.push_back(Step::Hang));
    }

    /// The next call to `method url` waits for the returned sender
    ///
    /// Dropping the sender fails the call with a network error.
    pub fn hold(&self, method: Method, url: &str) -> oneshot::Sender<Reply> {
        let (tx, rx) = oneshot::channel();
        self.edit(method, url, |s| s.steps.push_back(Step::Held(rx)));
        tx
    }

    /// Requests seen so far, in arrival order
    pub fn calls(&self) -> Vec<Request> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Yield until at least `n` requests have arrived
    pub async fn wait_for_calls(&self, n: usize) {
        while self.call_count() < n {
            tokio::task::yield_now().await;
        }
    }

    fn edit(&self, method: Method, url: &str, change: impl FnOnce(&mut Script)) {
        change(lock(&self.scripts).entry((method, url.to_string())).or_default());
    }

    fn next_step(&self, request: &Request) -> Step {
        let mut scripts = lock(&self.scripts);
        let Some(script) = scripts.get_mut(&(request.method, request.url.clone())) else {
            return Step::Reply(Ok(json!({})));
        };
        if let Some(step) = script.steps.pop_front() {
            return step;
        }
        Step::Reply(script.always.clone().unwrap_or_else(|| Ok(json!({}))))
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, request: &Request) -> Result<Value, TransportError> {
        lock(&self.calls).push(request.clone());

        match self.next_step(request) {
            Step::Reply(reply) => reply,
            Step::Hang => std::future::pending().await,
            Step::Held(rx) => rx
                .await
                .unwrap_or_else(|_| Err(TransportError::network("held reply was dropped"))),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
