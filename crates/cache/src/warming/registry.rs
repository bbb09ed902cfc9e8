//! In-flight warming task registry.
//!
//! Warming passes for the same signature must not stack: a second caller
//! joins the in-flight pass instead of starting another round of fetches.

use super::WarmingOutcome;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;

type SharedPass = Shared<BoxFuture<'static, WarmingOutcome>>;

#[derive(Default)]
pub struct TaskRegistry {
    in_flight: Mutex<HashMap<String, SharedPass>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of warming passes currently in flight.
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// Run `pass` under `signature`, or join the pass already running under
    /// it. The check-and-insert is a single critical section, so at most one
    /// pass per signature ever executes.
    pub async fn run_or_join<F>(&self, signature: &str, pass: F) -> WarmingOutcome
    where
        F: Future<Output = WarmingOutcome> + Send + 'static,
    {
        let (shared, owner) = {
            let mut map = self.in_flight.lock();
            match map.get(signature) {
                Some(existing) => (existing.clone(), false),
                None => {
                    let shared = pass.boxed().shared();
                    map.insert(signature.to_owned(), shared.clone());
                    (shared, true)
                }
            }
        };
        let outcome = shared.await;
        if owner {
            self.in_flight.lock().remove(signature);
        }
        outcome
    }
}
