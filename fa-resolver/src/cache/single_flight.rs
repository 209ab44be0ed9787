//! At most one in-flight computation per key
//!
//! Callers that arrive while a key is being computed await the same shared
//! future instead of starting their own. The guarantee is per process.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

type Flight<T> = Shared<BoxFuture<'static, T>>;

pub struct SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    flights: Arc<Mutex<HashMap<String, Flight<T>>>>,
}

impl<T> Default for SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            flights: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Run `work` for `key`, or join the flight already running for it
    ///
    /// Returns the result and whether this call started the flight. If every
    /// caller of a flight is cancelled, the flight stays registered and the
    /// next caller resumes it.
    pub async fn run<F>(&self, key: &str, work: F) -> (T, bool)
    where
        F: Future<Output = T> + Send + 'static,
    {
        let (flight, leader) = {
            let mut flights = self.flights.lock().unwrap_or_else(|e| e.into_inner());
            match flights.get(key) {
                Some(existing) => (existing.clone(), false),
                None => {
                    let registry = Arc::clone(&self.flights);
                    let owned_key = key.to_string();
                    let flight = async move {
                        let result = work.await;
                        registry
                            .lock()
                            .unwrap_or_else(|e| e.into_inner())
                            .remove(&owned_key);
                        result
                    }
                    .boxed()
                    .shared();
                    flights.insert(key.to_string(), flight.clone());
                    (flight, true)
                }
            }
        };

        (flight.await, leader)
    }

    /// Number of keys currently being computed
    pub fn in_flight(&self) -> usize {
        self.flights.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
