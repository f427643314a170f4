//! In-memory transport for tests.
//!
//! Responses are queued up front and handed out in order; every request is
//! recorded so tests can assert on what reached the "network".

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;

use crate::error::TransportError;
use crate::transport::{Request, Response, Transport};

#[derive(Debug, Default)]
pub struct MemoryTransport {
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    responses: VecDeque<Result<Response, TransportError>>,
    requests: Vec<Request>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response with a JSON body.
    pub fn respond_json(&self, status: u16, body: &Value) -> &Self {
        self.respond(Response::new(status, body.to_string()))
    }

    /// Queues a raw response.
    pub fn respond(&self, response: Response) -> &Self {
        self.lock().responses.push_back(Ok(response));
        self
    }

    /// Queues a transport failure.
    pub fn fail(&self, error: TransportError) -> &Self {
        self.lock().responses.push_back(Err(error));
        self
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<Request> {
        self.lock().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Transport for MemoryTransport {
    async fn send(&self, request: Request) -> Result<Response, TransportError> {
        let mut state = self.lock();
        let endpoint = request.path();
        state.requests.push(request);
        state
            .responses
            .pop_front()
            .unwrap_or(Err(TransportError::Unreachable {
                endpoint,
                reason: "no response queued".into(),
            }))
    }
}
