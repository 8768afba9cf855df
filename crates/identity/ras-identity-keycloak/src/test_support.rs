//! Transport double that records requests and replays canned replies.

use crate::error::TransportError;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Debug, Clone)]
enum Reply {
    Response(HttpResponse),
    Failure(TransportError),
    Hang,
}

/// Records every request it is given. Replies are served in order; the last
/// one is repeated once the queue is down to a single entry.
#[derive(Debug)]
pub struct RecordingTransport {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl RecordingTransport {
    fn with_replies(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn respond(response: HttpResponse) -> Self {
        Self::with_replies([Reply::Response(response)])
    }

    pub fn respond_json(status: u16, body: serde_json::Value) -> Self {
        Self::respond(json_response(status, body))
    }

    /// Serve `responses` one per request, in order.
    pub fn sequence(responses: impl IntoIterator<Item = HttpResponse>) -> Self {
        Self::with_replies(responses.into_iter().map(Reply::Response))
    }

    pub fn fail(error: TransportError) -> Self {
        Self::with_replies([Reply::Failure(error)])
    }

    /// Never completes a request.
    pub fn hang() -> Self {
        Self::with_replies([Reply::Hang])
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> Option<HttpRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    fn next_reply(&self) -> Option<Reply> {
        let mut replies = self.replies.lock().unwrap();
        if replies.len() > 1 {
            replies.pop_front()
        } else {
            replies.front().cloned()
        }
    }
}

pub fn json_response(status: u16, body: serde_json::Value) -> HttpResponse {
    HttpResponse::new(status, body.to_string())
}

#[async_trait]
impl HttpTransport for RecordingTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let description = format!("{:?} {}", request.method, request.url);
        self.requests.lock().unwrap().push(request);

        match self.next_reply() {
            Some(Reply::Response(response)) => Ok(response),
            Some(Reply::Failure(error)) => Err(error),
            Some(Reply::Hang) => std::future::pending().await,
            None => Err(TransportError::Request(format!("no reply configured for {}", description))),
        }
    }
}
