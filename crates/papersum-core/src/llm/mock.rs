//! Mock completion client for testing.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{CompletionClient, CompletionError, Message};

/// A scripted reply for [`MockClient`].
#[derive(Clone, Debug)]
pub enum MockReply {
    /// Answer with this text.
    Text(String),
    /// Fail the call with this error.
    Fail(CompletionError),
}

impl MockReply {
    pub fn text(s: impl Into<String>) -> Self {
        MockReply::Text(s.into())
    }

    /// A generic transport failure.
    pub fn fail(msg: impl Into<String>) -> Self {
        MockReply::Fail(CompletionError::Http(msg.into()))
    }
}

type Responder = Box<dyn Fn(usize, &[Message]) -> MockReply + Send + Sync>;

/// A hand-rolled recording double implementing [`CompletionClient`].
///
/// Supports:
/// - A fixed reply (used for every call), **or**
/// - A sequence of replies (one per call, repeating the last if exhausted), **or**
/// - A function of the call number and the messages.
/// - Optional per-call latency.
/// - Recording of every call's messages via [`calls()`](MockClient::calls).
///
/// The reply is chosen and the call recorded when `complete()` is invoked,
/// before the returned future is first polled, so call order follows
/// invocation order even when futures are polled concurrently.
pub struct MockClient {
    /// Remaining scripted replies, reversed so `pop()` yields the next one.
    replies: Mutex<Vec<MockReply>>,
    /// Used when the sequence is empty.
    fallback: MockReply,
    responder: Option<Responder>,
    delay: Option<Duration>,
    calls: Mutex<Vec<Vec<Message>>>,
    call_count: AtomicUsize,
}

impl MockClient {
    /// Create a mock that always answers with `reply`.
    pub fn new(reply: MockReply) -> Self {
        Self {
            replies: Mutex::new(Vec::new()),
            fallback: reply,
            responder: None,
            delay: None,
            calls: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
        }
    }

    /// Create a mock that answers in order, repeating the last reply.
    pub fn with_sequence(mut replies: Vec<MockReply>) -> Self {
        assert!(!replies.is_empty(), "sequence must have at least one reply");
        let fallback = replies[replies.len() - 1].clone();
        replies.reverse();
        Self {
            replies: Mutex::new(replies),
            ..Self::new(fallback)
        }
    }

    /// Create a mock whose reply is computed from the 0-based call number
    /// and the messages of that call.
    pub fn from_fn(f: impl Fn(usize, &[Message]) -> MockReply + Send + Sync + 'static) -> Self {
        Self {
            responder: Some(Box::new(f)),
            ..Self::new(MockReply::Fail(CompletionError::EmptyResponse))
        }
    }

    /// Set simulated latency per call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// How many times `complete()` has been called.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Messages of every call, in invocation order.
    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().unwrap().clone()
    }

    /// The user-role content of every call, in invocation order.
    pub fn prompts(&self) -> Vec<String> {
        self.calls()
            .iter()
            .map(|msgs| {
                msgs.iter()
                    .filter(|m| m.role == super::Role::User)
                    .map(|m| m.content.as_str())
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .collect()
    }

    fn next_reply(&self, call: usize, messages: &[Message]) -> MockReply {
        if let Some(responder) = &self.responder {
            return responder(call, messages);
        }
        let mut seq = self.replies.lock().unwrap();
        seq.pop().unwrap_or_else(|| self.fallback.clone())
    }
}

impl CompletionClient for MockClient {
    fn model(&self) -> &str {
        "mock"
    }

    fn complete<'a>(
        &'a self,
        messages: Vec<Message>,
    ) -> Pin<Box<dyn Future<Output = Result<String, CompletionError>> + Send + 'a>> {
        let call = self.call_count.fetch_add(1, Ordering::SeqCst);
        let reply = self.next_reply(call, &messages);
        self.calls.lock().unwrap().push(messages);
        let delay = self.delay;

        Box::pin(async move {
            if let Some(d) = delay {
                tokio::time::sleep(d).await;
            }

            match reply {
                MockReply::Text(text) => Ok(text),
                MockReply::Fail(err) => Err(err),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sequence_repeats_last_reply() {
        let mock = MockClient::with_sequence(vec![MockReply::text("a"), MockReply::text("b")]);
        let mut out = Vec::new();
        for _ in 0..3 {
            out.push(mock.complete(vec![Message::user("x")]).await.unwrap());
        }
        assert_eq!(out, vec!["a", "b", "b"]);
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn records_messages_in_order() {
        let mock = MockClient::from_fn(|n, _| MockReply::text(format!("reply {n}")));
        mock.complete(vec![Message::system("s"), Message::user("first")])
            .await
            .unwrap();
        mock.complete(vec![Message::user("second")]).await.unwrap();
        assert_eq!(mock.prompts(), vec!["first", "second"]);
        assert_eq!(mock.calls()[0][0], Message::system("s"));
    }

    #[tokio::test]
    async fn scripted_failure() {
        let mock = MockClient::new(MockReply::fail("boom"));
        let err = mock.complete(vec![]).await.unwrap_err();
        assert_eq!(err, CompletionError::Http("boom".into()));
    }
}
