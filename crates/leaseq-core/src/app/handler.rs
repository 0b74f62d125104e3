//! Handler traits - what the processor calls for each leased payload
//!
//! # Two layers
//! - **Typed**: `Message` trait + `Handler<M>` - JSON payloads decoded for you
//! - **Dyn**: `MessageHandler` - object-safe, raw `Payload`
//!
//! Handlers only ever return `MessageProcessingResult`. An `Err` (or a
//! panic) is turned into an unhandled-exception result by the worker.

use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::domain::{MessageProcessingResult, Payload};

/// Error a handler may bubble up instead of choosing an outcome.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Object-safe handler over raw payloads.
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    async fn handle(&self, payload: Payload) -> Result<MessageProcessingResult, HandlerError>;
}

/// Closure adapter, see [`handler_fn`].
pub struct FnHandler<F> {
    f: F,
}

/// Wrap an async closure as a `MessageHandler`.
///
/// ```ignore
/// let handler = handler_fn(|payload: Payload| async move {
///     println!("{}", payload.as_str());
///     Ok(MessageProcessingResult::Success)
/// });
/// ```
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Payload) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<MessageProcessingResult, HandlerError>> + Send + 'static,
{
    FnHandler { f }
}

#[async_trait]
impl<F, Fut> MessageHandler for FnHandler<F>
where
    F: Fn(Payload) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<MessageProcessingResult, HandlerError>> + Send + 'static,
{
    async fn handle(&self, payload: Payload) -> Result<MessageProcessingResult, HandlerError> {
        (self.f)(payload).await
    }
}

/// A type carried as a JSON payload.
///
/// # Naming
/// - `{namespace}.{domain}.{action}.v{major}`
/// - e.g. `acme.mail.send.v1`
pub trait Message: Serialize + DeserializeOwned + Send + Sync + 'static {
    const TYPE: &'static str;
}

/// Typed handler for one `Message` type.
#[async_trait]
pub trait Handler<M: Message>: Send + Sync + 'static {
    async fn handle(&self, message: M) -> Result<MessageProcessingResult, HandlerError>;
}

/// Type-erases a `Handler<M>` into a `MessageHandler`.
///
/// A payload that does not decode as `M` can never succeed, so it resolves
/// to `BadMessage` instead of being retried forever.
pub struct TypedHandler<M: Message, H: Handler<M>> {
    handler: H,
    _marker: PhantomData<fn() -> M>,
}

impl<M: Message, H: Handler<M>> TypedHandler<M, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<M: Message, H: Handler<M>> MessageHandler for TypedHandler<M, H> {
    async fn handle(&self, payload: Payload) -> Result<MessageProcessingResult, HandlerError> {
        let message: M = match serde_json::from_str(payload.as_str()) {
            Ok(message) => message,
            Err(e) => {
                tracing::error!(message_type = M::TYPE, error = %e, "payload does not decode");
                return Ok(MessageProcessingResult::BadMessage);
            }
        };
        self.handler.handle(message).await
    }
}

/// Encode a message for `QueueStore::add`.
pub fn encode<M: Message>(message: &M) -> Result<Payload, serde_json::Error> {
    serde_json::to_string(message).map(Payload::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct SendMail {
        to: String,
    }

    impl Message for SendMail {
        const TYPE: &'static str = "test.mail.send.v1";
    }

    struct SendMailHandler;

    #[async_trait]
    impl Handler<SendMail> for SendMailHandler {
        async fn handle(&self, message: SendMail) -> Result<MessageProcessingResult, HandlerError> {
            if message.to.contains('@') {
                Ok(MessageProcessingResult::Success)
            } else {
                Ok(MessageProcessingResult::Retry)
            }
        }
    }

    #[tokio::test]
    async fn typed_handler_decodes_json() {
        let handler = TypedHandler::<SendMail, _>::new(SendMailHandler);

        let ok = encode(&SendMail { to: "a@b".into() }).unwrap();
        assert_eq!(handler.handle(ok).await.unwrap(), MessageProcessingResult::Success);

        let retry = encode(&SendMail { to: "nobody".into() }).unwrap();
        assert_eq!(handler.handle(retry).await.unwrap(), MessageProcessingResult::Retry);
    }

    #[tokio::test]
    async fn undecodable_payload_is_a_bad_message() {
        let handler = TypedHandler::<SendMail, _>::new(SendMailHandler);
        let result = handler.handle(Payload::new("{not json")).await.unwrap();
        assert_eq!(result, MessageProcessingResult::BadMessage);
    }

    #[tokio::test]
    async fn closures_are_handlers() {
        let handler = handler_fn(|payload: Payload| async move {
            if payload.as_str() == "boom" {
                return Err(HandlerError::from("exploded"));
            }
            Ok(MessageProcessingResult::Success)
        });

        assert!(handler.handle("fine".into()).await.is_ok());
        let err = handler.handle("boom".into()).await.unwrap_err();
        assert_eq!(err.to_string(), "exploded");
    }
}
