use std::pin::Pin;
use std::sync::Arc;

use agentia_model::{Message, ModelProvider, ModelRequest};
use tracing::Instrument;

use crate::Error;
use crate::stream::MessageStream;

type BoxedFuture<T> = Pin<Box<dyn Future<Output = Result<T, Error>> + Send>>;
#[rustfmt::skip]
type HandlerFn<T> = Arc<
    dyn Fn(ModelRequest) -> BoxedFuture<T> + Send + Sync
>;

/// A wrapper around a model provider that provides a type-erased
/// interface for the other modules.
#[derive(Clone)]
pub struct ModelClient {
    model: Arc<str>,
    complete_fn: HandlerFn<Message>,
    stream_fn: HandlerFn<MessageStream>,
}

impl ModelClient {
    pub fn new<P: ModelProvider + 'static>(provider: P) -> Self {
        let model: Arc<str> = provider.model().into();
        let supports_reasoning = provider.supports_reasoning();
        // We have to erase the type `P`, since `ModelClient` doesn't have a
        // generic parameter and we don't want it either.
        let provider = Arc::new(provider);

        let complete_fn: HandlerFn<Message> = Arc::new({
            let provider = Arc::clone(&provider);
            move |req| {
                let fut = provider.send_request(&req);
                Box::pin(
                    async move {
                        trace!("got a request: {req:?}");
                        let msg = fut.await.map_err(|err| {
                            error!("got an error: {err:?}");
                            Error::from_provider(err)
                        })?;
                        trace!("got a message: {msg:?}");
                        Ok(msg)
                    }
                    .instrument(trace_span!("model client req")),
                )
            }
        });

        let stream_fn: HandlerFn<MessageStream> = Arc::new(move |req| {
            let fut = provider.stream_request(&req);
            Box::pin(
                async move {
                    trace!("got a streaming request: {req:?}");
                    let resp = fut.await.map_err(|err| {
                        error!("got an error: {err:?}");
                        Error::from_provider(err)
                    })?;
                    Ok(MessageStream::from_response(resp, supports_reasoning))
                }
                .instrument(trace_span!("model client stream req")),
            )
        });

        Self {
            model,
            complete_fn,
            stream_fn,
        }
    }

    /// Returns the model requests are sent to.
    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Sends a request and waits for the complete message.
    #[inline]
    pub async fn complete(&self, req: ModelRequest) -> Result<Message, Error> {
        (self.complete_fn)(req).await
    }

    /// Sends a request and returns the message stream once the provider
    /// accepted it.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. Dropping the returned stream stops
    /// reading the response.
    #[inline]
    pub async fn stream(
        &self,
        req: ModelRequest,
    ) -> Result<MessageStream, Error> {
        (self.stream_fn)(req).await
    }
}
