use std::pin::Pin;
use std::task::{Context, Poll, ready};

use agentia_model::{ErrorKind, ModelChunk, ModelResponse};
use pin_project_lite::pin_project;

use crate::Error;
use crate::io::Sse;
use crate::proto::ChatCompletionChunk;

type PinnedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type NextChunk = Result<(Option<ModelChunk>, Sse), Error>;

pin_project! {
    /// A streaming chat completion, read from server-sent events.
    pub struct OpenAIResponse {
        next_chunk_fut: Option<PinnedFuture<NextChunk>>,
    }
}

impl OpenAIResponse {
    #[inline]
    pub(crate) fn from_sse(sse: Sse) -> Self {
        Self {
            next_chunk_fut: Some(Box::pin(next_chunk(sse))),
        }
    }
}

impl ModelResponse for OpenAIResponse {
    type Error = crate::Error;

    fn poll_next_chunk(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelChunk>, Self::Error>> {
        let this = self.project();
        let Some(next_chunk_fut) = this.next_chunk_fut.as_mut() else {
            return Poll::Ready(Ok(None));
        };
        let (chunk, sse) = match ready!(next_chunk_fut.as_mut().poll(cx)) {
            Ok((Some(chunk), sse)) => (chunk, sse),
            Ok((None, _)) => {
                *this.next_chunk_fut = None;
                return Poll::Ready(Ok(None));
            }
            Err(err) => {
                *this.next_chunk_fut = None;
                return Poll::Ready(Err(err));
            }
        };

        // The stream may still have more data to pull, create a new future for
        // the next chunk.
        *this.next_chunk_fut = Some(Box::pin(next_chunk(sse)));

        Poll::Ready(Ok(Some(chunk)))
    }
}

async fn next_chunk(mut sse: Sse) -> NextChunk {
    loop {
        let sse_event = match sse.next_event().await {
            Ok(Some(event)) => event,
            Ok(None) => return Ok((None, sse)),
            Err(err) => {
                return Err(Error::new(format!("{err:?}"), ErrorKind::Other));
            }
        };
        trace!("got sse event: {sse_event}");
        if sse_event == "[DONE]" {
            return Ok((None, sse));
        }

        let chunk = serde_json::from_str::<ChatCompletionChunk>(&sse_event)
            .map_err(|err| Error::new(format!("{err}"), ErrorKind::Protocol))?;
        if let Some(error) = chunk.error {
            warn!("error in stream: {error}");
            return Ok((Some(ModelChunk::from_error(error.to_string())), sse));
        }

        // Chunks without choices only carry usage, skip them.
        let Some(choice) = chunk.choices.into_iter().next() else {
            continue;
        };
        return Ok((Some(choice.delta.into()), sse));
    }
}
