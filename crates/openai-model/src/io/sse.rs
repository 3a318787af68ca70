use super::{Chunks, ChunksError};

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    ChunksError(ChunksError),
    InvalidPayload,
}

/// A type for reading server-sent events from a chunk stream.
///
/// Only the `data` field is delivered. Comment lines (keep-alives sent by
/// some gateways) and the `event`, `id` and `retry` fields are skipped.
pub struct Sse {
    // Raw bytes, since a chunk boundary may split a UTF-8 sequence.
    buf: Vec<u8>,
    data: Option<String>,
    chunks: Chunks,
}

impl Sse {
    #[inline]
    pub fn new(chunks: Chunks) -> Self {
        Self {
            buf: Vec::new(),
            data: None,
            chunks,
        }
    }

    pub async fn next_event(&mut self) -> Result<Option<String>, Error> {
        loop {
            // Drain what is buffered before waiting for the network.
            if let Some(event) = self.try_parse_event()? {
                return Ok(Some(event));
            }

            let Some(bytes) =
                self.chunks.next_chunk().await.map_err(Error::ChunksError)?
            else {
                // An event without the terminating blank line is dropped.
                return Ok(None);
            };
            self.buf.extend_from_slice(&bytes);
        }
    }

    // event         = *( comment / field ) end-of-line
    // comment       = colon *any-char end-of-line
    // field         = 1*name-char [ colon [ space ] *any-char ] end-of-line
    // end-of-line   = ( cr lf / lf )
    fn try_parse_event(&mut self) -> Result<Option<String>, Error> {
        while let Some(line) = self.take_line()? {
            if line.is_empty() {
                if let Some(data) = self.data.take() {
                    return Ok(Some(data));
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => {
                    (field, value.strip_prefix(' ').unwrap_or(value))
                }
                None => (line.as_str(), ""),
            };
            match field {
                "data" => {
                    if let Some(data) = self.data.as_mut() {
                        data.push('\n');
                        data.push_str(value);
                    } else {
                        self.data = Some(value.to_owned());
                    }
                }
                "event" | "id" | "retry" => {}
                _ => return Err(Error::InvalidPayload),
            }
        }
        Ok(None)
    }

    fn take_line(&mut self) -> Result<Option<String>, Error> {
        let Some(eol_idx) = self.buf.iter().position(|b| *b == b'\n') else {
            return Ok(None);
        };
        let mut line: Vec<u8> = self.buf.drain(..=eol_idx).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        String::from_utf8(line)
            .map(Some)
            .map_err(|_| Error::InvalidPayload)
    }
}
