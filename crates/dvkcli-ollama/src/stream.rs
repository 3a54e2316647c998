//! Incremental decoding of newline-delimited JSON chat streams.

use crate::error::OllamaError;
use crate::types::{ChatChunk, ChatResponseLine};

/// Splits a byte stream into NDJSON lines and decodes each into a
/// [`ChatChunk`].
///
/// Bytes are buffered until a newline arrives, so a line (or a multi-byte
/// character) split across network reads decodes correctly.
#[derive(Debug, Default)]
pub struct NdjsonDecoder {
    buffer: Vec<u8>,
}

impl NdjsonDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one network read and decode every complete line it finishes.
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<ChatChunk>, OllamaError> {
        self.buffer.extend_from_slice(bytes);
        let mut chunks = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(chunk) = decode_line(&line)? {
                chunks.push(chunk);
            }
        }
        Ok(chunks)
    }

    /// Decode a trailing line that was not newline-terminated.
    pub fn finish(&mut self) -> Result<Option<ChatChunk>, OllamaError> {
        let rest = std::mem::take(&mut self.buffer);
        decode_line(&rest)
    }
}

fn decode_line(line: &[u8]) -> Result<Option<ChatChunk>, OllamaError> {
    let text = String::from_utf8_lossy(line);
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    let parsed: ChatResponseLine = serde_json::from_str(text)?;
    if let Some(error) = parsed.error {
        return Err(OllamaError::Server(error));
    }
    Ok(Some(ChatChunk {
        content: parsed.message.map(|m| m.content).unwrap_or_default(),
        done: parsed.done,
    }))
}
