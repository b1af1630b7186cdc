//! Decoder for the assistant service's streaming response body
//!
//! The body is a sequence of newline-terminated parts, each `<code>:<json>`:
//!
//! ```text
//! 0:"Paris "
//! 0:"is the capital."
//! d:{"finishReason":"stop"}
//! ```
//!
//! `0` carries text, `3` an error message, `d` the finish message. Other
//! codes (data, annotations, step markers, tool calls) are skipped.

use super::{FragmentStream, TransportError};
use futures::stream::{self, Stream, StreamExt};
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt::Display;

/// One decoded line of the response body
#[derive(Debug, Clone, PartialEq)]
pub enum StreamPart {
    Text(String),
    Error(String),
    Finish(Value),
    /// A part this client has no use for
    Skipped(char),
}

/// Part codes the service may send that carry nothing for the transcript
const SKIPPED_CODES: &[char] = &[
    '2', '8', '9', 'a', 'b', 'c', 'e', 'f', 'g', 'h', 'i', 'j', 'k',
];

/// Parse a single line (without its terminator). Blank lines yield `None`.
pub fn parse_line(line: &str) -> Result<Option<StreamPart>, TransportError> {
    let line = line.trim_end_matches('\r');
    if line.trim().is_empty() {
        return Ok(None);
    }

    let Some((code, payload)) = line.split_once(':') else {
        return Err(TransportError::malformed(format!(
            "stream line has no part code: {line:?}"
        )));
    };

    let mut chars = code.chars();
    let (Some(code), None) = (chars.next(), chars.next()) else {
        return Err(TransportError::malformed(format!(
            "invalid part code {code:?}"
        )));
    };

    match code {
        '0' => decode_string(payload).map(|text| Some(StreamPart::Text(text))),
        '3' => decode_string(payload).map(|message| Some(StreamPart::Error(message))),
        'd' => serde_json::from_str(payload)
            .map(|value| Some(StreamPart::Finish(value)))
            .map_err(|e| TransportError::malformed(format!("invalid finish part: {e}"))),
        c if SKIPPED_CODES.contains(&c) => Ok(Some(StreamPart::Skipped(c))),
        other => {
            tracing::debug!(code = %other, "Skipping unknown stream part");
            Ok(Some(StreamPart::Skipped(other)))
        }
    }
}

fn decode_string(payload: &str) -> Result<String, TransportError> {
    serde_json::from_str::<String>(payload)
        .map_err(|e| TransportError::malformed(format!("invalid string part {payload:?}: {e}")))
}

/// Longest line the decoder will hold before giving up on the stream
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Splits a byte stream into lines, holding partial lines across chunks
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
    /// Prefix of `buffer` already searched for a terminator
    scanned: usize,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning every line it completed.
    ///
    /// Fails once a line grows past [`MAX_LINE_BYTES`].
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>, TransportError> {
        self.buffer.extend_from_slice(chunk);
        let mut lines = Vec::new();
        let mut line_start = 0;
        let mut search_from = self.scanned;
        while let Some(offset) = self.buffer[search_from..]
            .iter()
            .position(|byte| *byte == b'\n')
        {
            let line_end = search_from + offset;
            check_line_len(line_end - line_start)?;
            lines.push(into_utf8(self.buffer[line_start..line_end].to_vec())?);
            line_start = line_end + 1;
            search_from = line_start;
        }
        self.buffer.drain(..line_start);
        self.scanned = self.buffer.len();
        check_line_len(self.buffer.len())?;
        Ok(lines)
    }

    /// Flush a trailing line that had no terminator
    pub fn finish(&mut self) -> Result<Option<String>, TransportError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }
        self.scanned = 0;
        let line = std::mem::take(&mut self.buffer);
        into_utf8(line).map(Some)
    }
}

fn check_line_len(len: usize) -> Result<(), TransportError> {
    if len > MAX_LINE_BYTES {
        return Err(TransportError::malformed(format!(
            "stream line exceeds {MAX_LINE_BYTES} bytes"
        )));
    }
    Ok(())
}

fn into_utf8(line: Vec<u8>) -> Result<String, TransportError> {
    String::from_utf8(line)
        .map_err(|e| TransportError::malformed(format!("stream line is not UTF-8: {e}")))
}

struct DecodeState<S> {
    body: S,
    decoder: LineDecoder,
    pending: VecDeque<String>,
    body_done: bool,
    finished: bool,
}

/// Turn a response body into a stream of text fragments.
///
/// The stream ends at the finish part (or end of body) and yields at most one
/// error, after which it ends.
pub fn fragment_stream<S, B, E>(body: S) -> FragmentStream
where
    S: Stream<Item = Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = DecodeState {
        body,
        decoder: LineDecoder::new(),
        pending: VecDeque::new(),
        body_done: false,
        finished: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if st.finished {
                return None;
            }

            if let Some(line) = st.pending.pop_front() {
                match parse_line(&line) {
                    Ok(None | Some(StreamPart::Skipped(_))) => continue,
                    Ok(Some(StreamPart::Text(text))) => return Some((Ok(text), st)),
                    Ok(Some(StreamPart::Finish(value))) => {
                        tracing::debug!(finish = %value, "Stream finished");
                        return None;
                    }
                    Ok(Some(StreamPart::Error(message))) => {
                        st.finished = true;
                        return Some((Err(TransportError::service(message)), st));
                    }
                    Err(e) => {
                        st.finished = true;
                        return Some((Err(e), st));
                    }
                }
            }

            if st.body_done {
                tracing::debug!("Stream body ended without a finish part");
                return None;
            }

            let read = match st.body.next().await {
                Some(Ok(chunk)) => st.decoder.push(chunk.as_ref()),
                Some(Err(e)) => {
                    Err(TransportError::network(format!("stream read failed: {e}")))
                }
                None => {
                    st.body_done = true;
                    st.decoder.finish().map(|rest| rest.into_iter().collect())
                }
            };
            match read {
                Ok(lines) => st.pending.extend(lines),
                Err(e) => {
                    st.finished = true;
                    return Some((Err(e), st));
                }
            }
        }
    })
    .boxed()
}
