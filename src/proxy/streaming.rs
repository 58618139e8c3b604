//! Relay of the upstream chunked `data: ` protocol as plain text

use bytes::Bytes;
use futures::{stream, Stream, StreamExt};

use crate::api::StreamChunk;

const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "[DONE]";

/// Outcome of parsing one complete protocol line.
enum LineOutcome {
    /// A delta text fragment to forward to the caller
    Fragment(String),
    /// Nothing to forward (blank, non-data, empty delta, or malformed line)
    Skip,
    /// The terminal sentinel
    Done,
}

/// Incremental decoder for the upstream `data: ` line protocol.
///
/// Chunks may split lines and multi-byte UTF-8 sequences arbitrarily, so
/// the decoder keeps leftover undecoded bytes and the incomplete trailing
/// line across `feed` calls. Once the `[DONE]` sentinel is observed, no
/// further input produces output.
#[derive(Debug, Default)]
pub struct DeltaDecoder {
    /// Bytes not yet decodable (incomplete trailing UTF-8 sequence)
    pending: Vec<u8>,
    /// Decoded text of the incomplete trailing line
    line: String,
    done: bool,
}

impl DeltaDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once the terminal sentinel has been observed or the relay has
    /// latched an upstream read failure.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed one upstream chunk, returning the delta fragments completed by
    /// it, in the order their lines were observed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        if self.done {
            return Vec::new();
        }

        self.pending.extend_from_slice(chunk);
        self.decode_pending();

        let mut fragments = Vec::new();
        while let Some(newline) = self.line.find('\n') {
            let line: String = self.line.drain(..=newline).collect();
            let line = line.trim_end_matches(['\n', '\r']);
            if line.is_empty() {
                continue;
            }
            match parse_line(line) {
                LineOutcome::Fragment(text) => fragments.push(text),
                LineOutcome::Skip => {}
                LineOutcome::Done => {
                    self.done = true;
                    break;
                }
            }
        }
        fragments
    }

    /// Move the decodable prefix of the pending bytes into the line buffer,
    /// keeping an incomplete trailing sequence for the next chunk. Invalid
    /// sequences are replaced with U+FFFD and skipped.
    fn decode_pending(&mut self) {
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    self.line.push_str(text);
                    self.pending.clear();
                    return;
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    self.line
                        .push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match err.error_len() {
                        None => {
                            self.pending.drain(..valid);
                            return;
                        }
                        Some(len) => {
                            self.line.push('\u{FFFD}');
                            self.pending.drain(..valid + len);
                        }
                    }
                }
            }
        }
    }
}

/// Parse one non-empty line of the upstream protocol.
fn parse_line(line: &str) -> LineOutcome {
    let Some(data) = line.strip_prefix(DATA_PREFIX) else {
        return LineOutcome::Skip;
    };
    if data.trim() == DONE_SENTINEL {
        return LineOutcome::Done;
    }

    match serde_json::from_str::<StreamChunk>(data) {
        Ok(chunk) => {
            let delta = chunk
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.delta.content)
                .filter(|content| !content.is_empty());
            match delta {
                Some(text) => LineOutcome::Fragment(text),
                None => LineOutcome::Skip,
            }
        }
        Err(e) => {
            // Malformed line: skip it, the stream keeps going
            tracing::warn!(error = %e, line = %data, "Skipping malformed stream line");
            LineOutcome::Skip
        }
    }
}

/// Relay the upstream streaming body as plain text fragments.
///
/// Pull-based: each poll reads upstream chunks until the decoder completes
/// at least one fragment, the sentinel arrives, or the body ends. The
/// sentinel terminates the relay without draining any remaining chunks. A
/// read failure mid-stream ends the relay with an error; the caller's
/// response has already started by then, so no error body is possible and
/// the failure is only recorded server-side.
pub fn relay(response: reqwest::Response) -> impl Stream<Item = Result<Bytes, std::io::Error>> {
    let body = response.bytes_stream();
    stream::unfold(
        (body, DeltaDecoder::new()),
        |(mut body, mut decoder)| async move {
            loop {
                if decoder.is_done() {
                    return None;
                }
                match body.next().await {
                    Some(Ok(chunk)) => {
                        let fragments = decoder.feed(&chunk);
                        if fragments.is_empty() {
                            continue;
                        }
                        return Some((Ok(Bytes::from(fragments.concat())), (body, decoder)));
                    }
                    Some(Err(e)) => {
                        tracing::error!(error = %e, "Error reading upstream stream");
                        // Latch: the relay ends here, the body is not polled again
                        decoder.done = true;
                        let err = std::io::Error::new(std::io::ErrorKind::Other, e.to_string());
                        return Some((Err(err), (body, decoder)));
                    }
                    None => return None,
                }
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(chunks: &[&[u8]]) -> String {
        let mut decoder = DeltaDecoder::new();
        let mut out = String::new();
        for chunk in chunks {
            out.push_str(&decoder.feed(chunk).concat());
        }
        out
    }

    #[test]
    fn test_relays_delta_content_in_order() {
        let out = feed_all(&[
            b"data: {\"choices\":[{\"delta\":{\"content\":\"foo\"}}]}\n",
            b"data: {\"choices\":[{\"delta\":{\"content\":\"bar\"}}]}\n",
            b"data: [DONE]\n",
        ]);
        assert_eq!(out, "foobar");
    }

    #[test]
    fn test_done_sentinel_terminates() {
        let mut decoder = DeltaDecoder::new();
        let fragments = decoder.feed(
            b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\ndata: [DONE]\ndata: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\n",
        );
        assert_eq!(fragments, vec!["a".to_string()]);
        assert!(decoder.is_done());

        // Input after the sentinel is ignored entirely
        let fragments =
            decoder.feed(b"data: {\"choices\":[{\"delta\":{\"content\":\"c\"}}]}\n");
        assert!(fragments.is_empty());
    }

    #[test]
    fn test_malformed_line_is_skipped() {
        let out = feed_all(&[
            b"data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n",
            b"data: {not json}\n",
            b"data: {\"choices\":[{\"delta\":{\"content\":\"still ok\"}}]}\n",
        ]);
        assert_eq!(out, "okstill ok");
    }

    #[test]
    fn test_non_data_and_blank_lines_ignored() {
        let out = feed_all(&[
            b": keep-alive comment\n",
            b"\n",
            b"event: something\n",
            b"data: {\"choices\":[{\"delta\":{\"content\":\"x\"}}]}\n",
        ]);
        assert_eq!(out, "x");
    }

    #[test]
    fn test_line_split_across_chunks() {
        let out = feed_all(&[
            b"data: {\"choices\":[{\"del",
            b"ta\":{\"content\":\"spl",
            b"it\"}}]}\n",
        ]);
        assert_eq!(out, "split");
    }

    #[test]
    fn test_multibyte_utf8_split_across_chunks() {
        // U+00E9 is 0xC3 0xA9; split it between chunks inside the JSON
        let full = "data: {\"choices\":[{\"delta\":{\"content\":\"café\"}}]}\n".as_bytes();
        let split_at = full
            .windows(2)
            .position(|w| w == [0xC3, 0xA9])
            .expect("é present")
            + 1;
        let out = feed_all(&[&full[..split_at], &full[split_at..]]);
        assert_eq!(out, "café");
    }

    #[test]
    fn test_invalid_utf8_replaced() {
        // Lone 0xFF is not valid UTF-8 anywhere
        let mut decoder = DeltaDecoder::new();
        decoder.feed(b"\xFF\n");
        let fragments = decoder
            .feed(b"data: {\"choices\":[{\"delta\":{\"content\":\"after\"}}]}\n");
        assert_eq!(fragments, vec!["after".to_string()]);
    }

    #[test]
    fn test_empty_delta_content_skipped() {
        let out = feed_all(&[
            b"data: {\"choices\":[{\"delta\":{\"content\":\"\"}}]}\n",
            b"data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n",
            b"data: {\"choices\":[{\"delta\":{\"content\":\"text\"}}]}\n",
        ]);
        assert_eq!(out, "text");
    }

    #[test]
    fn test_crlf_lines() {
        let out = feed_all(&[
            b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\r\n",
            b"data: [DONE]\r\n",
        ]);
        assert_eq!(out, "a");
    }

    #[test]
    fn test_trailing_line_without_newline_not_emitted() {
        let mut decoder = DeltaDecoder::new();
        let fragments =
            decoder.feed(b"data: {\"choices\":[{\"delta\":{\"content\":\"pending\"}}]}");
        assert!(fragments.is_empty());

        let fragments = decoder.feed(b"\n");
        assert_eq!(fragments, vec!["pending".to_string()]);
    }
}
