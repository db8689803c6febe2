//! Incremental decoder for line-oriented event streams.
//!
//! Spaces deliver job results and live metrics as a text event protocol:
//! each record is an `event: <name>` line followed by a `data: <payload>`
//! line. The decoder extracts the payloads of one target event name from
//! an incrementally delivered byte stream, stopping after a requested
//! number of matches or at end of stream.

use futures::{Stream, StreamExt};

use crate::error::ClientError;

/// Parser position within a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    /// Scanning for an `event: <target>` marker line.
    AwaitingMarker,
    /// The previous line was a marker; the next line is its payload.
    AwaitingPayload,
}

/// Line-by-line parse state for a single decode call.
///
/// Pure with respect to I/O: callers feed already-decoded text in chunks of
/// any size and the parser consumes complete lines as they form. Drive it
/// over a real byte stream with [`decode_event_stream`].
#[derive(Debug)]
pub struct SseDecoder {
    marker: String,
    count: usize,
    buffer: String,
    state: ParseState,
    payloads: Vec<String>,
}

/// Byte length of the `data: ` payload prefix.
const DATA_PREFIX_LEN: usize = 6;

impl SseDecoder {
    /// Create a decoder that captures up to `count` payloads of `event`.
    pub fn new(event: &str, count: usize) -> Self {
        Self {
            marker: format!("event: {event}"),
            count,
            buffer: String::new(),
            state: ParseState::AwaitingMarker,
            payloads: Vec::new(),
        }
    }

    /// Returns `true` once the requested payload count has been collected.
    pub fn is_complete(&self) -> bool {
        self.payloads.len() >= self.count
    }

    /// Append a chunk of decoded text and consume every complete line in
    /// the buffer. Returns `true` when the requested count is reached;
    /// further input is ignored after that.
    ///
    /// A trailing line with no terminating newline stays buffered — if the
    /// stream ends there it is never treated as a payload, and a marker
    /// whose payload line never arrives yields nothing.
    pub fn feed(&mut self, text: &str) -> bool {
        if self.is_complete() {
            return true;
        }
        self.buffer.push_str(text);
        while let Some(pos) = self.buffer.find('\n') {
            let tail = self.buffer.split_off(pos + 1);
            let mut line = std::mem::replace(&mut self.buffer, tail);
            line.truncate(line.len() - 1);
            self.trim_buffer_start();
            if self.process_line(&line) {
                return true;
            }
        }
        false
    }

    /// Consume the parser and return the collected payloads in arrival order.
    pub fn into_payloads(self) -> Vec<String> {
        self.payloads
    }

    // Blank lines and indentation between records carry no meaning; drop
    // leading whitespace so the next find('\n') lands on a real line.
    fn trim_buffer_start(&mut self) {
        let skip = self.buffer.len() - self.buffer.trim_start().len();
        if skip > 0 {
            self.buffer.drain(..skip);
        }
    }

    fn process_line(&mut self, line: &str) -> bool {
        if self.state == ParseState::AwaitingPayload {
            let payload = line.get(DATA_PREFIX_LEN..).unwrap_or_default();
            self.payloads.push(payload.to_string());
            self.state = ParseState::AwaitingMarker;
            if self.is_complete() {
                return true;
            }
        }
        if line.starts_with(&self.marker) {
            self.state = ParseState::AwaitingPayload;
        }
        false
    }
}

/// Decode up to `count` payloads of `event` from an incremental byte stream.
///
/// The result is invariant under re-chunking: any cut points in the same
/// byte sequence produce the same payload list, including cuts inside a
/// multi-byte character (the incomplete tail is carried into the next
/// chunk). A stream that ends before `count` matches returns the matches
/// found so far — short reads are not an error. A chunk-level read failure
/// is [`ClientError::StreamUnreadable`].
pub async fn decode_event_stream<S, B, E>(
    mut stream: S,
    event: &str,
    count: usize,
) -> Result<Vec<String>, ClientError>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let mut decoder = SseDecoder::new(event, count);
    let mut pending: Vec<u8> = Vec::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| ClientError::StreamUnreadable(e.to_string()))?;
        tracing::trace!(bytes = chunk.as_ref().len(), "event stream chunk");
        pending.extend_from_slice(chunk.as_ref());
        let text = take_decodable(&mut pending);
        if decoder.feed(&text) {
            break;
        }
    }
    // An incomplete trailing sequence left in `pending` belongs to an
    // unterminated line, which is never a payload.
    Ok(decoder.into_payloads())
}

/// Decode the longest UTF-8 prefix of `pending`, leaving an incomplete
/// trailing sequence (at most 3 bytes) in place for the next chunk.
/// Invalid byte sequences in the interior decode to the replacement
/// character, as in lossy decoding.
fn take_decodable(pending: &mut Vec<u8>) -> String {
    let mut text = String::new();
    let mut rest: &[u8] = pending;
    loop {
        match std::str::from_utf8(rest) {
            Ok(s) => {
                text.push_str(s);
                rest = &[];
                break;
            }
            Err(e) => {
                let (valid, after) = rest.split_at(e.valid_up_to());
                text.push_str(std::str::from_utf8(valid).unwrap_or_default());
                match e.error_len() {
                    Some(len) => {
                        text.push(char::REPLACEMENT_CHARACTER);
                        rest = &after[len..];
                    }
                    None => {
                        rest = after;
                        break;
                    }
                }
            }
        }
    }
    let tail = rest.to_vec();
    *pending = tail;
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use std::convert::Infallible;

    fn byte_stream(
        chunks: Vec<&str>,
    ) -> impl Stream<Item = Result<Vec<u8>, Infallible>> + Unpin {
        stream::iter(
            chunks
                .into_iter()
                .map(|c| Ok(c.as_bytes().to_vec()))
                .collect::<Vec<_>>(),
        )
    }

    const TRANSCRIPT: &str = "event: metric\ndata: {\"replica\":\"r1\"}\n\nevent: heartbeat\ndata: ping\n\nevent: metric\ndata: {\"replica\":\"r2\"}\n\nevent: metric\ndata: garbage-json\n\n";

    #[tokio::test]
    async fn extracts_payloads_in_order() {
        let s = byte_stream(vec![TRANSCRIPT]);
        let events = decode_event_stream(s, "metric", 3).await.unwrap();
        assert_eq!(
            events,
            vec!["{\"replica\":\"r1\"}", "{\"replica\":\"r2\"}", "garbage-json"]
        );
    }

    #[tokio::test]
    async fn invariant_under_rechunking() {
        let expected = {
            let s = byte_stream(vec![TRANSCRIPT]);
            decode_event_stream(s, "metric", 3).await.unwrap()
        };
        // Cut the transcript at every possible boundary.
        for cut in 1..TRANSCRIPT.len() {
            let (a, b) = TRANSCRIPT.split_at(cut);
            let s = byte_stream(vec![a, b]);
            let events = decode_event_stream(s, "metric", 3).await.unwrap();
            assert_eq!(events, expected, "mismatch at cut {cut}");
        }
        // Byte-at-a-time delivery.
        let tiny: Vec<&str> = (0..TRANSCRIPT.len())
            .map(|i| &TRANSCRIPT[i..i + 1])
            .collect();
        let events = decode_event_stream(byte_stream(tiny), "metric", 3)
            .await
            .unwrap();
        assert_eq!(events, expected);
    }

    #[tokio::test]
    async fn short_stream_returns_partial_matches() {
        let s = byte_stream(vec!["event: metric\ndata: one\n\n"]);
        let events = decode_event_stream(s, "metric", 5).await.unwrap();
        assert_eq!(events, vec!["one"]);
    }

    #[tokio::test]
    async fn empty_stream_returns_no_matches() {
        let s = byte_stream(vec![]);
        let events = decode_event_stream(s, "metric", 1).await.unwrap();
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn ignores_other_event_names() {
        let s = byte_stream(vec![
            "event: other\ndata: nope\nevent: complete\ndata: yes\nevent: other2\ndata: nope2\n",
        ]);
        let events = decode_event_stream(s, "complete", 3).await.unwrap();
        assert_eq!(events, vec!["yes"]);
    }

    #[tokio::test]
    async fn stops_reading_once_count_reached() {
        // Second chunk would panic if polled: reaching the count must end
        // the read loop before the stream is exhausted.
        let first: Result<Vec<u8>, Infallible> = Ok(b"event: complete\ndata: done\n".to_vec());
        let rest = stream::once(async { panic!("stream polled past completion") });
        let s = Box::pin(stream::iter(vec![first]).chain(rest));
        let events: Vec<String> = decode_event_stream(s, "complete", 1).await.unwrap();
        assert_eq!(events, vec!["done"]);
    }

    #[tokio::test]
    async fn marker_at_end_of_stream_yields_nothing() {
        let s = byte_stream(vec!["event: metric\n"]);
        let events = decode_event_stream(s, "metric", 1).await.unwrap();
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn unterminated_trailing_line_is_dropped() {
        let s = byte_stream(vec!["event: metric\ndata: no-newline"]);
        let events = decode_event_stream(s, "metric", 1).await.unwrap();
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn multibyte_chars_survive_any_chunk_split() {
        let transcript = "event: metric\ndata: caf\u{e9} \u{1f600}\n\n".as_bytes();
        for cut in 1..transcript.len() {
            let chunks: Vec<Result<Vec<u8>, Infallible>> =
                vec![Ok(transcript[..cut].to_vec()), Ok(transcript[cut..].to_vec())];
            let events = decode_event_stream(stream::iter(chunks), "metric", 1)
                .await
                .unwrap();
            assert_eq!(events, vec!["caf\u{e9} \u{1f600}"], "mismatch at cut {cut}");
        }
    }

    #[tokio::test]
    async fn invalid_interior_bytes_decode_lossily() {
        let mut transcript = b"event: metric\ndata: a".to_vec();
        transcript.push(0xff);
        transcript.extend_from_slice(b"b\n");
        let chunks: Vec<Result<Vec<u8>, Infallible>> = vec![Ok(transcript)];
        let events = decode_event_stream(stream::iter(chunks), "metric", 1)
            .await
            .unwrap();
        assert_eq!(events, vec!["a\u{fffd}b"]);
    }

    #[test]
    fn take_decodable_holds_back_incomplete_tail() {
        let euro = "\u{20ac}".as_bytes(); // 3 bytes
        let mut pending = b"ok".to_vec();
        pending.extend_from_slice(&euro[..2]);
        assert_eq!(take_decodable(&mut pending), "ok");
        assert_eq!(pending, &euro[..2]);
        pending.push(euro[2]);
        assert_eq!(take_decodable(&mut pending), "\u{20ac}");
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn zero_byte_chunks_are_harmless() {
        let s = byte_stream(vec!["", "event: metric\n", "", "data: ok\n", ""]);
        let events = decode_event_stream(s, "metric", 1).await.unwrap();
        assert_eq!(events, vec!["ok"]);
    }

    #[tokio::test]
    async fn chunk_error_is_stream_unreadable() {
        let s = Box::pin(stream::iter(vec![
            Ok::<Vec<u8>, String>(b"event: metric\n".to_vec()),
            Err("connection reset".to_string()),
        ]));
        let err = decode_event_stream(s, "metric", 1).await.unwrap_err();
        assert!(matches!(err, ClientError::StreamUnreadable(_)));
    }

    #[test]
    fn short_data_line_yields_empty_payload() {
        let mut dec = SseDecoder::new("metric", 1);
        assert!(dec.feed("event: metric\ndat\n"));
        assert_eq!(dec.into_payloads(), vec![""]);
    }

    #[test]
    fn feed_reports_completion_exactly_once_reached() {
        let mut dec = SseDecoder::new("metric", 2);
        assert!(!dec.feed("event: metric\ndata: a\n"));
        assert!(!dec.feed("event: metric\n"));
        assert!(dec.feed("data: b\nevent: metric\ndata: ignored\n"));
        assert_eq!(dec.into_payloads(), vec!["a", "b"]);
    }
}
