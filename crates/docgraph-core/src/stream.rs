//! Decoder for the `/query` event stream.
//!
//! The body is a sequence of `data: <JSON>` lines. Reads from the network can
//! split a line (or a multi-byte character) anywhere, so bytes are buffered
//! until a full line is available.

use serde::Deserialize;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    /// A fragment of the answer, appended verbatim.
    Chunk(String),
    /// Supporting text the answer was generated from.
    Context(String),
}

#[derive(Deserialize)]
struct FramePayload {
    chunk: Option<String>,
    context: Option<String>,
}

#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    skipped: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one read's worth of bytes, returning every frame it completed.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<StreamFrame> {
        self.buffer.extend_from_slice(bytes);

        let mut frames = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            if let Some(frame) = self.decode_line(&line[..newline]) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Decode whatever is left once the stream has closed.
    pub fn finish(&mut self) -> Option<StreamFrame> {
        if self.buffer.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.buffer);
        self.decode_line(&line)
    }

    /// Number of frames dropped as malformed so far.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn decode_line(&mut self, raw: &[u8]) -> Option<StreamFrame> {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        let line = match std::str::from_utf8(raw) {
            Ok(line) => line,
            Err(err) => {
                warn!(error = %err, "skipping frame that is not valid UTF-8");
                self.skipped += 1;
                return None;
            }
        };

        let payload = line.strip_prefix("data:")?;
        let payload = payload.strip_prefix(' ').unwrap_or(payload);

        match serde_json::from_str::<FramePayload>(payload) {
            Ok(FramePayload { chunk: Some(chunk), .. }) => Some(StreamFrame::Chunk(chunk)),
            Ok(FramePayload { context: Some(context), .. }) => Some(StreamFrame::Context(context)),
            Ok(_) => {
                debug!(payload, "frame carries neither chunk nor context");
                self.skipped += 1;
                None
            }
            Err(err) => {
                warn!(error = %err, payload, "error parsing stream frame");
                self.skipped += 1;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(s: &str) -> StreamFrame {
        StreamFrame::Chunk(s.to_string())
    }

    #[test]
    fn test_frames_in_one_read() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.push(b"data: {\"chunk\": \"Hel\"}\n\ndata: {\"chunk\": \"lo\"}\n\n");
        assert_eq!(frames, vec![chunk("Hel"), chunk("lo")]);
    }

    #[test]
    fn test_prefix_without_space() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.push(b"data:{\"chunk\":\"Hel\"}\ndata:{\"chunk\":\"lo\"}\n");
        assert_eq!(frames, vec![chunk("Hel"), chunk("lo")]);
    }

    #[test]
    fn test_frame_split_across_reads() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(b"data: {\"chu").is_empty());
        assert!(decoder.push(b"nk\": \"Hel").is_empty());
        let frames = decoder.push(b"lo\"}\n\ndata: {\"context\": \"doc\"}\n");
        assert_eq!(
            frames,
            vec![chunk("Hello"), StreamFrame::Context("doc".to_string())]
        );
        assert_eq!(decoder.skipped(), 0);
    }

    #[test]
    fn test_multibyte_character_split_across_reads() {
        let mut decoder = FrameDecoder::new();
        let bytes = "data: {\"chunk\": \"café\"}\n".as_bytes();
        let split = bytes.len() - 4; // inside the two-byte 'é'
        assert!(decoder.push(&bytes[..split]).is_empty());
        assert_eq!(decoder.push(&bytes[split..]), vec![chunk("café")]);
    }

    #[test]
    fn test_malformed_frame_is_skipped() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.push(
            b"data: {\"chunk\": \"a\"}\ndata: {not json}\ndata: {\"other\": 1}\ndata: {\"chunk\": \"b\"}\n",
        );
        assert_eq!(frames, vec![chunk("a"), chunk("b")]);
        assert_eq!(decoder.skipped(), 2);
    }

    #[test]
    fn test_non_data_lines_are_ignored() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.push(b": keep-alive\r\nevent: message\r\ndata: {\"chunk\": \"x\"}\r\n\r\n");
        assert_eq!(frames, vec![chunk("x")]);
        assert_eq!(decoder.skipped(), 0);
    }

    #[test]
    fn test_finish_flushes_unterminated_line() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(b"data: {\"context\": \"tail\"}").is_empty());
        assert_eq!(decoder.finish(), Some(StreamFrame::Context("tail".to_string())));
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_empty_chunk_is_still_a_chunk() {
        let mut decoder = FrameDecoder::new();
        assert_eq!(decoder.push(b"data: {\"chunk\": \"\"}\n"), vec![chunk("")]);
    }
}
