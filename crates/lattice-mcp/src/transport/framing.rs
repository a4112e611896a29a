//! LSP-style Content-Length Framing
//!
//! Incremental parser and encoder for the stdio wire format:
//!
//! ```text
//! Content-Length: <N>\r\n
//! \r\n
//! <exactly N bytes of UTF-8 JSON>
//! ```
//!
//! The parser accumulates arbitrary chunks and yields complete payloads in
//! order. `Content-Length` counts **bytes, not characters**; the header block
//! terminator may be `\r\n\r\n` or the lenient `\n\n`; unknown headers are
//! ignored. A payload that later fails JSON decoding has already been
//! consumed here, so one bad message never desynchronizes the stream.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use bytes::{Bytes, BytesMut};

// Layer 3: Internal module imports
use super::TransportError;
use crate::protocol::constants::defaults;

/// Encode one payload into a framed message
///
/// # Examples
///
/// ```rust
/// use lattice_mcp::transport::encode_frame;
///
/// let frame = encode_frame(br#"{"jsonrpc":"2.0","method":"ping"}"#);
/// assert!(frame.starts_with(b"Content-Length: 33\r\n\r\n"));
/// ```
pub fn encode_frame(payload: &[u8]) -> BytesMut {
    let header = format!("Content-Length: {}\r\n\r\n", payload.len());
    let mut frame = BytesMut::with_capacity(header.len() + payload.len());
    frame.extend_from_slice(header.as_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// Incremental frame parser
///
/// Feed raw chunks with [`extend`](FrameCodec::extend), then drain complete
/// payloads with [`next_frame`](FrameCodec::next_frame) until it returns
/// `Ok(None)`. Chunk boundaries are irrelevant: a frame split across a
/// hundred reads parses identically to one delivered whole.
#[derive(Debug)]
pub struct FrameCodec {
    buffer: BytesMut,
    max_frame_size: usize,
}

impl FrameCodec {
    /// Codec with the default 1 MiB frame limit
    pub fn new() -> Self {
        Self::with_max_frame_size(defaults::MAX_MESSAGE_SIZE)
    }

    /// Codec with a custom frame limit
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(8 * 1024),
            max_frame_size,
        }
    }

    /// Append a chunk of raw bytes
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::BufferOverflow`] when the accumulated
    /// unparsed data exceeds the frame limit plus header allowance.
    pub fn extend(&mut self, chunk: &[u8]) -> Result<(), TransportError> {
        // Allow one maximal frame plus a small header allowance to sit in the
        // buffer before declaring the peer misbehaved.
        if self.buffer.len() + chunk.len() > self.max_frame_size + 1024 {
            return Err(TransportError::buffer_overflow(format!(
                "framing buffer exceeds limit {}",
                self.max_frame_size
            )));
        }
        self.buffer.extend_from_slice(chunk);
        Ok(())
    }

    /// Extract the next complete payload, if one is buffered
    ///
    /// # Errors
    ///
    /// - [`TransportError::Format`] when a header block lacks a parseable
    ///   `Content-Length` (the block is consumed, the stream continues)
    /// - [`TransportError::BufferOverflow`] when a frame declares a length
    ///   over the limit (unrecoverable: the payload cannot be skipped safely)
    pub fn next_frame(&mut self) -> Result<Option<Bytes>, TransportError> {
        let (header_end, header_len) = match self.find_header_block() {
            Some(found) => found,
            None => return Ok(None),
        };

        let content_length = match parse_content_length(&self.buffer[..header_end]) {
            Some(n) => n,
            None => {
                // Drop the malformed header block and keep scanning from the
                // payload-free position.
                let _ = self.buffer.split_to(header_end + header_len);
                return Err(TransportError::format(
                    "header block without a valid Content-Length",
                ));
            }
        };

        if content_length > self.max_frame_size {
            return Err(TransportError::buffer_overflow(format!(
                "declared frame size {} exceeds limit {}",
                content_length, self.max_frame_size
            )));
        }

        let frame_end = header_end + header_len + content_length;
        if self.buffer.len() < frame_end {
            return Ok(None);
        }

        let _ = self.buffer.split_to(header_end + header_len);
        Ok(Some(self.buffer.split_to(content_length).freeze()))
    }

    /// Locate the header terminator: `(offset, terminator_len)` for the
    /// earlier of `\r\n\r\n` and `\n\n`.
    fn find_header_block(&self) -> Option<(usize, usize)> {
        let crlf = find_subsequence(&self.buffer, b"\r\n\r\n").map(|i| (i, 4));
        let lf = find_subsequence(&self.buffer, b"\n\n").map(|i| (i, 2));
        match (crlf, lf) {
            (Some((a, al)), Some((b, bl))) => {
                if a <= b {
                    Some((a, al))
                } else {
                    Some((b, bl))
                }
            }
            (found, None) | (None, found) => found,
        }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Parse `Content-Length` out of a header block, ignoring unknown headers.
fn parse_content_length(block: &[u8]) -> Option<usize> {
    let text = std::str::from_utf8(block).ok()?;
    for line in text.split(['\r', '\n']).filter(|l| !l.is_empty()) {
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                return value.trim().parse::<usize>().ok();
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn drain(codec: &mut FrameCodec) -> Vec<Bytes> {
        let mut frames = Vec::new();
        while let Ok(Some(frame)) = codec.next_frame() {
            frames.push(frame);
        }
        frames
    }

    #[test]
    fn test_single_frame_round_trip() {
        let payload = br#"{"jsonrpc":"2.0","method":"ping","id":1}"#;
        let mut codec = FrameCodec::new();
        codec.extend(&encode_frame(payload)).unwrap();

        let frame = codec.next_frame().unwrap().unwrap();
        assert_eq!(&frame[..], payload);
        assert!(codec.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_content_length_counts_bytes_not_chars() {
        // Multi-byte UTF-8: "héllo" is 6 bytes, 5 characters.
        let payload = r#"{"x":"héllo"}"#.as_bytes();
        let frame = encode_frame(payload);
        assert!(frame.starts_with(format!("Content-Length: {}\r\n\r\n", payload.len()).as_bytes()));

        let mut codec = FrameCodec::new();
        codec.extend(&frame).unwrap();
        assert_eq!(&codec.next_frame().unwrap().unwrap()[..], payload);
    }

    #[test]
    fn test_incremental_delivery_byte_by_byte() {
        let payload = br#"{"jsonrpc":"2.0","method":"x"}"#;
        let framed = encode_frame(payload);

        let mut codec = FrameCodec::new();
        for byte in framed.iter() {
            codec.extend(std::slice::from_ref(byte)).unwrap();
        }
        assert_eq!(&codec.next_frame().unwrap().unwrap()[..], &payload[..]);
    }

    #[test]
    fn test_multiple_frames_drained_in_order() {
        let mut codec = FrameCodec::new();
        let mut wire = BytesMut::new();
        for i in 0..5 {
            wire.extend_from_slice(&encode_frame(format!("{{\"id\":{i}}}").as_bytes()));
        }
        codec.extend(&wire).unwrap();

        let frames = drain(&mut codec);
        assert_eq!(frames.len(), 5);
        for (i, frame) in frames.iter().enumerate() {
            assert_eq!(&frame[..], format!("{{\"id\":{i}}}").as_bytes());
        }
    }

    #[test]
    fn test_lenient_lf_terminator() {
        let mut codec = FrameCodec::new();
        codec.extend(b"Content-Length: 2\n\n{}").unwrap();
        assert_eq!(&codec.next_frame().unwrap().unwrap()[..], b"{}");
    }

    #[test]
    fn test_unknown_headers_ignored() {
        let mut codec = FrameCodec::new();
        codec
            .extend(b"X-Custom: yes\r\nContent-Length: 2\r\nX-Other: 1\r\n\r\n{}")
            .unwrap();
        assert_eq!(&codec.next_frame().unwrap().unwrap()[..], b"{}");
    }

    #[test]
    fn test_missing_content_length_consumes_block() {
        let mut codec = FrameCodec::new();
        codec.extend(b"X-Custom: yes\r\n\r\n").unwrap();
        assert!(matches!(
            codec.next_frame(),
            Err(TransportError::Format { .. })
        ));

        // The stream recovers: a valid frame after the bad block parses.
        codec.extend(&encode_frame(b"{}")).unwrap();
        assert_eq!(&codec.next_frame().unwrap().unwrap()[..], b"{}");
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let mut codec = FrameCodec::with_max_frame_size(8);
        codec.extend(b"Content-Length: 9\r\n\r\n").unwrap();
        assert!(matches!(
            codec.next_frame(),
            Err(TransportError::BufferOverflow { .. })
        ));
    }

    #[test]
    fn test_partial_header_waits() {
        let mut codec = FrameCodec::new();
        codec.extend(b"Content-Le").unwrap();
        assert!(codec.next_frame().unwrap().is_none());
        codec.extend(b"ngth: 2\r\n\r\n{}").unwrap();
        assert_eq!(&codec.next_frame().unwrap().unwrap()[..], b"{}");
    }

    proptest! {
        /// Any message sequence, chopped at arbitrary chunk boundaries,
        /// parses back to exactly the original sequence.
        #[test]
        fn prop_round_trip_arbitrary_chunking(
            payloads in proptest::collection::vec("[ -~]{0,200}", 1..8),
            chunk_size in 1usize..64,
        ) {
            let mut wire = BytesMut::new();
            for p in &payloads {
                wire.extend_from_slice(&encode_frame(p.as_bytes()));
            }

            let mut codec = FrameCodec::new();
            let mut decoded = Vec::new();
            for chunk in wire.chunks(chunk_size) {
                codec.extend(chunk).unwrap();
                while let Some(frame) = codec.next_frame().unwrap() {
                    decoded.push(frame);
                }
            }

            prop_assert_eq!(decoded.len(), payloads.len());
            for (frame, payload) in decoded.iter().zip(&payloads) {
                prop_assert_eq!(&frame[..], payload.as_bytes());
            }
        }
    }
}
