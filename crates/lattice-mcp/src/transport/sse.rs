//! SSE Wire Format
//!
//! Incremental `text/event-stream` parsing shared by the Streamable HTTP
//! client and the legacy SSE transport. Parsing follows the event-stream
//! grammar strictly: fields split on the first `:`, exactly **one** leading
//! space after it is stripped (a regex with insignificant whitespace would
//! over-strip), multiple `data:` lines join with `\n`, and a blank line
//! dispatches the accumulated event.

// Layer 1: Standard library imports
use std::time::Duration;

/// One parsed server-sent event
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SseEvent {
    /// `id:` field, if present
    pub id: Option<String>,
    /// `event:` field (`None` means the default `message` type)
    pub event: Option<String>,
    /// Joined `data:` lines
    pub data: String,
    /// `retry:` field, parsed to a reconnect delay
    pub retry: Option<Duration>,
}

impl SseEvent {
    /// Whether this event carries a JSON-RPC message payload
    pub fn is_message(&self) -> bool {
        !self.data.is_empty()
            && matches!(self.event.as_deref(), None | Some("message"))
    }
}

/// Incremental event-stream parser
///
/// Feed raw chunks; complete events come back in order. Chunk boundaries are
/// irrelevant: a field split across reads parses identically.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: String,
    id: Option<String>,
    event: Option<String>,
    data_lines: Vec<String>,
    retry: Option<Duration>,
}

impl SseParser {
    /// Fresh parser
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a chunk, returning every event completed by it
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));
        let mut events = Vec::new();

        while let Some(newline) = self.buffer.find('\n') {
            let mut line = self.buffer[..newline].to_string();
            self.buffer.drain(..=newline);
            if line.ends_with('\r') {
                line.pop();
            }

            if line.is_empty() {
                if let Some(event) = self.dispatch() {
                    events.push(event);
                }
                continue;
            }
            self.process_field(&line);
        }

        events
    }

    fn process_field(&mut self, line: &str) {
        // Lines starting with ':' are comments.
        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value),
            None => (line, ""),
        };
        // Strip exactly one leading space after the colon.
        let value = value.strip_prefix(' ').unwrap_or(value);

        match field {
            "id" => self.id = Some(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            "data" => self.data_lines.push(value.to_string()),
            "retry" => {
                if let Ok(ms) = value.parse::<u64>() {
                    self.retry = Some(Duration::from_millis(ms));
                }
            }
            _ => {}
        }
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        if self.id.is_none()
            && self.event.is_none()
            && self.data_lines.is_empty()
            && self.retry.is_none()
        {
            return None;
        }

        let event = SseEvent {
            id: self.id.take(),
            event: self.event.take(),
            data: self.data_lines.join("\n"),
            retry: self.retry.take(),
        };
        self.data_lines.clear();
        Some(event)
    }
}

/// Parse a `Last-Event-ID` of the form `<streamId>:<seq>`
pub fn parse_event_id(value: &str) -> Option<(String, u64)> {
    let (stream_id, seq) = value.rsplit_once(':')?;
    if stream_id.is_empty() {
        return None;
    }
    let seq = seq.parse::<u64>().ok()?;
    Some((stream_id.to_string(), seq))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_event() {
        let mut parser = SseParser::new();
        let events = parser.feed(b"id: s1:1\ndata: {\"x\":1}\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id.as_deref(), Some("s1:1"));
        assert_eq!(events[0].data, "{\"x\":1}");
        assert!(events[0].is_message());
    }

    #[test]
    fn test_exactly_one_leading_space_stripped() {
        let mut parser = SseParser::new();
        let events = parser.feed(b"data:  two spaces\ndata:none\n\n");
        assert_eq!(events[0].data, " two spaces\nnone");
    }

    #[test]
    fn test_multi_line_data_joined() {
        let mut parser = SseParser::new();
        let events = parser.feed(b"data: line1\ndata: line2\n\n");
        assert_eq!(events[0].data, "line1\nline2");
    }

    #[test]
    fn test_chunk_boundaries_irrelevant() {
        let mut parser = SseParser::new();
        let mut events = Vec::new();
        for chunk in [&b"da"[..], b"ta: hel", b"lo\n", b"\n"] {
            events.extend(parser.feed(chunk));
        }
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "hello");
    }

    #[test]
    fn test_crlf_line_endings() {
        let mut parser = SseParser::new();
        let events = parser.feed(b"event: endpoint\r\ndata: /messages\r\n\r\n");
        assert_eq!(events[0].event.as_deref(), Some("endpoint"));
        assert_eq!(events[0].data, "/messages");
        assert!(!events[0].is_message());
    }

    #[test]
    fn test_comments_ignored() {
        let mut parser = SseParser::new();
        let events = parser.feed(b": keep-alive\n\ndata: x\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "x");
    }

    #[test]
    fn test_retry_field() {
        let mut parser = SseParser::new();
        let events = parser.feed(b"retry: 5000\ndata: x\n\n");
        assert_eq!(events[0].retry, Some(Duration::from_millis(5000)));
    }

    #[test]
    fn test_named_event_is_not_a_message() {
        let mut parser = SseParser::new();
        let events = parser.feed(b"event: ping\ndata: {}\n\n");
        assert!(!events[0].is_message());
    }

    #[test]
    fn test_parse_event_id() {
        assert_eq!(parse_event_id("abc:7"), Some(("abc".to_string(), 7)));
        // Stream ids may themselves contain ':'; the seq is after the last.
        assert_eq!(parse_event_id("a:b:3"), Some(("a:b".to_string(), 3)));
        assert_eq!(parse_event_id("no-seq"), None);
        assert_eq!(parse_event_id(":5"), None);
        assert_eq!(parse_event_id("s:x"), None);
    }
}
