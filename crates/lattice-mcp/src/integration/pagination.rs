//! Cursor Pagination
//!
//! Shared pagination for the list operations. Cursors are opaque to peers:
//! base64url (no padding) over the JSON `{"offset":N}`. Items are served in
//! registry insertion order, so concatenating pages reproduces the registry
//! exactly while nothing mutates between calls.

// Layer 2: Third-party crate imports
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
use super::error::{McpError, McpResult};

#[derive(Debug, Serialize, Deserialize)]
struct CursorPayload {
    offset: usize,
}

/// Encode an offset as an opaque cursor
pub fn encode_cursor(offset: usize) -> String {
    // CursorPayload serialization cannot fail
    #[allow(clippy::unwrap_used)]
    let json = serde_json::to_vec(&CursorPayload { offset }).unwrap();
    URL_SAFE_NO_PAD.encode(json)
}

/// Decode a cursor back to its offset
///
/// # Errors
///
/// Returns [`McpError::InvalidParams`] for anything that is not a cursor
/// this module produced.
pub fn decode_cursor(cursor: &str) -> McpResult<usize> {
    let bytes = URL_SAFE_NO_PAD
        .decode(cursor)
        .map_err(|_| McpError::invalid_params("invalid cursor"))?;
    let payload: CursorPayload =
        serde_json::from_slice(&bytes).map_err(|_| McpError::invalid_params("invalid cursor"))?;
    Ok(payload.offset)
}

/// Serve one page of `items` in insertion order.
///
/// Returns the page slice and, when more items remain, the cursor for the
/// next page.
///
/// # Errors
///
/// Returns [`McpError::InvalidParams`] for an undecodable cursor.
pub fn paginate<T: Clone>(
    items: &[T],
    cursor: Option<&str>,
    page_size: usize,
) -> McpResult<(Vec<T>, Option<String>)> {
    let offset = match cursor {
        Some(cursor) => decode_cursor(cursor)?,
        None => 0,
    };

    let end = usize::min(offset.saturating_add(page_size), items.len());
    let page = if offset >= items.len() {
        Vec::new()
    } else {
        items[offset..end].to_vec()
    };

    let next_cursor = if end < items.len() {
        Some(encode_cursor(end))
    } else {
        None
    };

    Ok((page, next_cursor))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_round_trip() {
        let cursor = encode_cursor(17);
        assert_eq!(decode_cursor(&cursor).unwrap(), 17);
    }

    #[test]
    fn test_cursor_wire_format() {
        // The exact encoding peers observe: base64url({"offset":2}).
        assert_eq!(encode_cursor(2), URL_SAFE_NO_PAD.encode(br#"{"offset":2}"#));
    }

    #[test]
    fn test_invalid_cursor_rejected() {
        assert!(decode_cursor("!!!not-base64!!!").is_err());
        assert!(decode_cursor(&URL_SAFE_NO_PAD.encode(b"not json")).is_err());
        assert!(decode_cursor(&URL_SAFE_NO_PAD.encode(br#"{"page":1}"#)).is_err());
    }

    #[test]
    fn test_pages_concatenate_to_whole_registry() {
        let items: Vec<u32> = (0..5).collect();

        let (page1, cursor1) = paginate(&items, None, 2).unwrap();
        assert_eq!(page1, vec![0, 1]);
        let cursor1 = cursor1.unwrap();
        assert_eq!(decode_cursor(&cursor1).unwrap(), 2);

        let (page2, cursor2) = paginate(&items, Some(&cursor1), 2).unwrap();
        assert_eq!(page2, vec![2, 3]);

        let (page3, cursor3) = paginate(&items, Some(&cursor2.unwrap()), 2).unwrap();
        assert_eq!(page3, vec![4]);
        assert!(cursor3.is_none());
    }

    #[test]
    fn test_exact_page_boundary_has_no_dangling_cursor() {
        let items: Vec<u32> = (0..4).collect();
        let (_, cursor) = paginate(&items, None, 2).unwrap();
        let (page, cursor) = paginate(&items, Some(&cursor.unwrap()), 2).unwrap();
        assert_eq!(page, vec![2, 3]);
        assert!(cursor.is_none());
    }

    #[test]
    fn test_offset_past_end_yields_empty_page() {
        let items: Vec<u32> = (0..3).collect();
        let cursor = encode_cursor(10);
        let (page, next) = paginate(&items, Some(&cursor), 2).unwrap();
        assert!(page.is_empty());
        assert!(next.is_none());
    }

    #[test]
    fn test_empty_registry() {
        let items: Vec<u32> = Vec::new();
        let (page, next) = paginate(&items, None, 2).unwrap();
        assert!(page.is_empty());
        assert!(next.is_none());
    }
}
