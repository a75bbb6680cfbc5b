//! Pagination cursor reduction.
//!
//! The server hands back a full next-page URL rather than a bare cursor. The
//! client keeps that URL and, on the next fetch, lifts its `offset=<digits>`
//! parameter back out. It never recomputes the offset itself, so it does not
//! need to know the page size.

use serde::Serialize;

use crate::error::Error;

const OFFSET_PARAM: &str = "offset=";

/// Query parameters for the next page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OffsetQuery {
    pub offset: u64,
}

impl OffsetQuery {
    pub fn to_query_string(&self) -> String {
        format!("offset={}", self.offset)
    }
}

/// Strict form: the first `offset=<digits>` in the cursor, or `MalformedCursor`.
pub fn parse_cursor(cursor: &str) -> Result<OffsetQuery, Error> {
    for (start, _) in cursor.match_indices(OFFSET_PARAM) {
        let rest = &cursor[start + OFFSET_PARAM.len()..];
        let end = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        if end == 0 {
            continue;
        }
        if let Ok(offset) = rest[..end].parse() {
            return Ok(OffsetQuery { offset });
        }
    }
    Err(Error::MalformedCursor {
        cursor: cursor.to_string(),
    })
}

/// Lenient form used by the finders.
///
/// `None` means "no further pages": either there is no cursor, or the cursor
/// carries no usable offset. The second case is logged, since it usually
/// means the server changed its pagination format.
pub fn reduce_cursor_to_query(cursor: Option<&str>) -> Option<OffsetQuery> {
    let cursor = cursor.filter(|c| !c.is_empty())?;
    match parse_cursor(cursor) {
        Ok(query) => Some(query),
        Err(err) => {
            tracing::warn!(%err, "treating unparsable cursor as the last page");
            None
        }
    }
}
