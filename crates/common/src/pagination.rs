//! Keyset pagination over `(created_at DESC, id DESC)`.

use base64::{Engine as _, engine::general_purpose::URL_SAFE};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppError, AppResult};

/// Smallest accepted page size.
pub const MIN_LIMIT: u64 = 1;

/// Position of the last row emitted on a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub created_at: DateTime<Utc>,
    pub id: Uuid,
}

impl Cursor {
    #[must_use]
    pub const fn new(created_at: DateTime<Utc>, id: Uuid) -> Self {
        Self { created_at, id }
    }

    /// Encode as an opaque URL-safe token.
    #[must_use]
    pub fn encode(&self) -> String {
        // Serializing two plain fields cannot fail.
        let payload = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE.encode(payload)
    }

    /// Decode a token produced by [`Cursor::encode`].
    ///
    /// Older clients still send `"<rfc3339>|<uuid>"`; that form is accepted too.
    pub fn decode(token: &str) -> AppResult<Self> {
        if let Some(cursor) = URL_SAFE
            .decode(token)
            .ok()
            .and_then(|bytes| serde_json::from_slice::<Self>(&bytes).ok())
        {
            return Ok(cursor);
        }

        Self::decode_legacy(token).ok_or_else(|| AppError::BadRequest("invalid cursor".to_string()))
    }

    fn decode_legacy(token: &str) -> Option<Self> {
        let (created_at, id) = token.split_once('|')?;
        let created_at = DateTime::parse_from_rfc3339(created_at)
            .ok()?
            .with_timezone(&Utc);
        let id = Uuid::parse_str(id).ok()?;
        Some(Self { created_at, id })
    }
}

/// Parse an optional cursor query parameter. Empty strings mean "first page".
pub fn parse_cursor(token: Option<&str>) -> AppResult<Option<Cursor>> {
    match token {
        None | Some("") => Ok(None),
        Some(token) => Cursor::decode(token).map(Some),
    }
}

/// Clamp a requested page size into `[1, max]`, using `default` when absent.
#[must_use]
pub fn clamp_limit(requested: Option<u64>, default: u64, max: u64) -> u64 {
    requested.unwrap_or(default).clamp(MIN_LIMIT, max.max(MIN_LIMIT))
}

/// One page of results.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
    pub limit: u64,
}

impl<T> Page<T> {
    /// Build a page from `limit + 1` fetched rows.
    ///
    /// When the extra row is present it is dropped and the key of the last kept
    /// row becomes the next cursor.
    pub fn from_overfetch<F>(mut rows: Vec<T>, limit: u64, key: F) -> Self
    where
        F: Fn(&T) -> Cursor,
    {
        let limit_usize = usize::try_from(limit).unwrap_or(usize::MAX);
        let next_cursor = if rows.len() > limit_usize {
            rows.truncate(limit_usize);
            rows.last().map(|row| key(row).encode())
        } else {
            None
        };

        Self {
            items: rows,
            next_cursor,
            limit,
        }
    }

    /// Transform every item while keeping the cursor.
    pub fn map<U, F>(self, f: F) -> Page<U>
    where
        F: FnMut(T) -> U,
    {
        Page {
            items: self.items.into_iter().map(f).collect(),
            next_cursor: self.next_cursor,
            limit: self.limit,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn sample() -> Cursor {
        Cursor::new(
            Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap(),
            Uuid::parse_str("0195a0d3-7c8e-7b3a-9f00-1234567890ab").unwrap(),
        )
    }

    #[test]
    fn test_encoded_cursor_is_opaque_and_decodes() {
        let cursor = sample();
        let token = cursor.encode();
        assert!(!token.contains('|'));
        assert_eq!(Cursor::decode(&token).unwrap(), cursor);
    }

    #[test]
    fn test_legacy_pipe_cursor() {
        let token = "2025-03-14T09:26:53Z|0195a0d3-7c8e-7b3a-9f00-1234567890ab";
        assert_eq!(Cursor::decode(token).unwrap(), sample());
    }

    #[test]
    fn test_garbage_cursor_is_bad_request() {
        for token in ["%%%", "bm90IGpzb24=", "2025-03-14|nope", "yesterday|0195a0d3-7c8e-7b3a-9f00-1234567890ab"] {
            let err = Cursor::decode(token).unwrap_err();
            assert!(matches!(err, AppError::BadRequest(_)), "token {token}");
        }
    }

    #[test]
    fn test_parse_cursor_empty_means_first_page() {
        assert!(parse_cursor(None).unwrap().is_none());
        assert!(parse_cursor(Some("")).unwrap().is_none());
    }

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(None, 20, 100), 20);
        assert_eq!(clamp_limit(Some(0), 20, 100), 1);
        assert_eq!(clamp_limit(Some(500), 20, 100), 100);
        assert_eq!(clamp_limit(Some(42), 20, 100), 42);
    }

    #[test]
    fn test_page_from_overfetch() {
        let base = sample();
        let rows: Vec<Cursor> = (0..4)
            .map(|i| Cursor::new(base.created_at - Duration::minutes(i), Uuid::new_v4()))
            .collect();

        let page = Page::from_overfetch(rows.clone(), 3, |c| *c);
        assert_eq!(page.items.len(), 3);
        let next = Cursor::decode(page.next_cursor.as_deref().unwrap()).unwrap();
        assert_eq!(next, rows[2]);

        let last = Page::from_overfetch(rows[..2].to_vec(), 3, |c| *c);
        assert_eq!(last.items.len(), 2);
        assert!(last.next_cursor.is_none());
    }
}
