//! ID generation utilities.

use uuid::Uuid;

/// ID generator for entities.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    _private: (),
}

impl IdGenerator {
    /// Create a new ID generator.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }

    /// Generate a new UUID v7.
    ///
    /// UUID v7 is time-ordered, which keeps B-tree inserts on primary keys local.
    #[must_use]
    pub fn generate(&self) -> Uuid {
        Uuid::now_v7()
    }
}

/// Parse a path or body identifier, reporting the offending field on failure.
pub fn parse_uuid(field: &str, raw: &str) -> crate::AppResult<Uuid> {
    Uuid::parse_str(raw)
        .map_err(|_| crate::AppError::BadRequest(format!("invalid UUID for {field}: {raw}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_uuid_v7() {
        let id_gen = IdGenerator::new();
        let id1 = id_gen.generate();
        let id2 = id_gen.generate();

        assert_ne!(id1, id2);
        assert_eq!(id1.get_version_num(), 7);
    }

    #[test]
    fn test_parse_uuid() {
        let id = Uuid::new_v4();
        assert_eq!(parse_uuid("poll_id", &id.to_string()).unwrap(), id);

        let err = parse_uuid("poll_id", "not-a-uuid").unwrap_err();
        assert!(err.to_string().contains("poll_id"));
    }
}
