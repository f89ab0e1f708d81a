//! Membership repository.

use std::sync::Arc;

use crate::entities::{Membership, membership};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter};
use toggo_common::{AppError, AppResult};
use uuid::Uuid;

/// Membership repository for database operations.
#[derive(Clone)]
pub struct MembershipRepository {
    db: Arc<DatabaseConnection>,
}

impl MembershipRepository {
    /// Create a new membership repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find the membership row of a user in a trip.
    pub async fn find(&self, trip_id: Uuid, user_id: Uuid) -> AppResult<Option<membership::Model>> {
        Membership::find_by_id((trip_id, user_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count the members of a trip.
    pub async fn count_members(&self, trip_id: Uuid) -> AppResult<u64> {
        Membership::find()
            .filter(membership::Column::TripId.eq(trip_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, Value};

    #[tokio::test]
    async fn test_find_membership() {
        let trip_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let row = membership::Model {
            trip_id,
            user_id,
            is_admin: true,
            created_at: Utc::now().into(),
        };

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[row.clone()]])
            .into_connection();
        let repo = MembershipRepository::new(Arc::new(db));

        let found = repo.find(trip_id, user_id).await.unwrap();
        assert_eq!(found, Some(row));
    }

    #[tokio::test]
    async fn test_find_membership_absent() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<membership::Model>::new()])
            .into_connection();
        let repo = MembershipRepository::new(Arc::new(db));

        let found = repo.find(Uuid::new_v4(), Uuid::new_v4()).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_count_members() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[maplit::btreemap! {
                "num_items" => Value::BigInt(Some(4)),
            }]])
            .into_connection();
        let repo = MembershipRepository::new(Arc::new(db));

        assert_eq!(repo.count_members(Uuid::new_v4()).await.unwrap(), 4);
    }
}
