//! Trip membership gate.
//!
//! Every poll operation resolves the caller's role in the owning trip first.
//! Non-members get `NotFound` so that poll existence never leaks outside a trip.

use std::sync::Arc;

use async_trait::async_trait;
use toggo_common::{AppError, AppResult};
use toggo_db::repositories::MembershipRepository;
use uuid::Uuid;

/// Role of a member within a trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TripRole {
    Member,
    Admin,
}

impl TripRole {
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

/// Membership oracle consulted before any poll operation.
#[async_trait]
pub trait TripAccess: Send + Sync {
    /// The user's role in the trip, or `None` when not a member.
    async fn role(&self, trip_id: Uuid, user_id: Uuid) -> AppResult<Option<TripRole>>;

    /// Number of members of the trip at read time.
    async fn member_count(&self, trip_id: Uuid) -> AppResult<u64>;

    /// Resolve the role, treating non-members as if the trip did not exist.
    async fn require_member(&self, trip_id: Uuid, user_id: Uuid) -> AppResult<TripRole> {
        self.role(trip_id, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Trip not found: {trip_id}")))
    }
}

/// Shared handle to the membership oracle.
pub type TripAccessService = Arc<dyn TripAccess>;

#[async_trait]
impl TripAccess for MembershipRepository {
    async fn role(&self, trip_id: Uuid, user_id: Uuid) -> AppResult<Option<TripRole>> {
        Ok(self.find(trip_id, user_id).await?.map(|m| {
            if m.is_admin {
                TripRole::Admin
            } else {
                TripRole::Member
            }
        }))
    }

    async fn member_count(&self, trip_id: Uuid) -> AppResult<u64> {
        self.count_members(trip_id).await
    }
}
