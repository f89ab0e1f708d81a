//! Poll ranking repository: ranked ballots and their Borda aggregate.

use std::collections::HashSet;
use std::sync::Arc;

use crate::entities::{PollRanking, poll_option, poll_ranking};
use crate::repositories::poll::{load_options, lock_poll};
use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbBackend, EntityTrait, FromQueryResult, QueryFilter,
    QueryOrder, QuerySelect, Set, Statement, TransactionTrait, sea_query::Expr,
};
use toggo_common::{AppError, AppResult};
use uuid::Uuid;

/// One `(option, position)` pair of a submitted ballot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankEntry {
    pub option_id: Uuid,
    pub rank_position: i32,
}

/// Per-option Borda aggregate, ordered by score then insertion order.
#[derive(Debug, Clone, PartialEq, FromQueryResult)]
pub struct OptionScore {
    pub option_id: Uuid,
    pub name: String,
    pub option_type: poll_option::OptionType,
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub position: i32,
    pub borda_score: i64,
    pub average_rank: f64,
    pub vote_count: i64,
}

/// Whether a trip member has a ballot on a poll.
#[derive(Debug, Clone, PartialEq, Eq, FromQueryResult)]
pub struct VoterStatus {
    pub user_id: Uuid,
    pub username: String,
    pub has_voted: bool,
}

#[derive(Debug, FromQueryResult)]
struct VoterCount {
    total_voters: i64,
}

/// Poll ranking repository for database operations.
#[derive(Clone)]
pub struct PollRankingRepository {
    db: Arc<DatabaseConnection>,
}

impl PollRankingRepository {
    /// Create a new poll ranking repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Replace the user's ranked ballot.
    ///
    /// The ballot must name exactly the poll's current options; a ballot built
    /// against an option set that changed concurrently is a conflict.
    pub async fn submit_ranking(
        &self,
        poll_id: Uuid,
        user_id: Uuid,
        entries: &[RankEntry],
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        lock_poll(&txn, poll_id).await?;

        let current: HashSet<Uuid> = load_options(&txn, poll_id)
            .await?
            .into_iter()
            .map(|o| o.id)
            .collect();
        let submitted: HashSet<Uuid> = entries.iter().map(|e| e.option_id).collect();
        if current != submitted || entries.len() != current.len() {
            return Err(AppError::Conflict(
                "poll options changed; reload and resubmit".to_string(),
            ));
        }

        PollRanking::delete_many()
            .filter(poll_ranking::Column::PollId.eq(poll_id))
            .filter(poll_ranking::Column::UserId.eq(user_id))
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if !entries.is_empty() {
            let created_at = now.fixed_offset();
            let rows = entries.iter().map(|entry| poll_ranking::ActiveModel {
                poll_id: Set(poll_id),
                user_id: Set(user_id),
                option_id: Set(entry.option_id),
                rank_position: Set(entry.rank_position),
                created_at: Set(created_at),
            });

            PollRanking::insert_many(rows)
                .exec_without_returning(&txn)
                .await
                .map_err(AppError::from)?;
        }

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        tracing::debug!(poll_id = %poll_id, user_id = %user_id, "Replaced ranked ballot");
        Ok(())
    }

    /// Borda score, average rank and voter count for every option of a poll.
    ///
    /// With `K` options a ballot awards `K - rank + 1` points. Unranked options
    /// score 0 with average rank 0.
    pub async fn aggregate_ranking_results(&self, poll_id: Uuid) -> AppResult<Vec<OptionScore>> {
        OptionScore::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Postgres,
            r"
            WITH k AS (
                SELECT COUNT(*)::BIGINT AS option_count
                FROM poll_options
                WHERE poll_id = $1
            )
            SELECT
                o.id AS option_id,
                o.name,
                o.option_type,
                o.entity_type,
                o.entity_id,
                o.position,
                COALESCE(SUM(k.option_count - r.rank_position + 1), 0)::BIGINT AS borda_score,
                COALESCE(AVG(r.rank_position), 0)::FLOAT8 AS average_rank,
                COUNT(DISTINCT r.user_id)::BIGINT AS vote_count
            FROM poll_options o
            CROSS JOIN k
            LEFT JOIN poll_rankings r
                ON r.option_id = o.id AND r.poll_id = o.poll_id
            WHERE o.poll_id = $1
            GROUP BY o.id, o.name, o.option_type, o.entity_type, o.entity_id, o.position
            ORDER BY borda_score DESC, o.position ASC, o.id ASC
            ",
            [poll_id.into()],
        ))
        .all(self.db.as_ref())
        .await
        .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Distinct users with a ranked ballot on the poll.
    pub async fn count_voters(&self, poll_id: Uuid) -> AppResult<u64> {
        let row = PollRanking::find()
            .select_only()
            .column_as(
                Expr::cust("COUNT(DISTINCT \"poll_rankings\".\"user_id\")"),
                "total_voters",
            )
            .filter(poll_ranking::Column::PollId.eq(poll_id))
            .into_model::<VoterCount>()
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(row.map_or(0, |r| r.total_voters.max(0) as u64))
    }

    /// The user's ballot ordered by position; empty when none was submitted.
    pub async fn find_by_poll_and_user(
        &self,
        poll_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<Vec<poll_ranking::Model>> {
        PollRanking::find()
            .filter(poll_ranking::Column::PollId.eq(poll_id))
            .filter(poll_ranking::Column::UserId.eq(user_id))
            .order_by_asc(poll_ranking::Column::RankPosition)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Every trip member with whether they hold a ballot on the poll.
    ///
    /// Members who voted come first, then alphabetical by username.
    pub async fn get_voter_status(&self, poll_id: Uuid, trip_id: Uuid) -> AppResult<Vec<VoterStatus>> {
        VoterStatus::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Postgres,
            r"
            SELECT
                u.id AS user_id,
                u.username,
                (
                    EXISTS (
                        SELECT 1 FROM poll_rankings r
                        WHERE r.poll_id = $1 AND r.user_id = m.user_id
                    )
                    OR EXISTS (
                        SELECT 1 FROM poll_votes v
                        WHERE v.poll_id = $1 AND v.user_id = m.user_id
                    )
                ) AS has_voted
            FROM memberships m
            JOIN users u ON u.id = m.user_id
            WHERE m.trip_id = $2
            ORDER BY has_voted DESC, u.username ASC
            ",
            [poll_id.into(), trip_id.into()],
        ))
        .all(self.db.as_ref())
        .await
        .map_err(|e| AppError::Database(e.to_string()))
    }
}
