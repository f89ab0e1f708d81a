//! Poll repository.
//!
//! Polls, their options and vote rows. Every mutation touching more than one
//! row runs in a transaction that first locks the poll row, so option-count
//! guards, the has-ballots guard and ballot replacement serialize per poll.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::entities::{Poll, PollOption, PollVote, poll, poll_option, poll_vote};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbBackend,
    EntityTrait, FromQueryResult, QueryFilter, QueryOrder, QuerySelect, Set, Statement,
    TransactionTrait, sea_query::Expr,
};
use toggo_common::{AppError, AppResult, Cursor, Page, deadline_passed};
use uuid::Uuid;

/// Fewest options a poll may hold.
pub const MIN_OPTIONS: usize = 2;

/// Most options a poll may hold.
pub const MAX_OPTIONS: usize = 15;

/// A poll together with its options in insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollWithOptions {
    pub poll: poll::Model,
    pub options: Vec<poll_option::Model>,
}

/// Option data supplied by callers; the store assigns poll and position.
#[derive(Debug, Clone)]
pub struct NewPollOption {
    pub id: Uuid,
    pub option_type: poll_option::OptionType,
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub name: String,
}

/// Partial update of poll metadata.
#[derive(Debug, Clone, Default)]
pub struct PollPatch {
    pub question: Option<String>,
    pub deadline: Option<DateTime<Utc>>,
}

impl PollPatch {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.question.is_none() && self.deadline.is_none()
    }
}

/// Aggregate vote state of one poll as seen by one caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoteSummary {
    /// Vote rows per option. Options without votes are absent.
    pub option_counts: HashMap<Uuid, u64>,
    /// Options the caller currently votes for.
    pub voted: HashSet<Uuid>,
    /// Distinct users holding at least one vote row.
    pub total_voters: u64,
}

#[derive(Debug, FromQueryResult)]
struct OptionTallyRow {
    poll_id: Uuid,
    option_id: Uuid,
    vote_count: i64,
    user_voted: bool,
}

#[derive(Debug, FromQueryResult)]
struct VoterCountRow {
    poll_id: Uuid,
    total_voters: i64,
}

/// Poll repository for database operations.
#[derive(Clone)]
pub struct PollRepository {
    db: Arc<DatabaseConnection>,
}

impl PollRepository {
    /// Create a new poll repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a poll by ID.
    pub async fn find_by_id(&self, id: Uuid) -> AppResult<Option<poll::Model>> {
        Poll::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a poll by ID, returning error if not found.
    pub async fn get_by_id(&self, id: Uuid) -> AppResult<poll::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Poll not found: {id}")))
    }

    /// Get a poll and, when requested, its options.
    pub async fn find_poll(&self, id: Uuid, with_options: bool) -> AppResult<PollWithOptions> {
        let poll = self.get_by_id(id).await?;
        let options = if with_options {
            load_options(self.db.as_ref(), id).await?
        } else {
            Vec::new()
        };
        Ok(PollWithOptions { poll, options })
    }

    /// Insert a poll and its full initial option set atomically.
    ///
    /// A vote poll created without options gets `Yes` and `No`.
    pub async fn create_poll(
        &self,
        poll: poll::Model,
        mut options: Vec<NewPollOption>,
    ) -> AppResult<PollWithOptions> {
        if options.is_empty() && poll.poll_type.is_vote_poll() {
            options = ["Yes", "No"]
                .into_iter()
                .map(|name| NewPollOption {
                    id: Uuid::now_v7(),
                    option_type: poll_option::OptionType::Custom,
                    entity_type: None,
                    entity_id: None,
                    name: name.to_string(),
                })
                .collect();
        }

        if !(MIN_OPTIONS..=MAX_OPTIONS).contains(&options.len()) {
            return Err(AppError::BadRequest(format!(
                "a poll must have between {MIN_OPTIONS} and {MAX_OPTIONS} options"
            )));
        }

        let poll_id = poll.id;
        let created_at = poll.created_at;
        let rows: Vec<poll_option::ActiveModel> = options
            .into_iter()
            .enumerate()
            .map(|(position, option)| {
                option_active_model(poll_id, option, position as i32, created_at)
            })
            .collect();

        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let poll = poll::ActiveModel {
            id: Set(poll.id),
            trip_id: Set(poll.trip_id),
            created_by: Set(poll.created_by),
            question: Set(poll.question),
            poll_type: Set(poll.poll_type),
            deadline: Set(poll.deadline),
            created_at: Set(poll.created_at),
            updated_at: Set(poll.updated_at),
        }
        .insert(&txn)
        .await
        .map_err(AppError::from)?;

        PollOption::insert_many(rows)
            .exec_without_returning(&txn)
            .await
            .map_err(AppError::from)?;

        let options = load_options(&txn, poll_id).await?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        tracing::debug!(poll_id = %poll_id, options = options.len(), "Created poll");
        Ok(PollWithOptions { poll, options })
    }

    /// List polls of a trip, newest first, restricted to the given poll types.
    pub async fn list_polls_by_trip(
        &self,
        trip_id: Uuid,
        poll_types: &[poll::PollType],
        limit: u64,
        cursor: Option<Cursor>,
    ) -> AppResult<Page<PollWithOptions>> {
        let mut query = Poll::find()
            .filter(poll::Column::TripId.eq(trip_id))
            .filter(poll::Column::PollType.is_in(poll_types.iter().copied()));

        if let Some(cursor) = cursor {
            let created_at = cursor.created_at.fixed_offset();
            query = query.filter(
                Condition::any()
                    .add(poll::Column::CreatedAt.lt(created_at))
                    .add(
                        Condition::all()
                            .add(poll::Column::CreatedAt.eq(created_at))
                            .add(poll::Column::Id.lt(cursor.id)),
                    ),
            );
        }

        let polls = query
            .order_by_desc(poll::Column::CreatedAt)
            .order_by_desc(poll::Column::Id)
            .limit(limit + 1)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let page = Page::from_overfetch(polls, limit, |p| {
            Cursor::new(p.created_at.with_timezone(&Utc), p.id)
        });

        let ids: Vec<Uuid> = page.items.iter().map(|p| p.id).collect();
        let mut by_poll = self.load_options_for(&ids).await?;

        Ok(page.map(|poll| {
            let options = by_poll.remove(&poll.id).unwrap_or_default();
            PollWithOptions { poll, options }
        }))
    }

    /// Update question and/or deadline. An empty patch is rejected.
    /// The deadline is re-checked under the poll lock.
    pub async fn update_poll(
        &self,
        id: Uuid,
        patch: PollPatch,
        now: DateTime<Utc>,
    ) -> AppResult<poll::Model> {
        if patch.is_empty() {
            return Err(AppError::BadRequest(
                "at least one of question or deadline must be provided".to_string(),
            ));
        }

        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let current = lock_poll(&txn, id).await?;
        if deadline_passed(current.deadline.map(|d| d.with_timezone(&Utc)), now) {
            return Err(AppError::DeadlinePassed);
        }

        let mut model: poll::ActiveModel = current.into();
        if let Some(question) = patch.question {
            model.question = Set(question);
        }
        if let Some(deadline) = patch.deadline {
            model.deadline = Set(Some(deadline.fixed_offset()));
        }
        model.updated_at = Set(now.fixed_offset());

        let updated = model
            .update(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(updated)
    }

    /// Delete a poll, returning the removed row. Options and ballots cascade.
    pub async fn delete_poll(&self, id: Uuid) -> AppResult<poll::Model> {
        let poll = self.get_by_id(id).await?;

        let result = Poll::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!("Poll not found: {id}")));
        }
        Ok(poll)
    }

    /// Append an option while the poll has no ballots and room to grow.
    pub async fn add_option(
        &self,
        poll_id: Uuid,
        option: NewPollOption,
        max_options: usize,
        now: DateTime<Utc>,
    ) -> AppResult<poll_option::Model> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        lock_poll(&txn, poll_id).await?;
        ensure_no_ballots(&txn, poll_id).await?;

        let options = load_options(&txn, poll_id).await?;
        if options.len() >= max_options {
            return Err(AppError::MaxOptionsReached(max_options));
        }
        let position = options.iter().map(|o| o.position).max().map_or(0, |p| p + 1);

        let created = option_active_model(poll_id, option, position, now.fixed_offset())
            .insert(&txn)
            .await
            .map_err(AppError::from)?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(created)
    }

    /// Remove an option while the poll has no ballots and stays above the floor.
    pub async fn delete_option(
        &self,
        poll_id: Uuid,
        option_id: Uuid,
        min_options: usize,
    ) -> AppResult<poll_option::Model> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        lock_poll(&txn, poll_id).await?;
        ensure_no_ballots(&txn, poll_id).await?;

        let options = load_options(&txn, poll_id).await?;
        if options.len() <= min_options {
            return Err(AppError::MinOptionsRequired(min_options));
        }
        let option = options
            .into_iter()
            .find(|o| o.id == option_id)
            .ok_or_else(|| AppError::NotFound(format!("Poll option not found: {option_id}")))?;

        PollOption::delete_by_id(option_id)
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(option)
    }

    /// Replace the user's vote rows on a poll with one row per option.
    ///
    /// An empty `option_ids` withdraws the ballot. Duplicate IDs hit the
    /// composite primary key and roll the whole replacement back.
    pub async fn cast_vote(
        &self,
        poll_id: Uuid,
        user_id: Uuid,
        option_ids: &[Uuid],
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        lock_poll(&txn, poll_id).await?;

        PollVote::delete_many()
            .filter(poll_vote::Column::PollId.eq(poll_id))
            .filter(poll_vote::Column::UserId.eq(user_id))
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if !option_ids.is_empty() {
            let created_at = now.fixed_offset();
            let rows = option_ids.iter().map(|&option_id| poll_vote::ActiveModel {
                poll_id: Set(poll_id),
                option_id: Set(option_id),
                user_id: Set(user_id),
                created_at: Set(created_at),
            });

            PollVote::insert_many(rows)
                .exec_without_returning(&txn)
                .await
                .map_err(AppError::from)?;
        }

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        tracing::debug!(poll_id = %poll_id, user_id = %user_id, votes = option_ids.len(), "Replaced vote ballot");
        Ok(())
    }

    /// Vote tallies of one poll with the caller's own selections.
    pub async fn get_vote_summary(&self, poll_id: Uuid, user_id: Uuid) -> AppResult<VoteSummary> {
        let mut summaries = self.get_vote_summaries(&[poll_id], user_id).await?;
        Ok(summaries.remove(&poll_id).unwrap_or_default())
    }

    /// Vote tallies for a batch of polls in two grouped queries.
    ///
    /// Polls without any vote rows are absent from the map.
    pub async fn get_vote_summaries(
        &self,
        poll_ids: &[Uuid],
        user_id: Uuid,
    ) -> AppResult<HashMap<Uuid, VoteSummary>> {
        let mut summaries: HashMap<Uuid, VoteSummary> = HashMap::new();
        if poll_ids.is_empty() {
            return Ok(summaries);
        }

        let tallies = PollVote::find()
            .select_only()
            .column(poll_vote::Column::PollId)
            .column(poll_vote::Column::OptionId)
            .column_as(Expr::cust("COUNT(*)"), "vote_count")
            .column_as(
                Expr::cust_with_values("BOOL_OR(\"poll_votes\".\"user_id\" = $1)", [user_id]),
                "user_voted",
            )
            .filter(poll_vote::Column::PollId.is_in(poll_ids.iter().copied()))
            .group_by(poll_vote::Column::PollId)
            .group_by(poll_vote::Column::OptionId)
            .into_model::<OptionTallyRow>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        for row in tallies {
            let summary = summaries.entry(row.poll_id).or_default();
            summary
                .option_counts
                .insert(row.option_id, row.vote_count.max(0) as u64);
            if row.user_voted {
                summary.voted.insert(row.option_id);
            }
        }

        let voters = PollVote::find()
            .select_only()
            .column(poll_vote::Column::PollId)
            .column_as(
                Expr::cust("COUNT(DISTINCT \"poll_votes\".\"user_id\")"),
                "total_voters",
            )
            .filter(poll_vote::Column::PollId.is_in(poll_ids.iter().copied()))
            .group_by(poll_vote::Column::PollId)
            .into_model::<VoterCountRow>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        for row in voters {
            summaries.entry(row.poll_id).or_default().total_voters = row.total_voters.max(0) as u64;
        }

        Ok(summaries)
    }

    async fn load_options_for(
        &self,
        poll_ids: &[Uuid],
    ) -> AppResult<HashMap<Uuid, Vec<poll_option::Model>>> {
        let mut by_poll: HashMap<Uuid, Vec<poll_option::Model>> = HashMap::new();
        if poll_ids.is_empty() {
            return Ok(by_poll);
        }

        let options = PollOption::find()
            .filter(poll_option::Column::PollId.is_in(poll_ids.iter().copied()))
            .order_by_asc(poll_option::Column::Position)
            .order_by_asc(poll_option::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        for option in options {
            by_poll.entry(option.poll_id).or_default().push(option);
        }
        Ok(by_poll)
    }
}

fn option_active_model(
    poll_id: Uuid,
    option: NewPollOption,
    position: i32,
    created_at: sea_orm::prelude::DateTimeWithTimeZone,
) -> poll_option::ActiveModel {
    poll_option::ActiveModel {
        id: Set(option.id),
        poll_id: Set(poll_id),
        option_type: Set(option.option_type),
        entity_type: Set(option.entity_type),
        entity_id: Set(option.entity_id),
        name: Set(option.name),
        position: Set(position),
        created_at: Set(created_at),
    }
}

/// Options of a poll in insertion order.
pub(crate) async fn load_options<C: ConnectionTrait>(
    conn: &C,
    poll_id: Uuid,
) -> AppResult<Vec<poll_option::Model>> {
    PollOption::find()
        .filter(poll_option::Column::PollId.eq(poll_id))
        .order_by_asc(poll_option::Column::Position)
        .order_by_asc(poll_option::Column::Id)
        .all(conn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}

/// `SELECT ... FOR UPDATE` on the poll row.
pub(crate) async fn lock_poll<C: ConnectionTrait>(conn: &C, poll_id: Uuid) -> AppResult<poll::Model> {
    Poll::find_by_id(poll_id)
        .lock_exclusive()
        .one(conn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .ok_or_else(|| AppError::NotFound(format!("Poll not found: {poll_id}")))
}

/// Whether any vote or ranking row exists on the poll.
pub(crate) async fn has_ballots<C: ConnectionTrait>(conn: &C, poll_id: Uuid) -> AppResult<bool> {
    let row = conn
        .query_one(Statement::from_sql_and_values(
            DbBackend::Postgres,
            r"
            SELECT (
                EXISTS (SELECT 1 FROM poll_votes WHERE poll_id = $1)
                OR EXISTS (SELECT 1 FROM poll_rankings WHERE poll_id = $1)
            ) AS has_ballots
            ",
            [poll_id.into()],
        ))
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    match row {
        Some(row) => row
            .try_get::<bool>("", "has_ballots")
            .map_err(|e| AppError::Database(e.to_string())),
        None => Ok(false),
    }
}

async fn ensure_no_ballots<C: ConnectionTrait>(conn: &C, poll_id: Uuid) -> AppResult<()> {
    if has_ballots(conn, poll_id).await? {
        return Err(AppError::Conflict(
            "options cannot change once ballots have been cast".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Value};

    fn sample_poll(poll_type: poll::PollType) -> poll::Model {
        let now = Utc::now().fixed_offset();
        poll::Model {
            id: Uuid::new_v4(),
            trip_id: Uuid::new_v4(),
            created_by: Uuid::new_v4(),
            question: "Where should we eat?".to_string(),
            poll_type,
            deadline: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn sample_options(poll_id: Uuid, count: usize) -> Vec<poll_option::Model> {
        (0..count)
            .map(|i| poll_option::Model {
                id: Uuid::new_v4(),
                poll_id,
                option_type: poll_option::OptionType::Custom,
                entity_type: None,
                entity_id: None,
                name: format!("Option {i}"),
                position: i as i32,
                created_at: Utc::now().fixed_offset(),
            })
            .collect()
    }

    fn new_option(name: &str) -> NewPollOption {
        NewPollOption {
            id: Uuid::new_v4(),
            option_type: poll_option::OptionType::Custom,
            entity_type: None,
            entity_id: None,
            name: name.to_string(),
        }
    }

    fn has_ballots_row(value: bool) -> std::collections::BTreeMap<&'static str, Value> {
        maplit::btreemap! { "has_ballots" => Value::Bool(Some(value)) }
    }

    fn exec(rows_affected: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected,
        }
    }

    #[tokio::test]
    async fn test_create_poll_rejects_option_count_out_of_range() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let repo = PollRepository::new(Arc::new(db));

        let poll = sample_poll(poll::PollType::Single);
        let err = repo
            .create_poll(poll.clone(), vec![new_option("only")])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let too_many = (0..=MAX_OPTIONS).map(|i| new_option(&i.to_string())).collect();
        let err = repo.create_poll(poll, too_many).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_rank_poll_gets_no_default_options() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let repo = PollRepository::new(Arc::new(db));

        let err = repo
            .create_poll(sample_poll(poll::PollType::Rank), Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_create_poll_inserts_options() {
        let poll = sample_poll(poll::PollType::Multi);
        let options = sample_options(poll.id, 3);

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[poll.clone()]])
            .append_exec_results([exec(3)])
            .append_query_results([options.clone()])
            .into_connection();
        let repo = PollRepository::new(Arc::new(db));

        let created = repo
            .create_poll(
                poll.clone(),
                vec![new_option("a"), new_option("b"), new_option("c")],
            )
            .await
            .unwrap();

        assert_eq!(created.poll, poll);
        assert_eq!(created.options, options);
    }

    #[tokio::test]
    async fn test_add_option_conflicts_once_ballots_exist() {
        let poll = sample_poll(poll::PollType::Single);

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[poll.clone()]])
            .append_query_results([[has_ballots_row(true)]])
            .into_connection();
        let repo = PollRepository::new(Arc::new(db));

        let err = repo
            .add_option(poll.id, new_option("late"), MAX_OPTIONS, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_add_option_respects_max() {
        let poll = sample_poll(poll::PollType::Single);

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[poll.clone()]])
            .append_query_results([[has_ballots_row(false)]])
            .append_query_results([sample_options(poll.id, MAX_OPTIONS)])
            .into_connection();
        let repo = PollRepository::new(Arc::new(db));

        let err = repo
            .add_option(poll.id, new_option("sixteenth"), MAX_OPTIONS, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::MaxOptionsReached(15)));
    }

    #[tokio::test]
    async fn test_add_option_appends_after_last_position() {
        let poll = sample_poll(poll::PollType::Single);
        let existing = sample_options(poll.id, 3);
        let mut inserted = sample_options(poll.id, 1).remove(0);
        inserted.position = 3;

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[poll.clone()]])
            .append_query_results([[has_ballots_row(false)]])
            .append_query_results([existing])
            .append_query_results([[inserted.clone()]])
            .into_connection();
        let repo = PollRepository::new(Arc::new(db));

        let created = repo
            .add_option(poll.id, new_option("Option 0"), MAX_OPTIONS, Utc::now())
            .await
            .unwrap();
        assert_eq!(created.position, 3);
    }

    #[tokio::test]
    async fn test_add_option_missing_poll() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<poll::Model>::new()])
            .into_connection();
        let repo = PollRepository::new(Arc::new(db));

        let err = repo
            .add_option(Uuid::new_v4(), new_option("x"), MAX_OPTIONS, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_option_respects_min() {
        let poll = sample_poll(poll::PollType::Rank);
        let options = sample_options(poll.id, MIN_OPTIONS);

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[poll.clone()]])
            .append_query_results([[has_ballots_row(false)]])
            .append_query_results([options.clone()])
            .into_connection();
        let repo = PollRepository::new(Arc::new(db));

        let err = repo
            .delete_option(poll.id, options[0].id, MIN_OPTIONS)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::MinOptionsRequired(2)));
    }

    #[tokio::test]
    async fn test_delete_option_conflicts_once_ballots_exist() {
        let poll = sample_poll(poll::PollType::Multi);

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[poll.clone()]])
            .append_query_results([[has_ballots_row(true)]])
            .into_connection();
        let repo = PollRepository::new(Arc::new(db));

        let err = repo
            .delete_option(poll.id, Uuid::new_v4(), MIN_OPTIONS)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_delete_option_unknown_option() {
        let poll = sample_poll(poll::PollType::Single);

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[poll.clone()]])
            .append_query_results([[has_ballots_row(false)]])
            .append_query_results([sample_options(poll.id, 3)])
            .into_connection();
        let repo = PollRepository::new(Arc::new(db));

        let err = repo
            .delete_option(poll.id, Uuid::new_v4(), MIN_OPTIONS)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_option_returns_removed_row() {
        let poll = sample_poll(poll::PollType::Single);
        let options = sample_options(poll.id, 3);

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[poll.clone()]])
            .append_query_results([[has_ballots_row(false)]])
            .append_query_results([options.clone()])
            .append_exec_results([exec(1)])
            .into_connection();
        let repo = PollRepository::new(Arc::new(db));

        let removed = repo
            .delete_option(poll.id, options[1].id, MIN_OPTIONS)
            .await
            .unwrap();
        assert_eq!(removed, options[1]);
    }

    #[tokio::test]
    async fn test_cast_vote_replaces_ballot() {
        let poll = sample_poll(poll::PollType::Multi);
        let options = sample_options(poll.id, 2);

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[poll.clone()]])
            .append_exec_results([exec(1), exec(2)])
            .into_connection();
        let repo = PollRepository::new(Arc::new(db));

        repo.cast_vote(
            poll.id,
            Uuid::new_v4(),
            &[options[0].id, options[1].id],
            Utc::now(),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_cast_empty_vote_only_deletes() {
        let poll = sample_poll(poll::PollType::Single);

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[poll.clone()]])
            .append_exec_results([exec(1)])
            .into_connection();
        let repo = PollRepository::new(Arc::new(db));

        repo.cast_vote(poll.id, Uuid::new_v4(), &[], Utc::now())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_update_poll_requires_a_field() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let repo = PollRepository::new(Arc::new(db));

        let err = repo
            .update_poll(Uuid::new_v4(), PollPatch::default(), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_update_poll_sets_fields() {
        let poll = sample_poll(poll::PollType::Single);
        let deadline = Utc::now() + Duration::days(2);
        let mut updated = poll.clone();
        updated.question = "Lunch or dinner?".to_string();
        updated.deadline = Some(deadline.fixed_offset());

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[poll.clone()]])
            .append_query_results([[updated.clone()]])
            .into_connection();
        let repo = PollRepository::new(Arc::new(db));

        let result = repo
            .update_poll(
                poll.id,
                PollPatch {
                    question: Some("Lunch or dinner?".to_string()),
                    deadline: Some(deadline),
                },
                Utc::now(),
            )
            .await
            .unwrap();
        assert_eq!(result, updated);
    }

    #[tokio::test]
    async fn test_update_poll_rechecks_deadline_under_lock() {
        let mut poll = sample_poll(poll::PollType::Multi);
        let now = Utc::now();
        poll.deadline = Some((now - Duration::minutes(5)).fixed_offset());

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[poll.clone()]])
            .into_connection();
        let repo = PollRepository::new(Arc::new(db));

        let err = repo
            .update_poll(
                poll.id,
                PollPatch {
                    question: Some("Too late?".to_string()),
                    deadline: None,
                },
                now,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DeadlinePassed));
    }

    #[tokio::test]
    async fn test_delete_poll_returns_row() {
        let poll = sample_poll(poll::PollType::Rank);

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[poll.clone()]])
            .append_exec_results([exec(1)])
            .into_connection();
        let repo = PollRepository::new(Arc::new(db));

        assert_eq!(repo.delete_poll(poll.id).await.unwrap(), poll);
    }

    #[tokio::test]
    async fn test_delete_poll_missing() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<poll::Model>::new()])
            .into_connection();
        let repo = PollRepository::new(Arc::new(db));

        let err = repo.delete_poll(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_polls_overfetches_for_cursor() {
        let trip_id = Uuid::new_v4();
        let base = Utc::now();
        let polls: Vec<poll::Model> = (0..3)
            .map(|i| {
                let mut p = sample_poll(poll::PollType::Single);
                p.trip_id = trip_id;
                p.created_at = (base - Duration::minutes(i)).fixed_offset();
                p
            })
            .collect();
        let mut options = sample_options(polls[0].id, 2);
        options.extend(sample_options(polls[1].id, 2));

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([polls.clone()])
            .append_query_results([options])
            .into_connection();
        let repo = PollRepository::new(Arc::new(db));

        let page = repo
            .list_polls_by_trip(
                trip_id,
                &[poll::PollType::Single, poll::PollType::Multi],
                2,
                None,
            )
            .await
            .unwrap();

        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].options.len(), 2);
        assert_eq!(page.items[1].options.len(), 2);
        let next = Cursor::decode(page.next_cursor.as_deref().unwrap()).unwrap();
        assert_eq!(next.id, polls[1].id);
    }

    #[tokio::test]
    async fn test_vote_summaries_overlay() {
        let poll_a = Uuid::new_v4();
        let poll_b = Uuid::new_v4();
        let opt_a1 = Uuid::new_v4();
        let opt_a2 = Uuid::new_v4();
        let opt_b1 = Uuid::new_v4();
        let caller = Uuid::new_v4();

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[
                maplit::btreemap! {
                    "poll_id" => Value::Uuid(Some(Box::new(poll_a))),
                    "option_id" => Value::Uuid(Some(Box::new(opt_a1))),
                    "vote_count" => Value::BigInt(Some(2)),
                    "user_voted" => Value::Bool(Some(true)),
                },
                maplit::btreemap! {
                    "poll_id" => Value::Uuid(Some(Box::new(poll_a))),
                    "option_id" => Value::Uuid(Some(Box::new(opt_a2))),
                    "vote_count" => Value::BigInt(Some(1)),
                    "user_voted" => Value::Bool(Some(false)),
                },
                maplit::btreemap! {
                    "poll_id" => Value::Uuid(Some(Box::new(poll_b))),
                    "option_id" => Value::Uuid(Some(Box::new(opt_b1))),
                    "vote_count" => Value::BigInt(Some(1)),
                    "user_voted" => Value::Bool(Some(false)),
                },
            ]])
            .append_query_results([[
                maplit::btreemap! {
                    "poll_id" => Value::Uuid(Some(Box::new(poll_a))),
                    "total_voters" => Value::BigInt(Some(2)),
                },
                maplit::btreemap! {
                    "poll_id" => Value::Uuid(Some(Box::new(poll_b))),
                    "total_voters" => Value::BigInt(Some(1)),
                },
            ]])
            .into_connection();
        let repo = PollRepository::new(Arc::new(db));

        let summaries = repo
            .get_vote_summaries(&[poll_a, poll_b], caller)
            .await
            .unwrap();

        let a = &summaries[&poll_a];
        assert_eq!(a.option_counts[&opt_a1], 2);
        assert_eq!(a.option_counts[&opt_a2], 1);
        assert!(a.voted.contains(&opt_a1));
        assert!(!a.voted.contains(&opt_a2));
        assert_eq!(a.total_voters, 2);

        let b = &summaries[&poll_b];
        assert!(b.voted.is_empty());
        assert_eq!(b.total_voters, 1);
    }

    #[tokio::test]
    async fn test_vote_summaries_empty_batch_skips_queries() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let repo = PollRepository::new(Arc::new(db));

        let summaries = repo.get_vote_summaries(&[], Uuid::new_v4()).await.unwrap();
        assert!(summaries.is_empty());
    }
}
