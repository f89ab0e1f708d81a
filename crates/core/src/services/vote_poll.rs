//! Vote poll service.
//!
//! Single-choice and multi-choice polls. Ballots are replaced wholesale on
//! every cast; an empty ballot withdraws the caller's votes.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use toggo_common::{
    AppError, AppResult, ClockService, IdGenerator, Page, clamp_limit, parse_cursor,
};
use toggo_db::{
    entities::poll::{self, PollType},
    repositories::{MAX_OPTIONS, MIN_OPTIONS, PollRepository},
};
use uuid::Uuid;
use validator::Validate;

use super::access::TripAccessService;
use super::aggregate::{OptionResponse, PollResponse};
use super::event_publisher::{EventPublisherService, PollTopic, publish_best_effort};
use super::rules::{
    CreateOptionInput, UpdatePollInput, ensure_creator, ensure_creator_or_admin,
    ensure_future_deadline, ensure_in_trip, ensure_open,
};

const VOTE_POLL_TYPES: [PollType; 2] = [PollType::Single, PollType::Multi];

/// Input for creating a vote poll.
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePollInput {
    #[validate(length(min = 1, max = 500))]
    pub question: String,
    pub poll_type: PollType,
    pub deadline: Option<DateTime<Utc>>,
    /// Empty means the default `Yes`/`No` pair.
    #[serde(default)]
    #[validate(nested)]
    pub options: Vec<CreateOptionInput>,
}

/// Input for casting a ballot.
#[derive(Debug, Deserialize)]
pub struct CastVoteInput {
    pub option_ids: Vec<Uuid>,
}

/// Vote poll service for business logic.
#[derive(Clone)]
pub struct VotePollService {
    poll_repo: PollRepository,
    access: TripAccessService,
    clock: ClockService,
    id_gen: IdGenerator,
    default_page_size: u64,
    max_page_size: u64,
    event_publisher: Option<EventPublisherService>,
}

impl VotePollService {
    /// Create a new vote poll service.
    #[must_use]
    pub const fn new(
        poll_repo: PollRepository,
        access: TripAccessService,
        clock: ClockService,
    ) -> Self {
        Self {
            poll_repo,
            access,
            clock,
            id_gen: IdGenerator::new(),
            default_page_size: 20,
            max_page_size: 100,
            event_publisher: None,
        }
    }

    /// Override the listing page sizes.
    #[must_use]
    pub const fn with_page_sizes(mut self, default_page_size: u64, max_page_size: u64) -> Self {
        self.default_page_size = default_page_size;
        self.max_page_size = max_page_size;
        self
    }

    /// Set the event publisher.
    pub fn set_event_publisher(&mut self, event_publisher: EventPublisherService) {
        self.event_publisher = Some(event_publisher);
    }

    /// Create a vote poll.
    pub async fn create_poll(
        &self,
        trip_id: Uuid,
        user_id: Uuid,
        input: CreatePollInput,
    ) -> AppResult<PollResponse> {
        input.validate()?;
        self.access.require_member(trip_id, user_id).await?;

        if !input.poll_type.is_vote_poll() {
            return Err(AppError::Validation(
                "poll_type must be single or multi".to_string(),
            ));
        }

        let now = self.clock.now();
        ensure_future_deadline(input.deadline, now)?;

        let model = poll::Model {
            id: self.id_gen.generate(),
            trip_id,
            created_by: user_id,
            question: input.question,
            poll_type: input.poll_type,
            deadline: input.deadline.map(|d| d.fixed_offset()),
            created_at: now.fixed_offset(),
            updated_at: now.fixed_offset(),
        };
        let options = input
            .options
            .into_iter()
            .map(|o| o.into_new_option(&self.id_gen))
            .collect();

        let created = self.poll_repo.create_poll(model, options).await?;
        let response = PollResponse::with_summary(created.poll, created.options, &Default::default());

        tracing::info!(poll_id = %response.id, trip_id = %trip_id, user_id = %user_id, "Created vote poll");
        self.publish(PollTopic::Created, trip_id, &response).await;
        Ok(response)
    }

    /// Get a vote poll with tallies and the caller's own votes.
    pub async fn get_poll(
        &self,
        trip_id: Uuid,
        poll_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<PollResponse> {
        self.access.require_member(trip_id, user_id).await?;
        let found = self.poll_repo.find_poll(poll_id, true).await?;
        ensure_vote_poll_in_trip(&found.poll, trip_id)?;

        let summary = self.poll_repo.get_vote_summary(poll_id, user_id).await?;
        Ok(PollResponse::with_summary(found.poll, found.options, &summary))
    }

    /// List a trip's vote polls, newest first.
    pub async fn list_polls(
        &self,
        trip_id: Uuid,
        user_id: Uuid,
        limit: Option<u64>,
        cursor: Option<&str>,
    ) -> AppResult<Page<PollResponse>> {
        self.access.require_member(trip_id, user_id).await?;
        let cursor = parse_cursor(cursor)?;
        let limit = clamp_limit(limit, self.default_page_size, self.max_page_size);

        let page = self
            .poll_repo
            .list_polls_by_trip(trip_id, &VOTE_POLL_TYPES, limit, cursor)
            .await?;

        let poll_ids: Vec<Uuid> = page.items.iter().map(|p| p.poll.id).collect();
        let mut summaries = self.poll_repo.get_vote_summaries(&poll_ids, user_id).await?;

        Ok(page.map(|item| {
            let summary = summaries.remove(&item.poll.id).unwrap_or_default();
            PollResponse::with_summary(item.poll, item.options, &summary)
        }))
    }

    /// Update question and/or deadline. Creator only, before the deadline.
    pub async fn update_poll(
        &self,
        trip_id: Uuid,
        poll_id: Uuid,
        user_id: Uuid,
        input: UpdatePollInput,
    ) -> AppResult<PollResponse> {
        input.validate()?;
        self.access.require_member(trip_id, user_id).await?;
        let found = self.poll_repo.find_poll(poll_id, true).await?;
        ensure_vote_poll_in_trip(&found.poll, trip_id)?;
        ensure_creator(&found.poll, user_id, "update this poll")?;

        let now = self.clock.now();
        ensure_open(&found.poll, now)?;
        ensure_future_deadline(input.deadline, now)?;

        let updated = self
            .poll_repo
            .update_poll(poll_id, input.into_patch(), now)
            .await?;
        let summary = self.poll_repo.get_vote_summary(poll_id, user_id).await?;
        let response = PollResponse::with_summary(updated, found.options, &summary);

        self.publish(PollTopic::Updated, trip_id, &response).await;
        Ok(response)
    }

    /// Delete a poll. Creator or trip admin.
    pub async fn delete_poll(
        &self,
        trip_id: Uuid,
        poll_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<PollResponse> {
        let role = self.access.require_member(trip_id, user_id).await?;
        let found = self.poll_repo.find_poll(poll_id, true).await?;
        ensure_vote_poll_in_trip(&found.poll, trip_id)?;
        ensure_creator_or_admin(&found.poll, user_id, role)?;

        let summary = self.poll_repo.get_vote_summary(poll_id, user_id).await?;
        self.poll_repo.delete_poll(poll_id).await?;
        let response = PollResponse::with_summary(found.poll, found.options, &summary);

        tracing::info!(poll_id = %poll_id, trip_id = %trip_id, user_id = %user_id, "Deleted vote poll");
        self.publish(PollTopic::Deleted, trip_id, &response).await;
        Ok(response)
    }

    /// Add an option while no ballots exist.
    pub async fn add_option(
        &self,
        trip_id: Uuid,
        poll_id: Uuid,
        user_id: Uuid,
        input: CreateOptionInput,
    ) -> AppResult<OptionResponse> {
        input.validate()?;
        self.access.require_member(trip_id, user_id).await?;
        let poll = self.poll_repo.get_by_id(poll_id).await?;
        ensure_vote_poll_in_trip(&poll, trip_id)?;

        let now = self.clock.now();
        ensure_open(&poll, now)?;

        let option = self
            .poll_repo
            .add_option(poll_id, input.into_new_option(&self.id_gen), MAX_OPTIONS, now)
            .await?;
        Ok(option.into())
    }

    /// Delete an option while no ballots exist.
    pub async fn delete_option(
        &self,
        trip_id: Uuid,
        poll_id: Uuid,
        option_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<OptionResponse> {
        self.access.require_member(trip_id, user_id).await?;
        let poll = self.poll_repo.get_by_id(poll_id).await?;
        ensure_vote_poll_in_trip(&poll, trip_id)?;
        ensure_open(&poll, self.clock.now())?;

        let option = self
            .poll_repo
            .delete_option(poll_id, option_id, MIN_OPTIONS)
            .await?;
        Ok(option.into())
    }

    /// Replace the caller's ballot and return the fresh tally.
    ///
    /// Duplicate IDs are left to the store, which rejects them as a conflict.
    pub async fn cast_vote(
        &self,
        trip_id: Uuid,
        poll_id: Uuid,
        user_id: Uuid,
        input: CastVoteInput,
    ) -> AppResult<PollResponse> {
        self.access.require_member(trip_id, user_id).await?;
        let found = self.poll_repo.find_poll(poll_id, true).await?;
        ensure_vote_poll_in_trip(&found.poll, trip_id)?;

        let now = self.clock.now();
        ensure_open(&found.poll, now)?;

        if found.poll.poll_type == PollType::Single && input.option_ids.len() > 1 {
            return Err(AppError::BadRequest(
                "single-choice polls allow only one vote".to_string(),
            ));
        }

        let known: HashSet<Uuid> = found.options.iter().map(|o| o.id).collect();
        if let Some(unknown) = input.option_ids.iter().find(|id| !known.contains(id)) {
            return Err(AppError::BadRequest(format!(
                "option does not belong to this poll: {unknown}"
            )));
        }

        self.poll_repo
            .cast_vote(poll_id, user_id, &input.option_ids, now)
            .await?;

        let summary = self.poll_repo.get_vote_summary(poll_id, user_id).await?;
        let response = PollResponse::with_summary(found.poll, found.options, &summary);

        self.publish(PollTopic::Voted, trip_id, &response).await;
        Ok(response)
    }

    async fn publish(&self, topic: PollTopic, trip_id: Uuid, response: &PollResponse) {
        publish_best_effort(
            self.event_publisher.as_ref(),
            topic,
            trip_id,
            response,
            self.clock.now(),
        )
        .await;
    }
}

fn ensure_vote_poll_in_trip(poll: &poll::Model, trip_id: Uuid) -> AppResult<()> {
    ensure_in_trip(poll, trip_id)?;
    if !poll.poll_type.is_vote_poll() {
        return Err(AppError::BadRequest("not a vote poll".to_string()));
    }
    Ok(())
}
