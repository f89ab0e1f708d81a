//! Rank poll service.
//!
//! Members order every option of a poll; results are aggregated by Borda
//! count. A ballot must be a complete permutation of the current options.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use toggo_common::{AppError, AppResult, ClockService, IdGenerator};
use toggo_db::{
    entities::{
        poll::{self, PollType},
        poll_option,
    },
    repositories::{
        MAX_OPTIONS, MIN_OPTIONS, PollRankingRepository, PollRepository, RankEntry,
    },
};
use uuid::Uuid;
use validator::Validate;

use super::access::TripAccessService;
use super::aggregate::{
    OptionResponse, PollVotersResponse, RankPollResponse, RankPollResults, RankingSubmitted,
};
use super::event_publisher::{EventPublisherService, PollTopic, publish_best_effort};
use super::rules::{
    CreateOptionInput, UpdatePollInput, ensure_creator, ensure_creator_or_admin,
    ensure_future_deadline, ensure_in_trip, ensure_open,
};

/// Input for creating a rank poll.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateRankPollInput {
    #[validate(length(min = 1, max = 500))]
    pub question: String,
    pub deadline: Option<DateTime<Utc>>,
    #[validate(nested)]
    pub options: Vec<CreateOptionInput>,
}

/// One position of a submitted ballot.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RankingInput {
    pub option_id: Uuid,
    pub rank: i32,
}

/// Input for submitting a ranked ballot.
#[derive(Debug, Deserialize)]
pub struct SubmitRankingInput {
    pub rankings: Vec<RankingInput>,
}

/// Check that `rankings` orders every option exactly once over `1..=K`.
pub fn validate_ranking(
    options: &[poll_option::Model],
    rankings: &[RankingInput],
) -> AppResult<Vec<RankEntry>> {
    let k = options.len();
    if rankings.len() != k {
        return Err(AppError::BadRequest(format!("must rank all {k} options")));
    }

    let known: HashSet<Uuid> = options.iter().map(|o| o.id).collect();
    let mut seen_options = HashSet::with_capacity(k);
    let mut seen_ranks = HashSet::with_capacity(k);

    for ranking in rankings {
        if !known.contains(&ranking.option_id) {
            return Err(AppError::BadRequest(format!(
                "invalid option_id: {}",
                ranking.option_id
            )));
        }
        if !seen_options.insert(ranking.option_id) {
            return Err(AppError::BadRequest(format!(
                "duplicate option_id: {}",
                ranking.option_id
            )));
        }
        if ranking.rank < 1 || ranking.rank as usize > k {
            return Err(AppError::BadRequest(format!(
                "rank must be between 1 and {k}"
            )));
        }
        if !seen_ranks.insert(ranking.rank) {
            return Err(AppError::BadRequest(format!(
                "duplicate rank position: {}",
                ranking.rank
            )));
        }
    }

    // K distinct ranks within 1..=K leave no gap.
    Ok(rankings
        .iter()
        .map(|r| RankEntry {
            option_id: r.option_id,
            rank_position: r.rank,
        })
        .collect())
}

/// Rank poll service for business logic.
#[derive(Clone)]
pub struct RankPollService {
    poll_repo: PollRepository,
    ranking_repo: PollRankingRepository,
    access: TripAccessService,
    clock: ClockService,
    id_gen: IdGenerator,
    event_publisher: Option<EventPublisherService>,
}

impl RankPollService {
    /// Create a new rank poll service.
    #[must_use]
    pub const fn new(
        poll_repo: PollRepository,
        ranking_repo: PollRankingRepository,
        access: TripAccessService,
        clock: ClockService,
    ) -> Self {
        Self {
            poll_repo,
            ranking_repo,
            access,
            clock,
            id_gen: IdGenerator::new(),
            event_publisher: None,
        }
    }

    /// Set the event publisher.
    pub fn set_event_publisher(&mut self, event_publisher: EventPublisherService) {
        self.event_publisher = Some(event_publisher);
    }

    /// Create a rank poll with its full option set.
    pub async fn create_rank_poll(
        &self,
        trip_id: Uuid,
        user_id: Uuid,
        input: CreateRankPollInput,
    ) -> AppResult<RankPollResponse> {
        input.validate()?;
        self.access.require_member(trip_id, user_id).await?;

        let now = self.clock.now();
        ensure_future_deadline(input.deadline, now)?;

        let model = poll::Model {
            id: self.id_gen.generate(),
            trip_id,
            created_by: user_id,
            question: input.question,
            poll_type: PollType::Rank,
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
        let response = RankPollResponse::new(created.poll, created.options);

        tracing::info!(poll_id = %response.id, trip_id = %trip_id, user_id = %user_id, "Created rank poll");
        self.publish(PollTopic::Created, trip_id, &response).await;
        Ok(response)
    }

    /// Update question and/or deadline. Creator only, before the deadline.
    pub async fn update_rank_poll(
        &self,
        trip_id: Uuid,
        poll_id: Uuid,
        user_id: Uuid,
        input: UpdatePollInput,
    ) -> AppResult<RankPollResponse> {
        input.validate()?;
        self.access.require_member(trip_id, user_id).await?;
        let found = self.poll_repo.find_poll(poll_id, true).await?;
        ensure_rank_poll_in_trip(&found.poll, trip_id)?;
        ensure_creator(&found.poll, user_id, "update this poll")?;

        let now = self.clock.now();
        ensure_open(&found.poll, now)?;
        ensure_future_deadline(input.deadline, now)?;

        let updated = self
            .poll_repo
            .update_poll(poll_id, input.into_patch(), now)
            .await?;
        let response = RankPollResponse::new(updated, found.options);

        self.publish(PollTopic::Updated, trip_id, &response).await;
        Ok(response)
    }

    /// Delete a rank poll. Creator or trip admin.
    pub async fn delete_rank_poll(
        &self,
        trip_id: Uuid,
        poll_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<RankPollResponse> {
        let role = self.access.require_member(trip_id, user_id).await?;
        let found = self.poll_repo.find_poll(poll_id, true).await?;
        ensure_rank_poll_in_trip(&found.poll, trip_id)?;
        ensure_creator_or_admin(&found.poll, user_id, role)?;

        self.poll_repo.delete_poll(poll_id).await?;
        let response = RankPollResponse::new(found.poll, found.options);

        tracing::info!(poll_id = %poll_id, trip_id = %trip_id, user_id = %user_id, "Deleted rank poll");
        self.publish(PollTopic::Deleted, trip_id, &response).await;
        Ok(response)
    }

    /// Add an option. Creator only, before any ranking and the deadline.
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
        ensure_rank_poll_in_trip(&poll, trip_id)?;
        ensure_creator(&poll, user_id, "add options")?;

        let now = self.clock.now();
        ensure_open(&poll, now)?;

        let option = self
            .poll_repo
            .add_option(poll_id, input.into_new_option(&self.id_gen), MAX_OPTIONS, now)
            .await?;
        Ok(option.into())
    }

    /// Delete an option. Creator only, before any ranking and the deadline.
    pub async fn delete_option(
        &self,
        trip_id: Uuid,
        poll_id: Uuid,
        option_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<OptionResponse> {
        self.access.require_member(trip_id, user_id).await?;
        let poll = self.poll_repo.get_by_id(poll_id).await?;
        ensure_rank_poll_in_trip(&poll, trip_id)?;
        ensure_creator(&poll, user_id, "delete options")?;
        ensure_open(&poll, self.clock.now())?;

        let option = self
            .poll_repo
            .delete_option(poll_id, option_id, MIN_OPTIONS)
            .await?;
        Ok(option.into())
    }

    /// Replace the caller's ranked ballot and return fresh results.
    pub async fn submit_ranking(
        &self,
        trip_id: Uuid,
        poll_id: Uuid,
        user_id: Uuid,
        input: SubmitRankingInput,
    ) -> AppResult<RankPollResults> {
        self.access.require_member(trip_id, user_id).await?;
        let found = self.poll_repo.find_poll(poll_id, true).await?;
        ensure_rank_poll_in_trip(&found.poll, trip_id)?;

        let now = self.clock.now();
        ensure_open(&found.poll, now)?;

        let entries = validate_ranking(&found.options, &input.rankings)?;
        self.ranking_repo
            .submit_ranking(poll_id, user_id, &entries, now)
            .await?;

        let results = self.results(found.poll, trip_id, user_id).await?;
        let payload = RankingSubmitted {
            poll_id,
            user_id,
            total_voters: results.total_voters,
            top_3: results.top_3.clone(),
        };

        tracing::debug!(poll_id = %poll_id, user_id = %user_id, "Submitted ranking");
        publish_best_effort(
            self.event_publisher.as_ref(),
            PollTopic::RankingSubmitted,
            trip_id,
            &payload,
            self.clock.now(),
        )
        .await;
        Ok(results)
    }

    /// Borda results with the caller's own ballot.
    pub async fn get_results(
        &self,
        trip_id: Uuid,
        poll_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<RankPollResults> {
        self.access.require_member(trip_id, user_id).await?;
        let poll = self.poll_repo.get_by_id(poll_id).await?;
        ensure_rank_poll_in_trip(&poll, trip_id)?;

        self.results(poll, trip_id, user_id).await
    }

    /// Every trip member with whether they have ranked.
    pub async fn get_voters(
        &self,
        trip_id: Uuid,
        poll_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<PollVotersResponse> {
        self.access.require_member(trip_id, user_id).await?;
        let poll = self.poll_repo.get_by_id(poll_id).await?;
        ensure_rank_poll_in_trip(&poll, trip_id)?;

        let statuses = self.ranking_repo.get_voter_status(poll_id, trip_id).await?;
        Ok(PollVotersResponse::new(poll_id, statuses))
    }

    async fn results(
        &self,
        poll: poll::Model,
        trip_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<RankPollResults> {
        let scores = self.ranking_repo.aggregate_ranking_results(poll.id).await?;
        let ballot = self.ranking_repo.find_by_poll_and_user(poll.id, user_id).await?;
        let total_voters = self.ranking_repo.count_voters(poll.id).await?;
        let total_members = self.access.member_count(trip_id).await?;

        Ok(RankPollResults::build(poll, scores, ballot, total_voters, total_members))
    }

    async fn publish(&self, topic: PollTopic, trip_id: Uuid, response: &RankPollResponse) {
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

fn ensure_rank_poll_in_trip(poll: &poll::Model, trip_id: Uuid) -> AppResult<()> {
    ensure_in_trip(poll, trip_id)?;
    if poll.poll_type != PollType::Rank {
        return Err(AppError::BadRequest("not a rank poll".to_string()));
    }
    Ok(())
}
