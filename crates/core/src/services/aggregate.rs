//! Result shaping for vote and rank polls.
//!
//! Tallies and Borda scores are computed by the store; this module overlays
//! them onto poll rows and produces the serializable views returned to clients
//! and carried in event payloads.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use toggo_db::entities::{poll, poll_option, poll_ranking};
use toggo_db::repositories::{OptionScore, VoteSummary, VoterStatus};
use uuid::Uuid;

/// Number of leading options surfaced as `top_3`.
pub const TOP_OPTIONS: usize = 3;

/// An option as stored, without any tally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionResponse {
    pub id: Uuid,
    pub option_type: poll_option::OptionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<Uuid>,
    pub name: String,
}

impl From<poll_option::Model> for OptionResponse {
    fn from(option: poll_option::Model) -> Self {
        Self {
            id: option.id,
            option_type: option.option_type,
            entity_type: option.entity_type,
            entity_id: option.entity_id,
            name: option.name,
        }
    }
}

/// A vote-poll option with its tally and the caller's flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollOptionResponse {
    pub id: Uuid,
    pub option_type: poll_option::OptionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<Uuid>,
    pub name: String,
    pub vote_count: u64,
    pub voted: bool,
}

/// A vote poll as seen by one caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollResponse {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub created_by: Uuid,
    pub question: String,
    pub poll_type: poll::PollType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub options: Vec<PollOptionResponse>,
    pub total_voters: u64,
}

impl PollResponse {
    /// Overlay a vote summary onto a poll and its options.
    #[must_use]
    pub fn with_summary(
        poll: poll::Model,
        options: Vec<poll_option::Model>,
        summary: &VoteSummary,
    ) -> Self {
        let options = options
            .into_iter()
            .map(|o| PollOptionResponse {
                vote_count: summary.option_counts.get(&o.id).copied().unwrap_or(0),
                voted: summary.voted.contains(&o.id),
                id: o.id,
                option_type: o.option_type,
                entity_type: o.entity_type,
                entity_id: o.entity_id,
                name: o.name,
            })
            .collect();

        Self {
            id: poll.id,
            trip_id: poll.trip_id,
            created_by: poll.created_by,
            question: poll.question,
            poll_type: poll.poll_type,
            deadline: poll.deadline.map(|d| d.with_timezone(&Utc)),
            created_at: poll.created_at.with_timezone(&Utc),
            options,
            total_voters: summary.total_voters,
        }
    }
}

/// A rank poll's metadata and options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankPollResponse {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub created_by: Uuid,
    pub question: String,
    pub poll_type: poll::PollType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub options: Vec<OptionResponse>,
}

impl RankPollResponse {
    #[must_use]
    pub fn new(poll: poll::Model, options: Vec<poll_option::Model>) -> Self {
        Self {
            id: poll.id,
            trip_id: poll.trip_id,
            created_by: poll.created_by,
            question: poll.question,
            poll_type: poll.poll_type,
            deadline: poll.deadline.map(|d| d.with_timezone(&Utc)),
            created_at: poll.created_at.with_timezone(&Utc),
            options: options.into_iter().map(OptionResponse::from).collect(),
        }
    }
}

/// Borda result of one option.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedOption {
    pub option_id: Uuid,
    pub name: String,
    pub option_type: poll_option::OptionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<Uuid>,
    pub borda_score: i64,
    pub average_rank: f64,
    pub vote_count: i64,
}

impl From<OptionScore> for RankedOption {
    fn from(score: OptionScore) -> Self {
        Self {
            option_id: score.option_id,
            name: score.name,
            option_type: score.option_type,
            entity_type: score.entity_type,
            entity_id: score.entity_id,
            borda_score: score.borda_score,
            average_rank: score.average_rank,
            vote_count: score.vote_count,
        }
    }
}

/// One position of the caller's own ballot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRankingEntry {
    pub option_id: Uuid,
    pub option_name: String,
    pub rank_position: i32,
}

/// Full result view of a rank poll for one caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankPollResults {
    pub poll_id: Uuid,
    pub question: String,
    pub poll_type: poll::PollType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub total_voters: u64,
    pub total_members: u64,
    pub top_3: Vec<RankedOption>,
    pub all_options: Vec<RankedOption>,
    pub user_ranking: Vec<UserRankingEntry>,
    pub user_has_voted: bool,
}

impl RankPollResults {
    /// Assemble results from store aggregates. `scores` must already be
    /// ordered by Borda score with ties in insertion order.
    #[must_use]
    pub fn build(
        poll: poll::Model,
        scores: Vec<OptionScore>,
        ballot: Vec<poll_ranking::Model>,
        total_voters: u64,
        total_members: u64,
    ) -> Self {
        let names: HashMap<Uuid, &str> = scores
            .iter()
            .map(|s| (s.option_id, s.name.as_str()))
            .collect();
        let user_ranking: Vec<UserRankingEntry> = ballot
            .iter()
            .map(|r| UserRankingEntry {
                option_id: r.option_id,
                option_name: names.get(&r.option_id).copied().unwrap_or_default().to_string(),
                rank_position: r.rank_position,
            })
            .collect();

        let all_options: Vec<RankedOption> = scores.into_iter().map(RankedOption::from).collect();

        Self {
            poll_id: poll.id,
            question: poll.question,
            poll_type: poll.poll_type,
            deadline: poll.deadline.map(|d| d.with_timezone(&Utc)),
            created_by: poll.created_by,
            created_at: poll.created_at.with_timezone(&Utc),
            total_voters,
            total_members,
            top_3: top_options(&all_options),
            user_has_voted: !user_ranking.is_empty(),
            user_ranking,
            all_options,
        }
    }
}

/// The leading options of an already ordered result list.
#[must_use]
pub fn top_options(all_options: &[RankedOption]) -> Vec<RankedOption> {
    all_options.iter().take(TOP_OPTIONS).cloned().collect()
}

/// Payload of `poll.ranking_submitted`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingSubmitted {
    pub poll_id: Uuid,
    pub user_id: Uuid,
    pub total_voters: u64,
    pub top_3: Vec<RankedOption>,
}

/// A trip member and whether they hold a ballot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoterResponse {
    pub user_id: Uuid,
    pub username: String,
    pub has_voted: bool,
}

impl From<VoterStatus> for VoterResponse {
    fn from(status: VoterStatus) -> Self {
        Self {
            user_id: status.user_id,
            username: status.username,
            has_voted: status.has_voted,
        }
    }
}

/// Voter roster of a rank poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollVotersResponse {
    pub poll_id: Uuid,
    pub total_members: u64,
    pub total_voters: u64,
    pub voters: Vec<VoterResponse>,
}

impl PollVotersResponse {
    #[must_use]
    pub fn new(poll_id: Uuid, statuses: Vec<VoterStatus>) -> Self {
        let voters: Vec<VoterResponse> = statuses.into_iter().map(VoterResponse::from).collect();
        Self {
            poll_id,
            total_members: voters.len() as u64,
            total_voters: voters.iter().filter(|v| v.has_voted).count() as u64,
            voters,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn option(poll_id: Uuid, name: &str, position: i32) -> poll_option::Model {
        poll_option::Model {
            id: Uuid::new_v4(),
            poll_id,
            option_type: poll_option::OptionType::Custom,
            entity_type: None,
            entity_id: None,
            name: name.to_string(),
            position,
            created_at: Utc::now().fixed_offset(),
        }
    }

    fn poll(poll_type: poll::PollType) -> poll::Model {
        let now = Utc::now().fixed_offset();
        poll::Model {
            id: Uuid::new_v4(),
            trip_id: Uuid::new_v4(),
            created_by: Uuid::new_v4(),
            question: "Which beach?".to_string(),
            poll_type,
            deadline: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn score(option: &poll_option::Model, borda: i64, voters: i64) -> OptionScore {
        OptionScore {
            option_id: option.id,
            name: option.name.clone(),
            option_type: option.option_type,
            entity_type: None,
            entity_id: None,
            position: option.position,
            borda_score: borda,
            average_rank: 0.0,
            vote_count: voters,
        }
    }

    #[test]
    fn test_vote_overlay() {
        let poll = poll(poll::PollType::Single);
        let o1 = option(poll.id, "O1", 0);
        let o2 = option(poll.id, "O2", 1);
        let summary = VoteSummary {
            option_counts: HashMap::from([(o2.id, 1)]),
            voted: HashSet::from([o2.id]),
            total_voters: 1,
        };

        let response = PollResponse::with_summary(poll, vec![o1.clone(), o2.clone()], &summary);

        assert_eq!(response.total_voters, 1);
        assert_eq!(response.options[0].id, o1.id);
        assert_eq!(response.options[0].vote_count, 0);
        assert!(!response.options[0].voted);
        assert_eq!(response.options[1].vote_count, 1);
        assert!(response.options[1].voted);
    }

    #[test]
    fn test_poll_response_omits_absent_fields() {
        let poll = poll(poll::PollType::Multi);
        let o = option(poll.id, "Yes", 0);
        let value =
            serde_json::to_value(PollResponse::with_summary(poll, vec![o], &VoteSummary::default()))
                .unwrap();

        assert!(value.get("deadline").is_none());
        assert_eq!(value["poll_type"], "multi");
        assert!(value["options"][0].get("entity_id").is_none());
        assert_eq!(value["options"][0]["option_type"], "custom");
    }

    #[test]
    fn test_results_top_three_and_user_ranking() {
        let poll = poll(poll::PollType::Rank);
        let a = option(poll.id, "A", 0);
        let b = option(poll.id, "B", 1);
        let c = option(poll.id, "C", 2);
        let d = option(poll.id, "D", 3);
        let scores = vec![
            score(&a, 7, 2),
            score(&c, 6, 2),
            score(&b, 5, 2),
            score(&d, 2, 2),
        ];
        let user_id = Uuid::new_v4();
        let ballot = [(&a, 1), (&b, 2), (&c, 3), (&d, 4)]
            .into_iter()
            .map(|(o, rank)| poll_ranking::Model {
                poll_id: poll.id,
                user_id,
                option_id: o.id,
                rank_position: rank,
                created_at: Utc::now().fixed_offset(),
            })
            .collect();

        let results = RankPollResults::build(poll, scores, ballot, 2, 4);

        let top: Vec<&str> = results.top_3.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(top, ["A", "C", "B"]);
        assert_eq!(results.all_options.len(), 4);
        assert_eq!(results.total_voters, 2);
        assert_eq!(results.total_members, 4);
        assert!(results.user_has_voted);
        assert_eq!(results.user_ranking[1].option_name, "B");
        assert_eq!(results.user_ranking[1].rank_position, 2);

        let total: i64 = results.all_options.iter().map(|o| o.borda_score).sum();
        assert_eq!(total, 2 * (4 * 5 / 2));
    }

    #[test]
    fn test_results_without_ballots() {
        let poll = poll(poll::PollType::Rank);
        let a = option(poll.id, "A", 0);
        let b = option(poll.id, "B", 1);

        let results = RankPollResults::build(poll, vec![score(&a, 0, 0), score(&b, 0, 0)], vec![], 0, 3);

        assert!(!results.user_has_voted);
        assert!(results.user_ranking.is_empty());
        assert_eq!(results.top_3.len(), 2);
    }

    #[test]
    fn test_voters_response_counts() {
        let statuses = vec![
            VoterStatus {
                user_id: Uuid::new_v4(),
                username: "bo".to_string(),
                has_voted: true,
            },
            VoterStatus {
                user_id: Uuid::new_v4(),
                username: "al".to_string(),
                has_voted: false,
            },
        ];

        let response = PollVotersResponse::new(Uuid::new_v4(), statuses);
        assert_eq!(response.total_members, 2);
        assert_eq!(response.total_voters, 1);
        assert_eq!(response.voters[0].username, "bo");
    }
}
