//! Business logic services.

#![allow(missing_docs)]

pub mod access;
pub mod aggregate;
pub mod event_publisher;
pub mod rank_poll;
pub mod rules;
pub mod vote_poll;

pub use access::{TripAccess, TripAccessService, TripRole};
pub use aggregate::{
    OptionResponse, PollOptionResponse, PollResponse, PollVotersResponse, RankPollResponse,
    RankPollResults, RankedOption, RankingSubmitted, UserRankingEntry, VoterResponse,
};
pub use event_publisher::{
    EventPublisher, EventPublisherService, NoOpEventPublisher, PollEvent, PollTopic,
};
pub use rank_poll::{
    CreateRankPollInput, RankPollService, RankingInput, SubmitRankingInput, validate_ranking,
};
pub use rules::{CreateOptionInput, UpdatePollInput};
pub use vote_poll::{CastVoteInput, CreatePollInput, VotePollService};
