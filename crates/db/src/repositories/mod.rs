//! Repository layer: the poll store.

pub mod membership;
pub mod poll;
pub mod poll_ranking;

pub use membership::MembershipRepository;
pub use poll::{
    MAX_OPTIONS, MIN_OPTIONS, NewPollOption, PollPatch, PollRepository, PollWithOptions,
    VoteSummary,
};
pub use poll_ranking::{OptionScore, PollRankingRepository, RankEntry, VoterStatus};
