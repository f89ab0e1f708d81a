//! Database entities.

pub mod membership;
pub mod poll;
pub mod poll_option;
pub mod poll_ranking;
pub mod poll_vote;
pub mod trip;
pub mod user;

pub use membership::Entity as Membership;
pub use poll::Entity as Poll;
pub use poll_option::Entity as PollOption;
pub use poll_ranking::Entity as PollRanking;
pub use poll_vote::Entity as PollVote;
pub use trip::Entity as Trip;
pub use user::Entity as User;
