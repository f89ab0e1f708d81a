//! Poll entity shared by vote polls and rank polls.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Ballot mode of a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum PollType {
    /// Each member votes for at most one option.
    #[sea_orm(string_value = "single")]
    Single,
    /// Each member votes for any distinct subset of options.
    #[sea_orm(string_value = "multi")]
    Multi,
    /// Each member orders every option; aggregated by Borda count.
    #[sea_orm(string_value = "rank")]
    Rank,
}

impl PollType {
    /// Whether ballots are vote rows rather than rankings.
    #[must_use]
    pub const fn is_vote_poll(self) -> bool {
        matches!(self, Self::Single | Self::Multi)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "polls")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(indexed)]
    pub trip_id: Uuid,

    pub created_by: Uuid,

    #[sea_orm(column_type = "Text")]
    pub question: String,

    pub poll_type: PollType,

    /// Ballots after this instant are rejected
    #[sea_orm(nullable)]
    pub deadline: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::trip::Entity",
        from = "Column::TripId",
        to = "super::trip::Column::Id",
        on_delete = "Cascade"
    )]
    Trip,

    #[sea_orm(has_many = "super::poll_option::Entity")]
    Options,

    #[sea_orm(has_many = "super::poll_vote::Entity")]
    Votes,

    #[sea_orm(has_many = "super::poll_ranking::Entity")]
    Rankings,
}

impl Related<super::trip::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Trip.def()
    }
}

impl Related<super::poll_option::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Options.def()
    }
}

impl Related<super::poll_vote::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Votes.def()
    }
}

impl Related<super::poll_ranking::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Rankings.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
