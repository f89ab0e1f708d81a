//! Create poll, option, vote and ranking tables migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Polls::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Polls::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Polls::TripId).uuid().not_null())
                    .col(ColumnDef::new(Polls::CreatedBy).uuid().not_null())
                    .col(ColumnDef::new(Polls::Question).text().not_null())
                    .col(ColumnDef::new(Polls::PollType).string_len(16).not_null())
                    .col(ColumnDef::new(Polls::Deadline).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Polls::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Polls::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_polls_trip")
                            .from(Polls::Table, Polls::TripId)
                            .to(Trips::Table, Trips::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_polls_created_by")
                            .from(Polls::Table, Polls::CreatedBy)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: (trip_id, created_at DESC, id DESC) for keyset pagination
        manager
            .create_index(
                Index::create()
                    .name("idx_polls_trip_created_id")
                    .table(Polls::Table)
                    .col(Polls::TripId)
                    .col((Polls::CreatedAt, IndexOrder::Desc))
                    .col((Polls::Id, IndexOrder::Desc))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PollOptions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PollOptions::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PollOptions::PollId).uuid().not_null())
                    .col(
                        ColumnDef::new(PollOptions::OptionType)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(ColumnDef::new(PollOptions::EntityType).string_len(32))
                    .col(ColumnDef::new(PollOptions::EntityId).uuid())
                    .col(ColumnDef::new(PollOptions::Name).string_len(255).not_null())
                    .col(ColumnDef::new(PollOptions::Position).integer().not_null())
                    .col(
                        ColumnDef::new(PollOptions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_poll_options_poll")
                            .from(PollOptions::Table, PollOptions::PollId)
                            .to(Polls::Table, Polls::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: (id, poll_id) - target of the ballot tables' composite FK
        manager
            .create_index(
                Index::create()
                    .name("idx_poll_options_id_poll")
                    .table(PollOptions::Table)
                    .col(PollOptions::Id)
                    .col(PollOptions::PollId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Index: (poll_id, position) for ordered option reads
        manager
            .create_index(
                Index::create()
                    .name("idx_poll_options_poll_position")
                    .table(PollOptions::Table)
                    .col(PollOptions::PollId)
                    .col(PollOptions::Position)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PollVotes::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(PollVotes::PollId).uuid().not_null())
                    .col(ColumnDef::new(PollVotes::OptionId).uuid().not_null())
                    .col(ColumnDef::new(PollVotes::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(PollVotes::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .primary_key(
                        Index::create()
                            .col(PollVotes::PollId)
                            .col(PollVotes::OptionId)
                            .col(PollVotes::UserId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_poll_votes_poll")
                            .from(PollVotes::Table, PollVotes::PollId)
                            .to(Polls::Table, Polls::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_poll_votes_option")
                            .from(PollVotes::Table, (PollVotes::OptionId, PollVotes::PollId))
                            .to(PollOptions::Table, (PollOptions::Id, PollOptions::PollId))
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_poll_votes_user")
                            .from(PollVotes::Table, PollVotes::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: (poll_id, user_id) for ballot replacement
        manager
            .create_index(
                Index::create()
                    .name("idx_poll_votes_poll_user")
                    .table(PollVotes::Table)
                    .col(PollVotes::PollId)
                    .col(PollVotes::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PollRankings::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(PollRankings::PollId).uuid().not_null())
                    .col(ColumnDef::new(PollRankings::UserId).uuid().not_null())
                    .col(ColumnDef::new(PollRankings::OptionId).uuid().not_null())
                    .col(
                        ColumnDef::new(PollRankings::RankPosition)
                            .integer()
                            .not_null()
                            .check(Expr::col(PollRankings::RankPosition).gte(1)),
                    )
                    .col(
                        ColumnDef::new(PollRankings::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .primary_key(
                        Index::create()
                            .col(PollRankings::PollId)
                            .col(PollRankings::UserId)
                            .col(PollRankings::OptionId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_poll_rankings_poll")
                            .from(PollRankings::Table, PollRankings::PollId)
                            .to(Polls::Table, Polls::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_poll_rankings_option")
                            .from(
                                PollRankings::Table,
                                (PollRankings::OptionId, PollRankings::PollId),
                            )
                            .to(PollOptions::Table, (PollOptions::Id, PollOptions::PollId))
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_poll_rankings_user")
                            .from(PollRankings::Table, PollRankings::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: one option per rank position per ballot
        manager
            .create_index(
                Index::create()
                    .name("idx_poll_rankings_poll_user_position")
                    .table(PollRankings::Table)
                    .col(PollRankings::PollId)
                    .col(PollRankings::UserId)
                    .col(PollRankings::RankPosition)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PollRankings::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PollVotes::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PollOptions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Polls::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Polls {
    Table,
    Id,
    TripId,
    CreatedBy,
    Question,
    PollType,
    Deadline,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum PollOptions {
    Table,
    Id,
    PollId,
    OptionType,
    EntityType,
    EntityId,
    Name,
    Position,
    CreatedAt,
}

#[derive(Iden)]
enum PollVotes {
    Table,
    PollId,
    OptionId,
    UserId,
    CreatedAt,
}

#[derive(Iden)]
enum PollRankings {
    Table,
    PollId,
    UserId,
    OptionId,
    RankPosition,
    CreatedAt,
}

#[derive(Iden)]
enum Trips {
    Table,
    Id,
}

#[derive(Iden)]
enum Users {
    Table,
    Id,
}
