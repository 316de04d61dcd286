use sea_orm_migration::prelude::*;

use crate::m20240101_000001_create_users_table::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Records::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Records::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Records::UserId).uuid().not_null())
                    .col(ColumnDef::new(Records::Attempts).integer().not_null())
                    .col(ColumnDef::new(Records::Result).string_len(20).not_null())
                    .col(ColumnDef::new(Records::Date).date().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_records_user_id")
                            .from(Records::Table, Records::UserId)
                            .to(Users::Table, Users::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // One record per user per day
        manager
            .create_index(
                Index::create()
                    .name("idx_records_user_date")
                    .table(Records::Table)
                    .col(Records::UserId)
                    .col(Records::Date)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Statistics load every finished record
        manager
            .create_index(
                Index::create()
                    .name("idx_records_result")
                    .table(Records::Table)
                    .col(Records::Result)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Records::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Records {
    Table,
    Id,
    UserId,
    Attempts,
    Result,
    Date,
}
