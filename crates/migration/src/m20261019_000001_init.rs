//! Initial schema.
//!
//! - `users`: people, keyed by normalized username
//! - `trips`: one ledger each, keyed by a three-digit code
//! - `members`: a user's participation in a trip
//! - `expenses`: payments fronted by one member
//! - `expense_items`: the parts of an expense
//! - `item_assignments`: who shares an item, optionally with a fixed share

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum Users {
    Table,
    Username,
    DisplayName,
    AvatarUrl,
    CreatedAt,
}

#[derive(Iden)]
enum Trips {
    Table,
    Code,
    Name,
    Place,
    Currency,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Members {
    Table,
    Id,
    TripCode,
    Username,
    JoinedAt,
}

#[derive(Iden)]
enum Expenses {
    Table,
    Id,
    TripCode,
    PayerId,
    Description,
    AmountMinor,
    Currency,
    OccurredAt,
    SettledAt,
    SettledBy,
}

#[derive(Iden)]
enum ExpenseItems {
    Table,
    Id,
    ExpenseId,
    Position,
    Name,
    AmountMinor,
    SettledAt,
    SettledBy,
}

#[derive(Iden)]
enum ItemAssignments {
    Table,
    ItemId,
    MemberId,
    ShareMinor,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Username)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Users::DisplayName).string())
                    .col(ColumnDef::new(Users::AvatarUrl).string())
                    .col(ColumnDef::new(Users::CreatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Trips::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Trips::Code)
                            .integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Trips::Name).string().not_null())
                    .col(ColumnDef::new(Trips::Place).string())
                    .col(
                        ColumnDef::new(Trips::Currency)
                            .string()
                            .not_null()
                            .default("EUR"),
                    )
                    .col(ColumnDef::new(Trips::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Trips::UpdatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        // SQLite only auto-increments an `integer` primary key.
        manager
            .create_table(
                Table::create()
                    .table(Members::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Members::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Members::TripCode).integer().not_null())
                    .col(ColumnDef::new(Members::Username).string().not_null())
                    .col(ColumnDef::new(Members::JoinedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-members-trip_code")
                            .from(Members::Table, Members::TripCode)
                            .to(Trips::Table, Trips::Code)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-members-username")
                            .from(Members::Table, Members::Username)
                            .to(Users::Table, Users::Username)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-members-trip_code-username-unique")
                    .table(Members::Table)
                    .col(Members::TripCode)
                    .col(Members::Username)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Expenses::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Expenses::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Expenses::TripCode).integer().not_null())
                    .col(ColumnDef::new(Expenses::PayerId).big_integer().not_null())
                    .col(ColumnDef::new(Expenses::Description).string().not_null())
                    .col(
                        ColumnDef::new(Expenses::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Expenses::Currency).string().not_null())
                    .col(ColumnDef::new(Expenses::OccurredAt).timestamp().not_null())
                    .col(ColumnDef::new(Expenses::SettledAt).timestamp())
                    .col(ColumnDef::new(Expenses::SettledBy).string())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-expenses-trip_code")
                            .from(Expenses::Table, Expenses::TripCode)
                            .to(Trips::Table, Trips::Code)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-expenses-payer_id")
                            .from(Expenses::Table, Expenses::PayerId)
                            .to(Members::Table, Members::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-expenses-trip_code-occurred_at")
                    .table(Expenses::Table)
                    .col(Expenses::TripCode)
                    .col(Expenses::OccurredAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ExpenseItems::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ExpenseItems::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ExpenseItems::ExpenseId).string().not_null())
                    .col(ColumnDef::new(ExpenseItems::Position).integer().not_null())
                    .col(ColumnDef::new(ExpenseItems::Name).string().not_null())
                    .col(
                        ColumnDef::new(ExpenseItems::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ExpenseItems::SettledAt).timestamp())
                    .col(ColumnDef::new(ExpenseItems::SettledBy).string())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-expense_items-expense_id")
                            .from(ExpenseItems::Table, ExpenseItems::ExpenseId)
                            .to(Expenses::Table, Expenses::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-expense_items-expense_id-position")
                    .table(ExpenseItems::Table)
                    .col(ExpenseItems::ExpenseId)
                    .col(ExpenseItems::Position)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ItemAssignments::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ItemAssignments::ItemId).string().not_null())
                    .col(
                        ColumnDef::new(ItemAssignments::MemberId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ItemAssignments::ShareMinor).big_integer())
                    .primary_key(
                        Index::create()
                            .col(ItemAssignments::ItemId)
                            .col(ItemAssignments::MemberId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-item_assignments-item_id")
                            .from(ItemAssignments::Table, ItemAssignments::ItemId)
                            .to(ExpenseItems::Table, ExpenseItems::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-item_assignments-member_id")
                            .from(ItemAssignments::Table, ItemAssignments::MemberId)
                            .to(Members::Table, Members::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ItemAssignments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ExpenseItems::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Expenses::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Members::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Trips::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}
