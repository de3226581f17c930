//! Initial schema for ACME issuance state

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ============================================================
        // 1. Tasks
        // ============================================================
        manager
            .create_table(
                Table::create()
                    .table(AcmeTasks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AcmeTasks::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(big_integer(AcmeTasks::AdminId).default(0))
                    .col(big_integer(AcmeTasks::UserId).default(0))
                    .col(string_len(AcmeTasks::AuthType, 16).not_null())
                    .col(big_integer(AcmeTasks::AcmeAccountId).default(0))
                    .col(big_integer_null(AcmeTasks::DnsProviderId))
                    .col(string_len(AcmeTasks::DnsDomain, 255).default(""))
                    .col(text(AcmeTasks::Domains))
                    .col(boolean(AcmeTasks::AutoRenew).default(false))
                    .col(text_null(AcmeTasks::AuthUrl))
                    .col(boolean(AcmeTasks::IsOn).default(true))
                    .col(small_integer(AcmeTasks::State).default(1))
                    .col(integer(AcmeTasks::Status).default(0))
                    .col(big_integer_null(AcmeTasks::CertId))
                    .col(boolean(AcmeTasks::IsAsync).default(false))
                    .col(
                        timestamp_with_time_zone(AcmeTasks::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_acme_tasks_user_id")
                    .table(AcmeTasks::Table)
                    .col(AcmeTasks::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_acme_tasks_cert_id")
                    .table(AcmeTasks::Table)
                    .col(AcmeTasks::CertId)
                    .to_owned(),
            )
            .await?;

        // ============================================================
        // 2. Accounts and shared EAB credentials
        // ============================================================
        manager
            .create_table(
                Table::create()
                    .table(AcmeAccounts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AcmeAccounts::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(big_integer(AcmeAccounts::AdminId).default(0))
                    .col(big_integer(AcmeAccounts::UserId).default(0))
                    .col(string_len(AcmeAccounts::Email, 255).not_null())
                    .col(text(AcmeAccounts::PrivateKey))
                    .col(text_null(AcmeAccounts::Registration))
                    .col(string_len(AcmeAccounts::ProviderCode, 64).default(""))
                    .col(big_integer_null(AcmeAccounts::ProviderAccountId))
                    .col(text(AcmeAccounts::Description).default(""))
                    .col(small_integer(AcmeAccounts::State).default(1))
                    .col(
                        timestamp_with_time_zone(AcmeAccounts::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_acme_accounts_provider_code")
                    .table(AcmeAccounts::Table)
                    .col(AcmeAccounts::ProviderCode)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AcmeProviderAccounts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AcmeProviderAccounts::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(string_len(AcmeProviderAccounts::ProviderCode, 64).not_null())
                    .col(string_len(AcmeProviderAccounts::Name, 255).default(""))
                    .col(string_len(AcmeProviderAccounts::EabKid, 255).not_null())
                    .col(text(AcmeProviderAccounts::EabKey))
                    .col(boolean(AcmeProviderAccounts::IsOn).default(true))
                    .col(small_integer(AcmeProviderAccounts::State).default(1))
                    .col(
                        timestamp_with_time_zone(AcmeProviderAccounts::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // ============================================================
        // 3. Challenge authentications and run logs
        // ============================================================
        manager
            .create_table(
                Table::create()
                    .table(AcmeAuthentications::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AcmeAuthentications::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(big_integer(AcmeAuthentications::TaskId))
                    .col(string_len(AcmeAuthentications::Domain, 255).not_null())
                    .col(string_len(AcmeAuthentications::Token, 255).not_null())
                    .col(text(AcmeAuthentications::Key))
                    .col(
                        timestamp_with_time_zone(AcmeAuthentications::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Token lookups serve /.well-known requests
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_acme_authentications_token")
                    .table(AcmeAuthentications::Table)
                    .col(AcmeAuthentications::Token)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AcmeTaskLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AcmeTaskLogs::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(big_integer(AcmeTaskLogs::TaskId))
                    .col(boolean(AcmeTaskLogs::IsOk))
                    .col(text(AcmeTaskLogs::Error).default(""))
                    .col(
                        timestamp_with_time_zone(AcmeTaskLogs::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_acme_task_logs_task_id")
                    .table(AcmeTaskLogs::Table)
                    .col(AcmeTaskLogs::TaskId)
                    .to_owned(),
            )
            .await?;

        // ============================================================
        // 4. DNS provider credentials
        // ============================================================
        manager
            .create_table(
                Table::create()
                    .table(DnsProviders::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DnsProviders::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(big_integer(DnsProviders::AdminId).default(0))
                    .col(big_integer(DnsProviders::UserId).default(0))
                    .col(string_len(DnsProviders::Name, 255).default(""))
                    .col(string_len(DnsProviders::ProviderType, 64).not_null())
                    .col(text(DnsProviders::ApiParams))
                    .col(integer(DnsProviders::MinTtl).default(0))
                    .col(small_integer(DnsProviders::State).default(1))
                    .col(
                        timestamp_with_time_zone(DnsProviders::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DnsProviders::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AcmeTaskLogs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AcmeAuthentications::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AcmeProviderAccounts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AcmeAccounts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AcmeTasks::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum AcmeTasks {
    Table,
    Id,
    AdminId,
    UserId,
    AuthType,
    AcmeAccountId,
    DnsProviderId,
    DnsDomain,
    Domains,
    AutoRenew,
    AuthUrl,
    IsOn,
    State,
    Status,
    CertId,
    IsAsync,
    CreatedAt,
}

#[derive(DeriveIden)]
enum AcmeAccounts {
    Table,
    Id,
    AdminId,
    UserId,
    Email,
    PrivateKey,
    Registration,
    ProviderCode,
    ProviderAccountId,
    Description,
    State,
    CreatedAt,
}

#[derive(DeriveIden)]
enum AcmeProviderAccounts {
    Table,
    Id,
    ProviderCode,
    Name,
    EabKid,
    EabKey,
    IsOn,
    State,
    CreatedAt,
}

#[derive(DeriveIden)]
enum AcmeAuthentications {
    Table,
    Id,
    TaskId,
    Domain,
    Token,
    Key,
    CreatedAt,
}

#[derive(DeriveIden)]
enum AcmeTaskLogs {
    Table,
    Id,
    TaskId,
    IsOk,
    Error,
    CreatedAt,
}

#[derive(DeriveIden)]
enum DnsProviders {
    Table,
    Id,
    AdminId,
    UserId,
    Name,
    ProviderType,
    ApiParams,
    MinTtl,
    State,
    CreatedAt,
}
