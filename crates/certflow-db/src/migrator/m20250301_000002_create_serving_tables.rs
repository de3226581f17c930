use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SslCerts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SslCerts::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(big_integer(SslCerts::AdminId).default(0))
                    .col(big_integer(SslCerts::UserId).default(0))
                    .col(boolean(SslCerts::IsOn).default(true))
                    .col(small_integer(SslCerts::State).default(1))
                    .col(string_len(SslCerts::Name, 255).default(""))
                    .col(text(SslCerts::Description).default(""))
                    .col(string_len(SslCerts::ServerName, 255).default(""))
                    .col(boolean(SslCerts::IsCa).default(false))
                    .col(text(SslCerts::CertData))
                    .col(text(SslCerts::KeyData))
                    .col(timestamp_with_time_zone(SslCerts::TimeBeginAt).not_null())
                    .col(timestamp_with_time_zone(SslCerts::TimeEndAt).not_null())
                    .col(text(SslCerts::DnsNames))
                    .col(text(SslCerts::CommonNames))
                    .col(boolean(SslCerts::IsAcme).default(false))
                    .col(big_integer_null(SslCerts::AcmeTaskId))
                    .col(
                        timestamp_with_time_zone(SslCerts::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(SslCerts::UpdatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SslPolicies::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SslPolicies::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(big_integer(SslPolicies::AdminId).default(0))
                    .col(big_integer(SslPolicies::UserId).default(0))
                    .col(boolean(SslPolicies::IsOn).default(true))
                    .col(small_integer(SslPolicies::State).default(1))
                    .col(text(SslPolicies::Certs))
                    .col(text_null(SslPolicies::ClientCaCerts))
                    .col(integer(SslPolicies::ClientAuthType).default(0))
                    .col(string_len(SslPolicies::MinVersion, 32).default(""))
                    .col(boolean(SslPolicies::CipherSuitesIsOn).default(false))
                    .col(text_null(SslPolicies::CipherSuites))
                    .col(text_null(SslPolicies::Hsts))
                    .col(boolean(SslPolicies::Http2Enabled).default(true))
                    .col(boolean(SslPolicies::Http3Enabled).default(false))
                    .col(boolean(SslPolicies::OcspIsOn).default(false))
                    .col(
                        timestamp_with_time_zone(SslPolicies::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(SslPolicies::UpdatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Servers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Servers::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(big_integer(Servers::AdminId).default(0))
                    .col(big_integer(Servers::UserId).default(0))
                    .col(string_len(Servers::Name, 255).default(""))
                    .col(text(Servers::ServerNames))
                    .col(text_null(Servers::Https))
                    .col(boolean(Servers::IsOn).default(true))
                    .col(small_integer(Servers::State).default(1))
                    .col(
                        timestamp_with_time_zone(Servers::CreatedAt)
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
            .drop_table(Table::drop().table(Servers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SslPolicies::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SslCerts::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum SslCerts {
    Table,
    Id,
    AdminId,
    UserId,
    IsOn,
    State,
    Name,
    Description,
    ServerName,
    IsCa,
    CertData,
    KeyData,
    TimeBeginAt,
    TimeEndAt,
    DnsNames,
    CommonNames,
    IsAcme,
    AcmeTaskId,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum SslPolicies {
    Table,
    Id,
    AdminId,
    UserId,
    IsOn,
    State,
    Certs,
    ClientCaCerts,
    ClientAuthType,
    MinVersion,
    CipherSuitesIsOn,
    CipherSuites,
    Hsts,
    Http2Enabled,
    Http3Enabled,
    OcspIsOn,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Servers {
    Table,
    Id,
    AdminId,
    UserId,
    Name,
    ServerNames,
    Https,
    IsOn,
    State,
    CreatedAt,
}
