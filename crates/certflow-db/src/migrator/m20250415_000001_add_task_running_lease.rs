use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Lets the scheduler reclaim tasks stuck in Running after a crash
        manager
            .alter_table(
                Table::alter()
                    .table(AcmeTasks::Table)
                    .add_column(
                        ColumnDef::new(AcmeTasks::RunningLeaseUntil)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .alter_table(
                Table::alter()
                    .table(AcmeTasks::Table)
                    .drop_column(AcmeTasks::RunningLeaseUntil)
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
enum AcmeTasks {
    Table,
    RunningLeaseUntil,
}
