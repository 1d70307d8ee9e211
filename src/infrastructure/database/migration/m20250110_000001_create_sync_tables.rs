//! Migration to create all sync engine tables

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Locally authored content types
        manager
            .create_table(
                Table::create()
                    .table(ContentTypes::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ContentTypes::Id).integer().not_null().auto_increment().primary_key())
                    .col(ColumnDef::new(ContentTypes::TypeKey).string().not_null().unique_key())
                    .col(ColumnDef::new(ContentTypes::Name).string().not_null())
                    .col(ColumnDef::new(ContentTypes::Category).string())
                    .col(ColumnDef::new(ContentTypes::Definition).json().not_null())
                    .col(ColumnDef::new(ContentTypes::CreatedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(ContentTypes::UpdatedAt).timestamp_with_time_zone().not_null())
                    .to_owned(),
            )
            .await?;

        // Append-only version history
        manager
            .create_table(
                Table::create()
                    .table(ContentTypeVersions::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ContentTypeVersions::Id).integer().not_null().auto_increment().primary_key())
                    .col(ColumnDef::new(ContentTypeVersions::VersionHash).string().not_null().unique_key())
                    .col(ColumnDef::new(ContentTypeVersions::TypeKey).string().not_null())
                    .col(ColumnDef::new(ContentTypeVersions::Snapshot).json().not_null())
                    .col(ColumnDef::new(ContentTypeVersions::ChangeSource).string().not_null())
                    .col(ColumnDef::new(ContentTypeVersions::Author).string())
                    .col(ColumnDef::new(ContentTypeVersions::Message).string())
                    .col(ColumnDef::new(ContentTypeVersions::CreatedAt).timestamp_with_time_zone().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_versions_type_key")
                    .table(ContentTypeVersions::Table)
                    .col(ContentTypeVersions::TypeKey)
                    .to_owned(),
            )
            .await?;

        // Parent links: always the join-table representation, 0..N rows per
        // version (merge records carry two or more)
        manager
            .create_table(
                Table::create()
                    .table(VersionParents::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(VersionParents::Id).integer().not_null().auto_increment().primary_key())
                    .col(ColumnDef::new(VersionParents::VersionId).integer().not_null())
                    .col(ColumnDef::new(VersionParents::ParentHash).string().not_null())
                    .col(ColumnDef::new(VersionParents::Ordinal).integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .from(VersionParents::Table, VersionParents::VersionId)
                            .to(ContentTypeVersions::Table, ContentTypeVersions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_version_parents_version_id")
                    .table(VersionParents::Table)
                    .col(VersionParents::VersionId)
                    .to_owned(),
            )
            .await?;

        // Per-type durable sync state
        manager
            .create_table(
                Table::create()
                    .table(SyncStates::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(SyncStates::Id).integer().not_null().auto_increment().primary_key())
                    .col(ColumnDef::new(SyncStates::TypeKey).string().not_null().unique_key())
                    .col(ColumnDef::new(SyncStates::LocalHash).string())
                    .col(ColumnDef::new(SyncStates::RemoteHash).string())
                    .col(ColumnDef::new(SyncStates::LastSyncedHash).string())
                    .col(ColumnDef::new(SyncStates::SyncStatus).string().not_null())
                    .col(ColumnDef::new(SyncStates::ConflictStatus).string().not_null())
                    .col(ColumnDef::new(SyncStates::SyncProgress).json())
                    .col(ColumnDef::new(SyncStates::LastSyncAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(SyncStates::LastConflictAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(SyncStates::CreatedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(SyncStates::UpdatedAt).timestamp_with_time_zone().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_sync_states_status")
                    .table(SyncStates::Table)
                    .col(SyncStates::SyncStatus)
                    .to_owned(),
            )
            .await?;

        // Open and resolved conflicts
        manager
            .create_table(
                Table::create()
                    .table(Conflicts::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Conflicts::Id).integer().not_null().auto_increment().primary_key())
                    .col(ColumnDef::new(Conflicts::Uuid).uuid().not_null().unique_key())
                    .col(ColumnDef::new(Conflicts::TypeKey).string().not_null())
                    .col(ColumnDef::new(Conflicts::ConflictType).string().not_null())
                    .col(ColumnDef::new(Conflicts::Severity).string().not_null())
                    .col(ColumnDef::new(Conflicts::SourceChanges).json().not_null())
                    .col(ColumnDef::new(Conflicts::TargetChanges).json().not_null())
                    .col(ColumnDef::new(Conflicts::Priority).integer().not_null().default(0))
                    .col(ColumnDef::new(Conflicts::Resolution).json())
                    .col(ColumnDef::new(Conflicts::ResolvedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Conflicts::CreatedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Conflicts::UpdatedAt).timestamp_with_time_zone().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_conflicts_type_key")
                    .table(Conflicts::Table)
                    .col(Conflicts::TypeKey)
                    .to_owned(),
            )
            .await?;

        // Sync attempt log
        manager
            .create_table(
                Table::create()
                    .table(SyncHistory::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(SyncHistory::Id).integer().not_null().auto_increment().primary_key())
                    .col(ColumnDef::new(SyncHistory::DeploymentId).uuid().not_null())
                    .col(ColumnDef::new(SyncHistory::TypeKey).string().not_null())
                    .col(ColumnDef::new(SyncHistory::Direction).string().not_null())
                    .col(ColumnDef::new(SyncHistory::Attempt).integer().not_null())
                    .col(ColumnDef::new(SyncHistory::Outcome).string().not_null())
                    .col(ColumnDef::new(SyncHistory::Message).string())
                    .col(ColumnDef::new(SyncHistory::SnapshotHash).string())
                    .col(ColumnDef::new(SyncHistory::CreatedAt).timestamp_with_time_zone().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_sync_history_deployment")
                    .table(SyncHistory::Table)
                    .col(SyncHistory::DeploymentId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SyncHistory::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Conflicts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SyncStates::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(VersionParents::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ContentTypeVersions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ContentTypes::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(Iden)]
enum ContentTypes {
    Table,
    Id,
    TypeKey,
    Name,
    Category,
    Definition,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum ContentTypeVersions {
    Table,
    Id,
    VersionHash,
    TypeKey,
    Snapshot,
    ChangeSource,
    Author,
    Message,
    CreatedAt,
}

#[derive(Iden)]
enum VersionParents {
    Table,
    Id,
    VersionId,
    ParentHash,
    Ordinal,
}

#[derive(Iden)]
enum SyncStates {
    Table,
    Id,
    TypeKey,
    LocalHash,
    RemoteHash,
    LastSyncedHash,
    SyncStatus,
    ConflictStatus,
    SyncProgress,
    LastSyncAt,
    LastConflictAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Conflicts {
    Table,
    Id,
    Uuid,
    TypeKey,
    ConflictType,
    Severity,
    SourceChanges,
    TargetChanges,
    Priority,
    Resolution,
    ResolvedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum SyncHistory {
    Table,
    Id,
    DeploymentId,
    TypeKey,
    Direction,
    Attempt,
    Outcome,
    Message,
    SnapshotHash,
    CreatedAt,
}
