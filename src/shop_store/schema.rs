use crate::sqlite_column;
use crate::sqlite_persistence::{Column, SqlType, Table, VersionedSchema};

const SHOPS_TABLE_V1: Table = Table {
    name: "shops",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("domain", &SqlType::Text, non_null = true),
        sqlite_column!("access_token", &SqlType::Text, non_null = true),
        sqlite_column!("timezone", &SqlType::Text, non_null = true),
        sqlite_column!("is_active", &SqlType::Integer, non_null = true),
        sqlite_column!("created_at", &SqlType::Text, non_null = true),
        sqlite_column!("last_sync_at", &SqlType::Text),
    ],
    indices: &[("idx_shops_is_active", "is_active")],
};

const SYNC_RUNS_TABLE_V1: Table = Table {
    name: "sync_runs",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("job_id", &SqlType::Text, non_null = true),
        sqlite_column!("shop_id", &SqlType::Text, non_null = true),
        sqlite_column!("job_type", &SqlType::Text, non_null = true),
        sqlite_column!("started_at", &SqlType::Text, non_null = true),
        sqlite_column!("finished_at", &SqlType::Text),
        sqlite_column!("status", &SqlType::Text, non_null = true),
        sqlite_column!("error_message", &SqlType::Text),
        sqlite_column!("triggered_by", &SqlType::Text, non_null = true),
    ],
    indices: &[
        ("idx_sync_runs_shop_id", "shop_id, started_at DESC"),
        ("idx_sync_runs_status", "status"),
        ("idx_sync_runs_job_id", "job_id"),
    ],
};

pub const SHOP_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 1,
    tables: &[SHOPS_TABLE_V1, SYNC_RUNS_TABLE_V1],
    migration: None,
}];
