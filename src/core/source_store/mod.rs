//! Source Store Adapter (C2).
//!
//! Typed read/write of the six recognised `(sourceTable, sourceField)`
//! pairs, scoped by campaign. The actual SQL lives in
//! [`crate::database::source_fields`]; this module is the component
//! boundary the rest of the core logic (C3's `analyse`, C4's resolver
//! text fix) calls through.

use crate::database::source_fields;
use crate::error::AppResult;
use sqlx::SqlitePool;

pub async fn fetch(
    pool: &SqlitePool,
    campaign_id: &str,
    source_table: &str,
    source_field: &str,
    source_id: &str,
) -> AppResult<String> {
    source_fields::fetch(pool, campaign_id, source_table, source_field, source_id).await
}

pub async fn write(
    pool: &SqlitePool,
    campaign_id: &str,
    source_table: &str,
    source_field: &str,
    source_id: &str,
    new_text: &str,
    updated_at: &str,
) -> AppResult<()> {
    source_fields::write(pool, campaign_id, source_table, source_field, source_id, new_text, updated_at).await
}
