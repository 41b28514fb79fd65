//! Database Migrations
//!
//! Handles schema creation and versioned migrations, following the same
//! migrations-table + numbered-const pattern the corpus uses for its own
//! SQLite schema evolution.

use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use tracing::{info, warn};

/// Current database schema version.
const SCHEMA_VERSION: i32 = 2;

/// Run all pending migrations.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    let current_version = get_current_version(pool).await?;

    info!(current_version, target_version = SCHEMA_VERSION, "checking database migrations");

    if current_version < SCHEMA_VERSION {
        info!(from = current_version, to = SCHEMA_VERSION, "running database migrations");
        for version in (current_version + 1)..=SCHEMA_VERSION {
            run_migration(pool, version).await?;
        }
        info!("database migrations completed");
    }

    Ok(())
}

async fn get_current_version(pool: &SqlitePool) -> Result<i32, sqlx::Error> {
    let result = sqlx::query("SELECT MAX(version) as version FROM _migrations")
        .fetch_optional(pool)
        .await?;

    Ok(result
        .and_then(|row| row.try_get::<i32, _>("version").ok())
        .unwrap_or(0))
}

async fn run_migration(pool: &SqlitePool, version: i32) -> Result<(), sqlx::Error> {
    let (name, sql) = match version {
        1 => ("initial_schema", MIGRATION_V1),
        2 => ("content_chunks_fts", MIGRATION_V2),
        _ => {
            warn!(version, "unknown migration version");
            return Ok(());
        }
    };

    info!(version, name, "applying migration");

    for statement in sql.split(';').filter(|s| !s.trim().is_empty()) {
        sqlx::query(statement.trim()).execute(pool).await?;
    }

    sqlx::query("INSERT INTO _migrations (version, name) VALUES (?, ?)")
        .bind(version)
        .bind(name)
        .execute(pool)
        .await?;

    Ok(())
}

/// Migration v1: campaigns, entities, the CAES job/item tables, and the
/// scaffold tables (`users`, `chapters`, `sessions`) the source store
/// adapter needs to scope joins against (see SPEC_FULL.md §3).
const MIGRATION_V1: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS campaigns (
    id TEXT PRIMARY KEY,
    owner_user_id TEXT NOT NULL,
    name TEXT NOT NULL,
    description TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    FOREIGN KEY (owner_user_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_campaigns_owner ON campaigns(owner_user_id);

CREATE TABLE IF NOT EXISTS entities (
    id TEXT PRIMARY KEY,
    campaign_id TEXT NOT NULL,
    entity_type TEXT NOT NULL,
    name TEXT NOT NULL,
    description TEXT,
    gm_notes TEXT,
    attributes_json TEXT NOT NULL DEFAULT '{}',
    tags_json TEXT NOT NULL DEFAULT '[]',
    source_confidence TEXT NOT NULL DEFAULT 'draft',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    FOREIGN KEY (campaign_id) REFERENCES campaigns(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_entities_campaign ON entities(campaign_id);
CREATE INDEX IF NOT EXISTS idx_entities_name ON entities(campaign_id, name);

CREATE TABLE IF NOT EXISTS chapters (
    id TEXT PRIMARY KEY,
    campaign_id TEXT NOT NULL,
    overview TEXT,
    updated_at TEXT NOT NULL,
    FOREIGN KEY (campaign_id) REFERENCES campaigns(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_chapters_campaign ON chapters(campaign_id);

CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    chapter_id TEXT NOT NULL,
    prep_notes TEXT,
    actual_notes TEXT,
    updated_at TEXT NOT NULL,
    FOREIGN KEY (chapter_id) REFERENCES chapters(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_sessions_chapter ON sessions(chapter_id);

CREATE TABLE IF NOT EXISTS content_analysis_jobs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    campaign_id TEXT NOT NULL,
    source_table TEXT NOT NULL,
    source_id TEXT NOT NULL,
    source_field TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'completed',
    total_items INTEGER NOT NULL DEFAULT 0,
    resolved_items INTEGER NOT NULL DEFAULT 0,
    enrichment_total INTEGER NOT NULL DEFAULT 0,
    enrichment_resolved INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    FOREIGN KEY (campaign_id) REFERENCES campaigns(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_jobs_campaign ON content_analysis_jobs(campaign_id);
CREATE INDEX IF NOT EXISTS idx_jobs_source_tuple
    ON content_analysis_jobs(campaign_id, source_table, source_id, source_field);

CREATE TABLE IF NOT EXISTS content_analysis_items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id INTEGER NOT NULL,
    phase TEXT NOT NULL,
    detection_type TEXT NOT NULL,
    matched_text TEXT NOT NULL,
    entity_id TEXT,
    similarity REAL,
    context_snippet TEXT,
    position_start INTEGER,
    position_end INTEGER,
    suggested_content_json TEXT,
    resolution TEXT NOT NULL DEFAULT 'pending',
    resolved_entity_id TEXT,
    entity_name TEXT,
    entity_type TEXT,
    created_at TEXT NOT NULL,
    FOREIGN KEY (job_id) REFERENCES content_analysis_jobs(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_items_job ON content_analysis_items(job_id);
CREATE INDEX IF NOT EXISTS idx_items_job_phase ON content_analysis_items(job_id, phase);
CREATE INDEX IF NOT EXISTS idx_items_job_resolution ON content_analysis_items(job_id, resolution);

CREATE TABLE IF NOT EXISTS entity_logs (
    id TEXT PRIMARY KEY,
    entity_id TEXT NOT NULL,
    campaign_id TEXT NOT NULL,
    content TEXT NOT NULL,
    confirmed INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    FOREIGN KEY (entity_id) REFERENCES entities(id) ON DELETE CASCADE,
    FOREIGN KEY (campaign_id) REFERENCES campaigns(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_entity_logs_entity ON entity_logs(entity_id);
CREATE INDEX IF NOT EXISTS idx_entity_logs_campaign ON entity_logs(campaign_id);

CREATE TABLE IF NOT EXISTS relationships (
    id TEXT PRIMARY KEY,
    campaign_id TEXT NOT NULL,
    source_entity_id TEXT NOT NULL,
    target_entity_id TEXT NOT NULL,
    relationship_type TEXT NOT NULL,
    symmetric INTEGER NOT NULL DEFAULT 0,
    tone TEXT,
    strength REAL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    FOREIGN KEY (campaign_id) REFERENCES campaigns(id) ON DELETE CASCADE,
    FOREIGN KEY (source_entity_id) REFERENCES entities(id) ON DELETE CASCADE,
    FOREIGN KEY (target_entity_id) REFERENCES entities(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_relationships_campaign ON relationships(campaign_id);
CREATE INDEX IF NOT EXISTS idx_relationships_source ON relationships(source_entity_id);
CREATE INDEX IF NOT EXISTS idx_relationships_target ON relationships(target_entity_id);

CREATE TABLE IF NOT EXISTS constraint_overrides (
    id TEXT PRIMARY KEY,
    campaign_id TEXT NOT NULL,
    constraint_type TEXT NOT NULL,
    override_key TEXT NOT NULL,
    created_at TEXT NOT NULL,
    FOREIGN KEY (campaign_id) REFERENCES campaigns(id) ON DELETE CASCADE,
    UNIQUE(campaign_id, constraint_type, override_key)
);

CREATE INDEX IF NOT EXISTS idx_constraint_overrides_campaign ON constraint_overrides(campaign_id);
"#;

/// Migration v2: per-chunk lexical index backing the Context Builder's
/// (C5) BM25 leg and its no-vector-index fallback. One row per
/// retrievable chunk of campaign or rulebook content; the FTS5 virtual
/// table mirrors `chunk_text` for ranked search.
const MIGRATION_V2: &str = r#"
CREATE TABLE IF NOT EXISTS content_chunks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    campaign_id TEXT,
    chunk_kind TEXT NOT NULL,
    source_table TEXT,
    source_id TEXT,
    entity_id TEXT,
    entity_name TEXT,
    chunk_text TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_content_chunks_campaign ON content_chunks(campaign_id);
CREATE INDEX IF NOT EXISTS idx_content_chunks_kind ON content_chunks(chunk_kind);
CREATE INDEX IF NOT EXISTS idx_content_chunks_source
    ON content_chunks(source_table, source_id);

CREATE VIRTUAL TABLE IF NOT EXISTS content_chunks_fts USING fts5(
    chunk_text,
    content='content_chunks',
    content_rowid='id'
);

CREATE TRIGGER IF NOT EXISTS content_chunks_ai AFTER INSERT ON content_chunks BEGIN
    INSERT INTO content_chunks_fts(rowid, chunk_text) VALUES (new.id, new.chunk_text);
END;

CREATE TRIGGER IF NOT EXISTS content_chunks_ad AFTER DELETE ON content_chunks BEGIN
    INSERT INTO content_chunks_fts(content_chunks_fts, rowid, chunk_text)
    VALUES ('delete', old.id, old.chunk_text);
END;

CREATE TRIGGER IF NOT EXISTS content_chunks_au AFTER UPDATE ON content_chunks BEGIN
    INSERT INTO content_chunks_fts(content_chunks_fts, rowid, chunk_text)
    VALUES ('delete', old.id, old.chunk_text);
    INSERT INTO content_chunks_fts(rowid, chunk_text) VALUES (new.id, new.chunk_text);
END;
"#;
