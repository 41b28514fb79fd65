//! Content chunk database operations backing the context builder's (C5)
//! lexical retrieval leg.

use super::models::ContentChunkRecord;
use super::Database;

pub trait ChunkOps {
    fn add_chunk(&self, chunk: &ContentChunkRecord) -> impl std::future::Future<Output = Result<i64, sqlx::Error>> + Send;

    /// BM25-ranked lexical search, optionally scoped to a campaign. `limit`
    /// caps the number of rows returned.
    fn search_chunks(
        &self,
        query: &str,
        campaign_id: Option<&str>,
        limit: i64,
    ) -> impl std::future::Future<Output = Result<Vec<(ContentChunkRecord, f64)>, sqlx::Error>> + Send;
}

impl ChunkOps for Database {
    async fn add_chunk(&self, chunk: &ContentChunkRecord) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO content_chunks
                (campaign_id, chunk_kind, source_table, source_id, entity_id, entity_name,
                 chunk_text, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&chunk.campaign_id)
        .bind(&chunk.chunk_kind)
        .bind(&chunk.source_table)
        .bind(&chunk.source_id)
        .bind(&chunk.entity_id)
        .bind(&chunk.entity_name)
        .bind(&chunk.chunk_text)
        .bind(&chunk.created_at)
        .execute(self.pool())
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn search_chunks(
        &self,
        query: &str,
        campaign_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<(ContentChunkRecord, f64)>, sqlx::Error> {
        // FTS5 raises on queries containing bare punctuation tokenized as
        // operators; a quoted phrase query sidesteps that entirely.
        let fts_query = format!("\"{}\"", query.replace('"', "\"\""));

        let rows: Vec<(i64, f64)> = if let Some(campaign_id) = campaign_id {
            sqlx::query_as(
                r#"
                SELECT c.id, bm25(content_chunks_fts) as rank
                FROM content_chunks_fts
                JOIN content_chunks c ON c.id = content_chunks_fts.rowid
                WHERE content_chunks_fts MATCH ? AND (c.campaign_id = ? OR c.campaign_id IS NULL)
                ORDER BY rank
                LIMIT ?
                "#,
            )
            .bind(&fts_query)
            .bind(campaign_id)
            .bind(limit)
            .fetch_all(self.pool())
            .await?
        } else {
            sqlx::query_as(
                r#"
                SELECT c.id, bm25(content_chunks_fts) as rank
                FROM content_chunks_fts
                JOIN content_chunks c ON c.id = content_chunks_fts.rowid
                WHERE content_chunks_fts MATCH ?
                ORDER BY rank
                LIMIT ?
                "#,
            )
            .bind(&fts_query)
            .bind(limit)
            .fetch_all(self.pool())
            .await?
        };

        let mut out = Vec::with_capacity(rows.len());
        for (id, rank) in rows {
            if let Some(chunk) =
                sqlx::query_as::<_, ContentChunkRecord>("SELECT * FROM content_chunks WHERE id = ?")
                    .bind(id)
                    .fetch_optional(self.pool())
                    .await?
            {
                out.push((chunk, rank));
            }
        }
        Ok(out)
    }
}
