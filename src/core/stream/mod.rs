//! Progress Streamer (C7).
//!
//! Server-Sent Events channel over one job's enrichment progress.
//! Ticks on a fixed interval; closes on job completion, absolute
//! timeout, or client disconnect.

use crate::database::{AnalysisItemRecord, Database, JobOps};
use async_stream::stream;
use axum::response::sse::Event;
use serde::Serialize;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::Stream;

#[derive(Debug, Clone, Serialize)]
struct ProgressPayload {
    total: i64,
    resolved: i64,
    status: String,
}

/// Builds the SSE event stream for `job_id`. `tick` and `timeout` come
/// from [`crate::config::SseConfig`]; the stream ends with
/// `enrichment_complete` on terminal job status or `timeout` once the
/// absolute bound elapses. Dropping the returned stream (client
/// disconnect) stops the underlying ticker immediately — there is no
/// separate cancellation path to wire up.
pub fn enrichment_stream(db: Database, job_id: i64, tick: Duration, timeout: Duration) -> impl Stream<Item = Result<Event, Infallible>> {
    stream! {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut last_sent_id: i64 = 0;
        let mut interval = tokio::time::interval(tick);

        loop {
            interval.tick().await;

            if tokio::time::Instant::now() >= deadline {
                yield Ok(Event::default().event("timeout").data("{}"));
                break;
            }

            let Ok(Some(job)) = db.get_job(job_id).await else {
                yield Ok(Event::default().event("timeout").data(r#"{"reason":"job vanished"}"#));
                break;
            };

            let items: Vec<AnalysisItemRecord> = db
                .list_items_by_phase(job_id, crate::core::jobs::PHASE_ENRICHMENT)
                .await
                .unwrap_or_default();

            for item in items.iter().filter(|i| i.id > last_sent_id) {
                last_sent_id = item.id;
                if let Ok(json) = serde_json::to_string(item) {
                    yield Ok(Event::default().event("enrichment_item").data(json));
                }
            }

            let progress = ProgressPayload {
                total: job.enrichment_total,
                resolved: job.enrichment_resolved,
                status: job.status.clone(),
            };
            if let Ok(json) = serde_json::to_string(&progress) {
                yield Ok(Event::default().event("enrichment_progress").data(json));
            }

            if matches!(job.status.as_str(), "completed" | "failed") {
                yield Ok(Event::default().event("enrichment_complete").data(json_status(&job.status)));
                break;
            }
        }
    }
}

fn json_status(status: &str) -> String {
    serde_json::json!({ "status": status }).to_string()
}
