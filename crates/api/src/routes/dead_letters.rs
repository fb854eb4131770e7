//! Operator endpoints for the dead-letter quarantine.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use ingestion::{DeadLetterQueue, DeadLetterRecord, IngestionQueue};
use order_store::OrderStore;
use serde::Serialize;

use crate::error::ApiError;
use crate::routes::orders::AppState;

#[derive(Serialize)]
pub struct DeadLetterResponse {
    pub id: String,
    pub order_id: String,
    pub receive_count: u32,
    pub first_failure_at: DateTime<Utc>,
    pub last_error: String,
    pub quarantined_at: DateTime<Utc>,
}

impl From<DeadLetterRecord> for DeadLetterResponse {
    fn from(record: DeadLetterRecord) -> Self {
        DeadLetterResponse {
            id: record.id.to_string(),
            order_id: record.message.order_id.to_string(),
            receive_count: record.receive_count,
            first_failure_at: record.first_failure_at,
            last_error: record.last_error,
            quarantined_at: record.quarantined_at,
        }
    }
}

#[derive(Serialize)]
pub struct ReplayResponse {
    pub id: String,
    pub order_id: String,
    pub requeued: bool,
}

/// GET /dead-letters — list quarantined messages for inspection.
#[tracing::instrument(skip(state))]
pub async fn list<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<DeadLetterResponse>>, ApiError> {
    let records = state
        .dead_letters
        .list()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(records.into_iter().map(Into::into).collect()))
}

/// POST /dead-letters/{id}/replay — re-enqueue a quarantined message.
///
/// Replay is strictly manual: an operator root-causes the failure first,
/// then asks for exactly this record to go back on the queue.
#[tracing::instrument(skip(state))]
pub async fn replay<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<ReplayResponse>, ApiError> {
    let record_id = uuid::Uuid::parse_str(&id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid dead-letter id: {e}")))?;

    let record = state
        .dead_letters
        .take(record_id)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .ok_or_else(|| ApiError::NotFound(format!("Dead-letter record {id} not found")))?;

    let order_id = record.message.order_id;
    state
        .queue
        .send(record.message)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    tracing::info!(%order_id, record_id = %id, "dead-letter message replayed");

    Ok(Json(ReplayResponse {
        id,
        order_id: order_id.to_string(),
        requeued: true,
    }))
}
