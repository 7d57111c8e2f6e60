//! Scheduler Routes
//!
//! - GET /api/v1/scheduler/status - Daily metrics scheduler status

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::api::state::AppState;
use crate::scheduler::SchedulerStatus;

/// GET /api/v1/scheduler/status
pub async fn scheduler_status(State(state): State<Arc<AppState>>) -> Json<SchedulerStatus> {
    let status = match &state.scheduler {
        Some(scheduler) => scheduler.status().await,
        None => SchedulerStatus {
            enabled: false,
            running: false,
            interval_hours: 0,
            runs: 0,
            last_run: None,
            next_run: None,
            last_summary: None,
        },
    };
    Json(status)
}
