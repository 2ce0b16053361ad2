use serde::Serialize;
use tracing::{error, warn};

use super::classifier::ChangeSet;
use crate::store::EventStore;

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct DeletionSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Source ids whose deletion errored
    pub failed_ids: Vec<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct ApplyReport {
    pub created: u64,
    pub updated: u64,
    pub create_failed: bool,
    pub update_failed: bool,
    pub deletions: DeletionSummary,
}

impl ApplyReport {
    pub fn is_clean(&self) -> bool {
        !self.create_failed && !self.update_failed && self.deletions.failed == 0
    }
}

/// Write a change set, each step on its own.
///
/// A failed batch is logged and reported; it never stops the other steps.
#[tracing::instrument(skip(store, changes), fields(
    create = changes.to_create.len(),
    update = changes.to_update.len(),
    delete = changes.to_delete.len(),
))]
pub async fn apply_changes(store: &dyn EventStore, calendar_id: i64, changes: ChangeSet) -> ApplyReport {
    let mut report = ApplyReport::default();

    match store.insert_events(&changes.to_create).await {
        Ok(created) => report.created = created,
        Err(e) => {
            error!(error = %e, "batched create failed");
            report.create_failed = true;
        }
    }

    match store.update_events(&changes.to_update).await {
        Ok(updated) => report.updated = updated,
        Err(e) => {
            error!(error = %e, "batched update failed");
            report.update_failed = true;
        }
    }

    for source_id in changes.to_delete {
        report.deletions.attempted += 1;
        match store.delete_event(calendar_id, &source_id).await {
            Ok(_) => report.deletions.succeeded += 1,
            Err(e) => {
                warn!(error = %e, %source_id, "failed to delete event");
                report.deletions.failed += 1;
                report.deletions.failed_ids.push(source_id);
            }
        }
    }

    if report.deletions.failed > 0 {
        warn!(
            attempted = report.deletions.attempted,
            succeeded = report.deletions.succeeded,
            failed = report.deletions.failed,
            "some deletions failed"
        );
    }

    report
}
