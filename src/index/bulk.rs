//! Bulk ingestion options and results

use crate::engine::{BulkItemResult, BulkOperation, Refresh};
use serde::{Deserialize, Serialize};

/// Options for `bulk_index`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkOptions {
    /// Documents per engine request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Refresh requested with the final batch
    #[serde(default)]
    pub refresh: Refresh,
}

impl BulkOptions {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_refresh(mut self, refresh: Refresh) -> Self {
        self.refresh = refresh;
        self
    }
}

impl Default for BulkOptions {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            refresh: Refresh::default(),
        }
    }
}

fn default_batch_size() -> usize {
    1000
}

/// A document the engine did not accept
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkItemError {
    /// Position in the caller's document list
    pub position: usize,
    pub document_id: Option<String>,
    pub error_type: String,
    pub reason: String,
}

/// Aggregate outcome of a bulk ingestion
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkIndexResult {
    pub success: bool,
    pub indexed: usize,
    pub failed: usize,
    /// Per-document failures ordered by position
    pub errors: Vec<BulkItemError>,
    /// Engine requests attempted
    pub batches: usize,
}

impl BulkIndexResult {
    pub(crate) fn new() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }

    /// Account for one batch the engine answered item by item
    pub(crate) fn record_items(
        &mut self,
        positions: &[usize],
        ops: &[BulkOperation],
        items: Vec<BulkItemResult>,
    ) {
        self.batches += 1;
        let mut items = items.into_iter();
        for (position, op) in positions.iter().zip(ops) {
            match items.next() {
                Some(item) if item.is_success() => self.indexed += 1,
                Some(item) => {
                    let (error_type, reason) = item
                        .error
                        .map(|e| (e.error_type, e.reason))
                        .unwrap_or_default();
                    self.push_error(*position, item.id.or_else(|| op.id.clone()), error_type, reason);
                }
                None => self.push_error(
                    *position,
                    op.id.clone(),
                    "missing_item".to_string(),
                    "engine returned no result for this document".to_string(),
                ),
            }
        }
    }

    /// Count every document of a batch as failed with one cause
    pub(crate) fn record_batch_failure(
        &mut self,
        positions: &[usize],
        ops: &[BulkOperation],
        error_type: &str,
        reason: &str,
    ) {
        self.batches += 1;
        for (position, op) in positions.iter().zip(ops) {
            self.push_error(*position, op.id.clone(), error_type.to_string(), reason.to_string());
        }
    }

    /// A document rejected before sending
    pub(crate) fn record_invalid(&mut self, position: usize, reason: &str) {
        self.push_error(position, None, "invalid_document".to_string(), reason.to_string());
    }

    /// Order errors by document position
    pub(crate) fn finish(mut self) -> Self {
        self.errors.sort_by_key(|e| e.position);
        self
    }

    fn push_error(&mut self, position: usize, document_id: Option<String>, error_type: String, reason: String) {
        self.failed += 1;
        self.success = false;
        self.errors.push(BulkItemError {
            position,
            document_id,
            error_type,
            reason,
        });
    }
}
