//! Bulk indexer / 批量索引
//!
//! Writes records one upsert at a time, keyed by the record id, then forces a
//! refresh so every written record is visible to the next query.
//! Not transactional: under `BestEffort` a failed record does not stop the rest.

use serde::{Deserialize, Serialize};

use crate::backend::{BackendRef, WriteOutcome};
use crate::error::{Result, SearchError};
use crate::models::{CollectionName, Employee};

/// What to do when a single record fails / 单条失败时的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexPolicy {
    /// Log, record and continue / 记录并继续
    #[default]
    BestEffort,
    /// Stop at the first failure and return its error / 首个失败即停止
    FailFast,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexFailure {
    pub id: String,
    pub error: String,
}

/// Per-call indexing summary / 索引结果汇总
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    /// Ids written, in input order / 成功写入的 id
    pub indexed: Vec<String>,
    pub failed: Vec<IndexFailure>,
}

impl IndexReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Clone)]
pub struct BulkIndexer {
    backend: BackendRef,
    policy: IndexPolicy,
}

impl BulkIndexer {
    pub fn new(backend: BackendRef, policy: IndexPolicy) -> Self {
        Self { backend, policy }
    }

    pub fn policy(&self) -> IndexPolicy {
        self.policy
    }

    /// Index records into a collection / 批量写入记录
    pub async fn index_records(&self, collection: &str, records: &[Employee]) -> Result<IndexReport> {
        let collection = CollectionName::parse(collection)?;
        let mut report = IndexReport::default();

        for record in records {
            match self.index_one(&collection, record).await {
                Ok(outcome) => {
                    tracing::debug!(
                        "Indexed employee {} into '{}' ({:?})",
                        record.id,
                        collection,
                        outcome
                    );
                    report.indexed.push(record.id.clone());
                }
                Err(e) => {
                    tracing::warn!("Failed to index employee '{}' into '{}': {}", record.id, collection, e);
                    if self.policy == IndexPolicy::FailFast {
                        // Keep the written prefix visible before bailing out
                        if !report.indexed.is_empty() {
                            if let Err(re) = self.backend.refresh(&collection).await {
                                tracing::warn!("Refresh of '{}' after failed write also failed: {}", collection, re);
                            }
                        }
                        return Err(e);
                    }
                    report.failed.push(IndexFailure { id: record.id.clone(), error: e.to_string() });
                }
            }
        }

        if !report.indexed.is_empty() {
            self.backend.refresh(&collection).await?;
        }

        tracing::info!(
            "Indexed {}/{} records into '{}'",
            report.indexed.len(),
            records.len(),
            collection
        );
        Ok(report)
    }

    async fn index_one(&self, collection: &CollectionName, record: &Employee) -> Result<WriteOutcome> {
        if record.id.trim().is_empty() {
            return Err(SearchError::validation("record id must not be empty"));
        }
        self.backend.put_document(collection, &record.id, &record.source()).await
    }
}
