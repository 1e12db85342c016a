//! Query service / 查询服务
//!
//! Stateless operations over a named collection: field search, point lookup,
//! delete by id, count and keyword facets. Results keep the backend order.

use serde::Serialize;

use crate::backend::{BackendRef, SearchQuery};
use crate::error::{Result, SearchError};
use crate::models::{CollectionName, CollectionSchema, FacetBucket, FieldType, Hit};

/// Outcome of `delete_by_id` / 删除结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    Deleted,
    /// Existed at check time but the engine did not confirm the delete
    /// (usually a concurrent delete won) / 未确认删除
    NotDeleted,
    NotFound,
}

#[derive(Clone)]
pub struct QueryService {
    backend: BackendRef,
    schema: CollectionSchema,
    max_hits: usize,
    facet_size: usize,
}

impl QueryService {
    pub fn new(backend: BackendRef, max_hits: usize, facet_size: usize) -> Self {
        Self {
            backend,
            schema: CollectionSchema::employee(),
            max_hits,
            facet_size,
        }
    }

    /// Relevance match on one field / 按字段搜索
    pub async fn search_by_field(&self, collection: &str, field: &str, value: &str) -> Result<Vec<Hit>> {
        let collection = CollectionName::parse(collection)?;
        self.schema.require_field(field)?;
        if value.trim().is_empty() {
            return Err(SearchError::validation(format!("search value for '{}' must not be empty", field)));
        }

        let query = SearchQuery::Match { field: field.to_string(), value: value.to_string() };
        let hits = self.backend.search(&collection, &query, self.max_hits).await?;
        tracing::debug!("Search '{}' {}={:?}: {} hits", collection, field, value, hits.len());
        Ok(hits)
    }

    /// Every document (bounded by max hits) / 列出全部文档
    pub async fn list_all(&self, collection: &str) -> Result<Vec<Hit>> {
        let collection = CollectionName::parse(collection)?;
        self.backend.search(&collection, &SearchQuery::MatchAll, self.max_hits).await
    }

    /// Point lookup / 按 id 获取
    pub async fn get_by_id(&self, collection: &str, id: &str) -> Result<Option<Hit>> {
        let collection = CollectionName::parse(collection)?;
        if id.trim().is_empty() {
            return Err(SearchError::validation("document id must not be empty"));
        }
        self.backend.get_document(&collection, id).await
    }

    /// Exact document count; 0 for a missing collection / 文档总数
    pub async fn count(&self, collection: &str) -> Result<u64> {
        let collection = CollectionName::parse(collection)?;
        let count = self.backend.count(&collection).await?;
        tracing::debug!("Employee count in '{}': {}", collection, count);
        Ok(count)
    }

    /// Existence check, then delete. Not atomic / 先检查再删除
    pub async fn delete_by_id(&self, collection: &str, id: &str) -> Result<DeleteOutcome> {
        let collection = CollectionName::parse(collection)?;
        if id.trim().is_empty() {
            return Err(SearchError::validation("document id must not be empty"));
        }

        if !self.backend.document_exists(&collection, id).await? {
            tracing::info!("Employee with ID '{}' not found in '{}'", id, collection);
            return Ok(DeleteOutcome::NotFound);
        }

        if self.backend.delete_document(&collection, id).await? {
            // count/search must reflect the delete immediately
            self.backend.refresh(&collection).await?;
            tracing::info!("Employee with ID '{}' deleted from '{}'", id, collection);
            Ok(DeleteOutcome::Deleted)
        } else {
            tracing::warn!("Employee with ID '{}' could not be deleted from '{}'", id, collection);
            Ok(DeleteOutcome::NotDeleted)
        }
    }

    /// Distinct keyword values with counts / 关键字分面统计
    pub async fn facet_by_field(&self, collection: &str, field: &str) -> Result<Vec<FacetBucket>> {
        let collection = CollectionName::parse(collection)?;
        if self.schema.require_field(field)? != FieldType::Keyword {
            return Err(SearchError::validation(format!(
                "field '{}' is not a keyword field and cannot be faceted",
                field
            )));
        }

        let terms = self.backend.terms(&collection, field, self.facet_size).await?;
        if terms.sum_other_doc_count > 0 {
            tracing::warn!(
                "Facet '{}' on '{}' truncated at {} buckets; {} documents not counted",
                field,
                collection,
                self.facet_size,
                terms.sum_other_doc_count
            );
        }
        Ok(terms.buckets)
    }
}
