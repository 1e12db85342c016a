//! Search backend interface (provides only primitive operations) / 搜索后端接口
//!
//! Components never talk to the engine directly: they receive an
//! `Arc<dyn SearchBackend>` at construction time.
//! - `ElasticBackend`: Elasticsearch-compatible REST API over HTTP
//! - `MemoryBackend`: in-process engine for tests and offline runs

pub mod elastic;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{BackendConfig, BackendEngine};
use crate::error::Result;
use crate::models::{CollectionName, CollectionSchema, EmployeeSource, FacetBucket, Hit};

pub use elastic::ElasticBackend;
pub use memory::MemoryBackend;

pub type BackendRef = Arc<dyn SearchBackend>;

/// Result of a create-collection call / 创建集合结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    /// Someone else created it first / 已存在
    AlreadyExists,
}

/// Result of a document upsert / 文档写入结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Created,
    Updated,
}

/// Query sent to the engine / 查询
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchQuery {
    /// Relevance match on a single field
    Match { field: String, value: String },
    MatchAll,
}

/// Terms aggregation result / 聚合结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TermsResult {
    pub buckets: Vec<FacetBucket>,
    /// Documents whose value fell outside the returned buckets / 未返回的桶文档数
    pub sum_other_doc_count: u64,
}

/// Engine identification returned by a ping / 引擎信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendInfo {
    pub name: String,
    pub version: String,
}

/// Search backend interface / 搜索后端接口
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Backend kind, for logs / 后端类型
    fn kind(&self) -> &'static str;

    /// Verify the engine is reachable / 检查连通性
    async fn ping(&self) -> Result<BackendInfo>;

    /// Whether the collection exists / 集合是否存在
    async fn exists(&self, collection: &CollectionName) -> Result<bool>;

    async fn create_collection(
        &self,
        collection: &CollectionName,
        schema: &CollectionSchema,
    ) -> Result<CreateOutcome>;

    /// Delete a collection; `false` when it did not exist / 删除集合
    async fn delete_collection(&self, collection: &CollectionName) -> Result<bool>;

    /// Current field type names of an existing collection / 读取现有映射
    async fn field_mapping(&self, collection: &CollectionName) -> Result<HashMap<String, String>>;

    /// Upsert a document under an explicit id / 按 id 写入文档
    async fn put_document(
        &self,
        collection: &CollectionName,
        id: &str,
        source: &EmployeeSource,
    ) -> Result<WriteOutcome>;

    async fn document_exists(&self, collection: &CollectionName, id: &str) -> Result<bool>;

    async fn get_document(&self, collection: &CollectionName, id: &str) -> Result<Option<Hit>>;

    /// `true` when the engine confirmed the deletion / 删除文档
    async fn delete_document(&self, collection: &CollectionName, id: &str) -> Result<bool>;

    /// Make written documents visible to search / 刷新使写入可见
    async fn refresh(&self, collection: &CollectionName) -> Result<()>;

    async fn search(
        &self,
        collection: &CollectionName,
        query: &SearchQuery,
        size: usize,
    ) -> Result<Vec<Hit>>;

    /// Document count; 0 for a missing collection / 文档总数
    async fn count(&self, collection: &CollectionName) -> Result<u64>;

    async fn terms(
        &self,
        collection: &CollectionName,
        field: &str,
        size: usize,
    ) -> Result<TermsResult>;
}

/// Build the configured backend / 根据配置创建后端
pub fn connect(config: &BackendConfig) -> anyhow::Result<BackendRef> {
    let backend: BackendRef = match config.engine {
        BackendEngine::Elasticsearch => Arc::new(ElasticBackend::new(config)?),
        BackendEngine::Memory => Arc::new(MemoryBackend::new()),
    };
    tracing::info!("Search backend: {} ({})", backend.kind(), config.url);
    Ok(backend)
}
