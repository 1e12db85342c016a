//! Search-collection layer over a remote document-search engine / 搜索集合抽象层
//!
//! - `backend`: engine access (Elasticsearch REST, in-memory)
//! - `collection`: idempotent collection setup
//! - `indexer`: bulk upsert + refresh
//! - `query`: search, lookup, delete, count, facets
//! - `seed`: one-shot demo sequence

pub mod backend;
pub mod collection;
pub mod config;
pub mod error;
pub mod indexer;
pub mod models;
pub mod query;
pub mod seed;

use backend::BackendRef;
use collection::CollectionManager;
use config::SearchConfig;
use indexer::BulkIndexer;
use query::QueryService;

/// Core components sharing one backend handle / 共享同一后端的核心组件
#[derive(Clone)]
pub struct Services {
    pub backend: BackendRef,
    pub collections: CollectionManager,
    pub indexer: BulkIndexer,
    pub queries: QueryService,
}

impl Services {
    pub fn new(backend: BackendRef, search: &SearchConfig) -> Self {
        Self {
            collections: CollectionManager::new(backend.clone()),
            indexer: BulkIndexer::new(backend.clone(), search.index_policy),
            queries: QueryService::new(backend.clone(), search.max_hits, search.facet_size),
            backend,
        }
    }
}
