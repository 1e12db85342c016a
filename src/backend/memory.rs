//! In-memory search backend / 内存搜索后端
//!
//! Mirrors the engine behaviours the core relies on:
//! - writes are visible to point lookups at once, but to search/count/terms
//!   only after `refresh` (near-real-time)
//! - text fields are tokenized, keyword fields match exactly
//! - terms buckets ordered by count desc, then key asc, truncated to `size`
//! - writing into a missing collection creates it with dynamic (text) mapping

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::{BackendInfo, CreateOutcome, SearchBackend, SearchQuery, TermsResult, WriteOutcome};
use crate::error::{Result, SearchError};
use crate::models::{CollectionName, CollectionSchema, EmployeeSource, FacetBucket, Hit};

#[derive(Debug, Clone, Default)]
struct MemCollection {
    /// field -> type name / 字段类型
    mapping: HashMap<String, String>,
    /// Latest writes (realtime get) / 最新文档
    live: BTreeMap<String, EmployeeSource>,
    /// Snapshot taken at last refresh (search) / 刷新后的可见文档
    visible: BTreeMap<String, EmployeeSource>,
}

impl MemCollection {
    fn with_schema(schema: &CollectionSchema) -> Self {
        Self {
            mapping: schema
                .fields
                .iter()
                .map(|f| (f.name.to_string(), f.field_type.as_str().to_string()))
                .collect(),
            ..Default::default()
        }
    }

    fn dynamic() -> Self {
        let mapping = ["name", "department", "gender"]
            .iter()
            .map(|f| (f.to_string(), "text".to_string()))
            .collect();
        Self { mapping, ..Default::default() }
    }

    fn field_type(&self, field: &str) -> Option<&str> {
        self.mapping.get(field).map(|s| s.as_str())
    }
}

/// Lowercase alphanumeric tokens / 简单分词
fn analyze(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

fn missing_index(collection: &CollectionName) -> SearchError {
    SearchError::Backend {
        status: 404,
        reason: format!("index_not_found_exception: no such index [{}]", collection),
    }
}

/// In-process engine / 内存引擎
pub struct MemoryBackend {
    collections: RwLock<HashMap<String, MemCollection>>,
    unavailable: AtomicBool,
    rejected_ids: RwLock<HashSet<String>>,
    lost_deletes: RwLock<HashSet<String>>,
    refresh_failing: AtomicBool,
    refreshes: AtomicUsize,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            unavailable: AtomicBool::new(false),
            rejected_ids: RwLock::new(HashSet::new()),
            lost_deletes: RwLock::new(HashSet::new()),
            refresh_failing: AtomicBool::new(false),
            refreshes: AtomicUsize::new(0),
        }
    }

    /// Simulate an unreachable engine / 模拟后端不可用
    pub fn set_unavailable(&self, down: bool) {
        self.unavailable.store(down, Ordering::SeqCst);
    }

    /// Make writes of this document id fail / 拒绝写入指定 id
    pub fn reject_id(&self, id: &str) {
        self.rejected_ids.write().insert(id.to_string());
    }

    /// Let another writer delete this id first: the next delete removes it but
    /// reports nothing deleted / 模拟并发删除抢先完成
    pub fn lose_delete_race(&self, id: &str) {
        self.lost_deletes.write().insert(id.to_string());
    }

    /// Make refresh calls fail / 模拟刷新失败
    pub fn set_refresh_failing(&self, failing: bool) {
        self.refresh_failing.store(failing, Ordering::SeqCst);
    }

    /// Number of successful refreshes so far / 已执行的刷新次数
    pub fn refresh_count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(SearchError::unavailable("connection refused"));
        }
        Ok(())
    }

    fn score(coll: &MemCollection, field: &str, value: &str, source: &EmployeeSource) -> f64 {
        let Some(field_value) = source.field(field) else {
            return 0.0;
        };
        match coll.field_type(field) {
            Some("keyword") => {
                if field_value == value { 1.0 } else { 0.0 }
            }
            Some(_) => {
                let doc_tokens: HashSet<String> = analyze(field_value).into_iter().collect();
                let query_tokens: HashSet<String> = analyze(value).into_iter().collect();
                query_tokens.iter().filter(|t| doc_tokens.contains(*t)).count() as f64
            }
            None => 0.0,
        }
    }
}

#[async_trait]
impl SearchBackend for MemoryBackend {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<BackendInfo> {
        self.check()?;
        Ok(BackendInfo {
            name: "memory".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }

    async fn exists(&self, collection: &CollectionName) -> Result<bool> {
        self.check()?;
        Ok(self.collections.read().contains_key(collection.as_str()))
    }

    async fn create_collection(
        &self,
        collection: &CollectionName,
        schema: &CollectionSchema,
    ) -> Result<CreateOutcome> {
        self.check()?;
        let mut collections = self.collections.write();
        if collections.contains_key(collection.as_str()) {
            return Ok(CreateOutcome::AlreadyExists);
        }
        collections.insert(collection.to_string(), MemCollection::with_schema(schema));
        Ok(CreateOutcome::Created)
    }

    async fn delete_collection(&self, collection: &CollectionName) -> Result<bool> {
        self.check()?;
        Ok(self.collections.write().remove(collection.as_str()).is_some())
    }

    async fn field_mapping(&self, collection: &CollectionName) -> Result<HashMap<String, String>> {
        self.check()?;
        self.collections
            .read()
            .get(collection.as_str())
            .map(|c| c.mapping.clone())
            .ok_or_else(|| missing_index(collection))
    }

    async fn put_document(
        &self,
        collection: &CollectionName,
        id: &str,
        source: &EmployeeSource,
    ) -> Result<WriteOutcome> {
        self.check()?;
        if self.rejected_ids.read().contains(id) {
            return Err(SearchError::Backend {
                status: 400,
                reason: format!("document_parsing_exception: rejected [{}]", id),
            });
        }
        let mut collections = self.collections.write();
        let coll = collections
            .entry(collection.to_string())
            .or_insert_with(MemCollection::dynamic);
        let previous = coll.live.insert(id.to_string(), source.clone());
        Ok(if previous.is_some() { WriteOutcome::Updated } else { WriteOutcome::Created })
    }

    async fn document_exists(&self, collection: &CollectionName, id: &str) -> Result<bool> {
        self.check()?;
        Ok(self
            .collections
            .read()
            .get(collection.as_str())
            .is_some_and(|c| c.live.contains_key(id)))
    }

    async fn get_document(&self, collection: &CollectionName, id: &str) -> Result<Option<Hit>> {
        self.check()?;
        Ok(self.collections.read().get(collection.as_str()).and_then(|c| {
            c.live.get(id).map(|source| Hit {
                id: id.to_string(),
                source: source.clone(),
                score: None,
            })
        }))
    }

    async fn delete_document(&self, collection: &CollectionName, id: &str) -> Result<bool> {
        self.check()?;
        let lost = self.lost_deletes.write().remove(id);
        let removed = self
            .collections
            .write()
            .get_mut(collection.as_str())
            .is_some_and(|c| c.live.remove(id).is_some());
        Ok(removed && !lost)
    }

    async fn refresh(&self, collection: &CollectionName) -> Result<()> {
        self.check()?;
        if self.refresh_failing.load(Ordering::SeqCst) {
            return Err(SearchError::Backend {
                status: 500,
                reason: format!("refresh_failed_engine_exception: [{}]", collection),
            });
        }
        let mut collections = self.collections.write();
        let coll = collections
            .get_mut(collection.as_str())
            .ok_or_else(|| missing_index(collection))?;
        coll.visible = coll.live.clone();
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn search(
        &self,
        collection: &CollectionName,
        query: &SearchQuery,
        size: usize,
    ) -> Result<Vec<Hit>> {
        self.check()?;
        let collections = self.collections.read();
        let Some(coll) = collections.get(collection.as_str()) else {
            return Ok(Vec::new());
        };

        let mut hits: Vec<Hit> = coll
            .visible
            .iter()
            .filter_map(|(id, source)| {
                let score = match query {
                    SearchQuery::MatchAll => 1.0,
                    SearchQuery::Match { field, value } => Self::score(coll, field, value, source),
                };
                (score > 0.0).then(|| Hit {
                    id: id.clone(),
                    source: source.clone(),
                    score: Some(score),
                })
            })
            .collect();

        // Stable: equal scores keep id order
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(size);
        Ok(hits)
    }

    async fn count(&self, collection: &CollectionName) -> Result<u64> {
        self.check()?;
        Ok(self
            .collections
            .read()
            .get(collection.as_str())
            .map(|c| c.visible.len() as u64)
            .unwrap_or(0))
    }

    async fn terms(
        &self,
        collection: &CollectionName,
        field: &str,
        size: usize,
    ) -> Result<TermsResult> {
        self.check()?;
        let collections = self.collections.read();
        let Some(coll) = collections.get(collection.as_str()) else {
            return Ok(TermsResult::default());
        };
        match coll.field_type(field) {
            Some("keyword") => {}
            Some(other) => {
                return Err(SearchError::Backend {
                    status: 400,
                    reason: format!(
                        "illegal_argument_exception: field [{}] of type [{}] is not aggregatable",
                        field, other
                    ),
                })
            }
            None => return Ok(TermsResult::default()),
        }

        let mut counts: HashMap<&str, u64> = HashMap::new();
        for source in coll.visible.values() {
            if let Some(value) = source.field(field) {
                *counts.entry(value).or_default() += 1;
            }
        }

        let mut buckets: Vec<FacetBucket> = counts
            .into_iter()
            .map(|(key, count)| FacetBucket::new(key, count))
            .collect();
        buckets.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));

        let sum_other_doc_count = buckets.iter().skip(size).map(|b| b.count).sum();
        buckets.truncate(size);
        Ok(TermsResult { buckets, sum_other_doc_count })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coll() -> CollectionName {
        CollectionName::parse("people").unwrap()
    }

    fn source(name: &str, department: &str) -> EmployeeSource {
        EmployeeSource {
            name: name.to_string(),
            department: department.to_string(),
            gender: "Male".to_string(),
        }
    }

    #[test]
    fn test_analyze() {
        assert_eq!(analyze("John Doe"), vec!["john", "doe"]);
        assert_eq!(analyze("  O'Neil-Smith "), vec!["o", "neil", "smith"]);
        assert!(analyze("").is_empty());
    }

    #[tokio::test]
    async fn test_writes_visible_only_after_refresh() {
        let backend = MemoryBackend::new();
        backend.create_collection(&coll(), &CollectionSchema::employee()).await.unwrap();
        backend.put_document(&coll(), "1", &source("John Doe", "IT")).await.unwrap();

        assert!(backend.document_exists(&coll(), "1").await.unwrap());
        assert_eq!(backend.count(&coll()).await.unwrap(), 0);

        backend.refresh(&coll()).await.unwrap();
        assert_eq!(backend.count(&coll()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_keyword_exact_and_text_tokenized() {
        let backend = MemoryBackend::new();
        backend.create_collection(&coll(), &CollectionSchema::employee()).await.unwrap();
        backend.put_document(&coll(), "1", &source("John Doe", "IT")).await.unwrap();
        backend.put_document(&coll(), "2", &source("Jane Doe", "IT Ops")).await.unwrap();
        backend.refresh(&coll()).await.unwrap();

        let by_dept = SearchQuery::Match { field: "department".to_string(), value: "IT".to_string() };
        let hits = backend.search(&coll(), &by_dept, 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "1");

        let by_name = SearchQuery::Match { field: "name".to_string(), value: "doe".to_string() };
        assert_eq!(backend.search(&coll(), &by_name, 10).await.unwrap().len(), 2);

        let best = SearchQuery::Match { field: "name".to_string(), value: "jane doe".to_string() };
        assert_eq!(backend.search(&coll(), &best, 10).await.unwrap()[0].id, "2");
    }

    #[tokio::test]
    async fn test_terms_truncation_reports_other_count() {
        let backend = MemoryBackend::new();
        backend.create_collection(&coll(), &CollectionSchema::employee()).await.unwrap();
        for (id, dept) in [("1", "IT"), ("2", "IT"), ("3", "HR"), ("4", "Ops")] {
            backend.put_document(&coll(), id, &source("x", dept)).await.unwrap();
        }
        backend.refresh(&coll()).await.unwrap();

        let terms = backend.terms(&coll(), "department", 2).await.unwrap();
        assert_eq!(terms.buckets, vec![FacetBucket::new("IT", 2), FacetBucket::new("HR", 1)]);
        assert_eq!(terms.sum_other_doc_count, 1);

        assert!(backend.terms(&coll(), "name", 10).await.is_err());
    }

    #[tokio::test]
    async fn test_missing_collection() {
        let backend = MemoryBackend::new();
        assert!(!backend.exists(&coll()).await.unwrap());
        assert_eq!(backend.count(&coll()).await.unwrap(), 0);
        assert!(!backend.delete_collection(&coll()).await.unwrap());
        assert!(!backend.delete_document(&coll(), "1").await.unwrap());
        assert!(backend.field_mapping(&coll()).await.is_err());
    }

    #[tokio::test]
    async fn test_unavailable() {
        let backend = MemoryBackend::new();
        backend.set_unavailable(true);
        assert!(matches!(
            backend.ping().await,
            Err(SearchError::BackendUnavailable { .. })
        ));
        backend.set_unavailable(false);
        assert!(backend.ping().await.is_ok());
    }
}
