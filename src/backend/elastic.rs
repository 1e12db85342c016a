//! Elasticsearch-compatible REST backend / Elasticsearch 后端
//!
//! Speaks the engine's JSON API directly through `reqwest`. Every request
//! carries the configured timeout; transport failures map to
//! `BackendUnavailable` / `Timeout`.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;

use super::{BackendInfo, CreateOutcome, SearchBackend, SearchQuery, TermsResult, WriteOutcome};
use crate::config::BackendConfig;
use crate::error::{Result, SearchError};
use crate::models::{CollectionName, CollectionSchema, EmployeeSource, FacetBucket, Hit};

const AGG_NAME: &str = "facet";

#[derive(Debug, Deserialize)]
struct WriteResp {
    result: String,
}

#[derive(Debug, Deserialize)]
struct CountResp {
    count: u64,
}

#[derive(Debug, Deserialize)]
struct GetResp {
    #[serde(rename = "_id")]
    id: String,
    #[serde(default)]
    found: bool,
    #[serde(rename = "_source")]
    source: Option<EmployeeSource>,
}

impl GetResp {
    fn into_hit(self) -> Option<Hit> {
        match (self.found, self.source) {
            (true, Some(source)) => Some(Hit { id: self.id, source, score: None }),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResp {
    hits: HitsEnvelope,
    #[serde(default)]
    aggregations: Option<HashMap<String, TermsAgg>>,
}

#[derive(Debug, Deserialize)]
struct HitsEnvelope {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct TermsAgg {
    #[serde(default)]
    sum_other_doc_count: u64,
    #[serde(default)]
    buckets: Vec<TermsBucket>,
}

#[derive(Debug, Deserialize)]
struct TermsBucket {
    key: Value,
    doc_count: u64,
}

#[derive(Debug, Deserialize)]
struct IndexMapping {
    #[serde(default)]
    mappings: MappingBody,
}

#[derive(Debug, Default, Deserialize)]
struct MappingBody {
    #[serde(default)]
    properties: HashMap<String, MappingProperty>,
}

#[derive(Debug, Deserialize)]
struct MappingProperty {
    #[serde(rename = "type")]
    field_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RootResp {
    #[serde(default)]
    cluster_name: String,
    version: RootVersion,
}

#[derive(Debug, Deserialize)]
struct RootVersion {
    number: String,
}

/// Engine error envelope: `{"error": {"type", "reason"}, "status"}` / 引擎错误
#[derive(Debug, Clone, PartialEq, Eq)]
struct EngineError {
    status: u16,
    kind: String,
    reason: String,
}

impl EngineError {
    fn parse(status: StatusCode, body: &str) -> Self {
        let value: Value = serde_json::from_str(body).unwrap_or(Value::Null);
        let error = &value["error"];
        let (kind, reason) = match error {
            Value::Object(_) => (
                error["type"].as_str().unwrap_or_default().to_string(),
                error["reason"].as_str().unwrap_or_default().to_string(),
            ),
            Value::String(s) => (String::new(), s.clone()),
            _ => (String::new(), body.chars().take(200).collect()),
        };
        Self { status: status.as_u16(), kind, reason }
    }

    fn is_missing_index(&self) -> bool {
        self.kind == "index_not_found_exception"
    }

    fn into_search_error(self) -> SearchError {
        SearchError::Backend {
            status: self.status,
            reason: if self.kind.is_empty() {
                self.reason
            } else {
                format!("{}: {}", self.kind, self.reason)
            },
        }
    }
}

pub struct ElasticBackend {
    base_url: String,
    client: Client,
}

impl ElasticBackend {
    pub fn new(config: &BackendConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;

        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, format!("{}{}", self.base_url, path))
    }

    async fn send(&self, operation: &str, req: RequestBuilder) -> Result<Response> {
        req.send()
            .await
            .map_err(|e| SearchError::from_transport(operation, e))
    }

    /// Read an error body; transport failures while reading stay transport errors
    async fn engine_error(&self, operation: &str, resp: Response) -> Result<EngineError> {
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| SearchError::from_transport(operation, e))?;
        Ok(EngineError::parse(status, &body))
    }

    async fn json<T>(&self, operation: &str, resp: Response) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        resp.json::<T>()
            .await
            .map_err(|e| SearchError::from_transport(operation, e))
    }

    /// HEAD request answered with 200 / 404 / 检查存在性
    async fn head_exists(&self, operation: &str, path: &str) -> Result<bool> {
        let resp = self.send(operation, self.request(Method::HEAD, path)).await?;
        match resp.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(SearchError::Backend {
                status: status.as_u16(),
                reason: format!("unexpected status for {}", operation),
            }),
        }
    }

    async fn run_search(
        &self,
        operation: &str,
        collection: &CollectionName,
        body: Value,
    ) -> Result<Option<SearchResp>> {
        let path = format!("/{}/_search", collection);
        let resp = self
            .send(operation, self.request(Method::POST, &path).json(&body))
            .await?;
        if resp.status().is_success() {
            return Ok(Some(self.json(operation, resp).await?));
        }
        let err = self.engine_error(operation, resp).await?;
        if err.is_missing_index() {
            return Ok(None);
        }
        Err(err.into_search_error())
    }
}

fn doc_path(collection: &CollectionName, id: &str) -> String {
    format!("/{}/_doc/{}", collection, urlencoding::encode(id))
}

fn query_body(query: &SearchQuery, size: usize) -> Value {
    let query = match query {
        SearchQuery::Match { field, value } => json!({ "match": { field.as_str(): value } }),
        SearchQuery::MatchAll => json!({ "match_all": {} }),
    };
    json!({ "query": query, "size": size })
}

fn terms_body(field: &str, size: usize) -> Value {
    json!({
        "size": 0,
        "aggs": { AGG_NAME: { "terms": { "field": field, "size": size } } }
    })
}

fn bucket_key(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn into_terms(resp: SearchResp) -> TermsResult {
    let agg = resp.aggregations.and_then(|mut aggs| aggs.remove(AGG_NAME));
    match agg {
        Some(agg) => TermsResult {
            buckets: agg
                .buckets
                .iter()
                .map(|b| FacetBucket { key: bucket_key(&b.key), count: b.doc_count })
                .collect(),
            sum_other_doc_count: agg.sum_other_doc_count,
        },
        None => TermsResult::default(),
    }
}

#[async_trait]
impl SearchBackend for ElasticBackend {
    fn kind(&self) -> &'static str {
        "elasticsearch"
    }

    async fn ping(&self) -> Result<BackendInfo> {
        let resp = self.send("ping", self.request(Method::GET, "/")).await?;
        if !resp.status().is_success() {
            return Err(self.engine_error("ping", resp).await?.into_search_error());
        }
        let root: RootResp = self.json("ping", resp).await?;
        Ok(BackendInfo { name: root.cluster_name, version: root.version.number })
    }

    async fn exists(&self, collection: &CollectionName) -> Result<bool> {
        self.head_exists("exists", &format!("/{}", collection)).await
    }

    async fn create_collection(
        &self,
        collection: &CollectionName,
        schema: &CollectionSchema,
    ) -> Result<CreateOutcome> {
        let path = format!("/{}", collection);
        let resp = self
            .send("create_collection", self.request(Method::PUT, &path).json(&schema.mapping_body()))
            .await?;
        if resp.status().is_success() {
            return Ok(CreateOutcome::Created);
        }
        let err = self.engine_error("create_collection", resp).await?;
        match err.kind.as_str() {
            "resource_already_exists_exception" => Ok(CreateOutcome::AlreadyExists),
            "mapper_parsing_exception" | "illegal_argument_exception" | "invalid_index_name_exception" => {
                Err(SearchError::SchemaConflict {
                    collection: collection.to_string(),
                    reason: err.reason,
                })
            }
            _ => Err(err.into_search_error()),
        }
    }

    async fn delete_collection(&self, collection: &CollectionName) -> Result<bool> {
        let path = format!("/{}", collection);
        let resp = self.send("delete_collection", self.request(Method::DELETE, &path)).await?;
        if resp.status().is_success() {
            return Ok(true);
        }
        let err = self.engine_error("delete_collection", resp).await?;
        if err.is_missing_index() {
            return Ok(false);
        }
        Err(err.into_search_error())
    }

    async fn field_mapping(&self, collection: &CollectionName) -> Result<HashMap<String, String>> {
        let path = format!("/{}/_mapping", collection);
        let resp = self.send("field_mapping", self.request(Method::GET, &path)).await?;
        if !resp.status().is_success() {
            return Err(self.engine_error("field_mapping", resp).await?.into_search_error());
        }
        let indices: HashMap<String, IndexMapping> = self.json("field_mapping", resp).await?;
        Ok(indices
            .into_values()
            .flat_map(|m| m.mappings.properties.into_iter())
            .filter_map(|(name, prop)| prop.field_type.map(|t| (name, t)))
            .collect())
    }

    async fn put_document(
        &self,
        collection: &CollectionName,
        id: &str,
        source: &EmployeeSource,
    ) -> Result<WriteOutcome> {
        let path = doc_path(collection, id);
        let resp = self
            .send("put_document", self.request(Method::PUT, &path).json(source))
            .await?;
        if !resp.status().is_success() {
            return Err(self.engine_error("put_document", resp).await?.into_search_error());
        }
        let body: WriteResp = self.json("put_document", resp).await?;
        Ok(if body.result == "updated" { WriteOutcome::Updated } else { WriteOutcome::Created })
    }

    async fn document_exists(&self, collection: &CollectionName, id: &str) -> Result<bool> {
        self.head_exists("document_exists", &doc_path(collection, id)).await
    }

    async fn get_document(&self, collection: &CollectionName, id: &str) -> Result<Option<Hit>> {
        let resp = self
            .send("get_document", self.request(Method::GET, &doc_path(collection, id)))
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(self.engine_error("get_document", resp).await?.into_search_error());
        }
        let body: GetResp = self.json("get_document", resp).await?;
        Ok(body.into_hit())
    }

    async fn delete_document(&self, collection: &CollectionName, id: &str) -> Result<bool> {
        let resp = self
            .send("delete_document", self.request(Method::DELETE, &doc_path(collection, id)))
            .await?;
        let status = resp.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            let body: Value = self.json("delete_document", resp).await?;
            if body["result"].is_string() {
                return Ok(body["result"] == "deleted");
            }
            // 404 without a result field: the whole index is gone
            return Ok(false);
        }
        Err(self.engine_error("delete_document", resp).await?.into_search_error())
    }

    async fn refresh(&self, collection: &CollectionName) -> Result<()> {
        let path = format!("/{}/_refresh", collection);
        let resp = self.send("refresh", self.request(Method::POST, &path)).await?;
        if !resp.status().is_success() {
            return Err(self.engine_error("refresh", resp).await?.into_search_error());
        }
        Ok(())
    }

    async fn search(
        &self,
        collection: &CollectionName,
        query: &SearchQuery,
        size: usize,
    ) -> Result<Vec<Hit>> {
        let resp = self.run_search("search", collection, query_body(query, size)).await?;
        Ok(resp.map(|r| r.hits.hits).unwrap_or_default())
    }

    async fn count(&self, collection: &CollectionName) -> Result<u64> {
        let path = format!("/{}/_count", collection);
        let resp = self.send("count", self.request(Method::GET, &path)).await?;
        if resp.status().is_success() {
            let body: CountResp = self.json("count", resp).await?;
            return Ok(body.count);
        }
        let err = self.engine_error("count", resp).await?;
        if err.is_missing_index() {
            return Ok(0);
        }
        Err(err.into_search_error())
    }

    async fn terms(
        &self,
        collection: &CollectionName,
        field: &str,
        size: usize,
    ) -> Result<TermsResult> {
        let resp = self.run_search("terms", collection, terms_body(field, size)).await?;
        Ok(resp.map(into_terms).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_body() {
        let body = query_body(
            &SearchQuery::Match { field: "name".to_string(), value: "John".to_string() },
            10,
        );
        assert_eq!(body, json!({ "query": { "match": { "name": "John" } }, "size": 10 }));

        let body = query_body(&SearchQuery::MatchAll, 5);
        assert_eq!(body["query"], json!({ "match_all": {} }));
    }

    #[test]
    fn test_terms_body_sets_explicit_size() {
        let body = terms_body("department", 100);
        assert_eq!(body["size"], 0);
        assert_eq!(body["aggs"]["facet"]["terms"]["field"], "department");
        assert_eq!(body["aggs"]["facet"]["terms"]["size"], 100);
    }

    #[test]
    fn test_doc_path_encodes_id() {
        let name = CollectionName::parse("Hash_Sowandarya").unwrap();
        assert_eq!(doc_path(&name, "E02001"), "/hash_sowandarya/_doc/E02001");
        assert_eq!(doc_path(&name, "a/b c"), "/hash_sowandarya/_doc/a%2Fb%20c");
    }

    #[test]
    fn test_parse_search_response() {
        let raw = r#"{
            "took": 2,
            "hits": {
                "total": { "value": 1, "relation": "eq" },
                "hits": [{
                    "_index": "hash_sowandarya",
                    "_id": "E02001",
                    "_score": 0.6931,
                    "_source": { "name": "John Doe", "department": "IT", "gender": "Male" }
                }]
            }
        }"#;
        let resp: SearchResp = serde_json::from_str(raw).unwrap();
        assert_eq!(resp.hits.hits.len(), 1);
        assert_eq!(resp.hits.hits[0].id, "E02001");
        assert_eq!(resp.hits.hits[0].source.name, "John Doe");
    }

    #[test]
    fn test_parse_terms_response() {
        let raw = r#"{
            "hits": { "hits": [] },
            "aggregations": {
                "facet": {
                    "doc_count_error_upper_bound": 0,
                    "sum_other_doc_count": 4,
                    "buckets": [
                        { "key": "IT", "doc_count": 2 },
                        { "key": "HR", "doc_count": 1 }
                    ]
                }
            }
        }"#;
        let resp: SearchResp = serde_json::from_str(raw).unwrap();
        let terms = into_terms(resp);
        assert_eq!(terms.buckets, vec![FacetBucket::new("IT", 2), FacetBucket::new("HR", 1)]);
        assert_eq!(terms.sum_other_doc_count, 4);
    }

    #[test]
    fn test_parse_get_response() {
        let found = r#"{"_index":"x","_id":"E02002","found":true,
            "_source":{"name":"Jane Doe","department":"HR","gender":"Female"}}"#;
        let resp: GetResp = serde_json::from_str(found).unwrap();
        let hit = resp.into_hit().unwrap();
        assert_eq!(hit.id, "E02002");
        assert_eq!(hit.source.gender, "Female");

        let missing = r#"{"_index":"x","_id":"E09999","found":false}"#;
        let resp: GetResp = serde_json::from_str(missing).unwrap();
        assert!(resp.into_hit().is_none());
    }

    #[test]
    fn test_parse_mapping_response() {
        let raw = r#"{"hash_sowandarya":{"mappings":{"properties":{
            "name":{"type":"text"},"department":{"type":"keyword"}}}}}"#;
        let indices: HashMap<String, IndexMapping> = serde_json::from_str(raw).unwrap();
        let props = &indices["hash_sowandarya"].mappings.properties;
        assert_eq!(props["department"].field_type.as_deref(), Some("keyword"));
    }

    #[test]
    fn test_engine_error_parse() {
        let body = r#"{"error":{"type":"index_not_found_exception",
            "reason":"no such index [missing]"},"status":404}"#;
        let err = EngineError::parse(StatusCode::NOT_FOUND, body);
        assert!(err.is_missing_index());
        assert_eq!(err.reason, "no such index [missing]");

        let err = EngineError::parse(StatusCode::BAD_GATEWAY, "upstream down");
        assert!(!err.is_missing_index());
        match err.into_search_error() {
            SearchError::Backend { status, reason } => {
                assert_eq!(status, 502);
                assert_eq!(reason, "upstream down");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    mod fake_engine {
        use super::*;
        use crate::config::BackendEngine;
        use axum::{
            http::StatusCode as HttpStatus,
            routing::{delete, get, put},
            Json, Router,
        };
        use std::time::Duration;

        /// Serve `app` on an ephemeral port, return its base URL
        async fn serve(app: Router) -> String {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });
            format!("http://{}", addr)
        }

        fn backend(url: String) -> ElasticBackend {
            ElasticBackend::new(&BackendConfig {
                engine: BackendEngine::Elasticsearch,
                url,
                request_timeout_secs: 1,
                connect_timeout_secs: 1,
            })
            .unwrap()
        }

        fn name(raw: &str) -> CollectionName {
            CollectionName::parse(raw).unwrap()
        }

        fn engine_router() -> Router {
            Router::new()
                .route("/staff/_count", get(|| async { Json(json!({ "count": 7 })) }))
                .route(
                    "/missing/_count",
                    get(|| async {
                        (
                            HttpStatus::NOT_FOUND,
                            Json(json!({
                                "error": { "type": "index_not_found_exception", "reason": "no such index [missing]" },
                                "status": 404
                            })),
                        )
                    }),
                )
                .route(
                    "/down/_count",
                    get(|| async { (HttpStatus::SERVICE_UNAVAILABLE, "cluster not ready") }),
                )
                .route(
                    "/slow/_count",
                    get(|| async {
                        tokio::time::sleep(Duration::from_secs(2)).await;
                        Json(json!({ "count": 1 }))
                    }),
                )
                .route(
                    "/staff/_doc/:id",
                    delete(|axum::extract::Path(id): axum::extract::Path<String>| async move {
                        if id == "E1" {
                            (HttpStatus::OK, Json(json!({ "_id": id, "result": "deleted" })))
                        } else {
                            (HttpStatus::NOT_FOUND, Json(json!({ "_id": id, "result": "not_found" })))
                        }
                    }),
                )
                .route(
                    "/staff",
                    put(|| async {
                        (
                            HttpStatus::BAD_REQUEST,
                            Json(json!({
                                "error": {
                                    "type": "resource_already_exists_exception",
                                    "reason": "index [staff/abc] already exists"
                                },
                                "status": 400
                            })),
                        )
                    }),
                )
        }

        #[tokio::test]
        async fn test_count_missing_index_is_zero_but_engine_failure_is_error() {
            let backend = backend(serve(engine_router()).await);

            assert_eq!(backend.count(&name("staff")).await.unwrap(), 7);
            assert_eq!(backend.count(&name("missing")).await.unwrap(), 0);

            let err = backend.count(&name("down")).await.unwrap_err();
            assert!(matches!(err, SearchError::Backend { status: 503, .. }));
        }

        #[tokio::test]
        async fn test_delete_document_not_found_is_false() {
            let backend = backend(serve(engine_router()).await);

            assert!(backend.delete_document(&name("staff"), "E1").await.unwrap());
            assert!(!backend.delete_document(&name("staff"), "E9").await.unwrap());
        }

        #[tokio::test]
        async fn test_create_race_reports_already_exists() {
            let backend = backend(serve(engine_router()).await);

            let outcome = backend
                .create_collection(&name("staff"), &CollectionSchema::employee())
                .await
                .unwrap();
            assert_eq!(outcome, CreateOutcome::AlreadyExists);
        }

        #[tokio::test]
        async fn test_slow_engine_times_out() {
            let backend = backend(serve(engine_router()).await);

            match backend.count(&name("slow")).await.unwrap_err() {
                SearchError::Timeout { operation } => assert_eq!(operation, "count"),
                other => panic!("unexpected error: {:?}", other),
            }
        }

        #[tokio::test]
        async fn test_refused_connection_is_unavailable() {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            drop(listener);
            let backend = backend(format!("http://{}", addr));

            let err = backend.count(&name("staff")).await.unwrap_err();
            assert!(matches!(err, SearchError::BackendUnavailable { .. }));
        }
    }
}
