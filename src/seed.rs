//! Demo seeding sequence / 演示数据初始化流程
//!
//! Resets both demo collections, recreates them, loads the sample employees
//! and exercises every query operation once. Run by the `seed` binary, never
//! by the server.

use serde::Serialize;

use crate::config::SearchConfig;
use crate::error::Result;
use crate::indexer::IndexReport;
use crate::models::{Employee, FacetBucket, Hit};
use crate::query::DeleteOutcome;
use crate::Services;

/// Id removed during the demo / 演示中删除的员工 id
pub const DEMO_DELETE_ID: &str = "E02003";

pub fn sample_employees() -> Vec<Employee> {
    vec![
        Employee::new("E02001", "John Doe", "IT", "Male"),
        Employee::new("E02002", "Jane Doe", "HR", "Female"),
        Employee::new("E02003", "Sam Smith", "IT", "Male"),
    ]
}

/// Everything the demo observed / 演示结果
#[derive(Debug, Clone, Serialize)]
pub struct SeedReport {
    pub primary_indexed: IndexReport,
    pub secondary_indexed: IndexReport,
    pub documents_before: Vec<Hit>,
    pub count_before: u64,
    pub delete_outcome: DeleteOutcome,
    pub documents_after: Vec<Hit>,
    pub count_after: u64,
    pub primary_it: Vec<Hit>,
    pub primary_male: Vec<Hit>,
    pub secondary_it: Vec<Hit>,
    pub primary_departments: Vec<FacetBucket>,
    pub secondary_departments: Vec<FacetBucket>,
}

/// Run the full demo / 执行完整演示
pub async fn run(services: &Services, search: &SearchConfig) -> Result<SeedReport> {
    let primary = search.collection.as_str();
    let secondary = search.secondary_collection.as_str();
    let employees = sample_employees();

    services.collections.drop_collection(primary).await?;
    services.collections.drop_collection(secondary).await?;

    services.collections.ensure_collection(primary).await?;
    services.collections.ensure_collection(secondary).await?;

    let primary_indexed = services.indexer.index_records(primary, &employees).await?;
    let secondary_indexed = services.indexer.index_records(secondary, &employees).await?;

    let documents_before = services.queries.list_all(primary).await?;
    tracing::info!("Documents in '{}': {}", primary, hits_summary(&documents_before));

    let count_before = services.queries.count(primary).await?;
    tracing::info!("Employee count in '{}': {}", primary, count_before);

    let delete_outcome = services.queries.delete_by_id(primary, DEMO_DELETE_ID).await?;

    let documents_after = services.queries.list_all(primary).await?;
    tracing::info!("Documents in '{}' after deletion: {}", primary, hits_summary(&documents_after));
    let count_after = services.queries.count(primary).await?;

    let primary_it = services.queries.search_by_field(primary, "department", "IT").await?;
    tracing::info!("'{}' department=IT: {}", primary, hits_summary(&primary_it));
    let primary_male = services.queries.search_by_field(primary, "gender", "Male").await?;
    tracing::info!("'{}' gender=Male: {}", primary, hits_summary(&primary_male));
    let secondary_it = services.queries.search_by_field(secondary, "department", "IT").await?;
    tracing::info!("'{}' department=IT: {}", secondary, hits_summary(&secondary_it));

    let primary_departments = services.queries.facet_by_field(primary, "department").await?;
    tracing::info!("Department facets for '{}': {:?}", primary, primary_departments);
    let secondary_departments = services.queries.facet_by_field(secondary, "department").await?;
    tracing::info!("Department facets for '{}': {:?}", secondary, secondary_departments);

    Ok(SeedReport {
        primary_indexed,
        secondary_indexed,
        documents_before,
        count_before,
        delete_outcome,
        documents_after,
        count_after,
        primary_it,
        primary_male,
        secondary_it,
        primary_departments,
        secondary_departments,
    })
}

fn hits_summary(hits: &[Hit]) -> String {
    let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
    format!("[{}]", ids.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::config::AppConfig;
    use std::sync::Arc;

    fn ids(hits: &[Hit]) -> Vec<&str> {
        hits.iter().map(|h| h.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_demo_scenario() {
        let config = AppConfig::default();
        let services = Services::new(Arc::new(MemoryBackend::new()), &config.search);

        let report = run(&services, &config.search).await.unwrap();

        assert!(report.primary_indexed.is_complete());
        assert_eq!(report.count_before, 3);
        assert_eq!(report.delete_outcome, DeleteOutcome::Deleted);
        assert_eq!(report.count_after, 2);
        assert_eq!(ids(&report.documents_after), vec!["E02001", "E02002"]);
        assert_eq!(
            report.primary_departments,
            vec![FacetBucket::new("HR", 1), FacetBucket::new("IT", 1)]
        );
        assert_eq!(ids(&report.primary_it), vec!["E02001"]);
        assert_eq!(ids(&report.secondary_it), vec!["E02001", "E02003"]);
        assert_eq!(
            report.secondary_departments,
            vec![FacetBucket::new("IT", 2), FacetBucket::new("HR", 1)]
        );

        let john = services
            .queries
            .search_by_field(&config.search.collection, "name", "John")
            .await
            .unwrap();
        assert_eq!(ids(&john), vec!["E02001"]);
    }

    #[tokio::test]
    async fn test_demo_is_rerunnable() {
        let config = AppConfig::default();
        let services = Services::new(Arc::new(MemoryBackend::new()), &config.search);

        run(&services, &config.search).await.unwrap();
        let report = run(&services, &config.search).await.unwrap();
        assert_eq!(report.count_before, 3);
        assert_eq!(report.count_after, 2);
    }
}
