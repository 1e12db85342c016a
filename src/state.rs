use employee_search::config::AppConfig;
use employee_search::Services;

/// Shared server state / 服务共享状态
pub struct AppState {
    pub services: Services,
    /// Collection served by GET /search / 对外搜索的集合
    pub collection: String,
}

impl AppState {
    pub fn new(services: Services, config: &AppConfig) -> Self {
        Self {
            services,
            collection: config.search.collection.clone(),
        }
    }
}
