use std::sync::Arc;

use crate::application::content::ContentService;
use crate::config::{HttpCacheSettings, SecuritySettings};

use super::cache_headers::CacheHeaders;

#[derive(Clone)]
pub struct ApiState {
    pub content: Arc<ContentService>,
    pub cache_headers: CacheHeaders,
    pub security: Arc<SecuritySettings>,
}

impl ApiState {
    pub fn new(
        content: Arc<ContentService>,
        http_cache: &HttpCacheSettings,
        security: SecuritySettings,
    ) -> Self {
        Self {
            content,
            cache_headers: CacheHeaders::new(http_cache),
            security: Arc::new(security),
        }
    }
}
