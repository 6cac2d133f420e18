use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::info;

use crate::config::CmsSettings;
use crate::infra::error::InfraError;

use super::client::CmsClient;

/// Builds the configured [`CmsClient`] once and hands out shared handles.
///
/// The settings are captured at construction; later calls never re-read
/// configuration. A missing base URL is reported on every call and never
/// memoized, so callers see the same error until the process is reconfigured.
pub struct CmsClientFactory {
    settings: CmsSettings,
    client: OnceCell<Arc<CmsClient>>,
}

impl CmsClientFactory {
    pub fn new(settings: CmsSettings) -> Self {
        Self {
            settings,
            client: OnceCell::new(),
        }
    }

    pub fn get_client(&self) -> Result<Arc<CmsClient>, InfraError> {
        self.client
            .get_or_try_init(|| {
                let client = CmsClient::new(&self.settings)?;
                info!(
                    target: "folio::infra::cms",
                    base = %client.base_url(),
                    authenticated = client.is_authenticated(),
                    "cms client initialized"
                );
                Ok(Arc::new(client))
            })
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use url::Url;

    use super::*;

    #[test]
    fn fails_fast_without_base_url() {
        let factory = CmsClientFactory::new(CmsSettings::default());
        assert!(matches!(
            factory.get_client(),
            Err(InfraError::Configuration { .. })
        ));
    }

    #[test]
    fn memoizes_a_single_instance() {
        let factory = CmsClientFactory::new(CmsSettings {
            url: Some(Url::parse("https://cms.example").expect("url")),
            token: Some("static".to_string()),
            timeout: Duration::from_secs(1),
        });

        let first = factory.get_client().expect("client");
        let second = factory.get_client().expect("client");
        assert!(Arc::ptr_eq(&first, &second));
        assert!(first.is_authenticated());
    }

    #[test]
    fn anonymous_without_token() {
        let factory = CmsClientFactory::new(CmsSettings {
            url: Some(Url::parse("https://cms.example").expect("url")),
            token: None,
            timeout: Duration::from_secs(1),
        });

        assert!(!factory.get_client().expect("client").is_authenticated());
    }
}
