//! Asset URL normalization.
//!
//! Content authored against earlier storage backends embeds absolute image
//! URLs. These helpers rewrite them onto the local `/api/assets/` proxy so the
//! content keeps rendering after a storage migration. All functions are pure
//! and idempotent; malformed input passes through unchanged.

use serde::Deserialize;
use url::Url;

use crate::domain::content::{Content, ContentNode};
use crate::domain::error::DomainError;

pub const ASSET_PREFIX: &str = "/api/assets/";
pub const DEFAULT_FALLBACK_IMAGE: &str = "/images/placeholder.png";

const BLOB_SCHEME: &str = "blob:";

/// Public path serving the asset stored under `key`.
pub fn asset_path(key: &str) -> String {
    format!("{ASSET_PREFIX}{}", key.trim_start_matches('/'))
}

/// Check an asset key taken from a request path before it is forwarded.
pub fn validate_asset_key(key: &str) -> Result<&str, DomainError> {
    let key = key.trim_start_matches('/');
    if key.is_empty() {
        return Err(DomainError::validation("key", "must not be empty"));
    }
    let unsafe_segment = key
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..");
    if unsafe_segment || key.chars().any(|c| c == '\\' || c.is_control()) {
        return Err(DomainError::validation(
            "key",
            format!("`{key}` is not a valid asset key"),
        ));
    }
    Ok(key)
}

/// Rewrite a single URL onto the asset proxy when it already points there.
///
/// Root-relative paths and `blob:` references are returned as is; absolute
/// URLs whose path starts with [`ASSET_PREFIX`] lose their origin; anything
/// else, including unparseable input, is returned unchanged.
pub fn normalize_url(input: &str) -> String {
    if is_local_reference(input) {
        return input.to_string();
    }

    match Url::parse(input) {
        Ok(url) if url.path().starts_with(ASSET_PREFIX) => url.path().to_string(),
        _ => input.to_string(),
    }
}

/// Normalize every image URL in a content tree, at any depth.
pub fn normalize_content(content: Content) -> Content {
    match content {
        Content::Leaf(value) => Content::Leaf(value),
        Content::Sequence(items) => {
            Content::Sequence(items.into_iter().map(normalize_content).collect())
        }
        Content::Node(node) => Content::Node(normalize_node(node)),
    }
}

fn normalize_node(node: ContentNode) -> ContentNode {
    let is_image = node.is_image();
    let ContentNode {
        kind,
        url,
        children,
        attrs,
    } = node;

    ContentNode {
        kind,
        url: match url {
            Some(url) if is_image => Some(normalize_url(&url)),
            other => other,
        },
        children: children.map(|items| items.into_iter().map(normalize_content).collect()),
        attrs,
    }
}

fn is_local_reference(input: &str) -> bool {
    input.starts_with('/') || input.starts_with(BLOB_SCHEME)
}

/// What to do with URLs served from a recognized legacy storage host.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum LegacyPolicy {
    /// Host still serves its objects; keep the URL.
    Preserve,
    /// Host is gone; show the fallback image.
    Fallback,
    /// Objects were migrated; route the path through the asset proxy.
    Proxy {
        #[serde(default)]
        strip_prefix: Option<String>,
    },
}

/// A host substring and the policy applied to matching URLs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LegacyHost {
    pub pattern: String,
    #[serde(flatten)]
    pub policy: LegacyPolicy,
}

impl LegacyHost {
    pub fn new(pattern: impl Into<String>, policy: LegacyPolicy) -> Self {
        Self {
            pattern: pattern.into(),
            policy,
        }
    }

    fn matches(&self, host: &str) -> bool {
        !self.pattern.is_empty() && host.contains(self.pattern.as_str())
    }
}

/// Storage backends the site has used before, in match order.
pub fn default_legacy_hosts() -> Vec<LegacyHost> {
    vec![
        LegacyHost::new("res.cloudinary.com", LegacyPolicy::Preserve),
        LegacyHost::new("supabase.co", LegacyPolicy::Fallback),
        LegacyHost::new("amazonaws.com", LegacyPolicy::Proxy { strip_prefix: None }),
        LegacyHost::new(
            "r2.cloudflarestorage.com",
            LegacyPolicy::Proxy { strip_prefix: None },
        ),
    ]
}

/// Table-driven resolver for cover images and other single asset references.
#[derive(Debug, Clone)]
pub struct AssetResolver {
    legacy_hosts: Vec<LegacyHost>,
    fallback_image: String,
}

impl Default for AssetResolver {
    fn default() -> Self {
        Self::new(default_legacy_hosts(), DEFAULT_FALLBACK_IMAGE)
    }
}

impl AssetResolver {
    pub fn new(legacy_hosts: Vec<LegacyHost>, fallback_image: impl Into<String>) -> Self {
        Self {
            legacy_hosts,
            fallback_image: fallback_image.into(),
        }
    }

    /// Append a host rule; earlier rules win on overlapping patterns.
    pub fn with_host(mut self, host: LegacyHost) -> Self {
        self.legacy_hosts.push(host);
        self
    }

    pub fn fallback_image(&self) -> &str {
        &self.fallback_image
    }

    pub fn resolve(&self, input: &str) -> String {
        let input = input.trim();
        if input.is_empty() {
            return self.fallback_image.clone();
        }
        if is_local_reference(input) {
            return input.to_string();
        }

        let url = match Url::parse(input) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) if is_bare_key(input) => {
                return asset_path(input);
            }
            Err(_) => return input.to_string(),
        };

        if url.path().starts_with(ASSET_PREFIX) {
            return url.path().to_string();
        }

        let Some(host) = url.host_str() else {
            return input.to_string();
        };

        match self.legacy_hosts.iter().find(|rule| rule.matches(host)) {
            Some(rule) => self.apply(&rule.policy, &url, input),
            None => input.to_string(),
        }
    }

    fn apply(&self, policy: &LegacyPolicy, url: &Url, input: &str) -> String {
        match policy {
            LegacyPolicy::Preserve => input.to_string(),
            LegacyPolicy::Fallback => self.fallback_image.clone(),
            LegacyPolicy::Proxy { strip_prefix } => {
                let path = url.path();
                let key = strip_prefix
                    .as_deref()
                    .and_then(|prefix| path.strip_prefix(prefix))
                    .unwrap_or(path)
                    .trim_start_matches('/');
                if key.is_empty() {
                    self.fallback_image.clone()
                } else {
                    asset_path(key)
                }
            }
        }
    }
}

fn is_bare_key(input: &str) -> bool {
    !input.chars().any(char::is_whitespace)
}
