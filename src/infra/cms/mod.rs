//! Directus CMS integration: client, lazy factory and repository adapters.

pub mod client;
pub mod factory;
pub mod repos;

pub use client::{AssetBody, CmsClient, ItemQuery, ItemsResponse};
pub use factory::CmsClientFactory;
pub use repos::DirectusRepositories;
