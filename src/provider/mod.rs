//! The provider reference table: provider codes and their display names.

mod cache;
mod db;
mod domain;

pub use cache::ProviderCache;
pub use db::{
    create_provider, create_provider_table, delete_provider, get_all_providers, get_provider,
    update_provider,
};
pub use domain::{Provider, ProviderCode};
