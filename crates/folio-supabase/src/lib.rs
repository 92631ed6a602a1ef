//! Supabase (PostgREST) gateways for the portfolio collections
//!
//! - `config` - SupabaseConfig (project URL, key, schema, table names)
//! - `client` - SupabaseClient (HTTP client)
//! - `gateway` - SupabaseCollection, a `RemoteCollection` per table

pub mod client;
pub mod config;
pub mod gateway;

pub use client::{PostgrestError, SupabaseClient};
pub use config::{SupabaseConfig, TableNames};
pub use gateway::SupabaseCollection;

use folio::dashboard::{Dashboard, Gateways};
use folio::StoreConfig;
use folio_api::{Certificate, CollectionKind, Education, Experience, Skill};
use folio_core::Result;
use std::sync::Arc;

/// Gateways for all four collections sharing one client.
pub fn gateways(config: &SupabaseConfig) -> Result<Gateways> {
    let client = Arc::new(SupabaseClient::new(config)?);
    let table = |kind| config.tables.get(kind).to_string();

    Ok(Gateways {
        skills: Arc::new(SupabaseCollection::<Skill>::new(
            client.clone(),
            table(CollectionKind::Skills),
        )),
        experiences: Arc::new(SupabaseCollection::<Experience>::new(
            client.clone(),
            table(CollectionKind::Experiences),
        )),
        education: Arc::new(SupabaseCollection::<Education>::new(
            client.clone(),
            table(CollectionKind::Education),
        )),
        certificates: Arc::new(SupabaseCollection::<Certificate>::new(
            client,
            table(CollectionKind::Certificates),
        )),
    })
}

/// Dashboard backed by the configured Supabase project.
pub fn dashboard(config: &SupabaseConfig, store_config: StoreConfig) -> Result<Dashboard> {
    tracing::info!(url = %config.url, schema = %config.schema, "connecting dashboard to Supabase");
    Ok(Dashboard::new(gateways(config)?, store_config))
}
