//! Config-driven provider registry.
//!
//! Builds one provider handle per `[providers.<name>]` entry and resolves
//! each entity's column bindings against them.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use fts_core::{EntityBinding, FtsMiddleware, ProviderBinding, SearchProvider};
use fts_types::{EntitySettings, FtsError, ProviderError, ProviderSettings, Settings};

use crate::algolia::{AlgoliaConfig, AlgoliaProvider};
use crate::elasticsearch::{ElasticsearchConfig, ElasticsearchProvider, Flavor};
use crate::embedded::{TantivyConfig, TantivyProvider};

/// Named provider handles.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn SearchProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider under `name`, replacing any previous one.
    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn SearchProvider>) {
        self.providers.insert(name.into(), provider);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn SearchProvider>> {
        self.providers.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Build every configured provider.
    ///
    /// The provider name doubles as its identity, so two names always address
    /// two distinct back-ends.
    pub fn from_settings(settings: &Settings) -> Result<Self, FtsError> {
        let mut registry = Self::new();
        for (name, provider_settings) in &settings.providers {
            let provider = build_provider(name, provider_settings)
                .map_err(|e| FtsError::Config(format!("provider {name}: {e}")))?;
            registry.register(name.clone(), provider);
        }

        info!(providers = registry.len(), "Built provider registry");
        Ok(registry)
    }

    /// Resolve an entity's column bindings into an [`EntityBinding`].
    pub fn entity_binding(&self, entity: &str, settings: &EntitySettings) -> Result<EntityBinding, FtsError> {
        let mut columns = ProviderBinding::new();
        for (column, binding) in &settings.columns {
            let provider = self.get(&binding.provider).ok_or_else(|| {
                FtsError::Config(format!(
                    "entity {entity}: column {column} references unknown provider {}",
                    binding.provider
                ))
            })?;
            columns.bind(column.clone(), provider, binding.destination.clone());
        }

        Ok(EntityBinding::new(settings.pk(), columns).with_sync_on(settings.sync_on.iter().copied()))
    }

    /// Resolve every configured entity.
    pub fn entity_bindings(&self, settings: &Settings) -> Result<HashMap<String, EntityBinding>, FtsError> {
        settings
            .entities
            .iter()
            .map(|(name, entity)| Ok((name.clone(), self.entity_binding(name, entity)?)))
            .collect()
    }

    /// Middleware covering every configured entity.
    pub fn middleware(&self, settings: &Settings) -> Result<FtsMiddleware, FtsError> {
        Ok(FtsMiddleware::new(self.entity_bindings(settings)?))
    }
}

fn build_provider(name: &str, settings: &ProviderSettings) -> Result<Arc<dyn SearchProvider>, ProviderError> {
    let provider: Arc<dyn SearchProvider> = match settings {
        ProviderSettings::Elasticsearch(http) => Arc::new(ElasticsearchProvider::new(
            name,
            ElasticsearchConfig::from_settings(http, Flavor::Elasticsearch),
        )?),
        ProviderSettings::Opensearch(http) => Arc::new(ElasticsearchProvider::new(
            name,
            ElasticsearchConfig::from_settings(http, Flavor::OpenSearch),
        )?),
        ProviderSettings::Algolia(algolia) => {
            Arc::new(AlgoliaProvider::new(name, AlgoliaConfig::from_settings(algolia))?)
        }
        ProviderSettings::Tantivy(tantivy) => {
            Arc::new(TantivyProvider::open(name, &TantivyConfig::from_settings(tantivy))?)
        }
    };
    Ok(provider)
}

/// Build the registry and middleware for a settings file in one step.
pub fn build_middleware(settings: &Settings) -> Result<FtsMiddleware, FtsError> {
    ProviderRegistry::from_settings(settings)?.middleware(settings)
}
