//! Shared services for orchestration runs.
//!
//! [`ForgeServices`] owns the generative adapter, historical store, metrics
//! and publish gate. Orchestrators built from it share those handles, so
//! concurrent runs publish through one gate and report into one registry.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};

use crate::agents::{
    AgentError, BatchConfig, BatchGenerator, ForgeEvent, MasterOrchestrator,
};
use crate::categories::CategoryRegistry;
use crate::error::StoreError;
use crate::llm::{GenerativeAdapter, LiteLlmClient, LlmProvider};
use crate::metrics::ForgeMetrics;
use crate::storage::{HistoricalStore, InMemoryStore, SqliteStore};

use super::config::{ConfigError, ForgeConfig};

/// Errors raised while starting or stopping services.
#[derive(Debug, Error)]
pub enum ServicesError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),
}

/// Long-lived handles shared by every run.
pub struct ForgeServices {
    config: ForgeConfig,
    adapter: GenerativeAdapter,
    store: Arc<dyn HistoricalStore>,
    metrics: Arc<ForgeMetrics>,
    categories: Arc<CategoryRegistry>,
    publish_gate: Arc<Mutex<()>>,
}

impl std::fmt::Debug for ForgeServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForgeServices")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ForgeServices {
    /// Starts services against the configured OpenAI-compatible endpoint.
    pub async fn start(config: ForgeConfig) -> Result<Self, ServicesError> {
        let api_base = config.require_api_base()?.to_string();
        let client = LiteLlmClient::new(
            api_base,
            config.api_key.clone(),
            config.models.smart.clone(),
        );
        Self::start_with_provider(config, Arc::new(client)).await
    }

    /// Starts services with a caller-supplied provider.
    pub async fn start_with_provider(
        config: ForgeConfig,
        provider: Arc<dyn LlmProvider>,
    ) -> Result<Self, ServicesError> {
        let store: Arc<dyn HistoricalStore> = match &config.database_path {
            Some(path) => Arc::new(SqliteStore::open(path).await?),
            None => Arc::new(InMemoryStore::new()),
        };
        Self::start_with(config, provider, store)
    }

    /// Assembles services from explicit parts.
    pub fn start_with(
        config: ForgeConfig,
        provider: Arc<dyn LlmProvider>,
        store: Arc<dyn HistoricalStore>,
    ) -> Result<Self, ServicesError> {
        config.validate()?;

        let metrics = Arc::new(ForgeMetrics::new()?);
        let adapter = GenerativeAdapter::new(provider)
            .with_tiers(config.models.clone())
            .with_retry(config.retry)
            .with_metrics(Arc::clone(&metrics));

        info!(
            database = ?config.database_path,
            max_attempts = config.max_attempts,
            adversarial = config.run_adversarial,
            "Forge services started"
        );

        Ok(Self {
            config,
            adapter,
            store,
            metrics,
            categories: Arc::new(CategoryRegistry::with_defaults()),
            publish_gate: Arc::new(Mutex::new(())),
        })
    }

    pub fn config(&self) -> &ForgeConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<dyn HistoricalStore> {
        Arc::clone(&self.store)
    }

    pub fn metrics(&self) -> Arc<ForgeMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn categories(&self) -> Arc<CategoryRegistry> {
        Arc::clone(&self.categories)
    }

    /// Builds an orchestrator sharing this instance's handles.
    pub fn orchestrator(
        &self,
        events: Option<mpsc::Sender<ForgeEvent>>,
    ) -> Result<MasterOrchestrator, ServicesError> {
        let mut builder = MasterOrchestrator::builder()
            .adapter(self.adapter.clone())
            .store(self.store())
            .categories(self.categories())
            .metrics(self.metrics())
            .publish_gate(Arc::clone(&self.publish_gate))
            .config(self.config.orchestrator_config());
        if let Some(tx) = events {
            builder = builder.events(tx);
        }
        Ok(builder.build()?)
    }

    pub fn batch(
        &self,
        config: BatchConfig,
        events: Option<mpsc::Sender<ForgeEvent>>,
    ) -> Result<BatchGenerator, ServicesError> {
        let orchestrator = self.orchestrator(events)?;
        Ok(BatchGenerator::new(Arc::new(orchestrator), config))
    }

    /// Closes the store. Metrics are logged at debug level.
    pub async fn shutdown(self) -> Result<(), ServicesError> {
        debug!(metrics = %self.metrics.export(), "Final metrics");
        self.store.close().await?;
        info!("Forge services stopped");
        Ok(())
    }
}
