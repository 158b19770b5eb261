//! Application state shared by the server commands.

use crate::config::{AppConfig, SearchBackend};
use crate::database::Database;
use crate::events::EventBus;
use crate::index::{IndexClient, IndexListener, MemoryIndex, TypesenseClient};
use crate::search::{DatabaseSearcher, IndexSearcher, ScopeResolver, Searcher, TaskSearchService};
use crate::sync_service::IndexSyncService;
use crate::tasks::TaskService;
use anyhow::{anyhow, Result};
use std::sync::Arc;
use tokio::task::JoinHandle;

pub struct AppContext {
    pub config: AppConfig,
    pub database: Arc<Database>,
    pub bus: EventBus,
    pub index: Option<Arc<dyn IndexClient>>,
    /// Publishes on `bus`, which the index listener follows
    pub tasks: Arc<TaskService>,
}

impl AppContext {
    pub fn new(config: AppConfig, database: Arc<Database>) -> Self {
        let index: Option<Arc<dyn IndexClient>> =
            match (config.search_backend, &config.typesense) {
                (SearchBackend::Memory, _) => Some(Arc::new(MemoryIndex::new())),
                (_, Some(typesense)) => {
                    tracing::info!("Search index at {}", typesense.url);
                    Some(Arc::new(TypesenseClient::new(&typesense.url, &typesense.api_key)))
                }
                (_, None) => None,
            };

        let bus = EventBus::new(config.event_bus_capacity);
        let tasks = Arc::new(TaskService::new(database.clone(), bus.clone()));

        Self {
            config,
            database,
            bus,
            index,
            tasks,
        }
    }

    pub fn require_index(&self) -> Result<Arc<dyn IndexClient>> {
        self.index.clone().ok_or_else(|| {
            anyhow!("TYPESENSE_URL and TYPESENSE_API_KEY are required for the search index")
        })
    }

    /// Searcher for the configured backend behind the scope resolver
    pub fn search_service(&self) -> Result<TaskSearchService> {
        let searcher: Arc<dyn Searcher> = match self.config.search_backend {
            SearchBackend::Database => Arc::new(DatabaseSearcher::new(self.database.clone())),
            SearchBackend::Typesense | SearchBackend::Memory => Arc::new(IndexSearcher::new(
                self.database.clone(),
                self.require_index()?,
                &self.config.index_collection,
            )),
        };
        let resolver = ScopeResolver::new(
            self.database.clone(),
            self.database.clone(),
            self.config.default_timezone,
            self.config.max_items_per_page,
        );
        Ok(TaskSearchService::new(resolver, searcher))
    }

    /// Start the index listener, plus the resync loop for the in-process
    /// index, which has nobody else to fill it
    pub fn spawn_background(&self) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();
        let Some(index) = &self.index else {
            return handles;
        };

        let listener = IndexListener::new(
            self.database.clone(),
            index.clone(),
            &self.config.index_collection,
        );
        handles.push(listener.spawn(&self.bus));
        tracing::info!("Index listener started for {}", self.config.index_collection);

        if self.config.search_backend == SearchBackend::Memory {
            let sync = IndexSyncService::new(
                self.database.clone(),
                index.clone(),
                &self.config.index_collection,
                self.config.index_sync_interval_secs,
            );
            handles.push(tokio::spawn(sync.run()));
        }
        handles
    }
}

#[cfg(test)]
mod tests;
