use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use colstore_types::{CollectionName, DocumentId, Fields, Query, QuerySnapshot};
use tracing::info;

use crate::config::ClientConfig;
use crate::error::{RemoteError, RemoteResult};
use crate::service::{DocumentService, ListenerRegistration};

/// Explicitly constructed entry point to a remote document service.
///
/// Create one at process start and pass it to whatever needs collection
/// handles. After [`shutdown`](Self::shutdown) no new handles are issued;
/// handles obtained earlier keep working against the service.
pub struct DocumentClient {
    config: ClientConfig,
    service: Arc<dyn DocumentService>,
    shut_down: AtomicBool,
}

impl DocumentClient {
    /// Validate `config` and bind it to `service`.
    pub fn new(config: ClientConfig, service: Arc<dyn DocumentService>) -> RemoteResult<Self> {
        config.validate()?;
        info!(
            project = %config.project_id,
            database = %config.database,
            endpoint = %config.endpoint,
            "document client initialized"
        );
        Ok(Self {
            config,
            service,
            shut_down: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn service(&self) -> &Arc<dyn DocumentService> {
        &self.service
    }

    /// Handle to the collection called `name`.
    pub fn collection(&self, name: &str) -> RemoteResult<CollectionRef> {
        self.collection_ref(CollectionName::new(name)?)
    }

    pub fn collection_ref(&self, name: CollectionName) -> RemoteResult<CollectionRef> {
        if self.is_shut_down() {
            return Err(RemoteError::Unavailable("client has been shut down".into()));
        }
        Ok(CollectionRef {
            name,
            service: Arc::clone(&self.service),
        })
    }

    /// Stop issuing collection handles. Idempotent.
    pub fn shutdown(&self) {
        if !self.shut_down.swap(true, Ordering::AcqRel) {
            info!(project = %self.config.project_id, "document client shut down");
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }
}

impl fmt::Debug for DocumentClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentClient")
            .field("config", &self.config)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

/// Handle to one named remote collection.
///
/// Cheap to clone; every clone talks to the same service.
#[derive(Clone)]
pub struct CollectionRef {
    name: CollectionName,
    service: Arc<dyn DocumentService>,
}

impl CollectionRef {
    pub fn name(&self) -> &CollectionName {
        &self.name
    }

    /// Base query over this collection, ready to be shaped.
    pub fn query(&self) -> Query {
        Query::new(self.name.clone())
    }

    /// Create or replace a document; `None` lets the service pick the id.
    pub async fn set(&self, id: Option<&DocumentId>, fields: Fields) -> RemoteResult<DocumentId> {
        self.service.set_document(&self.name, id, fields).await
    }

    /// Create a document under a service-assigned id.
    pub async fn add(&self, fields: Fields) -> RemoteResult<DocumentId> {
        self.service.set_document(&self.name, None, fields).await
    }

    pub async fn delete(&self, id: &DocumentId) -> RemoteResult<bool> {
        self.service.delete_document(&self.name, id).await
    }

    /// One-shot read of the whole collection.
    pub async fn get(&self) -> RemoteResult<QuerySnapshot> {
        self.service.run_query(&self.query()).await
    }

    /// One-shot read of a shaped query over this collection.
    pub async fn run(&self, query: &Query) -> RemoteResult<QuerySnapshot> {
        self.check_query(query)?;
        self.service.run_query(query).await
    }

    /// Open a live query over this collection.
    pub fn listen(
        &self,
        query: &Query,
        listener: impl Fn(RemoteResult<QuerySnapshot>) + Send + Sync + 'static,
    ) -> RemoteResult<ListenerRegistration> {
        self.check_query(query)?;
        self.service.listen(query, Arc::new(listener))
    }

    fn check_query(&self, query: &Query) -> RemoteResult<()> {
        if query.collection() != &self.name {
            return Err(RemoteError::InvalidArgument(format!(
                "query targets collection {} but handle is for {}",
                query.collection(),
                self.name
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for CollectionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionRef").field("name", &self.name).finish()
    }
}
