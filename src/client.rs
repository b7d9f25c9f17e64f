//! EWS client facade.
//!
//! The [`EwsClient`] is the main entry point for this crate. It owns the
//! endpoint, credentials and transport, and shares a [`JobQueue`] with any
//! other client talking to the same server. It provides async methods for the
//! folder operations and `GetItem`; [`EwsClient::execute`] runs any
//! [`Operation`] and returns every response message untouched.
//!
//! # Example
//!
//! ```no_run
//! use ews_sync::{EwsClient, EwsConfig};
//! use ews_sync::id::DistinguishedFolder;
//! use ews_sync::request::{BaseShape, Shape, Traversal};
//!
//! # async fn example() -> ews_sync::Result<()> {
//! let config = EwsConfig::builder()
//!     .email("user@example.com")
//!     .password("secret")
//!     .build()?;
//!
//! // Resolves the endpoint via autodiscovery when no URL is configured
//! let client = EwsClient::connect(config).await?;
//!
//! let folders = client
//!     .find_folders(
//!         Shape::new(BaseShape::Default),
//!         DistinguishedFolder::MsgFolderRoot.into(),
//!         Traversal::Deep,
//!     )
//!     .await?;
//! for folder in &folders {
//!     println!("{}", folder.display_name().unwrap_or("(unnamed)"));
//! }
//! # Ok(())
//! # }
//! ```

use crate::autodiscover::Autodiscover;
use crate::config::EwsConfig;
use crate::error::{Error, Result};
use crate::folder::Folder;
use crate::id::Identifier;
use crate::item::Item;
use crate::queue::JobQueue;
use crate::request::{
    CreateFolder, DeleteFolder, DeleteType, FindFolder, FolderChange, GetFolder, GetItem,
    MoveFolder, Operation, Request, ResponseMessage, Shape, SyncFolderHierarchy,
    SyncFolderHierarchyResult, Traversal, UpdateFolder,
};
use crate::transport::{ReqwestTransport, Transport};
use futures::future::try_join_all;
use std::sync::Arc;
use tracing::{debug, instrument};
use url::Url;

/// Ids per `GetFolder`/`GetItem` request; larger lists are split and sent
/// concurrently through the queue.
const BATCH_SIZE: usize = 100;

/// `MaxEntriesReturned` of each `FindFolder` page.
const FIND_PAGE_SIZE: u32 = 500;

/// Async Exchange Web Services client.
///
/// Create using [`EwsClient::connect`], or [`EwsClient::connect_with`] to
/// supply a transport and a shared queue. Cloning is cheap and clones share
/// the transport and queue.
#[derive(Clone)]
pub struct EwsClient {
    config: EwsConfig,
    endpoint: Url,
    transport: Arc<dyn Transport>,
    queue: Arc<JobQueue>,
}

impl EwsClient {
    /// Creates a client with a `reqwest` transport and a private queue sized
    /// from the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or, when no EWS URL
    /// is configured, autodiscovery fails.
    #[instrument(
        name = "EwsClient::connect",
        skip_all,
        fields(
            email = %config.email(),
            ews_url = config.effective_ews_url().map(Url::as_str),
            proxy_enabled = config.proxy.is_some()
        )
    )]
    pub async fn connect(config: EwsConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(&config.timeouts, config.proxy.as_ref())?;
        let queue = Arc::new(JobQueue::new(config.queue.max_in_flight));
        Self::connect_with(config, Arc::new(transport), queue).await
    }

    /// Creates a client over the given transport and queue, autodiscovering
    /// the endpoint if the configuration has none.
    ///
    /// # Errors
    ///
    /// Returns an error if autodiscovery is needed and fails.
    pub async fn connect_with(
        config: EwsConfig,
        transport: Arc<dyn Transport>,
        queue: Arc<JobQueue>,
    ) -> Result<Self> {
        let endpoint = match config.effective_ews_url() {
            Some(url) => url.clone(),
            None => {
                debug!("No EWS URL configured, running autodiscovery");
                Autodiscover::new(Arc::clone(&transport), Some(config.credentials()))
                    .queue(Arc::clone(&queue))
                    .max_redirects(config.autodiscover.max_redirects)
                    .resolve(config.email())
                    .await?
                    .ews_url
            }
        };

        debug!(endpoint = %endpoint, "Client ready");
        Ok(Self::new(config, endpoint, transport, queue))
    }

    /// Creates a client for a known endpoint without any network traffic.
    #[must_use]
    pub fn new(
        config: EwsConfig,
        endpoint: Url,
        transport: Arc<dyn Transport>,
        queue: Arc<JobQueue>,
    ) -> Self {
        Self {
            config,
            endpoint,
            transport,
            queue,
        }
    }

    /// The configuration the client was built from.
    #[must_use]
    pub fn config(&self) -> &EwsConfig {
        &self.config
    }

    /// Mailbox address of the authenticated user.
    #[must_use]
    pub fn email(&self) -> &str {
        self.config.email()
    }

    /// The EWS URL requests are posted to.
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// The admission queue shared by every request of this client.
    #[must_use]
    pub fn queue(&self) -> &Arc<JobQueue> {
        &self.queue
    }

    /// Builds, sends and parses one operation.
    ///
    /// Every response message is returned, failed ones included.
    ///
    /// # Errors
    ///
    /// Returns transport errors, SOAP faults, parse errors and
    /// [`Error::ResponseCountMismatch`].
    pub async fn execute<O: Operation>(&self, operation: &O) -> Result<Vec<ResponseMessage<O::Payload>>> {
        Request::build(operation, self.config.server_version)?
            .send(
                Arc::clone(&self.transport),
                &self.queue,
                self.endpoint.clone(),
                Some(self.config.credentials()),
            )
            .await
    }

    /// Runs `operation` and converts every message into its payload, failing
    /// on the first message that is not `Success` or `Warning`.
    async fn execute_all<O: Operation>(&self, operation: &O) -> Result<Vec<O::Payload>> {
        self.execute(operation)
            .await?
            .into_iter()
            .map(|message| message.into_result(O::NAME))
            .collect()
    }

    /// Runs an operation that answers with exactly one message.
    async fn execute_single<O: Operation>(&self, operation: &O) -> Result<O::Payload> {
        let mut payloads = self.execute_all(operation).await?;
        if payloads.len() != 1 {
            return Err(Error::ResponseCountMismatch {
                operation: O::NAME.to_string(),
                expected: 1,
                actual: payloads.len(),
            });
        }
        Ok(payloads.remove(0))
    }

    /// Fetches folders by id, one folder per id, in request order.
    ///
    /// # Errors
    ///
    /// Fails on the first failed response message, and with
    /// [`Error::InvalidEntity`] if a returned folder could not be decoded.
    #[instrument(name = "EwsClient::get_folders", skip_all, fields(count = ids.len()))]
    pub async fn get_folders(&self, shape: Shape, ids: Vec<Identifier>) -> Result<Vec<Folder>> {
        let requests: Vec<GetFolder> = ids
            .chunks(BATCH_SIZE)
            .map(|chunk| GetFolder::new(shape.clone(), chunk.to_vec()))
            .collect();

        let batches = try_join_all(requests.iter().map(|op| self.execute_all(op))).await?;
        let folders: Vec<Folder> = batches.into_iter().flatten().flatten().collect();
        require_valid_folders("GetFolder", folders)
    }

    /// Fetches a single folder.
    ///
    /// # Errors
    ///
    /// See [`get_folders`](Self::get_folders).
    pub async fn get_folder(&self, shape: Shape, id: Identifier) -> Result<Folder> {
        let mut folders = self.get_folders(shape, vec![id]).await?;
        if folders.len() != 1 {
            return Err(Error::ResponseCountMismatch {
                operation: GetFolder::NAME.to_string(),
                expected: 1,
                actual: folders.len(),
            });
        }
        Ok(folders.remove(0))
    }

    /// Lists the folders below `parent`, following `FindFolder` paging until
    /// the last page.
    ///
    /// # Errors
    ///
    /// Fails on a failed response message or an undecodable folder.
    #[instrument(
        name = "EwsClient::find_folders",
        skip_all,
        fields(parent = %parent, traversal = traversal.as_str())
    )]
    pub async fn find_folders(
        &self,
        shape: Shape,
        parent: Identifier,
        traversal: Traversal,
    ) -> Result<Vec<Folder>> {
        let mut folders = Vec::new();
        let mut offset = 0u32;

        loop {
            let operation = FindFolder::new(shape.clone(), vec![parent.clone()], traversal)
                .page(FIND_PAGE_SIZE, offset);
            let page = self.execute_single(&operation).await?;
            let received = page.folders.len();
            folders.extend(page.folders);

            debug!(received, offset, total = page.total_items, "FindFolder page");

            if page.includes_last || received == 0 {
                break;
            }
            let next = page
                .next_offset
                .unwrap_or_else(|| offset.saturating_add(u32::try_from(received).unwrap_or(u32::MAX)));
            if next <= offset {
                return Err(Error::malformed(format!(
                    "FindFolder paging did not advance past offset {offset}"
                )));
            }
            offset = next;
        }

        require_valid_folders(FindFolder::NAME, folders)
    }

    /// Runs one `SyncFolderHierarchy` round trip.
    ///
    /// Pass the state returned by the previous round, or `None` for an
    /// initial sync. Callers loop while `includes_last` is `false`.
    ///
    /// # Errors
    ///
    /// Fails if the response message is not successful, e.g. with
    /// `ErrorInvalidSyncStateData` for a stale state.
    #[instrument(
        name = "EwsClient::sync_folder_hierarchy",
        skip_all,
        fields(incremental = sync_state.is_some())
    )]
    pub async fn sync_folder_hierarchy(
        &self,
        shape: Shape,
        sync_folder: Option<Identifier>,
        sync_state: Option<String>,
    ) -> Result<SyncFolderHierarchyResult> {
        let operation = SyncFolderHierarchy::new(shape, sync_folder, sync_state);
        let result = self.execute_single(&operation).await?;
        debug!(
            changes = result.changes.len(),
            includes_last = result.includes_last,
            "Hierarchy changes received"
        );
        Ok(result)
    }

    /// Creates folders under `parent` and returns them with their new ids.
    ///
    /// # Errors
    ///
    /// Fails on the first failed response message.
    #[instrument(name = "EwsClient::create_folders", skip_all, fields(parent = %parent, count = folders.len()))]
    pub async fn create_folders(&self, parent: Identifier, folders: Vec<Folder>) -> Result<Vec<Folder>> {
        if folders.is_empty() {
            return Ok(Vec::new());
        }
        let created = self.execute_all(&CreateFolder::new(parent, folders)).await?;
        require_valid_folders(CreateFolder::NAME, created.into_iter().flatten().collect())
    }

    /// Applies folder changes and returns the folders with their new change keys.
    ///
    /// # Errors
    ///
    /// Fails on the first failed response message.
    #[instrument(name = "EwsClient::update_folders", skip_all, fields(count = changes.len()))]
    pub async fn update_folders(&self, changes: Vec<FolderChange>) -> Result<Vec<Folder>> {
        if changes.is_empty() {
            return Ok(Vec::new());
        }
        let updated = self.execute_all(&UpdateFolder::new(changes)).await?;
        require_valid_folders(UpdateFolder::NAME, updated.into_iter().flatten().collect())
    }

    /// Moves folders under `to` and returns them with their new ids.
    ///
    /// # Errors
    ///
    /// Fails on the first failed response message.
    #[instrument(name = "EwsClient::move_folders", skip_all, fields(to = %to, count = ids.len()))]
    pub async fn move_folders(&self, to: Identifier, ids: Vec<Identifier>) -> Result<Vec<Folder>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let moved = self.execute_all(&MoveFolder::new(to, ids)).await?;
        require_valid_folders(MoveFolder::NAME, moved.into_iter().flatten().collect())
    }

    /// Deletes folders.
    ///
    /// # Errors
    ///
    /// Fails on the first failed response message.
    #[instrument(name = "EwsClient::delete_folders", skip_all, fields(count = ids.len(), delete_type = delete_type.as_str()))]
    pub async fn delete_folders(&self, ids: Vec<Identifier>, delete_type: DeleteType) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.execute_all(&DeleteFolder::new(ids, delete_type)).await?;
        Ok(())
    }

    /// Fetches items by id.
    ///
    /// # Errors
    ///
    /// Fails on the first failed response message, and with
    /// [`Error::InvalidEntity`] if a returned item could not be decoded.
    #[instrument(name = "EwsClient::get_items", skip_all, fields(count = ids.len()))]
    pub async fn get_items(&self, shape: Shape, ids: Vec<Identifier>) -> Result<Vec<Item>> {
        let requests: Vec<GetItem> = ids
            .chunks(BATCH_SIZE)
            .map(|chunk| GetItem::new(shape.clone(), chunk.to_vec()))
            .collect();

        let batches = try_join_all(requests.iter().map(|op| self.execute_all(op))).await?;
        let items: Vec<Item> = batches.into_iter().flatten().flatten().collect();
        if let Some(invalid) = items.iter().find(|item| !item.is_valid()) {
            return Err(Error::InvalidEntity {
                operation: GetItem::NAME.to_string(),
                entity: invalid.kind().element_name().to_string(),
            });
        }
        Ok(items)
    }
}

impl std::fmt::Debug for EwsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EwsClient")
            .field("email", &self.config.email())
            .field("endpoint", &self.endpoint.as_str())
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

fn require_valid_folders(operation: &str, folders: Vec<Folder>) -> Result<Vec<Folder>> {
    if let Some(invalid) = folders.iter().find(|folder| !folder.is_valid()) {
        return Err(Error::InvalidEntity {
            operation: operation.to_string(),
            entity: invalid.kind().element_name().to_string(),
        });
    }
    Ok(folders)
}
