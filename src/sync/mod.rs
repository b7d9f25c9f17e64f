//! Folder hierarchy synchronization.
//!
//! [`FolderSync`] mirrors the remote folder tree below a root folder into a
//! [`CollectionStore`]. With a sync state from a previous run it performs an
//! incremental round:
//!
//! 1. `SyncFolderHierarchy` (`IdOnly`) until the last page,
//! 2. one batched `GetFolder` for every created or updated folder,
//! 3. [`reconcile`](reconcile::reconcile) against the store,
//! 4. [`CollectionStore::commit`].
//!
//! Without a state, or when the incremental round reports a condition that
//! needs it (see [`Error::requires_full_resync`]), it runs a full resync from
//! `FindFolder` instead.
//!
//! # Example
//!
//! ```no_run
//! use ews_sync::sync::{FolderSync, MemoryStore};
//! use ews_sync::{EwsClient, EwsConfig};
//! use std::sync::Arc;
//!
//! # async fn example() -> ews_sync::Result<()> {
//! # let config = EwsConfig::builder().email("a@b.c").password("x").build()?;
//! let client = EwsClient::connect(config).await?;
//! let sync = FolderSync::new(client, Arc::new(MemoryStore::new()));
//!
//! let first = sync.run(None).await?;
//! // Persist `first.sync_state` and pass it to the next run
//! let next = sync.run(first.sync_state).await?;
//! println!("{} folders changed", next.result.changed.len());
//! # Ok(())
//! # }
//! ```

pub mod reconcile;
pub mod store;

pub use reconcile::{
    reconcile, CollectionChange, CollectionMove, ReconcileResult, Reconciler,
};
pub use store::{Collection, CollectionStore, MemoryStore, RecordedMove};

use crate::client::EwsClient;
use crate::error::{Error, Result};
use crate::folder::{Folder, FolderField};
use crate::id::{self, Identifier};
use crate::request::{
    BaseShape, ChangeKind, ChangeListEntry, GetFolder, Operation, Shape, Traversal,
};
use futures::future::try_join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Ids per `GetFolder` request when fetching changed folders.
const DETAIL_BATCH_SIZE: usize = 100;

/// Response codes meaning the folder vanished between the changelist and
/// the detail fetch.
const GONE_CODES: &[&str] = &["ErrorFolderNotFound", "ErrorItemNotFound"];

/// Fields fetched for every changed folder.
const DETAIL_FIELDS: &[FolderField] = &[
    FolderField::ParentId,
    FolderField::DisplayName,
    FolderField::FolderClass,
    FolderField::EffectiveRights,
    FolderField::ChildFolderCount,
];

fn detail_shape() -> Shape {
    Shape::new(BaseShape::IdOnly).with_all(DETAIL_FIELDS.iter().filter_map(|f| f.property()))
}

/// Result of [`FolderSync::run`].
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    /// What was committed to the store.
    pub result: ReconcileResult,
    /// State to pass to the next run.
    pub sync_state: Option<String>,
    /// Whether this run was a full resync.
    pub full: bool,
}

/// Synchronizes the folder tree below a root folder into a store.
pub struct FolderSync {
    client: EwsClient,
    store: Arc<dyn CollectionStore>,
    root: Identifier,
}

impl std::fmt::Debug for FolderSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FolderSync")
            .field("client", &self.client)
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl FolderSync {
    /// Creates a sync for the root configured in [`SyncConfig`](crate::SyncConfig).
    #[must_use]
    pub fn new(client: EwsClient, store: Arc<dyn CollectionStore>) -> Self {
        let root = client.config().sync.root.into();
        Self {
            client,
            store,
            root,
        }
    }

    /// Synchronizes the tree under `root` instead of the configured one.
    #[must_use]
    pub fn with_root(mut self, root: Identifier) -> Self {
        self.root = root;
        self
    }

    /// Root of the synchronized tree.
    #[must_use]
    pub fn root(&self) -> &Identifier {
        &self.root
    }

    /// Runs one synchronization.
    ///
    /// # Errors
    ///
    /// Returns transport, protocol and store errors. Reconciliation errors of
    /// an incremental round trigger a full resync instead of being returned.
    #[instrument(
        name = "FolderSync::run",
        skip_all,
        fields(root = %self.root, incremental = sync_state.is_some())
    )]
    pub async fn run(&self, sync_state: Option<String>) -> Result<SyncOutcome> {
        let Some(state) = sync_state else {
            return self.full_sync().await;
        };

        match self.incremental_sync(state).await {
            Err(e) if e.requires_full_resync() => {
                warn!(error = %e, "Incremental sync failed, falling back to full resync");
                self.full_sync().await
            }
            other => other,
        }
    }

    /// Runs an incremental round from `sync_state`.
    ///
    /// # Errors
    ///
    /// Returns every error, including the ones [`run`](Self::run) recovers from.
    #[instrument(name = "FolderSync::incremental_sync", skip_all)]
    pub async fn incremental_sync(&self, sync_state: String) -> Result<SyncOutcome> {
        let (changes, state) = self.fetch_changes(Some(sync_state)).await?;
        debug!(changes = changes.len(), "Changelist received");

        let changes = self.fill_details(changes).await?;
        let result = reconcile(&changes, self.store.as_ref()).await?;
        self.store.commit(&result).await?;
        remember_names(&result);

        info!(
            changed = result.changed.len(),
            deleted = result.deleted.len(),
            moves = result.moves.len(),
            "Incremental sync committed"
        );
        Ok(SyncOutcome {
            result,
            sync_state: Some(state),
            full: false,
        })
    }

    /// Rebuilds the store from a complete listing of the remote tree.
    ///
    /// A fresh sync state is obtained first so that changes made while the
    /// listing runs are picked up by the next incremental round.
    ///
    /// # Errors
    ///
    /// Returns transport, protocol, reconciliation and store errors.
    #[instrument(name = "FolderSync::full_sync", skip_all)]
    pub async fn full_sync(&self) -> Result<SyncOutcome> {
        let (_, state) = self.fetch_changes(None).await?;

        let shape = detail_shape();
        let root = self.client.get_folder(shape.clone(), self.root.clone()).await?;
        let descendants = self
            .client
            .find_folders(shape, self.root.clone(), Traversal::Deep)
            .await?;
        debug!(folders = descendants.len() + 1, "Remote tree listed");

        let mut by_id: HashMap<String, Folder> = HashMap::new();
        for folder in std::iter::once(&root).chain(&descendants) {
            if let Some(id) = folder.id().and_then(Identifier::id) {
                by_id.insert(id.to_string(), folder.clone());
            }
        }

        let tree = Folder::assemble_tree(root, descendants)?;
        let root_id = tree.id().and_then(Identifier::id).map(str::to_string);

        let mut changes = Vec::with_capacity(by_id.len());
        for node in tree.pre_order() {
            let Some(id) = node.id().and_then(Identifier::id) else {
                continue;
            };
            let Some(mut folder) = by_id.remove(id) else {
                continue;
            };
            // The root's own parent lies outside the synchronized tree.
            if root_id.as_deref() == Some(id) {
                folder.remove(FolderField::ParentId);
            }
            changes.push(ChangeListEntry::update(folder));
        }

        let remote: HashSet<&str> = changes
            .iter()
            .filter_map(|c| c.id.id())
            .collect();
        let stale: Vec<ChangeListEntry> = self
            .store
            .known_remote_ids()
            .await?
            .into_iter()
            .filter(|id| !remote.contains(id.as_str()))
            .map(|id| ChangeListEntry::delete(Identifier::real(id, None)))
            .collect();
        changes.extend(stale);

        let result = Reconciler::new(self.store.as_ref())
            .allow_moves_into_new(true)
            .run(&changes)
            .await?;
        self.store.commit(&result).await?;
        remember_names(&result);

        info!(
            changed = result.changed.len(),
            deleted = result.deleted.len(),
            "Full resync committed"
        );
        Ok(SyncOutcome {
            result,
            sync_state: Some(state),
            full: true,
        })
    }

    /// Pages through `SyncFolderHierarchy` until the last change.
    async fn fetch_changes(
        &self,
        mut sync_state: Option<String>,
    ) -> Result<(Vec<ChangeListEntry>, String)> {
        let mut changes = Vec::new();
        loop {
            let page = self
                .client
                .sync_folder_hierarchy(
                    Shape::new(BaseShape::IdOnly),
                    Some(self.root.clone()),
                    sync_state.take(),
                )
                .await?;
            changes.extend(page.changes);
            if page.includes_last {
                return Ok((changes, page.sync_state));
            }
            if page.sync_state.is_empty() {
                return Err(Error::malformed(
                    "SyncFolderHierarchy returned a partial page without a sync state",
                ));
            }
            sync_state = Some(page.sync_state);
        }
    }

    /// Replaces the `IdOnly` folders of Create/Update entries with detailed
    /// ones. Folders deleted in the meantime become Delete entries.
    async fn fill_details(&self, changes: Vec<ChangeListEntry>) -> Result<Vec<ChangeListEntry>> {
        let mut wanted: Vec<Identifier> = Vec::new();
        let mut seen = HashSet::new();
        for change in &changes {
            if change.kind != ChangeKind::Delete {
                if let Some(id) = change.id.id() {
                    if seen.insert(id.to_string()) {
                        wanted.push(change.id.clone());
                    }
                }
            }
        }
        if wanted.is_empty() {
            return Ok(changes);
        }

        let shape = detail_shape();
        let requests: Vec<GetFolder> = wanted
            .chunks(DETAIL_BATCH_SIZE)
            .map(|chunk| GetFolder::new(shape.clone(), chunk.to_vec()))
            .collect();
        let batches = try_join_all(requests.iter().map(|op| self.client.execute(op))).await?;

        let mut details: HashMap<String, Option<Folder>> = HashMap::new();
        for (id, message) in wanted.iter().zip(batches.into_iter().flatten()) {
            let key = id.id().unwrap_or_default().to_string();
            if !message.is_ok() && GONE_CODES.contains(&message.code.as_str()) {
                debug!(id = %id, "Changed folder no longer exists");
                details.insert(key, None);
                continue;
            }
            let folder = message
                .into_result(GetFolder::NAME)?
                .into_iter()
                .next()
                .ok_or_else(|| Error::malformed(format!("GetFolder returned no folder for {id}")))?;
            if !folder.is_valid() {
                return Err(Error::InvalidEntity {
                    operation: GetFolder::NAME.to_string(),
                    entity: folder.kind().element_name().to_string(),
                });
            }
            details.insert(key, Some(folder));
        }

        Ok(changes
            .into_iter()
            .map(|change| {
                if change.kind == ChangeKind::Delete {
                    return change;
                }
                match change.id.id().and_then(|id| details.get(id)) {
                    Some(Some(folder)) => ChangeListEntry {
                        folder: Some(folder.clone()),
                        ..change
                    },
                    Some(None) => ChangeListEntry::delete(change.id),
                    None => change,
                }
            })
            .collect())
    }
}

/// Records display names for diagnostics.
fn remember_names(result: &ReconcileResult) {
    for change in &result.changed {
        if let Some(name) = &change.after.name {
            id::remember_name(&change.after.remote_id, name);
        }
    }
}
