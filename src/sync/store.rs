//! Local collection store interface.

use super::reconcile::ReconcileResult;
use crate::error::Result;
use crate::folder::{EffectiveRights, Folder, FolderKind};
use crate::id::Identifier;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

/// A local mirror of one remote folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection {
    /// Server id of the folder.
    pub remote_id: String,
    /// Change key of the last applied remote state.
    pub remote_revision: Option<String>,
    /// Server id of the parent; `None` for a top-level collection.
    pub parent_remote_id: Option<String>,
    /// Display name.
    pub name: Option<String>,
    /// Folder kind.
    pub kind: FolderKind,
    /// Folder class, e.g. `IPF.Appointment`.
    pub folder_class: Option<String>,
    /// Rights of the authenticated user.
    pub rights: Option<EffectiveRights>,
}

impl Collection {
    /// An empty, unparented collection.
    #[must_use]
    pub fn new(remote_id: impl Into<String>) -> Self {
        Self {
            remote_id: remote_id.into(),
            remote_revision: None,
            parent_remote_id: None,
            name: None,
            kind: FolderKind::Generic,
            folder_class: None,
            rights: None,
        }
    }

    /// Sets the parent.
    #[must_use]
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent_remote_id = Some(parent.into());
        self
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Builds an unparented collection from a remote folder. `None` if the
    /// folder has no server id.
    #[must_use]
    pub fn from_folder(folder: &Folder) -> Option<Self> {
        let id = folder.id().and_then(Identifier::id)?;
        let mut collection = Self::new(id);
        collection.apply(folder);
        Some(collection)
    }

    /// Copies the remote attributes present on `folder`. The parent is left
    /// alone; reparenting goes through the store.
    pub fn apply(&mut self, folder: &Folder) {
        self.kind = folder.kind();
        if let Some(key) = folder.id().and_then(Identifier::change_key) {
            self.remote_revision = Some(key.to_string());
        }
        if let Some(name) = folder.display_name() {
            self.name = Some(name.to_string());
        }
        if let Some(class) = folder.folder_class() {
            self.folder_class = Some(class.to_string());
        }
        if let Some(rights) = folder.effective_rights() {
            self.rights = Some(rights);
        }
    }
}

/// The local side of folder synchronization.
///
/// Implementations own the persistent collection tree. The reconciler only
/// reads through [`fetch_with_ancestors`](Self::fetch_with_ancestors), issues
/// moves, and hands the finished round to [`commit`](Self::commit).
#[async_trait]
pub trait CollectionStore: Send + Sync {
    /// Returns the collections for `ids` and all of their local ancestors,
    /// keyed by remote id. Unknown ids are absent from the map.
    async fn fetch_with_ancestors(&self, ids: &[String]) -> Result<HashMap<String, Collection>>;

    /// Looks up one collection.
    async fn lookup(&self, id: &str) -> Result<Option<Collection>> {
        Ok(self
            .fetch_with_ancestors(&[id.to_string()])
            .await?
            .remove(id))
    }

    /// Moves `collection` from `from` to `to`.
    async fn move_collection(
        &self,
        collection: &Collection,
        from: Option<&str>,
        to: &str,
    ) -> Result<()>;

    /// Persists a completed round.
    async fn commit(&self, result: &ReconcileResult) -> Result<()>;

    /// Remote ids of every collection held locally.
    async fn known_remote_ids(&self) -> Result<Vec<String>>;
}

/// A move issued through [`MemoryStore::move_collection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedMove {
    /// Moved collection.
    pub remote_id: String,
    /// Previous parent.
    pub from: Option<String>,
    /// New parent.
    pub to: String,
}

#[derive(Debug, Default)]
struct MemoryState {
    collections: HashMap<String, Collection>,
    moves: Vec<RecordedMove>,
    fetches: usize,
    commits: usize,
}

/// In-memory [`CollectionStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store preloaded with `collections`.
    #[must_use]
    pub fn with_collections<I>(collections: I) -> Self
    where
        I: IntoIterator<Item = Collection>,
    {
        let collections = collections
            .into_iter()
            .map(|c| (c.remote_id.clone(), c))
            .collect();
        Self {
            state: Mutex::new(MemoryState {
                collections,
                ..MemoryState::default()
            }),
        }
    }

    /// The stored collection for `id`.
    pub async fn get(&self, id: &str) -> Option<Collection> {
        self.state.lock().await.collections.get(id).cloned()
    }

    /// Number of stored collections.
    pub async fn len(&self) -> usize {
        self.state.lock().await.collections.len()
    }

    /// `true` when nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.collections.is_empty()
    }

    /// Every move issued so far, in order.
    pub async fn moves(&self) -> Vec<RecordedMove> {
        self.state.lock().await.moves.clone()
    }

    /// Number of `fetch_with_ancestors` calls.
    pub async fn fetches(&self) -> usize {
        self.state.lock().await.fetches
    }

    /// Number of committed rounds.
    pub async fn commits(&self) -> usize {
        self.state.lock().await.commits
    }
}

#[async_trait]
impl CollectionStore for MemoryStore {
    async fn fetch_with_ancestors(&self, ids: &[String]) -> Result<HashMap<String, Collection>> {
        let mut state = self.state.lock().await;
        state.fetches += 1;

        let mut out = HashMap::new();
        for id in ids {
            let mut next = Some(id.clone());
            while let Some(current) = next.take() {
                if out.contains_key(&current) {
                    break;
                }
                let Some(collection) = state.collections.get(&current) else {
                    break;
                };
                next.clone_from(&collection.parent_remote_id);
                out.insert(current, collection.clone());
            }
        }
        Ok(out)
    }

    async fn move_collection(
        &self,
        collection: &Collection,
        from: Option<&str>,
        to: &str,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        debug!(id = %collection.remote_id, ?from, to, "Moving collection");
        if let Some(stored) = state.collections.get_mut(&collection.remote_id) {
            stored.parent_remote_id = Some(to.to_string());
        }
        state.moves.push(RecordedMove {
            remote_id: collection.remote_id.clone(),
            from: from.map(str::to_string),
            to: to.to_string(),
        });
        Ok(())
    }

    async fn commit(&self, result: &ReconcileResult) -> Result<()> {
        let mut state = self.state.lock().await;
        for collection in &result.deleted {
            state.collections.remove(&collection.remote_id);
        }
        for change in &result.changed {
            state
                .collections
                .insert(change.after.remote_id.clone(), change.after.clone());
        }
        state.commits += 1;
        Ok(())
    }

    async fn known_remote_ids(&self) -> Result<Vec<String>> {
        Ok(self.state.lock().await.collections.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::folder::FolderKind;

    #[test]
    fn test_from_folder_requires_real_id() {
        let mut folder = Folder::new(FolderKind::Calendar);
        assert!(Collection::from_folder(&folder).is_none());

        folder.set_id(Identifier::real("F1", Some("CK1")));
        folder.set_display_name("Calendar");
        folder.set_parent_id(Identifier::real("ROOT", None));
        let collection = Collection::from_folder(&folder).unwrap();
        assert_eq!(collection.remote_id, "F1");
        assert_eq!(collection.remote_revision.as_deref(), Some("CK1"));
        assert_eq!(collection.name.as_deref(), Some("Calendar"));
        assert_eq!(collection.kind, FolderKind::Calendar);
        assert_eq!(collection.parent_remote_id, None);
    }

    #[tokio::test]
    async fn test_fetch_includes_ancestors() {
        let store = MemoryStore::with_collections([
            Collection::new("ROOT"),
            Collection::new("A").with_parent("ROOT"),
            Collection::new("B").with_parent("A"),
            Collection::new("OTHER").with_parent("ROOT"),
        ]);

        let fetched = store
            .fetch_with_ancestors(&["B".to_string(), "MISSING".to_string()])
            .await
            .unwrap();
        let mut ids: Vec<_> = fetched.keys().cloned().collect();
        ids.sort();
        assert_eq!(ids, ["A", "B", "ROOT"]);
        assert_eq!(store.fetches().await, 1);

        assert!(store.lookup("OTHER").await.unwrap().is_some());
        assert!(store.lookup("MISSING").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_move_updates_parent() {
        let store = MemoryStore::with_collections([
            Collection::new("A").with_parent("ROOT"),
            Collection::new("B").with_parent("ROOT"),
        ]);
        let a = store.get("A").await.unwrap();
        store.move_collection(&a, Some("ROOT"), "B").await.unwrap();

        assert_eq!(store.get("A").await.unwrap().parent_remote_id.as_deref(), Some("B"));
        assert_eq!(
            store.moves().await,
            [RecordedMove {
                remote_id: "A".into(),
                from: Some("ROOT".into()),
                to: "B".into()
            }]
        );
    }
}
