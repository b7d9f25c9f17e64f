//! Folder hierarchy reconciliation.
//!
//! A round takes one changelist and resolves it against the local store in
//! four steps:
//!
//! 1. **Collect**: one descriptor per changed id. Create and Update record the
//!    remote parent; parents that are not themselves in the changelist are
//!    ancestors to fetch.
//! 2. **Fetch**: ancestors plus Update/Delete ids are fetched from the store
//!    in a single batched call. Descriptors that exist only as references are
//!    processed on the spot.
//! 3. **Reconcile**: updates are applied and moves planned when the target
//!    parent is already processed; creates are placed under processed
//!    parents. Anything else is deferred.
//! 4. **Reparent**: when something was deferred, a depth-first walk from the
//!    top-level descriptors places children after their parents.
//!
//! A descriptor still unprocessed after step 4 fails the round with
//! [`Error::OrphanedFolders`]. Moves into folders created in the same round
//! are rejected right after the fetch. Planned moves reach the store only
//! once the round has succeeded, so a failed round leaves the store as it
//! was.
//!
//! A Delete and a Create/Update of the same id in one round is not produced by
//! Exchange. If it happens, the Delete wins.

use super::store::{Collection, CollectionStore};
use crate::error::{Error, Result};
use crate::folder::Folder;
use crate::id::Identifier;
use crate::request::{ChangeKind, ChangeListEntry};
use bitflags::bitflags;
use std::collections::{HashMap, HashSet};
use tracing::{debug, instrument};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    struct DescriptorFlags: u8 {
        const REMOTE_CREATED = 1 << 0;
        const REMOTE_UPDATED = 1 << 1;
        const REMOTE_DELETED = 1 << 2;
        const PROCESSED = 1 << 3;
    }
}

impl DescriptorFlags {
    fn remote(self) -> Self {
        self & (Self::REMOTE_CREATED | Self::REMOTE_UPDATED | Self::REMOTE_DELETED)
    }
}

/// Working state for one remote id.
#[derive(Debug, Default)]
struct Descriptor {
    /// Local state before this round.
    original: Option<Collection>,
    /// Local state being built.
    local: Option<Collection>,
    remote: Option<Folder>,
    /// Remote parent reported by the change.
    remote_parent: Option<String>,
    flags: DescriptorFlags,
    top_level: bool,
    /// `(from, to)` of a move waiting for its target.
    pending_move: Option<(Option<String>, String)>,
}

impl Descriptor {
    fn is_processed(&self) -> bool {
        self.flags.contains(DescriptorFlags::PROCESSED)
    }

    /// Parent used for tree placement: the remote parent when the change
    /// carries one, otherwise the local parent.
    fn parent(&self) -> Option<&str> {
        self.remote_parent.as_deref().or_else(|| {
            self.local
                .as_ref()
                .and_then(|c| c.parent_remote_id.as_deref())
        })
    }
}

/// One created or updated collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionChange {
    /// Local state before the round; `None` for a new collection.
    pub before: Option<Collection>,
    /// Local state after the round.
    pub after: Collection,
}

impl CollectionChange {
    /// `true` for a collection new to the store.
    #[must_use]
    pub fn is_create(&self) -> bool {
        self.before.is_none()
    }

    /// `true` when applying the change leaves the collection as it was.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.before.as_ref() == Some(&self.after)
    }
}

/// A move issued to the store by a successful round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionMove {
    /// Moved collection.
    pub remote_id: String,
    /// Previous parent.
    pub from: Option<String>,
    /// New parent.
    pub to: String,
}

/// Outcome of a successful round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileResult {
    /// Created and updated collections, parents before children.
    pub changed: Vec<CollectionChange>,
    /// Deleted collections that existed locally.
    pub deleted: Vec<Collection>,
    /// Moves issued to the store.
    pub moves: Vec<CollectionMove>,
    /// Whether anything had to wait for the reparent pass.
    pub reparent_pass: bool,
}

impl ReconcileResult {
    /// `true` when committing the round would change nothing locally.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.deleted.is_empty()
            && self.moves.is_empty()
            && self.changed.iter().all(CollectionChange::is_noop)
    }

    /// The change for `remote_id`, if any.
    #[must_use]
    pub fn change(&self, remote_id: &str) -> Option<&CollectionChange> {
        self.changed.iter().find(|c| c.after.remote_id == remote_id)
    }
}

/// Runs one reconciliation round with default options.
///
/// # Errors
///
/// See [`Reconciler::run`].
pub async fn reconcile(
    changes: &[ChangeListEntry],
    store: &dyn CollectionStore,
) -> Result<ReconcileResult> {
    Reconciler::new(store).run(changes).await
}

/// One reconciliation round.
pub struct Reconciler<'a> {
    store: &'a dyn CollectionStore,
    allow_moves_into_new: bool,
    descriptors: HashMap<String, Descriptor>,
    /// Ids in first-seen order.
    order: Vec<String>,
    children: HashMap<String, Vec<String>>,
    /// Created/updated ids in the order they were processed.
    emitted: Vec<String>,
    moves: Vec<CollectionMove>,
    deferred: bool,
}

impl std::fmt::Debug for Reconciler<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("allow_moves_into_new", &self.allow_moves_into_new)
            .field("descriptors", &self.descriptors.len())
            .finish_non_exhaustive()
    }
}

impl<'a> Reconciler<'a> {
    /// Creates a round over `store`.
    #[must_use]
    pub fn new(store: &'a dyn CollectionStore) -> Self {
        Self {
            store,
            allow_moves_into_new: false,
            descriptors: HashMap::new(),
            order: Vec::new(),
            children: HashMap::new(),
            emitted: Vec::new(),
            moves: Vec::new(),
            deferred: false,
        }
    }

    /// Defers moves into folders created in the same round instead of failing
    /// with [`Error::MoveIntoNewFolder`]. Used by full resyncs, where every
    /// folder arrives as an update.
    #[must_use]
    pub fn allow_moves_into_new(mut self, allow: bool) -> Self {
        self.allow_moves_into_new = allow;
        self
    }

    /// Reconciles `changes` against the store.
    ///
    /// # Errors
    ///
    /// - [`Error::MoveIntoNewFolder`] when an update moves a folder under a
    ///   folder created in this round (unless allowed)
    /// - [`Error::OrphanedFolders`] when some changes cannot be placed
    /// - any store error, which aborts the round
    #[instrument(name = "Reconciler::run", skip_all, fields(changes = changes.len()))]
    pub async fn run(mut self, changes: &[ChangeListEntry]) -> Result<ReconcileResult> {
        let store = self.store;
        let ancestors = self.collect(changes)?;
        self.fetch(ancestors).await?;
        self.check_moves_into_new()?;
        self.reconcile();
        if self.deferred {
            debug!("Running reparent pass");
            self.reparent();
        }
        let result = self.emit()?;
        apply_moves(store, &result).await?;
        Ok(result)
    }

    fn descriptor(&mut self, id: &str) -> &mut Descriptor {
        if !self.descriptors.contains_key(id) {
            self.order.push(id.to_string());
        }
        self.descriptors.entry(id.to_string()).or_default()
    }

    fn collect(&mut self, changes: &[ChangeListEntry]) -> Result<Vec<String>> {
        for change in changes {
            let id = change
                .id
                .id()
                .ok_or_else(|| Error::malformed(format!("change for {} has no server id", change.id)))?
                .to_string();
            let descriptor = self.descriptor(&id);

            match change.kind {
                ChangeKind::Delete => {
                    descriptor.flags.remove(
                        DescriptorFlags::REMOTE_CREATED | DescriptorFlags::REMOTE_UPDATED,
                    );
                    descriptor.flags.insert(DescriptorFlags::REMOTE_DELETED);
                    descriptor.remote = None;
                    descriptor.remote_parent = None;
                }
                ChangeKind::Create | ChangeKind::Update => {
                    if descriptor.flags.contains(DescriptorFlags::REMOTE_DELETED) {
                        debug!(id = %id, "Ignoring change for a folder deleted in the same round");
                        continue;
                    }
                    let folder = change.folder.clone().ok_or_else(|| {
                        Error::malformed(format!("{:?} for {id} without a folder", change.kind))
                    })?;
                    if folder.id().and_then(Identifier::id).is_none() {
                        return Err(Error::malformed(format!("folder for {id} has no server id")));
                    }
                    descriptor.flags.insert(if change.kind == ChangeKind::Create {
                        DescriptorFlags::REMOTE_CREATED
                    } else {
                        DescriptorFlags::REMOTE_UPDATED
                    });
                    descriptor.remote_parent = folder
                        .parent_id()
                        .and_then(Identifier::id)
                        .map(str::to_string);
                    descriptor.remote = Some(folder);
                }
            }
        }

        let mut ancestors: Vec<String> = Vec::new();
        let mut seen = HashSet::new();
        for descriptor in self.descriptors.values() {
            if let Some(parent) = &descriptor.remote_parent {
                if !self.descriptors.contains_key(parent) && seen.insert(parent.clone()) {
                    ancestors.push(parent.clone());
                }
            }
        }
        Ok(ancestors)
    }

    async fn fetch(&mut self, ancestors: Vec<String>) -> Result<()> {
        let mut ids = ancestors;
        ids.extend(self.order.iter().filter(|id| {
            self.descriptors[id.as_str()]
                .flags
                .intersects(DescriptorFlags::REMOTE_UPDATED | DescriptorFlags::REMOTE_DELETED)
        }).cloned());

        if !ids.is_empty() {
            let fetched = self.store.fetch_with_ancestors(&ids).await?;
            debug!(requested = ids.len(), found = fetched.len(), "Fetched local collections");

            // Stable order for descriptors created from the fetch.
            let mut fetched: Vec<(String, Collection)> = fetched.into_iter().collect();
            fetched.sort_by(|a, b| a.0.cmp(&b.0));
            for (id, collection) in fetched {
                let descriptor = self.descriptor(&id);
                descriptor.original = Some(collection.clone());
                descriptor.local = Some(collection);
            }
        }

        for descriptor in self.descriptors.values_mut() {
            if descriptor.flags.remote().is_empty() {
                descriptor.flags.insert(DescriptorFlags::PROCESSED);
            }
            // An update for a folder we never saw is a create.
            if descriptor.flags.contains(DescriptorFlags::REMOTE_UPDATED) && descriptor.local.is_none() {
                descriptor.flags.insert(DescriptorFlags::REMOTE_CREATED);
            }
        }
        Ok(())
    }

    /// Fails with [`Error::MoveIntoNewFolder`] before anything is planned when
    /// an existing folder moves under one created in this round.
    fn check_moves_into_new(&self) -> Result<()> {
        if self.allow_moves_into_new {
            return Ok(());
        }
        for id in &self.order {
            let descriptor = &self.descriptors[id.as_str()];
            if !descriptor.flags.contains(DescriptorFlags::REMOTE_UPDATED)
                || descriptor.flags.contains(DescriptorFlags::REMOTE_CREATED)
            {
                continue;
            }
            let (Some(local), Some(target)) = (&descriptor.local, &descriptor.remote_parent) else {
                continue;
            };
            if local.parent_remote_id.as_deref() == Some(target.as_str()) {
                continue;
            }
            if self
                .flags_of(target)
                .is_some_and(|f| f.contains(DescriptorFlags::REMOTE_CREATED))
            {
                return Err(Error::MoveIntoNewFolder {
                    folder: id.clone(),
                    parent: target.clone(),
                });
            }
        }
        Ok(())
    }

    fn flags_of(&self, id: &str) -> Option<DescriptorFlags> {
        self.descriptors.get(id).map(|d| d.flags)
    }

    fn mark_processed(&mut self, id: &str) {
        if let Some(descriptor) = self.descriptors.get_mut(id) {
            descriptor.flags.insert(DescriptorFlags::PROCESSED);
            if descriptor
                .flags
                .intersects(DescriptorFlags::REMOTE_CREATED | DescriptorFlags::REMOTE_UPDATED)
            {
                self.emitted.push(id.to_string());
            }
        }
    }

    fn plan_move(&mut self, id: &str, from: Option<String>, to: String) {
        let Some(local) = self.descriptors.get_mut(id).and_then(|d| d.local.as_mut()) else {
            return;
        };
        local.parent_remote_id = Some(to.clone());
        debug!(id, ?from, to = %to, "Planned move");
        self.moves.push(CollectionMove {
            remote_id: id.to_string(),
            from,
            to,
        });
    }

    fn reconcile(&mut self) {
        let ids = self.order.clone();

        for id in &ids {
            let parent = self.descriptors[id.as_str()].parent().map(str::to_string);
            let top_level = parent
                .as_deref()
                .map_or(true, |p| !self.descriptors.contains_key(p));
            if let Some(parent) = &parent {
                self.children.entry(parent.clone()).or_default().push(id.clone());
            }
            if let Some(descriptor) = self.descriptors.get_mut(id.as_str()) {
                descriptor.top_level = top_level;
            }

            let flags = self.descriptors[id.as_str()].flags;
            if flags.contains(DescriptorFlags::PROCESSED) {
                continue;
            }
            if flags.contains(DescriptorFlags::REMOTE_DELETED) {
                self.mark_processed(id);
                continue;
            }

            if flags.contains(DescriptorFlags::REMOTE_CREATED) {
                self.reconcile_create(id, parent);
            } else {
                self.reconcile_update(id);
            }
        }
    }

    // Ids and folders were validated in `collect`, so the lookups below only
    // miss for entries that can never be placed; those surface as orphans.
    fn reconcile_create(&mut self, id: &str, parent: Option<String>) {
        let Some(descriptor) = self.descriptors.get_mut(id) else {
            return;
        };
        let Some(mut collection) = descriptor.remote.as_ref().and_then(Collection::from_folder) else {
            return;
        };
        if let Some(original) = &descriptor.original {
            collection.parent_remote_id.clone_from(&original.parent_remote_id);
        }
        descriptor.local = Some(collection);

        match parent {
            None => self.mark_processed(id),
            Some(parent) if self.flags_of(&parent).is_some_and(|f| f.contains(DescriptorFlags::PROCESSED)) => {
                self.place(id, &parent);
                self.mark_processed(id);
            }
            Some(_) => self.deferred = true,
        }
    }

    fn reconcile_update(&mut self, id: &str) {
        let Some(descriptor) = self.descriptors.get_mut(id) else {
            return;
        };
        let (Some(local), Some(remote)) = (descriptor.local.as_mut(), descriptor.remote.as_ref()) else {
            return;
        };
        local.apply(remote);
        let current = local.parent_remote_id.clone();

        let target = match descriptor.remote_parent.clone() {
            Some(target) if current.as_deref() != Some(target.as_str()) => target,
            _ => {
                self.mark_processed(id);
                return;
            }
        };

        if self
            .flags_of(&target)
            .is_some_and(|f| f.contains(DescriptorFlags::PROCESSED))
        {
            self.plan_move(id, current, target);
            self.mark_processed(id);
        } else {
            if let Some(descriptor) = self.descriptors.get_mut(id) {
                descriptor.pending_move = Some((current, target));
            }
            self.deferred = true;
        }
    }

    /// Sets the parent of a new collection.
    fn place(&mut self, id: &str, parent: &str) {
        if let Some(local) = self.descriptors.get_mut(id).and_then(|d| d.local.as_mut()) {
            local.parent_remote_id = Some(parent.to_string());
        }
    }

    fn reparent(&mut self) {
        let roots: Vec<String> = self
            .order
            .iter()
            .filter(|id| {
                let d = &self.descriptors[id.as_str()];
                d.top_level && d.is_processed()
            })
            .cloned()
            .collect();

        let mut visited: HashSet<String> = HashSet::new();
        let mut stack: Vec<String> = roots.into_iter().rev().collect();

        while let Some(node) = stack.pop() {
            if !visited.insert(node.clone()) {
                continue;
            }
            let children = self.children.get(&node).cloned().unwrap_or_default();
            for child in &children {
                let processed = self.descriptors[child.as_str()].is_processed();
                if !processed {
                    self.resolve_deferred(child, &node);
                }
            }
            for child in children.iter().rev() {
                if self.descriptors[child.as_str()].is_processed() {
                    stack.push(child.clone());
                }
            }
        }
    }

    fn resolve_deferred(&mut self, id: &str, parent: &str) {
        let pending = self
            .descriptors
            .get_mut(id)
            .and_then(|d| d.pending_move.take());

        match pending {
            Some((from, to)) => self.plan_move(id, from, to),
            None => self.place(id, parent),
        }
        self.mark_processed(id);
    }

    fn emit(self) -> Result<ReconcileResult> {
        let mut orphans: Vec<String> = self
            .order
            .iter()
            .filter(|id| !self.descriptors[id.as_str()].is_processed())
            .cloned()
            .collect();
        if !orphans.is_empty() {
            orphans.sort();
            return Err(Error::OrphanedFolders { ids: orphans });
        }

        let mut descriptors = self.descriptors;
        let deleted = self
            .order
            .iter()
            .filter_map(|id| {
                let d = &descriptors[id.as_str()];
                if d.flags.contains(DescriptorFlags::REMOTE_DELETED) {
                    d.original.clone()
                } else {
                    None
                }
            })
            .collect();

        let changed = self
            .emitted
            .iter()
            .filter_map(|id| {
                let d = descriptors.remove(id.as_str())?;
                Some(CollectionChange {
                    before: d.original,
                    after: d.local?,
                })
            })
            .collect();

        Ok(ReconcileResult {
            changed,
            deleted,
            moves: self.moves,
            reparent_pass: self.deferred,
        })
    }
}

/// Issues the planned moves of a finished round to the store.
async fn apply_moves(store: &dyn CollectionStore, result: &ReconcileResult) -> Result<()> {
    for planned in &result.moves {
        let change = result.change(&planned.remote_id).ok_or_else(|| {
            Error::malformed(format!("move of {} has no matching change", planned.remote_id))
        })?;
        let collection = change.before.as_ref().unwrap_or(&change.after);
        store
            .move_collection(collection, planned.from.as_deref(), &planned.to)
            .await?;
        debug!(id = %planned.remote_id, to = %planned.to, "Moved collection");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::folder::FolderKind;
    use crate::sync::store::{MemoryStore, RecordedMove};

    fn folder(id: &str, parent: &str, name: &str) -> Folder {
        let mut f = Folder::new(FolderKind::Generic);
        f.set_id(Identifier::real(id, Some("CK")));
        f.set_parent_id(Identifier::real(parent, None));
        f.set_display_name(name);
        f
    }

    fn root_store() -> MemoryStore {
        MemoryStore::with_collections([Collection::new("ROOT").with_name("Root")])
    }

    #[tokio::test]
    async fn test_create_under_known_parent() {
        let store = root_store();
        let changes = [ChangeListEntry::create(folder("F1", "ROOT", "One"))];

        let result = reconcile(&changes, &store).await.unwrap();
        assert!(!result.reparent_pass);
        assert_eq!(result.changed.len(), 1);
        let change = &result.changed[0];
        assert!(change.is_create());
        assert_eq!(change.after.remote_id, "F1");
        assert_eq!(change.after.parent_remote_id.as_deref(), Some("ROOT"));
        assert_eq!(store.fetches().await, 1);
    }

    #[tokio::test]
    async fn test_child_before_parent_is_reparented() {
        let store = root_store();
        let changes = [
            ChangeListEntry::create(folder("F1", "F2", "Child")),
            ChangeListEntry::create(folder("F2", "ROOT", "Parent")),
        ];

        let result = reconcile(&changes, &store).await.unwrap();
        assert!(result.reparent_pass);
        let ids: Vec<_> = result.changed.iter().map(|c| c.after.remote_id.as_str()).collect();
        assert_eq!(ids, ["F2", "F1"]);
        assert_eq!(
            result.change("F1").unwrap().after.parent_remote_id.as_deref(),
            Some("F2")
        );
    }

    #[tokio::test]
    async fn test_reference_ancestors_not_emitted() {
        let store = root_store();
        let changes = [ChangeListEntry::create(folder("F1", "ROOT", "One"))];
        let result = reconcile(&changes, &store).await.unwrap();
        assert!(result.change("ROOT").is_none());
        assert!(result.deleted.is_empty());
    }

    #[tokio::test]
    async fn test_delete_wins_over_update() {
        let store = MemoryStore::with_collections([
            Collection::new("ROOT"),
            Collection::new("F1").with_parent("ROOT"),
        ]);
        let changes = [
            ChangeListEntry::update(folder("F1", "ROOT", "Renamed")),
            ChangeListEntry::delete(Identifier::real("F1", None)),
            ChangeListEntry::update(folder("F1", "ROOT", "Again")),
        ];
        let result = reconcile(&changes, &store).await.unwrap();
        assert!(result.changed.is_empty());
        assert_eq!(result.deleted.len(), 1);
        assert_eq!(result.deleted[0].remote_id, "F1");
    }

    #[tokio::test]
    async fn test_delete_of_unknown_folder_emits_nothing() {
        let store = root_store();
        let changes = [ChangeListEntry::delete(Identifier::real("GONE", None))];
        let result = reconcile(&changes, &store).await.unwrap();
        assert!(result.is_noop());
    }

    #[tokio::test]
    async fn test_update_without_local_is_create() {
        let store = root_store();
        let changes = [ChangeListEntry::update(folder("F9", "ROOT", "Late"))];
        let result = reconcile(&changes, &store).await.unwrap();
        assert!(result.changed[0].is_create());
        assert_eq!(result.changed[0].after.parent_remote_id.as_deref(), Some("ROOT"));
    }

    #[tokio::test]
    async fn test_unknown_parent_is_orphan() {
        let store = root_store();
        let changes = [ChangeListEntry::create(folder("F1", "NOWHERE", "Lost"))];
        match reconcile(&changes, &store).await {
            Err(Error::OrphanedFolders { ids }) => assert_eq!(ids, ["F1"]),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(store.commits().await, 0);
    }

    #[tokio::test]
    async fn test_move_into_new_folder_fails_round() {
        let store = MemoryStore::with_collections([
            Collection::new("ROOT"),
            Collection::new("F3").with_parent("ROOT"),
        ]);
        let changes = [
            ChangeListEntry::create(folder("NEW", "ROOT", "New")),
            ChangeListEntry::update(folder("F3", "NEW", "Moved")),
        ];
        assert!(matches!(
            reconcile(&changes, &store).await,
            Err(Error::MoveIntoNewFolder { ref folder, ref parent }) if folder == "F3" && parent == "NEW"
        ));
        assert!(store.moves().await.is_empty());
    }

    fn tree_store() -> MemoryStore {
        MemoryStore::with_collections([
            Collection::new("ROOT"),
            Collection::new("A").with_parent("ROOT"),
            Collection::new("B").with_parent("ROOT"),
            Collection::new("C").with_parent("ROOT"),
        ])
    }

    #[tokio::test]
    async fn test_move_into_new_folder_leaves_earlier_moves_unissued() {
        let store = tree_store();
        let changes = [
            ChangeListEntry::update(folder("A", "B", "A")),
            ChangeListEntry::update(folder("C", "NEW", "C")),
            ChangeListEntry::create(folder("NEW", "ROOT", "New")),
        ];
        assert!(matches!(
            reconcile(&changes, &store).await,
            Err(Error::MoveIntoNewFolder { ref folder, ref parent }) if folder == "C" && parent == "NEW"
        ));
        assert!(store.moves().await.is_empty());
        assert_eq!(
            store.get("A").await.unwrap().parent_remote_id.as_deref(),
            Some("ROOT")
        );
    }

    #[tokio::test]
    async fn test_orphan_leaves_earlier_moves_unissued() {
        let store = tree_store();
        let changes = [
            ChangeListEntry::update(folder("A", "B", "A")),
            ChangeListEntry::create(folder("F1", "NOWHERE", "Lost")),
        ];
        match reconcile(&changes, &store).await {
            Err(Error::OrphanedFolders { ids }) => assert_eq!(ids, ["F1"]),
            other => panic!("unexpected {other:?}"),
        }
        assert!(store.moves().await.is_empty());
        assert_eq!(
            store.get("A").await.unwrap().parent_remote_id.as_deref(),
            Some("ROOT")
        );
    }

    #[tokio::test]
    async fn test_successful_round_issues_planned_moves() {
        let store = tree_store();
        let changes = [ChangeListEntry::update(folder("A", "B", "A"))];
        let result = reconcile(&changes, &store).await.unwrap();
        assert_eq!(result.moves.len(), 1);
        assert_eq!(
            store.moves().await,
            [RecordedMove {
                remote_id: "A".into(),
                from: Some("ROOT".into()),
                to: "B".into(),
            }]
        );
        assert_eq!(
            result.change("A").unwrap().after.parent_remote_id.as_deref(),
            Some("B")
        );
    }

    #[tokio::test]
    async fn test_move_into_new_folder_allowed() {
        let store = MemoryStore::with_collections([
            Collection::new("ROOT"),
            Collection::new("F3").with_parent("ROOT"),
        ]);
        let changes = [
            ChangeListEntry::update(folder("F3", "NEW", "Moved")),
            ChangeListEntry::update(folder("NEW", "ROOT", "New")),
        ];
        let result = Reconciler::new(&store)
            .allow_moves_into_new(true)
            .run(&changes)
            .await
            .unwrap();
        assert!(result.reparent_pass);
        assert_eq!(result.moves.len(), 1);
        assert_eq!(result.moves[0].to, "NEW");
        let ids: Vec<_> = result.changed.iter().map(|c| c.after.remote_id.as_str()).collect();
        assert_eq!(ids, ["NEW", "F3"]);
    }
}
