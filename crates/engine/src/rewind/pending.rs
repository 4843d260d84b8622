use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::snapshot::{GameStateId, ObjectState, PrefabCatalog, SnapshotError, TypeCatalog};
use crate::streaming::SceneStreaming;
use crate::world::{ObjectId, SceneId, World};

/// Work queued until every pending entity creation has completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredAction {
    RefreshRegistry,
}

#[derive(Debug, Clone)]
struct CompletionHandler {
    state: GameStateId,
    snapshot: ObjectState,
}

#[derive(Debug, Clone)]
struct PendingCreation {
    scene: SceneId,
    handlers: Vec<CompletionHandler>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PumpReport {
    pub created: Vec<ObjectId>,
    pub restored: usize,
    pub deferred: Vec<DeferredAction>,
}

/// Entities a load wanted to restore but could not find.
///
/// There is one creation per entity no matter how many game states ask for
/// it. Each state keeps at most one completion handler per entity: asking
/// again moves its handler to the back. Handlers run in registration order
/// once the entity exists, so the most recent request wins.
#[derive(Debug, Default)]
pub struct PendingCreations {
    entries: BTreeMap<ObjectId, PendingCreation>,
    after_all_created: Vec<DeferredAction>,
    creations: u64,
}

impl PendingCreations {
    /// Registers `state`'s handler for the entity in `snapshot`. Returns
    /// `true` when this is the first request for that entity.
    pub fn request(&mut self, state: GameStateId, snapshot: &ObjectState) -> bool {
        let mut first = false;
        let entry = self
            .entries
            .entry(snapshot.object_id)
            .or_insert_with(|| {
                first = true;
                PendingCreation {
                    scene: snapshot.scene,
                    handlers: Vec::new(),
                }
            });
        entry.handlers.retain(|handler| handler.state != state);
        entry.handlers.push(CompletionHandler {
            state,
            snapshot: snapshot.clone(),
        });
        first
    }

    pub fn cancel(&mut self, id: ObjectId) -> bool {
        self.entries.remove(&id).is_some()
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.entries.keys().copied()
    }

    /// States with a handler for `id`, in the order they will run.
    pub fn handler_states(&self, id: ObjectId) -> Vec<GameStateId> {
        self.entries
            .get(&id)
            .map(|entry| entry.handlers.iter().map(|handler| handler.state).collect())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn has_deferred(&self) -> bool {
        !self.after_all_created.is_empty()
    }

    /// Total entities created since construction.
    pub fn creations(&self) -> u64 {
        self.creations
    }

    /// Queues `action` to run once nothing is pending. Queuing the same
    /// action twice runs it once.
    pub fn when_all_created(&mut self, action: DeferredAction) {
        if !self.after_all_created.contains(&action) {
            self.after_all_created.push(action);
        }
    }

    /// Completes every request whose scene is loaded: creates the entity if
    /// it is missing, then runs its handlers in order.
    pub fn pump(
        &mut self,
        world: &mut World,
        streamer: &dyn SceneStreaming,
        catalog: &TypeCatalog,
        prefabs: &PrefabCatalog,
    ) -> Result<PumpReport, SnapshotError> {
        let mut report = PumpReport::default();
        let ready: Vec<ObjectId> = self
            .entries
            .iter()
            .filter(|(_, entry)| streamer.is_loaded(entry.scene))
            .map(|(id, _)| *id)
            .collect();

        for id in ready {
            let Some(entry) = self.entries.remove(&id) else {
                continue;
            };
            if !world.contains(id) {
                let spawn = entry
                    .handlers
                    .last()
                    .and_then(|handler| handler.snapshot.spawn.clone());
                let Some(spawn) = spawn else {
                    warn!(object_id = id.0, "pending_creation_dropped");
                    continue;
                };
                let mut entity = prefabs.instantiate(&spawn.prefab, &spawn.spawn_tag, id, entry.scene)?;
                if let Some(handler) = entry.handlers.last() {
                    entity.name = handler.snapshot.name.clone();
                }
                world.insert(entity);
                self.creations = self.creations.saturating_add(1);
                report.created.push(id);
                debug!(object_id = id.0, prefab = %spawn.prefab, "entity_created");
            }
            let Some(entity) = world.get_mut(id) else {
                continue;
            };
            for handler in &entry.handlers {
                handler.snapshot.restore(entity, catalog)?;
                report.restored += 1;
            }
        }

        if self.entries.is_empty() {
            report.deferred = std::mem::take(&mut self.after_all_created);
        }
        Ok(report)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.after_all_created.clear();
    }
}
