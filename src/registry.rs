//! Frame registry: arena of frame slots addressed by identifier and by tree handle.
//!
//! The registry owns every [`FrameEntry`] for one embedding session. Parent/child edges
//! are stored as identifiers and resolved through the registry, so no entry ever holds a
//! reference to another.

use crate::error::InvariantViolation;
use crate::frame::{LocalFrame, RemotePlaceholder, Representation};
use crate::types::{FrameId, TreeHandle};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::debug;

/// One registered frame slot occupant.
#[derive(Debug)]
pub struct FrameEntry {
    id: FrameId,
    handle: TreeHandle,
    parent: Option<FrameId>,
    children: Vec<FrameId>,
    representation: Representation,
    alive: Arc<()>,
}

impl FrameEntry {
    pub fn id(&self) -> FrameId {
        self.id
    }

    pub fn handle(&self) -> TreeHandle {
        self.handle
    }

    pub fn parent(&self) -> Option<FrameId> {
        self.parent
    }

    pub fn children(&self) -> &[FrameId] {
        &self.children
    }

    pub fn representation(&self) -> &Representation {
        &self.representation
    }

    pub fn as_local(&self) -> Option<&LocalFrame> {
        match &self.representation {
            Representation::Local(frame) => Some(&**frame),
            Representation::Remote(_) => None,
        }
    }

    pub fn as_placeholder(&self) -> Option<&RemotePlaceholder> {
        match &self.representation {
            Representation::Remote(placeholder) => Some(placeholder),
            Representation::Local(_) => None,
        }
    }
}

/// Capability reporting whether a frame captured before a re-entrant callout still
/// exists afterwards.
///
/// A frame that was detached and re-registered under the same identifier counts as
/// gone: the token belongs to the registration, not the identifier.
#[derive(Debug, Clone)]
pub struct Liveness {
    frame: FrameId,
    token: Weak<()>,
}

impl Liveness {
    pub fn frame(&self) -> FrameId {
        self.frame
    }

    pub fn is_alive(&self) -> bool {
        self.token.strong_count() > 0
    }
}

/// Frame registry for one embedding session
#[derive(Debug, Default)]
pub struct FrameRegistry {
    entries: HashMap<FrameId, FrameEntry>,
    handles: HashMap<TreeHandle, FrameId>,
    next_handle: u64,
}

impl FrameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a frame slot occupant. The entry starts detached from the tree; use
    /// [`FrameRegistry::insert_child`] to link it under a parent.
    pub fn register(
        &mut self,
        id: FrameId,
        representation: Representation,
    ) -> Result<TreeHandle, InvariantViolation> {
        if self.entries.contains_key(&id) {
            return Err(InvariantViolation::DuplicateFrameId(id));
        }
        self.next_handle += 1;
        let handle = TreeHandle(self.next_handle);
        debug!(frame_id = %id, handle = handle.as_u64(), local = representation.is_local(), "Registered frame");
        self.handles.insert(handle, id);
        self.entries.insert(
            id,
            FrameEntry {
                id,
                handle,
                parent: None,
                children: Vec::new(),
                representation,
                alive: Arc::new(()),
            },
        );
        Ok(handle)
    }

    /// Remove an entry from both tables. Tree edges pointing at it are left to the
    /// caller. Returns `None` if the identifier is not registered.
    pub fn unregister(&mut self, id: FrameId) -> Option<FrameEntry> {
        let entry = self.entries.remove(&id)?;
        self.handles.remove(&entry.handle);
        debug!(frame_id = %id, "Unregistered frame");
        Some(entry)
    }

    pub fn get(&self, id: FrameId) -> Option<&FrameEntry> {
        self.entries.get(&id)
    }

    pub fn contains(&self, id: FrameId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn local(&self, id: FrameId) -> Option<&LocalFrame> {
        self.entries.get(&id).and_then(FrameEntry::as_local)
    }

    pub fn local_mut(&mut self, id: FrameId) -> Option<&mut LocalFrame> {
        match self.entries.get_mut(&id).map(|e| &mut e.representation) {
            Some(Representation::Local(frame)) => Some(&mut **frame),
            _ => None,
        }
    }

    pub fn placeholder(&self, id: FrameId) -> Option<&RemotePlaceholder> {
        self.entries.get(&id).and_then(FrameEntry::as_placeholder)
    }

    pub fn placeholder_mut(&mut self, id: FrameId) -> Option<&mut RemotePlaceholder> {
        match self.entries.get_mut(&id).map(|e| &mut e.representation) {
            Some(Representation::Remote(placeholder)) => Some(placeholder),
            _ => None,
        }
    }

    /// Resolve a tree handle to the identifier of its current occupant.
    pub fn lookup_handle(&self, handle: TreeHandle) -> Option<FrameId> {
        self.handles.get(&handle).copied()
    }

    pub fn entry_for_handle(&self, handle: TreeHandle) -> Option<&FrameEntry> {
        self.lookup_handle(handle).and_then(|id| self.entries.get(&id))
    }

    pub fn liveness(&self, id: FrameId) -> Option<Liveness> {
        self.entries.get(&id).map(|entry| Liveness {
            frame: id,
            token: Arc::downgrade(&entry.alive),
        })
    }

    pub fn parent_of(&self, id: FrameId) -> Option<FrameId> {
        self.entries.get(&id).and_then(|e| e.parent)
    }

    pub fn children_of(&self, id: FrameId) -> Vec<FrameId> {
        self.entries
            .get(&id)
            .map(|e| e.children.clone())
            .unwrap_or_default()
    }

    /// Link `child` under `parent`, directly after `previous_sibling` when given and
    /// present, otherwise as the first child.
    pub fn insert_child(
        &mut self,
        parent: FrameId,
        child: FrameId,
        previous_sibling: Option<FrameId>,
    ) -> bool {
        if !self.entries.contains_key(&child) {
            return false;
        }
        let Some(parent_entry) = self.entries.get_mut(&parent) else {
            return false;
        };
        let position = previous_sibling
            .and_then(|sibling| parent_entry.children.iter().position(|c| *c == sibling))
            .map(|index| index + 1)
            .unwrap_or(0);
        parent_entry.children.insert(position, child);
        if let Some(child_entry) = self.entries.get_mut(&child) {
            child_entry.parent = Some(parent);
        }
        true
    }

    /// Unlink `child` from its parent's child list.
    pub fn remove_from_parent(&mut self, child: FrameId) {
        let Some(parent) = self.parent_of(child) else {
            return;
        };
        if let Some(parent_entry) = self.entries.get_mut(&parent) {
            parent_entry.children.retain(|c| *c != child);
        }
        if let Some(child_entry) = self.entries.get_mut(&child) {
            child_entry.parent = None;
        }
    }

    /// Move `replacement` into `occupant`'s tree slot: same parent, same position, same
    /// children. `occupant` is left registered but unlinked.
    pub fn replace_in_tree(&mut self, occupant: FrameId, replacement: FrameId) -> bool {
        if occupant == replacement
            || !self.entries.contains_key(&occupant)
            || !self.entries.contains_key(&replacement)
        {
            return false;
        }

        let (parent, children) = match self.entries.get_mut(&occupant) {
            Some(entry) => (entry.parent.take(), std::mem::take(&mut entry.children)),
            None => return false,
        };

        if let Some(parent_id) = parent {
            if let Some(parent_entry) = self.entries.get_mut(&parent_id) {
                for slot in parent_entry.children.iter_mut() {
                    if *slot == occupant {
                        *slot = replacement;
                    }
                }
            }
        }
        for child in &children {
            if let Some(child_entry) = self.entries.get_mut(child) {
                child_entry.parent = Some(replacement);
            }
        }
        if let Some(entry) = self.entries.get_mut(&replacement) {
            entry.parent = parent;
            entry.children = children;
        }
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> Vec<FrameId> {
        let mut ids: Vec<FrameId> = self.entries.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Drop every entry. Outstanding [`Liveness`] tokens report the frames as gone.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.handles.clear();
    }
}
