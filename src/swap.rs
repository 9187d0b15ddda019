//! Swap Controller
//!
//! Exchanges a frame's local and remote representations when a navigation crosses a
//! process boundary. The tree position and the frame identifier's slot are preserved:
//! swapping in, a provisional local frame takes over its placeholder's slot on first
//! commit; swapping out, a fresh placeholder takes over the local frame's slot.

use crate::engine::EngineScope;
use crate::error::{InvariantViolation, SessionError};
use crate::frame::{ReplicatedState, Representation};
use crate::protocol::{HostMessage, SwapOutParams};
use crate::session::{DetachInitiator, DetachKind, NavigationSession, SessionCore};
use crate::types::FrameId;
use tracing::{debug, info, warn};

/// Structural frame exchanges on a session's registry.
pub(crate) struct SwapController<'a> {
    core: &'a mut SessionCore,
}

impl<'a> SwapController<'a> {
    pub(crate) fn new(core: &'a mut SessionCore) -> Self {
        Self { core }
    }

    /// Replace `frame`'s placeholder with `frame` itself. Every precondition is checked
    /// before anything is mutated. The placeholder's subtree is torn down, not inherited.
    pub(crate) fn swap_in(&mut self, frame: FrameId) -> Result<(), InvariantViolation> {
        let local = self
            .core
            .registry
            .local(frame)
            .ok_or(InvariantViolation::NotALocalFrame(frame))?;
        let placeholder_id = local
            .placeholder
            .ok_or(InvariantViolation::MissingPlaceholder(frame))?;
        if local.in_frame_tree {
            return Err(InvariantViolation::FrameAlreadyInTree(frame));
        }
        let is_main_frame = local.is_main_frame;
        if self.core.registry.placeholder(placeholder_id).is_none() {
            return Err(InvariantViolation::MissingPlaceholder(placeholder_id));
        }
        if is_main_frame {
            if let Some(existing) = self.core.root {
                if existing != placeholder_id && self.core.registry.local(existing).is_some() {
                    return Err(InvariantViolation::MainFrameAlreadySet {
                        existing,
                        incoming: frame,
                    });
                }
            }
        }

        self.core.detach_children(placeholder_id)?;
        self.core.registry.replace_in_tree(placeholder_id, frame);
        self.core.registry.unregister(placeholder_id);
        if let Some(local) = self.core.registry.local_mut(frame) {
            local.placeholder = None;
            local.in_frame_tree = true;
        }
        if is_main_frame {
            self.core.root = Some(frame);
            self.core.suspended_for_swap = false;
        }
        info!(frame_id = %frame, placeholder_id = %placeholder_id, "Swapped in");
        Ok(())
    }
}

impl NavigationSession {
    /// Replace a local frame with a remote placeholder because its next document is
    /// rendered elsewhere.
    ///
    /// The frame must be attached and not itself waiting to swap in. Its children are
    /// torn down before the exchange; the placeholder starts with an empty subtree.
    pub fn swap_out(&mut self, frame: FrameId, params: SwapOutParams) -> Result<(), SessionError> {
        self.ensure_usable()?;
        let Some(local) = self.core.registry.local(frame) else {
            debug!(frame_id = %frame, "Swap out for unknown frame");
            return Ok(());
        };
        if local.placeholder.is_some() || !local.in_frame_tree {
            return Err(self.core.fail(InvariantViolation::FrameMidSwap(frame)));
        }
        let is_main_frame = local.is_main_frame;
        let current_entry = local.history.current_entry().cloned();
        let placeholder_id = params.placeholder_id;

        self.core
            .registry
            .register(placeholder_id, Representation::placeholder(ReplicatedState::default()))
            .map_err(|v| self.core.fail(v))?;

        if let Some(entry) = current_entry {
            self.core.send(frame, HostMessage::UpdateState { entry });
        }

        let guard = self.core.registry.liveness(frame);
        {
            let mut scope = EngineScope::new(&mut self.core);
            self.engine.run_before_detach_hook(frame, &mut scope);
        }
        self.core.check()?;
        self.core
            .detach_children(frame)
            .map_err(|v| self.core.fail(v))?;

        if !guard.map(|g| g.is_alive()).unwrap_or(false) {
            warn!(frame_id = %frame, placeholder_id = %placeholder_id, "Frame detached during swap out, discarding placeholder");
            self.core.registry.unregister(placeholder_id);
            return Ok(());
        }
        if is_main_frame {
            self.core.suspended_for_swap = true;
        }

        self.core.registry.replace_in_tree(frame, placeholder_id);
        self.core
            .detach(frame, DetachKind::Swap, DetachInitiator::Coordinator)
            .map_err(|v| self.core.fail(v))?;
        if is_main_frame {
            self.core.root = Some(placeholder_id);
        }

        if let Some(remote) = self.core.registry.placeholder_mut(placeholder_id) {
            if params.is_loading {
                remote.is_loading = true;
            }
            remote.replicated = params.replicated;
        }
        self.core.send(frame, HostMessage::SwapOutAck);
        info!(frame_id = %frame, placeholder_id = %placeholder_id, "Swapped out");
        Ok(())
    }
}
