//! Frame lifecycle observers.

use crate::navigation::failure::LoadError;
use crate::protocol::CommitNotification;
use crate::types::FrameId;
use url::Url;

/// Receives lifecycle notifications for every frame in a session.
///
/// Observers are notified synchronously and cannot re-enter the session.
pub trait FrameObserver {
    fn did_start_provisional_load(&mut self, _frame: FrameId, _url: &Url) {}

    fn did_commit_provisional_load(&mut self, _frame: FrameId, _commit: &CommitNotification) {}

    fn did_fail_provisional_load(&mut self, _frame: FrameId, _error: &LoadError) {}

    /// A provisional navigation was abandoned by an explicit stop.
    fn on_stop(&mut self, _frame: FrameId) {}

    fn frame_detached(&mut self, _frame: FrameId) {}
}
