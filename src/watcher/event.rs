//! Classification of raw notify events into reload-relevant kinds.
//!
//! Only a subset of filesystem notifications should count toward a reload:
//! creates, deletes, modifications, and moves. Administrative notifications
//! (a watch being torn down because its path disappeared) carry no reload
//! intent on their own.

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind};

/// What a single raw notification means to the watch engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Deleted,
    Modified,
    MovedIn,
    MovedOut,
    /// The OS tore down a subscription (watched path deleted or the backend
    /// requests a rescan). Not a reload trigger by itself.
    SubscriptionRemoved,
    /// Access events, metadata-only changes, and anything else outside the
    /// watch mask.
    Other,
}

impl ChangeKind {
    /// Classify a raw notify event.
    pub fn classify(event: &Event) -> Self {
        if event.need_rescan() {
            return Self::SubscriptionRemoved;
        }

        match event.kind {
            EventKind::Create(_) => Self::Created,
            EventKind::Remove(_) => Self::Deleted,
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => Self::MovedOut,
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Self::MovedIn,
            // A rename reported as a single event still changed the tree.
            EventKind::Modify(ModifyKind::Name(_)) => Self::Modified,
            EventKind::Modify(ModifyKind::Metadata(_)) => Self::Other,
            EventKind::Modify(_) => Self::Modified,
            EventKind::Access(_) | EventKind::Any | EventKind::Other => Self::Other,
        }
    }

    /// Whether this kind should count toward arming a reload.
    pub fn qualifies(self) -> bool {
        !matches!(self, Self::SubscriptionRemoved | Self::Other)
    }
}
