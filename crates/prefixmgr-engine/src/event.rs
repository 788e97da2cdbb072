//! Prefix update events from local sources.

use prefixmgr_core::{CoreError, PrefixEntry, SourceType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixEventKind {
    AddPrefixes,
    WithdrawPrefixes,
    WithdrawPrefixesByType,
    SyncPrefixesByType,
}

/// A batch of changes from one source type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixEvent {
    pub kind: PrefixEventKind,
    pub source_type: SourceType,
    pub entries: Vec<PrefixEntry>,
}

impl PrefixEvent {
    pub fn add(source_type: SourceType, entries: Vec<PrefixEntry>) -> Self {
        Self {
            kind: PrefixEventKind::AddPrefixes,
            source_type,
            entries,
        }
    }

    pub fn withdraw(source_type: SourceType, entries: Vec<PrefixEntry>) -> Self {
        Self {
            kind: PrefixEventKind::WithdrawPrefixes,
            source_type,
            entries,
        }
    }

    pub fn withdraw_by_type(source_type: SourceType) -> Self {
        Self {
            kind: PrefixEventKind::WithdrawPrefixesByType,
            source_type,
            entries: Vec::new(),
        }
    }

    pub fn sync_by_type(source_type: SourceType, entries: Vec<PrefixEntry>) -> Self {
        Self {
            kind: PrefixEventKind::SyncPrefixesByType,
            source_type,
            entries,
        }
    }

    /// Reject the event if any entry belongs to another source type.
    pub fn validate(&self) -> Result<(), CoreError> {
        self.entries
            .iter()
            .try_for_each(|e| e.validate_for(self.source_type))
    }
}
