//! Set of prefixes awaiting the next flush.

use std::collections::BTreeSet;

use ipnet::IpNet;

#[derive(Debug, Default)]
pub struct DirtySet {
    prefixes: BTreeSet<IpNet>,
}

impl DirtySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&mut self, prefix: IpNet) {
        self.prefixes.insert(prefix);
    }

    pub fn mark_all(&mut self, prefixes: impl IntoIterator<Item = IpNet>) {
        self.prefixes.extend(prefixes);
    }

    #[must_use]
    pub fn contains(&self, prefix: &IpNet) -> bool {
        self.prefixes.contains(prefix)
    }

    /// Drain the set for a flush.
    pub fn take(&mut self) -> BTreeSet<IpNet> {
        std::mem::take(&mut self.prefixes)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }
}
