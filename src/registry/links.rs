//! Weak cross-references between managed objects.
//!
//! A link never owns its target. Links live inside the owner's list and
//! disappear when the slot is replaced or either endpoint is destroyed.

use super::Handle;

/// Non-owning, typed association held by an owner at `slot`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeakLink {
    slot: String,
    target: Handle,
    target_type: &'static str,
}

impl WeakLink {
    pub fn new(slot: impl Into<String>, target: Handle, target_type: &'static str) -> Self {
        Self {
            slot: slot.into(),
            target,
            target_type,
        }
    }

    pub fn slot(&self) -> &str {
        &self.slot
    }

    pub fn target(&self) -> Handle {
        self.target
    }

    pub fn target_type(&self) -> &'static str {
        self.target_type
    }
}

/// Outgoing links of one object; at most one per slot
///
/// Fan-out is bounded by the number of reference-holding fields, so every
/// lookup is a linear scan.
#[derive(Debug, Clone, Default)]
pub struct LinkList {
    links: Vec<WeakLink>,
}

impl LinkList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find(&self, slot: &str) -> Option<&WeakLink> {
        self.links.iter().find(|l| l.slot == slot)
    }

    /// Install `link`, detaching and returning whatever held its slot
    pub fn replace(&mut self, link: WeakLink) -> Option<WeakLink> {
        let previous = self.remove_slot(&link.slot);
        self.links.push(link);
        previous
    }

    pub fn remove_slot(&mut self, slot: &str) -> Option<WeakLink> {
        let pos = self.links.iter().position(|l| l.slot == slot)?;
        Some(self.links.swap_remove(pos))
    }

    /// Drop every link pointing at `target`, returning how many went
    pub fn sever_target(&mut self, target: Handle) -> usize {
        let before = self.links.len();
        self.links.retain(|l| l.target != target);
        before - self.links.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WeakLink> {
        self.links.iter()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}
