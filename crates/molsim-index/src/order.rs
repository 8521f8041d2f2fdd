//! Cell-ordered particle sequences.
//!
//! Every sequence group owns a circular doubly linked list: a head marker,
//! then one tab per lattice cell in cell order, with each particle linked
//! directly after the tab of the cell it occupies. Moving a particle between
//! cells is an O(1) unlink and relink.

use molsim_core::GroupId;
use slotmap::{Key, SlotMap, new_key_type};
use std::collections::HashMap;

new_key_type! {
    /// Handle of one link in a [`CellOrder`].
    pub struct LinkKey;
}

/// What a link in the sequence stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Head(GroupId),
    Tab { cell: usize },
    Particle(usize),
}

#[derive(Debug, Clone)]
struct Link {
    prev: LinkKey,
    next: LinkKey,
    kind: LinkKind,
}

#[derive(Debug, Default, Clone)]
pub struct CellOrder {
    links: SlotMap<LinkKey, Link>,
    heads: HashMap<GroupId, LinkKey>,
}

impl CellOrder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Head marker of `group`, if the group has been seen.
    #[must_use]
    pub fn head(&self, group: GroupId) -> Option<LinkKey> {
        self.heads.get(&group).copied()
    }

    pub fn groups(&self) -> impl Iterator<Item = GroupId> + '_ {
        self.heads.keys().copied()
    }

    /// Start an empty sequence for `group` and return its head marker.
    pub fn open(&mut self, group: GroupId) -> LinkKey {
        if let Some(head) = self.head(group) {
            return head;
        }
        let head = self.links.insert(Link {
            prev: LinkKey::null(),
            next: LinkKey::null(),
            kind: LinkKind::Head(group),
        });
        let link = &mut self.links[head];
        link.prev = head;
        link.next = head;
        self.heads.insert(group, head);
        head
    }

    /// Insert a new link right after `anchor`.
    pub fn insert_after(&mut self, anchor: LinkKey, kind: LinkKind) -> LinkKey {
        let next = self.links[anchor].next;
        let key = self.links.insert(Link {
            prev: anchor,
            next,
            kind,
        });
        self.links[anchor].next = key;
        self.links[next].prev = key;
        key
    }

    /// Move an existing link so that it follows `anchor`.
    pub fn splice_after(&mut self, key: LinkKey, anchor: LinkKey) {
        if key == anchor || self.links[anchor].next == key {
            return;
        }
        self.detach(key);
        let next = self.links[anchor].next;
        let link = &mut self.links[key];
        link.prev = anchor;
        link.next = next;
        self.links[anchor].next = key;
        self.links[next].prev = key;
    }

    /// Remove a link, returning what it stood for.
    pub fn unlink(&mut self, key: LinkKey) -> Option<LinkKind> {
        if !self.links.contains_key(key) {
            return None;
        }
        self.detach(key);
        self.links.remove(key).map(|link| link.kind)
    }

    #[must_use]
    pub fn next(&self, key: LinkKey) -> LinkKey {
        self.links[key].next
    }

    #[must_use]
    pub fn prev(&self, key: LinkKey) -> LinkKey {
        self.links[key].prev
    }

    #[must_use]
    pub fn kind(&self, key: LinkKey) -> LinkKind {
        self.links[key].kind
    }

    pub fn set_kind(&mut self, key: LinkKey, kind: LinkKind) {
        if let Some(link) = self.links.get_mut(key) {
            link.kind = kind;
        }
    }

    /// Number of links, markers included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.links.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn clear(&mut self) {
        self.links.clear();
        self.heads.clear();
    }

    fn detach(&mut self, key: LinkKey) {
        let Link { prev, next, .. } = self.links[key];
        self.links[prev].next = next;
        self.links[next].prev = prev;
        let link = &mut self.links[key];
        link.prev = key;
        link.next = key;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walk(order: &CellOrder, head: LinkKey) -> Vec<LinkKind> {
        let mut out = Vec::new();
        let mut key = order.next(head);
        while key != head {
            out.push(order.kind(key));
            key = order.next(key);
        }
        out
    }

    #[test]
    fn particles_follow_their_tab() {
        let mut order = CellOrder::new();
        let head = order.open(GroupId(0));
        let tab0 = order.insert_after(head, LinkKind::Tab { cell: 0 });
        let tab1 = order.insert_after(tab0, LinkKind::Tab { cell: 1 });
        let p = order.insert_after(tab0, LinkKind::Particle(7));
        order.insert_after(tab1, LinkKind::Particle(8));

        assert_eq!(
            walk(&order, head),
            vec![
                LinkKind::Tab { cell: 0 },
                LinkKind::Particle(7),
                LinkKind::Tab { cell: 1 },
                LinkKind::Particle(8),
            ]
        );

        order.splice_after(p, tab1);
        assert_eq!(
            walk(&order, head),
            vec![
                LinkKind::Tab { cell: 0 },
                LinkKind::Tab { cell: 1 },
                LinkKind::Particle(7),
                LinkKind::Particle(8),
            ]
        );
        assert_eq!(order.prev(p), tab1);
    }

    #[test]
    fn unlink_closes_the_gap() {
        let mut order = CellOrder::new();
        let head = order.open(GroupId(1));
        let a = order.insert_after(head, LinkKind::Particle(1));
        let b = order.insert_after(a, LinkKind::Particle(2));
        assert_eq!(order.unlink(a), Some(LinkKind::Particle(1)));
        assert_eq!(order.unlink(a), None);
        assert_eq!(order.next(head), b);
        assert_eq!(order.prev(head), b);
        assert_eq!(order.len(), 2);
    }

    #[test]
    fn open_is_idempotent_per_group() {
        let mut order = CellOrder::new();
        let head = order.open(GroupId(4));
        assert_eq!(order.open(GroupId(4)), head);
        assert_ne!(order.open(GroupId(5)), head);
        assert_eq!(order.groups().count(), 2);
        order.clear();
        assert!(order.is_empty());
        assert_eq!(order.head(GroupId(4)), None);
    }
}
