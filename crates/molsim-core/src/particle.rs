//! Particle identities and the composite particle tree.

use crate::geometry::Vector;
use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Stable handle for a molecule (a composite particle) inside a box.
    pub struct MoleculeId;
}

/// Logical particle collection iterated as one sequence (for example a species).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct GroupId(pub u32);

/// A leaf particle stored in a [`SimBox`](crate::SimBox).
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    pub(crate) index: usize,
    pub(crate) position: Vector,
    pub(crate) group: GroupId,
    pub(crate) molecule: Option<MoleculeId>,
}

impl Atom {
    /// Dense global index, unique among live atoms of the owning box.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub const fn position(&self) -> &Vector {
        &self.position
    }

    #[must_use]
    pub const fn group(&self) -> GroupId {
        self.group
    }

    /// Molecule this atom belongs to, if any.
    #[must_use]
    pub const fn molecule(&self) -> Option<MoleculeId> {
        self.molecule
    }
}

/// Description of an atom to insert.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AtomSpec {
    pub position: Vector,
    pub group: GroupId,
}

impl AtomSpec {
    #[must_use]
    pub const fn new(position: Vector, group: GroupId) -> Self {
        Self { position, group }
    }
}

/// Description of a (possibly nested) particle to insert.
#[derive(Debug, Clone, PartialEq)]
pub enum ParticleSpec {
    Leaf(AtomSpec),
    Group(Vec<ParticleSpec>),
}

impl ParticleSpec {
    /// Number of leaf atoms described by this spec.
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        match self {
            Self::Leaf(_) => 1,
            Self::Group(children) => children.iter().map(Self::leaf_count).sum(),
        }
    }
}

/// Reference to a live particle by global index.
///
/// Groups mirror the nesting of the molecule they were inserted as; listeners
/// that only care about leaves flatten them with [`ParticleRef::for_each_leaf`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParticleRef {
    Leaf(usize),
    Group(Vec<ParticleRef>),
}

impl ParticleRef {
    /// Visit every leaf index in depth-first order.
    pub fn for_each_leaf(&self, mut visit: impl FnMut(usize)) {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            match node {
                Self::Leaf(index) => visit(*index),
                Self::Group(children) => stack.extend(children.iter().rev()),
            }
        }
    }

    /// Collect every leaf index in depth-first order.
    #[must_use]
    pub fn leaves(&self) -> Vec<usize> {
        let mut out = Vec::new();
        self.for_each_leaf(|index| out.push(index));
        out
    }

    #[must_use]
    pub fn leaf_count(&self) -> usize {
        match self {
            Self::Leaf(_) => 1,
            Self::Group(children) => children.iter().map(Self::leaf_count).sum(),
        }
    }

    /// Rewrite the leaf `old_index` as `new_index`; returns whether it was found.
    pub(crate) fn renumber(&mut self, old_index: usize, new_index: usize) -> bool {
        match self {
            Self::Leaf(index) if *index == old_index => {
                *index = new_index;
                true
            }
            Self::Leaf(_) => false,
            Self::Group(children) => children
                .iter_mut()
                .any(|child| child.renumber(old_index, new_index)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nested() -> ParticleRef {
        ParticleRef::Group(vec![
            ParticleRef::Leaf(3),
            ParticleRef::Group(vec![ParticleRef::Leaf(7), ParticleRef::Leaf(1)]),
            ParticleRef::Leaf(9),
        ])
    }

    #[test]
    fn flattening_preserves_depth_first_order() {
        let tree = nested();
        assert_eq!(tree.leaves(), vec![3, 7, 1, 9]);
        assert_eq!(tree.leaf_count(), 4);
    }

    #[test]
    fn renumber_touches_only_matching_leaf() {
        let mut tree = nested();
        assert!(tree.renumber(1, 0));
        assert!(!tree.renumber(42, 5));
        assert_eq!(tree.leaves(), vec![3, 7, 0, 9]);
    }

    #[test]
    fn particle_spec_counts_nested_leaves() {
        let atom = AtomSpec::new([0.0; 3], GroupId(0));
        let spec = ParticleSpec::Group(vec![
            ParticleSpec::Leaf(atom),
            ParticleSpec::Group(vec![ParticleSpec::Leaf(atom), ParticleSpec::Leaf(atom)]),
        ]);
        assert_eq!(spec.leaf_count(), 3);
    }
}
