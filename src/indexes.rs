// SPDX-License-Identifier: MIT

//! The mapping between the element positions of a data item (or a collection)
//! and the external IDs attached to them: usages, string indices and
//! designator indices.
//!
//! A descriptor either lists these IDs one by one (Usage, String Index,
//! Designator Index local items), possibly grouping several alternates into a
//! delimited set, or declares a contiguous Minimum/Maximum range.

/// A contiguous `[minimum, maximum]` mapping where position `i` maps to
/// `minimum + i`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IndexRange {
    minimum: u32,
    maximum: u32,
}

impl IndexRange {
    pub fn new(minimum: u32, maximum: u32) -> Self {
        IndexRange { minimum, maximum }
    }

    pub fn minimum(&self) -> u32 {
        self.minimum
    }

    pub fn maximum(&self) -> u32 {
        self.maximum
    }

    /// Number of positions, zero for an inverted range.
    pub fn count(&self) -> usize {
        if self.maximum < self.minimum {
            0
        } else {
            (self.maximum - self.minimum) as usize + 1
        }
    }
}

/// An explicit, ordered list of value groups. Each position usually holds a
/// single value, a delimited set holds all of its alternates in one group.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IndexList {
    groups: Vec<Vec<u32>>,
}

impl IndexList {
    pub fn new(groups: Vec<Vec<u32>>) -> Self {
        IndexList { groups }
    }

    pub fn groups(&self) -> &[Vec<u32>] {
        &self.groups
    }

    pub fn count(&self) -> usize {
        self.groups.len()
    }
}

/// The index association of one descriptor item.
///
/// [Indexes::Unset] is the "nothing associated" value every item starts
/// with: it has no positions and all lookups fail.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Indexes {
    #[default]
    Unset,
    Range(IndexRange),
    List(IndexList),
}

impl Indexes {
    /// The shared unset value.
    pub const UNSET: Indexes = Indexes::Unset;

    /// The number of element positions covered.
    pub fn count(&self) -> usize {
        match self {
            Indexes::Unset => 0,
            Indexes::Range(r) => r.count(),
            Indexes::List(l) => l.count(),
        }
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, Indexes::Unset)
    }

    /// The values associated with the element at `index`, empty if the
    /// index is out of bounds.
    pub fn values_from_index(&self, index: usize) -> impl Iterator<Item = u32> + '_ {
        let (range, group): (Option<u32>, &[u32]) = match self {
            Indexes::Unset => (None, &[]),
            Indexes::Range(r) => ((index < r.count()).then(|| r.minimum + index as u32), &[]),
            Indexes::List(l) => (None, l.groups.get(index).map(Vec::as_slice).unwrap_or(&[])),
        };
        range.into_iter().chain(group.iter().copied())
    }

    /// All values for all positions `0..count`, in position order. A value
    /// shared by several positions is yielded once per position.
    pub fn values(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.count()).flat_map(move |i| self.values_from_index(i))
    }

    pub fn contains_value(&self, value: u32) -> bool {
        self.try_get_index_from_value(value).is_some()
    }

    /// The position associated with `value`. For a list this is the first
    /// group that contains the value, for a range it is `value - minimum`.
    pub fn try_get_index_from_value(&self, value: u32) -> Option<usize> {
        match self {
            Indexes::Unset => None,
            Indexes::Range(r) => {
                if (r.minimum..=r.maximum).contains(&value) {
                    Some((value - r.minimum) as usize)
                } else {
                    None
                }
            }
            Indexes::List(l) => l.groups.iter().position(|g| g.contains(&value)),
        }
    }
}
