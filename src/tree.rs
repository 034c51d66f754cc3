// SPDX-License-Identifier: MIT

//! The descriptor tree. Collections and device items live in an arena owned
//! by the [ReportDescriptor](crate::ReportDescriptor) and refer to each other
//! by [ItemId]. [DataItem]s are owned by their [Report](crate::Report) and
//! referenced from the tree by [DataItemRef].

use crate::indexes::Indexes;
use crate::types::{CollectionType, DataItemFlags, MainDataItem};
use crate::unit::Unit;

/// Index of a collection node in the descriptor arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(pub(crate) usize);

impl ItemId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Location of a [DataItem]: the index of its report in
/// [ReportDescriptor::reports()](crate::ReportDescriptor::reports) and its
/// position within that report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DataItemRef {
    pub report: usize,
    pub index: usize,
}

/// The usage, designator and string associations of a descriptor item.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ItemIndexes {
    pub usages: Indexes,
    pub designators: Indexes,
    pub strings: Indexes,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChildItem {
    Collection(ItemId),
    Data(DataItemRef),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollectionItem {
    parent: Option<ItemId>,
    collection_type: CollectionType,
    indexes: ItemIndexes,
    children: Vec<ChildItem>,
}

impl CollectionItem {
    pub(crate) fn new(
        parent: Option<ItemId>,
        collection_type: CollectionType,
        indexes: ItemIndexes,
    ) -> Self {
        CollectionItem {
            parent,
            collection_type,
            indexes,
            children: Vec::new(),
        }
    }

    /// The enclosing collection, `None` for a device item.
    pub fn parent(&self) -> Option<ItemId> {
        self.parent
    }

    pub fn collection_type(&self) -> CollectionType {
        self.collection_type
    }

    pub fn indexes(&self) -> &ItemIndexes {
        &self.indexes
    }

    pub fn usages(&self) -> &Indexes {
        &self.indexes.usages
    }

    pub fn designators(&self) -> &Indexes {
        &self.indexes.designators
    }

    pub fn strings(&self) -> &Indexes {
        &self.indexes.strings
    }

    /// Nested collections and data items in descriptor order.
    pub fn children(&self) -> &[ChildItem] {
        &self.children
    }

    pub(crate) fn push_child(&mut self, child: ChildItem) {
        self.children.push(child);
    }
}

/// A top-level collection: one logical device. Owns the reports its data
/// items are in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceItem {
    collection: CollectionItem,
    reports: Vec<usize>,
}

impl DeviceItem {
    pub(crate) fn new(collection: CollectionItem) -> Self {
        DeviceItem {
            collection,
            reports: Vec::new(),
        }
    }

    pub fn collection(&self) -> &CollectionItem {
        &self.collection
    }

    /// Indices into [ReportDescriptor::reports()](crate::ReportDescriptor::reports).
    pub fn reports(&self) -> &[usize] {
        &self.reports
    }

    pub(crate) fn push_report(&mut self, report: usize) {
        self.reports.push(report);
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DescriptorNode {
    Collection(CollectionItem),
    Device(DeviceItem),
}

impl DescriptorNode {
    pub fn collection(&self) -> &CollectionItem {
        match self {
            DescriptorNode::Collection(c) => c,
            DescriptorNode::Device(d) => &d.collection,
        }
    }

    pub(crate) fn collection_mut(&mut self) -> &mut CollectionItem {
        match self {
            DescriptorNode::Collection(c) => c,
            DescriptorNode::Device(d) => &mut d.collection,
        }
    }

    pub fn as_device(&self) -> Option<&DeviceItem> {
        match self {
            DescriptorNode::Device(d) => Some(d),
            DescriptorNode::Collection(_) => None,
        }
    }

    pub(crate) fn as_device_mut(&mut self) -> Option<&mut DeviceItem> {
        match self {
            DescriptorNode::Device(d) => Some(d),
            DescriptorNode::Collection(_) => None,
        }
    }

    pub fn is_device(&self) -> bool {
        matches!(self, DescriptorNode::Device(_))
    }

    pub fn parent(&self) -> Option<ItemId> {
        self.collection().parent()
    }
}

/// One field of a report: `element_count` elements of `element_bits` bits
/// each.
///
/// A data item is built with [DataItem::new] and the chained `with_*`
/// setters. Once it is part of a parsed descriptor it is only reachable by
/// shared reference.
///
/// ```
/// # use hidtrack::*;
/// let x = DataItem::new(1, 16, DataItemFlags::VARIABLE)
///     .with_logical_range(-32767, 32767)
///     .with_usages(Indexes::Range(IndexRange::new(0x0001_0030, 0x0001_0030)));
/// assert_eq!(x.total_bits(), 16);
/// assert!(x.is_logical_signed());
/// assert!(x.is_variable());
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct DataItem {
    parent: Option<ItemId>,
    indexes: ItemIndexes,
    element_count: usize,
    element_bits: usize,
    flags: DataItemFlags,
    logical_minimum: i32,
    logical_maximum: i32,
    raw_physical_minimum: i32,
    raw_physical_maximum: i32,
    unit: Unit,
    unit_exponent: i32,
}

impl DataItem {
    pub fn new(element_count: usize, element_bits: usize, flags: DataItemFlags) -> Self {
        DataItem {
            parent: None,
            indexes: ItemIndexes::default(),
            element_count,
            element_bits,
            flags,
            logical_minimum: 0,
            logical_maximum: 0,
            raw_physical_minimum: 0,
            raw_physical_maximum: 0,
            unit: Unit::default(),
            unit_exponent: 0,
        }
    }

    pub fn with_logical_range(mut self, minimum: i32, maximum: i32) -> Self {
        self.logical_minimum = minimum;
        self.logical_maximum = maximum;
        self
    }

    /// Sets the raw physical bounds. Leaving both at zero makes the physical
    /// range follow the logical range.
    pub fn with_physical_range(mut self, minimum: i32, maximum: i32) -> Self {
        self.raw_physical_minimum = minimum;
        self.raw_physical_maximum = maximum;
        self
    }

    pub fn with_unit(mut self, unit: Unit, exponent: i32) -> Self {
        self.unit = unit;
        self.unit_exponent = exponent;
        self
    }

    pub fn with_usages(mut self, usages: Indexes) -> Self {
        self.indexes.usages = usages;
        self
    }

    pub fn with_designators(mut self, designators: Indexes) -> Self {
        self.indexes.designators = designators;
        self
    }

    pub fn with_strings(mut self, strings: Indexes) -> Self {
        self.indexes.strings = strings;
        self
    }

    pub(crate) fn with_indexes(mut self, indexes: ItemIndexes) -> Self {
        self.indexes = indexes;
        self
    }

    pub(crate) fn with_parent(mut self, parent: ItemId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// The collection this item was declared in.
    pub fn parent(&self) -> Option<ItemId> {
        self.parent
    }

    pub fn indexes(&self) -> &ItemIndexes {
        &self.indexes
    }

    pub fn usages(&self) -> &Indexes {
        &self.indexes.usages
    }

    pub fn designators(&self) -> &Indexes {
        &self.indexes.designators
    }

    pub fn strings(&self) -> &Indexes {
        &self.indexes.strings
    }

    /// The Report Count of this item.
    pub fn element_count(&self) -> usize {
        self.element_count
    }

    /// The Report Size of this item.
    pub fn element_bits(&self) -> usize {
        self.element_bits
    }

    pub fn total_bits(&self) -> usize {
        self.element_count.saturating_mul(self.element_bits)
    }

    pub fn logical_minimum(&self) -> i32 {
        self.logical_minimum
    }

    pub fn logical_maximum(&self) -> i32 {
        self.logical_maximum
    }

    /// Number of distinct logical values, zero for an inverted range.
    pub fn logical_range_count(&self) -> usize {
        let span = i64::from(self.logical_maximum) - i64::from(self.logical_minimum);
        if span < 0 {
            0
        } else {
            span as usize + 1
        }
    }

    /// True if logical values need sign extension, i.e. the logical minimum
    /// is negative.
    pub fn is_logical_signed(&self) -> bool {
        self.logical_minimum < 0
    }

    pub fn raw_physical_minimum(&self) -> i32 {
        self.raw_physical_minimum
    }

    pub fn raw_physical_maximum(&self) -> i32 {
        self.raw_physical_maximum
    }

    fn physical_bounds(&self) -> (i32, i32) {
        if self.raw_physical_minimum == 0 && self.raw_physical_maximum == 0 {
            (self.logical_minimum, self.logical_maximum)
        } else {
            (self.raw_physical_minimum, self.raw_physical_maximum)
        }
    }

    fn scale(&self) -> f64 {
        10f64.powi(self.unit_exponent)
    }

    /// The physical minimum with the unit exponent applied.
    pub fn physical_minimum(&self) -> f64 {
        f64::from(self.physical_bounds().0) * self.scale()
    }

    pub fn physical_maximum(&self) -> f64 {
        f64::from(self.physical_bounds().1) * self.scale()
    }

    pub fn physical_range(&self) -> f64 {
        self.physical_maximum() - self.physical_minimum()
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn unit_exponent(&self) -> i32 {
        self.unit_exponent
    }

    /// The usage of the element at `index`. A variable item with fewer
    /// usages than elements repeats its last usage, Section 6.2.2.8.
    pub fn usage_for_element(&self, index: usize) -> Option<u32> {
        let usages = self.usages();
        if index >= self.element_count || usages.count() == 0 {
            return None;
        }
        let index = index.min(usages.count() - 1);
        usages.values_from_index(index).next()
    }
}

impl MainDataItem for DataItem {
    fn flags(&self) -> DataItemFlags {
        self.flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexes::{IndexList, IndexRange};

    #[test]
    fn physical_defaults_to_logical() {
        let item = DataItem::new(1, 8, DataItemFlags::VARIABLE).with_logical_range(-127, 127);
        assert_eq!(item.physical_minimum(), -127.0);
        assert_eq!(item.physical_maximum(), 127.0);

        let item = item.with_physical_range(0, 360).with_unit(Unit::from_raw(0x14), -2);
        assert_eq!(item.raw_physical_maximum(), 360);
        assert!((item.physical_maximum() - 3.6).abs() < 1e-9);
        assert!((item.physical_range() - 3.6).abs() < 1e-9);
    }

    #[test]
    fn last_usage_repeats() {
        let item = DataItem::new(4, 1, DataItemFlags::VARIABLE)
            .with_usages(Indexes::List(IndexList::new(vec![vec![1], vec![2]])));
        assert_eq!(item.usage_for_element(0), Some(1));
        assert_eq!(item.usage_for_element(1), Some(2));
        assert_eq!(item.usage_for_element(3), Some(2));
        assert_eq!(item.usage_for_element(4), None);

        let item = DataItem::new(3, 1, DataItemFlags::VARIABLE)
            .with_usages(Indexes::Range(IndexRange::new(0x0009_0001, 0x0009_0003)));
        assert_eq!(item.usage_for_element(2), Some(0x0009_0003));

        let item = DataItem::new(3, 1, DataItemFlags::VARIABLE);
        assert_eq!(item.usage_for_element(0), None);
    }

    #[test]
    fn array_flags() {
        let item = DataItem::new(6, 8, DataItemFlags::empty()).with_logical_range(0, 101);
        assert!(item.is_array());
        assert!(item.is_data());
        assert!(!item.is_logical_signed());
        assert_eq!(item.logical_range_count(), 102);
        assert_eq!(item.total_bits(), 48);
    }
}
