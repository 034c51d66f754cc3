// SPDX-License-Identifier: MIT

//! The descriptor parser. Walks the items of a report descriptor once and
//! builds the [ReportDescriptor] tree from the global and local item state.

use tracing::{debug, trace, warn};

use crate::hid::{decode_items, EncodedItem, GlobalTag, ItemClass, LocalTag, MainTag};
use crate::indexes::{IndexList, IndexRange, Indexes};
use crate::report::Report;
use crate::tree::{
    ChildItem, CollectionItem, DataItem, DataItemRef, DescriptorNode, DeviceItem, ItemId,
    ItemIndexes,
};
use crate::types::{CollectionType, DataItemFlags, MainDataItem, ReportType};
use crate::unit::{decode_exponent, Unit};
use crate::{HidError, ParseOptions, ReportDescriptor, Result, StructurePolicy, UnitExponentEncoding};

/// A logical or physical bound as it was encoded. Whether it is signed is
/// only known once both bounds and the item type are known.
#[derive(Clone, Copy, Debug, Default)]
struct Bound {
    unsigned: u32,
    signed: i32,
}

impl From<&EncodedItem> for Bound {
    fn from(item: &EncodedItem) -> Bound {
        Bound {
            unsigned: item.data_value(),
            signed: item.data_value_signed(),
        }
    }
}

/// Resolves a minimum/maximum pair. The pair is signed if the item is not an
/// array and the minimum is larger than the maximum when both are read as
/// unsigned.
fn resolve_bounds(minimum: Bound, maximum: Bound, is_array: bool) -> (i32, i32) {
    if !is_array && minimum.unsigned > maximum.unsigned {
        (minimum.signed, maximum.signed)
    } else {
        (minimum.unsigned as i32, maximum.unsigned as i32)
    }
}

#[derive(Clone, Debug, Default)]
struct Globals {
    usage_page: u16,
    logical_minimum: Bound,
    logical_maximum: Bound,
    physical_minimum: Bound,
    physical_maximum: Bound,
    unit_exponent: i32,
    unit: Unit,
    report_size: usize,
    report_id: u8,
    report_count: usize,
}

/// Accumulates one kind of local index (usage, designator or string) until
/// the next main item.
#[derive(Clone, Debug, Default)]
struct IndexAccumulator {
    groups: Vec<Vec<u32>>,
    minimum: Option<u32>,
    maximum: Option<u32>,
    delimited: Vec<u32>,
}

impl IndexAccumulator {
    fn add(&mut self, value: u32, in_delimiter: bool) {
        if in_delimiter {
            self.delimited.push(value);
        } else {
            self.groups.push(vec![value]);
        }
    }

    fn commit_delimited(&mut self) {
        if !self.delimited.is_empty() {
            self.groups.push(std::mem::take(&mut self.delimited));
        }
    }

    fn build(&self) -> Indexes {
        if self.minimum.is_some() || self.maximum.is_some() {
            Indexes::Range(IndexRange::new(
                self.minimum.unwrap_or(0),
                self.maximum.unwrap_or(0),
            ))
        } else if self.groups.is_empty() {
            Indexes::UNSET
        } else {
            Indexes::List(IndexList::new(self.groups.clone()))
        }
    }
}

#[derive(Clone, Debug, Default)]
struct Locals {
    usages: IndexAccumulator,
    designators: IndexAccumulator,
    strings: IndexAccumulator,
    delimiter_depth: u32,
}

impl Locals {
    fn commit_delimited(&mut self) {
        self.usages.commit_delimited();
        self.designators.commit_delimited();
        self.strings.commit_delimited();
    }

    fn indexes(&self) -> ItemIndexes {
        ItemIndexes {
            usages: self.usages.build(),
            designators: self.designators.build(),
            strings: self.strings.build(),
        }
    }
}

struct Parser<'o> {
    options: &'o ParseOptions,
    globals: Globals,
    stack: Vec<Globals>,
    locals: Locals,
    current: Option<ItemId>,
    rdesc: ReportDescriptor,
}

impl<'o> Parser<'o> {
    fn new(options: &'o ParseOptions) -> Self {
        Parser {
            options,
            globals: Globals::default(),
            stack: Vec::new(),
            locals: Locals::default(),
            current: None,
            rdesc: ReportDescriptor::default(),
        }
    }

    /// Skips or rejects a structural anomaly depending on the options.
    fn anomaly(&self, offset: usize, message: &str) -> Result<()> {
        match self.options.structure_policy() {
            StructurePolicy::Skip => {
                warn!("{message} at offset {offset}, ignoring");
                Ok(())
            }
            StructurePolicy::Reject => Err(HidError::Structure {
                offset,
                message: message.to_string(),
            }),
        }
    }

    fn node_mut(&mut self, id: ItemId) -> &mut DescriptorNode {
        &mut self.rdesc.nodes[id.0]
    }

    /// Completes a delimiter set left open before a main item.
    fn check_delimiter(&mut self, offset: usize) -> Result<()> {
        if self.locals.delimiter_depth > 0 {
            self.anomaly(offset, "Unterminated delimiter set")?;
            self.locals.delimiter_depth = 0;
            self.locals.commit_delimited();
        }
        Ok(())
    }

    fn parse(mut self, bytes: &[u8]) -> Result<ReportDescriptor> {
        for (offset, item) in decode_items(bytes) {
            match item.class() {
                ItemClass::Main => self.main_item(offset, &item)?,
                ItemClass::Global => self.global_item(offset, &item)?,
                ItemClass::Local => self.local_item(offset, &item)?,
                ItemClass::Reserved => {
                    if item.is_long() {
                        trace!("Ignoring long item {:?} at offset {offset}", item.long_tag());
                    } else {
                        trace!("Ignoring reserved item at offset {offset}");
                    }
                }
            }
        }

        if self.current.is_some() {
            self.anomaly(bytes.len(), "Unterminated collection")?;
        }

        let mut rdesc = self.rdesc;
        let max_length = |reports: &[Report], report_type: ReportType| {
            reports
                .iter()
                .filter(|r| r.report_type() == report_type)
                .map(Report::length)
                .max()
                .unwrap_or(0)
        };
        rdesc.max_input_report_length = max_length(rdesc.reports.as_slice(), ReportType::Input);
        rdesc.max_output_report_length = max_length(rdesc.reports.as_slice(), ReportType::Output);
        rdesc.max_feature_report_length = max_length(rdesc.reports.as_slice(), ReportType::Feature);

        debug!(
            "Parsed report descriptor: {} device items, {} reports, max input/output/feature length {}/{}/{}",
            rdesc.device_items.len(),
            rdesc.reports.len(),
            rdesc.max_input_report_length,
            rdesc.max_output_report_length,
            rdesc.max_feature_report_length
        );

        Ok(rdesc)
    }

    fn main_item(&mut self, offset: usize, item: &EncodedItem) -> Result<()> {
        self.check_delimiter(offset)?;
        let result = match item.main_tag() {
            Some(MainTag::Collection) => {
                self.open_collection(CollectionType::from(item.data_value() as u8));
                Ok(())
            }
            Some(MainTag::EndCollection) => match self.current {
                Some(id) => {
                    self.current = self.rdesc.nodes[id.0].parent();
                    Ok(())
                }
                None => self.anomaly(offset, "End Collection without Collection"),
            },
            Some(MainTag::Input) => self.data_item(offset, item, ReportType::Input),
            Some(MainTag::Output) => self.data_item(offset, item, ReportType::Output),
            Some(MainTag::Feature) => self.data_item(offset, item, ReportType::Feature),
            None => {
                trace!("Ignoring reserved main item {} at offset {offset}", item.tag());
                Ok(())
            }
        };
        // Local items only apply to the next main item
        self.locals = Locals::default();
        result
    }

    fn open_collection(&mut self, collection_type: CollectionType) {
        let id = ItemId(self.rdesc.nodes.len());
        let collection = CollectionItem::new(self.current, collection_type, self.locals.indexes());
        match self.current {
            None => {
                self.rdesc
                    .nodes
                    .push(DescriptorNode::Device(DeviceItem::new(collection)));
                self.rdesc.device_items.push(id);
            }
            Some(parent) => {
                self.rdesc.nodes.push(DescriptorNode::Collection(collection));
                self.node_mut(parent)
                    .collection_mut()
                    .push_child(ChildItem::Collection(id));
            }
        }
        self.current = Some(id);
    }

    /// The device item a node belongs to, i.e. its top-most ancestor.
    fn device_of(&self, mut id: ItemId) -> ItemId {
        while let Some(parent) = self.rdesc.nodes[id.0].parent() {
            id = parent;
        }
        id
    }

    /// Finds or creates the report of the given type and the current report
    /// ID in the given device item.
    fn report_index(&mut self, device: ItemId, report_type: ReportType) -> Result<usize> {
        let report_id = self.globals.report_id;
        let reports = &self.rdesc.reports;
        let existing = self.rdesc.nodes[device.0]
            .as_device()
            .and_then(|d| {
                d.reports().iter().copied().find(|r| {
                    reports[*r].report_type() == report_type && reports[*r].report_id() == report_id
                })
            });
        if let Some(index) = existing {
            return Ok(index);
        }

        let index = self.rdesc.reports.len();
        self.node_mut(device)
            .as_device_mut()
            .ok_or_else(|| HidError::InvalidOperation {
                message: format!("Node {} is not a device item", device.0),
            })?
            .push_report(index);
        self.rdesc
            .reports
            .push(Report::new(report_type, report_id));
        Ok(index)
    }

    fn data_item(&mut self, offset: usize, item: &EncodedItem, report_type: ReportType) -> Result<()> {
        let Some(parent) = self.current else {
            return self.anomaly(offset, "Data item outside of any collection");
        };

        let flags = DataItemFlags::from_bits_truncate(item.data_value());
        let g = &self.globals;
        let (lmin, lmax) = resolve_bounds(g.logical_minimum, g.logical_maximum, flags.is_array());
        // (0, 0) stays as encoded, DataItem falls back to the logical range
        let (pmin, pmax) = resolve_bounds(g.physical_minimum, g.physical_maximum, flags.is_array());
        let data_item = DataItem::new(g.report_count, g.report_size, flags)
            .with_logical_range(lmin, lmax)
            .with_physical_range(pmin, pmax)
            .with_unit(g.unit, g.unit_exponent)
            .with_indexes(self.locals.indexes())
            .with_parent(parent);

        let device = self.device_of(parent);
        let report = self.report_index(device, report_type)?;
        let index = self.rdesc.reports[report].push_data_item(data_item);
        self.node_mut(parent)
            .collection_mut()
            .push_child(ChildItem::Data(DataItemRef { report, index }));
        Ok(())
    }

    fn unit_exponent(&self, offset: usize, item: &EncodedItem) -> Result<Option<i32>> {
        let value = item.data_value();
        let exponent = match self.options.unit_exponent_encoding() {
            UnitExponentEncoding::Auto if value <= 0xF => decode_exponent(value)?,
            UnitExponentEncoding::Auto | UnitExponentEncoding::Signed => item.data_value_signed(),
            UnitExponentEncoding::Nibble => match decode_exponent(value) {
                Ok(exponent) => exponent,
                Err(_) => {
                    self.anomaly(offset, "Unit Exponent is not a 4-bit value")?;
                    return Ok(None);
                }
            },
        };
        Ok(Some(exponent))
    }

    fn global_item(&mut self, offset: usize, item: &EncodedItem) -> Result<()> {
        let Some(tag) = item.global_tag() else {
            trace!("Ignoring reserved global item {} at offset {offset}", item.tag());
            return Ok(());
        };
        let g = &mut self.globals;
        match tag {
            GlobalTag::UsagePage => g.usage_page = item.data_value() as u16,
            GlobalTag::LogicalMinimum => g.logical_minimum = Bound::from(item),
            GlobalTag::LogicalMaximum => g.logical_maximum = Bound::from(item),
            GlobalTag::PhysicalMinimum => g.physical_minimum = Bound::from(item),
            GlobalTag::PhysicalMaximum => g.physical_maximum = Bound::from(item),
            GlobalTag::Unit => g.unit = Unit::from_raw(item.data_value()),
            GlobalTag::ReportSize => g.report_size = item.data_value() as usize,
            GlobalTag::ReportCount => g.report_count = item.data_value() as usize,
            GlobalTag::ReportId => {
                g.report_id = item.data_value() as u8;
                self.rdesc.reports_use_id = true;
            }
            GlobalTag::UnitExponent => {
                if let Some(exponent) = self.unit_exponent(offset, item)? {
                    self.globals.unit_exponent = exponent;
                }
            }
            GlobalTag::Push => self.stack.push(self.globals.clone()),
            GlobalTag::Pop => match self.stack.pop() {
                Some(globals) => self.globals = globals,
                None => self.anomaly(offset, "Pop without Push")?,
            },
        }
        Ok(())
    }

    /// Extends a 16-bit usage with the current Usage Page.
    fn extended_usage(&self, item: &EncodedItem) -> u32 {
        let value = item.data_value();
        if value <= 0xFFFF {
            (u32::from(self.globals.usage_page) << 16) | value
        } else {
            value
        }
    }

    fn local_item(&mut self, offset: usize, item: &EncodedItem) -> Result<()> {
        let Some(tag) = item.local_tag() else {
            trace!("Ignoring reserved local item {} at offset {offset}", item.tag());
            return Ok(());
        };
        let in_delimiter = self.locals.delimiter_depth > 0;
        let value = item.data_value();
        match tag {
            LocalTag::Usage => {
                let usage = self.extended_usage(item);
                self.locals.usages.add(usage, in_delimiter);
            }
            LocalTag::UsageMinimum => self.locals.usages.minimum = Some(self.extended_usage(item)),
            LocalTag::UsageMaximum => self.locals.usages.maximum = Some(self.extended_usage(item)),
            LocalTag::DesignatorIndex => self.locals.designators.add(value, in_delimiter),
            LocalTag::DesignatorMinimum => self.locals.designators.minimum = Some(value),
            LocalTag::DesignatorMaximum => self.locals.designators.maximum = Some(value),
            LocalTag::StringIndex => self.locals.strings.add(value, in_delimiter),
            LocalTag::StringMinimum => self.locals.strings.minimum = Some(value),
            LocalTag::StringMaximum => self.locals.strings.maximum = Some(value),
            LocalTag::Delimiter => {
                if value != 0 {
                    self.locals.delimiter_depth += 1;
                } else if self.locals.delimiter_depth == 0 {
                    self.anomaly(offset, "Delimiter close without open")?;
                } else {
                    self.locals.delimiter_depth -= 1;
                    if self.locals.delimiter_depth == 0 {
                        self.locals.commit_delimited();
                    }
                }
            }
        }
        Ok(())
    }
}

pub(crate) fn parse(bytes: &[u8], options: &ParseOptions) -> Result<ReportDescriptor> {
    Parser::new(options).parse(bytes)
}
