// SPDX-License-Identifier: MIT

//! A HID Report Descriptor parser, report codec and input change tracker.
//!
//! The parsed [ReportDescriptor] is a tree: each top-level collection is a
//! [DeviceItem] (one logical device of the physical HID device) that owns the
//! [Report]s its data items live in. Nested collections and data items hang
//! off their parent collection in document order.
//!
//! ```
//! # use hidtrack::*;
//! # fn main() -> hidtrack::Result<()> {
//! # let bytes: &[u8] = &[0x05, 0x09, 0x09, 0x01, 0xa1, 0x01, 0x15, 0x00,
//! #                     0x25, 0x01, 0x75, 0x01, 0x95, 0x01, 0x81, 0x02,
//! #                     0x75, 0x07, 0x81, 0x01, 0xc0];
//! let rdesc = ReportDescriptor::parse(bytes)?;
//! for report in rdesc.input_reports() {
//!     println!("Input report {} is {} bytes long", report.report_id(), report.length());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Input reports of one device item can be fed into a
//! [DeviceItemInputParser] which keeps the last two values of every tracked
//! element and queues the ones that changed:
//!
//! ```
//! # use hidtrack::*;
//! # fn main() -> hidtrack::Result<()> {
//! # let bytes: &[u8] = &[0x05, 0x09, 0x09, 0x01, 0xa1, 0x01, 0x15, 0x00,
//! #                     0x25, 0x01, 0x75, 0x01, 0x95, 0x01, 0x81, 0x02,
//! #                     0x75, 0x07, 0x81, 0x01, 0xc0];
//! let rdesc = ReportDescriptor::parse(bytes)?;
//! let device = rdesc.device_item_ids()[0];
//! let parser = rdesc.input_parser(device)?;
//!
//! parser.try_parse(&[0x00, 0x01])?;
//! while let Some(index) = parser.next_changed_index() {
//!     let value = parser.value(index).unwrap();
//!     println!("{:?} is now {}", value.usages().collect::<Vec<_>>(), value.logical());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! In this document and unless stated otherwise, a reference to "Section a.b.c" refers to the
//! [HID Device Class Definition for HID 1.11](https://www.usb.org/document-library/device-class-definition-hid-111).

use thiserror::Error;

/// Returns early with the given error if the condition does not hold.
macro_rules! ensure {
    ($cond:expr, $err:expr) => {
        if !($cond) {
            return Err($err);
        }
    };
}
pub(crate) use ensure;

pub mod convert;
pub mod hid;
pub mod indexes;
pub mod input;
mod parser;
pub mod report;
pub mod tree;
pub mod types;
pub mod unit;

pub use indexes::{IndexList, IndexRange, Indexes};
pub use input::{DeviceItemInputParser, MAX_TRACKED_VALUES};
pub use report::{DataValue, Report};
pub use tree::{
    ChildItem, CollectionItem, DataItem, DataItemRef, DescriptorNode, DeviceItem, ItemId,
    ItemIndexes,
};
pub use types::*;
pub use unit::Unit;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HidError {
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },
    #[error("Invalid operation: {message}")]
    InvalidOperation { message: String },
    #[error("Value {value} out of range {min}..={max}")]
    OutOfRange { value: i64, min: i64, max: i64 },
    #[error("Expected report ID {expected} but buffer has {actual}")]
    ReportIdMismatch { expected: u8, actual: u8 },
    #[error("Invalid descriptor structure at offset {offset}: {message}")]
    Structure { offset: usize, message: String },
}

pub type Result<T> = std::result::Result<T, HidError>;

/// What to do about a descriptor that is well-formed on the byte level but
/// not structurally, e.g. an End Collection without a matching Collection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StructurePolicy {
    /// Log a warning, ignore the offending item and continue.
    #[default]
    Skip,
    /// Fail the parse with [HidError::Structure].
    Reject,
}

/// How the payload of a Unit Exponent item is interpreted.
///
/// Section 6.2.2.7 encodes the exponent as a 4-bit two's complement nibble
/// but a fair number of devices write a plain signed integer instead.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UnitExponentEncoding {
    /// Payloads `0..=15` are nibbles, anything else is a signed integer.
    #[default]
    Auto,
    /// Always a nibble, larger payloads are a structural anomaly.
    Nibble,
    /// Always a sign-extended integer.
    Signed,
}

/// Options for [ReportDescriptor::parse_with].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ParseOptions {
    structure: StructurePolicy,
    unit_exponent: UnitExponentEncoding,
}

impl ParseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn structure(mut self, policy: StructurePolicy) -> Self {
        self.structure = policy;
        self
    }

    pub fn unit_exponent(mut self, encoding: UnitExponentEncoding) -> Self {
        self.unit_exponent = encoding;
        self
    }

    pub fn structure_policy(&self) -> StructurePolicy {
        self.structure
    }

    pub fn unit_exponent_encoding(&self) -> UnitExponentEncoding {
        self.unit_exponent
    }
}

/// A parsed HID Report Descriptor.
///
/// The descriptor is immutable once parsed, all accessors hand out shared
/// references only.
#[derive(Debug, Default, Clone)]
pub struct ReportDescriptor {
    pub(crate) nodes: Vec<DescriptorNode>,
    pub(crate) device_items: Vec<ItemId>,
    pub(crate) reports: Vec<Report>,
    pub(crate) reports_use_id: bool,
    pub(crate) max_input_report_length: usize,
    pub(crate) max_output_report_length: usize,
    pub(crate) max_feature_report_length: usize,
}

impl ReportDescriptor {
    /// Parses the descriptor with the default [ParseOptions].
    pub fn parse(bytes: &[u8]) -> Result<ReportDescriptor> {
        Self::parse_with(bytes, &ParseOptions::default())
    }

    /// Parses the descriptor, handling malformed structure and unit
    /// exponents as configured in `options`.
    pub fn parse_with(bytes: &[u8], options: &ParseOptions) -> Result<ReportDescriptor> {
        parser::parse(bytes, options)
    }

    /// All reports of all device items, in the order they were first
    /// referenced by the descriptor.
    pub fn reports(&self) -> &[Report] {
        &self.reports
    }

    pub fn input_reports(&self) -> impl Iterator<Item = &Report> {
        self.reports_of_type(ReportType::Input)
    }

    pub fn output_reports(&self) -> impl Iterator<Item = &Report> {
        self.reports_of_type(ReportType::Output)
    }

    pub fn feature_reports(&self) -> impl Iterator<Item = &Report> {
        self.reports_of_type(ReportType::Feature)
    }

    fn reports_of_type(&self, report_type: ReportType) -> impl Iterator<Item = &Report> {
        self.reports
            .iter()
            .filter(move |r| r.report_type() == report_type)
    }

    /// True if any Report ID item was present in the descriptor.
    pub fn reports_use_id(&self) -> bool {
        self.reports_use_id
    }

    /// The length in bytes of the longest Input report, including the
    /// Report ID byte. Zero if there are no Input reports.
    pub fn max_input_report_length(&self) -> usize {
        self.max_input_report_length
    }

    /// Like [ReportDescriptor::max_input_report_length] for Output reports.
    pub fn max_output_report_length(&self) -> usize {
        self.max_output_report_length
    }

    /// Like [ReportDescriptor::max_input_report_length] for Feature reports.
    pub fn max_feature_report_length(&self) -> usize {
        self.max_feature_report_length
    }

    /// The ids of the top-level collections, in descriptor order.
    pub fn device_item_ids(&self) -> &[ItemId] {
        &self.device_items
    }

    pub fn device_items(&self) -> impl Iterator<Item = &DeviceItem> {
        self.device_items
            .iter()
            .filter_map(move |id| self.node(*id).and_then(DescriptorNode::as_device))
    }

    pub fn node(&self, id: ItemId) -> Option<&DescriptorNode> {
        self.nodes.get(id.index())
    }

    /// The parent chain of `id`, starting with its parent and ending with
    /// the device item.
    pub fn ancestors(&self, id: ItemId) -> impl Iterator<Item = ItemId> + '_ {
        std::iter::successors(self.node(id).and_then(DescriptorNode::parent), move |id| {
            self.node(*id).and_then(DescriptorNode::parent)
        })
    }

    pub fn data_item(&self, data: DataItemRef) -> Option<&DataItem> {
        self.reports
            .get(data.report)
            .and_then(|r| r.data_items().get(data.index))
    }

    /// The reports owned by the given device item, empty if `device` is not
    /// a device item.
    pub fn reports_of(&self, device: ItemId) -> impl Iterator<Item = &Report> {
        let reports = match self.node(device).and_then(DescriptorNode::as_device) {
            Some(d) => d.reports(),
            None => &[],
        };
        reports.iter().filter_map(move |r| self.reports.get(*r))
    }

    /// Returns the report of the given type and ID or
    /// [HidError::InvalidArgument] if there is none.
    pub fn get_report(&self, report_type: ReportType, report_id: u8) -> Result<&Report> {
        self.try_get_report(report_type, report_id)
            .ok_or_else(|| HidError::InvalidArgument {
                message: format!("No {report_type} report with ID {report_id}"),
            })
    }

    /// The report of the given type and ID, `None` if there is none.
    pub fn try_get_report(&self, report_type: ReportType, report_id: u8) -> Option<&Report> {
        self.reports
            .iter()
            .find(|r| r.report_type() == report_type && r.report_id() == report_id)
    }

    /// Creates a change tracker for the Input reports of the given device
    /// item.
    pub fn input_parser(&self, device: ItemId) -> Result<DeviceItemInputParser<'_>> {
        DeviceItemInputParser::new(self, device)
    }
}

impl TryFrom<&[u8]> for ReportDescriptor {
    type Error = HidError;

    fn try_from(bytes: &[u8]) -> Result<ReportDescriptor> {
        ReportDescriptor::parse(bytes)
    }
}

impl TryFrom<&Vec<u8>> for ReportDescriptor {
    type Error = HidError;

    fn try_from(bytes: &Vec<u8>) -> Result<ReportDescriptor> {
        ReportDescriptor::parse(bytes)
    }
}
