// SPDX-License-Identifier: MIT

//! The HID item codec. This module handles splitting a report descriptor
//! byte stream into its individual [EncodedItem]s and serializing items back
//! into bytes. Interpretation of the resulting items is left to the caller
//! (see [crate::ReportDescriptor] for the interpreting parser).
//!
//! In this document and unless stated otherwise, a reference to "Section a.b.c" refers to the
//! [HID Device Class Definition for HID 1.11](https://www.usb.org/document-library/device-class-definition-hid-111).
//!
//! # Itemizing HID Report Descriptors
//!
//! ```
//! # use hidtrack::hid::*;
//! let bytes = [0x05, 0x01, 0x09, 0x02, 0xa1, 0x01, 0xc0];
//! for (offset, item) in decode_items(&bytes) {
//!     if item.main_tag() == Some(MainTag::Collection) {
//!         println!("Collection at offset {offset:02x}");
//!     }
//! }
//! ```
//!
//! Decoding never fails: a payload cut short by the end of the buffer is
//! zero-padded and the item only claims the bytes that were actually there.
//!
//! # Building HID Report Descriptors programmatically
//!
//! ```
//! # use hidtrack::hid::*;
//! # use hidtrack::types::*;
//! let rdesc: Vec<u8> = ReportDescriptorBuilder::new()
//!        .append(UsagePage(0x01))
//!        .append(UsageId(0x02))
//!        .open_collection(CollectionType::Application)
//!        .open_collection(CollectionType::Physical)
//!        .push()
//!        .append(LogicalMinimum(0))
//!        .append(LogicalMaximum(128))
//!        .pop()
//!        .append(ReportCount(2))
//!        .append(ReportSize(8))
//!        .append(UsageId(0x30))
//!        .append(UsageId(0x31))
//!        .input(DataItemFlags::VARIABLE)
//!        .close_collection()
//!        .close_collection()
//!        .build();
//! assert_eq!(rdesc.len(), 27);
//! ```
//!
//! The [ReportDescriptorBuilder] writes whatever it is given, unbalanced
//! collections included.

use crate::types::*;
use crate::unit::Unit;

/// Shortest little endian payload (1, 2 or 4 bytes) that holds a value.
struct HidBytes(Vec<u8>);

impl HidBytes {
    fn take(self) -> Vec<u8> {
        self.0
    }
}

impl From<u32> for HidBytes {
    fn from(value: u32) -> HidBytes {
        let bytes = value.to_le_bytes();
        let cutoff = match value {
            0..=255 => 1,
            256..=0xffff => 2,
            _ => 4,
        };
        HidBytes(bytes[0..cutoff].to_vec())
    }
}

impl From<i32> for HidBytes {
    fn from(value: i32) -> HidBytes {
        const MIN16: i32 = i16::MIN as i32;
        const MAX16: i32 = i16::MAX as i32;
        let bytes = match value {
            -128..=127 => (value as i8).to_le_bytes().to_vec(),
            MIN16..=MAX16 => (value as i16).to_le_bytes().to_vec(),
            _ => value.to_le_bytes().to_vec(),
        };
        HidBytes(bytes)
    }
}

/// The item type encoded in bits 2 and 3 of the item header, Section 6.2.2.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ItemClass {
    Main = 0,
    Global = 1,
    Local = 2,
    /// Reserved, also the class of a Long Item header.
    Reserved = 3,
}

impl From<u8> for ItemClass {
    fn from(v: u8) -> ItemClass {
        match v & 0b11 {
            0 => ItemClass::Main,
            1 => ItemClass::Global,
            2 => ItemClass::Local,
            _ => ItemClass::Reserved,
        }
    }
}

/// Main item tags, Section 6.2.2.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, num_enum::TryFromPrimitive)]
#[repr(u8)]
pub enum MainTag {
    Input = 0b1000,
    Output = 0b1001,
    Collection = 0b1010,
    Feature = 0b1011,
    EndCollection = 0b1100,
}

/// Global item tags, Section 6.2.2.7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, num_enum::TryFromPrimitive)]
#[repr(u8)]
pub enum GlobalTag {
    UsagePage = 0,
    LogicalMinimum = 1,
    LogicalMaximum = 2,
    PhysicalMinimum = 3,
    PhysicalMaximum = 4,
    UnitExponent = 5,
    Unit = 6,
    ReportSize = 7,
    ReportId = 8,
    ReportCount = 9,
    Push = 10,
    Pop = 11,
}

/// Local item tags, Section 6.2.2.8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, num_enum::TryFromPrimitive)]
#[repr(u8)]
pub enum LocalTag {
    Usage = 0,
    UsageMinimum = 1,
    UsageMaximum = 2,
    DesignatorIndex = 3,
    DesignatorMinimum = 4,
    DesignatorMaximum = 5,
    StringIndex = 7,
    StringMinimum = 8,
    StringMaximum = 9,
    Delimiter = 10,
}

/// The tag and class of a Long Item header (`0xFE`), Section 6.2.2.3.
const LONG_ITEM_TAG: u8 = 0b1111;

/// One item of a report descriptor: a 4-bit tag, the [ItemClass] and the
/// payload bytes.
///
/// Short items carry 0, 1, 2 or 4 payload bytes. Long items (tag 15, class
/// [ItemClass::Reserved]) are recognized and their payload kept as
/// `[bDataSize, bLongItemTag, data...]`, but nothing interprets them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedItem {
    tag: u8,
    class: ItemClass,
    data: Vec<u8>,
}

impl EncodedItem {
    /// An item without payload.
    pub fn new(class: ItemClass, tag: u8) -> Self {
        EncodedItem {
            tag: tag & 0xF,
            class,
            data: Vec::new(),
        }
    }

    pub fn main(tag: MainTag) -> Self {
        Self::new(ItemClass::Main, tag as u8)
    }

    pub fn global(tag: GlobalTag) -> Self {
        Self::new(ItemClass::Global, tag as u8)
    }

    pub fn local(tag: LocalTag) -> Self {
        Self::new(ItemClass::Local, tag as u8)
    }

    /// Sets the payload to the minimal unsigned encoding of `value`.
    pub fn with_data_value(mut self, value: u32) -> Self {
        self.data = HidBytes::from(value).take();
        self
    }

    /// Sets the payload to the minimal two's complement encoding of `value`.
    pub fn with_data_value_signed(mut self, value: i32) -> Self {
        self.data = HidBytes::from(value).take();
        self
    }

    /// Sets the payload bytes verbatim.
    pub fn with_data(mut self, data: &[u8]) -> Self {
        self.data = data.to_vec();
        self
    }

    /// The tag as shifted-down numeric value in the range 0..15.
    pub fn tag(&self) -> u8 {
        self.tag
    }

    pub fn class(&self) -> ItemClass {
        self.class
    }

    /// The payload bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// True for a Long Item, Section 6.2.2.3.
    pub fn is_long(&self) -> bool {
        self.tag == LONG_ITEM_TAG && self.class == ItemClass::Reserved && self.data.len() >= 2
    }

    /// The `bLongItemTag` of a Long Item.
    pub fn long_tag(&self) -> Option<u8> {
        if self.is_long() {
            Some(self.data[1])
        } else {
            None
        }
    }

    pub fn main_tag(&self) -> Option<MainTag> {
        match self.class {
            ItemClass::Main => MainTag::try_from(self.tag).ok(),
            _ => None,
        }
    }

    pub fn global_tag(&self) -> Option<GlobalTag> {
        match self.class {
            ItemClass::Global => GlobalTag::try_from(self.tag).ok(),
            _ => None,
        }
    }

    pub fn local_tag(&self) -> Option<LocalTag> {
        match self.class {
            ItemClass::Local => LocalTag::try_from(self.tag).ok(),
            _ => None,
        }
    }

    /// The payload as unsigned little endian value. Payloads longer than
    /// four bytes only contribute their first four bytes.
    pub fn data_value(&self) -> u32 {
        let mut v = [0u8; 4];
        let n = self.data.len().min(4);
        v[..n].copy_from_slice(&self.data[..n]);
        u32::from_le_bytes(v)
    }

    /// The payload sign-extended according to its width: 1 byte as `i8`,
    /// 2 bytes as `i16`, anything else as `i32`.
    pub fn data_value_signed(&self) -> i32 {
        let v = self.data_value();
        match self.data.len() {
            1 => (v as u8) as i8 as i32,
            2 => (v as u16) as i16 as i32,
            _ => v as i32,
        }
    }

    /// Decodes one item from the start of `bytes` and returns it along with
    /// the number of bytes consumed, or `None` if `bytes` is empty.
    ///
    /// A payload extending beyond the end of `bytes` is zero-padded, the
    /// consumed count only covers the bytes actually present.
    pub fn decode(bytes: &[u8]) -> Option<(EncodedItem, usize)> {
        let (&header, tail) = bytes.split_first()?;
        let size = match header & 0b11 {
            0 => 0,
            1 => 1,
            2 => 2,
            _ => 4,
        };
        let class = ItemClass::from(header >> 2);
        let tag = header >> 4;

        let mut data = vec![0u8; size];
        let avail = size.min(tail.len());
        data[..avail].copy_from_slice(&tail[..avail]);
        let mut consumed = 1 + avail;

        if tag == LONG_ITEM_TAG && class == ItemClass::Reserved && size == 2 {
            let long_size = usize::from(data[0]);
            let tail = &tail[avail..];
            let avail = long_size.min(tail.len());
            data.resize(2 + long_size, 0);
            data[2..2 + avail].copy_from_slice(&tail[..avail]);
            consumed += avail;
        }

        Some((EncodedItem { tag, class, data }, consumed))
    }

    /// Appends the encoded bytes of this item to `out`.
    ///
    /// Only short items with a payload of 0, 1, 2 or 4 bytes can be encoded.
    /// Long items and any other payload length are not supported and
    /// nothing is appended for them.
    pub fn encode(&self, out: &mut Vec<u8>) {
        if self.is_long() {
            return;
        }
        let size = match self.data.len() {
            0 => 0b00,
            1 => 0b01,
            2 => 0b10,
            4 => 0b11,
            _ => return,
        };
        out.push((self.tag << 4) | ((self.class as u8) << 2) | size);
        out.extend_from_slice(&self.data);
    }

    /// Returns the encoded bytes of this item, see [EncodedItem::encode].
    pub fn as_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(1 + self.data.len());
        self.encode(&mut bytes);
        bytes
    }
}

/// Iterator over the items of a report descriptor, yielding each item with
/// its byte offset. See [decode_items].
#[derive(Debug, Clone)]
pub struct Items<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl Iterator for Items<'_> {
    type Item = (usize, EncodedItem);

    fn next(&mut self) -> Option<Self::Item> {
        let (item, consumed) = EncodedItem::decode(&self.bytes[self.offset..])?;
        let offset = self.offset;
        self.offset += consumed;
        Some((offset, item))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.bytes.len() - self.offset;
        (usize::from(remaining > 0), Some(remaining))
    }
}

impl std::iter::FusedIterator for Items<'_> {}

/// Splits the HID Report Descriptor represented by `bytes` into its items.
/// Each call starts a new pass over the bytes.
pub fn decode_items(bytes: &[u8]) -> Items<'_> {
    Items { bytes, offset: 0 }
}

/// Serializes `items` into a report descriptor byte array, see
/// [EncodedItem::encode] for the items that cannot be encoded.
pub fn encode_items<'a>(items: impl IntoIterator<Item = &'a EncodedItem>) -> Vec<u8> {
    let mut bytes = Vec::new();
    items.into_iter().for_each(|item| item.encode(&mut bytes));
    bytes
}

impl From<UsagePage> for EncodedItem {
    fn from(usage_page: UsagePage) -> EncodedItem {
        EncodedItem::global(GlobalTag::UsagePage).with_data_value(u32::from(usage_page.0))
    }
}

impl From<LogicalMinimum> for EncodedItem {
    fn from(minimum: LogicalMinimum) -> EncodedItem {
        EncodedItem::global(GlobalTag::LogicalMinimum).with_data_value_signed(minimum.0)
    }
}

impl From<LogicalMaximum> for EncodedItem {
    fn from(maximum: LogicalMaximum) -> EncodedItem {
        EncodedItem::global(GlobalTag::LogicalMaximum).with_data_value_signed(maximum.0)
    }
}

impl From<PhysicalMinimum> for EncodedItem {
    fn from(minimum: PhysicalMinimum) -> EncodedItem {
        EncodedItem::global(GlobalTag::PhysicalMinimum).with_data_value_signed(minimum.0)
    }
}

impl From<PhysicalMaximum> for EncodedItem {
    fn from(maximum: PhysicalMaximum) -> EncodedItem {
        EncodedItem::global(GlobalTag::PhysicalMaximum).with_data_value_signed(maximum.0)
    }
}

impl From<UnitExponent> for EncodedItem {
    fn from(exponent: UnitExponent) -> EncodedItem {
        EncodedItem::global(GlobalTag::UnitExponent).with_data_value_signed(exponent.0)
    }
}

impl From<Unit> for EncodedItem {
    fn from(unit: Unit) -> EncodedItem {
        EncodedItem::global(GlobalTag::Unit).with_data_value(unit.raw())
    }
}

impl From<ReportSize> for EncodedItem {
    fn from(size: ReportSize) -> EncodedItem {
        EncodedItem::global(GlobalTag::ReportSize).with_data_value(size.0 as u32)
    }
}

impl From<ReportId> for EncodedItem {
    fn from(id: ReportId) -> EncodedItem {
        EncodedItem::global(GlobalTag::ReportId).with_data_value(u32::from(id.0))
    }
}

impl From<ReportCount> for EncodedItem {
    fn from(count: ReportCount) -> EncodedItem {
        EncodedItem::global(GlobalTag::ReportCount).with_data_value(count.0 as u32)
    }
}

impl From<UsageId> for EncodedItem {
    fn from(usage_id: UsageId) -> EncodedItem {
        EncodedItem::local(LocalTag::Usage).with_data_value(u32::from(usage_id.0))
    }
}

/// An extended usage always uses the 4-byte form so the Usage Page survives.
impl From<Usage> for EncodedItem {
    fn from(usage: Usage) -> EncodedItem {
        EncodedItem::local(LocalTag::Usage).with_data(&u32::from(usage).to_le_bytes())
    }
}

impl From<UsageMinimum> for EncodedItem {
    fn from(minimum: UsageMinimum) -> EncodedItem {
        EncodedItem::local(LocalTag::UsageMinimum).with_data_value(minimum.0)
    }
}

impl From<UsageMaximum> for EncodedItem {
    fn from(maximum: UsageMaximum) -> EncodedItem {
        EncodedItem::local(LocalTag::UsageMaximum).with_data_value(maximum.0)
    }
}

impl From<DesignatorIndex> for EncodedItem {
    fn from(index: DesignatorIndex) -> EncodedItem {
        EncodedItem::local(LocalTag::DesignatorIndex).with_data_value(index.0)
    }
}

impl From<DesignatorMinimum> for EncodedItem {
    fn from(minimum: DesignatorMinimum) -> EncodedItem {
        EncodedItem::local(LocalTag::DesignatorMinimum).with_data_value(minimum.0)
    }
}

impl From<DesignatorMaximum> for EncodedItem {
    fn from(maximum: DesignatorMaximum) -> EncodedItem {
        EncodedItem::local(LocalTag::DesignatorMaximum).with_data_value(maximum.0)
    }
}

impl From<StringIndex> for EncodedItem {
    fn from(index: StringIndex) -> EncodedItem {
        EncodedItem::local(LocalTag::StringIndex).with_data_value(index.0)
    }
}

impl From<StringMinimum> for EncodedItem {
    fn from(minimum: StringMinimum) -> EncodedItem {
        EncodedItem::local(LocalTag::StringMinimum).with_data_value(minimum.0)
    }
}

impl From<StringMaximum> for EncodedItem {
    fn from(maximum: StringMaximum) -> EncodedItem {
        EncodedItem::local(LocalTag::StringMaximum).with_data_value(maximum.0)
    }
}

impl From<Delimiter> for EncodedItem {
    fn from(delimiter: Delimiter) -> EncodedItem {
        EncodedItem::local(LocalTag::Delimiter).with_data_value(delimiter.0)
    }
}

impl From<CollectionType> for EncodedItem {
    fn from(collection: CollectionType) -> EncodedItem {
        EncodedItem::main(MainTag::Collection).with_data_value(u32::from(u8::from(collection)))
    }
}

/// Chained encoder for report descriptors.
///
/// ```
/// # use hidtrack::hid::*;
/// # use hidtrack::types::*;
/// let rdesc = ReportDescriptorBuilder::new()
///     .append(UsagePage(0x09))
///     .append(UsageMinimum(1))
///     .append(UsageMaximum(3))
///     .append(LogicalMinimum(0))
///     .append(LogicalMaximum(1))
///     .append(ReportSize(1))
///     .append(ReportCount(3))
///     .input(DataItemFlags::VARIABLE)
///     .build();
/// assert_eq!(rdesc, [0x05, 0x09, 0x19, 0x01, 0x29, 0x03, 0x15, 0x00,
///                    0x25, 0x01, 0x75, 0x01, 0x95, 0x03, 0x81, 0x02]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ReportDescriptorBuilder {
    items: Vec<EncodedItem>,
}

impl ReportDescriptorBuilder {
    /// Create a new builder
    pub fn new() -> ReportDescriptorBuilder {
        ReportDescriptorBuilder { items: Vec::new() }
    }

    /// Queues an item, it is encoded by [ReportDescriptorBuilder::build()].
    pub fn append(mut self, item: impl Into<EncodedItem>) -> Self {
        self.items.push(item.into());
        self
    }

    /// Appends a Usage Page item for a `hut` page.
    #[cfg(feature = "hut")]
    pub fn usage_page(self, usage_page: impl hut::AsUsagePage) -> Self {
        self.append(UsagePage(usage_page.usage_page_value()))
    }

    /// Appends a 16-bit Usage item for a `hut` usage. Only the Usage ID is
    /// written, the page in effect is whatever Usage Page came last.
    #[cfg(feature = "hut")]
    pub fn usage_id(self, usage: impl hut::AsUsage) -> Self {
        self.append(UsageId((usage.usage_value() & 0xFFFF) as u16))
    }

    /// Open a new collection. Nothing enforces a matching
    /// [close_collection()](Self::close_collection).
    pub fn open_collection(self, collection: CollectionType) -> Self {
        self.append(collection)
    }

    pub fn close_collection(self) -> Self {
        self.append(EncodedItem::main(MainTag::EndCollection))
    }

    /// Pushes the global state, use [pop()](Self::pop) to return to it.
    pub fn push(self) -> Self {
        self.append(EncodedItem::global(GlobalTag::Push))
    }

    pub fn pop(self) -> Self {
        self.append(EncodedItem::global(GlobalTag::Pop))
    }

    /// Opens a delimited set of alternate usages.
    pub fn open_delimiter(self) -> Self {
        self.append(Delimiter(1))
    }

    pub fn close_delimiter(self) -> Self {
        self.append(Delimiter(0))
    }

    /// Append an Input item with the given flags.
    pub fn input(self, flags: DataItemFlags) -> Self {
        self.append(EncodedItem::main(MainTag::Input).with_data_value(flags.bits()))
    }

    /// Append an Output item with the given flags.
    pub fn output(self, flags: DataItemFlags) -> Self {
        self.append(EncodedItem::main(MainTag::Output).with_data_value(flags.bits()))
    }

    /// Append a Feature item with the given flags.
    pub fn feature(self, flags: DataItemFlags) -> Self {
        self.append(EncodedItem::main(MainTag::Feature).with_data_value(flags.bits()))
    }

    /// The items appended so far.
    pub fn items(&self) -> &[EncodedItem] {
        &self.items
    }

    /// Encodes the queued items. Every payload uses the shortest width that
    /// holds its value, signed payloads (logical and physical bounds, unit
    /// exponent) are sized for two's complement so a Logical Maximum of 255
    /// takes two bytes.
    pub fn build(&self) -> Vec<u8> {
        encode_items(&self.items)
    }
}
