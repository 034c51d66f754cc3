// SPDX-License-Identifier: MIT

//! A collection of standalone HID types. Most are simple wrappers around their
//! underlying integer data type that exist for type safety when building
//! descriptors, the rest are the small enums and flag sets shared by the
//! descriptor tree and the report codec.
//!
//! In this document and unless stated otherwise, a reference to "Section a.b.c" refers to the
//! [HID Device Class Definition for HID 1.11](https://www.usb.org/document-library/device-class-definition-hid-111).

use bitflags::bitflags;

/// Declares a payload newtype around an integer, with conversions in both
/// directions and a `Display` that prints the bare number.
macro_rules! item_value {
    ($(#[$meta:meta])* $name:ident($inner:ty) $(, $extra:ident)*) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq $(, $extra)*)]
        pub struct $name(pub $inner);

        impl From<$name> for $inner {
            fn from(value: $name) -> $inner {
                value.0
            }
        }

        impl From<$inner> for $name {
            fn from(value: $inner) -> $name {
                $name(value)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// Global item payloads, Section 6.2.2.7

item_value!(UsagePage(u16), Hash, PartialOrd, Ord);
item_value!(LogicalMinimum(i32));
item_value!(LogicalMaximum(i32));
item_value!(PhysicalMinimum(i32));
item_value!(PhysicalMaximum(i32));
item_value!(
    /// The exponent as written into the descriptor, i.e. already in whatever
    /// encoding the caller chose (see [crate::unit::encode_exponent]).
    UnitExponent(i32)
);
item_value!(
    /// Bits per element.
    ReportSize(usize)
);
item_value!(ReportId(u8), Hash);
item_value!(
    /// Number of elements.
    ReportCount(usize)
);

// Local item payloads, Section 6.2.2.8

item_value!(
    /// A 16-bit Usage ID, extended with the current Usage Page by the parser.
    UsageId(u16),
    Hash,
    PartialOrd,
    Ord
);
item_value!(UsageMinimum(u32));
item_value!(UsageMaximum(u32));
item_value!(StringIndex(u32));
item_value!(StringMinimum(u32));
item_value!(StringMaximum(u32));
item_value!(DesignatorIndex(u32));
item_value!(DesignatorMinimum(u32));
item_value!(DesignatorMaximum(u32));
item_value!(
    /// 1 opens a delimited set, 0 closes it.
    Delimiter(u32)
);

/// A full 32-bit HID usage, the Usage Page in the upper 16 bits and the
/// Usage ID in the lower 16 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Usage {
    pub usage_page: UsagePage,
    pub usage_id: UsageId,
}

impl Usage {
    pub fn new(usage_page: u16, usage_id: u16) -> Self {
        Usage {
            usage_page: UsagePage(usage_page),
            usage_id: UsageId(usage_id),
        }
    }
}

impl From<u32> for Usage {
    fn from(value: u32) -> Usage {
        Usage::new((value >> 16) as u16, (value & 0xFFFF) as u16)
    }
}

impl From<Usage> for u32 {
    fn from(usage: Usage) -> u32 {
        (u32::from(usage.usage_page.0) << 16) | u32::from(usage.usage_id.0)
    }
}

impl std::fmt::Display for Usage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04x}:{:04x}", self.usage_page.0, self.usage_id.0)
    }
}

/// The type of a report, see Section 6.2.2.4. Input reports travel from the
/// device to the host, Output reports the other way, Feature reports either way.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ReportType {
    Input,
    Output,
    Feature,
}

impl std::fmt::Display for ReportType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ReportType::Input => "Input",
            ReportType::Output => "Output",
            ReportType::Feature => "Feature",
        };
        f.write_str(s)
    }
}

/// The type of a collection, see Section 6.2.2.6.
///
/// > A Collection item identifies a relationship between two or more data
/// > (Input, Output, or Feature.) For example, a mouse could be described as a
/// > collection of two to four data (x, y, button 1, button 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionType {
    Physical,
    Application,
    Logical,
    Report,
    NamedArray,
    UsageSwitch,
    UsageModifier,
    Reserved { value: u8 },
    VendorDefined { value: u8 },
}

impl From<&CollectionType> for u8 {
    fn from(c: &CollectionType) -> u8 {
        match c {
            CollectionType::Physical => 0x00,
            CollectionType::Application => 0x01,
            CollectionType::Logical => 0x02,
            CollectionType::Report => 0x03,
            CollectionType::NamedArray => 0x04,
            CollectionType::UsageSwitch => 0x05,
            CollectionType::UsageModifier => 0x06,
            CollectionType::Reserved { value } => *value,
            CollectionType::VendorDefined { value } => *value,
        }
    }
}

impl From<CollectionType> for u8 {
    fn from(c: CollectionType) -> u8 {
        u8::from(&c)
    }
}

impl From<u8> for CollectionType {
    fn from(v: u8) -> CollectionType {
        match v {
            0x00 => CollectionType::Physical,
            0x01 => CollectionType::Application,
            0x02 => CollectionType::Logical,
            0x03 => CollectionType::Report,
            0x04 => CollectionType::NamedArray,
            0x05 => CollectionType::UsageSwitch,
            0x06 => CollectionType::UsageModifier,
            value @ 0x07..=0x7f => CollectionType::Reserved { value },
            value @ 0x80..=0xff => CollectionType::VendorDefined { value },
        }
    }
}

bitflags! {
    /// The data flags of an Input, Output or Feature item, Section 6.2.2.5.
    ///
    /// Each bit has a zero meaning (data, array, absolute, ...) that is the
    /// absence of the flag here.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct DataItemFlags: u32 {
        const CONSTANT = 1 << 0;
        const VARIABLE = 1 << 1;
        const RELATIVE = 1 << 2;
        const WRAP = 1 << 3;
        const NONLINEAR = 1 << 4;
        const NO_PREFERRED = 1 << 5;
        const NULL_STATE = 1 << 6;
        /// Only meaningful for Output and Feature items, reserved for Input.
        const VOLATILE = 1 << 7;
        const BUFFERED_BYTES = 1 << 8;
    }
}

/// Flag accessors shared by everything that carries [DataItemFlags], Section
/// 6.2.2.5.
///
/// Each flag bit has a "set" and a "clear" meaning and both are spelled out
/// so call sites read naturally, e.g. `item.is_array()` rather than
/// `!item.is_variable()`.
pub trait MainDataItem {
    fn flags(&self) -> DataItemFlags;

    /// Padding or a fixed value, nothing to read.
    fn is_constant(&self) -> bool {
        self.flags().contains(DataItemFlags::CONSTANT)
    }

    fn is_data(&self) -> bool {
        !self.is_constant()
    }

    /// Each element is its own control.
    fn is_variable(&self) -> bool {
        self.flags().contains(DataItemFlags::VARIABLE)
    }

    /// Each element holds an index into the item's usages, the set of
    /// controls currently active.
    fn is_array(&self) -> bool {
        !self.is_variable()
    }

    /// Values are deltas to the previous report.
    fn is_relative(&self) -> bool {
        self.flags().contains(DataItemFlags::RELATIVE)
    }

    fn is_absolute(&self) -> bool {
        !self.is_relative()
    }

    /// Values roll over at the ends of the logical range.
    fn wraps(&self) -> bool {
        self.flags().contains(DataItemFlags::WRAP)
    }

    fn is_nonlinear(&self) -> bool {
        self.flags().contains(DataItemFlags::NONLINEAR)
    }

    /// The control does not spring back to a rest position.
    fn has_no_preferred_state(&self) -> bool {
        self.flags().contains(DataItemFlags::NO_PREFERRED)
    }

    /// Values outside the logical range mean "no value", e.g. a centred hat
    /// switch.
    fn has_null_state(&self) -> bool {
        self.flags().contains(DataItemFlags::NULL_STATE)
    }

    /// Output and Feature only: the device may change the value itself.
    fn is_volatile(&self) -> bool {
        self.flags().contains(DataItemFlags::VOLATILE)
    }

    fn is_buffered_bytes(&self) -> bool {
        self.flags().contains(DataItemFlags::BUFFERED_BYTES)
    }

    fn is_bitfield(&self) -> bool {
        !self.is_buffered_bytes()
    }
}

impl MainDataItem for DataItemFlags {
    fn flags(&self) -> DataItemFlags {
        *self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_split() {
        let usage = Usage::from(0x0001_0030);
        assert_eq!(usage.usage_page, UsagePage(0x1));
        assert_eq!(usage.usage_id, UsageId(0x30));
        assert_eq!(u32::from(usage), 0x0001_0030);
        assert_eq!(format!("{usage}"), "0001:0030");
    }

    #[test]
    fn collection_type() {
        for v in 0..=255u8 {
            assert_eq!(u8::from(CollectionType::from(v)), v);
        }
        assert_eq!(CollectionType::from(0x01), CollectionType::Application);
        assert!(matches!(
            CollectionType::from(0x80),
            CollectionType::VendorDefined { value: 0x80 }
        ));
    }

    #[test]
    fn flags() {
        let flags = DataItemFlags::from_bits_truncate(0b1_0100_0010);
        assert!(flags.is_data());
        assert!(flags.is_variable());
        assert!(flags.is_absolute());
        assert!(flags.has_null_state());
        assert!(flags.is_buffered_bytes());
        assert!(!flags.wraps());

        let flags = DataItemFlags::CONSTANT;
        assert!(flags.is_constant());
        assert!(flags.is_array());
        assert!(flags.is_bitfield());
    }
}
