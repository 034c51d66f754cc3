// SPDX-License-Identifier: MIT

//! Reading and writing report buffers.
//!
//! A report buffer always starts with the Report ID byte, even for devices
//! that do not use report IDs (where it is zero). The data items follow
//! starting at bit 8, packed back to back in descriptor order, each element
//! least significant bit first.
//!
//! ```
//! # use hidtrack::*;
//! # fn main() -> hidtrack::Result<()> {
//! let mut report = Report::new(ReportType::Input, 1);
//! report.push_data_item(
//!     DataItem::new(2, 4, DataItemFlags::VARIABLE).with_logical_range(-8, 7),
//! );
//! assert_eq!(report.length(), 2);
//!
//! let bytes = report.write_values(|_, element| Some(if element == 0 { -1 } else { 3 }));
//! assert_eq!(bytes, [0x01, 0x3f]);
//!
//! let mut values = vec![];
//! report.read_values(&bytes, |_, v| values.push(v.logical()))?;
//! assert_eq!(values, [-1, 3]);
//! # Ok(())
//! # }
//! ```

use crate::convert;
use crate::tree::DataItem;
use crate::types::{MainDataItem, ReportType};
use crate::{ensure, HidError, Result};

/// One report of a given type and ID and the data items in it.
#[derive(Clone, Debug, PartialEq)]
pub struct Report {
    report_id: u8,
    report_type: ReportType,
    data_items: Vec<DataItem>,
}

impl Report {
    pub fn new(report_type: ReportType, report_id: u8) -> Self {
        Report {
            report_id,
            report_type,
            data_items: Vec::new(),
        }
    }

    /// Appends a data item after all existing ones.
    pub fn push_data_item(&mut self, item: DataItem) -> usize {
        self.data_items.push(item);
        self.data_items.len() - 1
    }

    /// The Report ID, zero if the device does not use report IDs.
    pub fn report_id(&self) -> u8 {
        self.report_id
    }

    pub fn report_type(&self) -> ReportType {
        self.report_type
    }

    pub fn data_items(&self) -> &[DataItem] {
        &self.data_items
    }

    pub fn total_bits(&self) -> usize {
        self.data_items
            .iter()
            .fold(0, |bits: usize, item| bits.saturating_add(item.total_bits()))
    }

    /// The length of the report in bytes, including the Report ID byte.
    pub fn length(&self) -> usize {
        self.total_bits().div_ceil(8).saturating_add(1)
    }

    fn check_buffer(&self, buffer: &[u8]) -> Result<()> {
        ensure!(
            buffer.len() >= self.length(),
            HidError::InvalidArgument {
                message: format!(
                    "Report buffer is {} bytes, expected at least {}",
                    buffer.len(),
                    self.length()
                ),
            }
        );
        ensure!(
            buffer[0] == self.report_id,
            HidError::ReportIdMismatch {
                expected: self.report_id,
                actual: buffer[0],
            }
        );
        Ok(())
    }

    /// Calls `f` with the buffer, the bit offset, the item and its index for
    /// every data item in this report.
    ///
    /// Fails with [HidError::InvalidArgument] if the buffer is shorter than
    /// [Report::length] and with [HidError::ReportIdMismatch] if its first
    /// byte is not this report's ID. The callback is not invoked in either
    /// case.
    pub fn read<F>(&self, buffer: &[u8], mut f: F) -> Result<()>
    where
        F: FnMut(&[u8], usize, &DataItem, usize),
    {
        self.check_buffer(buffer)?;
        let mut bit_offset = 8;
        for (index, item) in self.data_items.iter().enumerate() {
            f(buffer, bit_offset, item, index);
            bit_offset += item.total_bits();
        }
        Ok(())
    }

    /// Like [Report::read] but hands out each element's [DataValue] along
    /// with the index of its data item. Array slots without a valid
    /// selection are skipped.
    pub fn read_values<'r, F>(&'r self, buffer: &[u8], mut f: F) -> Result<()>
    where
        F: FnMut(usize, DataValue<'r>),
    {
        self.check_buffer(buffer)?;
        let mut bit_offset = 8;
        for (index, item) in self.data_items.iter().enumerate() {
            for element in 0..item.element_count() {
                if let Some(value) = item.try_read_value(buffer, bit_offset, element) {
                    f(index, value);
                }
            }
            bit_offset += item.total_bits();
        }
        Ok(())
    }

    /// Allocates a zeroed buffer of [Report::length] bytes with the Report
    /// ID set and calls `f` for every data item so it can fill in the
    /// fields.
    ///
    /// # Panics
    ///
    /// The allocation failure handler runs (aborting the process) if the
    /// report length cannot be allocated, which a descriptor declaring huge
    /// Report Size and Report Count values can cause. Use
    /// [Report::try_write] for reports from untrusted descriptors.
    pub fn write<F>(&self, f: F) -> Vec<u8>
    where
        F: FnMut(&mut [u8], usize, &DataItem, usize),
    {
        self.fill(vec![0u8; self.length()], f)
    }

    /// Like [Report::write] but fails with [HidError::InvalidArgument] if
    /// the buffer cannot be allocated.
    pub fn try_write<F>(&self, f: F) -> Result<Vec<u8>>
    where
        F: FnMut(&mut [u8], usize, &DataItem, usize),
    {
        let length = self.length();
        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(length)
            .map_err(|e| HidError::InvalidArgument {
                message: format!("Cannot allocate a {length} byte report: {e}"),
            })?;
        buffer.resize(length, 0);
        Ok(self.fill(buffer, f))
    }

    fn fill<F>(&self, mut buffer: Vec<u8>, mut f: F) -> Vec<u8>
    where
        F: FnMut(&mut [u8], usize, &DataItem, usize),
    {
        buffer[0] = self.report_id;
        let mut bit_offset = 8;
        for (index, item) in self.data_items.iter().enumerate() {
            f(&mut buffer, bit_offset, item, index);
            bit_offset += item.total_bits();
        }
        buffer
    }

    /// Like [Report::write] but asks `f` for the logical value of each
    /// element of each non-constant data item. Elements for which `f`
    /// returns `None` stay zero. Allocation failure is handled as in
    /// [Report::write].
    pub fn write_values<F>(&self, mut f: F) -> Vec<u8>
    where
        F: FnMut(&DataItem, usize) -> Option<i32>,
    {
        self.write(|buffer, bit_offset, item, _| {
            if item.is_constant() {
                return;
            }
            for element in 0..item.element_count() {
                if let Some(logical) = f(item, element) {
                    item.write_logical(buffer, bit_offset, element, logical);
                }
            }
        })
    }
}

impl DataItem {
    /// Reads the raw bits of element `element` of this item, where the item
    /// starts at `bit_offset` in `buffer`. At most 32 bits are read.
    ///
    /// # Panics
    ///
    /// Panics if the element extends beyond the end of `buffer`.
    pub fn read_raw(&self, buffer: &[u8], bit_offset: usize, element: usize) -> u32 {
        let bits = self.element_bits().min(32);
        let start = bit_offset + element * self.element_bits();
        (0..bits).fold(0u32, |value, i| {
            let pos = start + i;
            let bit = (buffer[pos >> 3] >> (pos & 7)) & 1;
            value | (u32::from(bit) << i)
        })
    }

    /// Writes the low bits of `value` into element `element`, the inverse
    /// of [DataItem::read_raw].
    ///
    /// # Panics
    ///
    /// Panics if the element extends beyond the end of `buffer`.
    pub fn write_raw(&self, buffer: &mut [u8], bit_offset: usize, element: usize, value: u32) {
        let bits = self.element_bits().min(32);
        let start = bit_offset + element * self.element_bits();
        for i in 0..bits {
            let pos = start + i;
            let mask = 1u8 << (pos & 7);
            if (value >> i) & 1 == 1 {
                buffer[pos >> 3] |= mask;
            } else {
                buffer[pos >> 3] &= !mask;
            }
        }
    }

    /// See [DataItem::read_raw], the value is sign-extended for a signed
    /// logical range.
    pub fn read_logical(&self, buffer: &[u8], bit_offset: usize, element: usize) -> i32 {
        convert::logical_from_raw(self, self.read_raw(buffer, bit_offset, element))
    }

    pub fn write_logical(&self, buffer: &mut [u8], bit_offset: usize, element: usize, logical: i32) {
        self.write_raw(
            buffer,
            bit_offset,
            element,
            convert::raw_from_logical(self, logical),
        );
    }

    /// Reads element `element` as a [DataValue].
    ///
    /// For an array item the value selects an entry of the index table and
    /// a value outside the logical range means "nothing selected", in which
    /// case this returns `None`. Variable items always return a value.
    ///
    /// # Panics
    ///
    /// Panics if the element extends beyond the end of `buffer`.
    pub fn try_read_value(
        &self,
        buffer: &[u8],
        bit_offset: usize,
        element: usize,
    ) -> Option<DataValue<'_>> {
        let logical = self.read_logical(buffer, bit_offset, element);
        let data_index = if self.is_array() {
            convert::data_index_from_logical(self, logical)?
        } else {
            element
        };
        Some(DataValue::new(self, data_index, logical))
    }
}

/// A logical value read from (or destined for) one element of a
/// [DataItem].
///
/// For variable items the `data_index` is the element index, for array
/// items it is the selected entry of the item's index table.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DataValue<'a> {
    item: &'a DataItem,
    data_index: usize,
    logical: i32,
}

impl<'a> DataValue<'a> {
    pub fn new(item: &'a DataItem, data_index: usize, logical: i32) -> Self {
        DataValue {
            item,
            data_index,
            logical,
        }
    }

    pub fn item(&self) -> &'a DataItem {
        self.item
    }

    pub fn data_index(&self) -> usize {
        self.data_index
    }

    pub fn logical(&self) -> i32 {
        self.logical
    }

    /// The value scaled into the physical range, `NaN` if the logical value
    /// is out of range.
    pub fn physical_value(&self) -> f64 {
        convert::physical_from_logical(self.item, self.logical)
    }

    /// The value within the logical range as `0.0..=1.0`, `NaN` if out of
    /// range.
    pub fn fraction(&self) -> f64 {
        convert::fraction_from_logical(self.item, self.logical)
    }

    /// True if the value is outside the logical range, i.e. the control is
    /// in its null state or has not reported a value.
    pub fn is_null(&self) -> bool {
        !(self.item.logical_minimum()..=self.item.logical_maximum()).contains(&self.logical)
    }

    /// The usages associated with this value's data index.
    pub fn usages(&self) -> impl Iterator<Item = u32> + 'a {
        self.item.usages().values_from_index(self.data_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexes::{IndexRange, Indexes};
    use crate::types::DataItemFlags;

    fn buttons() -> Report {
        let mut report = Report::new(ReportType::Input, 0);
        report.push_data_item(
            DataItem::new(3, 1, DataItemFlags::VARIABLE)
                .with_logical_range(0, 1)
                .with_usages(Indexes::Range(IndexRange::new(0x0009_0001, 0x0009_0003))),
        );
        report.push_data_item(DataItem::new(1, 5, DataItemFlags::CONSTANT));
        report.push_data_item(
            DataItem::new(2, 8, DataItemFlags::VARIABLE | DataItemFlags::RELATIVE)
                .with_logical_range(-127, 127),
        );
        report
    }

    #[test]
    fn length() {
        let report = buttons();
        assert_eq!(report.total_bits(), 24);
        assert_eq!(report.length(), 4);

        let mut report = Report::new(ReportType::Feature, 2);
        assert_eq!(report.length(), 1);
        report.push_data_item(DataItem::new(1, 12, DataItemFlags::VARIABLE));
        assert_eq!(report.length(), 3);
    }

    #[test]
    fn read_bits() {
        let report = buttons();
        let buffer = [0x00, 0b0000_0101, 0xff, 0x05];
        let mut offsets = vec![];
        report
            .read(&buffer, |_, bit_offset, _, index| offsets.push((index, bit_offset)))
            .unwrap();
        assert_eq!(offsets, [(0, 8), (1, 11), (2, 16)]);

        let mut values = vec![];
        report
            .read_values(&buffer, |index, v| {
                values.push((index, v.data_index(), v.logical()))
            })
            .unwrap();
        assert_eq!(
            values,
            [
                (0, 0, 1),
                (0, 1, 0),
                (0, 2, 1),
                (1, 0, 0),
                (2, 0, -1),
                (2, 1, 5)
            ]
        );
    }

    #[test]
    fn read_errors() {
        let report = buttons();
        assert!(matches!(
            report.read(&[0x00, 0x00], |_, _, _, _| panic!("must not be called")),
            Err(HidError::InvalidArgument { .. })
        ));
        assert_eq!(
            report.read(&[0x01, 0x00, 0x00, 0x00], |_, _, _, _| {}),
            Err(HidError::ReportIdMismatch {
                expected: 0,
                actual: 1
            })
        );
    }

    #[test]
    fn write_then_read() {
        let report = buttons();
        let bytes = report.write_values(|item, element| match item.element_bits() {
            1 => Some((element % 2) as i32),
            _ => Some(-2),
        });
        assert_eq!(bytes, [0x00, 0b0000_0010, 0xfe, 0xfe]);

        let raw = report.write(|buffer, bit_offset, item, index| {
            if index == 2 {
                item.write_raw(buffer, bit_offset, 1, 0x1ff);
            }
        });
        assert_eq!(raw, [0x00, 0x00, 0x00, 0xff]);
    }

    #[test]
    fn try_write() {
        let report = buttons();
        let written = report
            .try_write(|buffer, bit_offset, item, index| {
                if index == 0 {
                    item.write_raw(buffer, bit_offset, 2, 1);
                }
            })
            .unwrap();
        assert_eq!(written, [0x00, 0b0000_0100, 0x00, 0x00]);

        // over two exabytes
        #[cfg(target_pointer_width = "64")]
        {
            let mut huge = Report::new(ReportType::Output, 3);
            huge.push_data_item(DataItem::new(0xffff_ffff, 0xffff_ffff, DataItemFlags::VARIABLE));
            assert!(matches!(
                huge.try_write(|_, _, _, _| panic!("must not be called")),
                Err(HidError::InvalidArgument { .. })
            ));
        }
    }

    #[test]
    fn unaligned_bits() {
        let item = DataItem::new(2, 12, DataItemFlags::VARIABLE);
        let mut buffer = [0u8; 5];
        item.write_raw(&mut buffer, 4, 0, 0xabc);
        item.write_raw(&mut buffer, 4, 1, 0x123);
        assert_eq!(buffer, [0xc0, 0xab, 0x23, 0x01, 0x00]);
        assert_eq!(item.read_raw(&buffer, 4, 0), 0xabc);
        assert_eq!(item.read_raw(&buffer, 4, 1), 0x123);
    }

    #[test]
    fn array_without_selection() {
        let item = DataItem::new(2, 8, DataItemFlags::empty())
            .with_logical_range(1, 3)
            .with_usages(Indexes::Range(IndexRange::new(0x0009_0001, 0x0009_0003)));
        let buffer = [0x00, 0x00, 0x03];
        assert!(item.try_read_value(&buffer, 8, 0).is_none());

        let value = item.try_read_value(&buffer, 8, 1).unwrap();
        assert_eq!(value.data_index(), 2);
        assert_eq!(value.logical(), 3);
        assert_eq!(value.usages().collect::<Vec<_>>(), [0x0009_0003]);
    }

    #[test]
    fn data_value() {
        let item = DataItem::new(1, 8, DataItemFlags::VARIABLE)
            .with_logical_range(0, 200)
            .with_physical_range(0, 20);
        let value = DataValue::new(&item, 0, 100);
        assert_eq!(value.physical_value(), 10.0);
        assert_eq!(value.fraction(), 0.5);
        assert!(!value.is_null());

        let null = DataValue::new(&item, 0, 201);
        assert!(null.is_null());
        assert!(null.physical_value().is_nan());
    }
}
