// SPDX-License-Identifier: MIT

//! Change tracking for the Input reports of one device item.
//!
//! Every element with a one-to-one usage mapping gets a slot in a flat table:
//! an array item contributes one slot per usage (the slot holds the logical
//! value while that usage is selected), a variable item one slot per element.
//! Items without a 1:1 usage mapping, e.g. padding or a variable item with
//! fewer usages than elements, are not individually change-tracked.
//!
//! The tracker keeps the previous and the current value of every slot. Each
//! parsed report replaces the set of pending changes with the slots of that
//! report whose logical value differs from the previous report.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::report::{DataValue, Report};
use crate::tree::{DataItem, ItemId};
use crate::types::{MainDataItem, ReportType};
use crate::{ensure, HidError, ReportDescriptor, Result};

/// The slots belonging to one input report.
#[derive(Debug)]
struct ReportRange {
    /// Index into [ReportDescriptor::reports()]
    report: usize,
    start: usize,
    end: usize,
    /// First slot and slot count of each data item, `None` for untracked
    /// items
    item_slots: Vec<Option<(usize, usize)>>,
}

#[derive(Debug)]
struct State<'a> {
    previous: Vec<DataValue<'a>>,
    current: Vec<DataValue<'a>>,
    changes: VecDeque<usize>,
}

/// Number of tracked slots of a data item, zero if its usages do not map
/// one-to-one onto its values.
fn tracked_count(item: &DataItem) -> usize {
    let usages = item.usages().count();
    let expected = if item.is_array() {
        item.logical_range_count()
    } else {
        item.element_count()
    };
    if usages > 0 && usages == expected {
        usages
    } else {
        0
    }
}

/// The value a slot holds when nothing was reported: logical 0 for array
/// slots, one past the logical maximum for variables.
fn default_value(item: &DataItem, data_index: usize) -> DataValue<'_> {
    let logical = if item.is_array() {
        0
    } else {
        item.logical_maximum().saturating_add(1)
    };
    DataValue::new(item, data_index, logical)
}

/// Upper bound on the elements one [DeviceItemInputParser] tracks across
/// all Input reports of its device item.
pub const MAX_TRACKED_VALUES: usize = 1 << 20;

/// Tracks the values of a device item's Input reports across reports.
///
/// All methods take `&self` and serialize on one internal lock, the tracker
/// can be shared between one producer feeding reports and any number of
/// consumers draining changes.
///
/// ```
/// # use hidtrack::*;
/// # use hidtrack::hid::ReportDescriptorBuilder;
/// # fn main() -> hidtrack::Result<()> {
/// let bytes = ReportDescriptorBuilder::new()
///     .append(UsagePage(0x09))
///     .append(UsageId(0x01))
///     .open_collection(CollectionType::Application)
///     .append(UsageMinimum(1))
///     .append(UsageMaximum(8))
///     .append(LogicalMaximum(1))
///     .append(ReportSize(1))
///     .append(ReportCount(8))
///     .input(DataItemFlags::VARIABLE)
///     .close_collection()
///     .build();
/// let rdesc = ReportDescriptor::parse(&bytes)?;
/// let parser = rdesc.input_parser(rdesc.device_item_ids()[0])?;
/// assert_eq!(parser.value_count(), 8);
///
/// parser.try_parse(&[0x00, 0x00])?;
/// parser.try_parse(&[0x00, 0b0000_0100])?;
/// assert_eq!(parser.next_changed_index(), Some(2));
/// assert_eq!(parser.value(2).unwrap().usages().next(), Some(0x0009_0003));
/// assert!(!parser.has_changed());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct DeviceItemInputParser<'a> {
    descriptor: &'a ReportDescriptor,
    device: ItemId,
    ranges: HashMap<u8, ReportRange>,
    defaults: Vec<DataValue<'a>>,
    state: Mutex<State<'a>>,
}

impl<'a> DeviceItemInputParser<'a> {
    /// Builds the slot table for the Input reports of `device`.
    ///
    /// Fails with [HidError::InvalidArgument] if there is no node `device`
    /// and [HidError::InvalidOperation] if the node is not a device item.
    /// Fails with [HidError::OutOfRange] if the Input reports declare more
    /// than [MAX_TRACKED_VALUES] tracked elements.
    pub fn new(descriptor: &'a ReportDescriptor, device: ItemId) -> Result<Self> {
        let node = descriptor
            .node(device)
            .ok_or_else(|| HidError::InvalidArgument {
                message: format!("No descriptor item {}", device.index()),
            })?;
        let device_item = node.as_device().ok_or_else(|| HidError::InvalidOperation {
            message: format!("Descriptor item {} is not a device item", device.index()),
        })?;

        let input_reports = move || {
            device_item
                .reports()
                .iter()
                .map(move |&index| (index, &descriptor.reports()[index]))
                .filter(|(_, report)| report.report_type() == ReportType::Input)
        };
        let total = input_reports()
            .flat_map(|(_, report)| report.data_items())
            .fold(0usize, |total, item| total.saturating_add(tracked_count(item)));
        ensure!(
            total <= MAX_TRACKED_VALUES,
            HidError::OutOfRange {
                value: i64::try_from(total).unwrap_or(i64::MAX),
                min: 0,
                max: MAX_TRACKED_VALUES as i64,
            }
        );

        let mut ranges = HashMap::new();
        let mut defaults = Vec::new();
        defaults
            .try_reserve_exact(total)
            .map_err(|e| HidError::InvalidArgument {
                message: format!("Cannot allocate {total} tracked values: {e}"),
            })?;
        for (index, report) in input_reports() {
            let start = defaults.len();
            let item_slots = report
                .data_items()
                .iter()
                .map(|item| match tracked_count(item) {
                    0 => None,
                    n => {
                        let base = defaults.len();
                        defaults.extend((0..n).map(|i| default_value(item, i)));
                        Some((base, n))
                    }
                })
                .collect();
            ranges.insert(
                report.report_id(),
                ReportRange {
                    report: index,
                    start,
                    end: defaults.len(),
                    item_slots,
                },
            );
        }

        debug!(
            "Input parser for device item {}: {} reports, {} tracked values",
            device.index(),
            ranges.len(),
            defaults.len()
        );

        let state = State {
            previous: defaults.clone(),
            current: defaults.clone(),
            changes: VecDeque::new(),
        };
        Ok(DeviceItemInputParser {
            descriptor,
            device,
            ranges,
            defaults,
            state: Mutex::new(state),
        })
    }

    /// The device item this parser tracks.
    pub fn device(&self) -> ItemId {
        self.device
    }

    /// Parses an Input report buffer for `report`, the first byte of
    /// `buffer` being the Report ID.
    ///
    /// Returns `Ok(false)` without touching any state if `report` is not an
    /// Input report of this device item. Fails if the buffer does not match
    /// the report, see [Report::read].
    pub fn try_parse_report(&self, buffer: &[u8], report: &Report) -> Result<bool> {
        if report.report_type() != ReportType::Input {
            return Ok(false);
        }
        let Some(range) = self.ranges.get(&report.report_id()) else {
            return Ok(false);
        };
        let report = &self.descriptor.reports()[range.report];

        let mut values = self.defaults[range.start..range.end].to_vec();
        report.read_values(buffer, |index, value| {
            if let Some((base, count)) = range.item_slots[index] {
                if value.data_index() < count {
                    values[base - range.start + value.data_index()] = value;
                }
            }
        })?;

        let mut state = self.state.lock();
        let State {
            previous,
            current,
            changes,
        } = &mut *state;
        previous[range.start..range.end].copy_from_slice(&current[range.start..range.end]);
        current[range.start..range.end].copy_from_slice(&values);
        changes.clear();
        changes.extend(
            (range.start..range.end).filter(|&i| previous[i].logical() != current[i].logical()),
        );

        trace!(
            "Input report {} parsed, {} changed values",
            report.report_id(),
            changes.len()
        );
        Ok(true)
    }

    /// Parses an Input report buffer, looking up the report by the Report ID
    /// in the first byte. See [DeviceItemInputParser::try_parse_report].
    pub fn try_parse(&self, buffer: &[u8]) -> Result<bool> {
        ensure!(
            !buffer.is_empty(),
            HidError::InvalidArgument {
                message: "Empty report buffer".to_string(),
            }
        );
        match self.ranges.get(&buffer[0]) {
            Some(range) => self.try_parse_report(buffer, &self.descriptor.reports()[range.report]),
            None => Ok(false),
        }
    }

    /// Takes the next changed slot index off the queue.
    pub fn next_changed_index(&self) -> Option<usize> {
        self.state.lock().changes.pop_front()
    }

    /// True if there are changes left to drain.
    pub fn has_changed(&self) -> bool {
        !self.state.lock().changes.is_empty()
    }

    /// The current value of slot `index`.
    pub fn value(&self, index: usize) -> Option<DataValue<'a>> {
        self.state.lock().current.get(index).copied()
    }

    /// The value of slot `index` before the last report that touched it.
    pub fn previous_value(&self, index: usize) -> Option<DataValue<'a>> {
        self.state.lock().previous.get(index).copied()
    }

    /// The number of tracked slots.
    pub fn value_count(&self) -> usize {
        self.defaults.len()
    }
}
