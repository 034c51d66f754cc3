// SPDX-License-Identifier: MIT

//! Conversions between the raw bits of a report field, its logical value,
//! its position in the item's index table and its physical value.
//!
//! A logical value outside the item's logical range has no physical meaning
//! and converts to `NaN`.

use crate::tree::DataItem;

/// Sign-extends the low `bits` bits of `raw`.
pub fn sign_extend(raw: u32, bits: usize) -> i32 {
    match bits {
        0 => 0,
        1..=31 => {
            let shift = 32 - bits as u32;
            ((raw << shift) as i32) >> shift
        }
        _ => raw as i32,
    }
}

/// Masks `value` to its low `bits` bits.
pub fn truncate(value: u32, bits: usize) -> u32 {
    match bits {
        0 => 0,
        1..=31 => value & ((1u32 << bits) - 1),
        _ => value,
    }
}

/// The logical value of the raw field bits, sign-extended if the item's
/// logical range is signed.
pub fn logical_from_raw(item: &DataItem, raw: u32) -> i32 {
    let bits = item.element_bits().min(32);
    if item.is_logical_signed() {
        sign_extend(raw, bits)
    } else {
        truncate(raw, bits) as i32
    }
}

/// The raw field bits for a logical value, truncated to the element width.
pub fn raw_from_logical(item: &DataItem, logical: i32) -> u32 {
    truncate(logical as u32, item.element_bits().min(32))
}

/// The position in the item's index table for an array value, `None` if
/// `logical` is outside the logical range.
pub fn data_index_from_logical(item: &DataItem, logical: i32) -> Option<usize> {
    if (item.logical_minimum()..=item.logical_maximum()).contains(&logical) {
        Some((i64::from(logical) - i64::from(item.logical_minimum())) as usize)
    } else {
        None
    }
}

pub fn logical_from_data_index(item: &DataItem, data_index: usize) -> Option<i32> {
    if data_index < item.logical_range_count() {
        i32::try_from(i64::from(item.logical_minimum()) + data_index as i64).ok()
    } else {
        None
    }
}

/// Linear interpolation of `logical` into the physical range.
pub fn physical_from_logical(item: &DataItem, logical: i32) -> f64 {
    let (lmin, lmax) = (item.logical_minimum(), item.logical_maximum());
    if !(lmin..=lmax).contains(&logical) {
        return f64::NAN;
    }
    let (pmin, pmax) = (item.physical_minimum(), item.physical_maximum());
    if lmin == lmax {
        return pmin;
    }
    let span = f64::from(lmax) - f64::from(lmin);
    pmin + (f64::from(logical) - f64::from(lmin)) * (pmax - pmin) / span
}

/// The logical value nearest to `physical`, `None` if that value falls
/// outside the logical range.
pub fn logical_from_physical(item: &DataItem, physical: f64) -> Option<i32> {
    let (lmin, lmax) = (item.logical_minimum(), item.logical_maximum());
    let (pmin, pmax) = (item.physical_minimum(), item.physical_maximum());
    if physical.is_nan() || lmin > lmax {
        return None;
    }
    if pmin == pmax {
        return (physical == pmin).then_some(lmin);
    }
    let logical = (f64::from(lmin)
        + (physical - pmin) * (f64::from(lmax) - f64::from(lmin)) / (pmax - pmin))
        .round();
    if logical >= f64::from(lmin) && logical <= f64::from(lmax) {
        Some(logical as i32)
    } else {
        None
    }
}

/// Position of `logical` within the logical range as a value in `0.0..=1.0`,
/// `NaN` outside the range.
pub fn fraction_from_logical(item: &DataItem, logical: i32) -> f64 {
    let (lmin, lmax) = (item.logical_minimum(), item.logical_maximum());
    if !(lmin..=lmax).contains(&logical) {
        return f64::NAN;
    }
    if lmin == lmax {
        return 0.0;
    }
    (f64::from(logical) - f64::from(lmin)) / (f64::from(lmax) - f64::from(lmin))
}
