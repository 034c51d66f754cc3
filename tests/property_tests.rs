//! Property-based tests for the report codec, the numeric conversions and the
//! descriptor parser.

use hidtrack::convert;
use hidtrack::unit::{decode_exponent, encode_exponent};
use hidtrack::*;
use proptest::prelude::*;

/// Strategy: an element width and a signed value that fits it.
fn arb_signed() -> impl Strategy<Value = (usize, i32)> {
    (2usize..=32).prop_flat_map(|bits| {
        let min = -(1i64 << (bits - 1));
        let max = (1i64 << (bits - 1)) - 1;
        (Just(bits), (min..=max).prop_map(|v| v as i32))
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Writing raw bits then reading them back yields the value truncated to
    /// the element width, wherever the element sits in the buffer.
    #[test]
    fn prop_raw_bits_roundtrip(
        bits in 1usize..=32,
        value in any::<u32>(),
        bit_offset in 0usize..16,
        element in 0usize..4,
    ) {
        let item = DataItem::new(4, bits, DataItemFlags::VARIABLE);
        let mut buffer = vec![0u8; (bit_offset + 4 * bits).div_ceil(8)];
        let value = convert::truncate(value, bits);
        item.write_raw(&mut buffer, bit_offset, element, value);
        prop_assert_eq!(item.read_raw(&buffer, bit_offset, element), value);

        // nothing outside the element was touched
        let other = (element + 1) % 4;
        prop_assert_eq!(item.read_raw(&buffer, bit_offset, other), 0);
    }

    /// Signed logical values survive the conversion to raw bits and back.
    #[test]
    fn prop_signed_roundtrip((bits, logical) in arb_signed()) {
        let min = (-(1i64 << (bits - 1))) as i32;
        let max = ((1i64 << (bits - 1)) - 1) as i32;
        let item = DataItem::new(1, bits, DataItemFlags::VARIABLE).with_logical_range(min, max);
        let raw = convert::raw_from_logical(&item, logical);
        prop_assert_eq!(convert::logical_from_raw(&item, raw), logical);
    }

    /// An identity physical range maps every logical value onto itself and
    /// everything outside the range onto NaN.
    #[test]
    fn prop_identity_physical_scale(logical in -300i32..600) {
        let item = DataItem::new(1, 8, DataItemFlags::VARIABLE)
            .with_logical_range(0, 255)
            .with_physical_range(0, 255);
        let physical = convert::physical_from_logical(&item, logical);
        if (0..=255).contains(&logical) {
            prop_assert_eq!(physical, f64::from(logical));
        } else {
            prop_assert!(physical.is_nan(), "{logical} must map to NaN, got {physical}");
        }
    }

    /// Unit exponents survive encoding into a nibble and back.
    #[test]
    fn prop_unit_exponent_roundtrip(exponent in -8i32..=7) {
        let nibble = encode_exponent(exponent).map_err(|e| TestCaseError::fail(format!("{e:?}")))?;
        prop_assert!(nibble <= 0xF);
        prop_assert_eq!(decode_exponent(nibble), Ok(exponent));
    }

    /// Exponents outside -8..=7 are rejected.
    #[test]
    fn prop_unit_exponent_out_of_range(exponent in prop_oneof![i32::MIN..-8, 8..i32::MAX]) {
        let is_out_of_range = matches!(encode_exponent(exponent), Err(HidError::OutOfRange { .. }));
        prop_assert!(is_out_of_range);
    }

    /// Any byte soup parses without panicking when anomalies are skipped and
    /// never exceeds the buffer when it is rejected.
    #[test]
    fn prop_parse_arbitrary_bytes(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
        let rdesc = ReportDescriptor::parse(&bytes);
        prop_assert!(rdesc.is_ok(), "parse must succeed for {:02x?}", bytes);

        let reject = ParseOptions::new().structure(StructurePolicy::Reject);
        if let Err(HidError::Structure { offset, .. }) = ReportDescriptor::parse_with(&bytes, &reject) {
            prop_assert!(offset <= bytes.len());
        }
    }

    /// Variable values written through the report codec read back unchanged.
    #[test]
    fn prop_report_values_roundtrip(values in proptest::collection::vec(-128i32..=127, 1..8)) {
        let mut report = Report::new(ReportType::Input, 7);
        report.push_data_item(DataItem::new(1, 3, DataItemFlags::CONSTANT));
        report.push_data_item(
            DataItem::new(values.len(), 8, DataItemFlags::VARIABLE).with_logical_range(-128, 127),
        );
        let bytes = report.write_values(|_, element| values.get(element).copied());
        prop_assert_eq!(bytes.len(), report.length());

        let mut read = vec![];
        report
            .read_values(&bytes, |index, v| if index == 1 { read.push(v.logical()) })
            .map_err(|e| TestCaseError::fail(format!("{e:?}")))?;
        prop_assert_eq!(read, values);
    }
}

#[test]
fn unit_exponent_edges() {
    assert_eq!(decode_exponent(15), Ok(-1));
    assert!(matches!(
        encode_exponent(8),
        Err(HidError::OutOfRange { value: 8, .. })
    ));
    assert!(decode_exponent(16).is_err());
}
