// SPDX-License-Identifier: MIT

// One test per descriptor in tests/data, generated by build.rs
include!(concat!(env!("OUT_DIR"), "/test-report-descriptors.rs"));

fn load(name: &str) -> ReportDescriptor {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/data/");
    let bytes = std::fs::read(format!("{path}{name}")).unwrap();
    ReportDescriptor::parse(&bytes).unwrap()
}

#[test]
fn logitech_style_mouse() {
    let rdesc = load("mouse.hid.bin");
    assert!(!rdesc.reports_use_id());
    assert_eq!(rdesc.device_items().count(), 1);
    assert_eq!(rdesc.max_input_report_length(), 5);

    let report = rdesc.get_report(ReportType::Input, 0).unwrap();
    let parser = rdesc.input_parser(rdesc.device_item_ids()[0]).unwrap();
    // 3 buttons, x, y, wheel
    assert_eq!(parser.value_count(), 6);

    assert!(parser.try_parse_report(&[0x00, 0x00, 0x00, 0x00, 0x00], report).unwrap());
    while parser.next_changed_index().is_some() {}

    // left button down, x -3
    assert!(parser.try_parse_report(&[0x00, 0x01, 0xfd, 0x00, 0x00], report).unwrap());
    let changed: Vec<u32> = std::iter::from_fn(|| parser.next_changed_index())
        .map(|i| parser.value(i).unwrap().usages().next().unwrap())
        .collect();
    assert_eq!(changed, [0x0009_0001, 0x0001_0030]);
    assert_eq!(parser.value(3).unwrap().logical(), -3);
}

#[test]
fn keyboard_with_report_ids() {
    let rdesc = load("keyboard.hid.bin");
    assert!(rdesc.reports_use_id());
    assert_eq!(rdesc.device_items().count(), 2);

    let keyboard = rdesc.device_item_ids()[0];
    let consumer = rdesc.device_item_ids()[1];
    assert_eq!(
        rdesc.reports_of(keyboard).map(Report::report_id).collect::<Vec<_>>(),
        [1, 1]
    );
    assert_eq!(rdesc.output_reports().count(), 1);
    assert_eq!(rdesc.max_input_report_length(), 9);
    assert_eq!(rdesc.max_output_report_length(), 2);

    let keys = rdesc.input_parser(keyboard).unwrap();
    // 8 modifiers and one slot per key usage
    assert_eq!(keys.value_count(), 8 + 102);
    assert!(keys.try_parse(&[0x01, 0x02, 0x00, 0x04, 0, 0, 0, 0, 0]).unwrap());
    let changed: Vec<usize> = std::iter::from_fn(|| keys.next_changed_index()).collect();
    // modifiers change from their initial state, key 'a' (0x04) is selected
    assert!(changed.contains(&(8 + 4)));
    assert_eq!(keys.value(8 + 4).unwrap().usages().next(), Some(0x0007_0004));

    // the consumer device does not own report 1
    let media = rdesc.input_parser(consumer).unwrap();
    let report = rdesc.get_report(ReportType::Input, 1).unwrap();
    assert!(!media.try_parse_report(&[0x01, 0, 0, 0, 0, 0, 0, 0, 0], report).unwrap());
    assert!(media.try_parse(&[0x02, 0xe9, 0x00]).unwrap());
    let index = media.next_changed_index().unwrap();
    assert_eq!(media.value(index).unwrap().usages().next(), Some(0x000c_00e9));
}
