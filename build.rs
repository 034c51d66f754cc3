use std::io::Write;
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // For each hid.bin file in our test/data directory, create one basic test function
    // that parses that report descriptor and sets up change tracking for each device item
    let datadir: PathBuf = [concat!(env!("CARGO_MANIFEST_DIR"), "/tests/data")]
        .iter()
        .collect();
    println!("cargo:rerun-if-changed={}", datadir.display());

    let out_dir = std::env::var_os("OUT_DIR").ok_or("OUT_DIR is not set")?;
    let dest_path = PathBuf::from(&out_dir).join("test-report-descriptors.rs");
    let mut file = std::fs::File::create(dest_path)?;

    writeln!(file, "use hidtrack::*;")?;
    writeln!(file)?;

    let mut entries: Vec<_> = std::fs::read_dir(datadir)?
        .flatten()
        .filter(|e| e.file_name().to_string_lossy().ends_with(".hid.bin"))
        .collect();
    entries.sort_by_key(|e| e.file_name());

    for rdesc in entries {
        let filename = rdesc.file_name().to_string_lossy().into_owned();
        let funcname = filename.replace([':', '.', '-'], "_");
        let path = rdesc.path();
        writeln!(
            file,
            "
#[test]
#[allow(non_snake_case)]
fn test_{funcname}() {{
    let bytes: Vec<u8> = std::fs::read({path:?}).unwrap();
    let rdesc = ReportDescriptor::try_from(&bytes).expect(&format!(\"Failed to parse {filename}\"));
    assert!(!rdesc.device_item_ids().is_empty());
    for report in rdesc.reports() {{
        assert!(report.length() >= 1);
    }}
    for device in rdesc.device_item_ids() {{
        rdesc.input_parser(*device).expect(&format!(\"No input parser for {filename}\"));
    }}
}}
"
        )?;
    }

    Ok(())
}
