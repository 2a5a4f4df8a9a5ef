//! リンカマップとELFの読み込みのテスト

use enkel_symbols::{annotate_trace, load_elf, load_linker_map};
use std::io::Write;

#[no_mangle]
pub extern "C" fn enkel_symbols_test_marker() -> u32 {
    0x5a
}

#[test]
fn test_annotate_from_map_file() {
    let mut map = tempfile::NamedTempFile::new().unwrap();
    writeln!(map, " .text          0x0000000000100000     0x400 build/kernel.o").unwrap();
    writeln!(map, "                0x0000000000100000                KernelMain").unwrap();
    writeln!(map, "                0x0000000000100200                ISR_PageFault").unwrap();
    map.flush().unwrap();

    let table = load_linker_map(map.path()).unwrap();
    assert_eq!(table.len(), 2);

    let lines = annotate_trace(&table, "#0:100208\n#1:100010\n#2:10\n");
    assert_eq!(
        lines,
        [
            "#0x0: 0x100208 (ISR_PageFault+0x8)",
            "#0x1: 0x100010 (KernelMain+0x10)",
            "#0x2: 0x10 (Unknown)",
        ]
    );
}

#[test]
fn test_map_names_are_printed_verbatim() {
    let mut map = tempfile::NamedTempFile::new().unwrap();
    writeln!(map, "                0x0000000000100000                _ZN4core9panicking5panic17h0123456789abcdefE").unwrap();
    map.flush().unwrap();

    let table = load_linker_map(map.path()).unwrap();
    let lines = annotate_trace(&table, "#0:100004\n");
    assert_eq!(
        lines,
        ["#0x0: 0x100004 (_ZN4core9panicking5panic17h0123456789abcdefE+0x4)"]
    );
}

#[test]
fn test_missing_map_file() {
    assert!(load_linker_map("/nonexistent/enkel.map").is_err());
}

#[test]
fn test_load_elf_finds_exported_function() {
    assert_eq!(enkel_symbols_test_marker(), 0x5a);

    // テストバイナリ自身を読む
    let exe = std::env::current_exe().unwrap();
    let table = load_elf(&exe).unwrap();

    let address = table
        .resolve("enkel_symbols_test_marker")
        .expect("marker symbol should be present");
    let nearest = table.nearest(address).unwrap();
    assert_eq!(nearest.address, address);
}

#[test]
fn test_load_elf_rejects_non_elf() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"not an object file").unwrap();
    assert!(load_elf(file.path()).is_err());
}
