//! ページテーブルウォークのテスト

use enkel_paging::{translate, walk, PagingLevel, TranslateError};
use enkel_target::{AddressSpace, SimTarget};

const PML4: u64 = 0x1000;
const PDPT: u64 = 0x2000;
const PDT: u64 = 0x3000;
const PT: u64 = 0x4000;

/// Present + Writable
const PW: u64 = 0x3;

/// 仮想アドレス[0, 2MB)を物理アドレス[0, 2MB)に恒等マップするテーブルを作る
fn identity_mapped_target() -> SimTarget {
    let mut sim = SimTarget::new();
    let mem = sim.memory_mut();
    mem.write_u64(AddressSpace::Physical, PML4, PDPT | PW);
    mem.write_u64(AddressSpace::Physical, PDPT, PDT | PW);
    mem.write_u64(AddressSpace::Physical, PDT, PT | PW);
    for i in 0..512u64 {
        mem.write_u64(AddressSpace::Physical, PT + i * 8, (i << 12) | PW);
    }
    sim
}

/// 各レベルのインデックスが異なる仮想アドレスを1つだけマップする
fn single_page_target(va: u64, page: u64) -> SimTarget {
    let mut sim = SimTarget::new();
    let mem = sim.memory_mut();
    mem.write_u64(AddressSpace::Physical, PML4 + PagingLevel::Pml4.index(va) * 8, PDPT | PW);
    mem.write_u64(AddressSpace::Physical, PDPT + PagingLevel::Pdpt.index(va) * 8, PDT | PW);
    mem.write_u64(AddressSpace::Physical, PDT + PagingLevel::Pdt.index(va) * 8, PT | PW);
    mem.write_u64(AddressSpace::Physical, PT + PagingLevel::Pt.index(va) * 8, page | PW);
    // 書き込んだページの他のエントリは0（Presentビットなし）
    sim
}

#[test]
fn test_all_levels_present() {
    let va = 0xFFFF_8000_1234_5678;
    let mut sim = single_page_target(va, 0xABCD_E000);

    let pa = translate(&mut sim, PML4, va).expect("should translate");
    assert_eq!(pa, 0xABCD_E000 | 0x678);
}

#[test]
fn test_pt_base_masks_flag_bits() {
    let va = 0x40_0000_1234;
    let mut sim = single_page_target(va, 0x7000);
    // PTエントリにNX・Accessed・Dirtyを追加してもベースは変わらない
    let pt_entry = PT + PagingLevel::Pt.index(va) * 8;
    sim.memory_mut().write_u64(
        AddressSpace::Physical,
        pt_entry,
        0x8000_0000_0000_7000 | 0x63,
    );

    assert_eq!(translate(&mut sim, PML4, va).unwrap(), 0x7234);
}

#[test]
fn test_not_mapped_stops_at_first_missing_level() {
    let va = 0x0000_7F12_3456_7ABC;
    let levels = [
        (PagingLevel::Pml4, PML4),
        (PagingLevel::Pdpt, PDPT),
        (PagingLevel::Pdt, PDT),
        (PagingLevel::Pt, PT),
    ];

    for (n, (level, table)) in levels.iter().enumerate() {
        let mut sim = single_page_target(va, 0x9000);
        let entry_address = table + level.index(va) * 8;
        sim.memory_mut().write_u64(AddressSpace::Physical, entry_address, 0x9000 | 0x2);
        sim.clear_history();

        let trace = walk(&mut sim, PML4, va);
        match trace.outcome {
            Err(TranslateError::NotMapped { level: got }) => assert_eq!(got, *level),
            ref other => panic!("expected NotMapped at {}, got {:?}", level, other),
        }

        // 失敗したレベルより後は読まない
        assert_eq!(sim.reads().len(), n + 1);
        assert_eq!(sim.reads().last().unwrap().1, entry_address);
        assert_eq!(trace.steps.len(), n + 1);
        assert!(!trace.steps[n].entry.is_present());
    }
}

#[test]
fn test_identity_mapped_first_two_megabytes() {
    let mut sim = identity_mapped_target();
    let mut va = 0u64;
    while va < 0x20_0000 {
        assert_eq!(translate(&mut sim, PML4, va).unwrap(), va, "va=0x{:x}", va);
        va += 0xFFD;
    }
    assert_eq!(translate(&mut sim, PML4, 0x1F_FFFF).unwrap(), 0x1F_FFFF);
}

#[test]
fn test_address_past_identity_range_is_not_mapped() {
    let mut sim = identity_mapped_target();
    // PDT[1]は0のまま
    let err = translate(&mut sim, PML4, 0x20_0000).unwrap_err();
    assert!(matches!(err, TranslateError::NotMapped { level: PagingLevel::Pdt }));
    assert_eq!(err.to_string(), "PDT entry not present");
}

#[test]
fn test_steps_record_every_level() {
    let va = 0x1234;
    let mut sim = identity_mapped_target();
    let trace = walk(&mut sim, PML4, va);

    let levels: Vec<PagingLevel> = trace.steps.iter().map(|s| s.level).collect();
    assert_eq!(levels, PagingLevel::WALK_ORDER.to_vec());
    assert_eq!(trace.steps[3].entry_address, PT + 8);
    assert_eq!(trace.outcome.unwrap(), 0x1234);
}
