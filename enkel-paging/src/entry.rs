//! ページテーブルエントリのデコード

use std::fmt;

/// 物理ベースアドレスのマスク（ビット12〜51）
pub const PHYS_ADDR_MASK: u64 = 0x000F_FFFF_FFFF_F000;

bitflags::bitflags! {
    /// x86_64のページテーブルエントリのフラグ
    ///
    /// 4段のすべてのレベルで同じビット位置を使います。ビット7はPT以外では
    /// ページサイズ（PS）、PTではPATです。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EntryFlags: u64 {
        /// Present
        const PRESENT = 1 << 0;
        /// Read/write
        const WRITABLE = 1 << 1;
        /// User/supervisor
        const USER = 1 << 2;
        /// Page-level write-through
        const WRITE_THROUGH = 1 << 3;
        /// Page-level cache disable
        const CACHE_DISABLED = 1 << 4;
        /// Accessed
        const ACCESSED = 1 << 5;
        /// Dirty
        const DIRTY = 1 << 6;
        /// PAT（PT）またはページサイズ（PDPT/PDT）
        const PAT_OR_SIZE = 1 << 7;
        /// Global
        const GLOBAL = 1 << 8;
        /// Execute-disable
        const NO_EXECUTE = 1 << 63;
    }
}

/// 表示用の短い名前
const FLAG_NAMES: [(EntryFlags, &str); 10] = [
    (EntryFlags::PRESENT, "P"),
    (EntryFlags::WRITABLE, "RW"),
    (EntryFlags::USER, "US"),
    (EntryFlags::WRITE_THROUGH, "PWT"),
    (EntryFlags::CACHE_DISABLED, "PCD"),
    (EntryFlags::ACCESSED, "A"),
    (EntryFlags::DIRTY, "D"),
    (EntryFlags::PAT_OR_SIZE, "PAT/PS"),
    (EntryFlags::GLOBAL, "G"),
    (EntryFlags::NO_EXECUTE, "NX"),
];

/// ページテーブルエントリ（読み取り時点のスナップショット）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageTableEntry(pub u64);

impl PageTableEntry {
    /// 生の値を取得する
    pub fn raw(self) -> u64 {
        self.0
    }

    /// フラグをデコードする
    pub fn flags(self) -> EntryFlags {
        EntryFlags::from_bits_truncate(self.0)
    }

    /// Presentビットが立っているか
    pub fn is_present(self) -> bool {
        self.flags().contains(EntryFlags::PRESENT)
    }

    /// 次のテーブルまたはページの物理ベースアドレス
    pub fn physical_base(self) -> u64 {
        self.0 & PHYS_ADDR_MASK
    }
}

impl fmt::Display for PageTableEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flags = self.flags();
        let names: Vec<&str> = FLAG_NAMES
            .iter()
            .filter(|(flag, _)| flags.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        write!(
            f,
            "0x{:016x} base=0x{:x} [{}]",
            self.0,
            self.physical_base(),
            names.join(" ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_flags() {
        let entry = PageTableEntry(0x8000_0000_0012_3067);
        let flags = entry.flags();
        assert!(entry.is_present());
        assert!(flags.contains(EntryFlags::WRITABLE | EntryFlags::USER));
        assert!(flags.contains(EntryFlags::ACCESSED | EntryFlags::DIRTY));
        assert!(flags.contains(EntryFlags::NO_EXECUTE));
        assert!(!flags.contains(EntryFlags::GLOBAL));
        assert_eq!(entry.physical_base(), 0x123000);
    }

    #[test]
    fn test_base_ignores_high_bits() {
        // ビット52〜62はベースに含めない
        let entry = PageTableEntry(0x7FF0_0000_0000_1001);
        assert_eq!(entry.physical_base(), 0x1000);
        assert!(entry.is_present());
    }

    #[test]
    fn test_display_lists_flags() {
        let entry = PageTableEntry(0x2003);
        assert_eq!(entry.to_string(), "0x0000000000002003 base=0x2000 [P RW]");
    }
}
