//! ページングレベル

use std::fmt;

/// 4段ページングのレベル（ウォーク順）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PagingLevel {
    Pml4,
    Pdpt,
    Pdt,
    Pt,
}

impl PagingLevel {
    /// ウォーク順のすべてのレベル
    pub const WALK_ORDER: [PagingLevel; 4] = [
        PagingLevel::Pml4,
        PagingLevel::Pdpt,
        PagingLevel::Pdt,
        PagingLevel::Pt,
    ];

    /// 仮想アドレス中のインデックスの最下位ビット
    pub fn shift(self) -> u32 {
        match self {
            PagingLevel::Pml4 => 39,
            PagingLevel::Pdpt => 30,
            PagingLevel::Pdt => 21,
            PagingLevel::Pt => 12,
        }
    }

    /// 仮想アドレスからこのレベルの9ビットインデックスを取り出す
    pub fn index(self, virtual_address: u64) -> u64 {
        (virtual_address >> self.shift()) & 0x1FF
    }

    /// 表示名
    pub fn name(self) -> &'static str {
        match self {
            PagingLevel::Pml4 => "PML4",
            PagingLevel::Pdpt => "PDPT",
            PagingLevel::Pdt => "PDT",
            PagingLevel::Pt => "PT",
        }
    }
}

impl fmt::Display for PagingLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices() {
        // PML4=1, PDPT=2, PDT=3, PT=4, offset=0x567
        let va = (1u64 << 39) | (2 << 30) | (3 << 21) | (4 << 12) | 0x567;
        assert_eq!(PagingLevel::Pml4.index(va), 1);
        assert_eq!(PagingLevel::Pdpt.index(va), 2);
        assert_eq!(PagingLevel::Pdt.index(va), 3);
        assert_eq!(PagingLevel::Pt.index(va), 4);
    }

    #[test]
    fn test_index_ignores_sign_extension() {
        let va = 0xFFFF_8000_0000_0000u64;
        assert_eq!(PagingLevel::Pml4.index(va), 256);
        assert_eq!(PagingLevel::Pt.index(va), 0);
    }
}
