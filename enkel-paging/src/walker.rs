//! ページテーブルウォーカー
//!
//! CR3から始めてPML4 → PDPT → PDT → PTの順にエントリを読み、仮想アドレスを
//! 物理アドレスに変換します。ヒュージページ（PDPT/PDTのPSビット）は扱わず、
//! 常に4段すべてを辿ります。

use crate::{PageTableEntry, PagingLevel, PHYS_ADDR_MASK};
use enkel_target::{AddressSpace, MemoryReader};
use thiserror::Error;
use tracing::debug;

/// ページ内オフセットのマスク
const PAGE_OFFSET_MASK: u64 = 0xFFF;

/// エントリのサイズ（バイト数）
const ENTRY_SIZE: u64 = 8;

/// アドレス変換のエラー
#[derive(Debug, Error)]
pub enum TranslateError {
    /// このレベルのエントリのPresentビットが0
    #[error("{level} entry not present")]
    NotMapped { level: PagingLevel },

    /// エントリを読み取れなかった
    #[error("failed to read {level} entry at physical address 0x{address:x}: {source}")]
    Memory {
        level: PagingLevel,
        address: u64,
        #[source]
        source: anyhow::Error,
    },
}

/// 1レベル分のウォーク結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkStep {
    pub level: PagingLevel,
    /// 読み取ったエントリの物理アドレス
    pub entry_address: u64,
    pub entry: PageTableEntry,
}

/// ウォーク全体の記録
#[derive(Debug)]
pub struct Walk {
    pub virtual_address: u64,
    /// 読み取ったエントリ（ウォーク順）
    pub steps: Vec<WalkStep>,
    pub outcome: Result<u64, TranslateError>,
}

impl Walk {
    /// 変換結果を取り出す
    pub fn into_result(self) -> Result<u64, TranslateError> {
        self.outcome
    }
}

/// CR3の値からPML4テーブルの物理ベースを取り出す
pub fn root_table_base(cr3: u64) -> u64 {
    cr3 & PHYS_ADDR_MASK
}

/// 4段のページテーブルを辿る
///
/// # Arguments
/// * `memory` - 物理メモリの読み取り能力
/// * `cr3` - ページテーブルルートレジスタの値
/// * `virtual_address` - 変換する仮想アドレス
pub fn walk<M: MemoryReader + ?Sized>(memory: &mut M, cr3: u64, virtual_address: u64) -> Walk {
    let mut steps = Vec::with_capacity(PagingLevel::WALK_ORDER.len());
    let mut table_base = root_table_base(cr3);

    for level in PagingLevel::WALK_ORDER {
        let entry_address = table_base + level.index(virtual_address) * ENTRY_SIZE;

        let raw = match memory.read_u64(AddressSpace::Physical, entry_address) {
            Ok(raw) => raw,
            Err(source) => {
                return Walk {
                    virtual_address,
                    steps,
                    outcome: Err(TranslateError::Memory {
                        level,
                        address: entry_address,
                        source,
                    }),
                };
            }
        };

        let entry = PageTableEntry(raw);
        debug!("{} entry @0x{:x}: {}", level, entry_address, entry);
        steps.push(WalkStep {
            level,
            entry_address,
            entry,
        });

        if !entry.is_present() {
            return Walk {
                virtual_address,
                steps,
                outcome: Err(TranslateError::NotMapped { level }),
            };
        }

        table_base = entry.physical_base();
    }

    // ループを抜けた時点でtable_baseはPTエントリの指すページ
    Walk {
        virtual_address,
        steps,
        outcome: Ok(table_base | (virtual_address & PAGE_OFFSET_MASK)),
    }
}

/// 仮想アドレスを物理アドレスに変換する
pub fn translate<M: MemoryReader + ?Sized>(
    memory: &mut M,
    cr3: u64,
    virtual_address: u64,
) -> Result<u64, TranslateError> {
    walk(memory, cr3, virtual_address).into_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use enkel_target::SimTarget;

    #[test]
    fn test_unreadable_root_is_memory_error() {
        let mut sim = SimTarget::new();
        let trace = walk(&mut sim, 0x1000, 0x4000);
        assert!(trace.steps.is_empty());
        match trace.outcome {
            Err(TranslateError::Memory { level, address, .. }) => {
                assert_eq!(level, PagingLevel::Pml4);
                assert_eq!(address, 0x1000);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_root_masks_cr3_flags() {
        // PCD/PWTビットや上位ビットは無視される
        assert_eq!(root_table_base(0x8000_0000_0010_0018), 0x100000);
    }
}
