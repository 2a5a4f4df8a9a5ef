//! Enkel ページテーブルウォーカー
//!
//! このクレートは、x86_64の4段ページテーブルをデバッガ側で手動で辿り、
//! 仮想アドレスを物理アドレスに変換する機能を提供します。
//! エントリは変換のたびに読み直し、キャッシュしません。

pub mod entry;
pub mod level;
pub mod walker;

pub use entry::{EntryFlags, PageTableEntry, PHYS_ADDR_MASK};
pub use level::PagingLevel;
pub use walker::{root_table_base, translate, walk, TranslateError, Walk, WalkStep};

/// ページング関連の結果型
pub type Result<T> = anyhow::Result<T>;
