//! Enkel シンボル解析
//!
//! リンカマップやELFファイルからシンボルテーブルを読み込み、
//! カーネルのスタックトレースにシンボル名を付けます。

pub mod annotate;
pub mod elf;
pub mod map;
pub mod symbols;

pub use annotate::{annotate_line, annotate_trace};
pub use elf::{load_elf, parse_elf_symbols};
pub use map::{load_linker_map, LinkerMapParser};
pub use symbols::{Symbol, SymbolTable};

/// シンボル解析の結果型
pub type Result<T> = anyhow::Result<T>;
