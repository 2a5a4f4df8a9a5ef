//! ELFファイルのシンボル読み込み

use crate::{Result, Symbol, SymbolTable};
use object::{Object, ObjectSymbol, SymbolKind};
use std::path::Path;

/// ELFのバイト列からシンボルテーブルを作る
///
/// 定義済みの名前付きシンボルだけを対象にし、セクションやファイルのシンボルは除きます。
pub fn parse_elf_symbols(data: &[u8]) -> Result<SymbolTable> {
    let object_file = object::File::parse(data)
        .map_err(|e| anyhow::anyhow!("Failed to parse ELF file: {}", e))?;

    let mut symbols = Vec::new();
    for symbol in object_file.symbols() {
        if !symbol.is_definition() {
            continue;
        }
        if matches!(symbol.kind(), SymbolKind::Section | SymbolKind::File) {
            continue;
        }
        if let Ok(name) = symbol.name() {
            if !name.is_empty() {
                symbols.push(Symbol::new(name.to_string(), symbol.address(), symbol.size()));
            }
        }
    }
    Ok(SymbolTable::new(symbols))
}

/// ELFファイルを読み込む
pub fn load_elf<P: AsRef<Path>>(path: P) -> Result<SymbolTable> {
    let path = path.as_ref();
    let data = std::fs::read(path)
        .map_err(|e| anyhow::anyhow!("Failed to read file {:?}: {}", path, e))?;
    let table = parse_elf_symbols(&data)?;
    tracing::debug!("loaded {} symbols from {:?}", table.len(), path);
    Ok(table)
}
