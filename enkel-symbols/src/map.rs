//! リンカマップの読み込み

use crate::{Result, Symbol, SymbolTable};
use regex::Regex;
use std::path::Path;

/// GNU ldのマップファイルのパーサ
pub struct LinkerMapParser {
    /// `0x<addr>  <name>` の行
    symbol_pattern: Regex,
    /// セクションやオブジェクトファイルの行（`.text 0x<addr> 0x<size> file.o`）
    section_pattern: Regex,
}

impl LinkerMapParser {
    pub fn new() -> Result<Self> {
        let symbol_pattern = Regex::new(r"^\s*0x([0-9A-Fa-f]+)\s+(.*)$")?;
        let section_pattern =
            Regex::new(r"^\s*(?:\.\w+\s+)?0x([0-9A-Fa-f]+)\s+0x([0-9A-Fa-f]+)\s+(.*)$")?;
        Ok(Self {
            symbol_pattern,
            section_pattern,
        })
    }

    /// 1行をシンボルとして解釈する
    pub fn parse_line(&self, line: &str) -> Option<Symbol> {
        let captures = self.symbol_pattern.captures(line)?;
        if self.section_pattern.is_match(line) {
            return None;
        }
        let name = captures.get(2)?.as_str().trim();
        if name.is_empty() {
            return None;
        }
        let address = u64::from_str_radix(captures.get(1)?.as_str(), 16).ok()?;
        Some(Symbol::verbatim(name.to_string(), address, 0))
    }

    /// マップファイルの内容からシンボルテーブルを作る
    pub fn parse(&self, text: &str) -> SymbolTable {
        SymbolTable::new(text.lines().filter_map(|line| self.parse_line(line)).collect())
    }
}

/// マップファイルを読み込む
pub fn load_linker_map<P: AsRef<Path>>(path: P) -> Result<SymbolTable> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read linker map {:?}: {}", path, e))?;
    let table = LinkerMapParser::new()?.parse(&text);
    tracing::debug!("loaded {} symbols from {:?}", table.len(), path);
    Ok(table)
}
