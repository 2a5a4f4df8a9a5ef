//! スタックトレースの注釈
//!
//! カーネルが出力するスタックトレースの`#<index>:<offset>`行に、
//! オフセット以下で最も近いシンボル名と差分を付けます。

use crate::SymbolTable;
use tracing::warn;

/// トレースの1行に注釈を付ける
///
/// トレース行でなければNoneを返します。
pub fn annotate_line(table: &SymbolTable, line: &str) -> Option<String> {
    let body = line.strip_prefix('#')?;
    let tokens: Vec<&str> = body.split(':').collect();
    if tokens.len() != 2 {
        return None;
    }

    let index = tokens[0].trim();
    let offset_text = tokens[1].trim();
    let digits = offset_text
        .strip_prefix("0x")
        .or_else(|| offset_text.strip_prefix("0X"))
        .unwrap_or(offset_text);
    let offset = match u64::from_str_radix(digits, 16) {
        Ok(offset) => offset,
        Err(_) => {
            warn!("skipping trace line with bad offset: {}", line.trim_end());
            return None;
        }
    };

    Some(match table.nearest(offset) {
        Some(symbol) => format!(
            "#0x{}: 0x{:x} ({}+0x{:x})",
            index,
            offset,
            symbol.display_name(),
            offset - symbol.address
        ),
        None => format!("#0x{}: 0x{:x} (Unknown)", index, offset),
    })
}

/// トレース全体に注釈を付ける（トレース行以外は出力しない）
pub fn annotate_trace(table: &SymbolTable, trace: &str) -> Vec<String> {
    trace
        .lines()
        .filter_map(|line| annotate_line(table, line))
        .collect()
}
