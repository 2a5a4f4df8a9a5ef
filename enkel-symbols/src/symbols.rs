//! シンボルテーブル

use std::collections::HashMap;

/// シンボル情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    /// マングルされたシンボル名
    pub name: String,
    /// デマングルされたシンボル名（可読な形式）
    pub demangled_name: String,
    pub address: u64,
    /// サイズ（リンカマップ由来の場合は0）
    pub size: u64,
}

impl Symbol {
    /// シンボルを作成し、デマングルされた名前を設定する
    pub fn new(name: String, address: u64, size: u64) -> Self {
        let demangled_name = demangle_symbol(&name);
        Self {
            name,
            demangled_name,
            address,
            size,
        }
    }

    /// 名前をそのまま表示するシンボルを作成する
    ///
    /// リンカマップの名前はマップに書かれた通りに出力します。
    pub fn verbatim(name: String, address: u64, size: u64) -> Self {
        Self {
            demangled_name: name.clone(),
            name,
            address,
            size,
        }
    }

    /// 表示用の名前を取得（デマングル可能ならデマングル後、できなければマングル名）
    pub fn display_name(&self) -> &str {
        &self.demangled_name
    }
}

/// シンボル名をデマングルする
fn demangle_symbol(name: &str) -> String {
    if let Ok(demangled) = rustc_demangle::try_demangle(name) {
        return format!("{:#}", demangled);
    }

    // C++のシンボルはそのまま
    name.to_string()
}

/// アドレス順のシンボルテーブル
#[derive(Debug, Default, Clone)]
pub struct SymbolTable {
    /// アドレスでソート済み（同じアドレスは追加順）
    symbols: Vec<Symbol>,
    /// シンボル名 -> インデックス
    by_name: HashMap<String, usize>,
}

impl SymbolTable {
    /// シンボルの一覧からテーブルを作成する
    pub fn new(mut symbols: Vec<Symbol>) -> Self {
        symbols.sort_by_key(|s| s.address);
        let by_name = symbols
            .iter()
            .enumerate()
            .map(|(i, s)| (s.name.clone(), i))
            .collect();
        Self { symbols, by_name }
    }

    /// シンボル名からアドレスを解決する
    pub fn resolve(&self, name: &str) -> Option<u64> {
        self.by_name.get(name).map(|&i| self.symbols[i].address)
    }

    /// アドレス以下で最も近いシンボルを探す
    ///
    /// 同じアドレスのシンボルが複数ある場合は最後に追加されたものを返します。
    pub fn nearest(&self, address: u64) -> Option<&Symbol> {
        let end = self.symbols.partition_point(|s| s.address <= address);
        end.checked_sub(1).map(|i| &self.symbols[i])
    }

    /// すべてのシンボルを取得する（アドレス順）
    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> SymbolTable {
        SymbolTable::new(vec![
            Symbol::new("KernelMain".to_string(), 0x2000, 0),
            Symbol::new("_start".to_string(), 0x1000, 0),
            Symbol::new("Panic".to_string(), 0x3000, 0),
        ])
    }

    #[test]
    fn test_nearest_below_or_equal() {
        let t = table();
        assert_eq!(t.nearest(0x2000).unwrap().name, "KernelMain");
        assert_eq!(t.nearest(0x2fff).unwrap().name, "KernelMain");
        assert_eq!(t.nearest(0xffff).unwrap().name, "Panic");
        assert!(t.nearest(0xfff).is_none());
    }

    #[test]
    fn test_nearest_prefers_last_duplicate() {
        let t = SymbolTable::new(vec![
            Symbol::new("first".to_string(), 0x1000, 0),
            Symbol::new("second".to_string(), 0x1000, 0),
        ]);
        assert_eq!(t.nearest(0x1004).unwrap().name, "second");
    }

    #[test]
    fn test_resolve_and_demangle() {
        let t = table();
        assert_eq!(t.resolve("_start"), Some(0x1000));
        assert_eq!(t.resolve("missing"), None);

        let sym = Symbol::new("_ZN4core9panicking5panic17h0123456789abcdefE".to_string(), 0, 0);
        assert_eq!(sym.display_name(), "core::panicking::panic");
    }
}
