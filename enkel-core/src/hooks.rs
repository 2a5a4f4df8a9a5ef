//! 診断フック（ブレークポイント）管理

use crate::Result;
use enkel_target::{DebugBackend, HookId};
use std::collections::HashMap;

/// フックの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    /// 例外ハンドラ。フック状態とスタックを表示して停止
    FaultVerbose,
    /// 例外ハンドラ。スタックだけを表示して停止
    FaultSilent,
    /// 停止するだけのフック（永久停止・手動ブレーク）
    GenericStop,
    /// モジュールのロード
    ModuleLoad,
    /// モジュールのアンロード
    ModuleUnload,
}

/// 診断フック
///
/// アドレスは設定時に一度だけ解決し、以後変更しません。
#[derive(Debug, Clone)]
pub struct Hook {
    pub id: HookId,
    pub name: String,
    pub address: u64,
    pub kind: HookKind,
}

/// シンボル名をアドレスに解決する
pub fn resolve_symbol(backend: &mut dyn DebugBackend, name: &str) -> Result<u64> {
    backend.evaluate(&format!("&{}", name))
}

/// フックテーブル
pub struct HookTable {
    hooks: HashMap<HookId, Hook>,
}

impl HookTable {
    /// 空のフックテーブルを作成する
    pub fn new() -> Self {
        Self {
            hooks: HashMap::new(),
        }
    }

    /// シンボルを解決してフックを設定する
    pub fn install(
        &mut self,
        backend: &mut dyn DebugBackend,
        name: &str,
        kind: HookKind,
    ) -> Result<HookId> {
        let address = resolve_symbol(backend, name)?;
        let id = backend.install_breakpoint(address)?;

        self.hooks.insert(
            id,
            Hook {
                id,
                name: name.to_string(),
                address,
                kind,
            },
        );
        Ok(id)
    }

    /// フックを取得する
    pub fn get(&self, id: HookId) -> Option<&Hook> {
        self.hooks.get(&id)
    }

    /// 名前でフックを探す
    pub fn find(&self, name: &str) -> Option<&Hook> {
        self.hooks.values().find(|h| h.name == name)
    }

    /// フックの数を取得する
    pub fn count(&self) -> usize {
        self.hooks.len()
    }
}

impl Default for HookTable {
    fn default() -> Self {
        Self::new()
    }
}
