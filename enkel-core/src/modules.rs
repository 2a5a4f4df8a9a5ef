//! モジュールのシンボル同期
//!
//! カーネルがユーザーモードのバイナリをロード・アンロードするたびに、
//! デバッガのシンボルテーブルを追従させます。ここで追跡しているモジュールの集合は
//! 常にデバッガに読み込まれているシンボルファイルの集合と一致します。
//!
//! どちらのフックも最後は必ず実行を再開します。デコードに失敗しても
//! ターゲットを止めたままにはしません。

use crate::errors::DecodeError;
use crate::{ControllerConfig, Result};
use enkel_target::{AddressSpace, DebugBackend, MemoryReader, StopDecision};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// モジュール名として読むUTF-16コードユニットの上限
pub const MAX_NAME_UNITS: usize = 1024;

/// ロード済みモジュール
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRecord {
    /// 表示名（カーネルが渡したパス）
    pub name: String,
    /// 実行時の基底アドレス
    pub base: u64,
    /// デバッガに読み込んだシンボルファイル
    pub symbol_file: String,
}

/// NUL終端のUTF-16文字列を読み取る
///
/// 最初の0のコードユニットで止まります。
pub fn read_utf16_string<M: MemoryReader + ?Sized>(
    memory: &mut M,
    address: u64,
) -> std::result::Result<String, DecodeError> {
    let mut units = Vec::new();
    for i in 0..MAX_NAME_UNITS as u64 {
        let unit_address = address
            .checked_add(i * 2)
            .ok_or_else(|| DecodeError::Memory {
                address,
                source: anyhow::anyhow!("string runs past the end of the address space"),
            })?;
        let unit = memory
            .read_u16(AddressSpace::Virtual, unit_address)
            .map_err(|source| DecodeError::Memory {
                address: unit_address,
                source,
            })?;
        if unit == 0 {
            return String::from_utf16(&units).map_err(|_| DecodeError::InvalidUtf16 { address });
        }
        units.push(unit);
    }
    Err(DecodeError::Unterminated {
        address,
        limit: MAX_NAME_UNITS,
    })
}

/// モジュールのシンボル同期
pub struct ModuleSync {
    frame: usize,
    path_arg: String,
    base_arg: String,
    symbol_root: String,
    /// 基底アドレス -> モジュール
    loaded: BTreeMap<u64, ModuleRecord>,
}

impl ModuleSync {
    /// 設定からシンボル同期を作成する
    pub fn new(config: &ControllerConfig) -> Self {
        Self {
            frame: config.module_frame,
            path_arg: config.module_path_arg.clone(),
            base_arg: config.module_base_arg.clone(),
            symbol_root: config.symbol_root.clone(),
            loaded: BTreeMap::new(),
        }
    }

    /// ロード済みモジュールを取得する
    pub fn loaded(&self) -> impl Iterator<Item = &ModuleRecord> {
        self.loaded.values()
    }

    /// モジュールのシンボルファイルのパス
    pub fn symbol_file_for(&self, name: &str) -> String {
        let file_name = name.rsplit(['/', '\\']).next().unwrap_or(name);
        let root = self.symbol_root.trim_end_matches('/');
        if root.is_empty() {
            file_name.to_string()
        } else {
            format!("{}/{}", root, file_name)
        }
    }

    /// ロードフックのコールバック
    pub fn on_module_load(&mut self, backend: &mut dyn DebugBackend) -> StopDecision {
        match self.read_module(backend) {
            Ok((name, base)) => {
                if let Err(e) = self.load(backend, &name, base) {
                    warn!("failed to load symbols for {}: {:#}", name, e);
                }
            }
            Err(e) => {
                warn!("module load skipped: {:#}", e);
                backend.print(&format!("Module load skipped: {:#}", e));
            }
        }
        StopDecision::Resume
    }

    /// アンロードフックのコールバック
    pub fn on_module_unload(&mut self, backend: &mut dyn DebugBackend) -> StopDecision {
        match self.read_module(backend) {
            Ok((name, base)) => {
                if let Err(e) = self.unload(backend, &name, base) {
                    warn!("failed to unload symbols for {}: {:#}", name, e);
                }
            }
            Err(e) => {
                warn!("module unload skipped: {:#}", e);
                backend.print(&format!("Module unload skipped: {:#}", e));
            }
        }
        StopDecision::Resume
    }

    /// シンボルテーブルを読み込む
    pub fn load(&mut self, backend: &mut dyn DebugBackend, name: &str, base: u64) -> Result<()> {
        // 同じ基底アドレスに古いテーブルが残っていれば先に外す
        // 外せなかった記録はデバッガに残っているので消さない
        if let Some(stale) = self.loaded.get(&base) {
            warn!("replacing stale symbols for {} at 0x{:x}", stale.name, base);
            backend.execute(&format!("remove-symbol-file {}", stale.symbol_file))?;
            self.loaded.remove(&base);
        }

        let symbol_file = self.symbol_file_for(name);
        backend.execute(&format!(
            "add-symbol-file {} -o 0x{:x} -readnow",
            symbol_file, base
        ))?;
        info!("loaded symbols for {} at 0x{:x}", name, base);

        self.loaded.insert(
            base,
            ModuleRecord {
                name: name.to_string(),
                base,
                symbol_file,
            },
        );
        Ok(())
    }

    /// シンボルテーブルを外す
    ///
    /// 名前と基底アドレスの両方が一致するモジュールだけを対象にします。
    pub fn unload(&mut self, backend: &mut dyn DebugBackend, name: &str, base: u64) -> Result<()> {
        let record = match self.loaded.get(&base) {
            Some(record) if record.name == name => record,
            _ => {
                warn!("unload of untracked module {} at 0x{:x} ignored", name, base);
                return Ok(());
            }
        };

        backend.execute(&format!("remove-symbol-file {}", record.symbol_file))?;
        self.loaded.remove(&base);
        info!("unloaded symbols for {} at 0x{:x}", name, base);
        Ok(())
    }

    /// 呼び出し元フレームからモジュール名と基底アドレスを読み取る
    fn read_module(&self, backend: &mut dyn DebugBackend) -> Result<(String, u64)> {
        let path_ptr = backend.read_frame_value(self.frame, &self.path_arg)?;
        let base = backend.read_frame_value(self.frame, &self.base_arg)?;
        let name = read_utf16_string(backend, path_ptr)?;
        Ok((name, base))
    }
}
