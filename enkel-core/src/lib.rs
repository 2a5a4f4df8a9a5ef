//! Enkel デバッグシムのコア機能
//!
//! このクレートは、デバッガ内で動く自動化コントローラを提供します。
//! エントリゲートでの診断フックの設定、例外ハンドラでの停止、
//! ユーザーモードモジュールのシンボル同期、アドレス変換コマンドを統合します。

pub mod command;
pub mod config;
pub mod controller;
pub mod errors;
pub mod hooks;
pub mod modules;
pub mod parse;

pub use config::{ControllerConfig, HookSpec};
pub use controller::{Controller, ControllerState};
pub use errors::DecodeError;
pub use hooks::{Hook, HookKind, HookTable};
pub use modules::{ModuleRecord, ModuleSync};

// 他のクレートから使用するために再エクスポート
pub use enkel_target::{DebugBackend, HookId, StopDecision};

/// コントローラの結果型
pub type Result<T> = anyhow::Result<T>;
