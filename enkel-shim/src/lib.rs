//! Enkel セッションスーパーバイザ
//!
//! IDEとデバッガの間に入り、エミュレータとデバッガのサブプロセスを管理します。
//! デバッガの出力を監視して接続時の初期コマンドとモジュールロード後の継続を注入し、
//! IDEからのコマンドのプレースホルダをルートディレクトリに置き換えます。
//!
//! 自動化コントローラをセッション内で動かす場合は、gdbをMIで操作する
//! バックエンドを通してブレークポイントの停止に応答します。

pub mod automation;
pub mod backend;
pub mod config;
pub mod errors;
pub mod mi;
pub mod multiplexer;
pub mod process;
pub mod rewrite;
pub mod session;
pub mod transcript;

pub use automation::{Automation, AutomationEvent};
pub use backend::{parse_gdb_value, CommandRegistry, MiBackend, MiChannel};
pub use config::{
    automation_initial_commands, default_initial_commands, default_root, Markers, SessionConfig,
    PLACEHOLDER,
};
pub use errors::SessionError;
pub use mi::{MiRecord, MiValue, RecordKind};
pub use multiplexer::{Multiplexer, CONTINUE_COMMAND};
pub use rewrite::rewrite_placeholder;
pub use session::{Session, SessionEnd};
pub use transcript::Transcript;

/// セッションの結果型
pub type Result<T> = anyhow::Result<T>;
