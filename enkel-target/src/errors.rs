//! バックエンドのエラー型

use crate::AddressSpace;
use thiserror::Error;

/// デバッガバックエンドが返すエラー
#[derive(Debug, Error)]
pub enum BackendError {
    /// シンボルが見つからない
    #[error("No symbol \"{0}\" in current context")]
    UnknownSymbol(String),

    /// メモリが読み取れない
    #[error("Cannot access {space:?} memory at address 0x{address:x}")]
    UnreadableMemory { space: AddressSpace, address: u64 },

    /// フレーム内に指定された値がない
    #[error("No value \"{name}\" in frame #{frame}")]
    UnknownFrameValue { frame: usize, name: String },

    /// 式を評価できない
    #[error("Cannot evaluate expression \"{0}\"")]
    InvalidExpression(String),

    /// 登録されていないコマンド
    #[error("Undefined command: \"{0}\"")]
    UndefinedCommand(String),

    /// コマンドの実行に失敗した
    #[error("Command \"{0}\" failed")]
    CommandFailed(String),
}
