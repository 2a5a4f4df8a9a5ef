//! セッションのエラー

use thiserror::Error;

/// セッションのエラー
#[derive(Debug, Error)]
pub enum SessionError {
    /// コマンドラインが空
    #[error("{role} command line is empty")]
    EmptyCommand { role: &'static str },

    /// プロセスを起動できない
    #[error("failed to spawn {role} `{program}`: {source}")]
    Spawn {
        role: &'static str,
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// デバッガがMIコマンドを拒否した
    #[error("gdb rejected `{command}`: {message}")]
    Rejected { command: String, message: String },

    /// 応答の前にデバッガが終了した
    #[error("gdb exited before answering `{command}`")]
    NoReply { command: String },

    /// 応答に必要なフィールドがない
    #[error("unexpected reply to `{command}`: missing {field}")]
    MalformedReply {
        command: String,
        field: &'static str,
    },
}
