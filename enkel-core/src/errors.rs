//! エラー型とエラーメッセージ定数

use thiserror::Error;

/// ターゲットにフックのシンボルが見つからない場合のエラーメッセージ
pub const ERR_HOOK_NOT_RESOLVED: &str = "Hook symbol could not be resolved";

/// `translate_address`の使い方
pub const USAGE_TRANSLATE_ADDRESS: &str = "Usage: translate_address <address>";

/// モジュール名のデコードエラー
#[derive(Debug, Error)]
pub enum DecodeError {
    /// 上限までにNUL終端が見つからない
    #[error("module name at 0x{address:x} is not terminated within {limit} code units")]
    Unterminated { address: u64, limit: usize },

    /// 不正なUTF-16（対になっていないサロゲート）
    #[error("module name at 0x{address:x} is not valid UTF-16")]
    InvalidUtf16 { address: u64 },

    /// 文字列のメモリを読み取れない
    #[error("failed to read module name at 0x{address:x}: {source}")]
    Memory {
        address: u64,
        #[source]
        source: anyhow::Error,
    },
}
