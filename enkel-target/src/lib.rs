//! Enkel ターゲットアクセス
//!
//! このクレートは、デバッグ対象のカーネルに触れるための能力インターフェースを提供します。
//! メモリ読み取り、ブレークポイントの設定依頼、式の評価、コマンド実行などを
//! 特定のデバッガに依存しない形で抽象化します。

pub mod backend;
pub mod errors;
pub mod memory;
pub mod sim;

pub use backend::{CommandHandler, DebugBackend, HookId, StopDecision};
pub use errors::BackendError;
pub use memory::{AddressSpace, MemoryReader};
pub use sim::{SimMemory, SimTarget};

/// ターゲット制御の結果型
pub type Result<T> = anyhow::Result<T>;
