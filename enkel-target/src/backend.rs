//! デバッガバックエンドの能力インターフェース
//!
//! 自動化コントローラはこのトレイトだけを通してデバッガを操作します。
//! gdbのスクリプト環境でも、テスト用のシミュレータでも同じように動作します。

use crate::{MemoryReader, Result};

/// バックエンドが割り当てるブレークポイントID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HookId(pub u32);

/// ブレークポイント停止時のコールバックの判断
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopDecision {
    /// ターゲットを停止したままにする
    Stop,
    /// 実行を再開する
    Resume,
}

/// ユーザーコマンドのハンドラ
///
/// 第2引数はコマンド名より後ろの引数文字列です。
pub type CommandHandler = fn(&mut dyn DebugBackend, &str) -> Result<()>;

/// デバッガバックエンド
pub trait DebugBackend: MemoryReader {
    /// アドレスにブレークポイントを設定する
    fn install_breakpoint(&mut self, address: u64) -> Result<HookId>;

    /// 式を評価して数値を得る
    fn evaluate(&mut self, expression: &str) -> Result<u64>;

    /// デバッガのコマンドを実行する
    fn execute(&mut self, command: &str) -> Result<()>;

    /// ユーザーコマンドを登録する
    fn register_command(&mut self, name: &str, handler: CommandHandler) -> Result<()>;

    /// 指定したスタックフレームの引数またはローカル変数を読み取る
    ///
    /// フレーム0はブレークポイントを設定した関数自身、1はその呼び出し元です。
    fn read_frame_value(&mut self, frame: usize, name: &str) -> Result<u64>;

    /// オペレータに見える出力へ書き込む
    fn print(&mut self, text: &str);
}
