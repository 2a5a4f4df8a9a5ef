//! デバッガ出力のイベント多重化
//!
//! デバッガの出力を1行ずつ受け取り、2つの非同期イベントだけを認識します。
//!
//! - プロンプト: デバッガインスタンスごとに最初の1回だけ初期コマンドを送る
//! - モジュールロードフックでの停止: 次のプロンプトで1回だけ`-exec-continue`を送る
//!
//! それ以外の行は中身を見ずに通します。書き込みは呼び出し側が行うため、
//! ここはI/Oを持たない純粋な状態機械です。

use crate::config::Markers;

/// ロードイベント後に送る継続コマンド
pub const CONTINUE_COMMAND: &str = "-exec-continue";

/// 出力イベントの多重化器
#[derive(Debug, Clone)]
pub struct Multiplexer {
    markers: Markers,
    initial_commands: Vec<String>,
    /// 初期コマンドを送ったかどうか
    sent_initial: bool,
    /// ロードイベント後のプロンプト待ち
    load_pending: bool,
    /// ロードイベント後に継続コマンドを送るかどうか
    auto_continue: bool,
}

impl Multiplexer {
    /// デバッガインスタンス用の多重化器を作成する
    pub fn new(markers: Markers, initial_commands: Vec<String>) -> Self {
        Self {
            markers,
            initial_commands,
            sent_initial: false,
            load_pending: false,
            auto_continue: true,
        }
    }

    /// ロードイベント後の継続を有効・無効にする
    ///
    /// セッション内の自動化がロードフックを処理するときは、再開も自動化が行います。
    pub fn with_auto_continue(mut self, enabled: bool) -> Self {
        self.auto_continue = enabled;
        self
    }

    /// 出力行を1行観測し、デバッガに注入するコマンドを返す
    pub fn observe(&mut self, line: &str) -> Vec<String> {
        let mut inject = Vec::new();
        let is_prompt = line.contains(&self.markers.prompt);

        if is_prompt && !self.sent_initial {
            self.sent_initial = true;
            inject.extend(self.initial_commands.iter().cloned());
        }

        if self.auto_continue && self.is_load_event(line) {
            self.load_pending = true;
        }

        if is_prompt && self.load_pending {
            self.load_pending = false;
            inject.push(CONTINUE_COMMAND.to_string());
        }

        inject
    }

    /// 初期コマンドを送ったかどうか
    pub fn sent_initial(&self) -> bool {
        self.sent_initial
    }

    /// 継続コマンドを送る予定があるかどうか
    pub fn load_pending(&self) -> bool {
        self.load_pending
    }

    fn is_load_event(&self, line: &str) -> bool {
        line.contains(&self.markers.breakpoint_hit) && line.contains(&self.markers.load_hook)
    }
}
