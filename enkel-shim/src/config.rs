//! セッションの設定

use enkel_core::ControllerConfig;
use std::path::PathBuf;
use std::time::Duration;

/// IDEが作業ディレクトリの代わりに送ってくるプレースホルダ
pub const PLACEHOLDER: &str = "/mnt//INVALID_CWD";

/// トランスクリプトの既定のパス
pub const DEFAULT_TRANSCRIPT: &str = "/tmp/vs_gdb_log.txt";

/// 再起動までの既定の待ち時間
pub const DEFAULT_RESTART_DELAY: Duration = Duration::from_millis(500);

/// 接続後に最初のプロンプトで送るコマンド
pub fn default_initial_commands() -> Vec<String> {
    vec![
        "100-gdb-set mi-async on".to_string(),
        "102-target-select remote localhost:5000".to_string(),
        "101-interpreter-exec console \"python exec(open('tools/qemu_gdb_onlaunch.py').read())\""
            .to_string(),
    ]
}

/// セッション内の自動化を使うときの初期コマンド
///
/// gdb側のスクリプトは読み込まず、接続だけを行います。
pub fn automation_initial_commands() -> Vec<String> {
    default_initial_commands().into_iter().take(2).collect()
}

/// 既定のルートディレクトリ（`<home>/Enkel/`）
pub fn default_root() -> Option<String> {
    home::home_dir().map(|home| format!("{}/Enkel/", home.display()))
}

/// デバッガ出力から拾うマーカー
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markers {
    /// 入力待ちプロンプト
    pub prompt: String,
    /// ブレークポイント停止イベント
    pub breakpoint_hit: String,
    /// モジュールロードフックの関数名
    pub load_hook: String,
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            prompt: "(gdb)".to_string(),
            breakpoint_hit: "stopped,reason=\"breakpoint-hit".to_string(),
            load_hook: "OnBinaryLoadHook_Inner".to_string(),
        }
    }
}

/// セッションの設定
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// プロジェクトのルートディレクトリ（子プロセスの作業ディレクトリ）
    pub root: String,
    /// エミュレータのコマンドライン
    pub emulator: Vec<String>,
    /// デバッガのコマンドライン
    pub debugger: Vec<String>,
    /// デバッガごとに最初のプロンプトで送るコマンド
    pub initial_commands: Vec<String>,
    pub markers: Markers,
    /// トランスクリプトの出力先（Noneなら記録しない）
    pub transcript: Option<PathBuf>,
    pub restart_delay: Duration,
    /// セッション内で動かす自動化コントローラの設定（Noneならgdb側に任せる）
    pub automation: Option<ControllerConfig>,
}

impl SessionConfig {
    /// 既定値でセッションの設定を作成する
    pub fn new(root: impl Into<String>, debugger: Vec<String>) -> Self {
        Self {
            root: root.into(),
            emulator: vec!["sh".to_string(), "run.sh".to_string()],
            debugger,
            initial_commands: default_initial_commands(),
            markers: Markers::default(),
            transcript: Some(PathBuf::from(DEFAULT_TRANSCRIPT)),
            restart_delay: DEFAULT_RESTART_DELAY,
            automation: None,
        }
    }

    /// 自動化コントローラをセッション内で動かす
    ///
    /// 初期コマンドは接続までになり、ロードフック後の再開はコントローラが判断します。
    pub fn with_automation(mut self, controller: ControllerConfig) -> Self {
        self.initial_commands = automation_initial_commands();
        self.automation = Some(controller);
        self
    }
}
