//! 自動化コントローラの設定

use crate::hooks::HookKind;

/// フックの設定（シンボル名と種類）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookSpec {
    pub name: String,
    pub kind: HookKind,
}

impl HookSpec {
    pub fn new(name: &str, kind: HookKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
        }
    }
}

/// 自動化コントローラの設定
///
/// `Default`はEnkelカーネルのシンボル名を使います。
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// スクリプト読み込み時に実行するコマンド
    pub preamble: Vec<String>,
    /// デバッガ接続後に最初に呼ばれるカーネル関数（エントリゲート）
    pub entry_hook: String,
    /// デバッガ接続を示すカーネル変数
    pub attached_flag: String,
    /// 接続時に設定する診断フック
    pub hooks: Vec<HookSpec>,
    /// モジュール名と基底アドレスを読み取るフレーム番号
    pub module_frame: usize,
    /// モジュールパス（UTF-16文字列へのポインタ）の引数名
    pub module_path_arg: String,
    /// モジュールの実行時基底アドレスの変数名
    pub module_base_arg: String,
    /// モジュールのシンボルファイルを置くディレクトリ
    pub symbol_root: String,
    /// フックの状態を表示するコマンド
    pub hook_state_command: String,
    /// スタックトップを表示するコマンド
    pub stack_dump_command: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            preamble: vec![
                "set logging overwrite on".to_string(),
                "set logging on".to_string(),
                "set output-radix 16".to_string(),
                "add-symbol-file boot_iso/boot_part/kernel/enkel.elf".to_string(),
            ],
            entry_hook: "OnKernelMainHook".to_string(),
            attached_flag: "GIsDebuggerPresent".to_string(),
            hooks: vec![
                HookSpec::new("DebuggerHook", HookKind::GenericStop),
                HookSpec::new("HaltPermanently", HookKind::GenericStop),
                HookSpec::new("ISR_GeneralProtectionFault", HookKind::FaultVerbose),
                HookSpec::new("ISR_PageFault", HookKind::FaultVerbose),
                HookSpec::new("ISR_InvalidOpcode", HookKind::FaultSilent),
                HookSpec::new("ISR_Breakpoint", HookKind::FaultSilent),
                HookSpec::new("OnBinaryLoadHook_Inner", HookKind::ModuleLoad),
                HookSpec::new("OnBinaryUnloadHook_Inner", HookKind::ModuleUnload),
            ],
            module_frame: 1,
            module_path_arg: "programName".to_string(),
            module_base_arg: "imageBase".to_string(),
            symbol_root: "boot_iso/boot_part".to_string(),
            hook_state_command: "info break".to_string(),
            stack_dump_command: "x/16gx $rsp".to_string(),
        }
    }
}
