//! 自動化コントローラ
//!
//! デバッガ内で動く自動化のメインロジックです。スクリプトが読み込まれると
//! エントリゲートだけを設定し、カーネルがゲートに到達した時点で
//! 残りの診断フックとユーザーコマンドを設定します。
//!
//! 状態遷移:
//! ```text
//! Unarmed --(エントリゲート到達)--> Installing --> Armed
//! ```

use crate::command::{translate_address, TRANSLATE_ADDRESS};
use crate::errors::ERR_HOOK_NOT_RESOLVED;
use crate::hooks::{Hook, HookKind, HookTable};
use crate::modules::ModuleSync;
use crate::{ControllerConfig, Result};
use enkel_target::{DebugBackend, HookId, StopDecision};
use tracing::{debug, info, warn};

/// コントローラの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// エントリゲートのみ設定済み
    Unarmed,
    /// 診断フックを設定中
    Installing,
    /// 全フック設定済み
    Armed,
}

/// 自動化コントローラ
pub struct Controller {
    config: ControllerConfig,
    state: ControllerState,
    /// エントリゲートのブレークポイント
    entry_gate: HookId,
    hooks: HookTable,
    modules: ModuleSync,
    debugger_attached: bool,
}

impl Controller {
    /// スクリプト読み込み時の処理
    ///
    /// 前処理コマンドを実行し、エントリゲートを設定します。
    /// エントリゲートのシンボルが解決できなければ失敗します。
    pub fn install(backend: &mut dyn DebugBackend, config: ControllerConfig) -> Result<Self> {
        for command in &config.preamble {
            backend.execute(command)?;
        }

        let mut hooks = HookTable::new();
        let entry_gate = hooks
            .install(backend, &config.entry_hook, HookKind::GenericStop)
            .map_err(|e| anyhow::anyhow!("{}: {}: {:#}", ERR_HOOK_NOT_RESOLVED, config.entry_hook, e))?;
        info!("entry gate {} installed", config.entry_hook);

        let modules = ModuleSync::new(&config);
        Ok(Self {
            config,
            state: ControllerState::Unarmed,
            entry_gate,
            hooks,
            modules,
            debugger_attached: false,
        })
    }

    /// 現在の状態
    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// カーネルにデバッガ接続を通知したかどうか
    pub fn debugger_attached(&self) -> bool {
        self.debugger_attached
    }

    /// 設定済みのフック
    pub fn hooks(&self) -> &HookTable {
        &self.hooks
    }

    /// モジュールのシンボル同期
    pub fn modules(&self) -> &ModuleSync {
        &self.modules
    }

    /// ブレークポイントで停止したときのコールバック
    ///
    /// 戻り値がターゲットを止めたままにするかどうかを決めます。
    /// 知らないIDで呼ばれた場合はオペレータの判断に任せるため停止します。
    pub fn on_stop(&mut self, backend: &mut dyn DebugBackend, id: HookId) -> StopDecision {
        if id == self.entry_gate {
            return self.on_entry_gate(backend);
        }

        let Some(hook) = self.hooks.get(id).cloned() else {
            debug!("stop at unknown hook {:?}", id);
            return StopDecision::Stop;
        };

        match hook.kind {
            HookKind::FaultVerbose => self.on_fault(backend, &hook, true),
            HookKind::FaultSilent => self.on_fault(backend, &hook, false),
            HookKind::GenericStop => {
                backend.print(&format!("{} hit", hook.name));
                StopDecision::Stop
            }
            HookKind::ModuleLoad => self.modules.on_module_load(backend),
            HookKind::ModuleUnload => self.modules.on_module_unload(backend),
        }
    }

    /// エントリゲート到達時の処理
    fn on_entry_gate(&mut self, backend: &mut dyn DebugBackend) -> StopDecision {
        if self.state != ControllerState::Unarmed {
            // 2回目以降の到達では何もしない
            return StopDecision::Resume;
        }

        backend.print("Debugger attached");
        match backend.evaluate(&format!("{} = true", self.config.attached_flag)) {
            Ok(_) => self.debugger_attached = true,
            Err(e) => warn!("failed to set {}: {:#}", self.config.attached_flag, e),
        }

        self.state = ControllerState::Installing;
        self.install_hooks(backend);

        if let Err(e) = backend.register_command(TRANSLATE_ADDRESS, translate_address) {
            warn!("failed to register {}: {:#}", TRANSLATE_ADDRESS, e);
        }

        self.state = ControllerState::Armed;
        info!("armed with {} hooks", self.hooks.count().saturating_sub(1));
        StopDecision::Resume
    }

    /// 設定された診断フックを全て設定する
    ///
    /// 解決できないシンボルは警告してスキップします。
    fn install_hooks(&mut self, backend: &mut dyn DebugBackend) {
        for spec in &self.config.hooks {
            if let Err(e) = self.hooks.install(backend, &spec.name, spec.kind) {
                warn!("{}: {}: {:#}", ERR_HOOK_NOT_RESOLVED, spec.name, e);
            }
        }
    }

    /// 例外ハンドラのフック
    fn on_fault(&self, backend: &mut dyn DebugBackend, hook: &Hook, verbose: bool) -> StopDecision {
        backend.print(&format!("Top of stack for {}:", hook.name));
        if verbose {
            run_logged(backend, &self.config.hook_state_command);
        }
        run_logged(backend, &self.config.stack_dump_command);
        StopDecision::Stop
    }
}

/// コマンドを実行し、失敗はログに残すだけにする
fn run_logged(backend: &mut dyn DebugBackend, command: &str) {
    if let Err(e) = backend.execute(command) {
        warn!("{} failed: {:#}", command, e);
    }
}
