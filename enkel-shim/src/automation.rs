//! セッション内の自動化コントローラ
//!
//! コントローラはバックエンドの呼び出しが同期的に完了することを前提にしているので、
//! デバッガインスタンスごとに専用のスレッドで動かします。スレッドはMIコマンドを
//! 制御ループに依頼し、制御ループが自動化用のトークンを付けてデバッガに書き込み、
//! 同じトークンの結果レコードをスレッドに返します。

use crate::backend::{CommandRegistry, MiBackend, MiChannel};
use crate::errors::SessionError;
use crate::mi::MiRecord;
use crate::process::Event;
use crate::Result;
use enkel_core::{Controller, ControllerConfig};
use enkel_target::{DebugBackend, HookId, StopDecision};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// 制御ループから自動化スレッドへの通知
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutomationEvent {
    /// 初期コマンドを送り終えた
    Attach,
    /// ブレークポイントで停止した
    Stopped(HookId),
    /// オペレータが登録済みのユーザーコマンドを入力した
    UserCommand { token: Option<u64>, text: String },
}

/// 制御ループを通したMIチャネル
pub struct LoopChannel {
    generation: u64,
    events: UnboundedSender<Event>,
}

impl LoopChannel {
    /// ユーザーコマンドの完了を通知する
    fn finish(&self, token: Option<u64>, error: Option<String>) {
        let _ = self.events.send(Event::AutomationDone {
            generation: self.generation,
            token,
            error,
        });
    }
}

impl MiChannel for LoopChannel {
    fn request(&mut self, command: &str) -> Result<MiRecord> {
        let (reply, answer) = oneshot::channel();
        self.events
            .send(Event::AutomationRequest {
                generation: self.generation,
                command: command.to_string(),
                reply,
            })
            .map_err(|_| anyhow::anyhow!("Session has ended"))?;
        answer.blocking_recv().map_err(|_| {
            SessionError::NoReply {
                command: command.to_string(),
            }
            .into()
        })
    }

    fn console(&mut self, text: &str) {
        let _ = self.events.send(Event::AutomationOutput {
            generation: self.generation,
            text: text.to_string(),
        });
    }
}

/// 1つのデバッガインスタンスに付く自動化
///
/// ドロップするとスレッドは処理中のイベントを終えてから止まります。
pub struct Automation {
    events: UnboundedSender<AutomationEvent>,
    commands: CommandRegistry,
}

impl Automation {
    /// 自動化スレッドを起動する
    pub fn spawn(
        config: ControllerConfig,
        generation: u64,
        loop_events: UnboundedSender<Event>,
    ) -> Result<Self> {
        let (events, receiver) = mpsc::unbounded_channel();
        let commands = CommandRegistry::default();
        let backend = MiBackend::new(
            LoopChannel {
                generation,
                events: loop_events,
            },
            commands.clone(),
        );

        std::thread::Builder::new()
            .name(format!("enkel-automation-{}", generation))
            .spawn(move || run_worker(config, backend, receiver))
            .map_err(|e| anyhow::anyhow!("Failed to start automation thread: {}", e))?;

        Ok(Self { events, commands })
    }

    /// スレッドにイベントを渡す
    pub fn notify(&self, event: AutomationEvent) {
        if self.events.send(event).is_err() {
            warn!("automation thread has stopped");
        }
    }

    /// 入力されたCLIコマンドが登録済みのユーザーコマンドかどうか
    pub fn handles(&self, text: &str) -> bool {
        let Some(name) = text.split_whitespace().next() else {
            return false;
        };
        self.commands
            .lock()
            .map(|commands| commands.contains_key(name))
            .unwrap_or(false)
    }
}

fn run_worker(
    config: ControllerConfig,
    mut backend: MiBackend<LoopChannel>,
    mut events: UnboundedReceiver<AutomationEvent>,
) {
    let mut config = Some(config);
    let mut controller: Option<Controller> = None;

    while let Some(event) = events.blocking_recv() {
        match event {
            AutomationEvent::Attach => {
                let Some(config) = config.take() else {
                    continue;
                };
                match Controller::install(&mut backend, config) {
                    Ok(installed) => {
                        info!("automation installed");
                        controller = Some(installed);
                    }
                    Err(e) => {
                        warn!("automation disabled: {:#}", e);
                        backend.print(&format!("Automation disabled: {:#}", e));
                    }
                }
            }
            AutomationEvent::Stopped(hook) => {
                let Some(controller) = controller.as_mut() else {
                    continue;
                };
                if controller.on_stop(&mut backend, hook) == StopDecision::Resume {
                    if let Err(e) = backend.resume() {
                        warn!("failed to resume after {:?}: {:#}", hook, e);
                    }
                }
            }
            AutomationEvent::UserCommand { token, text } => {
                let error = backend
                    .run_user_command(&text)
                    .err()
                    .map(|e| format!("{:#}", e));
                backend.channel_mut().finish(token, error);
            }
        }
    }
    debug!("automation thread finished");
}
