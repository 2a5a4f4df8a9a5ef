//! セッションスーパーバイザ
//!
//! エミュレータを1度だけ起動し、デバッガが終了するたびに新しいデバッガを
//! 起動し直します。オペレータ（IDE）の入力とデバッガの出力はそれぞれの
//! タスクから1つの制御ループに集まり、デバッガへの書き込みと
//! トランスクリプトへの記録は制御ループだけが行います。

use crate::automation::{Automation, AutomationEvent};
use crate::config::SessionConfig;
use crate::mi::{console_input, console_record, result_record, MiRecord, RecordKind};
use crate::multiplexer::Multiplexer;
use crate::process::{Debugger, Emulator, Event};
use crate::rewrite::rewrite_placeholder;
use crate::transcript::Transcript;
use crate::Result;
use enkel_target::HookId;
use std::collections::HashMap;
use std::future::Future;
use std::process::ExitStatus;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// 自動化が付けるトークンの先頭（IDEのトークンと重ならない範囲）
pub const AUTOMATION_TOKEN_BASE: u64 = 900_000_000;

/// セッションの終了理由
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// デバッガの終了時にエミュレータも終了していた
    EmulatorExited(ExitStatus),
    /// オペレータによる中断
    Interrupted,
    /// オペレータの入力が閉じた
    InputClosed,
}

/// 1つのデバッガインスタンスの終わり方
enum InstanceEnd {
    /// デバッガが自分で終了した
    Exited,
    /// セッションを終える
    Session(SessionEnd),
}

/// 1つのデバッガインスタンスと、それに付く状態
struct Instance {
    debugger: Debugger,
    mux: Multiplexer,
    automation: Option<Automation>,
    /// 自動化の依頼の応答待ち（トークン -> 返信先）
    pending: HashMap<u64, oneshot::Sender<MiRecord>>,
    next_token: u64,
}

/// セッションスーパーバイザ
pub struct Session {
    config: SessionConfig,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    /// 標準入出力とCtrl+Cでセッションを実行する
    pub async fn run(self) -> Result<SessionEnd> {
        let input = tokio::io::BufReader::new(tokio::io::stdin());
        let output = tokio::io::stdout();
        let cancel = async {
            if tokio::signal::ctrl_c().await.is_err() {
                // シグナルを待てない場合は中断されないものとして扱う
                std::future::pending::<()>().await;
            }
        };
        self.run_with(input, output, cancel).await
    }

    /// 入力・出力・中断を指定してセッションを実行する
    ///
    /// エミュレータが終了するか、中断されるか、入力が閉じるまで戻りません。
    pub async fn run_with<I, O, C>(self, input: I, mut output: O, cancel: C) -> Result<SessionEnd>
    where
        I: AsyncBufRead + Unpin + Send + 'static,
        O: AsyncWrite + Unpin,
        C: Future<Output = ()>,
    {
        let config = self.config;
        tokio::pin!(cancel);

        let mut transcript = match &config.transcript {
            Some(path) => Transcript::create(path, &config.root).await?,
            None => Transcript::disabled(),
        };

        let mut emulator = Emulator::spawn(&config.emulator, &config.root)?;
        info!("emulator started in {}", config.root);

        let (events_tx, mut events) = mpsc::unbounded_channel();
        tokio::spawn(read_input(input, events_tx.clone()));

        let mut generation = 0;
        loop {
            if let Some(status) = emulator.try_wait()? {
                info!("emulator exited: {}", status);
                return Ok(SessionEnd::EmulatorExited(status));
            }

            generation += 1;
            let debugger =
                Debugger::spawn(&config.debugger, &config.root, generation, events_tx.clone())?;
            let automation = match &config.automation {
                Some(controller) => Some(Automation::spawn(
                    controller.clone(),
                    generation,
                    events_tx.clone(),
                )?),
                None => None,
            };
            let mux = Multiplexer::new(config.markers.clone(), config.initial_commands.clone())
                .with_auto_continue(automation.is_none());
            let mut instance = Instance {
                debugger,
                mux,
                automation,
                pending: HashMap::new(),
                next_token: AUTOMATION_TOKEN_BASE,
            };

            let end = run_instance(
                &config,
                &mut instance,
                &mut events,
                &mut output,
                &mut transcript,
                cancel.as_mut(),
            )
            .await;

            let debugger = &mut instance.debugger;
            match end {
                InstanceEnd::Exited => {
                    let status = debugger.wait().await?;
                    info!("debugger #{} exited: {}", generation, status);
                }
                InstanceEnd::Session(end) => {
                    if let Err(e) = debugger.terminate() {
                        warn!("{:#}", e);
                    }
                    debugger.wait().await?;
                    if end == SessionEnd::Interrupted {
                        return interrupted(&mut emulator).await;
                    }
                    return Ok(end);
                }
            }
            // 応答待ちの依頼と自動化スレッドはここで手放す
            drop(instance);

            tokio::select! {
                _ = cancel.as_mut() => return interrupted(&mut emulator).await,
                _ = tokio::time::sleep(config.restart_delay) => {}
            }
        }
    }
}

/// 中断時はエミュレータの終了を待ってから戻る
async fn interrupted(emulator: &mut Emulator) -> Result<SessionEnd> {
    info!("interrupted, waiting for the emulator");
    emulator.wait().await?;
    Ok(SessionEnd::Interrupted)
}

/// 1つのデバッガインスタンスの間、イベントを処理する
async fn run_instance<O, C>(
    config: &SessionConfig,
    instance: &mut Instance,
    events: &mut UnboundedReceiver<Event>,
    output: &mut O,
    transcript: &mut Transcript,
    mut cancel: std::pin::Pin<&mut C>,
) -> InstanceEnd
where
    O: AsyncWrite + Unpin,
    C: Future<Output = ()>,
{
    let generation = instance.debugger.generation();
    loop {
        let event = tokio::select! {
            _ = cancel.as_mut() => return InstanceEnd::Session(SessionEnd::Interrupted),
            event = events.recv() => event,
        };
        let Some(event) = event else {
            return InstanceEnd::Session(SessionEnd::InputClosed);
        };

        match event {
            Event::DebuggerLine { generation: g, line } if g == generation => {
                on_debugger_line(config, instance, output, transcript, line).await;
            }
            Event::DebuggerClosed { generation: g } if g == generation => {
                return InstanceEnd::Exited;
            }
            Event::AutomationRequest {
                generation: g,
                command,
                reply,
            } if g == generation => {
                let token = instance.next_token;
                instance.next_token += 1;
                let line = format!("{}{}", token, command);
                match instance.debugger.send_line(&line).await {
                    Ok(()) => {
                        transcript.command(&line).await;
                        instance.pending.insert(token, reply);
                    }
                    // 返信先を捨てると依頼した側はエラーになる
                    Err(e) => warn!("automation write to debugger #{} failed: {}", g, e),
                }
            }
            Event::AutomationOutput { generation: g, text } if g == generation => {
                let line = console_record(&text);
                forward(output, &line).await;
                transcript.output(&line).await;
            }
            Event::AutomationDone {
                generation: g,
                token,
                error,
            } if g == generation => {
                let line = result_record(token, error.as_deref());
                forward(output, &line).await;
                transcript.output(&line).await;
            }
            Event::DebuggerLine { generation: g, .. }
            | Event::DebuggerClosed { generation: g }
            | Event::AutomationRequest { generation: g, .. }
            | Event::AutomationOutput { generation: g, .. }
            | Event::AutomationDone { generation: g, .. } => {
                debug!("dropping event from debugger #{}", g);
            }
            Event::Input(command) => {
                let command = command.trim();
                if let Some(automation) = &instance.automation {
                    if let Some((token, text)) = console_input(command) {
                        if automation.handles(&text) {
                            transcript.command(command).await;
                            automation.notify(AutomationEvent::UserCommand { token, text });
                            continue;
                        }
                    }
                }
                send_command(config, &mut instance.debugger, transcript, command).await;
            }
            Event::InputClosed => {
                info!("operator input closed");
                return InstanceEnd::Session(SessionEnd::InputClosed);
            }
        }
    }
}

/// デバッガの出力行を処理する
///
/// 自動化の依頼への結果レコードは自動化スレッドにだけ返し、オペレータには見せません。
async fn on_debugger_line<O: AsyncWrite + Unpin>(
    config: &SessionConfig,
    instance: &mut Instance,
    output: &mut O,
    transcript: &mut Transcript,
    line: String,
) {
    let record = match instance.automation {
        Some(_) => MiRecord::parse(&line),
        None => None,
    };

    let waiting = record
        .as_ref()
        .filter(|r| r.kind == RecordKind::Result)
        .and_then(|r| r.token)
        .and_then(|token| instance.pending.remove(&token));
    if let Some(reply) = waiting {
        transcript.output(&line).await;
        if let Some(record) = record {
            let _ = reply.send(record);
        }
        return;
    }

    forward(output, &line).await;
    transcript.output(&line).await;

    let attached = instance.mux.sent_initial();
    for command in instance.mux.observe(&line) {
        send_command(config, &mut instance.debugger, transcript, &command).await;
    }

    if let Some(automation) = &instance.automation {
        if !attached && instance.mux.sent_initial() {
            automation.notify(AutomationEvent::Attach);
        }
        if let Some(number) = record.as_ref().and_then(MiRecord::breakpoint_hit) {
            automation.notify(AutomationEvent::Stopped(HookId(number)));
        }
    }
}

/// プレースホルダを置換してデバッガにコマンドを送る
///
/// 書き込みに失敗したインスタンスは終了させ、標準出力が閉じるのを待ちます。
async fn send_command(
    config: &SessionConfig,
    debugger: &mut Debugger,
    transcript: &mut Transcript,
    command: &str,
) {
    let rewritten = rewrite_placeholder(command, &config.root);
    if rewritten != command {
        transcript.rewrite(command, &rewritten).await;
    }

    if let Err(e) = debugger.send_line(&rewritten).await {
        warn!("write to debugger #{} failed: {}", debugger.generation(), e);
        if let Err(e) = debugger.terminate() {
            warn!("{:#}", e);
        }
        return;
    }
    transcript.command(&rewritten).await;
}

/// デバッガの出力をそのままオペレータに渡す
async fn forward<O: AsyncWrite + Unpin>(output: &mut O, line: &str) {
    let written = async {
        output.write_all(line.as_bytes()).await?;
        output.write_all(b"\n").await?;
        output.flush().await
    }
    .await;
    if let Err(e) = written {
        warn!("write to operator failed: {}", e);
    }
}

/// オペレータの入力を行ごとに制御ループへ送る
///
/// 標準入力は開き直せないため、セッション全体で1つだけ動かします。
async fn read_input<I: AsyncBufRead + Unpin>(input: I, events: UnboundedSender<Event>) {
    let mut lines = input.lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if events.send(Event::Input(line)).is_err() {
                    return;
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!("operator input failed: {}", e);
                break;
            }
        }
    }
    let _ = events.send(Event::InputClosed);
}
