//! エミュレータとデバッガのサブプロセス

use crate::errors::SessionError;
use crate::mi::MiRecord;
use crate::Result;
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::oneshot;
use tracing::debug;

/// 制御ループへのメッセージ
#[derive(Debug)]
pub enum Event {
    /// デバッガの出力行（改行なし）
    DebuggerLine { generation: u64, line: String },
    /// デバッガの標準出力が閉じた
    DebuggerClosed { generation: u64 },
    /// オペレータの入力行
    Input(String),
    /// オペレータの入力が閉じた
    InputClosed,
    /// 自動化スレッドからのMIコマンドの依頼
    AutomationRequest {
        generation: u64,
        command: String,
        reply: oneshot::Sender<MiRecord>,
    },
    /// 自動化スレッドからのオペレータ向け出力
    AutomationOutput { generation: u64, text: String },
    /// ユーザーコマンドの完了（errorがNoneなら成功）
    AutomationDone {
        generation: u64,
        token: Option<u64>,
        error: Option<String>,
    },
}

fn command_for(role: &'static str, argv: &[String], cwd: &str) -> Result<Command> {
    let (program, args) = argv
        .split_first()
        .ok_or(SessionError::EmptyCommand { role })?;
    let mut command = Command::new(program);
    command.args(args).current_dir(cwd);
    Ok(command)
}

fn spawn(role: &'static str, argv: &[String], mut command: Command) -> Result<Child> {
    let child = command.spawn().map_err(|source| SessionError::Spawn {
        role,
        program: argv.join(" "),
        source,
    })?;
    Ok(child)
}

/// SIGTERMを送る（既に終了していれば何もしない）
fn terminate(child: &Child) -> Result<()> {
    let Some(pid) = child.id() else {
        return Ok(());
    };
    match kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(anyhow::anyhow!("Failed to terminate process {}: {}", pid, e)),
    }
}

/// エミュレータ
///
/// セッション全体で1つだけ起動し、再起動しません。出力はtracingに流すだけです。
pub struct Emulator {
    child: Child,
}

impl Emulator {
    /// エミュレータを起動する
    pub fn spawn(argv: &[String], cwd: &str) -> Result<Self> {
        let mut command = command_for("emulator", argv, cwd)?;
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        let mut child = spawn("emulator", argv, command)?;

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(drain("stdout", stdout));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(drain("stderr", stderr));
        }
        debug!("emulator started: {:?}", child.id());
        Ok(Self { child })
    }

    /// 終了していれば終了ステータスを返す
    pub fn try_wait(&mut self) -> Result<Option<ExitStatus>> {
        Ok(self.child.try_wait()?)
    }

    /// 終了を待つ
    pub async fn wait(&mut self) -> Result<ExitStatus> {
        Ok(self.child.wait().await?)
    }
}

/// エミュレータの出力を読み捨てる
async fn drain<R: AsyncRead + Unpin>(stream: &'static str, reader: R) {
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(target: "enkel::emulator", stream, "{}", line);
    }
}

/// デバッガの1インスタンス
pub struct Debugger {
    child: Child,
    stdin: ChildStdin,
    generation: u64,
}

impl Debugger {
    /// デバッガを起動し、出力を制御ループに流すタスクを開始する
    ///
    /// 標準エラーも標準出力と同じようにオペレータに転送します。
    /// インスタンスの終了は標準出力が閉じたことで通知します。
    pub fn spawn(
        argv: &[String],
        cwd: &str,
        generation: u64,
        events: UnboundedSender<Event>,
    ) -> Result<Self> {
        let mut command = command_for("debugger", argv, cwd)?;
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        let mut child = spawn("debugger", argv, command)?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow::anyhow!("Debugger stdin is not piped"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow::anyhow!("Debugger stdout is not piped"))?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(pump(stderr, generation, events.clone(), false));
        }
        tokio::spawn(pump(stdout, generation, events, true));

        debug!("debugger #{} started: {:?}", generation, child.id());
        Ok(Self {
            child,
            stdin,
            generation,
        })
    }

    /// インスタンスの世代番号
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// コマンドを1行送る
    pub async fn send_line(&mut self, line: &str) -> std::io::Result<()> {
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.write_all(b"\n").await?;
        self.stdin.flush().await
    }

    /// SIGTERMを送る
    pub fn terminate(&self) -> Result<()> {
        terminate(&self.child)
    }

    /// 終了を待つ
    pub async fn wait(&mut self) -> Result<ExitStatus> {
        Ok(self.child.wait().await?)
    }
}

/// デバッガの出力を行ごとに制御ループへ送る
async fn pump<R: AsyncRead + Unpin>(
    reader: R,
    generation: u64,
    events: UnboundedSender<Event>,
    report_close: bool,
) {
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if events.send(Event::DebuggerLine { generation, line }).is_err() {
            return;
        }
    }
    if report_close {
        let _ = events.send(Event::DebuggerClosed { generation });
    }
}
