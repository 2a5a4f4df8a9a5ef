//! GDB/MIを通したデバッガバックエンド
//!
//! 自動化コントローラの能力インターフェースを、実行中のgdbへのMIコマンドで実装します。
//! コマンドの送受信は[`MiChannel`]に任せるので、ここは同期的な変換だけを行います。
//!
//! 物理メモリはQEMUのgdbスタブの`PhyMemMode`を一時的に有効にして読み取ります。

use crate::errors::SessionError;
use crate::mi::{console_command, quote, MiRecord, MiValue};
use crate::multiplexer::CONTINUE_COMMAND;
use crate::Result;
use enkel_target::{
    AddressSpace, BackendError, CommandHandler, DebugBackend, HookId, MemoryReader,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// QEMUのgdbスタブを物理メモリモードにする
const PHYS_MODE_ON: &str = "maintenance packet Qqemu.PhyMemMode:1";
/// 仮想メモリモードに戻す
const PHYS_MODE_OFF: &str = "maintenance packet Qqemu.PhyMemMode:0";

/// 登録済みのユーザーコマンド（制御ループと共有する）
pub type CommandRegistry = Arc<Mutex<HashMap<String, CommandHandler>>>;

/// MIコマンドの送受信
pub trait MiChannel {
    /// コマンドを1つ送り、その結果レコードを待つ
    fn request(&mut self, command: &str) -> Result<MiRecord>;

    /// オペレータのコンソールに1行書く
    fn console(&mut self, text: &str);
}

/// gdbの値の表示から数値を取り出す
///
/// `0x1000`、`42`、`true`のほか、`(void (*)(void)) 0xffff800000001000 <OnKernelMainHook>`
/// のような型付きの表示も受け付けます。
pub fn parse_gdb_value(text: &str) -> Option<u64> {
    let mut text = text.trim();
    match text {
        "true" => return Some(1),
        "false" => return Some(0),
        _ => {}
    }

    if text.starts_with('(') {
        let mut depth = 0usize;
        let mut end = None;
        for (i, c) in text.char_indices() {
            match c {
                '(' => depth += 1,
                ')' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        end = Some(i);
                        break;
                    }
                }
                _ => {}
            }
        }
        text = text[end? + 1..].trim_start();
    }

    let token = text.split_whitespace().next()?;
    if let Some(hex) = token.strip_prefix("0x") {
        return u64::from_str_radix(hex, 16).ok();
    }
    if token.starts_with('-') {
        return token.parse::<i64>().ok().map(|v| v as u64);
    }
    token.parse().ok()
}

/// `-data-read-memory-bytes`の`contents`を復号する
fn decode_hex(contents: &str) -> Option<Vec<u8>> {
    if contents.len() % 2 != 0 {
        return None;
    }
    contents
        .as_bytes()
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|digits| u8::from_str_radix(digits, 16).ok())
        })
        .collect()
}

/// GDB/MIのデバッガバックエンド
pub struct MiBackend<C> {
    channel: C,
    commands: CommandRegistry,
}

impl<C: MiChannel> MiBackend<C> {
    pub fn new(channel: C, commands: CommandRegistry) -> Self {
        Self { channel, commands }
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    /// 停止中のターゲットを再開する
    pub fn resume(&mut self) -> Result<()> {
        self.call(CONTINUE_COMMAND).map(|_| ())
    }

    /// 登録済みのユーザーコマンドを実行する
    pub fn run_user_command(&mut self, line: &str) -> Result<()> {
        let line = line.trim();
        let (name, args) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let handler = self
            .commands
            .lock()
            .ok()
            .and_then(|commands| commands.get(name).copied())
            .ok_or_else(|| BackendError::UndefinedCommand(name.to_string()))?;
        handler(self, args.trim())
    }

    /// コマンドを送り、`^error`ならエラーにする
    fn call(&mut self, command: &str) -> Result<MiRecord> {
        let record = self.channel.request(command)?;
        if let Some(message) = record.error_message() {
            return Err(SessionError::Rejected {
                command: command.to_string(),
                message: message.to_string(),
            }
            .into());
        }
        Ok(record)
    }

    /// 選択中のフレームで式を評価する
    fn evaluate_selected(&mut self, expression: &str) -> Result<u64> {
        let command = format!("-data-evaluate-expression {}", quote(expression));
        let record = self.call(&command)?;
        let text = record
            .get("value")
            .and_then(MiValue::as_str)
            .ok_or(SessionError::MalformedReply {
                command: command.clone(),
                field: "value",
            })?;
        parse_gdb_value(text)
            .ok_or_else(|| anyhow::anyhow!("Value of `{}` is not a number: {}", expression, text))
    }

    fn read_bytes(&mut self, space: AddressSpace, addr: u64, size: usize) -> Result<Vec<u8>> {
        let command = format!("-data-read-memory-bytes 0x{:x} {}", addr, size);
        let record = self.call(&command)?;
        let blocks = record
            .get("memory")
            .and_then(MiValue::as_list)
            .ok_or(SessionError::MalformedReply {
                command: command.clone(),
                field: "memory",
            })?;

        // 読めない範囲があるとブロックが欠ける
        let mut data = Vec::with_capacity(size);
        for block in blocks {
            let bytes = block
                .get("contents")
                .and_then(MiValue::as_str)
                .and_then(decode_hex)
                .ok_or(SessionError::MalformedReply {
                    command: command.clone(),
                    field: "contents",
                })?;
            data.extend(bytes);
        }
        if data.len() != size {
            return Err(BackendError::UnreadableMemory { space, address: addr }.into());
        }
        Ok(data)
    }
}

impl<C: MiChannel> MemoryReader for MiBackend<C> {
    fn read(&mut self, space: AddressSpace, addr: u64, size: usize) -> Result<Vec<u8>> {
        match space {
            AddressSpace::Virtual => self.read_bytes(space, addr, size),
            AddressSpace::Physical => {
                self.call(&console_command(PHYS_MODE_ON))?;
                let data = self.read_bytes(space, addr, size);
                if let Err(e) = self.call(&console_command(PHYS_MODE_OFF)) {
                    warn!("failed to leave physical memory mode: {:#}", e);
                }
                data
            }
        }
    }
}

impl<C: MiChannel> DebugBackend for MiBackend<C> {
    fn install_breakpoint(&mut self, address: u64) -> Result<HookId> {
        let command = format!("-break-insert *0x{:x}", address);
        let record = self.call(&command)?;
        let number = record
            .get("bkpt")
            .and_then(|bkpt| bkpt.get("number"))
            .and_then(MiValue::as_str)
            .and_then(|number| number.parse().ok())
            .ok_or(SessionError::MalformedReply {
                command,
                field: "bkpt.number",
            })?;
        debug!("breakpoint {} at 0x{:x}", number, address);
        Ok(HookId(number))
    }

    fn evaluate(&mut self, expression: &str) -> Result<u64> {
        self.evaluate_selected(expression)
    }

    fn execute(&mut self, command: &str) -> Result<()> {
        self.call(&console_command(command)).map(|_| ())
    }

    fn register_command(&mut self, name: &str, handler: CommandHandler) -> Result<()> {
        self.commands
            .lock()
            .map_err(|_| anyhow::anyhow!("Command registry is poisoned"))?
            .insert(name.to_string(), handler);
        Ok(())
    }

    fn read_frame_value(&mut self, frame: usize, name: &str) -> Result<u64> {
        self.call(&format!("-stack-select-frame {}", frame))?;
        let value = self.evaluate_selected(name);
        if frame != 0 {
            if let Err(e) = self.call("-stack-select-frame 0") {
                warn!("failed to reselect frame 0: {:#}", e);
            }
        }
        value
    }

    fn print(&mut self, text: &str) {
        self.channel.console(text);
    }
}
