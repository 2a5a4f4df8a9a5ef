//! メモリ上で完結するシミュレーションターゲット
//!
//! エミュレータやgdbを起動せずに自動化コントローラとページテーブルウォーカーを
//! 動かすためのバックエンドです。物理メモリと仮想メモリを別々のページ集合として
//! 保持し、実行されたコマンドと出力をすべて記録します。

use crate::{
    AddressSpace, BackendError, CommandHandler, DebugBackend, HookId, MemoryReader, Result,
};
use std::collections::{BTreeMap, HashMap};

/// ページサイズ
const PAGE_SIZE: u64 = 4096;

/// ページ単位の疎なメモリ
#[derive(Debug, Default, Clone)]
pub struct SimMemory {
    pages: HashMap<(AddressSpace, u64), Box<[u8; PAGE_SIZE as usize]>>,
}

impl SimMemory {
    /// 空のメモリを作成する
    pub fn new() -> Self {
        Self::default()
    }

    /// メモリにデータを書き込む（ページは必要に応じて確保）
    pub fn write(&mut self, space: AddressSpace, addr: u64, data: &[u8]) {
        for (i, byte) in data.iter().enumerate() {
            let a = addr + i as u64;
            let page = self
                .pages
                .entry((space, a / PAGE_SIZE))
                .or_insert_with(|| Box::new([0u8; PAGE_SIZE as usize]));
            page[(a % PAGE_SIZE) as usize] = *byte;
        }
    }

    /// メモリからデータを読み取る
    ///
    /// 範囲内に確保されていないページがあればNoneを返します。
    pub fn read(&self, space: AddressSpace, addr: u64, size: usize) -> Option<Vec<u8>> {
        let mut data = Vec::with_capacity(size);
        for i in 0..size as u64 {
            let a = addr.checked_add(i)?;
            let page = self.pages.get(&(space, a / PAGE_SIZE))?;
            data.push(page[(a % PAGE_SIZE) as usize]);
        }
        Some(data)
    }

    /// u64値を書き込む（リトルエンディアン）
    pub fn write_u64(&mut self, space: AddressSpace, addr: u64, value: u64) {
        self.write(space, addr, &value.to_le_bytes());
    }

    /// 文字列をNUL終端のUTF-16として書き込む
    pub fn write_utf16(&mut self, space: AddressSpace, addr: u64, text: &str) {
        let mut bytes = Vec::new();
        for unit in text.encode_utf16().chain(std::iter::once(0)) {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        self.write(space, addr, &bytes);
    }
}

/// シミュレーションターゲット
#[derive(Default)]
pub struct SimTarget {
    memory: SimMemory,
    /// シンボル名 -> アドレス
    symbols: HashMap<String, u64>,
    /// 式で代入された変数
    variables: HashMap<String, u64>,
    /// `$rsp` などのレジスタ
    registers: HashMap<String, u64>,
    /// フレーム番号ごとの引数とローカル変数
    frames: Vec<HashMap<String, u64>>,
    /// ブレークポイントID -> アドレス
    breakpoints: BTreeMap<HookId, u64>,
    next_hook: u32,
    commands: HashMap<String, CommandHandler>,
    executed: Vec<String>,
    /// 失敗させるコマンドの接頭辞
    failing: Vec<String>,
    output: Vec<String>,
    reads: Vec<(AddressSpace, u64, usize)>,
}

impl SimTarget {
    /// 新しいシミュレーションターゲットを作成する
    pub fn new() -> Self {
        Self {
            next_hook: 1,
            ..Default::default()
        }
    }

    /// シンボルを定義する
    pub fn define_symbol(&mut self, name: &str, address: u64) {
        self.symbols.insert(name.to_string(), address);
    }

    /// レジスタ値を設定する（名前は`$`なし）
    pub fn set_register(&mut self, name: &str, value: u64) {
        self.registers.insert(name.to_string(), value);
    }

    /// フレーム内の値を設定する
    pub fn set_frame_value(&mut self, frame: usize, name: &str, value: u64) {
        if self.frames.len() <= frame {
            self.frames.resize_with(frame + 1, HashMap::new);
        }
        self.frames[frame].insert(name.to_string(), value);
    }

    /// メモリへの可変参照を取得する
    pub fn memory_mut(&mut self) -> &mut SimMemory {
        &mut self.memory
    }

    /// 指定した接頭辞で始まるコマンドの実行を失敗させる
    pub fn fail_commands(&mut self, prefix: &str) {
        self.failing.push(prefix.to_string());
    }

    /// 代入された変数の値を取得する
    pub fn variable(&self, name: &str) -> Option<u64> {
        self.variables.get(name).copied()
    }

    /// 実行されたコマンドの履歴
    pub fn executed(&self) -> &[String] {
        &self.executed
    }

    /// オペレータ向け出力の履歴
    pub fn output(&self) -> &[String] {
        &self.output
    }

    /// メモリ読み取りの履歴
    pub fn reads(&self) -> &[(AddressSpace, u64, usize)] {
        &self.reads
    }

    /// 履歴を消去する
    pub fn clear_history(&mut self) {
        self.executed.clear();
        self.output.clear();
        self.reads.clear();
    }

    /// アドレスに設定されたブレークポイントを探す
    pub fn hook_at(&self, address: u64) -> Option<HookId> {
        self.breakpoints
            .iter()
            .find(|(_, at)| **at == address)
            .map(|(id, _)| *id)
    }

    /// 設定されたブレークポイントのアドレス一覧
    pub fn breakpoint_addresses(&self) -> Vec<u64> {
        self.breakpoints.values().copied().collect()
    }

    /// 登録済みのユーザーコマンドを実行する
    ///
    /// オペレータがコンソールに入力した1行を受け取ります。
    pub fn run_command(&mut self, line: &str) -> Result<()> {
        let line = line.trim();
        let (name, args) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let handler = *self
            .commands
            .get(name)
            .ok_or_else(|| BackendError::UndefinedCommand(name.to_string()))?;
        handler(self, args.trim())
    }

    /// 式中の単一の値を評価する
    fn evaluate_term(&self, term: &str) -> Result<u64> {
        let term = term.trim();
        if let Some(name) = term.strip_prefix('&') {
            return self
                .symbols
                .get(name.trim())
                .copied()
                .ok_or_else(|| BackendError::UnknownSymbol(name.trim().to_string()).into());
        }
        if let Some(name) = term.strip_prefix('$') {
            return self
                .registers
                .get(name)
                .copied()
                .ok_or_else(|| BackendError::InvalidExpression(term.to_string()).into());
        }
        if let Some(hex) = term.strip_prefix("0x") {
            return u64::from_str_radix(hex, 16)
                .map_err(|_| BackendError::InvalidExpression(term.to_string()).into());
        }
        match term {
            "true" => return Ok(1),
            "false" => return Ok(0),
            _ => {}
        }
        if let Ok(value) = term.parse::<u64>() {
            return Ok(value);
        }
        if let Some(value) = self.variables.get(term) {
            return Ok(*value);
        }
        self.symbols
            .get(term)
            .copied()
            .ok_or_else(|| BackendError::UnknownSymbol(term.to_string()).into())
    }
}

impl MemoryReader for SimTarget {
    fn read(&mut self, space: AddressSpace, addr: u64, size: usize) -> Result<Vec<u8>> {
        self.reads.push((space, addr, size));
        self.memory
            .read(space, addr, size)
            .ok_or_else(|| BackendError::UnreadableMemory { space, address: addr }.into())
    }
}

impl DebugBackend for SimTarget {
    fn install_breakpoint(&mut self, address: u64) -> Result<HookId> {
        if let Some(id) = self.hook_at(address) {
            return Ok(id);
        }
        let id = HookId(self.next_hook);
        self.next_hook += 1;
        self.breakpoints.insert(id, address);
        Ok(id)
    }

    fn evaluate(&mut self, expression: &str) -> Result<u64> {
        // `NAME = VALUE` は変数への代入
        if let Some((lhs, rhs)) = expression.split_once('=') {
            let name = lhs.trim();
            if name.is_empty() || rhs.trim().is_empty() {
                return Err(BackendError::InvalidExpression(expression.to_string()).into());
            }
            let value = self.evaluate_term(rhs)?;
            self.variables.insert(name.to_string(), value);
            return Ok(value);
        }
        self.evaluate_term(expression)
    }

    fn execute(&mut self, command: &str) -> Result<()> {
        tracing::debug!("sim execute: {}", command);
        if self.failing.iter().any(|prefix| command.starts_with(prefix.as_str())) {
            return Err(BackendError::CommandFailed(command.to_string()).into());
        }
        self.executed.push(command.to_string());
        Ok(())
    }

    fn register_command(&mut self, name: &str, handler: CommandHandler) -> Result<()> {
        self.commands.insert(name.to_string(), handler);
        Ok(())
    }

    fn read_frame_value(&mut self, frame: usize, name: &str) -> Result<u64> {
        self.frames
            .get(frame)
            .and_then(|values| values.get(name))
            .copied()
            .ok_or_else(|| {
                BackendError::UnknownFrameValue {
                    frame,
                    name: name.to_string(),
                }
                .into()
            })
    }

    fn print(&mut self, text: &str) {
        self.output.push(text.to_string());
    }
}
