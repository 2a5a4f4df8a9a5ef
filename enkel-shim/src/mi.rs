//! GDB/MIのレコード
//!
//! 自動化に必要な範囲だけを読み書きします。結果レコード（`^done`など）と
//! 非同期レコード（`*stopped`など）をトークン・クラス・結果の一覧に分解し、
//! コンソールストリームレコードと結果レコードを組み立てます。

/// MIの値
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MiValue {
    /// `"..."`
    Const(String),
    /// `{name=value,...}`
    Tuple(Vec<(String, MiValue)>),
    /// `[value,...]`（`[name=value,...]`は1要素のタプルの並びとして保持）
    List(Vec<MiValue>),
}

impl MiValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MiValue::Const(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[MiValue]> {
        match self {
            MiValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// タプルのフィールドを取得する
    pub fn get(&self, name: &str) -> Option<&MiValue> {
        match self {
            MiValue::Tuple(fields) => lookup(fields, name),
            _ => None,
        }
    }
}

fn lookup<'a>(results: &'a [(String, MiValue)], name: &str) -> Option<&'a MiValue> {
    results
        .iter()
        .find(|(field, _)| field == name)
        .map(|(_, value)| value)
}

/// レコードの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// `^`
    Result,
    /// `*`
    Exec,
    /// `+`
    Status,
    /// `=`
    Notify,
}

/// 結果レコードまたは非同期レコード
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiRecord {
    pub token: Option<u64>,
    pub kind: RecordKind,
    pub class: String,
    pub results: Vec<(String, MiValue)>,
}

impl MiRecord {
    /// 1行を解釈する
    ///
    /// ストリームレコードやプロンプトなど、対象外の行はNoneです。
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end();
        let (token, rest) = split_token(line)?;
        let mut chars = rest.chars();
        let kind = match chars.next()? {
            '^' => RecordKind::Result,
            '*' => RecordKind::Exec,
            '+' => RecordKind::Status,
            '=' => RecordKind::Notify,
            _ => return None,
        };
        let body = chars.as_str();
        let (class, results) = match body.split_once(',') {
            Some((class, results)) => (class, parse_results(results)?),
            None => (body, Vec::new()),
        };
        if class.is_empty() {
            return None;
        }
        Some(Self {
            token,
            kind,
            class: class.to_string(),
            results,
        })
    }

    pub fn get(&self, name: &str) -> Option<&MiValue> {
        lookup(&self.results, name)
    }

    /// `^error`の場合はそのメッセージ
    pub fn error_message(&self) -> Option<&str> {
        if self.kind == RecordKind::Result && self.class == "error" {
            Some(self.get("msg").and_then(MiValue::as_str).unwrap_or(""))
        } else {
            None
        }
    }

    /// ブレークポイントでの停止なら、その番号
    pub fn breakpoint_hit(&self) -> Option<u32> {
        if self.kind != RecordKind::Exec || self.class != "stopped" {
            return None;
        }
        if self.get("reason").and_then(MiValue::as_str) != Some("breakpoint-hit") {
            return None;
        }
        self.get("bkptno")?.as_str()?.parse().ok()
    }
}

/// 先頭の数字をトークンとして切り出す
fn split_token(line: &str) -> Option<(Option<u64>, &str)> {
    let digits = line.len() - line.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return Some((None, line));
    }
    let token = line[..digits].parse().ok()?;
    Some((Some(token), &line[digits..]))
}

/// `name=value,...`を解釈する
pub fn parse_results(text: &str) -> Option<Vec<(String, MiValue)>> {
    let mut parser = Parser::new(text);
    let mut results = Vec::new();
    loop {
        results.push(parser.result()?);
        if parser.eat(b',') {
            continue;
        }
        return if parser.at_end() { Some(results) } else { None };
    }
}

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            bytes: text.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Some(byte)
    }

    fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn rest(&self) -> &'a [u8] {
        &self.bytes[self.pos..]
    }

    fn result(&mut self) -> Option<(String, MiValue)> {
        let start = self.pos;
        while let Some(byte) = self.peek() {
            if matches!(byte, b'=' | b',' | b'{' | b'}' | b'[' | b']' | b'"') {
                break;
            }
            self.pos += 1;
        }
        let name = std::str::from_utf8(&self.bytes[start..self.pos]).ok()?;
        if name.is_empty() || !self.eat(b'=') {
            return None;
        }
        Some((name.to_string(), self.value()?))
    }

    fn value(&mut self) -> Option<MiValue> {
        match self.peek()? {
            b'"' => self.c_string().map(MiValue::Const),
            b'{' => self.tuple(),
            b'[' => self.list(),
            _ => None,
        }
    }

    fn tuple(&mut self) -> Option<MiValue> {
        self.eat(b'{');
        let mut fields = Vec::new();
        if self.eat(b'}') {
            return Some(MiValue::Tuple(fields));
        }
        loop {
            fields.push(self.result()?);
            if self.eat(b',') {
                continue;
            }
            return if self.eat(b'}') { Some(MiValue::Tuple(fields)) } else { None };
        }
    }

    fn list(&mut self) -> Option<MiValue> {
        self.eat(b'[');
        let mut items = Vec::new();
        if self.eat(b']') {
            return Some(MiValue::List(items));
        }
        loop {
            let item = match self.peek()? {
                b'"' | b'{' | b'[' => self.value()?,
                _ => MiValue::Tuple(vec![self.result()?]),
            };
            items.push(item);
            if self.eat(b',') {
                continue;
            }
            return if self.eat(b']') { Some(MiValue::List(items)) } else { None };
        }
    }

    /// Cの文字列リテラル
    fn c_string(&mut self) -> Option<String> {
        if !self.eat(b'"') {
            return None;
        }
        let mut out = Vec::new();
        loop {
            match self.bump()? {
                b'"' => break,
                b'\\' => match self.bump()? {
                    b'n' => out.push(b'\n'),
                    b't' => out.push(b'\t'),
                    b'r' => out.push(b'\r'),
                    digit @ b'0'..=b'7' => {
                        let mut value = u32::from(digit - b'0');
                        for _ in 0..2 {
                            match self.peek() {
                                Some(d @ b'0'..=b'7') => {
                                    value = value * 8 + u32::from(d - b'0');
                                    self.pos += 1;
                                }
                                _ => break,
                            }
                        }
                        out.push(value as u8);
                    }
                    other => out.push(other),
                },
                byte => out.push(byte),
            }
        }
        Some(String::from_utf8_lossy(&out).into_owned())
    }
}

/// 文字列をMIのCの文字列リテラルにする
pub fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// CLIコマンドをMIで実行するコマンド
pub fn console_command(command: &str) -> String {
    format!("-interpreter-exec console {}", quote(command))
}

/// オペレータのコンソールに出す1行（`~"...\n"`）
pub fn console_record(text: &str) -> String {
    format!("~{}", quote(&format!("{}\n", text)))
}

/// オペレータへ返す結果レコード
pub fn result_record(token: Option<u64>, error: Option<&str>) -> String {
    let token = token.map(|t| t.to_string()).unwrap_or_default();
    match error {
        None => format!("{}^done", token),
        Some(message) => format!("{}^error,msg={}", token, quote(message)),
    }
}

/// オペレータの入力からCLIコマンドの文字列を取り出す
///
/// `-interpreter-exec console "..."`ならその中身、MIコマンドでなければ行そのものです。
pub fn console_input(line: &str) -> Option<(Option<u64>, String)> {
    let (token, rest) = split_token(line.trim())?;
    let rest = rest.trim_start();
    if let Some(args) = rest.strip_prefix("-interpreter-exec") {
        let args = args.trim_start().strip_prefix("console")?.trim_start();
        let mut parser = Parser::new(args);
        let text = parser.c_string()?;
        if !parser.rest().iter().all(u8::is_ascii_whitespace) {
            return None;
        }
        return Some((token, text));
    }
    if rest.is_empty() || rest.starts_with('-') {
        return None;
    }
    Some((token, rest.to_string()))
}
