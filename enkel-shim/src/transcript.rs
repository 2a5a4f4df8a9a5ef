//! セッションのトランスクリプト
//!
//! デバッガとの間でやり取りした行をファイルに記録します。書き込みに
//! 失敗してもセッションは止めず、警告を出して記録をやめます。

use crate::Result;
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// トランスクリプトの出力先
pub struct Transcript {
    file: Option<File>,
}

impl Transcript {
    /// 記録しないトランスクリプト
    pub fn disabled() -> Self {
        Self { file: None }
    }

    /// ファイルを作成し、ルートディレクトリを記録する
    pub async fn create(path: &Path, root: &str) -> Result<Self> {
        let file = File::create(path)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create transcript {}: {}", path.display(), e))?;
        let mut transcript = Self { file: Some(file) };
        transcript.write_line(&format!("# ROOT:{}", root)).await;
        Ok(transcript)
    }

    /// 記録が有効かどうか
    pub fn is_enabled(&self) -> bool {
        self.file.is_some()
    }

    /// デバッガに送ったコマンド
    pub async fn command(&mut self, command: &str) {
        self.write_line(&format!("> {}", command)).await;
    }

    /// デバッガの出力行
    pub async fn output(&mut self, line: &str) {
        self.write_line(&format!("< {}", line.trim_end())).await;
    }

    /// プレースホルダ置換の前後
    pub async fn rewrite(&mut self, before: &str, after: &str) {
        self.write_line(&format!("# Before:{}", before)).await;
        self.write_line(&format!("# After:{}", after)).await;
    }

    async fn write_line(&mut self, line: &str) {
        let Some(file) = self.file.as_mut() else {
            return;
        };
        let written = async {
            file.write_all(line.as_bytes()).await?;
            file.write_all(b"\n").await?;
            file.flush().await
        }
        .await;
        if let Err(e) = written {
            warn!("transcript write failed, disabling: {}", e);
            self.file = None;
        }
    }
}
