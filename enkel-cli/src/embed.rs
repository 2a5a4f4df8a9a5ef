//! バイナリをC++ソースに埋め込む

use anyhow::Result;
use std::path::Path;

/// 入力ファイル名から生成するシンボルの接頭辞
///
/// `font.fnt`なら`font_fnt`になります。ファイル名の`.`は`_`に置き換え、
/// 識別子に使えないその他の文字も`_`にします。
pub fn symbol_base(input: &Path) -> String {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = input
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    format!("{}{}", stem, ext)
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// `.cpp`の内容
pub fn render_source(base: &str, data: &[u8]) -> String {
    let bytes: Vec<String> = data.iter().map(|b| format!("{:#04x}", b)).collect();
    format!(
        "extern \"C\" const unsigned char {base}_data[] __attribute__((used)) = {{{bytes}}};\n\
         extern \"C\" const unsigned int {base}_size __attribute__((used)) = sizeof({base}_data);\n",
        base = base,
        bytes = bytes.join(",")
    )
}

/// `.h`の内容
pub fn render_header(base: &str) -> String {
    format!(
        "extern \"C\" const unsigned char {base}_data[];\n\
         extern \"C\" const unsigned int {base}_size;\n",
        base = base
    )
}

/// 入力ファイルから`<output_base>.cpp`と`<output_base>.h`を生成する
pub fn embed(input: &Path, output_base: &Path) -> Result<()> {
    let data = std::fs::read(input)
        .map_err(|e| anyhow::anyhow!("Failed to read {:?}: {}", input, e))?;
    let base = symbol_base(input);

    let source = format!("{}.cpp", output_base.display());
    let header = format!("{}.h", output_base.display());
    std::fs::write(&source, render_source(&base, &data))
        .map_err(|e| anyhow::anyhow!("Failed to write {}: {}", source, e))?;
    std::fs::write(&header, render_header(&base))
        .map_err(|e| anyhow::anyhow!("Failed to write {}: {}", header, e))?;

    tracing::info!("embedded {} bytes as {}_data", data.len(), base);
    Ok(())
}
