//! 送信コマンドのプレースホルダ置換

use crate::config::PLACEHOLDER;
use std::borrow::Cow;

/// プレースホルダをルートディレクトリに置き換える
///
/// ルート末尾の`/`は取り除いてから埋め込みます。プレースホルダの直後には
/// 必ず`/`が続くため、そのまま埋め込むと区切りが二重になります。
/// 置換は1回の走査だけで、置換後の文字列を再度調べることはありません。
pub fn rewrite_placeholder<'a>(command: &'a str, root: &str) -> Cow<'a, str> {
    if command.contains(PLACEHOLDER) {
        Cow::Owned(command.replace(PLACEHOLDER, root.trim_end_matches('/')))
    } else {
        Cow::Borrowed(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrites_symbol_path() {
        assert_eq!(
            rewrite_placeholder("add-symbol-file /mnt//INVALID_CWD/kernel.elf", "/home/x/Enkel/"),
            "add-symbol-file /home/x/Enkel/kernel.elf"
        );
    }

    #[test]
    fn test_command_without_marker_is_untouched() {
        let command = "-break-insert  main\t";
        assert!(matches!(rewrite_placeholder(command, "/r/"), Cow::Borrowed(c) if c == command));
    }

    #[test]
    fn test_root_containing_marker_is_not_rescanned() {
        assert_eq!(
            rewrite_placeholder("cd /mnt//INVALID_CWD", "/mnt//INVALID_CWD/x"),
            "cd /mnt//INVALID_CWD/x"
        );
    }
}
