//! ソースパスの照合
//!
//! ブレークポイントに登録されたパス（相対パスや部分パスを含む）と、
//! イベントが報告したパスが同じソースファイルを指すか判定します。
//! 照合は常にパス要素単位で行い、部分文字列では一致させません。

use std::path::{Component, Path, PathBuf};

/// パスを最後の要素とそれ以前に分割する
///
/// `dirname`/`basename` と同じ規則です。`"a/b.rb"` → `("a", "b.rb")`、
/// `"b.rb"` → `(".", "b.rb")`、`"/a"` → `("/", "a")`。
fn split_last(path: &str) -> (&str, &str) {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return if path.is_empty() { (".", "") } else { ("/", "/") };
    }

    match trimmed.rfind('/') {
        None => (".", trimmed),
        Some(pos) => {
            let dirname = trimmed[..pos].trim_end_matches('/');
            let dirname = if dirname.is_empty() { "/" } else { dirname };
            (dirname, &trimmed[pos + 1..])
        }
    }
}

/// パスを要素に分解する（ファイル名からルートに向かう順）
///
/// `"/a/b/c.rb"` → `["c.rb", "b", "a", "/"]`、`"test/foo.rb"` → `["foo.rb", "test"]`
pub fn split_file(path: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut rest = path;

    loop {
        let (dirname, filename) = split_last(rest);
        parts.push(filename);

        match dirname {
            "." => break,
            "/" => {
                parts.push("/");
                break;
            }
            _ => rest = dirname,
        }
    }

    parts
}

/// 要素を内側のパスの前に結合する
fn join_front(part: &str, inner: &str) -> String {
    if inner.is_empty() {
        part.to_string()
    } else if part.ends_with('/') {
        format!("{}{}", part, inner)
    } else {
        format!("{}/{}", part, inner)
    }
}

/// イベントの位置がブレークポイントの位置と一致するか判定する
///
/// 行番号が一致したうえで、イベントのパスを内側から1要素ずつ結合した候補
/// （`c.rb`, `b/c.rb`, `a/b/c.rb`, `/a/b/c.rb`）のいずれかが
/// ブレークポイントのパスと完全一致すれば真です。
pub fn at_location(breakpoint_file: &str, breakpoint_line: u32, file: &str, line: u32) -> bool {
    if breakpoint_line != line {
        return false;
    }

    let mut candidate = String::new();
    split_file(file).into_iter().any(|part| {
        candidate = join_front(part, &candidate);
        while candidate.len() > 1 && candidate.ends_with('/') {
            candidate.pop();
        }
        candidate == breakpoint_file
    })
}

/// パスを絶対パスに展開し、`.` と `..` を字句的に取り除く
pub fn expand_path(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut expanded = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                expanded.pop();
            }
            other => expanded.push(other.as_os_str()),
        }
    }
    expanded
}

/// 2つのパスが展開後に同じファイルを指すか判定する
pub fn same_file(a: &Path, b: &Path) -> bool {
    a == b || expand_path(a) == expand_path(b)
}
