//! パース関連のユーティリティ関数

use crate::{BreakpointId, DebugError, Result};
use regex::Regex;
use std::sync::OnceLock;

/// ブレークポイント指定の書式
pub const BREAKPOINT_USAGE: &str = "usage: breakpoint FILE:LINE
    or breakpoint CLASS(#|.|::)METHOD

FILE can be foo.rb or /full/path/to/foo.rb.
# as a separator means instance method. . and :: both mean
class method.";

/// パース済みのブレークポイント指定
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreakpointSpec {
    /// `FILE:LINE`
    Line { file: String, line: u32 },
    /// `CLASS#METHOD`、`CLASS.METHOD`、`CLASS::METHOD`
    Method {
        class_name: String,
        method_name: String,
        is_class_method: bool,
    },
}

fn line_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(.+):(\d+)$").expect("valid line pattern"))
}

fn method_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(.+)(#|\.|::)([^#.:]+)$").expect("valid method pattern")
    })
}

impl BreakpointSpec {
    /// ブレークポイント指定をパースする
    ///
    /// `#` はインスタンスメソッド、`.` と `::` はクラスメソッドを意味します。
    ///
    /// # Examples
    /// ```
    /// use shiori_core::parse::BreakpointSpec;
    ///
    /// assert_eq!(
    ///     BreakpointSpec::parse("foo.rb:15").unwrap(),
    ///     BreakpointSpec::Line { file: "foo.rb".to_string(), line: 15 }
    /// );
    /// ```
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();

        if let Some(caps) = line_pattern().captures(input) {
            let line = caps[2]
                .parse::<u32>()
                .map_err(|e| DebugError::InvalidBreakpoint(format!("{}: {}", input, e)))?;
            return Ok(BreakpointSpec::Line {
                file: caps[1].to_string(),
                line,
            });
        }

        if let Some(caps) = method_pattern().captures(input) {
            return Ok(BreakpointSpec::Method {
                class_name: caps[1].to_string(),
                method_name: caps[3].to_string(),
                is_class_method: &caps[2] != "#",
            });
        }

        Err(DebugError::InvalidBreakpoint(input.to_string()))
    }
}

/// ブレークポイントIDをパースする
pub fn parse_id(s: &str) -> Option<BreakpointId> {
    let s = s.trim();
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}
