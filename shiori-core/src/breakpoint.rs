//! ブレークポイント

use crate::condition;
use crate::path;
use shiori_target::{MethodHandle, MethodKind, TypeHandle};
use std::fmt;
use std::sync::OnceLock;

/// ブレークポイントID
pub type BreakpointId = usize;

/// 行ブレークポイント
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineBreakpoint {
    /// ユーザーが指定したままのパス（相対パスでもよい）
    pub file: String,
    pub line: u32,
}

impl LineBreakpoint {
    /// イベントの位置がこのブレークポイントに一致するか判定する
    pub fn is_at(&self, file: &str, line: u32) -> bool {
        path::at_location(&self.file, self.line, file, line)
    }
}

/// メソッドブレークポイント
///
/// クラスと参照先メソッドは最初に解決できた時点でキャッシュされ、
/// 以後プログラムがメソッドを再定義しても変わりません。
/// 解決に失敗した結果はキャッシュしないため、後から定義されたクラスにも一致します。
#[derive(Debug, Clone)]
pub struct MethodBreakpoint {
    /// `::` 区切りのクラス名
    pub class_name: String,
    pub method_name: String,
    pub kind: MethodKind,
    pub(crate) resolved_class: OnceLock<TypeHandle>,
    pub(crate) referred_method: OnceLock<MethodHandle>,
}

impl MethodBreakpoint {
    /// メソッドブレークポイントを作成する
    pub fn new(
        class_name: impl Into<String>,
        method_name: impl Into<String>,
        is_class_method: bool,
    ) -> Self {
        Self {
            class_name: class_name.into(),
            method_name: method_name.into(),
            kind: MethodKind::from_class_method(is_class_method),
            resolved_class: OnceLock::new(),
            referred_method: OnceLock::new(),
        }
    }

    pub fn is_class_method(&self) -> bool {
        self.kind.is_class_method()
    }

    /// 表示用のメソッド名（`Foo#bar` / `Foo.bar`）
    pub fn qualified_name(&self) -> String {
        format!(
            "{}{}{}",
            self.class_name,
            self.kind.separator(),
            self.method_name
        )
    }
}

impl PartialEq for MethodBreakpoint {
    fn eq(&self, other: &Self) -> bool {
        self.class_name == other.class_name
            && self.method_name == other.method_name
            && self.kind == other.kind
    }
}

/// ブレークポイントの種類
#[derive(Debug, Clone, PartialEq)]
pub enum BreakpointType {
    Line(LineBreakpoint),
    Method(MethodBreakpoint),
}

/// ブレークポイント
#[derive(Debug, Clone, PartialEq)]
pub struct Breakpoint {
    pub id: BreakpointId,
    pub kind: BreakpointType,
    /// 停止条件の式
    pub condition: Option<String>,
    pub enabled: bool,
}

impl Breakpoint {
    /// 行ブレークポイントを作成する
    pub fn line(id: BreakpointId, file: impl Into<String>, line: u32) -> Self {
        Self::with_kind(
            id,
            BreakpointType::Line(LineBreakpoint {
                file: file.into(),
                line,
            }),
        )
    }

    /// メソッドブレークポイントを作成する
    pub fn method(
        id: BreakpointId,
        class_name: impl Into<String>,
        method_name: impl Into<String>,
        is_class_method: bool,
    ) -> Self {
        Self::with_kind(
            id,
            BreakpointType::Method(MethodBreakpoint::new(
                class_name,
                method_name,
                is_class_method,
            )),
        )
    }

    fn with_kind(id: BreakpointId, kind: BreakpointType) -> Self {
        Self {
            id,
            kind,
            condition: None,
            enabled: true,
        }
    }

    /// 行ブレークポイントであれば参照を返す
    pub fn as_line(&self) -> Option<&LineBreakpoint> {
        match &self.kind {
            BreakpointType::Line(bp) => Some(bp),
            BreakpointType::Method(_) => None,
        }
    }

    /// メソッドブレークポイントであれば参照を返す
    pub fn as_method(&self) -> Option<&MethodBreakpoint> {
        match &self.kind {
            BreakpointType::Method(bp) => Some(bp),
            BreakpointType::Line(_) => None,
        }
    }
}

impl fmt::Display for Breakpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "breakpoint {} at ", self.id)?;
        match &self.kind {
            BreakpointType::Line(bp) => write!(f, "{}:{}", bp.file, bp.line)?,
            BreakpointType::Method(bp) => write!(f, "{}", bp.qualified_name())?,
        }
        write!(f, "{}", condition::describe(self.condition.as_deref()))?;
        if !self.enabled {
            write!(f, " [disabled]")?;
        }
        Ok(())
    }
}
