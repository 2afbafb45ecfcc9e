//! トレースイベント
//!
//! ターゲットプログラムの実行単位（行の実行、メソッド呼び出し、例外の送出）を
//! 表す離散的なレコードです。プログラムの実行順に1件ずつ届きます。

use crate::{Constant, Context};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// トレーサ自身のソース位置
///
/// このファイル名で届いたイベントはデバッガ内部のものとして無視されます。
pub const INTERNAL_SOURCE: &str = "<shiori>";

/// イベントの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// 行の実行
    Line,
    /// 言語レベルのメソッド呼び出し
    Call,
    /// ネイティブ（組み込み）メソッド呼び出し
    NativeCall,
    /// 例外の送出
    Raise,
}

static NEXT_EXCEPTION_ID: AtomicU64 = AtomicU64::new(1);

/// 送出された例外
///
/// `id` で同一性を判定します。同じクラスとメッセージでも別の送出は別物です。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionInfo {
    pub id: u64,
    pub class_name: String,
    pub message: String,
}

impl ExceptionInfo {
    /// 新しい例外を作成する
    pub fn new(class_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: NEXT_EXCEPTION_ID.fetch_add(1, Ordering::Relaxed),
            class_name: class_name.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ExceptionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.class_name, self.message)
    }
}

/// トレースイベント
#[derive(Debug, Clone, PartialEq)]
pub struct TraceEvent {
    pub kind: EventKind,
    /// イベントが報告したソースファイル
    pub file: String,
    pub line: u32,
    /// 呼び出されたメソッド名（呼び出しイベントのみ）
    pub method: Option<String>,
    /// 呼び出されたメソッドの所有者（呼び出しイベントのみ）
    pub owner: Option<Constant>,
    /// 送出された例外（例外イベントのみ）
    pub exception: Option<ExceptionInfo>,
    pub context: Context,
}

impl TraceEvent {
    /// 行イベントを作成する
    pub fn line(file: impl Into<String>, line: u32, context: Context) -> Self {
        Self {
            kind: EventKind::Line,
            file: file.into(),
            line,
            method: None,
            owner: None,
            exception: None,
            context,
        }
    }

    /// 言語レベルの呼び出しイベントを作成する
    pub fn call(
        file: impl Into<String>,
        line: u32,
        owner: Option<Constant>,
        method: impl Into<String>,
        context: Context,
    ) -> Self {
        Self {
            kind: EventKind::Call,
            file: file.into(),
            line,
            method: Some(method.into()),
            owner,
            exception: None,
            context,
        }
    }

    /// ネイティブ呼び出しイベントを作成する
    pub fn native_call(
        file: impl Into<String>,
        line: u32,
        owner: Option<Constant>,
        method: impl Into<String>,
        context: Context,
    ) -> Self {
        Self {
            kind: EventKind::NativeCall,
            ..Self::call(file, line, owner, method, context)
        }
    }

    /// 例外イベントを作成する
    pub fn raise(
        file: impl Into<String>,
        line: u32,
        exception: ExceptionInfo,
        context: Context,
    ) -> Self {
        Self {
            kind: EventKind::Raise,
            file: file.into(),
            line,
            method: None,
            owner: None,
            exception: Some(exception),
            context,
        }
    }
}
