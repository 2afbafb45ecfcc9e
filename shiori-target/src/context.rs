//! 実行コンテキスト
//!
//! 停止したフレームのローカル変数とレシーバを保持します。
//! 条件式の評価や対話セッションへの受け渡しに使用します。

use crate::TypeHandle;
use std::collections::BTreeMap;
use std::fmt;

/// ターゲットプログラムの値
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    #[default]
    Nil,
    Boolean(bool),
    Integer(i64),
    String(String),
    /// 型のインスタンス
    Instance(TypeHandle),
    /// 型そのもの（クラスメソッドのレシーバなど）
    Type(TypeHandle),
}

impl Value {
    /// 真偽値として評価する
    ///
    /// `nil` と `false` 以外はすべて真です。
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Boolean(false))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Instance(ty) => write!(f, "#<instance of type {}>", ty.0),
            Value::Type(ty) => write!(f, "#<type {}>", ty.0),
        }
    }
}

/// 停止したフレームの実行コンテキスト
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    /// フレームのレシーバ（`self`）
    pub receiver: Value,
    /// ローカル変数（インスタンス変数は `@` 付きの名前で格納する）
    pub locals: BTreeMap<String, Value>,
}

impl Context {
    /// 空のコンテキストを作成する
    pub fn new() -> Self {
        Self::default()
    }

    /// レシーバを設定する
    pub fn with_receiver(mut self, receiver: Value) -> Self {
        self.receiver = receiver;
        self
    }

    /// ローカル変数を追加する
    pub fn with_local(mut self, name: impl Into<String>, value: Value) -> Self {
        self.locals.insert(name.into(), value);
        self
    }

    /// 名前から値を引く
    ///
    /// `self` はレシーバを指します。
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        if name == "self" {
            return Some(&self.receiver);
        }
        self.locals.get(name)
    }
}
