//! オブジェクトモデルとトレーススクリプトのエラー

/// オブジェクトモデルの操作エラー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("uninitialized constant {0}")]
    UnknownConstant(String),

    #[error("{0} is not a class/module")]
    NotAType(String),

    #[error("superclass mismatch for class {0}")]
    SuperclassMismatch(String),

    #[error("undefined method '{method}' for {owner}")]
    UndefinedMethod { owner: String, method: String },
}

/// トレーススクリプトの構文エラー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}: {message}")]
pub struct ScriptError {
    /// スクリプト内の行番号（1始まり）
    pub line: usize,
    pub message: String,
}

impl ScriptError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}
