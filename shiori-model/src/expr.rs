//! 条件式の評価器
//!
//! ブレークポイントの停止条件として使う小さな式言語を評価します。
//!
//! ```text
//! expr       := or
//! or         := and ("||" and)*
//! and        := comparison ("&&" comparison)*
//! comparison := unary (("==" | "!=" | "<" | "<=" | ">" | ">=") unary)?
//! unary      := "!" unary | "-" unary | primary
//! primary    := INTEGER | STRING | "true" | "false" | "nil" | "self"
//!             | IDENT | "@" IDENT | "(" expr ")"
//! ```
//!
//! 未定義の名前はエラーになります。

use anyhow::{anyhow, bail, Result};
use shiori_target::{Context, ExpressionEvaluator, Value};
use std::cmp::Ordering;

/// 字句
#[derive(Debug, Clone, PartialEq)]
enum Token {
    Integer(i64),
    Str(String),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
}

const OPERATORS: &[&str] = &["==", "!=", "<=", ">=", "&&", "||", "<", ">", "!", "-"];

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '_') {
                i += 1;
            }
            let digits: String = chars[start..i].iter().filter(|c| **c != '_').collect();
            let value = digits
                .parse::<i64>()
                .map_err(|e| anyhow!("invalid integer '{}': {}", digits, e))?;
            tokens.push(Token::Integer(value));
        } else if c == '"' || c == '\'' {
            let quote = c;
            i += 1;
            let start = i;
            while i < chars.len() && chars[i] != quote {
                i += 1;
            }
            if i >= chars.len() {
                bail!("unterminated string literal");
            }
            tokens.push(Token::Str(chars[start..i].iter().collect()));
            i += 1;
        } else if c.is_alphabetic() || c == '_' || c == '@' {
            let start = i;
            i += 1;
            while i < chars.len()
                && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '?')
            {
                i += 1;
            }
            tokens.push(Token::Ident(chars[start..i].iter().collect()));
        } else if c == '(' {
            tokens.push(Token::LParen);
            i += 1;
        } else if c == ')' {
            tokens.push(Token::RParen);
            i += 1;
        } else {
            let rest: String = chars[i..].iter().take(2).collect();
            let op = OPERATORS
                .iter()
                .find(|op| rest.starts_with(**op))
                .ok_or_else(|| anyhow!("syntax error near '{}'", c))?;
            tokens.push(Token::Op(*op));
            i += op.len();
        }
    }

    Ok(tokens)
}

/// 再帰下降パーサ兼評価器
struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    context: &'a Context,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn eat_op(&mut self, ops: &[&str]) -> Option<&'static str> {
        match self.peek() {
            Some(Token::Op(op)) if ops.contains(op) => {
                let op = *op;
                self.pos += 1;
                Some(op)
            }
            _ => None,
        }
    }

    fn expression(&mut self) -> Result<Value> {
        self.or()
    }

    fn or(&mut self) -> Result<Value> {
        let mut left = self.and()?;
        while self.eat_op(&["||"]).is_some() {
            let right = self.and()?;
            if !left.is_truthy() {
                left = right;
            }
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Value> {
        let mut left = self.comparison()?;
        while self.eat_op(&["&&"]).is_some() {
            let right = self.comparison()?;
            if left.is_truthy() {
                left = right;
            }
        }
        Ok(left)
    }

    fn comparison(&mut self) -> Result<Value> {
        let left = self.unary()?;
        let Some(op) = self.eat_op(&["==", "!=", "<", "<=", ">", ">="]) else {
            return Ok(left);
        };
        let right = self.unary()?;

        let result = match op {
            "==" => left == right,
            "!=" => left != right,
            _ => {
                let ordering = compare(&left, &right)?;
                match op {
                    "<" => ordering == Ordering::Less,
                    "<=" => ordering != Ordering::Greater,
                    ">" => ordering == Ordering::Greater,
                    _ => ordering != Ordering::Less,
                }
            }
        };
        Ok(Value::Boolean(result))
    }

    fn unary(&mut self) -> Result<Value> {
        if self.eat_op(&["!"]).is_some() {
            let value = self.unary()?;
            return Ok(Value::Boolean(!value.is_truthy()));
        }
        if self.eat_op(&["-"]).is_some() {
            return match self.unary()? {
                Value::Integer(n) => n
                    .checked_neg()
                    .map(Value::Integer)
                    .ok_or_else(|| anyhow!("integer overflow in -{}", n)),
                other => Err(anyhow!("undefined method '-@' for {}", other)),
            };
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Value> {
        match self.next() {
            Some(Token::Integer(n)) => Ok(Value::Integer(n)),
            Some(Token::Str(s)) => Ok(Value::String(s)),
            Some(Token::Ident(name)) => self.variable(&name),
            Some(Token::LParen) => {
                let value = self.expression()?;
                match self.next() {
                    Some(Token::RParen) => Ok(value),
                    _ => Err(anyhow!("syntax error, expected ')'")),
                }
            }
            Some(token) => Err(anyhow!("syntax error, unexpected {:?}", token)),
            None => Err(anyhow!("syntax error, unexpected end of input")),
        }
    }

    fn variable(&self, name: &str) -> Result<Value> {
        match name {
            "true" => Ok(Value::Boolean(true)),
            "false" => Ok(Value::Boolean(false)),
            "nil" => Ok(Value::Nil),
            _ if name.starts_with('@') => {
                // 未定義のインスタンス変数は nil
                Ok(self.context.lookup(name).cloned().unwrap_or_default())
            }
            _ => self
                .context
                .lookup(name)
                .cloned()
                .ok_or_else(|| anyhow!("undefined local variable or method '{}'", name)),
        }
    }
}

fn compare(left: &Value, right: &Value) -> Result<Ordering> {
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => Ok(a.cmp(b)),
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        _ => Err(anyhow!("comparison of {} with {} failed", left, right)),
    }
}

/// 条件式の評価器
#[derive(Debug, Clone, Copy, Default)]
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    pub fn new() -> Self {
        Self
    }
}

impl ExpressionEvaluator for ConditionEvaluator {
    fn evaluate(&self, expression: &str, context: &Context) -> Result<Value> {
        let mut parser = Parser {
            tokens: tokenize(expression)?,
            pos: 0,
            context,
        };
        let value = parser.expression()?;
        if let Some(token) = parser.peek() {
            bail!("syntax error, unexpected {:?}", token);
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(expression: &str, context: &Context) -> Result<Value> {
        ConditionEvaluator::new().evaluate(expression, context)
    }

    #[test]
    fn test_comparisons() {
        let ctx = Context::new().with_local("n", Value::Integer(0));
        assert_eq!(eval("n == 0", &ctx).unwrap(), Value::Boolean(true));
        assert_eq!(eval("n != 0", &ctx).unwrap(), Value::Boolean(false));
        assert_eq!(eval("n < 1", &ctx).unwrap(), Value::Boolean(true));
        assert_eq!(eval("n >= -1", &ctx).unwrap(), Value::Boolean(true));
        assert_eq!(eval("\"a\" < 'b'", &ctx).unwrap(), Value::Boolean(true));
    }

    #[test]
    fn test_logic_returns_operands() {
        let ctx = Context::new()
            .with_local("n", Value::Integer(3))
            .with_local("@var", Value::String("foo".to_string()));

        assert_eq!(eval("nil || n", &ctx).unwrap(), Value::Integer(3));
        assert_eq!(eval("n && @var", &ctx).unwrap(), Value::String("foo".to_string()));
        assert_eq!(
            eval("!(n == 3) || @var == \"foo\"", &ctx).unwrap(),
            Value::Boolean(true)
        );
    }

    #[test]
    fn test_names() {
        let ctx = Context::new().with_receiver(Value::Integer(7));
        assert_eq!(eval("self", &ctx).unwrap(), Value::Integer(7));
        assert_eq!(eval("@unset", &ctx).unwrap(), Value::Nil);
        assert!(eval("raise_error", &ctx).is_err());
    }

    #[test]
    fn test_errors() {
        let ctx = Context::new();
        assert!(eval("", &ctx).is_err());
        assert!(eval("(1 == 1", &ctx).is_err());
        assert!(eval("1 == 1 2", &ctx).is_err());
        assert!(eval("\"open", &ctx).is_err());
        assert!(eval("1 < \"a\"", &ctx).is_err());
        assert!(eval("1 $ 2", &ctx).is_err());
    }

    #[test]
    fn test_negation_overflow_is_an_error() {
        let ctx = Context::new().with_local("n", Value::Integer(i64::MIN));
        assert!(eval("-n", &ctx).is_err());
        assert_eq!(eval("-(-3)", &ctx).unwrap(), Value::Integer(3));
    }
}
