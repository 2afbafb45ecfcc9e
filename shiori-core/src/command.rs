//! デバッガコマンド

use crate::parse::{parse_id, BreakpointSpec, BREAKPOINT_USAGE};
use crate::{DebugError, Debugger};
use regex::Regex;
use std::sync::{Arc, OnceLock};

/// デバッガコマンド
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// ブレークポイントを設定
    Breakpoint(String),
    /// ブレークポイント一覧表示
    BreakpointList,
    /// ブレークポイントを削除
    Delete(String),
    /// 停止条件を設定（`ID CODE`）
    Cond(String),
    /// 停止条件を解除
    Uncond(String),
    /// ブレークポイントを有効化
    Enable(String),
    /// ブレークポイントを無効化
    Disable(String),
    /// デバッグ対象ファイルを設定
    File(Option<String>),
    /// 実行開始
    Run(Option<String>),
    /// 実行継続
    Continue,
    /// 同じファイルの次の行へ
    Next,
    /// ステップ実行
    Step,
    /// 例外送出時の停止を切り替え
    BreakOnRaise,
    /// ローカル変数表示
    Locals,
    /// ヘルプ表示
    Help,
    /// 終了
    Quit,
}

/// コマンドの実行結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// 表示する行
    pub lines: Vec<String>,
    /// ターゲットの実行が再開された（対話側は次のイベントを待つ）
    pub resumed: bool,
    /// 終了が要求された
    pub quit: bool,
}

impl CommandOutput {
    fn line(line: impl Into<String>) -> Self {
        Self {
            lines: vec![line.into()],
            ..Self::default()
        }
    }

    fn error(err: DebugError) -> Self {
        Self::line(format!("error: {}", err))
    }

    fn resumed() -> Self {
        Self {
            resumed: true,
            ..Self::default()
        }
    }
}

const FILE_HINT: &str = "create it or set a new file using the 'file' command.";

const HELP: &[&str] = &[
    "Commands:",
    "  breakpoint, b, bp FILE:LINE    - Add a line breakpoint",
    "  breakpoint, b, bp CLASS#METH   - Add an instance method breakpoint",
    "  breakpoint, b, bp CLASS.METH   - Add a class method breakpoint",
    "  breakpoint-list, bl            - List breakpoints",
    "  delete, del, d ID              - Delete a breakpoint",
    "  cond ID CODE                   - Stop only when CODE is true",
    "  uncond ID                      - Remove the condition of a breakpoint",
    "  enable ID / disable ID         - Enable or disable a breakpoint",
    "  file, f FILE                   - Set the file to debug",
    "  run, r [FILE]                  - Start the debugger",
    "  continue, c                    - Resume execution",
    "  next, n                        - Run until the next line in the same file",
    "  step, s                        - Run until the next line",
    "  break-on-raise, bor            - Toggle stopping when an exception is raised",
    "  locals, l                      - Show local variables of the stopped frame",
    "  help, h, ?                     - Show this help",
    "  quit, q, exit                  - Exit the debugger",
];

fn cond_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\d+) (.+)$").expect("valid cond pattern"))
}

impl Command {
    /// コマンド文字列をパースする
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        let (name, rest) = match input.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (input, ""),
        };
        let argument = rest.split_whitespace().next().map(str::to_string);
        let first = argument.clone().unwrap_or_default();

        match name {
            "" => None,
            "breakpoint" | "b" | "bp" => Some(Command::Breakpoint(first)),
            "breakpoint-list" | "bl" => Some(Command::BreakpointList),
            "delete" | "del" | "d" => Some(Command::Delete(first)),
            "cond" => Some(Command::Cond(rest.to_string())),
            "uncond" => Some(Command::Uncond(first)),
            "enable" => Some(Command::Enable(first)),
            "disable" => Some(Command::Disable(first)),
            "file" | "f" => Some(Command::File(argument)),
            "run" | "r" => Some(Command::Run(argument)),
            "continue" | "c" => Some(Command::Continue),
            "next" | "n" => Some(Command::Next),
            "step" | "s" => Some(Command::Step),
            "break-on-raise" | "bor" => Some(Command::BreakOnRaise),
            "locals" | "l" => Some(Command::Locals),
            "help" | "h" | "?" => Some(Command::Help),
            "quit" | "q" | "exit" => Some(Command::Quit),
            _ => None,
        }
    }

    /// コマンドを実行する
    pub fn execute(&self, debugger: &Arc<Debugger>) -> CommandOutput {
        match self {
            Command::Breakpoint(argument) => match BreakpointSpec::parse(argument) {
                Ok(spec) => match debugger.add_breakpoint(&spec) {
                    Ok(bp) => CommandOutput::line(format!("added {}", bp)),
                    Err(err) => CommandOutput::error(err),
                },
                Err(_) => CommandOutput {
                    lines: BREAKPOINT_USAGE.lines().map(str::to_string).collect(),
                    ..CommandOutput::default()
                },
            },
            Command::BreakpointList => CommandOutput {
                lines: debugger
                    .list_breakpoints()
                    .iter()
                    .map(ToString::to_string)
                    .collect(),
                ..CommandOutput::default()
            },
            Command::Delete(id) => with_id(id, |id| {
                debugger
                    .remove_breakpoint(id)
                    .map(|_| format!("breakpoint {} deleted", id))
            }),
            Command::Cond(argument) => {
                let Some(caps) = cond_pattern().captures(argument) else {
                    return CommandOutput::line("usage: cond ID CODE");
                };
                let condition = caps[2].to_string();
                with_id(&caps[1], |id| {
                    debugger
                        .set_condition(id, Some(condition.clone()))
                        .map(|_| format!("condition set to {}", condition))
                })
            }
            Command::Uncond(id) => with_id(id, |id| {
                debugger
                    .set_condition(id, None)
                    .map(|_| "condition unset".to_string())
            }),
            Command::Enable(id) => with_id(id, |id| {
                debugger
                    .enable_breakpoint(id)
                    .map(|_| format!("breakpoint {} enabled", id))
            }),
            Command::Disable(id) => with_id(id, |id| {
                debugger
                    .disable_breakpoint(id)
                    .map(|_| format!("breakpoint {} disabled", id))
            }),
            Command::File(Some(file)) => {
                debugger.set_target_file(file);
                CommandOutput::line(format!("debugged file set to {}", file))
            }
            Command::File(None) => CommandOutput::line("usage: file FILE"),
            Command::Run(file) => {
                if debugger.is_debugging() {
                    return CommandOutput::error(DebugError::AlreadyDebugging);
                }
                if let Some(file) = file {
                    debugger.set_target_file(file);
                }
                started(debugger.request_run())
            }
            Command::Continue => resumed(debugger.request_continue()),
            Command::Next => resumed(debugger.request_next()),
            Command::Step => {
                if debugger.is_debugging() {
                    resumed(debugger.request_step())
                } else {
                    started(debugger.request_step())
                }
            }
            Command::BreakOnRaise => {
                if debugger.toggle_break_on_raise() {
                    CommandOutput::line("break on raise enabled")
                } else {
                    CommandOutput::line("break on raise disabled")
                }
            }
            Command::Locals => locals(debugger),
            Command::Help => CommandOutput {
                lines: HELP.iter().map(|line| line.to_string()).collect(),
                ..CommandOutput::default()
            },
            Command::Quit => CommandOutput {
                quit: true,
                ..CommandOutput::default()
            },
        }
    }
}

fn with_id(
    id: &str,
    action: impl FnOnce(usize) -> crate::Result<String>,
) -> CommandOutput {
    let Some(parsed) = parse_id(id) else {
        return CommandOutput::line(format!("error: could not find breakpoint {}", id));
    };
    match action(parsed) {
        Ok(line) => CommandOutput::line(line),
        Err(err) => CommandOutput::error(err),
    }
}

fn resumed(result: crate::Result<()>) -> CommandOutput {
    match result {
        Ok(()) => CommandOutput::resumed(),
        Err(err) => CommandOutput::error(err),
    }
}

fn started(result: crate::Result<()>) -> CommandOutput {
    match result {
        Ok(()) => CommandOutput::resumed(),
        Err(err @ (DebugError::FileNotSet | DebugError::FileMissing(_))) => CommandOutput {
            lines: vec![format!("error: {}", err), FILE_HINT.to_string()],
            ..CommandOutput::default()
        },
        Err(err) => CommandOutput::error(err),
    }
}

fn locals(debugger: &Debugger) -> CommandOutput {
    let Some(stop) = debugger.suspended() else {
        return CommandOutput::error(DebugError::NotSuspended);
    };
    let Some(context) = stop.context else {
        return CommandOutput::line("no frame is available");
    };

    let mut lines = vec![format!("self = {}", context.receiver)];
    lines.extend(
        context
            .locals
            .iter()
            .map(|(name, value)| format!("{} = {}", name, value)),
    );
    CommandOutput {
        lines,
        ..CommandOutput::default()
    }
}
