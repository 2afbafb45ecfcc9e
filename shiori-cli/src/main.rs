//! Shiori CLI - コマンドラインインターフェース
//!
//! トレーススクリプトをブレークポイント付きで実行するデバッガのREPL

use anyhow::Result;
use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use shiori_core::{Command, CommandOutput, Debugger, SessionEvent, Termination};
use shiori_model::{ConditionEvaluator, ObjectModel, SharedModel, TraceScriptProgram};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// Shiori - breakpoint debugger for trace scripts
#[derive(Parser)]
#[command(name = "shiori")]
#[command(version = "0.1.0")]
#[command(about = "Breakpoint debugger for trace scripts", long_about = None)]
struct Cli {
    /// Trace script to debug
    file: Option<PathBuf>,

    /// Stop whenever an exception is raised
    #[arg(long)]
    break_on_raise: bool,

    /// Start the script and stop at its first line
    #[arg(long)]
    step: bool,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "warn")]
    log_level: String,
}

const HISTORY_FILE: &str = ".shiori_history";

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_level.as_str().into()),
        )
        .with_writer(std::io::stderr)
        .init();

    println!("Shiori - trace script debugger");
    println!("Version 0.1.0");
    println!();

    let debugger = init_debugger(&cli);
    run_repl(&debugger, cli.step)?;

    Ok(())
}

/// デバッガを初期化する
fn init_debugger(cli: &Cli) -> Arc<Debugger> {
    let model = SharedModel::new(ObjectModel::with_builtins());
    let debugger = Debugger::new(Arc::new(model.clone()), Arc::new(ConditionEvaluator::new()))
        .with_program(Arc::new(TraceScriptProgram::new(model)));

    if let Some(file) = &cli.file {
        debugger.set_target_file(file);
        println!("debugged file set to {}", file.display());
    }
    debugger.set_break_on_raise(cli.break_on_raise);

    Arc::new(debugger)
}

/// REPLループを実行する
fn run_repl(debugger: &Arc<Debugger>, step: bool) -> Result<()> {
    println!("Type 'help' for available commands, 'quit' to exit.");
    println!();

    let mut rl = DefaultEditor::new()?;
    let history = home::home_dir().map(|dir| dir.join(HISTORY_FILE));
    if let Some(path) = &history {
        if rl.load_history(path).is_err() {
            debug!("no history at {}", path.display());
        }
    }

    if step && debugger.target_file().is_some() {
        report(debugger, Command::Step.execute(debugger));
    }

    loop {
        let readline = rl.readline(&prompt(debugger));
        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                rl.add_history_entry(line)?;

                let Some(command) = Command::parse(line) else {
                    println!("unknown command: {} (type 'help' for the list)", line);
                    continue;
                };
                let output = command.execute(debugger);
                if output.quit {
                    break;
                }
                report(debugger, output);
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    if let Some(path) = &history {
        if let Err(e) = rl.save_history(path) {
            warn!("failed to save history to {}: {}", path.display(), e);
        }
    }

    // 停止中のスレッドは待たずに終了する
    println!("Goodbye!");
    std::process::exit(0);
}

fn prompt(debugger: &Debugger) -> String {
    match debugger.suspended() {
        Some(stop) => format!("(shiori:{}) ", stop.thread),
        None => "(shiori) ".to_string(),
    }
}

/// コマンドの出力を表示し、再開した場合は次の停止か終了まで待つ
fn report(debugger: &Debugger, output: CommandOutput) {
    for line in &output.lines {
        println!("{}", line);
    }
    if !output.resumed {
        return;
    }

    match debugger.wait_event() {
        SessionEvent::Suspended(stop) => println!("{}", stop.announcement),
        SessionEvent::Terminated(termination) => {
            match &termination {
                Termination::Exited(code) => debug!("target exited with status {}", code),
                Termination::Uncaught(exception) => debug!("target died: {}", exception),
                Termination::Finished => debug!("target finished"),
            }
            debugger.join_target();
            println!("execution terminated");
        }
    }
}
