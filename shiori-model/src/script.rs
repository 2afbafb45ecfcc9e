//! トレーススクリプト
//!
//! スレッドごとのイベント列をテキストで記述し、トレーサに順に届けます。
//! 1行に1つの命令を書き、`#` で始まる行はコメントです。
//!
//! ```text
//! class Foo
//! def Foo#bar
//! line foo.rb 1 n=0
//! call Foo bar foo.rb 3 self=instance
//! ccall String size
//! raise RuntimeError something went wrong
//! rescue
//! thread worker
//! line foo.rb 10 @var="x"
//! exit 0
//! ```
//!
//! 最初の `thread` より前の命令は `main` スレッドのものです。`main` はロードを
//! 呼び出したスレッドで、それ以外はそれぞれ名前付きのスレッドで並行に実行されます。

use crate::{ObjectModel, Result, ScriptError, SharedModel};
use anyhow::Context as _;
use shiori_target::{
    Constant, Context, ExceptionInfo, MethodKind, ProgramOutcome, TargetProgram, TraceEvent,
    Tracer, Value, INTERNAL_SOURCE,
};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

/// 呼び出しのレシーバ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Receiver {
    /// クラスのインスタンス
    Instance,
    /// クラスそのもの
    Class,
}

/// スクリプトの命令
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    /// `line FILE LINE [k=v ...]`
    Line {
        file: String,
        line: u32,
        locals: Vec<(String, Value)>,
    },
    /// `call CLASS METHOD [FILE LINE] [self=instance|class] [k=v ...]`
    Call {
        class_name: String,
        method: String,
        location: Option<(String, u32)>,
        receiver: Receiver,
        locals: Vec<(String, Value)>,
    },
    /// `ccall CLASS METHOD [k=v ...]`
    NativeCall {
        class_name: String,
        method: String,
        locals: Vec<(String, Value)>,
    },
    /// `raise CLASS MESSAGE...`
    Raise { class_name: String, message: String },
    /// `rescue`
    Rescue,
    /// `exit CODE`
    Exit(i32),
    /// `class NAME [< SUPER]`
    Class {
        name: String,
        superclass: Option<String>,
    },
    /// `module NAME`
    Module { name: String },
    /// `def CLASS#METHOD` / `def CLASS.METHOD`
    Def {
        class_name: String,
        method: String,
        kind: MethodKind,
    },
    /// `alias CLASS#NEW OLD` / `alias CLASS.NEW OLD`
    Alias {
        class_name: String,
        new_name: String,
        old_name: String,
        kind: MethodKind,
    },
    /// `const NAME VALUE`
    Const { name: String, value: String },
}

/// 1スレッド分の命令列
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadScript {
    pub name: String,
    /// スクリプト内の行番号と命令
    pub directives: Vec<(usize, Directive)>,
}

impl ThreadScript {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            directives: Vec::new(),
        }
    }
}

/// パース済みのトレーススクリプト
#[derive(Debug, Clone, PartialEq)]
pub struct TraceScript {
    /// 先頭は常に `main`
    pub threads: Vec<ThreadScript>,
}

/// 空白で区切る（二重引用符の中の空白は区切らない）
fn split_words(text: &str) -> std::result::Result<Vec<String>, String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quoted = false;

    for c in text.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                current.push(c);
            }
            c if c.is_whitespace() && !quoted => {
                if !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if quoted {
        return Err("unterminated string".to_string());
    }
    if !current.is_empty() {
        words.push(current);
    }
    Ok(words)
}

fn parse_value(text: &str) -> std::result::Result<Value, String> {
    match text {
        "nil" => Ok(Value::Nil),
        "true" => Ok(Value::Boolean(true)),
        "false" => Ok(Value::Boolean(false)),
        _ if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') => {
            Ok(Value::String(text[1..text.len() - 1].to_string()))
        }
        _ => text
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|_| format!("invalid value '{}'", text)),
    }
}

fn parse_assignment(word: &str) -> std::result::Result<(String, Value), String> {
    let (name, value) = word
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, found '{}'", word))?;
    if name.is_empty() {
        return Err(format!("missing variable name in '{}'", word));
    }
    Ok((name.to_string(), parse_value(value)?))
}

fn parse_locals(words: &[String]) -> std::result::Result<Vec<(String, Value)>, String> {
    words.iter().map(|word| parse_assignment(word)).collect()
}

fn parse_line_number(text: &str) -> std::result::Result<u32, String> {
    match text.parse::<u32>() {
        Ok(line) if line > 0 => Ok(line),
        _ => Err(format!("invalid line number '{}'", text)),
    }
}

/// `CLASS#METHOD` / `CLASS.METHOD` を分解する
fn parse_method_ref(text: &str) -> std::result::Result<(String, String, MethodKind), String> {
    let (index, kind) = match (text.rfind('#'), text.rfind('.')) {
        (Some(i), Some(j)) if i > j => (i, MethodKind::Instance),
        (_, Some(j)) => (j, MethodKind::Class),
        (Some(i), None) => (i, MethodKind::Instance),
        (None, None) => return Err(format!("expected CLASS#METHOD or CLASS.METHOD, found '{}'", text)),
    };
    let (class_name, method) = (&text[..index], &text[index + 1..]);
    if class_name.is_empty() || method.is_empty() {
        return Err(format!("expected CLASS#METHOD or CLASS.METHOD, found '{}'", text));
    }
    Ok((class_name.to_string(), method.to_string(), kind))
}

fn parse_directive(text: &str) -> std::result::Result<Directive, String> {
    let (keyword, rest) = match text.split_once(char::is_whitespace) {
        Some((keyword, rest)) => (keyword, rest.trim()),
        None => (text, ""),
    };

    if keyword == "raise" {
        let (class_name, message) = match rest.split_once(char::is_whitespace) {
            Some((class_name, message)) => (class_name, message.trim()),
            None => (rest, ""),
        };
        if class_name.is_empty() {
            return Err("usage: raise CLASS MESSAGE".to_string());
        }
        return Ok(Directive::Raise {
            class_name: class_name.to_string(),
            message: message.to_string(),
        });
    }

    let words = split_words(rest)?;
    match (keyword, words.as_slice()) {
        ("line", [file, line, locals @ ..]) => Ok(Directive::Line {
            file: file.clone(),
            line: parse_line_number(line)?,
            locals: parse_locals(locals)?,
        }),
        ("call", [class_name, method, rest @ ..]) => {
            let (location, rest) = match rest {
                [file, line, tail @ ..] if !file.contains('=') => {
                    (Some((file.clone(), parse_line_number(line)?)), tail)
                }
                _ => (None, rest),
            };
            let mut receiver = Receiver::Instance;
            let mut locals = Vec::new();
            for word in rest {
                match word.strip_prefix("self=").map(|s| s.trim_matches('"')) {
                    Some("instance") => receiver = Receiver::Instance,
                    Some("class") => receiver = Receiver::Class,
                    Some(other) => return Err(format!("invalid receiver '{}'", other)),
                    None => locals.push(parse_assignment(word)?),
                }
            }
            Ok(Directive::Call {
                class_name: class_name.clone(),
                method: method.clone(),
                location,
                receiver,
                locals,
            })
        }
        ("ccall", [class_name, method, locals @ ..]) => Ok(Directive::NativeCall {
            class_name: class_name.clone(),
            method: method.clone(),
            locals: parse_locals(locals)?,
        }),
        ("rescue", []) => Ok(Directive::Rescue),
        ("exit", [code]) => code
            .parse::<i32>()
            .map(Directive::Exit)
            .map_err(|_| format!("invalid exit code '{}'", code)),
        ("exit", []) => Ok(Directive::Exit(0)),
        ("class", [name]) => Ok(Directive::Class {
            name: name.clone(),
            superclass: None,
        }),
        ("class", [name, lt, superclass]) if lt == "<" => Ok(Directive::Class {
            name: name.clone(),
            superclass: Some(superclass.clone()),
        }),
        ("module", [name]) => Ok(Directive::Module { name: name.clone() }),
        ("def", [method_ref]) => {
            let (class_name, method, kind) = parse_method_ref(method_ref)?;
            Ok(Directive::Def {
                class_name,
                method,
                kind,
            })
        }
        ("alias", [method_ref, old_name]) => {
            let (class_name, new_name, kind) = parse_method_ref(method_ref)?;
            Ok(Directive::Alias {
                class_name,
                new_name,
                old_name: old_name.clone(),
                kind,
            })
        }
        ("const", [name, value]) => Ok(Directive::Const {
            name: name.clone(),
            value: value.clone(),
        }),
        (
            "line" | "call" | "ccall" | "rescue" | "exit" | "class" | "module" | "def" | "alias"
            | "const",
            _,
        ) => Err(format!("wrong arguments for '{}'", keyword)),
        _ => Err(format!("unknown directive '{}'", keyword)),
    }
}

impl TraceScript {
    /// スクリプトをパースする
    pub fn parse(source: &str) -> std::result::Result<Self, ScriptError> {
        let mut threads = vec![ThreadScript::new("main")];

        for (index, raw) in source.lines().enumerate() {
            let line_number = index + 1;
            let text = raw.trim();
            if text.is_empty() || text.starts_with('#') {
                continue;
            }

            if let Some(name) = text.strip_prefix("thread ") {
                let name = name.trim();
                if name.is_empty() || threads.iter().any(|t| t.name == name) {
                    return Err(ScriptError::new(
                        line_number,
                        format!("invalid thread name '{}'", name),
                    ));
                }
                threads.push(ThreadScript::new(name));
                continue;
            }

            let directive =
                parse_directive(text).map_err(|message| ScriptError::new(line_number, message))?;
            if let Some(thread) = threads.last_mut() {
                thread.directives.push((line_number, directive));
            }
        }

        Ok(Self { threads })
    }

    /// ファイルからスクリプトを読み込む
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("cannot load such file -- {}", path.display()))?;
        let script = Self::parse(&source).with_context(|| format!("{}", path.display()))?;
        Ok(script)
    }
}

/// スレッドの実行状態
struct Frame {
    file: String,
    line: u32,
    receiver: Value,
    locals: BTreeMap<String, Value>,
}

impl Frame {
    fn context(&self) -> Context {
        Context {
            receiver: self.receiver.clone(),
            locals: self.locals.clone(),
        }
    }

    fn assign(&mut self, locals: &[(String, Value)]) {
        for (name, value) in locals {
            self.locals.insert(name.clone(), value.clone());
        }
    }
}

/// トレーススクリプトを実行するターゲットプログラム
#[derive(Debug, Clone, Default)]
pub struct TraceScriptProgram {
    model: SharedModel,
}

impl TraceScriptProgram {
    pub fn new(model: SharedModel) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &SharedModel {
        &self.model
    }

    /// パース済みのスクリプトを実行する
    pub fn run(&self, script: &TraceScript, tracer: &dyn Tracer) -> Result<ProgramOutcome> {
        let Some((main, others)) = script.threads.split_first() else {
            return Ok(ProgramOutcome::Finished);
        };

        std::thread::scope(|scope| -> Result<ProgramOutcome> {
            let mut handles = Vec::new();
            for thread in others {
                let handle = std::thread::Builder::new()
                    .name(thread.name.clone())
                    .spawn_scoped(scope, move || self.run_thread(thread, tracer))
                    .with_context(|| format!("failed to spawn thread {}", thread.name))?;
                handles.push((thread.name.as_str(), handle));
            }

            let main_outcome = self.run_thread(main, tracer);

            let mut exit = None;
            for (name, handle) in handles {
                match handle.join() {
                    Ok(ProgramOutcome::Exit(code)) => {
                        exit.get_or_insert(code);
                    }
                    Ok(ProgramOutcome::Uncaught(exception)) => {
                        warn!("thread {} terminated with {}", name, exception);
                    }
                    Ok(ProgramOutcome::Finished) => {}
                    Err(_) => warn!("thread {} panicked", name),
                }
            }

            Ok(match (main_outcome, exit) {
                (ProgramOutcome::Exit(code), _) => ProgramOutcome::Exit(code),
                (_, Some(code)) => ProgramOutcome::Exit(code),
                (outcome, None) => outcome,
            })
        })
    }

    /// 1スレッド分の命令列を実行する
    fn run_thread(&self, thread: &ThreadScript, tracer: &dyn Tracer) -> ProgramOutcome {
        debug!("thread {} started", thread.name);
        // スレッドの開始処理はトレーサ自身のソースから報告される
        tracer.on_event(&TraceEvent::line(INTERNAL_SOURCE, 1, Context::new()));

        let mut frame = Frame {
            file: INTERNAL_SOURCE.to_string(),
            line: 1,
            receiver: Value::Nil,
            locals: BTreeMap::new(),
        };

        let directives = &thread.directives;
        let mut pc = 0;
        while pc < directives.len() {
            let (_, directive) = &directives[pc];
            pc += 1;

            let raised = match self.execute(directive, &mut frame, tracer) {
                Step::Next => continue,
                Step::Exit(code) => return ProgramOutcome::Exit(code),
                Step::Raise(exception) => exception,
            };

            tracer.on_event(&TraceEvent::raise(
                frame.file.clone(),
                frame.line,
                raised.clone(),
                frame.context(),
            ));

            match directives[pc..]
                .iter()
                .position(|(_, d)| *d == Directive::Rescue)
            {
                Some(offset) => pc += offset + 1,
                None => {
                    debug!("thread {} terminated by {}", thread.name, raised);
                    return ProgramOutcome::Uncaught(raised);
                }
            }
        }

        debug!("thread {} finished", thread.name);
        ProgramOutcome::Finished
    }

    fn execute(&self, directive: &Directive, frame: &mut Frame, tracer: &dyn Tracer) -> Step {
        match directive {
            Directive::Line { file, line, locals } => {
                frame.file = file.clone();
                frame.line = *line;
                frame.assign(locals);
                tracer.on_event(&TraceEvent::line(file.clone(), *line, frame.context()));
            }
            Directive::Call {
                class_name,
                method,
                location,
                receiver,
                locals,
            } => {
                let owner = match self.resolve(class_name) {
                    Ok(owner) => owner,
                    Err(raised) => return raised,
                };
                if let Some((file, line)) = location {
                    frame.file = file.clone();
                    frame.line = *line;
                }
                frame.receiver = match receiver {
                    Receiver::Instance => Value::Instance(owner),
                    Receiver::Class => Value::Type(owner),
                };
                frame.assign(locals);
                tracer.on_event(&TraceEvent::call(
                    frame.file.clone(),
                    frame.line,
                    Some(Constant::Type(owner)),
                    method.clone(),
                    frame.context(),
                ));
            }
            Directive::NativeCall {
                class_name,
                method,
                locals,
            } => {
                let owner = match self.resolve(class_name) {
                    Ok(owner) => owner,
                    Err(raised) => return raised,
                };
                frame.assign(locals);
                tracer.on_event(&TraceEvent::native_call(
                    frame.file.clone(),
                    frame.line,
                    Some(Constant::Type(owner)),
                    method.clone(),
                    frame.context(),
                ));
            }
            Directive::Raise {
                class_name,
                message,
            } => return Step::Raise(ExceptionInfo::new(class_name.clone(), message.clone())),
            Directive::Rescue => {}
            Directive::Exit(code) => return Step::Exit(*code),
            Directive::Class { name, superclass } => {
                let superclass = match superclass.as_deref().map(|s| self.resolve(s)) {
                    Some(Ok(ty)) => Some(ty),
                    Some(Err(raised)) => return raised,
                    None => None,
                };
                return self.define(|model| model.define_class(name, superclass).map(drop));
            }
            Directive::Module { name } => {
                return self.define(|model| model.define_module(name).map(drop));
            }
            Directive::Def {
                class_name,
                method,
                kind,
            } => {
                let owner = match self.resolve(class_name) {
                    Ok(owner) => owner,
                    Err(raised) => return raised,
                };
                self.model.write().define_method(owner, method, *kind);
            }
            Directive::Alias {
                class_name,
                new_name,
                old_name,
                kind,
            } => {
                let owner = match self.resolve(class_name) {
                    Ok(owner) => owner,
                    Err(raised) => return raised,
                };
                return self
                    .define(|model| model.alias_method(owner, new_name, old_name, *kind).map(drop));
            }
            Directive::Const { name, value } => {
                return self.define(|model| {
                    model.define_constant_at(name, Constant::Value(value.clone()))
                });
            }
        }
        Step::Next
    }

    /// クラス名を解決する（失敗すると `NameError` を送出する）
    fn resolve(&self, class_name: &str) -> std::result::Result<shiori_target::TypeHandle, Step> {
        self.model
            .read()
            .resolve_type(class_name)
            .map_err(|err| Step::Raise(ExceptionInfo::new("NameError", err.to_string())))
    }

    /// モデルを変更する（失敗すると `TypeError` を送出する）
    fn define(&self, f: impl FnOnce(&mut ObjectModel) -> Result<()>) -> Step {
        match f(&mut self.model.write()) {
            Ok(()) => Step::Next,
            Err(err) => Step::Raise(ExceptionInfo::new("TypeError", err.to_string())),
        }
    }
}

/// 命令の実行結果
enum Step {
    Next,
    Exit(i32),
    Raise(ExceptionInfo),
}

impl TargetProgram for TraceScriptProgram {
    fn load(&self, path: &Path, tracer: &dyn Tracer) -> Result<ProgramOutcome> {
        let script = TraceScript::load(path)?;
        debug!(
            "loaded trace script {} ({} threads)",
            path.display(),
            script.threads.len()
        );
        self.run(&script, tracer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shiori_target::{EventKind, TypeIntrospector};
    use std::sync::Mutex;

    /// 届いたイベントを記録するトレーサ
    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<TraceEvent>>,
    }

    impl Tracer for Recorder {
        fn on_event(&self, event: &TraceEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    impl Recorder {
        fn kinds(&self) -> Vec<(EventKind, String, u32)> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.file != INTERNAL_SOURCE)
                .map(|e| (e.kind, e.file.clone(), e.line))
                .collect()
        }
    }

    fn run(source: &str) -> (ProgramOutcome, Recorder, TraceScriptProgram) {
        let program = TraceScriptProgram::new(SharedModel::new(ObjectModel::with_builtins()));
        let recorder = Recorder::default();
        let script = TraceScript::parse(source).unwrap();
        let outcome = program.run(&script, &recorder).unwrap();
        (outcome, recorder, program)
    }

    #[test]
    fn test_parse_directives() {
        let script = TraceScript::parse(
            "# comment\n\
             line foo.rb 3 n=0 s=\"a b\" @ok=true\n\
             call Foo bar foo.rb 7 self=class\n\
             def Foo::Bar#baz\n\
             alias String.len size\n\
             thread worker\n\
             raise RuntimeError went wrong\n",
        )
        .unwrap();

        assert_eq!(script.threads.len(), 2);
        assert_eq!(script.threads[0].name, "main");
        assert_eq!(
            script.threads[0].directives[0],
            (
                2,
                Directive::Line {
                    file: "foo.rb".to_string(),
                    line: 3,
                    locals: vec![
                        ("n".to_string(), Value::Integer(0)),
                        ("s".to_string(), Value::String("a b".to_string())),
                        ("@ok".to_string(), Value::Boolean(true)),
                    ],
                }
            )
        );
        assert!(matches!(
            &script.threads[0].directives[1].1,
            Directive::Call { location: Some((file, 7)), receiver: Receiver::Class, .. } if file == "foo.rb"
        ));
        assert_eq!(
            script.threads[0].directives[2].1,
            Directive::Def {
                class_name: "Foo::Bar".to_string(),
                method: "baz".to_string(),
                kind: MethodKind::Instance,
            }
        );
        assert!(matches!(
            &script.threads[0].directives[3].1,
            Directive::Alias { kind: MethodKind::Class, .. }
        ));
        assert_eq!(
            script.threads[1].directives[0].1,
            Directive::Raise {
                class_name: "RuntimeError".to_string(),
                message: "went wrong".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_errors_report_line() {
        let err = TraceScript::parse("line foo.rb 1\njump foo.rb\n").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(TraceScript::parse("line foo.rb 0").is_err());
        assert!(TraceScript::parse("line foo.rb 1 n=bare").is_err());
        assert!(TraceScript::parse("thread a\nthread a").is_err());
        assert!(TraceScript::parse("def Foo").is_err());
    }

    #[test]
    fn test_run_emits_events_in_order() {
        let (outcome, recorder, _) = run("class Foo\n\
             def Foo#bar\n\
             line foo.rb 1\n\
             call Foo bar foo.rb 5\n\
             ccall String size\n\
             line foo.rb 6\n");

        assert_eq!(outcome, ProgramOutcome::Finished);
        assert_eq!(
            recorder.kinds(),
            vec![
                (EventKind::Line, "foo.rb".to_string(), 1),
                (EventKind::Call, "foo.rb".to_string(), 5),
                (EventKind::NativeCall, "foo.rb".to_string(), 5),
                (EventKind::Line, "foo.rb".to_string(), 6),
            ]
        );

        let events = recorder.events.lock().unwrap();
        assert_eq!(events[0].file, INTERNAL_SOURCE);
    }

    #[test]
    fn test_call_receiver() {
        let (_, recorder, program) = run("class Foo\n\
             call Foo bar foo.rb 5 x=1\n\
             call Foo build foo.rb 9 self=\"class\"\n");

        let foo = program.model().read().resolve_type("Foo").unwrap();
        let events = recorder.events.lock().unwrap();
        assert_eq!(events[1].context.receiver, Value::Instance(foo));
        assert_eq!(events[1].context.lookup("x"), Some(&Value::Integer(1)));
        assert_eq!(events[2].context.receiver, Value::Type(foo));
        assert!(program.model().is_instance_of(&events[1].context.receiver, foo));
    }

    #[test]
    fn test_rescued_raise_continues() {
        let (outcome, recorder, _) = run("line foo.rb 1\n\
             raise RuntimeError boom\n\
             line foo.rb 2\n\
             rescue\n\
             line foo.rb 3\n");

        assert_eq!(outcome, ProgramOutcome::Finished);
        assert_eq!(
            recorder.kinds(),
            vec![
                (EventKind::Line, "foo.rb".to_string(), 1),
                (EventKind::Raise, "foo.rb".to_string(), 1),
                (EventKind::Line, "foo.rb".to_string(), 3),
            ]
        );
    }

    #[test]
    fn test_uncaught_raise_and_exit() {
        let (outcome, recorder, _) = run("line foo.rb 1\nraise ArgumentError bad\nline foo.rb 2\n");
        match outcome {
            ProgramOutcome::Uncaught(exception) => {
                assert_eq!(exception.to_string(), "ArgumentError: bad");
                let events = recorder.events.lock().unwrap();
                assert_eq!(events.last().unwrap().exception.as_ref(), Some(&exception));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }

        let (outcome, _, _) = run("line foo.rb 1\nexit 3\nline foo.rb 2\n");
        assert_eq!(outcome, ProgramOutcome::Exit(3));
    }

    #[test]
    fn test_unknown_class_raises_name_error() {
        let (outcome, _, _) = run("call Missing go\n");
        match outcome {
            ProgramOutcome::Uncaught(exception) => {
                assert_eq!(exception.class_name, "NameError");
                assert!(exception.message.contains("Missing"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_threads_run_with_names() {
        let program = TraceScriptProgram::new(SharedModel::default());
        let names = Mutex::new(Vec::new());

        struct Names<'a>(&'a Mutex<Vec<Option<String>>>);
        impl Tracer for Names<'_> {
            fn on_event(&self, event: &TraceEvent) {
                if event.file != INTERNAL_SOURCE {
                    let name = std::thread::current().name().map(str::to_string);
                    self.0.lock().unwrap().push(name);
                }
            }
        }

        let script = TraceScript::parse("thread worker\nline w.rb 1\nexit 2\n").unwrap();
        let outcome = program.run(&script, &Names(&names)).unwrap();

        assert_eq!(outcome, ProgramOutcome::Exit(2));
        assert_eq!(*names.lock().unwrap(), vec![Some("worker".to_string())]);
    }

    #[test]
    fn test_load_missing_file() {
        let program = TraceScriptProgram::default();
        let err = program
            .load(Path::new("/no/such/script.trace"), &Recorder::default())
            .unwrap_err();
        assert!(format!("{:#}", err).contains("cannot load such file"));
    }
}
