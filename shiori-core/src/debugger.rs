//! デバッガのメインロジック

use crate::dispatch::EventDispatcher;
use crate::parse::BreakpointSpec;
use crate::session::{SessionController, SessionEvent, Stop, StopReason, Termination};
use crate::{Breakpoint, BreakpointId, BreakpointRegistry, DebugError, Interactive, Result};
use shiori_target::{
    ExceptionInfo, ExpressionEvaluator, ProgramOutcome, TargetProgram, Thread, Tid, TraceEvent,
    Tracer, TypeIntrospector, INTERNAL_SOURCE,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread::JoinHandle;
use tracing::{debug, warn};

/// デバッガの設定
#[derive(Debug, Clone)]
pub struct DebuggerConfig {
    /// トレーサ自身のソース（ここから届いたイベントは無視する）
    pub internal_sources: Vec<PathBuf>,
}

impl Default for DebuggerConfig {
    fn default() -> Self {
        Self {
            internal_sources: vec![PathBuf::from(INTERNAL_SOURCE)],
        }
    }
}

/// デバッガ
///
/// ブレークポイントとデバッグセッションを所有し、ターゲットから届く
/// トレースイベントを処理します。ターゲットは専用のスレッドで実行され、
/// 対話側（REPL）は別のスレッドから [`Debugger::wait_event`] で停止を受け取ります。
pub struct Debugger {
    config: DebuggerConfig,
    /// ブレークポイント管理
    registry: RwLock<BreakpointRegistry>,
    session: SessionController,
    /// デバッグ対象ファイル
    target_file: Mutex<Option<PathBuf>>,
    introspector: Arc<dyn TypeIntrospector>,
    evaluator: Arc<dyn ExpressionEvaluator>,
    /// ターゲットプログラムのローダー
    program: Option<Arc<dyn TargetProgram>>,
    /// ターゲットを実行中のスレッド
    loader: Mutex<Option<JoinHandle<Termination>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Debugger {
    /// 新しいデバッガを作成する
    pub fn new(
        introspector: Arc<dyn TypeIntrospector>,
        evaluator: Arc<dyn ExpressionEvaluator>,
    ) -> Self {
        Self {
            config: DebuggerConfig::default(),
            registry: RwLock::new(BreakpointRegistry::new()),
            session: SessionController::new(),
            target_file: Mutex::new(None),
            introspector,
            evaluator,
            program: None,
            loader: Mutex::new(None),
        }
    }

    /// ターゲットプログラムのローダーを設定する
    pub fn with_program(mut self, program: Arc<dyn TargetProgram>) -> Self {
        self.program = Some(program);
        self
    }

    pub fn with_config(mut self, config: DebuggerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &DebuggerConfig {
        &self.config
    }

    fn registry(&self) -> RwLockReadGuard<'_, BreakpointRegistry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn registry_mut(&self) -> RwLockWriteGuard<'_, BreakpointRegistry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// 行ブレークポイントを追加する
    pub fn add_line_breakpoint(&self, file: &str, line: u32) -> Result<Breakpoint> {
        let bp = self.registry_mut().add_line(file, line)?;
        debug!("added {}", bp);
        Ok(bp)
    }

    /// メソッドブレークポイントを追加する
    pub fn add_method_breakpoint(
        &self,
        class_name: &str,
        method_name: &str,
        is_class_method: bool,
    ) -> Result<Breakpoint> {
        let bp = self
            .registry_mut()
            .add_method(class_name, method_name, is_class_method)?;
        debug!("added {}", bp);
        Ok(bp)
    }

    /// パース済みの指定からブレークポイントを追加する
    pub fn add_breakpoint(&self, spec: &BreakpointSpec) -> Result<Breakpoint> {
        match spec {
            BreakpointSpec::Line { file, line } => self.add_line_breakpoint(file, *line),
            BreakpointSpec::Method {
                class_name,
                method_name,
                is_class_method,
            } => self.add_method_breakpoint(class_name, method_name, *is_class_method),
        }
    }

    /// ブレークポイントを削除する
    pub fn remove_breakpoint(&self, id: BreakpointId) -> Result<Breakpoint> {
        let bp = self.registry_mut().remove(id)?;
        debug!("removed {}", bp);
        Ok(bp)
    }

    /// 停止条件を設定する（`None` で解除）
    pub fn set_condition(&self, id: BreakpointId, condition: Option<String>) -> Result<()> {
        self.registry_mut().set_condition(id, condition)
    }

    pub fn enable_breakpoint(&self, id: BreakpointId) -> Result<()> {
        self.registry_mut().set_enabled(id, true)
    }

    pub fn disable_breakpoint(&self, id: BreakpointId) -> Result<()> {
        self.registry_mut().set_enabled(id, false)
    }

    /// ブレークポイントを取得する
    pub fn breakpoint(&self, id: BreakpointId) -> Result<Breakpoint> {
        self.registry().find(id).cloned()
    }

    /// 全てのブレークポイントを追加順に取得する
    pub fn list_breakpoints(&self) -> Vec<Breakpoint> {
        self.registry().all().cloned().collect()
    }

    pub fn line_breakpoints(&self) -> Vec<Breakpoint> {
        self.registry().line_breakpoints().cloned().collect()
    }

    pub fn method_breakpoints(&self) -> Vec<Breakpoint> {
        self.registry().method_breakpoints().cloned().collect()
    }

    /// デバッグ対象ファイルを設定する
    pub fn set_target_file(&self, path: impl Into<PathBuf>) {
        *lock(&self.target_file) = Some(path.into());
    }

    pub fn target_file(&self) -> Option<PathBuf> {
        lock(&self.target_file).clone()
    }

    fn checked_target_file(&self) -> Result<PathBuf> {
        let path = self.target_file().ok_or(DebugError::FileNotSet)?;
        if !path.exists() {
            return Err(DebugError::FileMissing(path));
        }
        Ok(path)
    }

    /// 現在のスレッドでデバッグセッションを開始する
    ///
    /// `load_target` が偽ならトレースを有効にしてすぐに戻ります。
    /// 真ならターゲットを現在のスレッドでロードし、終了するまでブロックします。
    pub fn start_session(&self, load_target: bool) -> Result<Option<Termination>> {
        let path = if load_target {
            if self.program.is_none() {
                return Err(DebugError::NoTargetProgram);
            }
            Some(self.checked_target_file()?)
        } else {
            None
        };
        if !self.session.try_begin() {
            return Err(DebugError::AlreadyDebugging);
        }
        self.session.start(load_target);

        Ok(path.map(|path| self.load_target(&path)))
    }

    /// ターゲットの実行を開始する
    ///
    /// ターゲットは `shiori-target` という名前の専用スレッドで実行されます。
    pub fn request_run(self: &Arc<Self>) -> Result<()> {
        if self.session.is_debugging() {
            return Err(DebugError::AlreadyDebugging);
        }
        let path = self.checked_target_file()?;
        if self.program.is_none() {
            return Err(DebugError::NoTargetProgram);
        }
        if !self.session.try_begin() {
            return Err(DebugError::AlreadyDebugging);
        }
        self.session.start(true);

        let debugger = Arc::clone(self);
        let spawned = std::thread::Builder::new()
            .name("shiori-target".to_string())
            .spawn(move || debugger.load_target(&path));

        match spawned {
            Ok(handle) => {
                *lock(&self.loader) = Some(handle);
                Ok(())
            }
            Err(err) => {
                self.session.abort();
                Err(DebugError::Spawn(err.to_string()))
            }
        }
    }

    /// 1行だけ実行する
    ///
    /// デバッグ中でなければ、最初の行で停止するようにしてから実行を開始します。
    pub fn request_step(self: &Arc<Self>) -> Result<()> {
        if self.session.is_debugging() {
            return self.session.step_suspended();
        }
        self.session.arm_entry_step();
        self.request_run()
    }

    /// 同じファイルの次の行まで実行する
    pub fn request_next(&self) -> Result<()> {
        self.session.resume(crate::ResumeDirective::Next)
    }

    /// 実行を継続する
    pub fn request_continue(&self) -> Result<()> {
        self.session.resume(crate::ResumeDirective::Continue)
    }

    /// break-on-raise を切り替え、切り替え後の値を返す
    pub fn toggle_break_on_raise(&self) -> bool {
        self.session.toggle_break_on_raise()
    }

    pub fn set_break_on_raise(&self, enabled: bool) {
        self.session.set_break_on_raise(enabled);
    }

    pub fn is_debugging(&self) -> bool {
        self.session.is_debugging()
    }

    pub fn break_on_raise(&self) -> bool {
        self.session.break_on_raise()
    }

    pub fn is_stepping(&self) -> bool {
        self.session.is_stepping()
    }

    /// 現在停止しているスレッドの情報を取得する
    pub fn suspended(&self) -> Option<Stop> {
        self.session.suspended()
    }

    /// 次の停止または終了を待つ
    pub fn wait_event(&self) -> SessionEvent {
        self.session.wait_event()
    }

    /// 対話セッションでターゲットの終了まで停止を処理する
    pub fn serve(&self, interactive: &dyn Interactive) -> Termination {
        self.session.serve(interactive)
    }

    /// ターゲットのスレッドが終わるのを待つ
    pub fn join_target(&self) -> Option<Termination> {
        let handle = lock(&self.loader).take()?;
        match handle.join() {
            Ok(termination) => Some(termination),
            Err(_) => {
                warn!("target thread panicked");
                None
            }
        }
    }

    /// ブレークポイントと設定を初期化する
    ///
    /// デバッグ中は初期化できません。IDは0から振り直されます。
    pub fn reset(&self) -> Result<()> {
        if self.session.is_debugging() {
            return Err(DebugError::AlreadyDebugging);
        }
        self.registry_mut().clear();
        *lock(&self.target_file) = None;
        self.session.reset();
        Ok(())
    }

    /// ターゲットをロードし、終了までを処理する
    fn load_target(&self, path: &Path) -> Termination {
        self.session.enter_target(Tid::current());
        debug!("loading target {}", path.display());

        let outcome = match &self.program {
            Some(program) => program.load(path, self),
            None => Err(anyhow::anyhow!("no target program loader is configured")),
        };

        let termination = match outcome {
            Ok(ProgramOutcome::Finished) => Termination::Finished,
            Ok(ProgramOutcome::Exit(code)) => Termination::Exited(code),
            Ok(ProgramOutcome::Uncaught(exception)) => {
                self.recover(&exception);
                Termination::Uncaught(exception)
            }
            Err(err) => {
                let exception = ExceptionInfo::new("LoadError", format!("{:#}", err));
                self.recover(&exception);
                Termination::Uncaught(exception)
            }
        };

        self.session.finish(termination.clone());
        termination
    }

    /// 捕捉されなかった例外の後に対話側へ制御を戻す
    ///
    /// トレースを止めてから、例外の送出元が分かればそのフレームで、
    /// 分からなければフレームなしで停止します。
    fn recover(&self, exception: &ExceptionInfo) {
        self.session.disable_tracing();
        warn!("unrescued exception: {}", exception);

        let stop = match self.session.context_of_exception(exception) {
            Some((_, raised)) => Stop {
                thread: Thread::current(),
                reason: StopReason::Uncaught(exception.clone()),
                file: Some(raised.file),
                line: Some(raised.line),
                announcement: format!(
                    "unrescued exception: {}\nreturning back to where the exception was raised",
                    exception
                ),
                context: Some(raised.context),
            },
            None => Stop {
                thread: Thread::current(),
                reason: StopReason::Uncaught(exception.clone()),
                file: None,
                line: None,
                announcement: format!(
                    "unrescued exception: {}\ncontext of the exception is unknown, stopping at the exception itself",
                    exception
                ),
                context: None,
            },
        };
        self.session.suspend(stop);
    }
}

impl Tracer for Debugger {
    fn on_event(&self, event: &TraceEvent) {
        let stop = {
            let registry = self.registry();
            let dispatcher = EventDispatcher {
                registry: &registry,
                session: &self.session,
                introspector: self.introspector.as_ref(),
                evaluator: self.evaluator.as_ref(),
                internal_sources: &self.config.internal_sources,
            };
            dispatcher.dispatch(event)
        };

        if let Some(stop) = stop {
            self.session.suspend(stop);
        }
    }
}
