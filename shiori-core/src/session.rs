//! デバッグセッションの状態管理
//!
//! デバッグ中かどうか、スレッドごとのステップ実行要求、そして停止・再開の
//! 受け渡しを管理します。停止したスレッドはプロセス全体で1つの対話スロット
//! （ミューテックス）を保持したまま、対話側から再開指示が届くまで条件変数で待機します。
//! 同時に別スレッドがブレークポイントに到達した場合は、スロットの取得待ちで並びます。

use crate::BreakpointId;
use shiori_target::{Context, ExceptionInfo, Thread, Tid};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// 再開指示
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeDirective {
    /// 何も設定せずに再開
    Continue,
    /// 同じファイルの次の行で再び停止
    Next,
}

/// 停止理由
#[derive(Debug, Clone, PartialEq)]
pub enum StopReason {
    /// ステップ実行（step / next）
    Step,
    /// ブレークポイントに到達
    Breakpoint(BreakpointId),
    /// 例外の送出（break-on-raise）
    Raise(ExceptionInfo),
    /// 捕捉されずにターゲットを抜けた例外
    Uncaught(ExceptionInfo),
}

/// 停止したスレッドの情報
#[derive(Debug, Clone)]
pub struct Stop {
    pub thread: Thread,
    pub reason: StopReason,
    /// 停止したファイル（next の基準になる）
    pub file: Option<String>,
    pub line: Option<u32>,
    /// 対話側に表示するメッセージ
    pub announcement: String,
    /// 停止したフレームのコンテキスト（例外の送出元が不明な場合は `None`）
    pub context: Option<Context>,
}

/// ターゲットの終了状態
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// 最後まで実行された
    Finished,
    /// プロセス終了要求で抜けた
    Exited(i32),
    /// 捕捉されなかった例外で抜けた
    Uncaught(ExceptionInfo),
}

/// 対話側に届くセッションイベント
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// スレッドが停止した
    Suspended(Stop),
    /// ターゲットの実行が終了した
    Terminated(Termination),
}

/// 対話セッション（REPL）
///
/// 停止ごとに呼び出され、ユーザーの判断が決まるまでブロックして再開指示を返します。
pub trait Interactive {
    fn run_interactive(&self, stop: &Stop) -> ResumeDirective;

    /// ターゲットの実行が終了したときに呼ばれる
    fn on_terminated(&self, _termination: &Termination) {}
}

/// 送出された例外とそのコンテキスト
#[derive(Debug, Clone)]
pub(crate) struct RaisedException {
    pub exception: ExceptionInfo,
    pub context: Context,
    pub file: String,
    pub line: u32,
}

/// スレッドごとの状態
#[derive(Debug, Default)]
struct ThreadState {
    /// next 実行中のファイル
    stepped_file: Option<String>,
    /// step 実行中
    stepping: bool,
    last_exception: Option<RaisedException>,
}

/// 停止・再開の受け渡し状態
#[derive(Debug, Default)]
struct Handoff {
    stop: Option<Stop>,
    /// 停止を対話側に渡し済みか
    delivered: bool,
    directive: Option<ResumeDirective>,
    terminations: VecDeque<Termination>,
}

/// セッションコントローラ
#[derive(Debug)]
pub struct SessionController {
    debugging: AtomicBool,
    tracing: AtomicBool,
    break_on_raise: AtomicBool,
    /// 実行開始前に step が要求された
    entry_step: AtomicBool,
    threads: Mutex<HashMap<Tid, ThreadState>>,
    /// 対話スロット
    slot: Mutex<()>,
    handoff: Mutex<Handoff>,
    signal: Condvar,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SessionController {
    /// デバッグしていない状態のコントローラを作成する
    pub fn new() -> Self {
        Self {
            debugging: AtomicBool::new(false),
            tracing: AtomicBool::new(false),
            break_on_raise: AtomicBool::new(false),
            entry_step: AtomicBool::new(false),
            threads: Mutex::new(HashMap::new()),
            slot: Mutex::new(()),
            handoff: Mutex::new(Handoff::default()),
            signal: Condvar::new(),
        }
    }

    /// トレースを有効にしてデバッグ中にする
    ///
    /// 前のセッションの受け取られなかった終了通知は破棄します。
    pub fn start(&self, load_target: bool) {
        lock(&self.handoff).terminations.clear();
        self.tracing.store(true, Ordering::SeqCst);
        self.debugging.store(true, Ordering::SeqCst);
        debug!("debug session started (load_target={})", load_target);
    }

    /// デバッグ中でなければデバッグ中にする
    ///
    /// 同時に2つの実行が始まらないよう、判定と設定を1操作で行います。
    pub(crate) fn try_begin(&self) -> bool {
        self.debugging
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// 実行開始前の step 要求を、ターゲットをロードするスレッドに引き継ぐ
    pub(crate) fn enter_target(&self, tid: Tid) {
        if self.entry_step.swap(false, Ordering::SeqCst) {
            lock(&self.threads).entry(tid).or_default().stepping = true;
        }
    }

    /// 開始できなかったセッションを取り消す（終了通知は送らない）
    pub(crate) fn abort(&self) {
        self.tracing.store(false, Ordering::SeqCst);
        self.debugging.store(false, Ordering::SeqCst);
        self.entry_step.store(false, Ordering::SeqCst);
    }

    /// 実行開始時に step を有効にする
    pub(crate) fn arm_entry_step(&self) {
        self.entry_step.store(true, Ordering::SeqCst);
    }

    /// トレースを無効にする
    pub fn disable_tracing(&self) {
        self.tracing.store(false, Ordering::SeqCst);
    }

    /// ターゲットの終了を記録し、対話側に通知する
    pub fn finish(&self, termination: Termination) {
        self.tracing.store(false, Ordering::SeqCst);
        self.debugging.store(false, Ordering::SeqCst);
        lock(&self.threads).clear();
        debug!("debug session finished: {:?}", termination);

        let mut handoff = lock(&self.handoff);
        handoff.terminations.push_back(termination);
        self.signal.notify_all();
    }

    /// 状態を初期化する
    pub(crate) fn reset(&self) {
        self.break_on_raise.store(false, Ordering::SeqCst);
        self.entry_step.store(false, Ordering::SeqCst);
        lock(&self.threads).clear();
        lock(&self.handoff).terminations.clear();
    }

    pub fn is_debugging(&self) -> bool {
        self.debugging.load(Ordering::SeqCst)
    }

    pub fn is_tracing(&self) -> bool {
        self.tracing.load(Ordering::SeqCst)
    }

    pub fn break_on_raise(&self) -> bool {
        self.break_on_raise.load(Ordering::SeqCst)
    }

    pub fn set_break_on_raise(&self, enabled: bool) {
        self.break_on_raise.store(enabled, Ordering::SeqCst);
    }

    /// break-on-raise を切り替え、切り替え後の値を返す
    pub fn toggle_break_on_raise(&self) -> bool {
        !self.break_on_raise.fetch_xor(true, Ordering::SeqCst)
    }

    /// step 実行が要求されているか
    ///
    /// 停止中のスレッドがあればそのスレッドの状態を、なければ実行開始前の
    /// 要求と呼び出し元スレッドの状態を返します。
    pub fn is_stepping(&self) -> bool {
        let tid = match self.suspended() {
            Some(stop) => stop.thread.tid(),
            None => {
                if self.entry_step.load(Ordering::SeqCst) {
                    return true;
                }
                Tid::current()
            }
        };
        lock(&self.threads)
            .get(&tid)
            .is_some_and(|state| state.stepping)
    }

    /// 現在のファイルが next 実行中のファイルなら、要求を消費して真を返す
    pub(crate) fn take_stepped_file(&self, tid: Tid, file: &str) -> bool {
        let mut threads = lock(&self.threads);
        match threads.get_mut(&tid) {
            Some(state) if state.stepped_file.as_deref() == Some(file) => {
                state.stepped_file = None;
                true
            }
            _ => false,
        }
    }

    /// step 実行中なら、要求を消費して真を返す
    pub(crate) fn take_stepping(&self, tid: Tid) -> bool {
        let mut threads = lock(&self.threads);
        match threads.get_mut(&tid) {
            Some(state) if state.stepping => {
                state.stepping = false;
                true
            }
            _ => false,
        }
    }

    /// スレッドで最後に送出された例外を記録する
    pub(crate) fn record_exception(&self, tid: Tid, raised: RaisedException) {
        lock(&self.threads).entry(tid).or_default().last_exception = Some(raised);
    }

    /// 例外が送出されたコンテキストを探す
    pub(crate) fn context_of_exception(
        &self,
        exception: &ExceptionInfo,
    ) -> Option<(Tid, RaisedException)> {
        lock(&self.threads).iter().find_map(|(tid, state)| {
            state
                .last_exception
                .as_ref()
                .filter(|raised| raised.exception == *exception)
                .map(|raised| (*tid, raised.clone()))
        })
    }

    /// 現在停止しているスレッドの情報を取得する
    pub fn suspended(&self) -> Option<Stop> {
        lock(&self.handoff).stop.clone()
    }

    /// スレッドを停止させ、再開指示が届くまでブロックする
    ///
    /// 対話スロットを取得してから停止を公開します。スロットは他のスレッドが
    /// 停止している間は取得できないため、同時に停止したスレッドは順番に処理されます。
    /// `Next` が指示された場合は、停止したファイルを next の対象として設定します。
    pub fn suspend(&self, stop: Stop) -> ResumeDirective {
        let _slot = lock(&self.slot);
        let tid = stop.thread.tid();
        let file = stop.file.clone();
        debug!("thread {} suspended: {}", stop.thread, stop.announcement);

        let mut handoff = lock(&self.handoff);
        handoff.stop = Some(stop);
        handoff.delivered = false;
        handoff.directive = None;
        self.signal.notify_all();

        let directive = loop {
            if let Some(directive) = handoff.directive.take() {
                break directive;
            }
            handoff = self
                .signal
                .wait(handoff)
                .unwrap_or_else(PoisonError::into_inner);
        };
        handoff.stop = None;
        handoff.delivered = false;
        drop(handoff);

        if directive == ResumeDirective::Next {
            if let Some(file) = file {
                lock(&self.threads).entry(tid).or_default().stepped_file = Some(file);
            }
        }
        debug!("thread {} resumed with {:?}", tid, directive);
        directive
    }

    /// 次のセッションイベントを待つ
    ///
    /// 未通知の停止があればそれを、なければ終了通知を返します。
    /// どちらもなければ届くまでブロックします。
    pub fn wait_event(&self) -> SessionEvent {
        let mut handoff = lock(&self.handoff);
        loop {
            if !handoff.delivered && handoff.directive.is_none() {
                if let Some(stop) = handoff.stop.clone() {
                    handoff.delivered = true;
                    return SessionEvent::Suspended(stop);
                }
            }
            if let Some(termination) = handoff.terminations.pop_front() {
                return SessionEvent::Terminated(termination);
            }
            handoff = self
                .signal
                .wait(handoff)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// 停止中のスレッドを再開する
    pub fn resume(&self, directive: ResumeDirective) -> crate::Result<()> {
        if !self.is_debugging() {
            return Err(crate::DebugError::NotDebugging);
        }

        let mut handoff = lock(&self.handoff);
        if handoff.stop.is_none() || handoff.directive.is_some() {
            return Err(crate::DebugError::NotSuspended);
        }
        handoff.directive = Some(directive);
        self.signal.notify_all();
        Ok(())
    }

    /// 停止中のスレッドに step を設定して再開する
    pub(crate) fn step_suspended(&self) -> crate::Result<()> {
        if !self.is_debugging() {
            return Err(crate::DebugError::NotDebugging);
        }
        let tid = self
            .suspended()
            .map(|stop| stop.thread.tid())
            .ok_or(crate::DebugError::NotSuspended)?;

        lock(&self.threads).entry(tid).or_default().stepping = true;
        self.resume(ResumeDirective::Continue)
    }

    /// 対話セッションで停止を処理し続ける
    ///
    /// ターゲットが終了するまで、停止のたびに `interactive` を呼び出して
    /// その指示で再開します。
    pub fn serve(&self, interactive: &dyn Interactive) -> Termination {
        loop {
            match self.wait_event() {
                SessionEvent::Suspended(stop) => {
                    let directive = interactive.run_interactive(&stop);
                    if let Err(err) = self.resume(directive) {
                        warn!("failed to resume thread {}: {}", stop.thread, err);
                    }
                }
                SessionEvent::Terminated(termination) => {
                    interactive.on_terminated(&termination);
                    return termination;
                }
            }
        }
    }
}

impl Default for SessionController {
    fn default() -> Self {
        Self::new()
    }
}
