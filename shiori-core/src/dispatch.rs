//! トレースイベントの振り分け
//!
//! 届いたイベントをブレークポイントやステップ実行要求と照合し、
//! スレッドを停止させるべきか判定します。

use crate::session::{RaisedException, SessionController, Stop, StopReason};
use crate::{condition, path, Breakpoint, BreakpointRegistry, MethodResolver};
use shiori_target::{
    Constant, EventKind, ExpressionEvaluator, MethodKind, Thread, TraceEvent, TypeHandle,
    TypeIntrospector,
};
use std::path::PathBuf;
use tracing::debug;

/// イベントディスパッチャ
pub struct EventDispatcher<'a> {
    pub registry: &'a BreakpointRegistry,
    pub session: &'a SessionController,
    pub introspector: &'a dyn TypeIntrospector,
    pub evaluator: &'a dyn ExpressionEvaluator,
    /// トレーサ自身のソース（このファイルのイベントは無視する）
    pub internal_sources: &'a [PathBuf],
}

impl<'a> EventDispatcher<'a> {
    /// イベントを処理し、停止すべきなら停止情報を返す
    ///
    /// 呼び出し元のスレッドがイベントを発生させたスレッドです。
    pub fn dispatch(&self, event: &TraceEvent) -> Option<Stop> {
        if !self.session.is_tracing() || self.is_internal(&event.file) {
            return None;
        }

        let thread = Thread::current();
        match event.kind {
            EventKind::Line => self.on_line(thread, event),
            EventKind::Call | EventKind::NativeCall => self.on_call(thread, event),
            EventKind::Raise => self.on_raise(thread, event),
        }
    }

    fn is_internal(&self, file: &str) -> bool {
        let file = std::path::Path::new(file);
        self.internal_sources
            .iter()
            .any(|source| path::same_file(source, file))
    }

    fn stop(
        &self,
        thread: Thread,
        reason: StopReason,
        event: &TraceEvent,
        announcement: String,
    ) -> Stop {
        Stop {
            thread,
            reason,
            file: Some(event.file.clone()),
            line: Some(event.line),
            announcement,
            context: Some(event.context.clone()),
        }
    }

    fn on_line(&self, thread: Thread, event: &TraceEvent) -> Option<Stop> {
        let tid = thread.tid();
        if self.session.take_stepped_file(tid, &event.file) || self.session.take_stepping(tid) {
            let announcement = format!("stepped at {}:{}", event.file, event.line);
            return Some(self.stop(thread, StopReason::Step, event, announcement));
        }

        let bp = self.registry.line_breakpoints().find(|bp| {
            bp.enabled
                && bp
                    .as_line()
                    .is_some_and(|line| line.is_at(&event.file, event.line))
                && self.condition_passes(bp, event)
        })?;

        debug!("line event {}:{} hit {}", event.file, event.line, bp);
        Some(self.reached(thread, bp, event))
    }

    fn on_call(&self, thread: Thread, event: &TraceEvent) -> Option<Stop> {
        let Some(Constant::Type(owner)) = event.owner else {
            return None;
        };
        let method = event.method.as_deref()?;
        let kinds = self.call_kinds(event.kind, owner, method, event);
        if kinds.is_empty() {
            return None;
        }

        let resolver = MethodResolver::new(self.introspector);
        let bp = self.registry.method_breakpoints().find(|bp| {
            bp.enabled
                && bp.as_method().is_some_and(|target| {
                    kinds
                        .iter()
                        .any(|kind| resolver.matches(target, owner, method, *kind))
                })
                && self.condition_passes(bp, event)
        })?;

        debug!("call event {} hit {}", method, bp);
        Some(self.reached(thread, bp, event))
    }

    /// 呼び出されたメソッドの種類を推定する
    ///
    /// 言語レベルの呼び出しでは、レシーバが所有者のインスタンスでなければクラスメソッドです。
    /// ネイティブ呼び出しではレシーバが信用できないため、メソッド表から判断し、
    /// 両方に同名のメソッドがあれば両方を試します。
    fn call_kinds(
        &self,
        kind: EventKind,
        owner: TypeHandle,
        method: &str,
        event: &TraceEvent,
    ) -> Vec<MethodKind> {
        if kind == EventKind::Call {
            if self
                .introspector
                .is_instance_of(&event.context.receiver, owner)
            {
                return vec![MethodKind::Instance];
            }
            return vec![MethodKind::Class];
        }

        let instance = self
            .introspector
            .has_method(owner, method, MethodKind::Instance);
        let class = self.introspector.has_method(owner, method, MethodKind::Class);
        match (instance, class) {
            (true, true) => vec![MethodKind::Class, MethodKind::Instance],
            (true, false) => vec![MethodKind::Instance],
            (false, true) => vec![MethodKind::Class],
            (false, false) => Vec::new(),
        }
    }

    fn on_raise(&self, thread: Thread, event: &TraceEvent) -> Option<Stop> {
        let exception = event.exception.clone()?;
        self.session.record_exception(
            thread.tid(),
            RaisedException {
                exception: exception.clone(),
                context: event.context.clone(),
                file: event.file.clone(),
                line: event.line,
            },
        );

        if !self.session.break_on_raise() {
            return None;
        }

        let announcement = format!("raised {} at {}:{}", exception, event.file, event.line);
        Some(self.stop(thread, StopReason::Raise(exception), event, announcement))
    }

    fn reached(&self, thread: Thread, bp: &Breakpoint, event: &TraceEvent) -> Stop {
        let announcement = format!("reached {}", bp);
        self.stop(thread, StopReason::Breakpoint(bp.id), event, announcement)
    }

    fn condition_passes(&self, bp: &Breakpoint, event: &TraceEvent) -> bool {
        condition::passes(self.evaluator, bp.condition.as_deref(), &event.context)
    }
}
