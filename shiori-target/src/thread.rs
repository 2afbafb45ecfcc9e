//! スレッド識別

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// スレッドID
///
/// イベントを発生させたスレッドを識別します。
/// `std::thread::ThreadId` は数値として取り出せないため、独自に採番します。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tid(pub u64);

static NEXT_TID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT_TID: Tid = Tid(NEXT_TID.fetch_add(1, Ordering::Relaxed));
}

impl Tid {
    /// 現在のスレッドのIDを取得する
    pub fn current() -> Self {
        CURRENT_TID.with(|tid| *tid)
    }
}

impl fmt::Display for Tid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// デバッグ対象のスレッド
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thread {
    tid: Tid,
    name: Option<String>,
}

impl Thread {
    /// スレッドを作成する
    pub fn new(tid: Tid, name: Option<String>) -> Self {
        Self { tid, name }
    }

    /// 現在のスレッドを取得する
    pub fn current() -> Self {
        let name = std::thread::current().name().map(str::to_string);
        Self::new(Tid::current(), name)
    }

    /// スレッドIDを取得する
    pub fn tid(&self) -> Tid {
        self.tid
    }

    /// スレッド名を取得する
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl fmt::Display for Thread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "{}", self.tid),
        }
    }
}
