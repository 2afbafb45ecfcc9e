//! 複数スレッドが同時に停止した場合のテスト

use shiori_core::{Debugger, Interactive, ResumeDirective, SessionEvent, Stop, Termination};
use shiori_model::{ConditionEvaluator, ObjectModel, SharedModel, TraceScriptProgram};
use shiori_target::{Context, TraceEvent, Tracer, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::time::Duration;

fn debugger() -> Arc<Debugger> {
    Arc::new(Debugger::new(
        Arc::new(ObjectModel::with_builtins()),
        Arc::new(ConditionEvaluator::new()),
    ))
}

fn expect_stop(debugger: &Debugger) -> Stop {
    match debugger.wait_event() {
        SessionEvent::Suspended(stop) => stop,
        other => panic!("unexpected event: {:?}", other),
    }
}

#[test]
fn test_simultaneous_stops_are_handled_one_at_a_time() {
    let debugger = debugger();
    debugger.add_line_breakpoint("worker.rb", 3).unwrap();
    assert_eq!(debugger.start_session(false).unwrap(), None);

    let barrier = Arc::new(Barrier::new(2));
    let workers: Vec<_> = ["worker-1", "worker-2"]
        .into_iter()
        .map(|name| {
            let debugger = Arc::clone(&debugger);
            let barrier = Arc::clone(&barrier);
            std::thread::Builder::new()
                .name(name.to_string())
                .spawn(move || {
                    barrier.wait();
                    let context = Context::new().with_local("name", Value::String(name.to_string()));
                    debugger.on_event(&TraceEvent::line("worker.rb", 3, context));
                })
                .unwrap()
        })
        .collect();

    let first = expect_stop(&debugger);
    assert_eq!(first.announcement, "reached breakpoint 0 at worker.rb:3");

    // もう一方のスレッドは最初の停止が終わるまで表に出てこない
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(debugger.suspended().map(|stop| stop.thread), Some(first.thread.clone()));

    debugger.request_continue().unwrap();
    let second = expect_stop(&debugger);
    assert_ne!(second.thread, first.thread);
    assert_eq!(second.announcement, "reached breakpoint 0 at worker.rb:3");

    debugger.request_continue().unwrap();
    for worker in workers {
        worker.join().unwrap();
    }
    assert!(debugger.suspended().is_none());
}

#[test]
fn test_stopped_context_belongs_to_stopped_thread() {
    let debugger = debugger();
    debugger.add_line_breakpoint("worker.rb", 3).unwrap();
    debugger.start_session(false).unwrap();

    let worker = {
        let debugger = Arc::clone(&debugger);
        std::thread::Builder::new()
            .name("worker".to_string())
            .spawn(move || {
                let context = Context::new().with_local("n", Value::Integer(5));
                debugger.on_event(&TraceEvent::line("worker.rb", 3, context));
            })
            .unwrap()
    };

    let stop = expect_stop(&debugger);
    assert_eq!(stop.thread.name(), Some("worker"));
    let context = stop.context.unwrap();
    assert_eq!(context.lookup("n"), Some(&Value::Integer(5)));

    debugger.request_continue().unwrap();
    worker.join().unwrap();
}

#[test]
fn test_next_is_tracked_per_thread() {
    let debugger = debugger();
    debugger.add_line_breakpoint("a.rb", 1).unwrap();
    debugger.start_session(false).unwrap();

    let (tx, rx) = std::sync::mpsc::channel();
    let worker = {
        let debugger = Arc::clone(&debugger);
        std::thread::Builder::new()
            .name("stepper".to_string())
            .spawn(move || {
                debugger.on_event(&TraceEvent::line("a.rb", 1, Context::new()));
                // 他のスレッドの行イベントは next の対象にならない
                tx.send(()).unwrap();
                debugger.on_event(&TraceEvent::line("a.rb", 2, Context::new()));
            })
            .unwrap()
    };

    expect_stop(&debugger);
    debugger.request_next().unwrap();
    rx.recv().unwrap();

    let other = {
        let debugger = Arc::clone(&debugger);
        std::thread::spawn(move || {
            debugger.on_event(&TraceEvent::line("a.rb", 5, Context::new()));
        })
    };

    let stop = expect_stop(&debugger);
    assert_eq!(stop.thread.name(), Some("stepper"));
    assert_eq!(stop.announcement, "stepped at a.rb:2");
    debugger.request_continue().unwrap();

    worker.join().unwrap();
    other.join().unwrap();
}

/// 同時に動いている対話ハンドラの数を数える
struct CountingSession {
    debugger: Arc<Debugger>,
    active: AtomicUsize,
    max_active: AtomicUsize,
    threads: Mutex<Vec<String>>,
}

impl Interactive for CountingSession {
    fn run_interactive(&self, stop: &Stop) -> ResumeDirective {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);

        // 他のスレッドが割り込む余地を与える
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(
            self.debugger.suspended().map(|current| current.thread),
            Some(stop.thread.clone())
        );
        self.threads.lock().unwrap().push(stop.thread.to_string());

        self.active.fetch_sub(1, Ordering::SeqCst);
        ResumeDirective::Continue
    }
}

#[test]
fn test_serve_handles_each_stop_exclusively() {
    let script = "
line main.rb 1
thread worker-1
line job.rb 1
line job.rb 2
thread worker-2
line job.rb 1
line job.rb 2
thread worker-3
line job.rb 1
line job.rb 2
";
    let file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(file.path(), script).unwrap();

    let model = SharedModel::new(ObjectModel::with_builtins());
    let debugger = Arc::new(
        Debugger::new(Arc::new(model.clone()), Arc::new(ConditionEvaluator::new()))
            .with_program(Arc::new(TraceScriptProgram::new(model))),
    );
    debugger.set_target_file(file.path());
    debugger.add_line_breakpoint("job.rb", 2).unwrap();

    let session = CountingSession {
        debugger: Arc::clone(&debugger),
        active: AtomicUsize::new(0),
        max_active: AtomicUsize::new(0),
        threads: Mutex::new(Vec::new()),
    };

    debugger.request_run().unwrap();
    assert_eq!(debugger.serve(&session), Termination::Finished);
    assert_eq!(debugger.join_target(), Some(Termination::Finished));

    assert_eq!(session.max_active.load(Ordering::SeqCst), 1);
    let mut threads = session.threads.into_inner().unwrap();
    threads.sort();
    assert_eq!(threads, vec!["worker-1", "worker-2", "worker-3"]);
}
