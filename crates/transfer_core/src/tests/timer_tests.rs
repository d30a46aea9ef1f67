use super::*;
use std::sync::Mutex;
use tokio::sync::oneshot;

fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> TimerTask) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    let make = move |label: &'static str| -> TimerTask {
        let sink = Arc::clone(&sink);
        Box::new(move || sink.lock().expect("log").push(label))
    };
    (log, make)
}

#[test]
fn manual_timer_fires_only_due_tasks_in_deadline_order() {
    let timer = ManualTimer::new();
    let (log, task) = recorder();

    timer.schedule(Duration::from_secs(10), task("ten"));
    timer.schedule(Duration::from_secs(5), task("five"));
    timer.schedule(Duration::from_secs(20), task("twenty"));
    assert_eq!(timer.pending(), 3);

    assert_eq!(timer.advance(Duration::from_secs(4)), 0);
    assert_eq!(timer.advance(Duration::from_secs(8)), 2);
    assert_eq!(*log.lock().expect("log"), vec!["five", "ten"]);
    assert_eq!(timer.pending(), 1);
    assert_eq!(timer.now(), Duration::from_secs(12));

    assert_eq!(timer.advance(Duration::from_secs(8)), 1);
    assert_eq!(*log.lock().expect("log"), vec!["five", "ten", "twenty"]);
    assert_eq!(timer.pending(), 0);
}

#[test]
fn manual_timer_never_runs_cancelled_task() {
    let timer = ManualTimer::new();
    let (log, task) = recorder();

    let handle = timer.schedule(Duration::from_secs(15), task("debounce"));
    handle.cancel();
    assert!(handle.is_cancelled());
    assert_eq!(timer.pending(), 0);

    assert_eq!(timer.advance(Duration::from_secs(60)), 0);
    assert!(log.lock().expect("log").is_empty());
}

#[test]
fn manual_timer_schedules_relative_to_virtual_now() {
    let timer = ManualTimer::new();
    let (log, task) = recorder();

    timer.advance(Duration::from_secs(100));
    timer.schedule(Duration::from_secs(15), task("late"));

    assert_eq!(timer.advance(Duration::from_secs(14)), 0);
    assert_eq!(timer.advance(Duration::from_secs(1)), 1);
    assert_eq!(*log.lock().expect("log"), vec!["late"]);
}

#[tokio::test(start_paused = true)]
async fn tokio_timer_fires_after_delay() {
    let timer = TokioTimer::try_current().expect("runtime");
    let (tx, rx) = oneshot::channel();
    let started = tokio::time::Instant::now();

    timer.schedule(
        Duration::from_secs(15),
        Box::new(move || {
            let _ = tx.send(());
        }),
    );

    rx.await.expect("timer fired");
    assert!(started.elapsed() >= Duration::from_secs(15));
}

#[tokio::test(start_paused = true)]
async fn tokio_timer_cancel_prevents_task() {
    let timer = TokioTimer::try_current().expect("runtime");
    let (log, task) = recorder();

    let handle = timer.schedule(Duration::from_secs(15), task("debounce"));
    handle.cancel();
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert!(log.lock().expect("log").is_empty());
}

#[test]
fn tokio_timer_requires_runtime() {
    let err = TokioTimer::try_current().err().expect("no runtime outside tokio");
    assert!(err.to_string().contains("running runtime"), "{err}");
}
