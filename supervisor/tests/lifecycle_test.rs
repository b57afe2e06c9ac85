#![cfg(unix)]

mod common;

use common::{
    closed_port, dev_config, health_stub, open_sink, quick_warmup, read_log, supervisor,
    write_entry, CountingTerminator,
};
use inpaint_supervisor::{
    ExitClass, ExitCode, FatalCondition, ReadinessPolicy, RunMode, ServiceState,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(10);

#[tokio::test]
async fn development_launch_becomes_ready_without_fatal() {
    let dir = tempfile::tempdir().unwrap();
    write_entry(dir.path(), "echo booting\nexec sleep 30\n");
    let port = health_stub().await;
    let readiness = ReadinessPolicy::Probe {
        interval: Duration::from_millis(50),
        timeout: Duration::from_secs(5),
    };
    let terminator = Arc::new(CountingTerminator::default());
    let supervisor = supervisor(
        RunMode::Development,
        dev_config(port, readiness),
        dir.path(),
        open_sink(dir.path()),
    )
    .with_terminator(terminator.clone());

    let mut started = supervisor.start().await.expect("service starts");

    assert!(started.pid > 0);
    assert_eq!(supervisor.state(), ServiceState::Running);
    assert_eq!(supervisor.status().pid, Some(started.pid));
    assert!(started.fatal_rx.try_recv().is_err());

    supervisor.shutdown();
    let closed = timeout(WAIT, started.fatal_rx).await.expect("monitor finishes");
    assert!(closed.is_err(), "shutdown must not raise a fatal condition");
    assert_eq!(terminator.calls(), 1);
    assert_eq!(supervisor.state(), ServiceState::ForciblyTerminated);

    let log = read_log(dir.path());
    assert!(log.contains("[stdout] booting"));
    assert!(log.contains("[supervisor] service is ready"));
    assert!(log.contains("service stopped during shutdown"));
}

#[tokio::test]
async fn crash_after_startup_raises_crashed_once() {
    let dir = tempfile::tempdir().unwrap();
    write_entry(dir.path(), "echo loading model\nsleep 0.5\necho 'model load failed' >&2\nexit 1\n");
    let supervisor = supervisor(
        RunMode::Development,
        dev_config(closed_port(), quick_warmup()),
        dir.path(),
        open_sink(dir.path()),
    );

    let started = supervisor.start().await.expect("service starts");
    let condition = timeout(WAIT, started.fatal_rx)
        .await
        .expect("crash is reported")
        .expect("condition is sent");

    assert_eq!(condition, FatalCondition::Crashed(ExitCode::Code(1)));
    assert_eq!(
        supervisor.state(),
        ServiceState::Exited(ExitClass::Crashed(ExitCode::Code(1)))
    );

    let log = read_log(dir.path());
    let stderr_at = log.find("[stderr] model load failed").expect("stderr captured");
    let crash_at = log
        .find("[supervisor] service crashed with exit code 1")
        .expect("crash recorded");
    assert!(stderr_at < crash_at);
    assert_eq!(log.matches("service crashed").count(), 1);
}

#[tokio::test]
async fn clean_exit_is_not_escalated() {
    let dir = tempfile::tempdir().unwrap();
    write_entry(dir.path(), "sleep 0.2\nexit 0\n");
    let supervisor = supervisor(
        RunMode::Development,
        dev_config(closed_port(), quick_warmup()),
        dir.path(),
        open_sink(dir.path()),
    );

    let started = supervisor.start().await.expect("service starts");
    let end = timeout(WAIT, supervisor.wait_for_exit()).await.expect("service exits");
    let result = timeout(WAIT, started.fatal_rx).await.expect("monitor finishes");

    assert_eq!(end, ServiceState::Exited(ExitClass::Clean));
    assert!(result.is_err());
    assert!(read_log(dir.path()).contains("service exited with code 0"));
}

#[tokio::test]
async fn crash_during_startup_is_returned_from_start() {
    let dir = tempfile::tempdir().unwrap();
    write_entry(dir.path(), "exit 3\n");
    let readiness = ReadinessPolicy::Probe {
        interval: Duration::from_millis(50),
        timeout: Duration::from_secs(10),
    };
    let supervisor = supervisor(
        RunMode::Development,
        dev_config(closed_port(), readiness),
        dir.path(),
        open_sink(dir.path()),
    );

    let err = supervisor.start().await.unwrap_err();

    assert_eq!(err, FatalCondition::Crashed(ExitCode::Code(3)));
    assert_eq!(supervisor.status().last_error.as_deref(), Some("crashed:3"));
}

#[tokio::test]
async fn unanswered_probe_times_out() {
    let dir = tempfile::tempdir().unwrap();
    write_entry(dir.path(), "exec sleep 30\n");
    let readiness = ReadinessPolicy::Probe {
        interval: Duration::from_millis(50),
        timeout: Duration::from_millis(400),
    };
    let supervisor = supervisor(
        RunMode::Development,
        dev_config(closed_port(), readiness),
        dir.path(),
        open_sink(dir.path()),
    );

    let err = supervisor.start().await.unwrap_err();

    assert!(matches!(err, FatalCondition::StartupTimeout { .. }), "{err:?}");
    assert_eq!(err.tag(), "startup-timeout");
    supervisor.shutdown();
    assert!(read_log(dir.path()).contains("fatal: startup-timeout"));
}

#[tokio::test]
async fn shutdown_signals_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    write_entry(dir.path(), "exec sleep 30\n");
    let terminator = Arc::new(CountingTerminator::default());
    let supervisor = supervisor(
        RunMode::Development,
        dev_config(closed_port(), quick_warmup()),
        dir.path(),
        open_sink(dir.path()),
    )
    .with_terminator(terminator.clone());

    let _started = supervisor.start().await.expect("service starts");
    supervisor.shutdown();
    supervisor.shutdown();
    let end = timeout(WAIT, supervisor.wait_for_exit()).await.expect("terminal state");
    supervisor.shutdown();

    assert_eq!(terminator.calls(), 1);
    assert_eq!(end, ServiceState::ForciblyTerminated);
}

#[tokio::test]
async fn shutdown_after_exit_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    write_entry(dir.path(), "exit 0\n");
    let terminator = Arc::new(CountingTerminator::default());
    let supervisor = supervisor(
        RunMode::Development,
        dev_config(closed_port(), quick_warmup()),
        dir.path(),
        open_sink(dir.path()),
    )
    .with_terminator(terminator.clone());

    let _started = supervisor.start().await.expect("service starts");
    timeout(WAIT, supervisor.wait_for_exit()).await.expect("service exits");
    supervisor.shutdown();
    supervisor.shutdown();

    assert_eq!(terminator.calls(), 0);
    assert_eq!(supervisor.state(), ServiceState::Exited(ExitClass::Clean));
}

#[tokio::test]
async fn shutdown_before_launch_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let terminator = Arc::new(CountingTerminator::default());
    let supervisor = supervisor(
        RunMode::Development,
        dev_config(closed_port(), quick_warmup()),
        dir.path(),
        open_sink(dir.path()),
    )
    .with_terminator(terminator.clone());

    supervisor.shutdown();

    assert_eq!(terminator.calls(), 0);
    assert_eq!(supervisor.state(), ServiceState::NotStarted);
}

#[tokio::test]
async fn killed_by_signal_counts_as_crash() {
    let dir = tempfile::tempdir().unwrap();
    write_entry(dir.path(), "sleep 0.3\nkill -9 $$\n");
    let supervisor = supervisor(
        RunMode::Development,
        dev_config(closed_port(), quick_warmup()),
        dir.path(),
        open_sink(dir.path()),
    );

    let started = supervisor.start().await.expect("service starts");
    let condition = timeout(WAIT, started.fatal_rx)
        .await
        .expect("crash is reported")
        .expect("condition is sent");

    assert_eq!(condition, FatalCondition::Crashed(ExitCode::Signal(9)));
    assert_eq!(condition.tag(), "crashed:signal-9");
    assert_eq!(
        supervisor.state(),
        ServiceState::Exited(ExitClass::Crashed(ExitCode::Signal(9)))
    );
    assert!(read_log(dir.path()).contains("service crashed with exit code signal-9"));
}

#[tokio::test]
async fn shutdown_while_launching_terminates_the_new_child() {
    let dir = tempfile::tempdir().unwrap();
    write_entry(dir.path(), "exec sleep 30\n");
    let readiness = ReadinessPolicy::Probe {
        interval: Duration::from_millis(50),
        timeout: Duration::from_secs(5),
    };
    let terminator = Arc::new(CountingTerminator::default());
    let supervisor = Arc::new(
        supervisor(
            RunMode::Development,
            dev_config(closed_port(), readiness),
            dir.path(),
            open_sink(dir.path()),
        )
        .with_terminator(terminator.clone()),
    );

    let launching = tokio::spawn({
        let supervisor = Arc::clone(&supervisor);
        async move { supervisor.start().await }
    });
    while supervisor.state() == ServiceState::NotStarted {
        tokio::task::yield_now().await;
    }
    supervisor.shutdown();

    let result = timeout(WAIT, launching).await.expect("start returns").unwrap();
    assert!(matches!(result, Err(FatalCondition::LoadFailed { .. })), "{result:?}");
    let end = timeout(WAIT, supervisor.wait_for_exit()).await.expect("terminal state");
    assert_eq!(end, ServiceState::ForciblyTerminated);
    assert_eq!(terminator.calls(), 1);
    assert!(read_log(dir.path()).contains("terminating service pid"));
}

#[tokio::test]
async fn unreachable_ui_is_a_load_failure() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = dev_config(closed_port(), quick_warmup());
    config.dev_ui_url = format!("http://127.0.0.1:{}/", closed_port());
    let supervisor = supervisor(RunMode::Development, config, dir.path(), open_sink(dir.path()));

    let err = supervisor.check_ui().await.unwrap_err();

    assert!(matches!(err, FatalCondition::LoadFailed { .. }), "{err:?}");
    let last_error = supervisor.status().last_error.unwrap_or_default();
    assert!(last_error.starts_with("load-failed:"), "{last_error}");
    assert!(read_log(dir.path()).contains("fatal: load-failed:"));
}

#[tokio::test]
async fn answering_ui_passes_the_load_check() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = dev_config(closed_port(), quick_warmup());
    config.dev_ui_url = format!("http://127.0.0.1:{}/", health_stub().await);
    let supervisor = supervisor(RunMode::Development, config, dir.path(), open_sink(dir.path()));

    supervisor.check_ui().await.expect("ui answers");
    assert!(supervisor.status().last_error.is_none());
}

#[tokio::test]
async fn output_lines_keep_per_stream_order() {
    let dir = tempfile::tempdir().unwrap();
    write_entry(
        dir.path(),
        "for i in $(seq 1 100); do echo \"out $i\"; echo \"err $i\" >&2; done\nexit 0\n",
    );
    let supervisor = supervisor(
        RunMode::Development,
        dev_config(closed_port(), quick_warmup()),
        dir.path(),
        open_sink(dir.path()),
    );

    let started = supervisor.start().await.expect("service starts");
    let _ = timeout(WAIT, started.fatal_rx).await.expect("monitor finishes");

    let log = read_log(dir.path());
    let numbers = |prefix: &str| -> Vec<u32> {
        log.lines()
            .filter_map(|line| line.strip_prefix(prefix))
            .map(|n| n.parse().expect("whole line"))
            .collect()
    };
    assert_eq!(numbers("[stdout] out "), (1..=100).collect::<Vec<_>>());
    assert_eq!(numbers("[stderr] err "), (1..=100).collect::<Vec<_>>());
}
