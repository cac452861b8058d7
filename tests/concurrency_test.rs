//! Concurrent lifecycle requests against one controller.

mod common;

use common::{config_in, controller, FakeRuntime, ScriptedProbe};
use dbkeeper::config::keys;
use dbkeeper::{Error, LifecycleState};
use std::time::Duration;
use tempfile::TempDir;

/// Poll until `cond` holds; fails the test after two seconds.
async fn wait_for(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn test_stop_preempts_readiness_polling() {
    let dir = TempDir::new().unwrap();
    let config = config_in(
        &dir,
        &[(keys::HEALTH_RETRIES, "1000"), (keys::HEALTH_INTERVAL, "20ms")],
    );
    let runtime = FakeRuntime::new();
    let probe = ScriptedProbe::never();
    let ctl = controller(&config, &runtime, &probe);

    let starter = {
        let ctl = ctl.clone();
        tokio::spawn(async move { ctl.start().await })
    };
    wait_for(|| probe.attempts() >= 1).await;
    assert_eq!(ctl.state(), LifecycleState::Starting);

    tokio::time::timeout(Duration::from_secs(2), ctl.stop())
        .await
        .expect("stop must not wait for the retry budget")
        .unwrap();

    let err = starter.await.unwrap().unwrap_err();
    assert!(matches!(err.root(), Error::Cancelled(_)), "{:?}", err);
    assert_eq!(ctl.state(), LifecycleState::Stopped);
    assert!(ctl.handle().is_none());
    assert!(!runtime.is_running());
    assert!(probe.attempts() < 1000);
}

#[tokio::test]
async fn test_start_then_stop_ends_stopped() {
    for ready_on in [1, 3] {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir, &[(keys::HEALTH_RETRIES, "5")]);
        let runtime = FakeRuntime::new();
        let ctl = controller(&config, &runtime, &ScriptedProbe::ready_on(ready_on));

        let (_, stopped) = tokio::join!(ctl.start(), ctl.stop());
        stopped.unwrap();

        assert_eq!(ctl.state(), LifecycleState::Stopped, "ready_on={}", ready_on);
        assert!(ctl.handle().is_none());
        assert!(!runtime.is_running());
    }
}

#[tokio::test]
async fn test_concurrent_starts_launch_once() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir, &[]);
    let runtime = FakeRuntime::new();
    let ctl = controller(&config, &runtime, &ScriptedProbe::ready_on(2));

    let (a, b) = tokio::join!(ctl.start(), ctl.start());
    a.unwrap();
    b.unwrap();

    assert_eq!(runtime.launch_count(), 1);
    assert_eq!(ctl.state(), LifecycleState::Running);
}

#[tokio::test]
async fn test_state_is_readable_during_transition() {
    let dir = TempDir::new().unwrap();
    let config = config_in(
        &dir,
        &[(keys::HEALTH_RETRIES, "1000"), (keys::HEALTH_INTERVAL, "20ms")],
    );
    let runtime = FakeRuntime::new();
    let probe = ScriptedProbe::ready_on(4);
    let ctl = controller(&config, &runtime, &probe);

    let starter = {
        let ctl = ctl.clone();
        tokio::spawn(async move { ctl.start().await })
    };
    wait_for(|| ctl.handle().is_some()).await;

    let report = ctl.report().await.unwrap();
    assert_eq!(report.state, LifecycleState::Starting);

    starter.await.unwrap().unwrap();
    assert_eq!(ctl.state(), LifecycleState::Running);
}

#[tokio::test]
async fn test_restart_preempts_pending_startup() {
    let dir = TempDir::new().unwrap();
    let config = config_in(
        &dir,
        &[(keys::HEALTH_RETRIES, "1000"), (keys::HEALTH_INTERVAL, "20ms")],
    );
    let runtime = FakeRuntime::new();
    let probe = ScriptedProbe::ready_on(3);
    let ctl = controller(&config, &runtime, &probe);

    let starter = {
        let ctl = ctl.clone();
        tokio::spawn(async move { ctl.start().await })
    };
    wait_for(|| probe.attempts() >= 1).await;

    ctl.restart().await.unwrap();

    assert!(starter.await.unwrap().is_err());
    assert_eq!(ctl.state(), LifecycleState::Running);
    assert_eq!(runtime.launch_count(), 2);
}
