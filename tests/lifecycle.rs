//! End-to-end startup and shutdown with a scripted engine.
#![cfg(unix)]

mod common;

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use engine_supervisor::config::SupervisorConfig;
use engine_supervisor::engine::EngineConfig;
use engine_supervisor::lifecycle::startup::run_until;
use engine_supervisor::lifecycle::Shutdown;

use common::*;

/// Engine stand-in: copies the config it was launched with, then idles.
fn fake_engine(dir: &Path, copy_to: &Path) -> PathBuf {
    let path = dir.join("engine.sh");
    std::fs::write(&path, format!("#!/bin/sh\ncat \"$2\" > {}\nexec sleep 30\n", copy_to.display())).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

async fn wait_for_config(path: &Path) -> EngineConfig {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            if let Ok(data) = std::fs::read(path) {
                if let Ok(config) = EngineConfig::from_slice(&data) {
                    return config;
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("engine launched")
}

fn settings(dir: &Path, binary: PathBuf) -> SupervisorConfig {
    let bootstrap = dir.join("config.json");
    std::fs::write(&bootstrap, BASE_CONFIG).unwrap();

    let mut config = SupervisorConfig::default();
    config.engine.config_path = bootstrap;
    config.engine.binary = binary;
    config.engine.asset_dir = dir.join("asset");
    config.control.port = 0;
    config.health_check.enabled = false;
    config
}

#[tokio::test]
async fn test_engine_runs_bootstrap_config_without_subscription() {
    let dir = tempfile::tempdir().unwrap();
    let seen = dir.path().join("seen.json");
    let config = settings(dir.path(), fake_engine(dir.path(), &seen));

    let shutdown = Shutdown::new();
    let task = tokio::spawn(run_until(config, None, shutdown.clone()));

    let launched = wait_for_config(&seen).await;
    assert_eq!(selector(&launched), vec!["old"]);

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(15), task)
        .await
        .expect("supervisor stopped")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_initial_refresh_happens_before_launch() {
    let feed = MockFeed::start(
        200,
        subscription_blob(&[ss_descriptor("203.0.113.1", "A"), vmess_descriptor("203.0.113.2", "B")]),
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let seen = dir.path().join("seen.json");
    let mut config = settings(dir.path(), fake_engine(dir.path(), &seen));
    config.subscription.url = Some(feed.url().to_string());
    let bootstrap = config.engine.config_path.clone();

    let shutdown = Shutdown::new();
    let task = tokio::spawn(run_until(config, None, shutdown.clone()));

    let launched = wait_for_config(&seen).await;
    assert_eq!(selector(&launched), vec!["A", "B"]);
    assert!(launched.inbounds.iter().any(|i| i.tag == "test-in-B"));

    // the bootstrap file now carries the subscription-managed copy
    assert_eq!(selector(&read_engine_config(&bootstrap)), vec!["A", "B"]);

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(15), task)
        .await
        .expect("supervisor stopped")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_missing_bootstrap_config_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = SupervisorConfig::default();
    config.engine.config_path = dir.path().join("absent.json");
    config.control.port = 0;

    let result = run_until(config, None, Shutdown::new()).await;
    assert!(result.is_err());
}
