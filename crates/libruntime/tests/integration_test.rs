use libprotocol::{InputSource, Profile, RequestMode, Target};
use libruntime::events::EventSink;
use libruntime::executor::{HttpExecutor, RequestExecutor};
use libruntime::{ExecutorError, InputItem, InputSet, LoadTestCoordinator};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use test_support::test_server::{spawn_test_server, wait_until_ready, CLASSIFY_PREDICT_MS, PREDICT_TOTAL_MS};
use test_support::write_images;

fn target(base_url: String, timeout_ms: u64) -> Target {
    Target { base_url, timeout_ms: Some(timeout_ms) }
}

fn features() -> InputItem {
    InputItem::Features { name: "sample_1".to_string(), values: vec![0.1, 0.2, 0.3] }
}

#[tokio::test]
async fn it_upload_image_to_predict() -> anyhow::Result<()> {
    let (url, shutdown, _h) = spawn_test_server();
    wait_until_ready(&url).await;
    let tmp = tempdir()?;
    let images = write_images(tmp.path(), 1)?;

    let executor = HttpExecutor::new(&target(url, 5_000), RequestMode::FullRemote)?;
    let m = executor.execute(&InputItem::Image { path: images[0].clone() }).await?;

    assert!(m.ok);
    assert!(m.latency_ms > 0.0);
    assert_eq!(m.server_ms, Some(PREDICT_TOTAL_MS));
    let _ = shutdown.send(());
    Ok(())
}

#[tokio::test]
async fn it_post_features_to_classify() -> anyhow::Result<()> {
    let (url, shutdown, _h) = spawn_test_server();
    wait_until_ready(&url).await;

    let executor = HttpExecutor::new(&target(url, 5_000), RequestMode::ClassifyOnly)?;
    let m = executor.execute(&features()).await?;

    assert!(m.ok);
    assert_eq!(m.server_ms, Some(CLASSIFY_PREDICT_MS));
    let _ = shutdown.send(());
    Ok(())
}

#[tokio::test]
async fn it_keep_latency_of_non_ok_response() -> anyhow::Result<()> {
    let (url, shutdown, _h) = spawn_test_server();
    wait_until_ready(&url).await;

    let tmp = tempdir()?;
    let images = write_images(tmp.path(), 1)?;

    let executor = HttpExecutor::new(&target(format!("{url}/err"), 5_000), RequestMode::ClassifyOnly)?;
    let m = executor.execute(&features()).await?;
    assert!(!m.ok);
    assert!(m.latency_ms > 0.0);

    let executor = HttpExecutor::new(&target(format!("{url}/err"), 5_000), RequestMode::FullRemote)?;
    let m = executor.execute(&InputItem::Image { path: images[0].clone() }).await?;
    assert!(!m.ok);
    assert!(m.latency_ms > 0.0);
    assert_eq!(m.server_ms, None);
    let _ = shutdown.send(());
    Ok(())
}

#[tokio::test]
async fn it_time_out_slow_server() -> anyhow::Result<()> {
    let (url, shutdown, _h) = spawn_test_server();
    wait_until_ready(&url).await;

    let tmp = tempdir()?;
    let images = write_images(tmp.path(), 1)?;

    let executor = HttpExecutor::new(&target(format!("{url}/slow"), 50), RequestMode::ClassifyOnly)?;
    let err = executor.execute(&features()).await.unwrap_err();
    assert!(matches!(err, ExecutorError::Timeout(50)), "unexpected error: {err:?}");

    let executor = HttpExecutor::new(&target(format!("{url}/slow"), 50), RequestMode::FullRemote)?;
    let err = executor.execute(&InputItem::Image { path: images[0].clone() }).await.unwrap_err();
    assert!(matches!(err, ExecutorError::Timeout(50)), "unexpected error: {err:?}");
    let _ = shutdown.send(());
    Ok(())
}

#[tokio::test]
async fn it_report_refused_connection() -> anyhow::Result<()> {
    let executor = HttpExecutor::new(&target("http://127.0.0.1:1".to_string(), 1_000), RequestMode::ClassifyOnly)?;
    let err = executor.execute(&features()).await.unwrap_err();
    assert!(matches!(err, ExecutorError::Connection(_)), "unexpected error: {err:?}");
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn it_count_error_responses_as_failures() -> anyhow::Result<()> {
    let (url, shutdown, _h) = spawn_test_server();
    wait_until_ready(&url).await;

    let executor = Arc::new(HttpExecutor::new(&target(format!("{url}/err"), 5_000), RequestMode::ClassifyOnly)?);
    let inputs = InputSet::new(vec![features()])?;
    let result = LoadTestCoordinator::new(executor)
        .run(2, Duration::from_millis(300), &inputs)
        .await?;

    assert_eq!(result.success, 0);
    assert!(result.fail > 0);
    assert_eq!(result.rps, 0.0);
    assert!(result.latency_stats.is_none());
    let _ = shutdown.send(());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn it_sweep_profile_against_server() -> anyhow::Result<()> {
    let (url, shutdown, _h) = spawn_test_server();
    wait_until_ready(&url).await;
    let tmp = tempdir()?;
    std::fs::create_dir(tmp.path().join("images"))?;
    write_images(&tmp.path().join("images"), 3)?;

    let mut profile = Profile::default();
    profile.load_test.target = target(url, 5_000);
    profile.load_test.concurrency = vec![1, 2];
    profile.load_test.duration_sec = 1;
    profile.load_test.inputs = InputSource::Images { dir: "images".to_string(), limit: None, extensions: None };
    libprotocol::check_profile(&profile)?;

    let results = libruntime::run_sweep(&profile, tmp.path(), false, EventSink::noop()).await?;

    assert_eq!(results.iter().map(|r| r.concurrency).collect::<Vec<_>>(), vec![1, 2]);
    for r in &results {
        assert!(r.success > 0);
        assert_eq!(r.fail, 0);
        assert_eq!(r.duration_s, 1);
        assert_eq!(r.mode.as_deref(), Some("full_remote"));
        assert_eq!(r.resize.as_deref(), Some("none"));
        let stats = r.latency_stats.as_ref().unwrap();
        assert_eq!(stats.count as u64, r.success);
        assert!(stats.min_ms <= stats.median_ms && stats.median_ms <= stats.max_ms);
    }
    let _ = shutdown.send(());
    Ok(())
}

#[tokio::test]
async fn it_compare_modes_against_server() -> anyhow::Result<()> {
    let (url, shutdown, _h) = spawn_test_server();
    wait_until_ready(&url).await;
    let tmp = tempdir()?;
    std::fs::create_dir(tmp.path().join("images"))?;
    write_images(&tmp.path().join("images"), 3)?;

    let mut profile = Profile::default();
    profile.load_test.target = target(url, 5_000);
    profile.load_test.inputs = InputSource::Images { dir: "images".to_string(), limit: None, extensions: None };

    let modes = [RequestMode::FullRemote, RequestMode::Auto, RequestMode::ClassifyOnly];
    let reports = libruntime::compare_modes(&profile, tmp.path(), &modes, 2, false).await?;

    assert_eq!(reports.iter().map(|r| r.mode.as_str()).collect::<Vec<_>>(), vec!["full_remote", "auto", "classify_only"]);
    for r in &reports[..2] {
        assert_eq!(r.fail, 0);
        assert_eq!(r.latency_stats.as_ref().unwrap().count, 6);
        let server = r.server_stats.as_ref().unwrap();
        assert_eq!((server.count, server.avg_ms), (6, PREDICT_TOTAL_MS));
    }
    // images cannot be classified directly
    assert_eq!(reports[2].fail, 6);
    assert!(reports[2].latency_stats.is_none());
    assert!(reports[2].server_stats.is_none());
    let _ = shutdown.send(());
    Ok(())
}

#[tokio::test]
async fn it_fail_sweep_without_inputs() {
    let tmp = tempdir().unwrap();
    let mut profile = Profile::default();
    profile.load_test.inputs = InputSource::Images { dir: ".".to_string(), limit: None, extensions: None };

    let err = libruntime::run_sweep(&profile, tmp.path(), true, EventSink::noop()).await.unwrap_err();
    assert!(matches!(err, libruntime::RunError::NoInputs(_)));
}
