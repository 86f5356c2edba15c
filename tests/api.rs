#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use vidubb_launcher::api;
use vidubb_launcher::config::EnvConfig;
use vidubb_launcher::domain::LogSource;
use vidubb_launcher::state::AppState;

/// Writes an executable stand-in for the python interpreter
fn fake_python(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("fake-python");
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn config(dir: &TempDir) -> EnvConfig {
    EnvConfig {
        host: "127.0.0.1".to_string(),
        app_dir: dir.path().to_path_buf(),
        static_dir: dir.path().join("public"),
        gradio_url: "http://127.0.0.1:9".to_string(),
        setup_timeout: Duration::from_secs(10),
        ..EnvConfig::default()
    }
}

fn app(config: EnvConfig) -> (Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(config));
    (api::router(state.clone()), state)
}

async fn send(app: &Router, method: &str, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn health_returns_static_ok() {
    let dir = TempDir::new().unwrap();
    let (app, _) = app(config(&dir));

    let (status, body) = send(&app, "GET", "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn index_serves_embedded_page() {
    let dir = TempDir::new().unwrap();
    let (app, _) = app(config(&dir));

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let page = String::from_utf8_lossy(&bytes);
    assert!(page.contains("Setup Environment"));
    assert!(page.contains("Launch"));
}

#[tokio::test]
async fn setup_success_concatenates_both_steps() {
    let dir = TempDir::new().unwrap();
    let python = fake_python(dir.path(), r#"echo "pip $4 $5""#);
    let (app, state) = app(EnvConfig {
        python: python.to_string_lossy().into_owned(),
        ..config(&dir)
    });

    let (status, body) = send(&app, "POST", "/setup").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Environment setup completed");
    assert_eq!(body["output"], "pip --upgrade pip\npip -r requirements.txt\n");
    assert!(body.get("error").is_none());

    let report = state.last_setup().await.expect("setup report recorded");
    assert!(report.success);
}

#[tokio::test]
async fn setup_failure_reports_stderr_with_500() {
    let dir = TempDir::new().unwrap();
    let python = fake_python(
        dir.path(),
        r#"case "$4" in
  -r) echo "ERROR: No matching distribution found for TTS" >&2; exit 1 ;;
  *) echo "upgraded" ;;
esac"#,
    );
    let (app, _) = app(EnvConfig {
        python: python.to_string_lossy().into_owned(),
        ..config(&dir)
    });

    let (status, body) = send(&app, "POST", "/setup").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("Install requirements"));
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("No matching distribution"));
    assert_eq!(body["output"], "upgraded\n");
}

#[tokio::test]
async fn concurrent_setup_is_rejected() {
    let dir = TempDir::new().unwrap();
    let python = fake_python(dir.path(), "sleep 1; echo done");
    let (app, _) = app(EnvConfig {
        python: python.to_string_lossy().into_owned(),
        ..config(&dir)
    });

    let first = {
        let app = app.clone();
        tokio::spawn(async move { send(&app, "POST", "/setup").await })
    };
    tokio::time::sleep(Duration::from_millis(300)).await;
    let (second_status, second_body) = send(&app, "POST", "/setup").await;
    let (first_status, _) = first.await.unwrap();

    assert_eq!(first_status, StatusCode::OK);
    assert_eq!(second_status, StatusCode::CONFLICT);
    assert_eq!(second_body["success"], false);
}

#[tokio::test]
async fn launch_short_lived_app_returns_final_result() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("app.py"), "echo \"home=$HOME\"\n").unwrap();
    let (app, _) = app(EnvConfig {
        python: "sh".to_string(),
        home: Some("/home/dubber".to_string()),
        ..config(&dir)
    });

    let (status, body) = send(&app, "POST", "/start-gradio").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Application exited");
    assert_eq!(body["output"], "home=/home/dubber\n");
}

#[tokio::test]
async fn launch_failing_app_returns_500() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("app.py"),
        "echo 'ImportError: gradio' >&2\nexit 3\n",
    )
    .unwrap();
    let (app, _) = app(EnvConfig {
        python: "sh".to_string(),
        ..config(&dir)
    });

    let (status, body) = send(&app, "POST", "/start-gradio").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Application exited with code 3");
    assert!(body["error"].as_str().unwrap().contains("ImportError"));
}

#[tokio::test]
async fn launch_long_running_app_acknowledges_then_stops() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("app.py"),
        "echo 'Running on local URL'\nexec sleep 30\n",
    )
    .unwrap();
    let (app, state) = app(EnvConfig {
        python: "sh".to_string(),
        startup_grace: Duration::from_millis(500),
        ..config(&dir)
    });

    let (status, body) = send(&app, "POST", "/start-gradio").await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Application startup initiated");
    assert!(body["pid"].as_u64().is_some());

    let (status, _) = send(&app, "POST", "/start-gradio").await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(&app, "GET", "/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["app"]["running"], true);
    assert_eq!(body["setup_in_progress"], false);

    let (_, body) = send(&app, "GET", "/logs?source=app&tail=50").await;
    let lines = body["lines"].as_array().unwrap();
    assert!(lines
        .iter()
        .any(|l| l["content"] == "Running on local URL"));

    let (status, body) = send(&app, "POST", "/stop-gradio").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Application stopped");
    assert!(!state.gradio.is_running().await);
}

#[tokio::test]
async fn stop_during_startup_grace_kills_app() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("app.py"), "exec sleep 30\n").unwrap();
    let (app, state) = app(EnvConfig {
        python: "sh".to_string(),
        startup_grace: Duration::from_secs(2),
        ..config(&dir)
    });

    let launch = {
        let app = app.clone();
        tokio::spawn(async move { send(&app, "POST", "/start-gradio").await })
    };
    tokio::time::sleep(Duration::from_millis(300)).await;

    let (_, body) = send(&app, "GET", "/status").await;
    assert_eq!(body["app"]["running"], true);

    let (status, body) = send(&app, "POST", "/stop-gradio").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Application stopped");

    let (status, body) = launch.await.unwrap();
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Application was stopped during startup");
    assert!(!state.gradio.is_running().await);
}

#[tokio::test]
async fn logs_tail_is_clamped_to_at_least_one_line() {
    let dir = TempDir::new().unwrap();
    let (app, state) = app(config(&dir));
    let sink = state.log_hub.sink(LogSource::Setup);
    sink.stdout("Collecting gradio").await;
    sink.stdout("Successfully installed gradio").await;

    let (status, body) = send(&app, "GET", "/logs?source=setup&tail=0").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], "setup");
    let lines = body["lines"].as_array().unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["content"], "Successfully installed gradio");
}

#[tokio::test]
async fn logs_malformed_query_returns_json_400() {
    let dir = TempDir::new().unwrap();
    let (app, _) = app(config(&dir));

    let (status, body) = send(&app, "GET", "/logs?tail=abc").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().is_some());
}

#[tokio::test]
async fn logs_stream_delivers_new_lines() {
    let dir = TempDir::new().unwrap();
    let (app, state) = app(config(&dir));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/logs/stream?source=setup")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "text/event-stream"
    );

    state
        .log_hub
        .sink(LogSource::Setup)
        .stdout("Requirement already satisfied: pip")
        .await;

    let mut body = response.into_body();
    let frame = tokio::time::timeout(Duration::from_secs(5), body.frame())
        .await
        .expect("event within timeout")
        .unwrap()
        .unwrap();
    let data = frame.into_data().unwrap();
    let event = String::from_utf8_lossy(&data);

    assert!(event.starts_with("data: "));
    assert!(event.contains("Requirement already satisfied: pip"));
    assert!(event.contains("\"source\":\"setup\""));
}

#[tokio::test]
async fn launch_with_missing_interpreter_returns_500() {
    let dir = TempDir::new().unwrap();
    let (app, _) = app(EnvConfig {
        python: "nonexistent_python_12345".to_string(),
        ..config(&dir)
    });

    let (status, body) = send(&app, "POST", "/start-gradio").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Failed to start application");
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("nonexistent_python_12345"));
}
