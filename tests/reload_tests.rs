//! Integration tests for the password file reload endpoint.

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use herakles_redis_exporter::{
    build_router, load_password_file, BuildInfo, CollectorError, CollectorFactory, ExporterState,
    Options, SharedState, Target,
};
use prometheus::core::Collector;
use std::io::{Seek, Write};
use std::path::Path;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tower::ServiceExt;

struct NoopFactory;

impl CollectorFactory for NoopFactory {
    fn build(&self, target: &Target, _: &Options) -> Result<Box<dyn Collector>, CollectorError> {
        Err(CollectorError::MissingEndpoint(target.to_string()))
    }
}

fn write_file(file: &mut NamedTempFile, content: &str) {
    let f = file.as_file_mut();
    f.set_len(0).unwrap();
    f.rewind().unwrap();
    f.write_all(content.as_bytes()).unwrap();
    f.flush().unwrap();
}

fn setup(password_file: Option<&Path>) -> (SharedState, Router) {
    let password_map = match password_file {
        Some(path) => Arc::new(load_password_file(path).unwrap()),
        None => Arc::default(),
    };
    let options = Options {
        password_file: password_file.map(Path::to_path_buf),
        password_map,
        ..Options::default()
    };
    let state = Arc::new(
        ExporterState::new(options, BuildInfo::current(), Arc::new(NoopFactory)).unwrap(),
    );
    let app = build_router(Arc::clone(&state));
    (state, app)
}

async fn reload(app: &Router, method: Method) -> (StatusCode, String) {
    let request = Request::builder()
        .method(method)
        .uri("/-/reload")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn test_reload_without_password_file() {
    let (state, app) = setup(None);

    let (status, body) = reload(&app, Method::GET).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "There is no pwd file specified\n");
    assert_eq!(state.password_reload_errors.get(), 1);
    assert_eq!(state.target_scrape_request_errors.get(), 0);
}

#[tokio::test]
async fn test_reload_replaces_map() {
    let mut file = NamedTempFile::new().unwrap();
    write_file(&mut file, r#"{"redis://cache-01:6379": "old"}"#);
    let (state, app) = setup(Some(file.path()));
    assert_eq!(state.password_map().get("redis://cache-01:6379"), Some("old"));

    write_file(
        &mut file,
        r#"{"redis://cache-01:6379": "new", "redis://cache-02:6379": "other"}"#,
    );
    let (status, body) = reload(&app, Method::POST).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");

    let map = state.password_map();
    assert_eq!(map.len(), 2);
    assert_eq!(map.get("redis://cache-01:6379"), Some("new"));
    assert_eq!(state.password_reload_errors.get(), 0);
}

#[tokio::test]
async fn test_failed_reload_keeps_previous_map() {
    let mut file = NamedTempFile::new().unwrap();
    write_file(&mut file, r#"{"redis://cache-01:6379": "old"}"#);
    let (state, app) = setup(Some(file.path()));

    write_file(&mut file, r#"{"redis://cache-01:6379": "#);
    let (status, body) = reload(&app, Method::GET).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(
        body.starts_with("failed to reload passwords file: "),
        "{}",
        body
    );

    let map = state.password_map();
    assert_eq!(map.len(), 1);
    assert_eq!(map.get("redis://cache-01:6379"), Some("old"));
    assert_eq!(state.password_reload_errors.get(), 1);
}

#[tokio::test]
async fn test_reload_of_deleted_file_fails() {
    let file = NamedTempFile::new().unwrap();
    let path = file.path().to_path_buf();
    std::fs::write(&path, r#"{}"#).unwrap();
    let (state, app) = setup(Some(&path));
    drop(file);

    let (status, _) = reload(&app, Method::GET).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(state.password_reload_errors.get(), 1);
}
