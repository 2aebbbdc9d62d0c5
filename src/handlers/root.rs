//! Root endpoint handler for the landing page.
//!
//! This module provides the `/` endpoint handler that displays
//! a landing page with the exporter version and the available endpoints.

use axum::{
    extract::State,
    response::{Html, IntoResponse},
};
use tracing::{debug, instrument};

use crate::handlers::health::FOOTER_TEXT;
use crate::handlers::RELOAD_PATH;
use crate::state::SharedState;

/// Handler for the root `/` endpoint.
#[instrument(skip(state))]
pub async fn root_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing / request");

    let version = state.build_info.version;
    let metrics_path = state.metrics_path();

    // Calculate actual uptime from service start time
    let uptime_secs = state.start_time.elapsed().as_secs();
    let hours = uptime_secs / 3600;
    let minutes = (uptime_secs % 3600) / 60;
    let seconds = uptime_secs % 60;
    let uptime_str = format!("{}h {}m {}s", hours, minutes, seconds);

    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Herakles Redis Exporter {version}</title>
    <style>
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            margin: 0;
            padding: 20px;
            background: #f5f5f5;
            line-height: 1.6;
        }}
        .container {{
            max-width: 900px;
            margin: 0 auto;
            background: white;
            padding: 40px;
            border-radius: 8px;
            box-shadow: 0 2px 8px rgba(0,0,0,0.1);
        }}
        h1 {{ color: #333; border-bottom: 3px solid #007bff; padding-bottom: 15px; }}
        .endpoint-list {{ list-style: none; padding: 0; }}
        .endpoint-list li {{
            margin: 20px 0;
            padding: 15px;
            background: #f8f9fa;
            border-left: 4px solid #007bff;
            border-radius: 4px;
        }}
        .endpoint-list a {{ color: #007bff; text-decoration: none; font-weight: 600; }}
        .endpoint-desc {{ color: #666; margin-top: 5px; }}
        .footer {{ margin-top: 40px; color: #666; font-size: 0.9em; text-align: center; }}
        code {{ background: #e9ecef; padding: 2px 6px; border-radius: 3px; }}
    </style>
</head>
<body>
<div class="container">
    <h1>Herakles Redis Exporter {version}</h1>
    <p>Build <code>{commit}</code> ({build_date}), uptime {uptime}</p>

    <ul class="endpoint-list">
        <li>
            <a href='{metrics_path}'>Metrics</a>
            <div class="endpoint-desc">Exporter metrics and the configured Redis instance</div>
        </li>
        <li>
            <code>/scrape?target=&lt;host:port&gt;</code>
            <div class="endpoint-desc">Ad-hoc scrape of any Redis target (optional: check-keys, check-single-keys, check-streams, check-single-streams, count-keys)</div>
        </li>
        <li>
            <a href="/health">/health</a>
            <div class="endpoint-desc">Liveness check</div>
        </li>
        <li>
            <code>{reload}</code>
            <div class="endpoint-desc">Reload the target password file</div>
        </li>
    </ul>

    <div class="footer">
        <p>{footer}</p>
    </div>
</div>
</body>
</html>
"#,
        version = version,
        commit = state.build_info.commit_sha,
        build_date = state.build_info.build_date,
        uptime = uptime_str,
        metrics_path = metrics_path,
        reload = RELOAD_PATH,
        footer = FOOTER_TEXT
    );

    Html(html)
}
