use crate::controller::GridSnapshot;
use crate::link::LinkStats;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, Json},
    routing::get,
    Router,
};
use serde_json::json;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tracing::info;

/// Read-only HTTP view of the latest grid snapshot.
pub struct WebMonitor {
    snapshots: watch::Receiver<GridSnapshot>,
    bind_address: String,
}

impl WebMonitor {
    pub fn new(snapshots: watch::Receiver<GridSnapshot>) -> Self {
        Self {
            snapshots,
            bind_address: "127.0.0.1".to_string(),
        }
    }

    pub fn with_bind_address(mut self, bind_address: String) -> Self {
        self.bind_address = bind_address;
        self
    }

    pub fn create_router(&self) -> Router {
        Router::new()
            .route("/", get(dashboard_html))
            .route("/api/state", get(get_state))
            .route("/api/rows/:y", get(get_row))
            .route("/api/link", get(get_link_stats))
            .with_state(self.snapshots.clone())
            .layer(CorsLayer::permissive())
    }

    pub async fn start_server(&self, port: u16) -> anyhow::Result<()> {
        let app = self.create_router();

        let bind_addr = format!("{}:{}", self.bind_address, port);
        let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
        info!("Web monitor running on http://{}", bind_addr);

        axum::serve(listener, app).await?;
        Ok(())
    }
}

async fn dashboard_html() -> Html<&'static str> {
    Html(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Grid Monitor</title>
    <style>
        body { font-family: Arial, sans-serif; margin: 0; padding: 20px; background: #202124; color: #eee; }
        .grid { display: inline-grid; gap: 4px; margin: 16px 0; }
        .cell { width: 28px; height: 28px; border-radius: 4px; background: #3c4043; }
        .lit { background: #fbbc04; }
        .meta { font-family: monospace; font-size: 13px; color: #aaa; }
    </style>
</head>
<body>
    <h2>Grid Monitor</h2>
    <div class="meta" id="status">connecting...</div>
    <div class="grid" id="grid"></div>
    <div class="meta" id="link"></div>
    <script>
        async function refresh() {
            try {
                const res = await fetch('/api/state');
                const s = await res.json();
                const grid = document.getElementById('grid');
                const columns = s.width - 1;
                grid.style.gridTemplateColumns = `repeat(${columns}, 28px)`;
                grid.innerHTML = '';
                s.rows.forEach(mask => {
                    for (let x = 0; x < columns; x++) {
                        const cell = document.createElement('div');
                        cell.className = (mask >> x) & 1 ? 'cell lit' : 'cell';
                        grid.appendChild(cell);
                    }
                });
                document.getElementById('status').textContent =
                    `${s.lifecycle} | scenes ${s.scene_offset}/${s.scene_count} | ${s.is_playing ? 'playing' : 'stopped'}`;
                document.getElementById('link').textContent =
                    `sent ${s.link.messages_sent} | received ${s.link.messages_received} | errors ${s.link.send_errors + s.link.poll_errors}`;
            } catch (e) {
                document.getElementById('status').textContent = 'disconnected';
            }
        }
        setInterval(refresh, 250);
        refresh();
    </script>
</body>
</html>"#,
    )
}

async fn get_state(State(snapshots): State<watch::Receiver<GridSnapshot>>) -> Json<GridSnapshot> {
    Json(snapshots.borrow().clone())
}

async fn get_row(
    State(snapshots): State<watch::Receiver<GridSnapshot>>,
    Path(y): Path<usize>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let mask = snapshots
        .borrow()
        .rows
        .get(y)
        .copied()
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(json!({ "y": y, "mask": mask })))
}

async fn get_link_stats(State(snapshots): State<watch::Receiver<GridSnapshot>>) -> Json<LinkStats> {
    Json(snapshots.borrow().link.clone())
}
