use crate::aggregate::{aggregate, Aggregation, BarrioCount};
use crate::config::AppConfig;
use crate::data;
use crate::palette::{self, LegendEntry};
use crate::project::{self, Canvas};
use crate::render::disc_center;
use crate::types::{BeneficiaryRecord, Marker};
use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use rstar::{PointDistance, RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{error, info};

// Centre pixel of a drawn marker, for hit-testing clicks on the map.
pub struct MarkerIndex {
    index: usize,
    position: [f64; 2],
}

impl RTreeObject for MarkerIndex {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.position)
    }
}

impl PointDistance for MarkerIndex {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.position[0] - point[0];
        let dy = self.position[1] - point[1];
        dx * dx + dy * dy
    }
}

/// Everything derived from one load of the records file.
pub struct Snapshot {
    pub records: usize,
    pub aggregation: Aggregation,
    pub markers: Vec<Marker>,
    pub tree: RTree<MarkerIndex>,
}

impl Snapshot {
    pub fn build(config: &AppConfig, records: &[BeneficiaryRecord]) -> Self {
        let bounds = config.projection.bounds();
        let canvas: Canvas = config.projection.canvas();
        let aggregation = aggregate(records);
        let markers = project::markers(records, &bounds, &canvas);
        let tree = RTree::bulk_load(
            markers
                .iter()
                .enumerate()
                .map(|(index, m)| {
                    let (cx, cy) = disc_center(m);
                    MarkerIndex {
                        index,
                        position: [cx as f64, cy as f64],
                    }
                })
                .collect(),
        );
        Self {
            records: records.len(),
            aggregation,
            markers,
            tree,
        }
    }
}

pub struct AppState {
    pub config: AppConfig,
    pub snapshot: RwLock<Snapshot>,
}

#[derive(Debug, Serialize)]
pub struct DistrictResponse {
    pub comuna: String,
    pub total: u32,
    pub barrios: Vec<BarrioCount>,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub total: u32,
    /// Records left out of the counts because they have no district.
    pub sin_comuna: usize,
    pub comunas: Vec<DistrictResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MarkerResponse {
    #[serde(flatten)]
    pub marker: Marker,
    pub color: &'static str,
}

#[derive(Deserialize)]
pub struct QueryParams {
    x: f64,
    y: f64,
}

pub fn router(state: Arc<AppState>) -> Router {
    let static_files = ServeDir::new(&state.config.output.dir);
    Router::new()
        .route("/api/summary", get(summary_handler))
        .route("/api/markers", get(markers_handler))
        .route("/api/legend", get(legend_handler))
        .route("/api/query", get(query_handler))
        .route("/api/reload", post(reload_handler))
        .fallback_service(static_files)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(config: AppConfig, records: Vec<BeneficiaryRecord>) -> Result<()> {
    info!("Building marker index for {} records...", records.len());
    let snapshot = Snapshot::build(&config, &records);
    info!("{} markers indexed.", snapshot.markers.len());

    let port = config.server.port;
    let state = Arc::new(AppState {
        config,
        snapshot: RwLock::new(snapshot),
    });

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    info!("Starting server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutdown signal received");
}

async fn summary_handler(State(state): State<Arc<AppState>>) -> Json<SummaryResponse> {
    let snapshot = state.snapshot.read().await;
    let total = snapshot.aggregation.total();
    let comunas = snapshot
        .aggregation
        .ordered()
        .into_iter()
        .map(|d| DistrictResponse {
            comuna: d.comuna.to_string(),
            total: d.total,
            barrios: d.barrios.to_vec(),
        })
        .collect();

    Json(SummaryResponse {
        total,
        sin_comuna: snapshot.records - total as usize,
        comunas,
    })
}

async fn markers_handler(State(state): State<Arc<AppState>>) -> Json<Vec<MarkerResponse>> {
    let snapshot = state.snapshot.read().await;
    Json(snapshot.markers.iter().map(with_color).collect())
}

async fn legend_handler(State(state): State<Arc<AppState>>) -> Json<Vec<LegendEntry>> {
    let snapshot = state.snapshot.read().await;
    let summaries = snapshot.aggregation.ordered();
    Json(palette::legend(summaries.iter().map(|d| d.comuna)))
}

/// Markers whose drawn disc covers the canvas pixel under `(x, y)`.
async fn query_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<QueryParams>,
) -> Json<Vec<MarkerResponse>> {
    let snapshot = state.snapshot.read().await;
    let radius = state.config.output.marker_radius as f64;
    // Same integer test the renderer uses: pixel offset from the centre.
    let pixel = [params.x.floor(), params.y.floor()];

    let mut hits: Vec<usize> = snapshot
        .tree
        .locate_within_distance(pixel, radius * radius)
        .map(|candidate| candidate.index)
        .collect();
    // Topmost (last drawn) first.
    hits.sort_unstable_by(|a, b| b.cmp(a));

    Json(
        hits.into_iter()
            .filter_map(|i| snapshot.markers.get(i))
            .map(with_color)
            .collect(),
    )
}

/// Re-reads the records file and rebuilds every derived view from scratch.
async fn reload_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SummaryResponse>, (StatusCode, String)> {
    let config = state.config.clone();
    let loaded = tokio::task::spawn_blocking(move || {
        let records = data::load_records(&config)?;
        Ok::<_, anyhow::Error>(Snapshot::build(&config, &records))
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let snapshot = loaded.map_err(|e| {
        error!("Reload failed: {:#}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e))
    })?;

    info!("Reloaded {} records", snapshot.records);
    *state.snapshot.write().await = snapshot;
    Ok(summary_handler(State(state)).await)
}

fn with_color(marker: &Marker) -> MarkerResponse {
    MarkerResponse {
        marker: marker.clone(),
        color: marker.comuna.as_deref().map_or(palette::FALLBACK_COLOR, palette::color_for),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::Bounds;

    fn config() -> AppConfig {
        AppConfig::from_toml(
            r#"
            [input]
            records = "does-not-exist.csv"

            [output]
            dir = "output"
            marker_radius = 5
            "#,
        )
        .unwrap()
    }

    fn state(records: &[BeneficiaryRecord]) -> Arc<AppState> {
        let config = config();
        let snapshot = Snapshot::build(&config, records);
        Arc::new(AppState {
            config,
            snapshot: RwLock::new(snapshot),
        })
    }

    async fn query(state: &Arc<AppState>, x: f64, y: f64) -> Json<Vec<MarkerResponse>> {
        query_handler(State(state.clone()), Query(QueryParams { x, y })).await
    }

    fn sample() -> Vec<BeneficiaryRecord> {
        let b = Bounds::REFERENCE;
        vec![
            BeneficiaryRecord::new(Some("Comuna 2"), Some("Roma")).at(Some(5.69), Some(-76.661)),
            BeneficiaryRecord::new(Some("Comuna 1"), Some("La Fe"))
                .at(Some(b.min_lat), Some(b.min_lng)),
            BeneficiaryRecord::new(Some("Comuna 1"), Some("la fe")).at(Some(5.69), None),
            BeneficiaryRecord::new(None, Some("Sin datos")).at(Some(5.69), Some(-76.661)),
            BeneficiaryRecord::new(Some("Comuna 9"), None),
        ]
    }

    #[tokio::test]
    async fn test_summary_ordered_and_reports_excluded() {
        let Json(summary) = summary_handler(State(state(&sample()))).await;
        assert_eq!(summary.total, 4);
        assert_eq!(summary.sin_comuna, 1);
        let names: Vec<&str> = summary.comunas.iter().map(|d| d.comuna.as_str()).collect();
        assert_eq!(names, vec!["Comuna 1", "Comuna 2", "Comuna 9"]);
        assert_eq!(
            summary.comunas[0].barrios,
            vec![BarrioCount { barrio: "La Fe".into(), count: 2 }]
        );
    }

    #[tokio::test]
    async fn test_markers_carry_colors() {
        let Json(markers) = markers_handler(State(state(&sample()))).await;
        assert_eq!(markers.len(), 3);
        assert_eq!(markers[0].color, palette::color_for("Comuna 2"));
        assert_eq!(markers[2].color, palette::FALLBACK_COLOR);
    }

    #[tokio::test]
    async fn test_legend_lists_present_districts() {
        let Json(legend) = legend_handler(State(state(&sample()))).await;
        let names: Vec<&str> = legend.iter().map(|e| e.comuna.as_str()).collect();
        assert_eq!(names, vec!["Comuna 1", "Comuna 2", "Comuna 9"]);
    }

    #[tokio::test]
    async fn test_query_hits_markers_under_pixel() {
        let state = state(&sample());
        let Json(hits) = query(&state, 603.0, 452.0).await;
        // Roma and the comuna-less record share a position; the later one is on top.
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].marker.comuna, None);
        assert_eq!(hits[1].marker.barrio.as_deref(), Some("Roma"));

        let Json(corner) = query(&state, 2.0, 897.0).await;
        assert_eq!(corner.len(), 1);
        assert_eq!(corner[0].marker.barrio.as_deref(), Some("La Fe"));

        let Json(miss) = query(&state, 100.0, 100.0).await;
        assert!(miss.is_empty());
    }

    #[tokio::test]
    async fn test_query_matches_drawn_disc_edge() {
        let b = Bounds::REFERENCE;
        // Projects to roughly (10.9, 10.9); the disc is centred on pixel (10, 10).
        let lng = b.min_lng + 10.9 / 1200.0 * (b.max_lng - b.min_lng);
        let lat = b.min_lat + (900.0 - 10.9) / 900.0 * (b.max_lat - b.min_lat);
        let records =
            vec![BeneficiaryRecord::new(Some("Comuna 1"), Some("Orilla")).at(Some(lat), Some(lng))];
        let state = state(&records);

        let canvas = Canvas::REFERENCE;
        let mut img = image::RgbaImage::new(canvas.width, canvas.height);
        {
            let snapshot = state.snapshot.read().await;
            crate::render::draw_markers(&mut img, &canvas, &snapshot.markers, 5);
        }
        let red = palette::rgba_for(Some("Comuna 1"));
        assert_eq!(*img.get_pixel(5, 10), red);
        assert_ne!(*img.get_pixel(4, 10), red);

        let Json(edge) = query(&state, 5.2, 10.7).await;
        assert_eq!(edge.len(), 1);
        let Json(outside) = query(&state, 4.9, 10.0).await;
        assert!(outside.is_empty());
    }

    #[tokio::test]
    async fn test_reload_failure_keeps_snapshot() {
        let state = state(&sample());
        let result = reload_handler(State(state.clone())).await;
        assert!(result.is_err());
        assert_eq!(state.snapshot.read().await.records, 5);
    }
}
