use crate::config::AppConfig;
use crate::map::joined_properties;
use crate::types::{HviRecord, Neighborhood};
use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, Json},
    routing::get,
    Router,
};
use geo::algorithm::bounding_rect::BoundingRect;
use geo::algorithm::contains::Contains;
use geo::Point;
use rstar::{RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

// Wrapper for RTree indexing
pub struct AreaIndex {
    index: usize,
    aabb: AABB<[f64; 2]>,
}

impl RTreeObject for AreaIndex {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

pub struct AppState {
    pub page: String,
    pub areas: Vec<Neighborhood>,
    pub tree: RTree<AreaIndex>,
}

impl AppState {
    pub fn new(page: String, areas: Vec<Neighborhood>) -> Self {
        let tree_items: Vec<AreaIndex> = areas.iter().enumerate()
            .filter_map(|(i, area)| {
                let rect = area.geometry.bounding_rect()?;
                Some(AreaIndex {
                    index: i,
                    aabb: AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
                })
            })
            .collect();

        Self {
            page,
            areas,
            tree: RTree::bulk_load(tree_items),
        }
    }
}

#[derive(Deserialize)]
pub struct QueryParams {
    lat: f64,
    lon: f64,
}

#[derive(Serialize)]
pub struct NeighborhoodResponse {
    code: Option<String>,
    properties: serde_json::Map<String, serde_json::Value>,
    vulnerability: Option<HviRecord>,
}

impl From<&Neighborhood> for NeighborhoodResponse {
    fn from(area: &Neighborhood) -> Self {
        Self {
            code: area.code.clone(),
            properties: joined_properties(area),
            vulnerability: area.vulnerability.clone(),
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(page_handler))
        .route("/api/query", get(query_handler))
        .route("/api/neighborhoods/:code", get(neighborhood_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(config: AppConfig, page: String, areas: Vec<Neighborhood>) -> Result<()> {
    info!("Building spatial index for {} neighborhoods...", areas.len());
    let state = Arc::new(AppState::new(page, areas));

    let addr = SocketAddr::from(([127, 0, 0, 1], config.server.port));
    info!("Starting server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn page_handler(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(state.page.clone())
}

async fn query_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<QueryParams>,
) -> Json<Option<NeighborhoodResponse>> {
    let point = Point::new(params.lon, params.lat);
    let envelope = AABB::from_point([params.lon, params.lat]);

    for candidate in state.tree.locate_in_envelope_intersecting(&envelope) {
        if let Some(area) = state.areas.get(candidate.index) {
            if area.geometry.contains(&point) {
                return Json(Some(area.into()));
            }
        }
    }

    Json(None)
}

async fn neighborhood_handler(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<NeighborhoodResponse>, StatusCode> {
    state.areas.iter()
        .find(|area| area.code.as_deref() == Some(code.as_str()))
        .map(|area| Json(area.into()))
        .ok_or(StatusCode::NOT_FOUND)
}
