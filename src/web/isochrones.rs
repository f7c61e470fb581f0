//! The isochrone and scoring endpoints.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    error::Error,
    graph::GRAPH,
    hotspots, isochrone,
    model::{Isochrone, ScoredPoint},
    score,
    web::AppState,
};

#[derive(Debug, Deserialize)]
pub struct IsoRequest {
    time: Option<i64>,
    #[serde(default)]
    points: Option<Vec<IsoPoint>>,
    #[serde(default, rename = "byCategory")]
    by_category: Option<String>,
    #[serde(default, rename = "byName")]
    by_name: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct IsoPoint {
    pub lon: f64,
    pub lat: f64,
}

#[derive(Serialize)]
pub struct IsoResponse {
    status: &'static str,
    isochrones: Vec<Isochrone>,
}

/// `POST /api/isochrones`: one reachability envelope for the union of all
/// supplied start coordinates.
pub async fn isochrones(
    State(state): State<AppState>,
    Json(req): Json<IsoRequest>,
) -> Result<Json<IsoResponse>, Error> {
    let time = req.time.unwrap_or(0);
    if time <= 0 || time > isochrone::MAX_MINUTES as i64 {
        return Err(Error::BadTime(time));
    }
    let time = time as u32;

    let points = req.points.as_deref().filter(|p| !p.is_empty());
    let by_category = req.by_category.as_deref().filter(|s| !s.is_empty());
    let by_name = req.by_name.as_deref().filter(|s| !s.is_empty());
    if points.is_none() && by_category.is_none() && by_name.is_none() {
        return Err(Error::NoInputs);
    }

    let mut start_coords: Vec<(f64, f64)> = Vec::new();
    if let Some(points) = points {
        start_coords.extend(points.iter().map(|p| (p.lon, p.lat)));
    }
    if let Some(category) = by_category {
        start_coords.extend(state.catalog.coords_by_category(category));
    }
    if let Some(name) = by_name {
        start_coords.extend(state.catalog.coords_by_name(name));
    }

    if start_coords.is_empty() {
        return Err(Error::NoStartNodes);
    }

    let graph = GRAPH.get()?;
    info!("/api/isochrones: {} starts, {time} min", start_coords.len());

    let iso = isochrone::build_isochrone(&graph, &start_coords, time).await?;
    Ok(Json(IsoResponse {
        status: "success",
        isochrones: vec![iso],
    }))
}

#[derive(Debug, Deserialize)]
pub struct ScoreRequest {
    #[serde(default, rename = "byCategory")]
    by_category: Option<String>,
    #[serde(default, rename = "byName")]
    by_name: Option<String>,
}

#[derive(Serialize)]
pub struct ScoreResponse {
    status: &'static str,
    points: Vec<ScoredPoint>,
}

/// `POST /api/isochrones/score`: overlap hotspots of the requested criteria
/// category's interest buffers, scored by POI containment and filtered to
/// attractive ones.
pub async fn isochrones_score(
    State(state): State<AppState>,
    Json(req): Json<ScoreRequest>,
) -> Result<Json<ScoreResponse>, Error> {
    if req.by_name.as_deref().is_some_and(|s| !s.is_empty()) {
        return Err(Error::ScoreByNameUnsupported);
    }
    let category = match req.by_category.as_deref() {
        Some(category) if !category.is_empty() => category,
        _ => return Err(Error::NoInputs),
    };

    let graph = GRAPH.get()?;

    let rings = state.catalog.attraction_buffer_rings(category);
    info!("/api/isochrones/score: {category}, {} buffers", rings.len());

    let centers =
        hotspots::find_intersection_centers(&rings, 2, hotspots::DEFAULT_MAX_POINTS);
    if centers.is_empty() {
        return Ok(Json(ScoreResponse {
            status: "success",
            points: Vec::new(),
        }));
    }

    let pois = state.catalog.pois()?;
    let scored = score::score_candidates(&graph, &centers, &pois).await?;
    let points = score::rank_scored(&scored);

    Ok(Json(ScoreResponse {
        status: "success",
        points,
    }))
}
