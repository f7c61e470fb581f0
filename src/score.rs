//! Attractiveness scoring of hotspot candidates.
//!
//! Each candidate gets its own 7-minute walking envelope; points of interest
//! falling inside it contribute their category weight to the candidate's
//! score.

use std::str::FromStr;

use tracing::debug;

use crate::{
    error::Error,
    graph::RoadGraph,
    isochrone,
    math::{Vec2, polygon::FanPolygon},
    model::{Geometry, HotspotCandidate, ScoredPoint},
};

/// Time budget used for every candidate's envelope.
pub const SCORE_TIME_MINUTES: u32 = 7;

/// Candidates scoring at or below this are dropped from responses.
pub const SCORE_THRESHOLD: i32 = 5;

/// The closed set of POI categories the scorer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    RailwayStation,
    BusinessCenter,
    Education,
    PedestrianZone,
    Park,
    Industrial,
    WastewaterPlant,
    Military,
    Power,
}

impl Category {
    /// Signed contribution of one in-range POI of this category.
    pub fn weight(self) -> i32 {
        match self {
            Category::RailwayStation => 15,
            Category::BusinessCenter => 10,
            Category::Education => 8,
            Category::PedestrianZone => 7,
            Category::Park => 6,
            Category::Industrial => -12,
            Category::WastewaterPlant => -15,
            Category::Military => -10,
            Category::Power => -8,
        }
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        Ok(match s {
            "railway_station" => Category::RailwayStation,
            "business_center" => Category::BusinessCenter,
            "education" => Category::Education,
            "pedestrian_zone" => Category::PedestrianZone,
            "park" => Category::Park,
            "industrial" => Category::Industrial,
            "wastewater_plant" => Category::WastewaterPlant,
            "military" => Category::Military,
            "power" => Category::Power,
            other => return Err(Error::BadCategory(other.into())),
        })
    }
}

/// A categorized point of interest.
#[derive(Debug, Clone, Copy)]
pub struct Poi {
    pub lon: f64,
    pub lat: f64,
    pub category: Category,
}

/// Scores every candidate center: builds its 7-minute envelope and sums the
/// weights of POIs inside it. Output order matches the input order.
pub async fn score_candidates(
    graph: &RoadGraph,
    candidates: &[HotspotCandidate],
    pois: &[Poi],
) -> Result<Vec<(f64, f64, i32)>, Error> {
    let mut scored = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        let envelope = candidate_envelope(graph, candidate.lon, candidate.lat).await?;
        let score: i32 = pois
            .iter()
            .map(|poi| {
                if envelope.contains(Vec2::new(poi.lon, poi.lat)) {
                    poi.category.weight()
                } else {
                    0
                }
            })
            .sum();
        debug!(
            "candidate ({}, {}) scored {score}",
            candidate.lon, candidate.lat
        );
        scored.push((candidate.lon, candidate.lat, score));
    }

    Ok(scored)
}

/// The candidate's walking envelope as a triangle fan anchored at the
/// candidate itself. The fan test requires a single ring star-shaped around
/// the anchor; a multi-polygon envelope cannot satisfy that.
async fn candidate_envelope(graph: &RoadGraph, lon: f64, lat: f64) -> Result<FanPolygon, Error> {
    let iso = isochrone::build_isochrone(graph, &[(lon, lat)], SCORE_TIME_MINUTES).await?;

    let ring = match &iso.polygon {
        Geometry::MultiPolygon { .. } => return Err(Error::MultiPolygonUnsupported),
        polygon => polygon
            .outer_ring()
            .ok_or_else(|| Error::Internal("empty isochrone polygon".to_string()))?,
    };

    let ring: Vec<Vec2> = ring.iter().map(|&[x, y]| Vec2::new(x, y)).collect();
    Ok(FanPolygon::new(Vec2::new(lon, lat), &ring))
}

/// Keeps only candidates above [`SCORE_THRESHOLD`], ranked 1..K in input
/// order.
pub fn rank_scored(scored: &[(f64, f64, i32)]) -> Vec<ScoredPoint> {
    scored
        .iter()
        .filter(|&&(_, _, score)| score > SCORE_THRESHOLD)
        .enumerate()
        .map(|(i, &(lon, lat, score))| ScoredPoint {
            rank: i as u32 + 1,
            lon,
            lat,
            score,
        })
        .collect()
}
