//! File-backed snapshot of the external tables the service consumes.
//!
//! The relational store itself belongs to another team; this catalog reads
//! CSV exports of `road_nodes`, `road_ribs`, `builds` and `criteries` from a
//! data directory so the service runs end-to-end. Row-level problems are
//! skipped and counted, never surfaced.

use std::{env, path::{Path, PathBuf}};

use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::{
    error::Error,
    math::{self, mercator},
    model::{Build, BufferRing, CriteriaRow, EdgeRecord, NodeRecord, parse_coord},
    score::Poi,
};

pub const DATA_DIR_ENV: &str = "WALKSHED_DATA_DIR";

/// Radius of the interest buffer drawn around each harvested building.
pub const POINT_BUFFER_M: f64 = 500.0;

const BUFFER_SEGMENTS: usize = 32;

pub struct Catalog {
    data_dir: PathBuf,
    builds: Vec<Build>,
    criteria: Vec<CriteriaRow>,
}

impl Catalog {
    pub fn load_from_env() -> Self {
        let dir = env::var(DATA_DIR_ENV).unwrap_or_else(|_| "./data".to_string());
        Self::load(dir)
    }

    pub fn load(dir: impl Into<PathBuf>) -> Self {
        let data_dir = dir.into();
        let builds: Vec<Build> = read_csv(&data_dir.join("builds.csv"));
        let criteria: Vec<CriteriaRow> = read_csv(&data_dir.join("criteries.csv"));
        info!(
            "catalog loaded from {}: {} builds, {} criteria",
            data_dir.display(),
            builds.len(),
            criteria.len()
        );
        Self {
            data_dir,
            builds,
            criteria,
        }
    }

    /// Road snapshot rows for the one-shot graph load.
    pub fn road_records(&self) -> (Vec<NodeRecord>, Vec<EdgeRecord>) {
        let nodes = read_csv(&self.data_dir.join("road_nodes.csv"));
        let edges = read_csv(&self.data_dir.join("road_ribs.csv"));
        (nodes, edges)
    }

    /// Coordinates of every building in `category` with parseable
    /// coordinates.
    pub fn coords_by_category(&self, category: &str) -> Vec<(f64, f64)> {
        self.harvest(|b| b.category.as_deref() == Some(category))
    }

    /// Coordinates of every building named `name` with parseable
    /// coordinates.
    pub fn coords_by_name(&self, name: &str) -> Vec<(f64, f64)> {
        self.harvest(|b| b.name.as_deref() == Some(name))
    }

    fn harvest(&self, keep: impl Fn(&Build) -> bool) -> Vec<(f64, f64)> {
        self.builds
            .iter()
            .filter(|b| keep(b))
            .filter_map(|b| {
                let lon = parse_coord(b.longitude.as_deref()?)?;
                let lat = parse_coord(b.latitude.as_deref()?)?;
                Some((lon, lat))
            })
            .collect()
    }

    /// The POI collection for the scorer. A criteria row with an unknown
    /// category fails the whole conversion with [`Error::BadCategory`]; rows
    /// without coordinates or category are skipped.
    pub fn pois(&self) -> Result<Vec<Poi>, Error> {
        self.criteria
            .iter()
            .filter_map(|row| {
                let lon = row.longitude?;
                let lat = row.latitude?;
                let category = row.category.as_deref()?;
                Some((lon, lat, category))
            })
            .map(|(lon, lat, category)| {
                Ok(Poi {
                    lon,
                    lat,
                    category: category.parse()?,
                })
            })
            .collect()
    }

    /// 500-meter interest buffers around every attractive criteria point of
    /// `category`, emitted as WGS84 rings for the intersection aggregator.
    /// Rows flagged `is_antiattractive` are excluded; rows without
    /// coordinates are skipped.
    pub fn attraction_buffer_rings(&self, category: &str) -> Vec<BufferRing> {
        self.criteria
            .iter()
            .filter(|row| row.category.as_deref() == Some(category))
            .filter(|row| !row.is_antiattractive.unwrap_or(false))
            .filter_map(|row| Some((row.longitude?, row.latitude?)))
            .map(|(lon, lat)| point_buffer_ring(lon, lat, POINT_BUFFER_M))
            .collect()
    }
}

/// A closed ring approximating a metric circle around a lon/lat point:
/// projected to EPSG:3857, buffered, and projected back.
pub fn point_buffer_ring(lon: f64, lat: f64, radius_m: f64) -> BufferRing {
    let center = mercator::to_mercator(lon, lat);
    let mut ring: BufferRing = math::circle(center, radius_m, BUFFER_SEGMENTS)
        .into_iter()
        .map(|v| {
            let (lon, lat) = mercator::to_wgs84(v);
            [lon, lat]
        })
        .collect();
    if let Some(&first) = ring.first() {
        ring.push(first);
    }
    ring
}

/// Reads every well-formed row of a CSV export; malformed rows are skipped
/// with a count, a missing file yields an empty table.
fn read_csv<T: DeserializeOwned>(path: &Path) -> Vec<T> {
    let mut reader = match csv::Reader::from_path(path) {
        Ok(reader) => reader,
        Err(err) => {
            warn!("could not open {}: {err}", path.display());
            return Vec::new();
        }
    };

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for row in reader.deserialize() {
        match row {
            Ok(row) => rows.push(row),
            Err(_) => skipped += 1,
        }
    }
    if skipped > 0 {
        warn!("skipped {skipped} malformed rows in {}", path.display());
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_fixture(dir: &Path) {
        fs::create_dir_all(dir).unwrap();
        fs::write(
            dir.join("builds.csv"),
            "id,name,category,longitude,latitude\n\
             1,Central Station,railway_station,\"37,6183\",\"55,7570\"\n\
             2,Plaza Offices,business_center,37.6050,55.7600\n\
             3,Broken Row,business_center,not-a-number,55.7600\n\
             4,No Coords,business_center,,\n",
        )
        .unwrap();
        fs::write(
            dir.join("criteries.csv"),
            "id,longitude,latitude,category,is_antiattractive\n\
             1,37.6183,55.7570,railway_station,false\n\
             2,37.6050,55.7600,park,false\n\
             3,37.6300,55.7500,industrial,true\n\
             4,,55.7500,park,false\n",
        )
        .unwrap();
        fs::write(
            dir.join("road_nodes.csv"),
            "node_id,longitude,latitude\n1,37.6176,55.7558\n2,37.6200,55.7558\n",
        )
        .unwrap();
        fs::write(
            dir.join("road_ribs.csv"),
            "id,start_node_id,end_node_id,length,max_speed\n1,1,2,150,5\n",
        )
        .unwrap();
    }

    fn fixture_dir(name: &str) -> PathBuf {
        let dir = env::temp_dir().join(format!("walkshed-catalog-{name}"));
        write_fixture(&dir);
        dir
    }

    #[test]
    fn test_harvest_tolerates_comma_decimals_and_skips_bad_rows() {
        let catalog = Catalog::load(fixture_dir("harvest"));

        let stations = catalog.coords_by_category("railway_station");
        assert_eq!(stations, vec![(37.6183, 55.7570)]);

        // rows 3 and 4 have unusable coordinates
        let offices = catalog.coords_by_category("business_center");
        assert_eq!(offices, vec![(37.6050, 55.7600)]);

        let named = catalog.coords_by_name("Central Station");
        assert_eq!(named.len(), 1);
    }

    #[test]
    fn test_pois_parse_categories() {
        let catalog = Catalog::load(fixture_dir("pois"));
        let pois = catalog.pois().unwrap();
        // antiattractive rows still score; the coordless row is skipped
        assert_eq!(pois.len(), 3);
        assert_eq!(pois[0].category, crate::score::Category::RailwayStation);
        assert_eq!(pois[1].category, crate::score::Category::Park);
        assert_eq!(pois[2].category, crate::score::Category::Industrial);
    }

    #[test]
    fn test_attraction_buffer_rings_filter() {
        let catalog = Catalog::load(fixture_dir("buffers"));

        // one park row has coordinates, the other is skipped
        assert_eq!(catalog.attraction_buffer_rings("park").len(), 1);
        assert_eq!(catalog.attraction_buffer_rings("railway_station").len(), 1);
        // antiattractive criteria never seed buffers
        assert!(catalog.attraction_buffer_rings("industrial").is_empty());
        assert!(catalog.attraction_buffer_rings("school").is_empty());
    }

    #[test]
    fn test_missing_dir_yields_empty_catalog() {
        let catalog = Catalog::load(env::temp_dir().join("walkshed-absent"));
        assert!(catalog.coords_by_category("park").is_empty());
        assert!(catalog.pois().unwrap().is_empty());
        let (nodes, edges) = catalog.road_records();
        assert!(nodes.is_empty());
        assert!(edges.is_empty());
    }

    #[test]
    fn test_road_records_round_trip() {
        let catalog = Catalog::load(fixture_dir("roads"));
        let (nodes, edges) = catalog.road_records();
        assert_eq!(nodes.len(), 2);
        assert_eq!(edges.len(), 1);
        assert_eq!(nodes[0].node_id, 1);
        assert_eq!(edges[0].length.as_deref(), Some("150"));
    }

    #[test]
    fn test_point_buffer_ring_radius() {
        let ring = point_buffer_ring(37.6176, 55.7558, POINT_BUFFER_M);
        assert_eq!(ring.len(), BUFFER_SEGMENTS + 1);
        assert_eq!(ring.first(), ring.last());

        // 500 mercator-meters at this latitude is 500·cos(lat) ≈ 281m over
        // the ground, uniform across the ring
        let expected_km = POINT_BUFFER_M / 1000. * (55.7558f64).to_radians().cos();
        for &[lon, lat] in &ring {
            let d = math::haversine_km(37.6176, 55.7558, lon, lat);
            assert!(
                (d - expected_km).abs() / expected_km < 0.01,
                "got {d}km, expected ~{expected_km}km"
            );
        }
    }
}
