//! CSV-backed [`NetworkLoader`].
//!
//! One file, one `kind` column, generic `a..d` reference columns and a
//! `points` column holding `x y;x y;…` polylines:
//!
//! ```csv
//! kind,id,a,b,c,d,points
//! node,1,0,0,signalized,,
//! link,10,1,2,urban,,
//! segment,100,10,0,15.0,,0 0;400 0
//! lane,1000,100,0,,,0 0;400 0
//! connector,,1000,1010,,,
//! group,5,2,10,20,,
//! turning,50,5,1000,2000,,395 0;405 0
//! conflict,,50,51,1,,
//! busstop,7,100,20000,0,,
//! stoppoint,,100,30000,10.0,,
//! ```
//!
//! Reference columns are external 64-bit ids; dangling references are the
//! builder's problem (dropped with a warning), so a partially broken file
//! still loads.

use std::path::{Path, PathBuf};

use ms_core::{Centimeters, Meters, MetersPerSec, Seconds};
use ms_network::{
    LinkType, NetworkError, NetworkLoader, NetworkResult, Point, RawConflict, RawConnector,
    RawLane, RawLink, RawNode, RawObstacle, RawObstacleKind, RawSegment, RawTurningGroup,
    RawTurningPath, RoadNetwork, RoadNetworkBuilder, NodeType,
};
use serde::Deserialize;

#[derive(Deserialize)]
struct Record {
    kind: String,
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    a: Option<String>,
    #[serde(default)]
    b: Option<String>,
    #[serde(default)]
    c: Option<String>,
    #[serde(default)]
    d: Option<String>,
    #[serde(default)]
    points: Option<String>,
}

pub struct CsvNetworkLoader {
    path: PathBuf,
}

impl CsvNetworkLoader {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_owned(),
        }
    }
}

impl NetworkLoader for CsvNetworkLoader {
    fn load(&self) -> NetworkResult<RoadNetwork> {
        let file = std::fs::File::open(&self.path)?;
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(file);
        let mut builder = RoadNetworkBuilder::new();

        for (line, result) in reader.deserialize::<Record>().enumerate() {
            let rec = result.map_err(|e| NetworkError::Load(format!("row {}: {e}", line + 2)))?;
            add_record(&mut builder, &rec)
                .map_err(|e| NetworkError::Load(format!("row {} ({}): {e}", line + 2, rec.kind)))?;
        }
        Ok(builder.build())
    }
}

fn add_record(builder: &mut RoadNetworkBuilder, rec: &Record) -> Result<(), String> {
    match rec.kind.trim() {
        "node" => builder.add_node(RawNode {
            id: require_id(rec)?,
            x: parse_f64(&rec.a, "a (x)")?,
            y: parse_f64(&rec.b, "b (y)")?,
            node_type: parse_node_type(rec.c.as_deref().unwrap_or("default"))?,
        }),
        "link" => builder.add_link(RawLink {
            id: require_id(rec)?,
            from_node: parse_u64(&rec.a, "a (from node)")?,
            to_node: parse_u64(&rec.b, "b (to node)")?,
            link_type: parse_link_type(rec.c.as_deref().unwrap_or("default"))?,
            category: rec.d.as_deref().and_then(|s| s.trim().parse().ok()).unwrap_or(0),
            road_name: String::new(),
        }),
        "segment" => builder.add_segment(RawSegment {
            id: require_id(rec)?,
            link: parse_u64(&rec.a, "a (link)")?,
            sequence: parse_u64(&rec.b, "b (sequence)")? as u32,
            max_speed: MetersPerSec(parse_f64(&rec.c, "c (max speed)")?),
            polyline: parse_points(&rec.points)?,
        }),
        "lane" => builder.add_lane(RawLane {
            id: require_id(rec)?,
            segment: parse_u64(&rec.a, "a (segment)")?,
            index: parse_u64(&rec.b, "b (index)")? as usize,
            pedestrian_only: rec.c.as_deref().is_some_and(|s| s.trim() == "1"),
            width: Meters(3.5),
            polyline: parse_points(&rec.points)?,
        }),
        "connector" => builder.add_connector(RawConnector {
            from_lane: parse_u64(&rec.a, "a (from lane)")?,
            to_lane: parse_u64(&rec.b, "b (to lane)")?,
        }),
        "group" => builder.add_turning_group(RawTurningGroup {
            id: require_id(rec)?,
            node: parse_u64(&rec.a, "a (node)")?,
            from_link: parse_u64(&rec.b, "b (from link)")?,
            to_link: parse_u64(&rec.c, "c (to link)")?,
        }),
        "turning" => builder.add_turning_path(RawTurningPath {
            id: require_id(rec)?,
            group: parse_u64(&rec.a, "a (group)")?,
            from_lane: parse_u64(&rec.b, "b (from lane)")?,
            to_lane: parse_u64(&rec.c, "c (to lane)")?,
            polyline: parse_points(&rec.points)?,
        }),
        "conflict" => builder.add_conflict(RawConflict {
            first_turning: parse_u64(&rec.a, "a (first turning)")?,
            second_turning: parse_u64(&rec.b, "b (second turning)")?,
            priority: parse_u64(&rec.c, "c (priority)")? as u8,
        }),
        "busstop" => builder.add_obstacle(RawObstacle {
            segment: parse_u64(&rec.a, "a (segment)")?,
            offset: Centimeters(parse_u64(&rec.b, "b (offset cm)")? as i64),
            item: RawObstacleKind::BusStop {
                id: require_id(rec)?,
                name: String::new(),
                has_bay: rec.c.as_deref().is_some_and(|s| s.trim() == "1"),
            },
        }),
        "stoppoint" => builder.add_obstacle(RawObstacle {
            segment: parse_u64(&rec.a, "a (segment)")?,
            offset: Centimeters(parse_u64(&rec.b, "b (offset cm)")? as i64),
            item: RawObstacleKind::StopPoint {
                dwell: Seconds(parse_f64(&rec.c, "c (dwell s)")?),
            },
        }),
        other => return Err(format!("unknown record kind {other:?}")),
    }
    Ok(())
}

// ── Field parsing ─────────────────────────────────────────────────────────────

fn require_id(rec: &Record) -> Result<u64, String> {
    rec.id.ok_or_else(|| "missing id".to_owned())
}

fn parse_u64(field: &Option<String>, what: &str) -> Result<u64, String> {
    field
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("missing column {what}"))?
        .parse()
        .map_err(|_| format!("column {what} is not an integer"))
}

fn parse_f64(field: &Option<String>, what: &str) -> Result<f64, String> {
    field
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("missing column {what}"))?
        .parse()
        .map_err(|_| format!("column {what} is not a number"))
}

fn parse_points(field: &Option<String>) -> Result<Vec<Point>, String> {
    let raw = field
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or("missing points column")?;
    raw.split(';')
        .map(|pair| {
            let mut it = pair.split_whitespace();
            let x = it.next().and_then(|t| t.parse().ok());
            let y = it.next().and_then(|t| t.parse().ok());
            match (x, y) {
                (Some(x), Some(y)) => Ok(Point::new(x, y)),
                _ => Err(format!("bad point {pair:?}")),
            }
        })
        .collect()
}

fn parse_node_type(s: &str) -> Result<NodeType, String> {
    Ok(match s.trim() {
        "" | "default" => NodeType::Default,
        "priority-merge" => NodeType::PriorityMerge,
        "non-priority-merge" => NodeType::NonPriorityMerge,
        "signalized" => NodeType::Signalized,
        "uninode" => NodeType::Uninode,
        other => return Err(format!("unknown node type {other:?}")),
    })
}

fn parse_link_type(s: &str) -> Result<LinkType, String> {
    Ok(match s.trim() {
        "" | "default" => LinkType::Default,
        "expressway" => LinkType::Expressway,
        "urban" => LinkType::Urban,
        "ramp" => LinkType::Ramp,
        "roundabout" => LinkType::Roundabout,
        "access" => LinkType::Access,
        other => return Err(format!("unknown link type {other:?}")),
    })
}
