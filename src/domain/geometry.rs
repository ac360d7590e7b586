//! Polyline end-point extraction from Esri JSON geometry text
//!
//! Source features store their shape as `{"paths":[[[x,y],...],...]}`.
//! Only the leading and trailing vertex are needed to locate a feature.

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("invalid polyline JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("vertex has {0} coordinate(s), expected at least 2")]
    ShortVertex(usize),
}

#[derive(Debug, Deserialize)]
struct EsriPolyline {
    #[serde(default)]
    paths: Vec<Vec<Vec<f64>>>,
}

fn to_point(vertex: &[f64]) -> Result<Point, GeometryError> {
    match vertex {
        [x, y, ..] => Ok(Point { x: *x, y: *y }),
        _ => Err(GeometryError::ShortVertex(vertex.len())),
    }
}

/// First vertex of the first path and last vertex of the last path.
///
/// Returns `Ok(None)` for an empty geometry. z/m components are ignored.
pub fn end_points(text: &str) -> Result<Option<(Point, Point)>, GeometryError> {
    let polyline: EsriPolyline = serde_json::from_str(text)?;

    let first = polyline.paths.iter().find_map(|path| path.first());
    let last = polyline.paths.iter().rev().find_map(|path| path.last());

    match (first, last) {
        (Some(first), Some(last)) => Ok(Some((to_point(first)?, to_point(last)?))),
        _ => Ok(None),
    }
}
