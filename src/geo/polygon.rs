use thiserror::Error;

use crate::models::location::GeoPoint;
use crate::models::zone::Geometry;

pub const MIN_POLYGON_POINTS: usize = 3;

#[derive(Debug, Error, PartialEq)]
pub enum GeometryError {
    #[error("a zone boundary needs at least {} points, got {0}", MIN_POLYGON_POINTS)]
    TooFewPoints(usize),

    #[error("invalid coordinate at position {0}")]
    InvalidPoint(usize),
}

/// Builds a closed GeoJSON polygon from boundary points. An input that already
/// repeats its first point at the end is accepted; the closing point is not counted.
pub fn build_polygon(points: &[GeoPoint]) -> Result<Geometry, GeometryError> {
    if let Some(index) = points.iter().position(|p| !p.is_valid()) {
        return Err(GeometryError::InvalidPoint(index));
    }

    let open = match (points.first(), points.last()) {
        (Some(first), Some(last)) if points.len() > 1 && first == last => {
            &points[..points.len() - 1]
        }
        _ => points,
    };

    if open.len() < MIN_POLYGON_POINTS {
        return Err(GeometryError::TooFewPoints(open.len()));
    }

    let mut ring: Vec<[f64; 2]> = open.iter().map(|p| [p.lng, p.lat]).collect();
    ring.push(ring[0]);

    Ok(Geometry::Polygon {
        coordinates: vec![ring],
    })
}

/// Ray-casting containment test against the outer ring; holes are subtracted.
pub fn contains(geometry: &Geometry, point: &GeoPoint) -> bool {
    let Geometry::Polygon { coordinates } = geometry;
    let mut rings = coordinates.iter();

    let Some(outer) = rings.next() else {
        return false;
    };
    if !ring_contains(outer, point) {
        return false;
    }

    !rings.any(|hole| ring_contains(hole, point))
}

fn ring_contains(ring: &[[f64; 2]], point: &GeoPoint) -> bool {
    if ring.len() < 3 {
        return false;
    }

    let (x, y) = (point.lng, point.lat);
    let mut inside = false;
    let mut j = ring.len() - 1;

    for i in 0..ring.len() {
        let [xi, yi] = ring[i];
        let [xj, yj] = ring[j];

        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }

    inside
}

#[cfg(test)]
mod tests {
    use super::{GeometryError, build_polygon, contains};
    use crate::models::location::GeoPoint;
    use crate::models::zone::Geometry;

    fn p(lat: f64, lng: f64) -> GeoPoint {
        GeoPoint { lat, lng }
    }

    fn square() -> Vec<GeoPoint> {
        vec![p(0.0, 0.0), p(0.0, 1.0), p(1.0, 1.0), p(1.0, 0.0)]
    }

    #[test]
    fn ring_is_closed_with_first_point() {
        let Geometry::Polygon { coordinates } = build_polygon(&square()).unwrap();
        let ring = &coordinates[0];

        assert_eq!(ring.len(), 5);
        assert_eq!(ring.first(), ring.last());
        assert_eq!(ring[1], [1.0, 0.0]);
    }

    #[test]
    fn fewer_than_three_points_are_rejected() {
        let err = build_polygon(&[p(0.0, 0.0), p(1.0, 1.0)]).unwrap_err();
        assert_eq!(err, GeometryError::TooFewPoints(2));
    }

    #[test]
    fn closing_point_does_not_count_toward_minimum() {
        let err = build_polygon(&[p(0.0, 0.0), p(1.0, 1.0), p(0.0, 0.0)]).unwrap_err();
        assert_eq!(err, GeometryError::TooFewPoints(2));
    }

    #[test]
    fn already_closed_input_is_not_closed_twice() {
        let mut points = square();
        points.push(points[0]);

        let Geometry::Polygon { coordinates } = build_polygon(&points).unwrap();
        assert_eq!(coordinates[0].len(), 5);
    }

    #[test]
    fn out_of_range_coordinate_is_rejected() {
        let err = build_polygon(&[p(0.0, 0.0), p(95.0, 1.0), p(1.0, 1.0)]).unwrap_err();
        assert_eq!(err, GeometryError::InvalidPoint(1));
    }

    #[test]
    fn point_in_polygon() {
        let zone = build_polygon(&square()).unwrap();

        assert!(contains(&zone, &p(0.5, 0.5)));
        assert!(!contains(&zone, &p(1.5, 0.5)));
        assert!(!contains(&zone, &p(0.5, -0.1)));
    }

    #[test]
    fn point_in_hole_is_outside() {
        let outer = vec![[0.0, 0.0], [4.0, 0.0], [4.0, 4.0], [0.0, 4.0], [0.0, 0.0]];
        let hole = vec![[1.0, 1.0], [3.0, 1.0], [3.0, 3.0], [1.0, 3.0], [1.0, 1.0]];
        let zone = Geometry::Polygon {
            coordinates: vec![outer, hole],
        };

        assert!(!contains(&zone, &p(2.0, 2.0)));
        assert!(contains(&zone, &p(0.5, 0.5)));
    }
}
