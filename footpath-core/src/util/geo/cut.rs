use geo::{Coord, LineString, Point};

/// floating-point slack treated as equality when comparing arc lengths.
pub const CUT_SLACK: f64 = 1e-12;

/// planar (coordinate-space) length of a polyline: the sum of the l2 norms
/// of its segments. distinct from the haversine length, which is in meters;
/// arc-length bookkeeping for cutting and projection happens in coordinate
/// space.
pub fn planar_length(line: &LineString<f64>) -> f64 {
    line.0.windows(2).map(|w| point_distance(w[0], w[1])).sum()
}

/// reverse the coordinate order of a polyline.
pub fn reverse(line: &LineString<f64>) -> LineString<f64> {
    LineString::new(line.0.iter().rev().cloned().collect())
}

/// split a polyline at arc-length `distance`. returns `(head, Some(tail))`
/// for an interior split; if `distance` is non-positive or at least the
/// line's length, the line cannot be split and `(line, None)` is returned.
///
/// if `distance` lands on a vertex (within [`CUT_SLACK`]) the split happens
/// at the vertex; otherwise a new coordinate is interpolated and becomes the
/// last point of `head` and the first point of `tail`.
pub fn cut(line: &LineString<f64>, distance: f64) -> (LineString<f64>, Option<LineString<f64>>) {
    let total = planar_length(line);
    if distance <= 0.0 || distance >= total {
        return (line.clone(), None);
    }
    let coords = &line.0;

    let mut pd = 0.0;
    for i in 1..coords.len() {
        pd += point_distance(coords[i - 1], coords[i]);

        if (pd - distance).abs() < CUT_SLACK {
            let head = LineString::new(coords[..=i].to_vec());
            let tail = LineString::new(coords[i..].to_vec());
            return (head, Some(tail));
        }
        if pd > distance {
            let cp = interpolate(line, distance);
            let mut head: Vec<Coord<f64>> = coords[..i].to_vec();
            head.push(cp);
            let mut tail: Vec<Coord<f64>> = vec![cp];
            tail.extend_from_slice(&coords[i..]);
            return (LineString::new(head), Some(LineString::new(tail)));
        }
    }

    // accumulated segment lengths fell short of the total by a rounding gap.
    // assume the cut lands on the final segment.
    let cp = interpolate(line, distance);
    let last = coords.len() - 1;
    let mut head: Vec<Coord<f64>> = coords[..last].to_vec();
    head.push(cp);
    let tail = LineString::new(vec![cp, coords[last]]);
    (LineString::new(head), Some(tail))
}

/// like [`cut`] but keeps only the head polyline.
pub fn cut_off(line: &LineString<f64>, distance: f64) -> LineString<f64> {
    cut(line, distance).0
}

/// the coordinate at arc-length `distance` along the polyline, clamped to
/// its endpoints.
pub fn interpolate(line: &LineString<f64>, distance: f64) -> Coord<f64> {
    let coords = &line.0;
    if distance <= 0.0 {
        return coords[0];
    }

    let mut pd = 0.0;
    for i in 1..coords.len() {
        let seg = point_distance(coords[i - 1], coords[i]);
        if pd + seg >= distance {
            if seg < CUT_SLACK {
                return coords[i];
            }
            let t = (distance - pd) / seg;
            let a = coords[i - 1];
            let b = coords[i];
            return Coord {
                x: a.x + t * (b.x - a.x),
                y: a.y + t * (b.y - a.y),
            };
        }
        pd += seg;
    }
    coords[coords.len() - 1]
}

/// arc-length along the polyline of the point on it closest to `point`
/// (the projection of the query point onto the line), in coordinate space.
pub fn project(line: &LineString<f64>, point: &Point<f64>) -> f64 {
    let coords = &line.0;
    let p = point.0;

    let mut best_d2 = f64::INFINITY;
    let mut best_arc = 0.0;
    let mut prefix = 0.0;

    for i in 1..coords.len() {
        let a = coords[i - 1];
        let b = coords[i];
        let seg = point_distance(a, b);

        let (d2, t) = point_segment_distance2(p, a, b);
        if d2 < best_d2 {
            best_d2 = d2;
            best_arc = prefix + t * seg;
        }
        prefix += seg;
    }
    best_arc
}

fn point_distance(a: Coord<f64>, b: Coord<f64>) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    (dx * dx + dy * dy).sqrt()
}

/// squared distance from `p` to segment `ab`, plus the normalized position
/// `t in [0, 1]` of the closest point along the segment.
fn point_segment_distance2(p: Coord<f64>, a: Coord<f64>, b: Coord<f64>) -> (f64, f64) {
    let abx = b.x - a.x;
    let aby = b.y - a.y;
    let len2 = abx * abx + aby * aby;
    let t = if len2 < CUT_SLACK * CUT_SLACK {
        0.0
    } else {
        (((p.x - a.x) * abx + (p.y - a.y) * aby) / len2).clamp(0.0, 1.0)
    };
    let cx = a.x + t * abx;
    let cy = a.y + t * aby;
    let dx = p.x - cx;
    let dy = p.y - cy;
    (dx * dx + dy * dy, t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn vertical_unit_line() -> LineString<f64> {
        LineString::from(vec![(0.0, 0.0), (0.0, 1.0)])
    }

    #[test]
    fn test_cut_midpoint() {
        let (head, tail) = cut(&vertical_unit_line(), 0.5);
        let tail = tail.expect("interior cut should split");

        assert_eq!(head.0.len(), 2);
        assert_eq!(tail.0.len(), 2);
        assert_eq!(head.0[1], Coord { x: 0.0, y: 0.5 });
        assert_eq!(tail.0[0], Coord { x: 0.0, y: 0.5 });
        assert_relative_eq!(planar_length(&head), 0.5);
        assert_relative_eq!(planar_length(&tail), 0.5);
    }

    #[test]
    fn test_cut_out_of_range_returns_whole_line() {
        let line = vertical_unit_line();
        let (head, tail) = cut(&line, 0.0);
        assert!(tail.is_none());
        assert_eq!(head, line);

        let (head, tail) = cut(&line, 1.0);
        assert!(tail.is_none());
        assert_eq!(head, line);

        let (_, tail) = cut(&line, -0.5);
        assert!(tail.is_none());
    }

    #[test]
    fn test_cut_on_vertex() {
        let line = LineString::from(vec![(0.0, 0.0), (0.0, 1.0), (1.0, 1.0)]);
        let (head, tail) = cut(&line, 1.0);
        let tail = tail.expect("vertex cut should split");
        assert_eq!(head.0.len(), 2);
        assert_eq!(tail.0.len(), 2);
        assert_eq!(head.0[1], Coord { x: 0.0, y: 1.0 });
        assert_eq!(tail.0[0], Coord { x: 0.0, y: 1.0 });
    }

    #[test]
    fn test_cut_off_keeps_head() {
        let line = LineString::from(vec![(0.0, 0.0), (0.0, 1.0), (1.0, 1.0)]);
        let head = cut_off(&line, 1.5);
        assert_relative_eq!(planar_length(&head), 1.5);
        assert_eq!(head.0.last().unwrap(), &Coord { x: 0.5, y: 1.0 });
    }

    #[test]
    fn test_interpolate() {
        let line = LineString::from(vec![(0.0, 0.0), (0.0, 1.0), (1.0, 1.0)]);
        assert_eq!(interpolate(&line, 0.5), Coord { x: 0.0, y: 0.5 });
        assert_eq!(interpolate(&line, 1.5), Coord { x: 0.5, y: 1.0 });
        assert_eq!(interpolate(&line, 10.0), Coord { x: 1.0, y: 1.0 });
        assert_eq!(interpolate(&line, -1.0), Coord { x: 0.0, y: 0.0 });
    }

    #[test]
    fn test_project_interior_point() {
        let line = vertical_unit_line();
        let s = project(&line, &Point::new(0.25, 0.5));
        assert_relative_eq!(s, 0.5);
    }

    #[test]
    fn test_project_before_start_clamps_to_zero() {
        let line = vertical_unit_line();
        let s = project(&line, &Point::new(0.0, -1.0));
        assert_relative_eq!(s, 0.0);
    }

    #[test]
    fn test_project_past_end_clamps_to_length() {
        let line = vertical_unit_line();
        let s = project(&line, &Point::new(0.0, 2.0));
        assert_relative_eq!(s, 1.0);
    }

    #[test]
    fn test_reverse() {
        let line = LineString::from(vec![(0.0, 0.0), (0.0, 1.0), (1.0, 1.0)]);
        let rev = reverse(&line);
        assert_eq!(rev.0[0], Coord { x: 1.0, y: 1.0 });
        assert_eq!(rev.0[2], Coord { x: 0.0, y: 0.0 });
    }
}
