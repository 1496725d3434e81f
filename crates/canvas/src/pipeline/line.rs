//! Integer Bresenham line stepping

/// Points of a Bresenham line from `start` to `end`, both inclusive.
///
/// Consecutive points are 8-connected. Stepping runs in `i64` so the full
/// `i32` canvas range is safe.
#[derive(Debug, Clone)]
pub struct BresenhamLine {
    x: i64,
    y: i64,
    end_x: i64,
    end_y: i64,
    dx: i64,
    dy: i64,
    step_x: i64,
    step_y: i64,
    err: i64,
    done: bool,
}

impl BresenhamLine {
    pub fn new(start: (i32, i32), end: (i32, i32)) -> Self {
        let (x0, y0) = (start.0 as i64, start.1 as i64);
        let (x1, y1) = (end.0 as i64, end.1 as i64);
        let dx = (x1 - x0).abs();
        let dy = (y1 - y0).abs();
        Self {
            x: x0,
            y: y0,
            end_x: x1,
            end_y: y1,
            dx,
            dy,
            step_x: if x0 < x1 { 1 } else { -1 },
            step_y: if y0 < y1 { 1 } else { -1 },
            err: dx - dy,
            done: false,
        }
    }

    /// Number of points the line yields in total
    pub fn point_count(start: (i32, i32), end: (i32, i32)) -> u64 {
        let dx = (end.0 as i64 - start.0 as i64).unsigned_abs();
        let dy = (end.1 as i64 - start.1 as i64).unsigned_abs();
        dx.max(dy) + 1
    }
}

impl Iterator for BresenhamLine {
    type Item = (i32, i32);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        // Always between the two i32 endpoints
        let point = (self.x as i32, self.y as i32);

        if self.x == self.end_x && self.y == self.end_y {
            self.done = true;
        } else {
            let e2 = 2 * self.err;
            if e2 > -self.dy {
                self.err -= self.dy;
                self.x += self.step_x;
            }
            if e2 < self.dx {
                self.err += self.dx;
                self.y += self.step_y;
            }
        }

        Some(point)
    }
}

impl std::iter::FusedIterator for BresenhamLine {}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(start: (i32, i32), end: (i32, i32)) -> Vec<(i32, i32)> {
        BresenhamLine::new(start, end).collect()
    }

    fn assert_connected(points: &[(i32, i32)]) {
        for pair in points.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let step = ((a.0 - b.0).abs(), (a.1 - b.1).abs());
            assert!(step.0 <= 1 && step.1 <= 1 && step != (0, 0), "gap between {a:?} and {b:?}");
        }
    }

    #[test]
    fn test_single_point() {
        assert_eq!(line((3, -4), (3, -4)), vec![(3, -4)]);
    }

    #[test]
    fn test_horizontal() {
        assert_eq!(
            line((254, 128), (258, 128)),
            vec![(254, 128), (255, 128), (256, 128), (257, 128), (258, 128)]
        );
    }

    #[test]
    fn test_vertical_reverse() {
        assert_eq!(line((0, 2), (0, -1)), vec![(0, 2), (0, 1), (0, 0), (0, -1)]);
    }

    #[test]
    fn test_diagonal() {
        assert_eq!(line((0, 0), (-3, 3)), vec![(0, 0), (-1, 1), (-2, 2), (-3, 3)]);
    }

    #[test]
    fn test_shallow_slope() {
        assert_eq!(line((0, 0), (4, 2)), vec![(0, 0), (1, 0), (2, 1), (3, 1), (4, 2)]);
    }

    #[test]
    fn test_all_octants_connected_and_inclusive() {
        let targets = [
            (17, 5), (5, 17), (-5, 17), (-17, 5),
            (-17, -5), (-5, -17), (5, -17), (17, -5),
        ];
        for end in targets {
            let points = line((0, 0), end);
            assert_eq!(points.first(), Some(&(0, 0)));
            assert_eq!(points.last(), Some(&end));
            assert_eq!(points.len() as u64, BresenhamLine::point_count((0, 0), end));
            assert_connected(&points);
        }
    }

    #[test]
    fn test_extreme_endpoints() {
        let mut it = BresenhamLine::new((i32::MIN, 0), (i32::MAX, 0));
        assert_eq!(it.next(), Some((i32::MIN, 0)));
        assert_eq!(BresenhamLine::point_count((i32::MIN, 0), (i32::MAX, 0)), 1 << 32);
    }

    #[test]
    fn test_fused() {
        let mut it = BresenhamLine::new((0, 0), (1, 0));
        assert_eq!(it.next(), Some((0, 0)));
        assert_eq!(it.next(), Some((1, 0)));
        assert_eq!(it.next(), None);
        assert_eq!(it.next(), None);
    }
}
