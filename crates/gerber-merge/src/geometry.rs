use std::fmt;

use serde::Serialize;

// ─── Bounding Box ────────────────────────────────────────────────────

/// Axis-aligned box, inclusive on every edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BBox {
    pub minx: f64,
    pub miny: f64,
    pub maxx: f64,
    pub maxy: f64,
}

impl BBox {
    pub fn new(minx: f64, miny: f64, maxx: f64, maxy: f64) -> Self {
        Self {
            minx,
            miny,
            maxx,
            maxy,
        }
    }

    pub fn from_point(x: f64, y: f64) -> Self {
        Self::new(x, y, x, y)
    }

    pub fn expand_point(&mut self, x: f64, y: f64) {
        self.minx = self.minx.min(x);
        self.miny = self.miny.min(y);
        self.maxx = self.maxx.max(x);
        self.maxy = self.maxy.max(y);
    }

    pub fn union(&self, other: &BBox) -> BBox {
        BBox::new(
            self.minx.min(other.minx),
            self.miny.min(other.miny),
            self.maxx.max(other.maxx),
            self.maxy.max(other.maxy),
        )
    }

    /// Grow outward by `margin` on all four sides.
    pub fn pad(&self, margin: f64) -> BBox {
        BBox::new(
            self.minx - margin,
            self.miny - margin,
            self.maxx + margin,
            self.maxy + margin,
        )
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.minx && x <= self.maxx && y >= self.miny && y <= self.maxy
    }

    /// Clamp each coordinate independently into the box.
    pub fn clamp(&self, x: f64, y: f64) -> (f64, f64) {
        (x.max(self.minx).min(self.maxx), y.max(self.miny).min(self.maxy))
    }

    /// True if `self` reaches past `other` on any side.
    pub fn exceeds(&self, other: &BBox) -> bool {
        self.minx < other.minx
            || self.miny < other.miny
            || self.maxx > other.maxx
            || self.maxy > other.maxy
    }

    /// Box of the geometry after `(x, y) → (-y, x)`.
    pub fn rotate90ccw(&self) -> BBox {
        BBox::new(-self.maxy, self.minx, -self.miny, self.maxx)
    }

    /// Box of the geometry after `(x, y) → (y, -x)`.
    pub fn rotate90cw(&self) -> BBox {
        BBox::new(self.miny, -self.maxx, self.maxy, -self.minx)
    }

    pub fn translate(&self, dx: f64, dy: f64) -> BBox {
        BBox::new(self.minx + dx, self.miny + dy, self.maxx + dx, self.maxy + dy)
    }
}

impl fmt::Display for BBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.minx, self.miny, self.maxx, self.maxy
        )
    }
}

// ─── Point groups ────────────────────────────────────────────────────

/// Anything carrying an `(x, y)` position. Transforms leave the rest of
/// the value (draw code, tool) untouched.
pub trait Positioned {
    fn position(&self) -> (f64, f64);
    fn set_position(&mut self, x: f64, y: f64);
}

/// An ordered run of positioned points: a Gerber draw layer or an
/// Excellon hole group.
pub trait PointGroup {
    type Point: Positioned;

    fn points(&self) -> &[Self::Point];
    fn points_mut(&mut self) -> &mut Vec<Self::Point>;
}

/// What [`clip_to_box`] does with a point outside the box.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ClipMode {
    #[default]
    Clamp,
    Remove,
}

/// Bounding box of every point in every group, `None` if there are none.
pub fn bbox<G: PointGroup>(groups: &[G]) -> Option<BBox> {
    groups
        .iter()
        .flat_map(|g| g.points())
        .map(Positioned::position)
        .fold(None, |acc: Option<BBox>, (x, y)| match acc {
            Some(mut b) => {
                b.expand_point(x, y);
                Some(b)
            }
            None => Some(BBox::from_point(x, y)),
        })
}

fn map_points<G: PointGroup>(groups: &mut [G], f: impl Fn(f64, f64) -> (f64, f64)) {
    for point in groups.iter_mut().flat_map(|g| g.points_mut().iter_mut()) {
        let (x, y) = point.position();
        let (nx, ny) = f(x, y);
        point.set_position(nx, ny);
    }
}

pub fn rotate90ccw<G: PointGroup>(groups: &mut [G]) {
    map_points(groups, |x, y| (-y, x));
}

pub fn rotate90cw<G: PointGroup>(groups: &mut [G]) {
    map_points(groups, |x, y| (y, -x));
}

pub fn translate<G: PointGroup>(groups: &mut [G], dx: f64, dy: f64) {
    map_points(groups, |x, y| (x + dx, y + dy));
}

/// Bring every point inside `bbox`, either by clamping it onto the box or
/// by deleting it. Returns the number of points that lay outside.
///
/// Groups emptied by this pass are dropped. Groups that were already empty
/// (a region end, an aperture select with nothing drawn yet) are kept since
/// their tag still matters to the layer's structure.
///
/// Clamping moves vertices only; a stroke crossing the edge is not split at
/// the intersection, so a clamped polygon may change shape along the edge.
pub fn clip_to_box<G: PointGroup>(groups: &mut Vec<G>, bbox: &BBox, mode: ClipMode) -> usize {
    let mut affected = 0;
    let mut emptied = Vec::with_capacity(groups.len());

    for group in groups.iter_mut() {
        let points = group.points_mut();
        let had_points = !points.is_empty();
        match mode {
            ClipMode::Remove => {
                let before = points.len();
                points.retain(|p| {
                    let (x, y) = p.position();
                    bbox.contains(x, y)
                });
                affected += before - points.len();
            }
            ClipMode::Clamp => {
                for point in points.iter_mut() {
                    let (x, y) = point.position();
                    if !bbox.contains(x, y) {
                        let (cx, cy) = bbox.clamp(x, y);
                        point.set_position(cx, cy);
                        affected += 1;
                    }
                }
            }
        }
        emptied.push(had_points && points.is_empty());
    }

    let mut emptied = emptied.into_iter();
    groups.retain(|_| !emptied.next().unwrap_or(false));
    affected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Pt(f64, f64);

    impl Positioned for Pt {
        fn position(&self) -> (f64, f64) {
            (self.0, self.1)
        }
        fn set_position(&mut self, x: f64, y: f64) {
            self.0 = x;
            self.1 = y;
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Group(Vec<Pt>);

    impl PointGroup for Group {
        type Point = Pt;
        fn points(&self) -> &[Pt] {
            &self.0
        }
        fn points_mut(&mut self) -> &mut Vec<Pt> {
            &mut self.0
        }
    }

    fn sample() -> Vec<Group> {
        vec![
            Group(vec![Pt(1.0, 2.0), Pt(-3.5, 4.0)]),
            Group(vec![]),
            Group(vec![Pt(10.0, -1.25)]),
        ]
    }

    #[test]
    fn test_bbox() {
        let b = bbox(&sample()).unwrap();
        assert_eq!(b, BBox::new(-3.5, -1.25, 10.0, 4.0));
    }

    #[test]
    fn test_bbox_empty() {
        assert!(bbox::<Group>(&[]).is_none());
        assert!(bbox(&[Group(vec![]), Group(vec![])]).is_none());
    }

    #[test]
    fn test_bbox_rotation_order_four() {
        let b = BBox::new(-3.0, 1.5, 7.0, 12.0);
        let four = b.rotate90ccw().rotate90ccw().rotate90ccw().rotate90ccw();
        assert_eq!(four, b);
        let four = b.rotate90cw().rotate90cw().rotate90cw().rotate90cw();
        assert_eq!(four, b);
        assert_eq!(b.rotate90cw().rotate90ccw(), b);
        assert_eq!(b.rotate90ccw().rotate90cw(), b);
    }

    #[test]
    fn test_box_rotation_matches_point_rotation() {
        let mut groups = sample();
        let before = bbox(&groups).unwrap();
        rotate90ccw(&mut groups);
        assert_eq!(bbox(&groups).unwrap(), before.rotate90ccw());

        let mut groups = sample();
        rotate90cw(&mut groups);
        assert_eq!(bbox(&groups).unwrap(), before.rotate90cw());
    }

    #[test]
    fn test_rotate_points() {
        let mut groups = vec![Group(vec![Pt(1.0, 2.0)])];
        rotate90ccw(&mut groups);
        assert_eq!(groups[0].0[0], Pt(-2.0, 1.0));
        rotate90cw(&mut groups);
        assert_eq!(groups[0].0[0], Pt(1.0, 2.0));
    }

    #[test]
    fn test_translate_inverse() {
        let mut groups = sample();
        translate(&mut groups, 2.5, -8.0);
        assert_eq!(groups[0].0[0], Pt(3.5, -6.0));
        translate(&mut groups, -2.5, 8.0);
        assert_eq!(groups, sample());
    }

    #[test]
    fn test_box_translate() {
        let b = BBox::new(0.0, 0.0, 100.0, 50.0).translate(-5.0, 5.0);
        assert_eq!(b, BBox::new(-5.0, 5.0, 95.0, 55.0));
    }

    #[test]
    fn test_contains_inclusive() {
        let b = BBox::new(0.0, 0.0, 10.0, 5.0);
        assert!(b.contains(0.0, 0.0));
        assert!(b.contains(10.0, 5.0));
        assert!(!b.contains(10.01, 2.0));
        assert!(!b.contains(3.0, -0.5));
    }

    #[test]
    fn test_clip_clamp() {
        let b = BBox::new(0.0, 0.0, 5.0, 5.0);
        let mut groups = vec![
            Group(vec![Pt(1.0, 1.0), Pt(7.0, -2.0)]),
            Group(vec![Pt(-1.0, 3.0)]),
        ];
        let affected = clip_to_box(&mut groups, &b, ClipMode::Clamp);
        assert_eq!(affected, 2);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, vec![Pt(1.0, 1.0), Pt(5.0, 0.0)]);
        assert_eq!(groups[1].0, vec![Pt(0.0, 3.0)]);
        for (x, y) in groups.iter().flat_map(|g| g.points()).map(|p| p.position()) {
            assert!(b.contains(x, y));
        }
    }

    #[test]
    fn test_clip_remove_prunes_emptied_groups() {
        let b = BBox::new(0.0, 0.0, 5.0, 5.0);
        let mut groups = vec![
            Group(vec![Pt(1.0, 1.0), Pt(7.0, 2.0)]),
            Group(vec![]),
            Group(vec![Pt(-1.0, 3.0), Pt(9.0, 9.0)]),
        ];
        let affected = clip_to_box(&mut groups, &b, ClipMode::Remove);
        assert_eq!(affected, 3);
        // the pre-existing empty group survives, the emptied one does not
        assert_eq!(groups, vec![Group(vec![Pt(1.0, 1.0)]), Group(vec![])]);
    }

    #[test]
    fn test_clip_inside_untouched() {
        let b = BBox::new(-10.0, -10.0, 10.0, 10.0);
        let mut groups = sample();
        assert_eq!(clip_to_box(&mut groups, &b, ClipMode::default()), 0);
        assert_eq!(groups, sample());
    }

    #[test]
    fn test_pad_and_exceeds() {
        let b = BBox::new(0.0, 0.0, 100.0, 50.0);
        assert_eq!(b.pad(5.0), BBox::new(-5.0, -5.0, 105.0, 55.0));
        assert!(!b.exceeds(&b));
        assert!(BBox::new(0.0, 0.0, 110.0, 10.0).exceeds(&b));
        assert!(!BBox::new(1.0, 1.0, 2.0, 2.0).exceeds(&b));
    }
}
