use serde::{Deserialize, Serialize};

pub type AlignmentResult<T> = core::result::Result<T, AlignmentError>;

/// Below this, the centered source points carry no usable spatial spread.
const DEGENERATE_EPSILON: f64 = 1e-9;

pub const KEYPOINTS_COUNT: usize = 4;

/// ArcFace canonical landmarks for a 112x112 crop: left eye, right eye, nose tip, mouth center.
pub const REFERENCE_TEMPLATE: KeypointSet = KeypointSet([
    Point { x: 38.2946, y: 51.6963 },
    Point { x: 73.5318, y: 51.5014 },
    Point { x: 56.0252, y: 71.7366 },
    Point { x: 56.1396, y: 92.2048 },
]);

#[derive(Debug, Serialize, strum_macros::AsRefStr)]
pub enum AlignmentError {
    DegenerateInput,
    InsufficientKeypoints(usize),
}

// region:    --- Error Boilerplate

impl core::fmt::Display for AlignmentError {
	fn fmt(
		&self,
		fmt: &mut core::fmt::Formatter,
	) -> core::result::Result<(), core::fmt::Error> {
		write!(fmt, "{self:?}")
	}
}

impl std::error::Error for AlignmentError {}

// endregion: --- Error Boilerplate

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Exactly four landmarks, positionally matched to the reference roles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeypointSet([Point; KEYPOINTS_COUNT]);

impl KeypointSet {
    #[cfg(test)]
    pub fn new(points: [Point; KEYPOINTS_COUNT]) -> Self {
        Self(points)
    }

    /// Detectors can return extra landmarks (ears, mouth corners): only the first four carry the roles we align on.
    pub fn from_points(points: &[Point]) -> AlignmentResult<Self> {
        if points.len() < KEYPOINTS_COUNT {
            return Err(AlignmentError::InsufficientKeypoints(points.len()));
        }
        Ok(Self([points[0], points[1], points[2], points[3]]))
    }

    #[cfg(test)]
    pub fn points(&self) -> &[Point; KEYPOINTS_COUNT] {
        &self.0
    }

    fn centroid(&self) -> Point {
        let (sum_x, sum_y) = self.0.iter().fold((0.0, 0.0), |(x, y), p| (x + p.x, y + p.y));
        Point::new(sum_x / KEYPOINTS_COUNT as f64, sum_y / KEYPOINTS_COUNT as f64)
    }
}

/// Uniform scale + rotation + translation, stored as the 2x3 matrix `[a, -b, tx; b, a, ty]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityTransform {
    pub a: f64,
    pub b: f64,
    pub tx: f64,
    pub ty: f64,
}

impl SimilarityTransform {
    #[cfg(test)]
    pub fn identity() -> Self {
        Self { a: 1.0, b: 0.0, tx: 0.0, ty: 0.0 }
    }

    #[cfg(test)]
    pub fn from_parts(scale: f64, rotation: f64, tx: f64, ty: f64) -> Self {
        Self { a: scale * rotation.cos(), b: scale * rotation.sin(), tx, ty }
    }

    pub fn apply(&self, point: &Point) -> Point {
        Point::new(
            self.a * point.x - self.b * point.y + self.tx,
            self.b * point.x + self.a * point.y + self.ty,
        )
    }

    pub fn matrix(&self) -> [[f64; 3]; 2] {
        [[self.a, -self.b, self.tx], [self.b, self.a, self.ty]]
    }

    pub fn scale(&self) -> f64 {
        self.a.hypot(self.b)
    }

    pub fn rotation(&self) -> f64 {
        self.b.atan2(self.a)
    }

    pub fn is_invertible(&self) -> bool {
        self.a * self.a + self.b * self.b > f64::EPSILON
    }

    /// Maps canonical coordinates back into the source. `None` when the transform collapses the plane.
    pub fn inverse(&self) -> Option<SimilarityTransform> {
        if !self.is_invertible() {
            return None;
        }
        let norm = self.a * self.a + self.b * self.b;
        let a = self.a / norm;
        let b = -self.b / norm;
        Some(SimilarityTransform {
            a,
            b,
            tx: -(a * self.tx - b * self.ty),
            ty: -(b * self.tx + a * self.ty),
        })
    }
}

/// Closed-form least-squares similarity fit mapping `src` onto `reference`.
pub fn estimate(src: &KeypointSet, reference: &KeypointSet) -> AlignmentResult<SimilarityTransform> {
    if src.0.iter().chain(reference.0.iter()).any(|p| !p.is_finite()) {
        return Err(AlignmentError::DegenerateInput);
    }
    let src_centroid = src.centroid();
    let dst_centroid = reference.centroid();

    let mut denom = 0.0;
    let mut a_num = 0.0;
    let mut b_num = 0.0;
    for (s, d) in src.0.iter().zip(reference.0.iter()) {
        let (sx, sy) = (s.x - src_centroid.x, s.y - src_centroid.y);
        let (dx, dy) = (d.x - dst_centroid.x, d.y - dst_centroid.y);
        denom += sx * sx + sy * sy;
        a_num += sx * dx + sy * dy;
        b_num += sx * dy - sy * dx;
    }
    if denom < DEGENERATE_EPSILON {
        return Err(AlignmentError::DegenerateInput);
    }

    let a = a_num / denom;
    let b = b_num / denom;
    let tx = dst_centroid.x - (a * src_centroid.x - b * src_centroid.y);
    let ty = dst_centroid.y - (b * src_centroid.x + a * src_centroid.y);
    Ok(SimilarityTransform { a, b, tx, ty })
}
