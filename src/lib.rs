#![forbid(unsafe_code)]

//! Dubins paths restricted to the four circle-straight-circle (CSC) families.
//!
//! # Conventions
//! - Positions and tangents are `glam::DVec2`; angles are radians,
//!   counterclockwise positive.
//! - Tangent vectors are normalized on construction and need not be unit length.
//! - Arc angles are the sweep in the direction of travel, in `[0, 2π)`.
//!
//! A family that cannot bridge its two turning circles (LSR/RSL with the
//! circles closer than two radii) still produces a [`DubinsPath`]. Its tangent
//! points are NaN and [`DubinsPath::is_valid`] reports `false`, so callers can
//! build every family for a pair of poses and filter afterwards.

use core::f64::consts::{FRAC_PI_2, PI, TAU};
use std::fmt;
use std::str::FromStr;

use glam::{DVec2, DVec3};
use log::debug;

/// Result alias for fallible Dubins operations.
pub type Result<T> = std::result::Result<T, DubinsError>;

/// Errors for Dubins path construction.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DubinsError {
    /// Turn direction sign other than `1` or `-1`.
    #[error("invalid turn direction sign: {0}")]
    InvalidDirection(i8),

    /// Path family index outside `0..=3`.
    #[error("invalid path family index: {0}")]
    InvalidFamilyIndex(u8),

    /// Path family name that is not one of LSL, LSR, RSL, RSR.
    #[error("invalid path family name: {0:?}")]
    InvalidFamilyName(String),

    /// Both turning circles share a center, so no straight segment joins them.
    #[error("{family} circle centers coincide (distance {distance:e})")]
    CoincidentCenters {
        /// Family being constructed.
        family: PathFamily,
        /// Measured distance between the centers.
        distance: f64,
    },
}

/// Turn direction along a circular arc.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Direction {
    Clockwise,
    Counterclockwise,
}

impl Direction {
    /// Rotation sign: `+1.0` for counterclockwise, `-1.0` for clockwise.
    pub const fn sign(self) -> f64 {
        match self {
            Direction::Clockwise => -1.0,
            Direction::Counterclockwise => 1.0,
        }
    }
}

impl TryFrom<i8> for Direction {
    type Error = DubinsError;

    fn try_from(sign: i8) -> Result<Self> {
        match sign {
            1 => Ok(Direction::Counterclockwise),
            -1 => Ok(Direction::Clockwise),
            other => Err(DubinsError::InvalidDirection(other)),
        }
    }
}

/// CSC path family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PathFamily {
    /// Left-Straight-Left.
    LSL,
    /// Left-Straight-Right.
    LSR,
    /// Right-Straight-Left.
    RSL,
    /// Right-Straight-Right.
    RSR,
}

impl PathFamily {
    /// All CSC families, in index order.
    pub const ALL: [Self; 4] = [Self::LSL, Self::LSR, Self::RSL, Self::RSR];

    /// Family whose arcs turn in the given directions.
    pub const fn from_directions(initial: Direction, final_: Direction) -> Self {
        match (initial, final_) {
            (Direction::Counterclockwise, Direction::Counterclockwise) => Self::LSL,
            (Direction::Counterclockwise, Direction::Clockwise) => Self::LSR,
            (Direction::Clockwise, Direction::Counterclockwise) => Self::RSL,
            (Direction::Clockwise, Direction::Clockwise) => Self::RSR,
        }
    }

    /// Turn directions of the initial and final arcs.
    pub const fn directions(self) -> (Direction, Direction) {
        match self {
            Self::LSL => (Direction::Counterclockwise, Direction::Counterclockwise),
            Self::LSR => (Direction::Counterclockwise, Direction::Clockwise),
            Self::RSL => (Direction::Clockwise, Direction::Counterclockwise),
            Self::RSR => (Direction::Clockwise, Direction::Clockwise),
        }
    }

    pub const fn initial_direction(self) -> Direction {
        self.directions().0
    }

    pub const fn final_direction(self) -> Direction {
        self.directions().1
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::LSL => "LSL",
            Self::LSR => "LSR",
            Self::RSL => "RSL",
            Self::RSR => "RSR",
        }
    }
}

impl fmt::Display for PathFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u8> for PathFamily {
    type Error = DubinsError;

    fn try_from(index: u8) -> Result<Self> {
        Self::ALL
            .get(usize::from(index))
            .copied()
            .ok_or(DubinsError::InvalidFamilyIndex(index))
    }
}

impl FromStr for PathFamily {
    type Err = DubinsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LSL" => Ok(Self::LSL),
            "LSR" => Ok(Self::LSR),
            "RSL" => Ok(Self::RSL),
            "RSR" => Ok(Self::RSR),
            _ => Err(DubinsError::InvalidFamilyName(s.to_string())),
        }
    }
}

/// Maps an (initial, final) turn direction pair to its family.
pub const fn family_from_directions(initial: Direction, final_: Direction) -> PathFamily {
    PathFamily::from_directions(initial, final_)
}

/// Maps a family back to its (initial, final) turn directions.
pub const fn directions_from_family(family: PathFamily) -> (Direction, Direction) {
    family.directions()
}

/// Numeric tolerances used during construction and measurement.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Tolerances {
    /// Vectors with a norm at or below this normalize to zero.
    pub zero_norm: f64,
    /// Centers closer than this, scaled by `max(radius, 1)`, count as coincident.
    pub coincident_centers: f64,
    /// Wrapped arc angles within this of `2π` snap to zero.
    pub angle: f64,
    /// Crossing-tangent ratios `2r/d` up to `1 + tangency` count as touching circles.
    pub tangency: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            zero_norm: 1e-9,
            coincident_centers: 1e-9,
            angle: 1e-9,
            tangency: 1e-9,
        }
    }
}

/// A position with a heading given as a tangent vector.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Pose {
    pub position: DVec2,
    pub tangent: DVec2,
}

impl Pose {
    pub const fn new(position: DVec2, tangent: DVec2) -> Self {
        Self { position, tangent }
    }
}

/// A CSC Dubins path between two oriented poses.
///
/// Centers and tangent points are derived once on construction; arc angles
/// and lengths are computed from them on access.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DubinsPath {
    family: PathFamily,
    radius: f64,
    initial_position: DVec2,
    initial_tangent: DVec2,
    final_position: DVec2,
    final_tangent: DVec2,
    initial_center: DVec2,
    final_center: DVec2,
    initial_tangent_position: DVec2,
    final_tangent_position: DVec2,
    tolerances: Tolerances,
}

impl DubinsPath {
    /// Builds a path of the given family with default tolerances.
    ///
    /// Fails only when the two turning circles share a center. Infeasible
    /// LSR/RSL geometry yields an invalid path instead of an error.
    pub fn new(
        family: PathFamily,
        radius: f64,
        initial_position: DVec2,
        initial_tangent: DVec2,
        final_position: DVec2,
        final_tangent: DVec2,
    ) -> Result<Self> {
        Self::with_tolerances(
            family,
            radius,
            initial_position,
            initial_tangent,
            final_position,
            final_tangent,
            Tolerances::default(),
        )
    }

    /// Builds a path of the given family with explicit tolerances.
    pub fn with_tolerances(
        family: PathFamily,
        radius: f64,
        initial_position: DVec2,
        initial_tangent: DVec2,
        final_position: DVec2,
        final_tangent: DVec2,
        tolerances: Tolerances,
    ) -> Result<Self> {
        let initial_tangent = normalize_with(initial_tangent, &tolerances);
        let final_tangent = normalize_with(final_tangent, &tolerances);

        let (initial_direction, final_direction) = family.directions();
        let initial_center =
            compute_center(initial_position, initial_tangent, radius, initial_direction);
        let final_center = compute_center(final_position, final_tangent, radius, final_direction);

        let (initial_tangent_position, final_tangent_position) = compute_tangent_positions_with(
            initial_center,
            final_center,
            radius,
            family,
            &tolerances,
        )?;

        Ok(Self {
            family,
            radius,
            initial_position,
            initial_tangent,
            final_position,
            final_tangent,
            initial_center,
            final_center,
            initial_tangent_position,
            final_tangent_position,
            tolerances,
        })
    }

    /// A path of the given family with NaN radius and NaN geometry.
    pub fn invalid(family: PathFamily) -> Self {
        Self {
            family,
            radius: f64::NAN,
            initial_position: DVec2::NAN,
            initial_tangent: DVec2::NAN,
            final_position: DVec2::NAN,
            final_tangent: DVec2::NAN,
            initial_center: DVec2::NAN,
            final_center: DVec2::NAN,
            initial_tangent_position: DVec2::NAN,
            final_tangent_position: DVec2::NAN,
            tolerances: Tolerances::default(),
        }
    }

    /// Builds one path per family, in [`PathFamily::ALL`] order.
    ///
    /// Families whose circles coincide are replaced by [`DubinsPath::invalid`].
    pub fn all_families(
        radius: f64,
        initial_position: DVec2,
        initial_tangent: DVec2,
        final_position: DVec2,
        final_tangent: DVec2,
    ) -> [Self; 4] {
        PathFamily::ALL.map(|family| {
            Self::new(
                family,
                radius,
                initial_position,
                initial_tangent,
                final_position,
                final_tangent,
            )
            .unwrap_or_else(|err| {
                debug!("{err}; using invalid {family} path");
                Self::invalid(family)
            })
        })
    }

    pub fn family(&self) -> PathFamily {
        self.family
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn initial_position(&self) -> DVec2 {
        self.initial_position
    }

    /// Unit tangent at the initial pose.
    pub fn initial_tangent(&self) -> DVec2 {
        self.initial_tangent
    }

    pub fn final_position(&self) -> DVec2 {
        self.final_position
    }

    /// Unit tangent at the final pose.
    pub fn final_tangent(&self) -> DVec2 {
        self.final_tangent
    }

    pub fn initial_direction(&self) -> Direction {
        self.family.initial_direction()
    }

    pub fn final_direction(&self) -> Direction {
        self.family.final_direction()
    }

    /// Center of the initial turning circle.
    pub fn initial_center(&self) -> DVec2 {
        self.initial_center
    }

    /// Center of the final turning circle.
    pub fn final_center(&self) -> DVec2 {
        self.final_center
    }

    /// Point where the initial arc hands off to the straight segment.
    pub fn initial_tangent_position(&self) -> DVec2 {
        self.initial_tangent_position
    }

    /// Point where the straight segment hands off to the final arc.
    pub fn final_tangent_position(&self) -> DVec2 {
        self.final_tangent_position
    }

    /// Sweep from the initial pose to the initial tangent point, in `[0, 2π)`.
    pub fn initial_arc_angle(&self) -> f64 {
        let angle = relative_azimuth(
            self.initial_position,
            self.initial_tangent_position,
            self.initial_center,
        );
        wrap_arc_angle(self.initial_direction().sign() * angle, self.tolerances.angle)
    }

    /// Sweep from the final tangent point to the final pose, in `[0, 2π)`.
    pub fn final_arc_angle(&self) -> f64 {
        let angle = relative_azimuth(
            self.final_tangent_position,
            self.final_position,
            self.final_center,
        );
        wrap_arc_angle(self.final_direction().sign() * angle, self.tolerances.angle)
    }

    pub fn initial_arc_length(&self) -> f64 {
        self.radius * self.initial_arc_angle()
    }

    pub fn final_arc_length(&self) -> f64 {
        self.radius * self.final_arc_angle()
    }

    pub fn straight_length(&self) -> f64 {
        self.initial_tangent_position
            .distance(self.final_tangent_position)
    }

    pub fn total_length(&self) -> f64 {
        self.initial_arc_length() + self.straight_length() + self.final_arc_length()
    }

    /// True when the total length is finite and non-negative.
    pub fn is_valid(&self) -> bool {
        let length = self.total_length();
        length.is_finite() && length >= 0.0
    }

    /// Pose reached after travelling `distance` along the path.
    ///
    /// The distance is clamped to `[0, total_length]`. Returns `None` for
    /// invalid paths or a NaN distance.
    pub fn sample(&self, distance: f64) -> Option<Pose> {
        if !self.is_valid() || distance.is_nan() {
            return None;
        }

        let initial_arc = self.initial_arc_length();
        let straight = self.straight_length();
        let mut remaining = distance.clamp(0.0, self.total_length());

        if remaining <= initial_arc {
            return Some(self.arc_pose(
                self.initial_center,
                self.initial_position,
                self.initial_tangent,
                self.initial_direction(),
                remaining,
            ));
        }
        remaining -= initial_arc;

        let heading = self.straight_heading();
        if remaining <= straight {
            return Some(Pose::new(
                self.initial_tangent_position + heading * remaining,
                heading,
            ));
        }
        remaining -= straight;

        Some(self.arc_pose(
            self.final_center,
            self.final_tangent_position,
            heading,
            self.final_direction(),
            remaining,
        ))
    }

    /// Upper bound on the number of poses [`DubinsPath::sample_many`] produces.
    pub const MAX_SAMPLES: usize = 1 << 20;

    /// Poses every `step` units along the path, ending with the final pose.
    ///
    /// Returns an empty vector for invalid paths, for a non-positive or
    /// non-finite `step`, and when `step` would yield more than
    /// [`DubinsPath::MAX_SAMPLES`] poses.
    pub fn sample_many(&self, step: f64) -> Vec<Pose> {
        if !(step.is_finite() && step > 0.0) || !self.is_valid() {
            return Vec::new();
        }

        let total = self.total_length();
        if total / step >= Self::MAX_SAMPLES as f64 {
            debug!(
                "{} path of length {total:.6} needs more than {} samples at step {step:e}",
                self.family,
                Self::MAX_SAMPLES
            );
            return Vec::new();
        }
        let count = (total / step).ceil() as usize;
        let mut poses: Vec<Pose> = (0..count)
            .filter_map(|i| self.sample(i as f64 * step))
            .collect();
        poses.extend(self.sample(total));
        poses
    }

    fn arc_pose(
        &self,
        center: DVec2,
        start: DVec2,
        start_tangent: DVec2,
        direction: Direction,
        arc_length: f64,
    ) -> Pose {
        if arc_length <= 0.0 {
            return Pose::new(start, start_tangent);
        }
        let angle = direction.sign() * arc_length / self.radius;
        Pose::new(
            center + rotate(start - center, angle),
            rotate(start_tangent, angle),
        )
    }

    // Heading of the straight segment; falls back to the heading at the end of
    // the initial arc when the tangent points coincide.
    fn straight_heading(&self) -> DVec2 {
        let chord = self.final_tangent_position - self.initial_tangent_position;
        let length = chord.length();
        if length <= self.tolerances.zero_norm {
            let sweep = self.initial_direction().sign() * self.initial_arc_angle();
            rotate(self.initial_tangent, sweep)
        } else {
            chord / length
        }
    }
}

impl fmt::Display for DubinsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Dubins Path: ", self.family)?;
        if self.is_valid() {
            write!(
                f,
                "L={:.2}, a1={:.0}°, a2={:.0}°",
                self.total_length(),
                self.initial_arc_angle().to_degrees(),
                self.final_arc_angle().to_degrees(),
            )
        } else {
            f.write_str("INVALID")
        }
    }
}

/// Point at `radius` from `center` in the direction `angle`.
pub fn polar_to_cartesian(center: DVec2, radius: f64, angle: f64) -> DVec2 {
    center + radius * DVec2::from_angle(angle)
}

/// Rotates `v` counterclockwise by `angle`.
pub fn rotate(v: DVec2, angle: f64) -> DVec2 {
    DVec2::from_angle(angle).rotate(v)
}

/// Unit vector along `v`, or zero when `v` is within the default tolerance of zero.
pub fn normalize(v: DVec2) -> DVec2 {
    normalize_with(v, &Tolerances::default())
}

/// Unit vector along `v`, or zero when its norm is at most `tolerances.zero_norm`.
pub fn normalize_with(v: DVec2, tolerances: &Tolerances) -> DVec2 {
    let norm = v.length();
    if norm <= tolerances.zero_norm {
        return DVec2::ZERO;
    }
    v / norm
}

/// Signed angle at `center` from the direction of `from` to the direction of `to`.
///
/// The result is a plain difference of `atan2` values and is not wrapped.
pub fn relative_azimuth(from: DVec2, to: DVec2, center: DVec2) -> f64 {
    let from = from - center;
    let to = to - center;
    to.y.atan2(to.x) - from.y.atan2(from.x)
}

/// Center of the turning circle through `position` with the given tangent.
///
/// Counterclockwise turns put the center on the left of the tangent,
/// clockwise turns on the right. A zero tangent returns `position`.
pub fn compute_center(
    position: DVec2,
    tangent_unit: DVec2,
    radius: f64,
    direction: Direction,
) -> DVec2 {
    let radial = tangent_unit.extend(0.0).cross(DVec3::Z).truncate();
    position - direction.sign() * radius * radial
}

/// Tangent points of the straight segment joining two turning circles.
pub fn compute_tangent_positions(
    initial_center: DVec2,
    final_center: DVec2,
    radius: f64,
    family: PathFamily,
) -> Result<(DVec2, DVec2)> {
    compute_tangent_positions_with(
        initial_center,
        final_center,
        radius,
        family,
        &Tolerances::default(),
    )
}

/// Tangent points of the straight segment joining two turning circles, with explicit tolerances.
pub fn compute_tangent_positions_with(
    initial_center: DVec2,
    final_center: DVec2,
    radius: f64,
    family: PathFamily,
    tolerances: &Tolerances,
) -> Result<(DVec2, DVec2)> {
    let offset = final_center - initial_center;
    let distance = offset.length();

    if distance <= tolerances.coincident_centers * radius.abs().max(1.0) {
        return Err(DubinsError::CoincidentCenters { family, distance });
    }

    let (initial_azimuth, final_azimuth) = match family {
        // Outer tangent below the line of centers.
        PathFamily::LSL => (-FRAC_PI_2, -FRAC_PI_2),
        // Outer tangent above the line of centers.
        PathFamily::RSR => (FRAC_PI_2, FRAC_PI_2),
        PathFamily::LSR => {
            let belt = belt_azimuth(radius, distance, family, tolerances);
            (-belt, PI - belt)
        }
        PathFamily::RSL => {
            let belt = belt_azimuth(radius, distance, family, tolerances);
            (belt, -PI + belt)
        }
    };

    let offset_unit = offset / distance;
    Ok((
        initial_center + radius * rotate(offset_unit, initial_azimuth),
        final_center + radius * rotate(offset_unit, final_azimuth),
    ))
}

// Angle between the line of centers and the radius to a crossing tangent
// point. NaN when the circles are closer than two radii.
fn belt_azimuth(
    radius: f64,
    distance: f64,
    family: PathFamily,
    tolerances: &Tolerances,
) -> f64 {
    let ratio = 2.0 * radius / distance;
    if ratio > 1.0 && ratio <= 1.0 + tolerances.tangency {
        return 0.0;
    }
    if ratio > 1.0 {
        debug!(
            "{family} infeasible: centers {distance:.6} apart, crossing tangent needs {:.6}",
            2.0 * radius
        );
    }
    ratio.acos()
}

fn wrap_arc_angle(angle: f64, tolerance: f64) -> f64 {
    let wrapped = angle.rem_euclid(TAU);
    if wrapped >= TAU - tolerance {
        0.0
    } else {
        wrapped
    }
}
