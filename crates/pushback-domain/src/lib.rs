//! # Tug Pushback - Domain Model
//!
//! Value objects, enums and errors shared by the tug simulation, the
//! synchronization protocol and the host shim. Planar coordinates are in
//! meters with `x` pointing east and `y` pointing north. Headings are
//! simulator degrees: 0 is north, increasing clockwise.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Mul, Sub};

// =============================================================================
// GEOMETRY
// =============================================================================

/// Planar vector / position
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Unit vector pointing along a heading.
    #[must_use]
    pub fn from_hdg(hdg: f64) -> Self {
        let rad = hdg.to_radians();
        Self::new(rad.sin(), rad.cos())
    }

    #[must_use]
    pub fn abs(self) -> f64 {
        self.x.hypot(self.y)
    }

    #[must_use]
    pub fn dot(self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Z component of the 3-D cross product. Positive when `other` lies
    /// counter-clockwise (to the left) of `self`.
    #[must_use]
    pub fn cross(self, other: Self) -> f64 {
        self.x * other.y - self.y * other.x
    }

    #[must_use]
    pub fn dist(self, other: Self) -> f64 {
        (other - self).abs()
    }

    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Vec2 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

/// Wrap a heading into [0, 360)
#[must_use]
pub fn normalize_hdg(hdg: f64) -> f64 {
    let h = hdg.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if h >= 360.0 { 0.0 } else { h }
}

/// Signed angular difference from `from` to `to`, in (-180, 180].
/// Positive means `to` lies clockwise of `from`.
#[must_use]
pub fn rel_hdg(from: f64, to: f64) -> f64 {
    let d = (to - from).rem_euclid(360.0);
    if d > 180.0 { d - 360.0 } else { d }
}

/// Heading of the line from `from` to `to`. `None` for coincident points.
#[must_use]
pub fn bearing(from: Vec2, to: Vec2) -> Option<f64> {
    let d = to - from;
    if d.abs() < f64::EPSILON {
        return None;
    }
    Some(normalize_hdg(d.x.atan2(d.y).to_degrees()))
}

// =============================================================================
// VEHICLE STATE
// =============================================================================

/// Position and heading of a vehicle
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VehiclePose {
    pub pos: Vec2,
    pub hdg: f64,
}

impl VehiclePose {
    #[must_use]
    pub fn new(pos: Vec2, hdg: f64) -> Self {
        Self {
            pos,
            hdg: normalize_hdg(hdg),
        }
    }
}

/// Steering angle and the last heading mismatch the follower computed
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SteeringState {
    /// Current road-wheel angle in degrees, positive steers right
    pub angle: f64,
    /// Signed mismatch in degrees fed to the steering law on the last tick
    pub last_mis_hdg: f64,
}

/// Direction of travel along a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    #[default]
    Forward,
    Reverse,
}

impl Direction {
    /// Heading of motion for a vehicle facing `hdg`.
    #[must_use]
    pub fn travel_hdg(self, hdg: f64) -> f64 {
        match self {
            Self::Forward => normalize_hdg(hdg),
            Self::Reverse => normalize_hdg(hdg + 180.0),
        }
    }

    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Forward => Self::Reverse,
            Self::Reverse => Self::Forward,
        }
    }

    /// Sign applied to speed and steering.
    #[must_use]
    pub const fn sign(self) -> f64 {
        match self {
            Self::Forward => 1.0,
            Self::Reverse => -1.0,
        }
    }
}

/// Aircraft weight class, used to scale tug behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WeightClass {
    Light,
    Medium,
    Heavy,
}

impl WeightClass {
    /// Classify by maximum takeoff weight in kg.
    #[must_use]
    pub fn from_mtow(mtow_kg: f64) -> Self {
        if mtow_kg < 30_000.0 {
            Self::Light
        } else if mtow_kg < 150_000.0 {
            Self::Medium
        } else {
            Self::Heavy
        }
    }

    /// Fraction of the tug's top speed allowed when towing this class.
    #[must_use]
    pub const fn speed_factor(self) -> f64 {
        match self {
            Self::Light => 1.0,
            Self::Medium => 0.8,
            Self::Heavy => 0.6,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Light => "LIGHT",
            Self::Medium => "MEDIUM",
            Self::Heavy => "HEAVY",
        }
    }
}

// =============================================================================
// PATH SEGMENTS
// =============================================================================

/// One primitive motion of a pushback plan
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PathSegment {
    /// Straight run to `dst`; the heading is implied by the segment's start.
    Straight { dst: Vec2, direction: Direction },
    /// Turn ending at `dst` with the vehicle facing `hdg`.
    Turn {
        dst: Vec2,
        hdg: f64,
        direction: Direction,
    },
}

impl PathSegment {
    #[must_use]
    pub fn straight(dst: Vec2) -> Self {
        Self::Straight {
            dst,
            direction: Direction::Forward,
        }
    }

    #[must_use]
    pub fn turn(dst: Vec2, hdg: f64) -> Self {
        Self::Turn {
            dst,
            hdg: normalize_hdg(hdg),
            direction: Direction::Forward,
        }
    }

    /// Same segment driven in reverse.
    #[must_use]
    pub fn reversed(self) -> Self {
        match self {
            Self::Straight { dst, .. } => Self::Straight {
                dst,
                direction: Direction::Reverse,
            },
            Self::Turn { dst, hdg, .. } => Self::Turn {
                dst,
                hdg,
                direction: Direction::Reverse,
            },
        }
    }

    #[must_use]
    pub const fn dst(&self) -> Vec2 {
        match self {
            Self::Straight { dst, .. } | Self::Turn { dst, .. } => *dst,
        }
    }

    #[must_use]
    pub const fn direction(&self) -> Direction {
        match self {
            Self::Straight { direction, .. } | Self::Turn { direction, .. } => *direction,
        }
    }

    /// Validate coordinates before a plan is accepted.
    pub fn validate(&self) -> Result<()> {
        let hdg_ok = match self {
            Self::Straight { .. } => true,
            Self::Turn { hdg, .. } => hdg.is_finite(),
        };
        if self.dst().is_finite() && hdg_ok {
            Ok(())
        } else {
            Err(PushbackError::InvalidPlan(format!(
                "non-finite segment geometry: {self:?}"
            )))
        }
    }
}

// =============================================================================
// SYNCHRONIZATION
// =============================================================================

/// Role of this instance in a paired session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncRole {
    /// No partner detected
    #[default]
    Off,
    /// A remote master controls the operation
    Slave,
    /// This instance is authoritative
    Master,
}

/// Partner-role indicator published by the external sync add-on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PartnerIndicator {
    Disconnected,
    /// The remote instance is master, so we are its slave
    RemoteMaster,
    /// Connected and the remote instance defers to us
    RemoteSlave,
}

impl PartnerIndicator {
    /// Decode the add-on's raw integer state (0 off, 1 slave, 2 master).
    #[must_use]
    pub const fn from_raw(raw: i32) -> Self {
        match raw {
            1 => Self::RemoteMaster,
            2 => Self::RemoteSlave,
            _ => Self::Disconnected,
        }
    }
}

/// Maximum mirrored length of a tug name, in bytes
pub const TUG_NAME_MAX: usize = 63;

/// Name of the selected tug model, bounded for mirroring
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TugName(String);

impl TugName {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.len() > TUG_NAME_MAX {
            return Err(PushbackError::ConsistencyViolation(format!(
                "tug name '{name}' exceeds {TUG_NAME_MAX} bytes"
            )));
        }
        Ok(Self(name))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

impl TryFrom<String> for TugName {
    type Error = PushbackError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<TugName> for String {
    fn from(value: TugName) -> Self {
        value.0
    }
}

impl fmt::Display for TugName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Kind of asset a tug needs at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetKind {
    Object,
    Sound,
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object => f.write_str("object"),
            Self::Sound => f.write_str("sound"),
        }
    }
}

/// Pushback errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PushbackError {
    #[error("Failed to load {kind} asset '{name}'")]
    Resource { kind: AssetKind, name: String },

    #[error("Consistency violation: {0}")]
    ConsistencyViolation(String),

    #[error("No tug available for MTOW {mtow} kg and nose gear length {ng_len} m")]
    NoTugAvailable { mtow: f64, ng_len: f64 },

    #[error("Invalid pushback plan: {0}")]
    InvalidPlan(String),
}

pub type Result<T> = std::result::Result<T, PushbackError>;
