//! Segment follower: drives the tug along an ordered queue of path segments.
//!
//! Each segment is tracked as a reference line ending at the segment's
//! destination and pointing along the final travel heading. Turns first
//! follow a fitted arc with steering feed-forward, then hand over to the
//! line once aligned. Steering is a proportional law on heading error plus
//! a cross-track correction. A segment is complete once the tug is within
//! the heading tolerance and either within the arrival radius of the
//! destination or just past it with no more than that radius of side
//! offset. A tug that passes the destination out of tolerance backs up
//! along the reference line and approaches again.

use std::collections::VecDeque;

use pushback_domain::{Direction, PathSegment, Vec2, VehiclePose, bearing, normalize_hdg, rel_hdg};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::kinematics::VehicleParams;

/// Follower state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FollowerState {
    Idle,
    Tracking,
    Arrived,
    Done,
}

/// Control law tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FollowerConfig {
    /// Degrees of steering per degree of heading mismatch
    pub steer_gain: f64,
    /// Cross-track gain (1/s)
    pub cross_track_gain: f64,
    /// Keeps the cross-track term finite at low speed (m/s)
    pub speed_softening: f64,
    /// Arrival radius in meters
    pub pos_tolerance: f64,
    /// Arrival heading tolerance in degrees
    pub hdg_tolerance: f64,
    /// Speed floor while tracking, so arrival never stalls
    pub min_speed: f64,
    /// Run-up behind the destination when backing off for another
    /// approach, in meters, plus twice the side offset at the time
    pub reapproach_dist: f64,
    /// Approaches after which a pass is accepted out of tolerance
    pub max_reapproaches: u32,
}

impl Default for FollowerConfig {
    fn default() -> Self {
        Self {
            steer_gain: 1.5,
            cross_track_gain: 0.5,
            speed_softening: 1.0,
            pos_tolerance: 0.3,
            hdg_tolerance: 3.0,
            min_speed: 0.3,
            reapproach_dist: 6.0,
            max_reapproaches: 3,
        }
    }
}

/// Steering command for a heading mismatch: proportional, clamped to the lock.
#[must_use]
pub fn steering_law(mis_hdg: f64, gain: f64, max_steer: f64) -> f64 {
    (mis_hdg * gain).clamp(-max_steer, max_steer)
}

/// Per-tick output consumed by the tug
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FollowerOutput {
    /// Target steering angle in degrees
    pub steer: f64,
    /// Signed target speed in m/s (negative when reversing)
    pub speed: f64,
    /// Heading mismatch fed to the steering law
    pub mis_hdg: f64,
    /// Segments completed during this tick
    pub arrived: usize,
    /// True on the single tick where the queue was exhausted
    pub finished: bool,
}

/// Circular arc fitted to a turn segment
#[derive(Debug, Clone, Copy)]
struct Arc {
    center: Vec2,
    radius: f64,
    /// Clockwise (right-hand) turn in the travel frame
    cw: bool,
}

impl Arc {
    /// Fit the arc tangent to `start_hdg` at `start` that passes through
    /// `dst`. Rejected when its end tangent disagrees with `end_hdg`.
    fn fit(start: Vec2, start_hdg: f64, dst: Vec2, end_hdg: f64) -> Option<Self> {
        let chord = dst - start;
        let lateral = Vec2::from_hdg(start_hdg).cross(chord);
        if lateral.abs() < 1e-3 {
            return None;
        }
        let radius = chord.dot(chord) / (2.0 * lateral.abs());
        let cw = lateral < 0.0;
        let side = if cw { 90.0 } else { -90.0 };
        let arc = Self {
            center: start + Vec2::from_hdg(start_hdg + side) * radius,
            radius,
            cw,
        };
        let end_tangent = arc.tangent_hdg(dst)?;
        (rel_hdg(end_tangent, end_hdg).abs() <= 30.0).then_some(arc)
    }

    fn tangent_hdg(&self, pos: Vec2) -> Option<f64> {
        let side = if self.cw { 90.0 } else { -90.0 };
        bearing(self.center, pos).map(|b| normalize_hdg(b + side))
    }

    /// Positive when `pos` is left of the arc's direction of travel.
    fn offset(&self, pos: Vec2) -> f64 {
        let e = self.center.dist(pos) - self.radius;
        if self.cw { e } else { -e }
    }

    fn feed_forward(&self, wheelbase: f64) -> f64 {
        let steer = (wheelbase / self.radius).atan().to_degrees();
        if self.cw { steer } else { -steer }
    }
}

#[derive(Debug, Clone, Copy)]
struct ActiveSegment {
    seg: PathSegment,
    /// Final travel heading; `None` marks a zero-length segment
    line_hdg: Option<f64>,
    /// Arc followed until the tug is aligned with `line_hdg`
    arc: Option<Arc>,
    /// Back-off point while reversing for another approach
    backoff: Option<Vec2>,
    reapproaches: u32,
}

impl ActiveSegment {
    fn activate(seg: PathSegment, pose: &VehiclePose) -> Self {
        let start = pose.pos;
        let degenerate = start.dist(seg.dst()) < 1e-6;
        let line_hdg = if degenerate {
            None
        } else {
            match seg {
                PathSegment::Straight { dst, .. } => bearing(start, dst),
                PathSegment::Turn { hdg, direction, .. } => Some(direction.travel_hdg(hdg)),
            }
        };
        let arc = match (seg, line_hdg) {
            (PathSegment::Turn { dst, direction, .. }, Some(end_hdg)) => {
                Arc::fit(start, direction.travel_hdg(pose.hdg), dst, end_hdg)
            }
            _ => None,
        };
        Self {
            seg,
            line_hdg,
            arc,
            backoff: None,
            reapproaches: 0,
        }
    }
}

/// Guidance computed against the active segment
struct Guidance {
    mis_hdg: f64,
    hdg_err: f64,
    dist: f64,
    /// Distance still to go along the reference line
    along: f64,
    /// Side offset from the reference line, positive to the left
    lateral: f64,
}

/// Drives a queue of segments to completion
#[derive(Debug, Clone)]
pub struct SegmentFollower {
    config: FollowerConfig,
    queue: VecDeque<PathSegment>,
    active: Option<ActiveSegment>,
    state: FollowerState,
    stop_requested: bool,
    last_steer: f64,
    last_mis_hdg: f64,
    completed: usize,
}

impl SegmentFollower {
    pub fn new(config: FollowerConfig) -> Self {
        Self {
            config,
            queue: VecDeque::new(),
            active: None,
            state: FollowerState::Idle,
            stop_requested: false,
            last_steer: 0.0,
            last_mis_hdg: 0.0,
            completed: 0,
        }
    }

    pub fn state(&self) -> FollowerState {
        self.state
    }

    pub fn config(&self) -> &FollowerConfig {
        &self.config
    }

    /// True while idle or finished.
    pub fn is_idle(&self) -> bool {
        matches!(self.state, FollowerState::Idle | FollowerState::Done)
    }

    /// Segments still to drive, including the active one.
    pub fn remaining(&self) -> usize {
        self.queue.len() + usize::from(self.active.is_some())
    }

    /// Total segments completed since creation.
    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn last_mis_hdg(&self) -> f64 {
        self.last_mis_hdg
    }

    /// Where the last queued segment ends.
    fn tail(&self, pose: &VehiclePose) -> Vec2 {
        self.queue
            .back()
            .or(self.active.as_ref().map(|a| &a.seg))
            .map_or(pose.pos, PathSegment::dst)
    }

    /// Segment being driven right now.
    pub fn active_segment(&self) -> Option<PathSegment> {
        self.active.map(|a| a.seg)
    }

    /// Segment most recently queued (what the follower is heading toward last).
    pub fn last_segment(&self) -> Option<PathSegment> {
        self.queue
            .back()
            .copied()
            .or(self.active.map(|a| a.seg))
    }

    /// Queue a drive to `dst`, arriving facing `hdg`. A straight run is used
    /// when `hdg` already matches the bearing to `dst`, a turn otherwise.
    pub fn drive2point(&mut self, pose: &VehiclePose, dst: Vec2, hdg: f64) {
        let from = self.tail(pose);
        let seg = match bearing(from, dst) {
            Some(brg) if rel_hdg(brg, hdg).abs() > self.config.hdg_tolerance => {
                PathSegment::turn(dst, hdg)
            }
            _ => PathSegment::straight(dst),
        };
        self.push(pose, seg);
    }

    /// Append one segment to the queue.
    pub fn push(&mut self, pose: &VehiclePose, seg: PathSegment) {
        self.queue.push_back(seg);
        if self.is_idle() {
            self.stop_requested = false;
            self.state = FollowerState::Tracking;
            self.activate_next(pose);
        }
    }

    /// Replace the queue with a new plan.
    pub fn set_segments(&mut self, pose: &VehiclePose, segs: impl IntoIterator<Item = PathSegment>) {
        self.queue = segs.into_iter().collect();
        self.active = None;
        self.stop_requested = false;
        if self.queue.is_empty() {
            self.state = FollowerState::Idle;
        } else {
            self.state = FollowerState::Tracking;
            self.activate_next(pose);
        }
    }

    /// Drop everything and go idle.
    pub fn reset(&mut self) {
        self.queue.clear();
        self.active = None;
        self.stop_requested = false;
        self.state = FollowerState::Idle;
    }

    /// Cooperative stop, observed at the top of the next tick.
    pub fn request_stop(&mut self) {
        self.stop_requested = true;
    }

    fn activate_next(&mut self, pose: &VehiclePose) {
        self.active = self.queue.pop_front().map(|seg| {
            let active = ActiveSegment::activate(seg, pose);
            debug!(
                dst = ?seg.dst(),
                direction = ?seg.direction(),
                arc_radius = ?active.arc.map(|a| a.radius),
                "segment active"
            );
            active
        });
    }

    fn guidance(
        &self,
        seg: &PathSegment,
        arc: Option<Arc>,
        line_hdg: f64,
        pose: &VehiclePose,
        speed: f64,
        params: &VehicleParams,
    ) -> Guidance {
        let dst = seg.dst();
        let travel = seg.direction().travel_hdg(pose.hdg);
        let line_dir = Vec2::from_hdg(line_hdg);
        let to_dst = dst - pose.pos;
        let hdg_err = rel_hdg(travel, line_hdg);
        let lateral = line_dir.cross(pose.pos - dst);

        let arc_path = arc.and_then(|arc| arc.tangent_hdg(pose.pos).map(|tangent| (arc, tangent)));
        let (path_err, offset, feed_forward) = match arc_path {
            Some((arc, tangent)) => (
                rel_hdg(travel, tangent),
                arc.offset(pose.pos),
                arc.feed_forward(params.wheelbase) / self.config.steer_gain,
            ),
            None => (hdg_err, lateral, 0.0),
        };
        let correction = (self.config.cross_track_gain * offset
            / (speed.abs() + self.config.speed_softening))
            .atan()
            .to_degrees();
        let mut mis_hdg = (path_err + correction + feed_forward).clamp(-180.0, 180.0);
        // near a full reversal keep turning the way we already are
        if mis_hdg.abs() > 170.0
            && self.last_mis_hdg.abs() > 90.0
            && mis_hdg.signum() != self.last_mis_hdg.signum()
        {
            mis_hdg = -mis_hdg;
        }
        Guidance {
            mis_hdg,
            hdg_err,
            dist: to_dst.abs(),
            along: to_dst.dot(line_dir),
            lateral,
        }
    }

    /// Distance left after the active segment while the direction of travel
    /// stays the same, so the tug only slows for real stops.
    fn continuing_dist(&self, seg: PathSegment) -> f64 {
        let mut total = 0.0;
        let mut prev = seg;
        for seg in &self.queue {
            if seg.direction() != prev.direction() {
                break;
            }
            total += prev.dst().dist(seg.dst());
            prev = *seg;
        }
        total
    }

    fn speed_for(&self, remaining: f64, steer: f64, direction: Direction, params: &VehicleParams) -> f64 {
        let max_speed = match direction {
            Direction::Forward => params.max_fwd_speed,
            Direction::Reverse => params.max_rev_speed,
        };
        let turn_factor = 1.0 - 0.5 * (steer.abs() / params.max_steer).min(1.0);
        let speed = (2.0 * params.max_decel * remaining)
            .sqrt()
            .min(max_speed * turn_factor)
            .max(self.config.min_speed.min(max_speed));
        speed * direction.sign()
    }

    /// Advance the state machine by one frame.
    pub fn tick(&mut self, pose: &VehiclePose, speed: f64, params: &VehicleParams) -> FollowerOutput {
        let mut out = FollowerOutput {
            steer: self.last_steer,
            speed: 0.0,
            mis_hdg: self.last_mis_hdg,
            arrived: 0,
            finished: false,
        };

        if self.stop_requested {
            self.stop_requested = false;
            self.queue.clear();
            self.active = None;
            if self.state != FollowerState::Done {
                info!("segment follower stopped on request");
                self.state = FollowerState::Done;
                out.finished = true;
            }
            return out;
        }

        // bounded by the queue length: every pass completes a segment or returns
        while self.state == FollowerState::Tracking {
            let Some(active) = self.active.as_mut() else {
                self.finish(&mut out);
                break;
            };
            // leave the arc once aligned with the final heading
            if let (Some(_), Some(line_hdg)) = (active.arc, active.line_hdg) {
                let travel = active.seg.direction().travel_hdg(pose.hdg);
                if rel_hdg(travel, line_hdg).abs() <= self.config.hdg_tolerance {
                    active.arc = None;
                }
            }
            let Some(line_hdg) = active.line_hdg else {
                self.complete_segment(pose, &mut out);
                continue;
            };
            let active = *active;
            let g = self.guidance(&active.seg, active.arc, line_hdg, pose, speed, params);
            if self.has_arrived(&g) {
                self.complete_segment(pose, &mut out);
                continue;
            }
            // arcs run on until aligned with the final heading
            if active.backoff.is_none() && active.arc.is_none() && g.along <= 0.0 {
                if active.reapproaches >= self.config.max_reapproaches {
                    warn!(
                        dst = ?active.seg.dst(),
                        dist = g.dist,
                        hdg_err = g.hdg_err,
                        "segment passed out of tolerance, accepting"
                    );
                    self.complete_segment(pose, &mut out);
                    continue;
                }
                self.begin_reapproach(line_hdg, &g);
            }
            self.drive(line_hdg, pose, speed, params, &mut out);
            return out;
        }
        out
    }

    /// Back off along the reference line for another approach.
    fn begin_reapproach(&mut self, line_hdg: f64, g: &Guidance) {
        if let Some(active) = self.active.as_mut() {
            let lead = self.config.reapproach_dist + 2.0 * g.lateral.abs();
            active.backoff = Some(active.seg.dst() - Vec2::from_hdg(line_hdg) * lead);
            active.reapproaches += 1;
            info!(
                dst = ?active.seg.dst(),
                dist = g.dist,
                lateral = g.lateral,
                hdg_err = g.hdg_err,
                attempt = active.reapproaches,
                "destination passed out of tolerance, backing off"
            );
        }
    }

    /// Steer and set speed toward the active segment, or toward its
    /// back-off point while reversing for another approach.
    fn drive(&mut self, line_hdg: f64, pose: &VehiclePose, speed: f64, params: &VehicleParams, out: &mut FollowerOutput) {
        let Some(mut active) = self.active else {
            return;
        };
        let backing = active.backoff.map(|point| {
            let seg = PathSegment::Straight {
                dst: point,
                direction: active.seg.direction().opposite(),
            };
            let g = self.guidance(&seg, None, normalize_hdg(line_hdg + 180.0), pose, speed, params);
            (seg, g)
        });
        let (seg, g, remaining) = match backing {
            Some((seg, g)) if g.along > 0.0 => {
                let remaining = g.dist;
                (seg, g, remaining)
            }
            _ => {
                // run-up done, approach again
                if active.backoff.take().is_some() {
                    self.active = Some(active);
                }
                let g = self.guidance(&active.seg, active.arc, line_hdg, pose, speed, params);
                let remaining = g.dist + self.continuing_dist(active.seg);
                (active.seg, g, remaining)
            }
        };
        let direction = seg.direction();
        let steer = steering_law(g.mis_hdg, self.config.steer_gain, params.max_steer) * direction.sign();
        out.steer = steer;
        out.mis_hdg = g.mis_hdg;
        out.speed = self.speed_for(remaining, steer, direction, params);
        self.last_steer = steer;
        self.last_mis_hdg = g.mis_hdg;
    }

    fn complete_segment(&mut self, pose: &VehiclePose, out: &mut FollowerOutput) {
        if let Some(active) = self.active {
            self.completed += 1;
            out.arrived += 1;
            debug!(dst = ?active.seg.dst(), completed = self.completed, "segment arrived");
        }
        self.state = FollowerState::Arrived;
        self.activate_next(pose);
        if self.active.is_some() {
            self.state = FollowerState::Tracking;
        } else {
            self.finish(out);
        }
    }

    /// Within the heading tolerance and either inside the arrival radius or
    /// just past the destination with a small side offset.
    fn has_arrived(&self, g: &Guidance) -> bool {
        let aligned = g.hdg_err.abs() <= self.config.hdg_tolerance;
        let close = g.dist <= self.config.pos_tolerance;
        let passed = g.along <= 0.0 && g.lateral.abs() <= self.config.pos_tolerance;
        aligned && (close || passed)
    }

    fn finish(&mut self, out: &mut FollowerOutput) {
        info!(completed = self.completed, "segment queue exhausted");
        self.state = FollowerState::Done;
        self.last_mis_hdg = 0.0;
        out.finished = true;
        out.speed = 0.0;
    }
}

impl Default for SegmentFollower {
    fn default() -> Self {
        Self::new(FollowerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinematics::{advance, ramp_speed, slew};

    const D_T: f64 = 0.05;

    /// Closed-loop drive; returns the tick on which the queue finished.
    fn drive(f: &mut SegmentFollower, pose: &mut VehiclePose, params: &VehicleParams, max_ticks: usize) -> Option<usize> {
        let mut speed = 0.0;
        let mut steer = 0.0;
        for i in 0..max_ticks {
            let out = f.tick(pose, speed, params);
            assert!(out.steer.abs() <= params.max_steer + 1e-9);
            if out.finished {
                return Some(i);
            }
            steer = slew(steer, out.steer, params.max_steer_rate * D_T);
            speed = ramp_speed(speed, out.speed, params, D_T);
            *pose = advance(*pose, steer, speed, D_T, params.wheelbase);
        }
        None
    }

    #[test]
    fn test_new_follower_is_idle() {
        let f = SegmentFollower::default();
        assert_eq!(f.state(), FollowerState::Idle);
        assert!(f.is_idle());
        assert_eq!(f.remaining(), 0);
    }

    #[test]
    fn test_straight_ten_ahead_reaches_done() {
        let params = VehicleParams::default();
        let mut f = SegmentFollower::default();
        let mut pose = VehiclePose::new(Vec2::ZERO, 0.0);
        f.push(&pose, PathSegment::straight(Vec2::new(0.0, 10.0)));
        assert_eq!(f.state(), FollowerState::Tracking);

        let ticks = drive(&mut f, &mut pose, &params, 2_000).expect("should finish");
        assert!(ticks < 600, "took {ticks} ticks");
        assert_eq!(f.state(), FollowerState::Done);
        assert_in_tolerance(&f, &pose, Vec2::new(0.0, 10.0), 0.0, &params);
    }

    #[test]
    fn test_zero_length_segment_arrives_same_tick() {
        let params = VehicleParams::default();
        let mut f = SegmentFollower::default();
        let pose = VehiclePose::new(Vec2::new(3.0, 3.0), 45.0);
        f.push(&pose, PathSegment::straight(Vec2::new(3.0, 3.0)));
        let out = f.tick(&pose, 0.0, &params);
        assert_eq!(out.arrived, 1);
        assert!(out.finished);
        assert!(out.steer.is_finite() && out.speed.is_finite());
        assert_eq!(f.state(), FollowerState::Done);
    }

    #[test]
    fn test_zero_length_then_real_segment() {
        let params = VehicleParams::default();
        let mut f = SegmentFollower::default();
        let pose = VehiclePose::new(Vec2::ZERO, 0.0);
        f.set_segments(&pose, [PathSegment::turn(Vec2::ZERO, 90.0), PathSegment::straight(Vec2::new(0.0, 5.0))]);
        let out = f.tick(&pose, 0.0, &params);
        assert_eq!(out.arrived, 1);
        assert!(!out.finished);
        assert!(out.speed > 0.0);
        assert_eq!(f.state(), FollowerState::Tracking);
    }

    /// Final pose is inside the arrival tolerance, allowing one tick of travel.
    fn assert_in_tolerance(f: &SegmentFollower, pose: &VehiclePose, dst: Vec2, hdg: f64, params: &VehicleParams) {
        let reach = f.config().pos_tolerance + params.max_fwd_speed.max(params.max_rev_speed) * D_T;
        let dist = pose.pos.dist(dst);
        let hdg_err = rel_hdg(pose.hdg, hdg).abs();
        assert!(dist <= reach, "ended {dist:.2} m from {dst:?} at {:?}", pose.pos);
        assert!(hdg_err <= f.config().hdg_tolerance, "ended {hdg_err:.1} deg off, hdg {}", pose.hdg);
    }

    #[test]
    fn test_converges_from_reversed_heading() {
        let params = VehicleParams::default();
        let dst = Vec2::new(0.0, 10.0);
        for start_hdg in [90.0, 135.0, 180.0, 225.0, 270.0] {
            let mut f = SegmentFollower::default();
            let mut pose = VehiclePose::new(Vec2::ZERO, start_hdg);
            // line from the start toward north
            f.set_segments(&pose, [PathSegment::straight(dst)]);
            let ticks = drive(&mut f, &mut pose, &params, 4_000);
            assert!(ticks.is_some(), "no convergence from hdg {start_hdg}");
            assert_in_tolerance(&f, &pose, dst, 0.0, &params);
        }
    }

    #[test]
    fn test_sideways_target_is_not_arrived_at_start() {
        let params = VehicleParams::default();
        let mut f = SegmentFollower::default();
        let pose = VehiclePose::new(Vec2::ZERO, 0.0);
        // level with the tug, ten meters to the right
        f.drive2point(&pose, Vec2::new(10.0, 0.0), 0.0);
        let out = f.tick(&pose, 0.0, &params);
        assert_eq!(out.arrived, 0);
        assert!(!out.finished);
        assert_eq!(f.state(), FollowerState::Tracking);
        assert!(out.speed != 0.0);
    }

    #[test]
    fn test_offset_targets_reached_in_tolerance() {
        let params = VehicleParams::default();
        for dst in [Vec2::new(10.0, 0.0), Vec2::new(10.0, 5.0), Vec2::new(-6.0, 4.0)] {
            let mut f = SegmentFollower::default();
            let mut pose = VehiclePose::new(Vec2::ZERO, 0.0);
            f.drive2point(&pose, dst, 0.0);
            let ticks = drive(&mut f, &mut pose, &params, 6_000);
            assert!(ticks.is_some(), "never finished toward {dst:?}");
            assert_eq!(f.completed(), 1);
            assert_in_tolerance(&f, &pose, dst, 0.0, &params);
        }
    }

    #[test]
    fn test_overshoot_backs_off_and_returns() {
        let params = VehicleParams::default();
        let mut f = SegmentFollower::default();
        // already past the destination, pointing the right way but well off the line
        let pose = VehiclePose::new(Vec2::new(2.0, 11.0), 0.0);
        f.set_segments(&VehiclePose::new(Vec2::ZERO, 0.0), [PathSegment::straight(Vec2::new(0.0, 10.0))]);
        let out = f.tick(&pose, 0.0, &params);
        assert_eq!(out.arrived, 0);
        assert!(out.speed < 0.0, "backs up, got {}", out.speed);
    }

    #[test]
    fn test_turn_segment_follows_arc() {
        let params = VehicleParams::default();
        let mut f = SegmentFollower::default();
        let mut pose = VehiclePose::new(Vec2::ZERO, 0.0);
        // quarter circle of radius 12 to the right
        f.set_segments(&pose, [PathSegment::turn(Vec2::new(12.0, 12.0), 90.0)]);
        assert!(drive(&mut f, &mut pose, &params, 4_000).is_some());
        assert_in_tolerance(&f, &pose, Vec2::new(12.0, 12.0), 90.0, &params);
    }

    #[test]
    fn test_u_turn_does_not_arrive_immediately() {
        let params = VehicleParams::default();
        let mut f = SegmentFollower::default();
        let pose = VehiclePose::new(Vec2::ZERO, 0.0);
        f.set_segments(&pose, [PathSegment::turn(Vec2::new(16.0, 0.0), 180.0)]);
        let out = f.tick(&pose, 0.0, &params);
        assert_eq!(out.arrived, 0);
        assert!(out.steer > 0.0, "right-hand U-turn steers right");
    }

    #[test]
    fn test_reverse_segment_backs_up() {
        let params = VehicleParams::default();
        let mut f = SegmentFollower::default();
        let mut pose = VehiclePose::new(Vec2::ZERO, 0.0);
        f.set_segments(&pose, [PathSegment::straight(Vec2::new(0.0, -8.0)).reversed()]);
        let out = f.tick(&pose, 0.0, &params);
        assert!(out.speed < 0.0);
        assert!(drive(&mut f, &mut pose, &params, 4_000).is_some());
        assert!(pose.pos.y < -7.0);
        assert!(rel_hdg(pose.hdg, 0.0).abs() < 10.0, "still facing north");
    }

    #[test]
    fn test_steering_law_bounded() {
        let lock = 50.0;
        for mis in [-720.0, -360.0, -181.0, -180.0, 0.0, 10.0, 180.0, 181.0, 540.0] {
            let s = steering_law(mis, 1.5, lock);
            assert!(s.abs() <= lock, "mis {mis} -> steer {s}");
        }
        assert!((steering_law(10.0, 1.5, lock) - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_stop_request_forces_done() {
        let params = VehicleParams::default();
        let mut f = SegmentFollower::default();
        let pose = VehiclePose::new(Vec2::ZERO, 0.0);
        f.push(&pose, PathSegment::straight(Vec2::new(0.0, 50.0)));
        f.request_stop();
        // not applied until the next tick
        assert_eq!(f.state(), FollowerState::Tracking);
        let out = f.tick(&pose, 2.0, &params);
        assert!(out.finished);
        assert_eq!(out.speed, 0.0);
        assert_eq!(f.state(), FollowerState::Done);
        assert_eq!(f.remaining(), 0);
        // terminal: further ticks report nothing new
        assert!(!f.tick(&pose, 0.0, &params).finished);
    }

    #[test]
    fn test_drive2point_restarts_from_done() {
        let params = VehicleParams::default();
        let mut f = SegmentFollower::default();
        let pose = VehiclePose::new(Vec2::ZERO, 0.0);
        f.push(&pose, PathSegment::straight(Vec2::ZERO));
        f.tick(&pose, 0.0, &params);
        assert_eq!(f.state(), FollowerState::Done);

        f.drive2point(&pose, Vec2::new(0.0, 20.0), 0.0);
        assert_eq!(f.state(), FollowerState::Tracking);
        assert!(matches!(f.last_segment(), Some(PathSegment::Straight { .. })));

        f.drive2point(&pose, Vec2::new(10.0, 30.0), 90.0);
        assert!(matches!(f.last_segment(), Some(PathSegment::Turn { .. })));
        assert_eq!(f.remaining(), 2);
    }

    #[test]
    fn test_slows_only_for_direction_change() {
        let params = VehicleParams::default();
        let mut f = SegmentFollower::default();
        let pose = VehiclePose::new(Vec2::new(0.0, 9.0), 0.0);
        f.set_segments(
            &pose,
            [
                PathSegment::straight(Vec2::new(0.0, 10.0)),
                PathSegment::straight(Vec2::new(0.0, 40.0)),
            ],
        );
        let through = f.tick(&pose, 1.0, &params).speed;

        let mut g = SegmentFollower::default();
        g.set_segments(
            &pose,
            [
                PathSegment::straight(Vec2::new(0.0, 10.0)),
                PathSegment::Straight {
                    dst: Vec2::new(0.0, 0.0),
                    direction: Direction::Reverse,
                },
            ],
        );
        let stopping = g.tick(&pose, 1.0, &params).speed;
        assert!(through > stopping, "{through} vs {stopping}");
    }
}
