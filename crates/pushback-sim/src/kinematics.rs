//! Bicycle-model vehicle kinematics.

use pushback_domain::{Vec2, VehiclePose, normalize_hdg};
use serde::{Deserialize, Serialize};

/// Physical parameters of a tug. Fixed once the tug is created.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VehicleParams {
    /// Distance between the axles in meters
    pub wheelbase: f64,
    /// Mechanical steering lock in degrees
    pub max_steer: f64,
    /// Steering slew rate in degrees per second
    pub max_steer_rate: f64,
    /// Top forward speed in m/s
    pub max_fwd_speed: f64,
    /// Top reverse speed in m/s (positive number)
    pub max_rev_speed: f64,
    pub max_accel: f64,
    pub max_decel: f64,
    /// Front tire circumference in meters
    pub front_wheel_circ: f64,
    /// Rear tire circumference in meters
    pub rear_wheel_circ: f64,
}

impl Default for VehicleParams {
    fn default() -> Self {
        Self {
            wheelbase: 3.0,
            max_steer: 50.0,
            max_steer_rate: 40.0,
            max_fwd_speed: 6.0,
            max_rev_speed: 3.0,
            max_accel: 1.0,
            max_decel: 1.5,
            front_wheel_circ: std::f64::consts::PI * 0.9,
            rear_wheel_circ: std::f64::consts::PI * 0.9,
        }
    }
}

impl VehicleParams {
    /// Clamp a steering angle to the mechanical lock.
    #[must_use]
    pub fn clamp_steer(&self, steer: f64) -> f64 {
        steer.clamp(-self.max_steer, self.max_steer)
    }

    /// Tightest turn radius the tug can drive, in meters.
    #[must_use]
    pub fn min_turn_radius(&self) -> f64 {
        self.wheelbase / self.max_steer.to_radians().tan()
    }
}

/// Advance `pose` by one time step.
///
/// The reference point moves along the current heading by `speed * d_t`;
/// the heading rotates by `speed * d_t * tan(steer) / wheelbase`. Negative
/// speed backs the vehicle up and mirrors the heading change.
#[must_use]
pub fn advance(pose: VehiclePose, steer: f64, speed: f64, d_t: f64, wheelbase: f64) -> VehiclePose {
    let dist = speed * d_t;
    if dist == 0.0 {
        return pose;
    }
    let pos = pose.pos + Vec2::from_hdg(pose.hdg) * dist;
    let d_hdg = (dist * steer.to_radians().tan() / wheelbase).to_degrees();
    VehiclePose::new(pos, pose.hdg + d_hdg)
}

/// Roll a wheel angle by the distance traveled, wrapped into [0, 360).
#[must_use]
pub fn roll_wheel(phi: f64, dist: f64, circumference: f64) -> f64 {
    normalize_hdg(phi + (dist / circumference) * 360.0)
}

/// Tire roll angles in degrees
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WheelAngles {
    pub front: f64,
    pub rear: f64,
}

impl WheelAngles {
    /// Roll both axles for a rear-axle travel of `dist` at steering `steer`.
    /// Steered front wheels track a longer arc than the rear ones.
    pub fn roll(&mut self, dist: f64, steer: f64, params: &VehicleParams) {
        let front_dist = dist / steer.to_radians().cos().max(0.1);
        self.front = roll_wheel(self.front, front_dist, params.front_wheel_circ);
        self.rear = roll_wheel(self.rear, dist, params.rear_wheel_circ);
    }
}

/// Move `cur` toward `target` by at most `max_step`.
#[must_use]
pub fn slew(cur: f64, target: f64, max_step: f64) -> f64 {
    cur + (target - cur).clamp(-max_step, max_step)
}

/// Ramp a signed speed toward `target` honoring acceleration and
/// deceleration limits. Slowing down (toward zero) uses `max_decel`.
#[must_use]
pub fn ramp_speed(cur: f64, target: f64, params: &VehicleParams, d_t: f64) -> f64 {
    let slowing = target.abs() < cur.abs() || (cur != 0.0 && target.signum() != cur.signum());
    let rate = if slowing { params.max_decel } else { params.max_accel };
    slew(cur, target, rate * d_t)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WB: f64 = 3.0;

    fn north_at_origin() -> VehiclePose {
        VehiclePose::new(Vec2::ZERO, 0.0)
    }

    #[test]
    fn test_zero_speed_is_identity() {
        let pose = VehiclePose::new(Vec2::new(4.0, -2.0), 123.0);
        assert_eq!(advance(pose, 30.0, 0.0, 0.1, WB), pose);
    }

    #[test]
    fn test_straight_forward() {
        let p = advance(north_at_origin(), 0.0, 2.0, 0.5, WB);
        assert!(p.pos.x.abs() < 1e-9);
        assert!((p.pos.y - 1.0).abs() < 1e-9);
        assert!(p.hdg.abs() < 1e-9);
    }

    #[test]
    fn test_right_steer_turns_clockwise() {
        let p = advance(north_at_origin(), 20.0, 2.0, 0.1, WB);
        assert!(p.hdg > 0.0 && p.hdg < 10.0, "hdg = {}", p.hdg);
    }

    #[test]
    fn test_reverse_is_symmetric() {
        let start = VehiclePose::new(Vec2::new(1.0, 1.0), 45.0);
        let fwd = advance(start, 15.0, 1.5, 0.2, WB);
        let back = advance(start, 15.0, -1.5, 0.2, WB);
        let d_fwd = fwd.pos - start.pos;
        let d_back = back.pos - start.pos;
        assert!((d_fwd.x + d_back.x).abs() < 1e-9);
        assert!((d_fwd.y + d_back.y).abs() < 1e-9);
        let turn_fwd = pushback_domain::rel_hdg(start.hdg, fwd.hdg);
        let turn_back = pushback_domain::rel_hdg(start.hdg, back.hdg);
        assert!((turn_fwd + turn_back).abs() < 1e-9);
    }

    #[test]
    fn test_full_circle_at_lock() {
        let params = VehicleParams::default();
        let r = params.min_turn_radius();
        let circumference = 2.0 * std::f64::consts::PI * r;
        let d_t = 0.01;
        let speed = 1.0;
        let steps = (circumference / (speed * d_t)).round() as usize;
        let mut pose = north_at_origin();
        for _ in 0..steps {
            pose = advance(pose, params.max_steer, speed, d_t, params.wheelbase);
        }
        assert!(pose.pos.abs() < 0.1, "ended at {:?}", pose.pos);
    }

    #[test]
    fn test_wheel_roll_distances() {
        let circ = 2.5;
        assert!(roll_wheel(0.0, 0.0, circ).abs() < 1e-9);
        assert!((roll_wheel(0.0, 1.25, circ) - 180.0).abs() < 1e-9);
        assert!(roll_wheel(0.0, 2.5, circ).abs() < 1e-9);
        // 3.1 rotations
        assert!((roll_wheel(0.0, 7.75, circ) - 36.0).abs() < 1e-6);
        // backing up wraps below zero
        assert!((roll_wheel(10.0, -0.125, circ) - 352.0).abs() < 1e-9);
    }

    #[test]
    fn test_wheel_angles_accumulate() {
        let params = VehicleParams {
            front_wheel_circ: 2.0,
            rear_wheel_circ: 4.0,
            ..VehicleParams::default()
        };
        let mut wheels = WheelAngles::default();
        for _ in 0..10 {
            wheels.roll(0.5, 0.0, &params);
        }
        // 5 m: 2.5 front rotations, 1.25 rear rotations
        assert!((wheels.front - 180.0).abs() < 1e-6);
        assert!((wheels.rear - 90.0).abs() < 1e-6);
    }

    #[test]
    fn test_ramp_speed_limits() {
        let params = VehicleParams::default();
        let v = ramp_speed(0.0, 5.0, &params, 0.1);
        assert!((v - params.max_accel * 0.1).abs() < 1e-9);
        let v = ramp_speed(1.0, 0.0, &params, 0.1);
        assert!((v - (1.0 - params.max_decel * 0.1)).abs() < 1e-9);
        assert_eq!(ramp_speed(0.05, 0.0, &params, 0.1), 0.0);
    }
}
