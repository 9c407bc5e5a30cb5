//! Registry of tug models.
//!
//! Selection among fitting models is random, so the master publishes the
//! chosen name and the slave resolves it with [`TugModel::by_name`].

use pushback_domain::{PushbackError, Result, WeightClass};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::kinematics::VehicleParams;

/// Static description of one tug model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TugSpec {
    /// Aircraft MTOW envelope in kg
    pub mtow: (f64, f64),
    /// Aircraft nose gear strut length envelope in m
    pub ng_len: (f64, f64),
    pub wheelbase: f64,
    pub max_steer: f64,
    pub max_fwd_speed: f64,
    pub max_rev_speed: f64,
    pub max_accel: f64,
    pub max_decel: f64,
    pub front_wheel_diam: f64,
    pub rear_wheel_diam: f64,
    /// Distance from the tug reference point to the cradle, in m
    pub conn_offset: f64,
    /// How far the cradle raises the nose gear, in m
    pub cradle_lift_height: f64,
    /// Airports with a dedicated livery object
    pub liveries: &'static [&'static str],
}

/// Known tug models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TugModel {
    LightTowbarless,
    CompactTowbarless,
    MediumTowbarless,
    HeavyTowbarless,
}

impl TugModel {
    pub const ALL: [Self; 4] = [
        Self::LightTowbarless,
        Self::CompactTowbarless,
        Self::MediumTowbarless,
        Self::HeavyTowbarless,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LightTowbarless => "light_towbarless",
            Self::CompactTowbarless => "compact_towbarless",
            Self::MediumTowbarless => "medium_towbarless",
            Self::HeavyTowbarless => "heavy_towbarless",
        }
    }

    pub const fn spec(&self) -> TugSpec {
        match self {
            Self::LightTowbarless => TugSpec {
                mtow: (0.0, 40_000.0),
                ng_len: (0.5, 2.0),
                wheelbase: 2.2,
                max_steer: 55.0,
                max_fwd_speed: 6.0,
                max_rev_speed: 3.0,
                max_accel: 1.2,
                max_decel: 2.0,
                front_wheel_diam: 0.6,
                rear_wheel_diam: 0.6,
                conn_offset: 1.6,
                cradle_lift_height: 0.12,
                liveries: &[],
            },
            Self::CompactTowbarless => TugSpec {
                mtow: (20_000.0, 100_000.0),
                ng_len: (1.0, 3.0),
                wheelbase: 2.8,
                max_steer: 50.0,
                max_fwd_speed: 7.0,
                max_rev_speed: 3.0,
                max_accel: 1.0,
                max_decel: 1.6,
                front_wheel_diam: 0.8,
                rear_wheel_diam: 0.8,
                conn_offset: 2.0,
                cradle_lift_height: 0.15,
                liveries: &["EDDF", "EGLL"],
            },
            Self::MediumTowbarless => TugSpec {
                mtow: (40_000.0, 200_000.0),
                ng_len: (1.2, 3.5),
                wheelbase: 3.4,
                max_steer: 45.0,
                max_fwd_speed: 8.0,
                max_rev_speed: 3.5,
                max_accel: 0.9,
                max_decel: 1.5,
                front_wheel_diam: 1.0,
                rear_wheel_diam: 1.0,
                conn_offset: 2.0,
                cradle_lift_height: 0.18,
                liveries: &["KJFK", "EDDF", "LSZH"],
            },
            Self::HeavyTowbarless => TugSpec {
                mtow: (150_000.0, 600_000.0),
                ng_len: (2.0, 5.0),
                wheelbase: 4.4,
                max_steer: 40.0,
                max_fwd_speed: 8.0,
                max_rev_speed: 3.0,
                max_accel: 0.6,
                max_decel: 1.2,
                front_wheel_diam: 1.3,
                rear_wheel_diam: 1.3,
                conn_offset: 2.5,
                cradle_lift_height: 0.22,
                liveries: &["KJFK", "EGLL"],
            },
        }
    }

    /// Resolve a mirrored tug name. Unknown names mean the two instances
    /// have different tug libraries.
    pub fn by_name(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == name)
            .ok_or_else(|| {
                PushbackError::ConsistencyViolation(format!("unknown tug model '{name}'"))
            })
    }

    /// Whether this model can handle the aircraft.
    pub fn fits(&self, mtow: f64, ng_len: f64) -> bool {
        let spec = self.spec();
        (spec.mtow.0..=spec.mtow.1).contains(&mtow)
            && (spec.ng_len.0..=spec.ng_len.1).contains(&ng_len)
    }

    /// All models able to handle the aircraft.
    pub fn candidates(mtow: f64, ng_len: f64) -> Vec<Self> {
        Self::ALL
            .into_iter()
            .filter(|m| m.fits(mtow, ng_len))
            .collect()
    }

    /// Pick one fitting model at random.
    pub fn select<R: Rng + ?Sized>(mtow: f64, ng_len: f64, rng: &mut R) -> Result<Self> {
        Self::candidates(mtow, ng_len)
            .choose(rng)
            .copied()
            .ok_or(PushbackError::NoTugAvailable { mtow, ng_len })
    }

    /// Physical parameters for towing an aircraft of `weight`. Longer nose
    /// gear struts hold the cradle farther out, which lengthens the
    /// effective wheelbase while connected.
    pub fn vehicle_params(&self, weight: WeightClass, ng_len: f64) -> VehicleParams {
        let spec = self.spec();
        let speed_factor = weight.speed_factor();
        let strut_factor = 1.0 + (ng_len - spec.ng_len.0).max(0.0) * 0.05;
        VehicleParams {
            wheelbase: spec.wheelbase * strut_factor,
            max_steer: spec.max_steer,
            max_steer_rate: 40.0,
            max_fwd_speed: spec.max_fwd_speed * speed_factor,
            max_rev_speed: spec.max_rev_speed * speed_factor,
            max_accel: spec.max_accel * speed_factor,
            max_decel: spec.max_decel,
            front_wheel_circ: std::f64::consts::PI * spec.front_wheel_diam,
            rear_wheel_circ: std::f64::consts::PI * spec.rear_wheel_diam,
        }
    }

    /// Body object, preferring the airport livery when one exists.
    pub fn object_paths(&self, airport: &str) -> Vec<String> {
        let mut paths = Vec::with_capacity(2);
        if self.spec().liveries.contains(&airport) {
            paths.push(format!("tugs/{}/{airport}.obj", self.as_str()));
        }
        paths.push(format!("tugs/{}/tug.obj", self.as_str()));
        paths
    }

    pub fn asset_path(&self, file: &str) -> String {
        format!("tugs/{}/{file}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_by_name_round_trip() {
        for model in TugModel::ALL {
            assert_eq!(TugModel::by_name(model.as_str()).unwrap(), model);
        }
    }

    #[test]
    fn test_unknown_name_fails_fast() {
        assert!(matches!(
            TugModel::by_name("hovercraft"),
            Err(PushbackError::ConsistencyViolation(_))
        ));
        assert!(TugModel::by_name("").is_err());
    }

    #[test]
    fn test_select_respects_envelope() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let model = TugModel::select(78_000.0, 1.8, &mut rng).unwrap();
            assert!(model.fits(78_000.0, 1.8));
            assert_ne!(model, TugModel::HeavyTowbarless);
        }
    }

    #[test]
    fn test_select_can_pick_different_models() {
        let mut rng = StdRng::seed_from_u64(42);
        let picks: std::collections::HashSet<_> = (0..100)
            .map(|_| TugModel::select(78_000.0, 1.8, &mut rng).unwrap())
            .collect();
        assert!(picks.len() > 1, "selection should be non-deterministic");
    }

    #[test]
    fn test_no_tug_for_giant() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(
            TugModel::select(900_000.0, 3.0, &mut rng),
            Err(PushbackError::NoTugAvailable { .. })
        ));
    }

    #[test]
    fn test_heavy_aircraft_slows_tug() {
        let model = TugModel::MediumTowbarless;
        let light = model.vehicle_params(WeightClass::Light, 1.5);
        let heavy = model.vehicle_params(WeightClass::Heavy, 1.5);
        assert!(heavy.max_fwd_speed < light.max_fwd_speed);
        assert_eq!(heavy.max_steer, light.max_steer);
    }

    #[test]
    fn test_livery_preferred() {
        let paths = TugModel::MediumTowbarless.object_paths("KJFK");
        assert_eq!(paths[0], "tugs/medium_towbarless/KJFK.obj");
        assert_eq!(paths[1], "tugs/medium_towbarless/tug.obj");
        assert_eq!(TugModel::MediumTowbarless.object_paths("LFPG").len(), 1);
    }
}
