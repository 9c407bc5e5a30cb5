//! Tug runtime object: one tug's pose, steering, wheels, sounds and segment
//! queue, advanced once per frame.

use pushback_domain::{
    AssetKind, PathSegment, PushbackError, Result, SteeringState, Vec2, VehiclePose, WeightClass,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::SimConfig;
use crate::follower::{FollowerState, SegmentFollower};
use crate::host::{AssetHost, ObjectHandle, Placement};
use crate::kinematics::{self, VehicleParams, WheelAngles};
use crate::library::TugModel;
use crate::sound::{Beeper, CradleAir, Emitter, EngineSound, SoundPrefs};

/// Cradle lift travel per second, as a fraction of full lift
const CRADLE_LIFT_RATE: f64 = 0.25;

/// Where and for what aircraft a tug is spawned
#[derive(Debug, Clone, PartialEq)]
pub struct TugSpawn {
    pub weight: WeightClass,
    /// Aircraft nose gear strut length in m
    pub ng_len: f64,
    /// Airport ICAO code, selects the livery
    pub airport: String,
    pub pos: Vec2,
    pub hdg: f64,
}

/// Visual objects of a tug
#[derive(Debug, Default)]
struct TugObjects {
    body: Option<ObjectHandle>,
    front: Option<ObjectHandle>,
    rear: Option<ObjectHandle>,
}

impl TugObjects {
    fn release<H: AssetHost + ?Sized>(&mut self, host: &mut H) {
        for handle in [self.body.take(), self.front.take(), self.rear.take()]
            .into_iter()
            .flatten()
        {
            host.unload_object(handle);
        }
    }
}

/// Everything acquired from the host, released as a unit
#[derive(Debug, Default)]
struct TugAssets {
    objects: TugObjects,
    engine: EngineSound,
    air: CradleAir,
    beeper: Beeper,
}

impl TugAssets {
    fn load<H: AssetHost + ?Sized>(
        model: TugModel,
        airport: &str,
        air_dwell: f64,
        host: &mut H,
    ) -> Result<Self> {
        let mut assets = Self::default();
        match assets.acquire(model, airport, air_dwell, host) {
            Ok(()) => Ok(assets),
            Err(err) => {
                warn!(model = model.as_str(), error = %err, "tug asset load failed");
                assets.release(host);
                Err(err)
            }
        }
    }

    fn acquire<H: AssetHost + ?Sized>(
        &mut self,
        model: TugModel,
        airport: &str,
        air_dwell: f64,
        host: &mut H,
    ) -> Result<()> {
        let body_paths = model.object_paths(airport);
        self.objects.body = Some(
            body_paths
                .iter()
                .find_map(|path| host.load_object(path))
                .ok_or_else(|| {
                    missing(AssetKind::Object, body_paths.last().map_or("", String::as_str))
                })?,
        );
        self.objects.front = Some(load_object(host, &model.asset_path("front.obj"))?);
        self.objects.rear = Some(load_object(host, &model.asset_path("rear.obj"))?);
        self.engine = EngineSound::new(Emitter::new(load_sound(host, &model.asset_path("engine.wav"))?));
        self.air = CradleAir::new(Emitter::new(load_sound(host, &model.asset_path("air.wav"))?), air_dwell);
        self.beeper = Beeper::new(Emitter::new(load_sound(host, &model.asset_path("beeper.wav"))?));
        Ok(())
    }

    fn release<H: AssetHost + ?Sized>(&mut self, host: &mut H) {
        self.objects.release(host);
        self.engine.release(host);
        self.air.release(host);
        self.beeper.release(host);
    }
}

fn missing(kind: AssetKind, name: &str) -> PushbackError {
    PushbackError::Resource {
        kind,
        name: name.to_string(),
    }
}

fn load_object<H: AssetHost + ?Sized>(host: &mut H, path: &str) -> Result<ObjectHandle> {
    host.load_object(path)
        .ok_or_else(|| missing(AssetKind::Object, path))
}

fn load_sound<H: AssetHost + ?Sized>(host: &mut H, path: &str) -> Result<crate::host::SoundHandle> {
    host.load_sound(path)
        .ok_or_else(|| missing(AssetKind::Sound, path))
}

/// Per-tick report to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickReport {
    /// Segments completed this tick
    pub arrived: usize,
    /// The segment queue ran out this tick
    pub finished: bool,
}

/// A tug and everything it owns
#[derive(Debug)]
pub struct Tug {
    id: Uuid,
    model: TugModel,
    weight: WeightClass,
    airport: String,
    params: VehicleParams,
    conn_offset: f64,
    lift_height: f64,
    pose: VehiclePose,
    steering: SteeringState,
    speed: f64,
    wheels: WheelAngles,
    follower: SegmentFollower,
    assets: TugAssets,
    te_fract: f64,
    cradle_lifted: bool,
    cradle_lift: f64,
    destroyed: bool,
}

impl Tug {
    /// Load the tug's assets and place it. On failure nothing stays loaded.
    pub fn create<H: AssetHost + ?Sized>(
        model: TugModel,
        spawn: &TugSpawn,
        config: &SimConfig,
        host: &mut H,
    ) -> Result<Self> {
        if !spawn.pos.is_finite() || !spawn.hdg.is_finite() {
            return Err(PushbackError::InvalidPlan(format!(
                "non-finite tug spawn pose {:?} / {}",
                spawn.pos, spawn.hdg
            )));
        }
        let assets = TugAssets::load(model, &spawn.airport, config.cradle_air_dwell, host)?;
        let tug = Self {
            id: Uuid::new_v4(),
            model,
            weight: spawn.weight,
            airport: spawn.airport.clone(),
            params: model.vehicle_params(spawn.weight, spawn.ng_len),
            conn_offset: model.spec().conn_offset,
            lift_height: model.spec().cradle_lift_height,
            pose: VehiclePose::new(spawn.pos, spawn.hdg),
            steering: SteeringState::default(),
            speed: 0.0,
            wheels: WheelAngles::default(),
            follower: SegmentFollower::new(config.follower),
            assets,
            te_fract: 0.0,
            cradle_lifted: false,
            cradle_lift: 0.0,
            destroyed: false,
        };
        info!(
            tug_id = %tug.id,
            model = model.as_str(),
            weight = spawn.weight.as_str(),
            airport = %tug.airport,
            "tug created"
        );
        Ok(tug)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn model(&self) -> TugModel {
        self.model
    }

    pub fn weight(&self) -> WeightClass {
        self.weight
    }

    pub fn params(&self) -> &VehicleParams {
        &self.params
    }

    /// Distance from the reference point to the cradle
    pub fn conn_offset(&self) -> f64 {
        self.conn_offset
    }

    pub fn pose(&self) -> VehiclePose {
        self.pose
    }

    pub fn steering(&self) -> SteeringState {
        self.steering
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn wheels(&self) -> WheelAngles {
        self.wheels
    }

    pub fn follower_state(&self) -> FollowerState {
        self.follower.state()
    }

    pub fn segments_remaining(&self) -> usize {
        self.follower.remaining()
    }

    pub fn cradle_air_on(&self) -> bool {
        self.assets.air.is_on()
    }

    pub fn beeper_on(&self) -> bool {
        self.assets.beeper.is_on()
    }

    pub fn engine_pitch(&self) -> f64 {
        self.assets.engine.pitch()
    }

    pub fn cradle_lift(&self) -> f64 {
        self.cradle_lift
    }

    /// Queue a drive to `dst` ending at `hdg`. Returns false when the
    /// segment being driven right now already ends there.
    pub fn request_drive_to(&mut self, dst: Vec2, hdg: f64) -> bool {
        if self.follower.state() == FollowerState::Tracking {
            let same = self.follower.active_segment().is_some_and(|seg| {
                let hdg_ok = match seg {
                    PathSegment::Turn { hdg: seg_hdg, .. } => {
                        pushback_domain::rel_hdg(seg_hdg, hdg).abs() < 1e-6
                    }
                    PathSegment::Straight { .. } => true,
                };
                seg.dst().dist(dst) < 1e-6 && hdg_ok
            });
            if same {
                debug!(tug_id = %self.id, ?dst, "drive request already active");
                return false;
            }
        }
        self.follower.drive2point(&self.pose, dst, hdg);
        true
    }

    /// Replace the segment queue with a validated plan.
    pub fn set_plan(&mut self, plan: &[PathSegment]) -> Result<()> {
        for seg in plan {
            seg.validate()?;
        }
        info!(tug_id = %self.id, segments = plan.len(), "plan loaded");
        self.follower.set_segments(&self.pose, plan.iter().copied());
        Ok(())
    }

    /// Cooperative stop, applied at the top of the next tick.
    pub fn stop(&mut self) {
        self.follower.request_stop();
    }

    pub fn set_te_fraction(&mut self, te_fract: f64) {
        self.te_fract = te_fract.clamp(0.0, 1.0);
    }

    pub fn set_cradle_air_on(&mut self, on: bool) {
        self.assets.air.set_requested(on);
    }

    pub fn set_cradle_beeper_on(&mut self, on: bool) {
        self.assets.beeper.set_requested(on);
    }

    pub fn set_cradle_lifted(&mut self, lifted: bool) {
        self.cradle_lifted = lifted;
    }

    /// Advance one frame: follower, then kinematics, then wheels, then sound.
    pub fn tick<H: AssetHost + ?Sized>(
        &mut self,
        host: &mut H,
        prefs: &SoundPrefs,
        cur_t: f64,
        d_t: f64,
    ) -> TickReport {
        if self.destroyed || d_t <= 0.0 {
            return TickReport::default();
        }

        let out = self.follower.tick(&self.pose, self.speed, &self.params);
        self.steering.angle = self.params.clamp_steer(kinematics::slew(
            self.steering.angle,
            out.steer,
            self.params.max_steer_rate * d_t,
        ));
        self.steering.last_mis_hdg = out.mis_hdg;
        self.speed = kinematics::ramp_speed(self.speed, out.speed, &self.params, d_t);

        self.pose = kinematics::advance(
            self.pose,
            self.steering.angle,
            self.speed,
            d_t,
            self.params.wheelbase,
        );
        self.wheels
            .roll(self.speed * d_t, self.steering.angle, &self.params);

        let lift_target = if self.cradle_lifted { 1.0 } else { 0.0 };
        self.cradle_lift = kinematics::slew(self.cradle_lift, lift_target, CRADLE_LIFT_RATE * d_t);

        self.assets.engine.update(host, prefs, self.te_fract);
        self.assets.air.update(host, prefs, cur_t);
        self.assets.beeper.update(host, prefs);

        TickReport {
            arrived: out.arrived,
            finished: out.finished,
        }
    }

    /// Draw the body and both axles at the current state.
    pub fn render<H: AssetHost + ?Sized>(&self, host: &mut H, _cur_t: f64, _d_t: f64) {
        if self.destroyed {
            return;
        }
        let dir = Vec2::from_hdg(self.pose.hdg);
        let lift = self.cradle_lift * self.lift_height;
        if let Some(body) = self.assets.objects.body {
            host.draw_object(body, &Placement {
                pos: self.pose.pos,
                hdg: self.pose.hdg,
                elev: lift,
                roll_angle: 0.0,
            });
        }
        if let Some(front) = self.assets.objects.front {
            host.draw_object(front, &Placement {
                pos: self.pose.pos + dir * self.params.wheelbase,
                hdg: pushback_domain::normalize_hdg(self.pose.hdg + self.steering.angle),
                elev: 0.0,
                roll_angle: self.wheels.front,
            });
        }
        if let Some(rear) = self.assets.objects.rear {
            host.draw_object(rear, &Placement {
                pos: self.pose.pos,
                hdg: self.pose.hdg,
                elev: 0.0,
                roll_angle: self.wheels.rear,
            });
        }
    }

    /// True once the tug has rolled to a halt with nothing left to drive.
    pub fn is_stopped(&self) -> bool {
        self.speed == 0.0 && self.follower.is_idle()
    }

    /// Release every asset. Safe to call repeatedly.
    pub fn destroy<H: AssetHost + ?Sized>(&mut self, host: &mut H) {
        if !self.destroyed {
            info!(tug_id = %self.id, "tug destroyed");
        }
        self.assets.release(host);
        self.follower.reset();
        self.speed = 0.0;
        self.destroyed = true;
    }
}
