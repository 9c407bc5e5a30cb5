//! One pushback operation: the tug drives up to the nose gear, connects,
//! pushes along the plan, then disconnects and drives clear.

use pushback_domain::{PathSegment, Result, Vec2, WeightClass, normalize_hdg};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::SimConfig;
use crate::host::AssetHost;
use crate::library::TugModel;
use crate::sound::SoundPrefs;
use crate::tug::{Tug, TugSpawn};

/// How far in front of the connection point the tug appears
const STAGING_DIST: f64 = 25.0;
/// How far the tug backs away after disconnecting
const CLEARANCE_DIST: f64 = 15.0;

/// The aircraft being pushed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aircraft {
    /// Nose gear contact point
    pub nose_gear: Vec2,
    pub hdg: f64,
    /// Maximum takeoff weight in kg
    pub mtow: f64,
    /// Nose gear strut length in m
    pub ng_len: f64,
}

impl Aircraft {
    pub fn weight(&self) -> WeightClass {
        WeightClass::from_mtow(self.mtow)
    }
}

/// Operation step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PbStep {
    DrivingUp,
    Connecting,
    WaitingForPlan,
    Pushing,
    Stopping,
    Disconnecting,
    MovingAway,
    Complete,
}

impl PbStep {
    /// Tug holds the nose gear
    pub fn attached(self) -> bool {
        matches!(
            self,
            Self::Connecting | Self::WaitingForPlan | Self::Pushing | Self::Stopping
        )
    }
}

/// Shared gates read every tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpSignals {
    pub op_complete: bool,
    pub plan_complete: bool,
}

/// What happened during one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpEvent {
    /// Last plan segment finished this tick
    pub segments_done: bool,
    /// Operation reached `Complete` this tick
    pub completed: bool,
}

#[derive(Debug)]
pub struct PushbackOp {
    id: Uuid,
    step: PbStep,
    step_t: f64,
    tug: Tug,
    aircraft: Aircraft,
    plan: Vec<PathSegment>,
    connect_time: f64,
    aborted: bool,
}

impl PushbackOp {
    /// Spawn the tug in front of the aircraft and start driving up.
    pub fn start<H: AssetHost + ?Sized>(
        model: TugModel,
        aircraft: Aircraft,
        airport: &str,
        plan: Vec<PathSegment>,
        config: &SimConfig,
        host: &mut H,
    ) -> Result<Self> {
        for seg in &plan {
            seg.validate()?;
        }
        let spec = model.spec();
        let out = Vec2::from_hdg(aircraft.hdg);
        let tug_hdg = normalize_hdg(aircraft.hdg + 180.0);
        let conn_point = aircraft.nose_gear + out * spec.conn_offset;
        let spawn = TugSpawn {
            weight: aircraft.weight(),
            ng_len: aircraft.ng_len,
            airport: airport.to_string(),
            pos: conn_point + out * STAGING_DIST,
            hdg: tug_hdg,
        };
        let mut tug = Tug::create(model, &spawn, config, host)?;
        tug.request_drive_to(conn_point, tug_hdg);

        let op = Self {
            id: Uuid::new_v4(),
            step: PbStep::DrivingUp,
            step_t: 0.0,
            tug,
            aircraft,
            plan,
            connect_time: config.connect_time,
            aborted: false,
        };
        info!(
            op_id = %op.id,
            tug = model.as_str(),
            segments = op.plan.len(),
            "pushback operation started"
        );
        Ok(op)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn step(&self) -> PbStep {
        self.step
    }

    pub fn tug(&self) -> &Tug {
        &self.tug
    }

    pub fn aircraft(&self) -> Aircraft {
        self.aircraft
    }

    pub fn plan_len(&self) -> usize {
        self.plan.len()
    }

    pub fn is_complete(&self) -> bool {
        self.step == PbStep::Complete
    }

    pub fn aborted(&self) -> bool {
        self.aborted
    }

    /// Hand over a plan made after the tug was connected.
    pub fn set_plan(&mut self, plan: Vec<PathSegment>) -> Result<()> {
        for seg in &plan {
            seg.validate()?;
        }
        if !matches!(
            self.step,
            PbStep::DrivingUp | PbStep::Connecting | PbStep::WaitingForPlan
        ) {
            warn!(op_id = %self.id, step = ?self.step, "late plan ignored");
            return Ok(());
        }
        self.plan = plan;
        Ok(())
    }

    fn enter(&mut self, step: PbStep, cur_t: f64) {
        info!(op_id = %self.id, from = ?self.step, to = ?step, "pushback step");
        self.step = step;
        self.step_t = cur_t;
    }

    fn start_pushing(&mut self, cur_t: f64) {
        if let Err(err) = self.tug.set_plan(&self.plan) {
            warn!(op_id = %self.id, error = %err, "plan rejected, stopping");
            self.begin_stopping(cur_t);
            return;
        }
        self.enter(PbStep::Pushing, cur_t);
    }

    fn begin_stopping(&mut self, cur_t: f64) {
        self.tug.stop();
        self.enter(PbStep::Stopping, cur_t);
    }

    fn finish<H: AssetHost + ?Sized>(&mut self, host: &mut H, cur_t: f64) {
        self.tug.destroy(host);
        self.enter(PbStep::Complete, cur_t);
    }

    /// Stop at once and release the tug.
    pub fn abort<H: AssetHost + ?Sized>(&mut self, host: &mut H) {
        if self.step != PbStep::Complete {
            warn!(op_id = %self.id, step = ?self.step, "pushback operation aborted");
        }
        self.tug.destroy(host);
        self.step = PbStep::Complete;
        self.aborted = true;
    }

    /// Advance one frame.
    pub fn tick<H: AssetHost + ?Sized>(
        &mut self,
        host: &mut H,
        prefs: &SoundPrefs,
        signals: OpSignals,
        cur_t: f64,
        d_t: f64,
    ) -> OpEvent {
        let mut event = OpEvent::default();
        if self.step == PbStep::Complete {
            return event;
        }

        if signals.op_complete {
            match self.step {
                PbStep::DrivingUp => {
                    self.finish(host, cur_t);
                    event.completed = true;
                    return event;
                }
                PbStep::Connecting | PbStep::WaitingForPlan | PbStep::Pushing => {
                    self.begin_stopping(cur_t);
                }
                _ => {}
            }
        }

        let params = *self.tug.params();
        let max_speed = params.max_fwd_speed.max(params.max_rev_speed);
        let speed_fract = (self.tug.speed().abs() / max_speed).min(1.0);
        let load = if self.step.attached() { 0.4 } else { 0.0 };
        self.tug.set_te_fraction(load + (1.0 - load) * speed_fract);

        let report = self.tug.tick(host, prefs, cur_t, d_t);
        let dwell_done = cur_t - self.step_t >= self.connect_time;

        match self.step {
            PbStep::DrivingUp => {
                if self.tug.is_stopped() {
                    self.tug.set_cradle_air_on(true);
                    self.tug.set_cradle_lifted(true);
                    self.enter(PbStep::Connecting, cur_t);
                }
            }
            PbStep::Connecting => {
                if dwell_done {
                    if self.plan.is_empty() {
                        self.enter(PbStep::WaitingForPlan, cur_t);
                    } else {
                        self.start_pushing(cur_t);
                    }
                }
            }
            PbStep::WaitingForPlan => {
                if signals.plan_complete && !self.plan.is_empty() {
                    self.start_pushing(cur_t);
                }
            }
            PbStep::Pushing => {
                self.tug.set_cradle_beeper_on(self.tug.speed().abs() > 0.05);
                event.segments_done = report.finished;
            }
            PbStep::Stopping => {
                if self.tug.is_stopped() {
                    self.tug.set_cradle_beeper_on(false);
                    self.tug.set_cradle_air_on(false);
                    self.tug.set_cradle_lifted(false);
                    self.enter(PbStep::Disconnecting, cur_t);
                }
            }
            PbStep::Disconnecting => {
                if dwell_done {
                    let pose = self.tug.pose();
                    let away = pose.pos - Vec2::from_hdg(pose.hdg) * CLEARANCE_DIST;
                    if let Err(err) = self.tug.set_plan(&[PathSegment::straight(away).reversed()]) {
                        warn!(op_id = %self.id, error = %err, "clearance move rejected");
                    }
                    self.enter(PbStep::MovingAway, cur_t);
                }
            }
            PbStep::MovingAway => {
                if self.tug.is_stopped() {
                    self.finish(host, cur_t);
                    event.completed = true;
                }
            }
            PbStep::Complete => {}
        }

        if self.step.attached() {
            let pose = self.tug.pose();
            self.aircraft.nose_gear = pose.pos + Vec2::from_hdg(pose.hdg) * self.tug.conn_offset();
            self.aircraft.hdg = normalize_hdg(pose.hdg + 180.0);
        }
        event
    }

    pub fn render<H: AssetHost + ?Sized>(&self, host: &mut H, cur_t: f64, d_t: f64) {
        self.tug.render(host, cur_t, d_t);
    }
}
