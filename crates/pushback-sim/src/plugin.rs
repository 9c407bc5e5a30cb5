//! Host integration shim.
//!
//! [`Plugin`] is what a simulator host talks to: lifecycle calls, operator
//! commands, the per-frame loop, the draw callback and the fixed-interval
//! partner poll. All entry points are synchronous and do bounded work.

use pushback_domain::{PartnerIndicator, PathSegment, PushbackError, Result, SyncRole, TugName};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::SimConfig;
use crate::host::{AssetHost, Notice, Notifier};
use crate::library::TugModel;
use crate::operation::{Aircraft, OpSignals, PushbackOp};
use crate::sync::{MirrorEvents, MirroredFields, SyncControl, SyncMachine, SyncState};

/// Operator commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// Start pushback, opening the planner first when there is no plan
    Start,
    /// Stop pushback (master only)
    Stop,
    /// Open the pushback planner
    StartPlanner,
    /// Close the pushback planner
    StopPlanner,
    /// Connect the tug before a plan exists
    ConnectFirst,
}

/// Host events
#[derive(Debug, Clone, PartialEq)]
pub enum HostMessage {
    AirportLoaded(String),
    PlaneLoaded(Aircraft),
    PlaneUnloaded,
}

/// Enablement of the four menu items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuState {
    pub pre_plan: bool,
    pub close_planner: bool,
    pub start: bool,
    pub stop: bool,
}

impl MenuState {
    pub const IDLE: Self = Self::new(true, false, true, false);
    pub const PLANNING: Self = Self::new(false, true, false, false);
    pub const DISABLED: Self = Self::new(false, false, false, false);

    pub const fn new(pre_plan: bool, close_planner: bool, start: bool, stop: bool) -> Self {
        Self {
            pre_plan,
            close_planner,
            start,
            stop,
        }
    }

    /// Connected ahead of the plan: only start (when planless) and stop.
    const fn late_plan(plan_empty: bool) -> Self {
        Self::new(false, false, plan_empty, true)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Planner {
    open: bool,
    start_after_plan: bool,
    late_plan_requested: bool,
}

/// The embeddable pushback plugin
#[derive(Debug)]
pub struct Plugin<H> {
    host: H,
    config: SimConfig,
    rng: StdRng,
    sync: SyncState,
    machine: SyncMachine,
    menu: MenuState,
    enabled: bool,
    aircraft: Option<Aircraft>,
    airport: String,
    plan: Vec<PathSegment>,
    planner: Planner,
    op: Option<PushbackOp>,
}

impl<H: AssetHost + Notifier> Plugin<H> {
    pub fn new(host: H, config: SimConfig) -> Self {
        Self::with_rng(host, config, StdRng::from_entropy())
    }

    /// Deterministic tug selection, for replays and tests.
    pub fn with_seed(host: H, config: SimConfig, seed: u64) -> Self {
        Self::with_rng(host, config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(host: H, config: SimConfig, rng: StdRng) -> Self {
        let machine = SyncMachine::new(config.sync_interval);
        Self {
            host,
            config,
            rng,
            sync: SyncState::new(),
            machine,
            menu: MenuState::DISABLED,
            enabled: false,
            aircraft: None,
            airport: String::new(),
            plan: Vec::new(),
            planner: Planner::default(),
            op: None,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn sync(&self) -> &SyncState {
        &self.sync
    }

    pub fn role(&self) -> SyncRole {
        self.machine.role()
    }

    pub fn menu(&self) -> MenuState {
        self.menu
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn planner_open(&self) -> bool {
        self.planner.open
    }

    pub fn operation(&self) -> Option<&PushbackOp> {
        self.op.as_ref()
    }

    pub fn enable(&mut self) {
        if self.enabled {
            warn!("plugin already enabled");
            return;
        }
        self.sync = SyncState::new();
        self.machine = SyncMachine::new(self.config.sync_interval);
        self.menu = MenuState::IDLE;
        self.enabled = true;
        info!("pushback plugin enabled");
    }

    pub fn disable(&mut self) {
        if !self.enabled {
            return;
        }
        self.fini();
        self.sync.reset();
        self.menu = MenuState::DISABLED;
        self.enabled = false;
        info!("pushback plugin disabled");
    }

    /// Host shutdown: everything `disable` does, and forget the loaded
    /// aircraft and airport.
    pub fn stop(&mut self) {
        self.disable();
        self.aircraft = None;
        self.airport.clear();
        info!("pushback plugin stopped");
    }

    /// Tear down any operation and planner state without notice.
    fn fini(&mut self) {
        if let Some(mut op) = self.op.take() {
            op.abort(&mut self.host);
        }
        self.sync.set_started(false);
        self.planner = Planner::default();
        self.plan.clear();
    }

    pub fn receive_message(&mut self, msg: HostMessage) {
        match msg {
            HostMessage::AirportLoaded(icao) => {
                info!(airport = %icao, "airport loaded");
                self.airport = icao;
            }
            HostMessage::PlaneLoaded(aircraft) => {
                info!(mtow = aircraft.mtow, ng_len = aircraft.ng_len, "aircraft loaded");
                self.aircraft = Some(aircraft);
            }
            HostMessage::PlaneUnloaded => {
                self.aircraft = None;
            }
        }
        // aircraft geometry changed, reinit from scratch
        self.fini();
        self.sync.clear_tug_name();
    }

    /// Planning collaborator output. On a slave with a connected tug the
    /// plan goes straight to the operation, gated by `plan_complete`.
    pub fn set_plan(&mut self, plan: Vec<PathSegment>) -> Result<()> {
        for seg in &plan {
            seg.validate()?;
        }
        if self.sync.slave_mode() {
            if let Some(op) = self.op.as_mut() {
                op.set_plan(plan.clone())?;
            }
        }
        self.plan = plan;
        Ok(())
    }

    /// Write to the slave-mode field. Applied on the next partner poll.
    pub fn write_slave_mode(&mut self, on: bool) -> Result<()> {
        self.sync.request_slave_mode(on)
    }

    pub fn mirrored_fields(&self) -> MirroredFields {
        self.sync.mirrored()
    }

    pub fn apply_mirrored(&mut self, fields: &MirroredFields) -> Result<MirrorEvents> {
        self.sync.apply_mirrored(fields)
    }

    pub fn handle_command(&mut self, cmd: Command) -> Result<()> {
        if !self.enabled {
            debug!(?cmd, "command ignored, plugin disabled");
            return Ok(());
        }
        debug!(?cmd, slave = self.sync.slave_mode(), "command");
        match cmd {
            Command::Start => self.cmd_start(),
            Command::Stop => self.cmd_stop(),
            Command::StartPlanner => {
                self.cmd_start_planner();
                Ok(())
            }
            Command::StopPlanner => self.cmd_stop_planner(),
            Command::ConnectFirst => self.cmd_connect_first(),
        }
    }

    fn cmd_start(&mut self) -> Result<()> {
        self.planner.open = false;
        let slave = self.sync.slave_mode();
        if self.plan.is_empty() && !slave {
            self.planner.open = true;
            self.planner.start_after_plan = true;
            self.menu = MenuState::PLANNING;
            self.host.notify(Notice::PlanStart);
            return Ok(());
        }
        if self.sync.started() {
            debug!("start ignored, operation already running");
            return Ok(());
        }
        self.planner.late_plan_requested = false;
        self.begin_operation()?;
        self.menu = MenuState::new(false, false, false, !slave);
        Ok(())
    }

    fn cmd_stop(&mut self) -> Result<()> {
        if self.sync.slave_mode() {
            debug!("stop ignored on slave");
            return Ok(());
        }
        self.sync.set_op_complete(true)
    }

    fn cmd_start_planner(&mut self) {
        if self.sync.slave_mode() || self.planner.late_plan_requested || self.sync.started() {
            return;
        }
        self.planner.open = true;
        self.menu = MenuState::PLANNING;
    }

    fn cmd_stop_planner(&mut self) -> Result<()> {
        if self.sync.slave_mode() || !self.planner.open {
            return Ok(());
        }
        self.planner.open = false;
        self.menu = MenuState::IDLE;
        let start_after_plan = std::mem::take(&mut self.planner.start_after_plan);

        if self.planner.late_plan_requested {
            self.menu = MenuState::late_plan(self.plan.is_empty());
            if !self.plan.is_empty() {
                if let Some(op) = self.op.as_mut() {
                    op.set_plan(self.plan.clone())?;
                }
                self.sync.set_plan_complete(true)?;
            }
        } else if start_after_plan {
            if !self.plan.is_empty() {
                return self.cmd_start();
            }
        } else if !self.plan.is_empty() {
            self.host.notify(Notice::PlanEnd);
        }
        Ok(())
    }

    fn cmd_connect_first(&mut self) -> Result<()> {
        if self.sync.started() {
            return Ok(());
        }
        self.planner.late_plan_requested = true;
        self.planner.open = false;
        if let Err(err) = self.begin_operation() {
            self.planner.late_plan_requested = false;
            return Err(err);
        }
        if !self.sync.slave_mode() {
            self.menu = MenuState::late_plan(self.plan.is_empty());
        }
        Ok(())
    }

    fn begin_operation(&mut self) -> Result<()> {
        let aircraft = self.aircraft.ok_or_else(|| {
            PushbackError::ConsistencyViolation("no aircraft loaded".to_string())
        })?;
        let model = if self.sync.slave_mode() {
            TugModel::by_name(self.sync.tug_name().as_str())?
        } else {
            let model = TugModel::select(aircraft.mtow, aircraft.ng_len, &mut self.rng)?;
            self.sync.set_tug_name(TugName::new(model.as_str())?)?;
            model
        };
        self.sync.clear_stage_flags();
        let op = PushbackOp::start(
            model,
            aircraft,
            &self.airport,
            self.plan.clone(),
            &self.config,
            &mut self.host,
        )?;
        self.op = Some(op);
        self.sync.set_started(true);
        Ok(())
    }

    /// Frame entry point.
    pub fn flight_loop(&mut self, cur_t: f64, d_t: f64) {
        if !self.enabled {
            return;
        }
        let Some(op) = self.op.as_mut() else { return };
        let signals = OpSignals {
            op_complete: self.sync.op_complete(),
            plan_complete: self.sync.plan_complete(),
        };
        let event = op.tick(&mut self.host, &self.config.sound, signals, cur_t, d_t);
        if event.segments_done && !self.sync.slave_mode() {
            if let Err(err) = self.sync.set_op_complete(true) {
                error!(error = %err, "failed to signal completion");
            }
        }
        if event.completed {
            self.done_notify();
        }
    }

    /// Draw entry point.
    pub fn draw(&mut self, cur_t: f64, d_t: f64) {
        if let Some(op) = self.op.as_ref() {
            op.render(&mut self.host, cur_t, d_t);
        }
    }

    fn done_notify(&mut self) {
        if let Some(op) = self.op.take() {
            info!(op_id = %op.id(), "pushback operation finished");
        }
        self.sync.set_started(false);
        self.planner.late_plan_requested = false;
        self.plan.clear();
        if !self.sync.slave_mode() {
            self.menu = MenuState::IDLE;
        }
        self.sync.clear_tug_name();
    }

    /// Fixed-interval partner poll. `None` when no sync add-on is present.
    /// Returns the seconds until the next poll.
    pub fn sync_check(&mut self, indicator: Option<PartnerIndicator>) -> f64 {
        if !self.enabled {
            return self.machine.interval();
        }
        let mut controls = Controls {
            host: &mut self.host,
            op: &mut self.op,
            menu: &mut self.menu,
            planner: &mut self.planner,
            plan: &mut self.plan,
        };
        if let Err(err) = self.machine.poll(indicator, &mut self.sync, &mut controls) {
            error!(error = %err, "sync poll failed");
        }
        self.machine.interval()
    }
}

/// Borrowed view of the plugin handed to the sync machine
struct Controls<'a, H> {
    host: &'a mut H,
    op: &'a mut Option<PushbackOp>,
    menu: &'a mut MenuState,
    planner: &'a mut Planner,
    plan: &'a mut Vec<PathSegment>,
}

impl<H: AssetHost + Notifier> SyncControl for Controls<'_, H> {
    fn operation_active(&self) -> bool {
        self.op.is_some()
    }

    fn abort_operation(&mut self, state: &mut SyncState) {
        if let Some(mut op) = self.op.take() {
            self.host.notify(Notice::SyncFailure);
            op.abort(&mut *self.host);
        }
        state.set_started(false);
    }

    fn set_controls_enabled(&mut self, enabled: bool) {
        *self.planner = Planner::default();
        self.plan.clear();
        *self.menu = if enabled {
            MenuState::IDLE
        } else {
            MenuState::DISABLED
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::RecordingHost;
    use crate::operation::PbStep;
    use pushback_domain::Vec2;

    fn aircraft() -> Aircraft {
        Aircraft {
            nose_gear: Vec2::ZERO,
            hdg: 0.0,
            mtow: 78_000.0,
            ng_len: 1.8,
        }
    }

    fn plan() -> Vec<PathSegment> {
        vec![PathSegment::straight(Vec2::new(0.0, -30.0))]
    }

    fn plugin() -> Plugin<RecordingHost> {
        let mut p = Plugin::with_seed(RecordingHost::new(), SimConfig::default(), 3);
        p.enable();
        p.receive_message(HostMessage::AirportLoaded("KJFK".to_string()));
        p.receive_message(HostMessage::PlaneLoaded(aircraft()));
        p
    }

    #[test]
    fn test_enable_sets_idle_menu() {
        let mut p = Plugin::with_seed(RecordingHost::new(), SimConfig::default(), 1);
        assert_eq!(p.menu(), MenuState::DISABLED);
        p.enable();
        assert_eq!(p.menu(), MenuState::IDLE);
        p.disable();
        assert_eq!(p.menu(), MenuState::DISABLED);
        assert!(!p.is_enabled());
    }

    #[test]
    fn test_disabled_plugin_ignores_partner_poll() {
        let mut p = plugin();
        p.disable();
        assert_eq!(p.sync_check(Some(PartnerIndicator::RemoteMaster)), 1.0);
        assert!(!p.sync().slave_mode());
        p.sync_check(None);
        assert_eq!(p.menu(), MenuState::DISABLED);
        assert_eq!(p.role(), SyncRole::Off);
    }

    #[test]
    fn test_stop_releases_everything_and_forgets_aircraft() {
        let mut p = plugin();
        p.set_plan(plan()).unwrap();
        p.handle_command(Command::Start).unwrap();
        p.flight_loop(0.05, 0.05);
        p.stop();
        assert!(!p.is_enabled());
        assert!(p.operation().is_none());
        assert_eq!(p.menu(), MenuState::DISABLED);
        assert_eq!(p.host().live_objects(), 0);
        assert_eq!(p.host().live_sounds(), 0);

        // a restart needs the aircraft again
        p.enable();
        p.set_plan(plan()).unwrap();
        assert!(matches!(
            p.handle_command(Command::Start),
            Err(PushbackError::ConsistencyViolation(_))
        ));
    }

    #[test]
    fn test_start_without_plan_opens_planner() {
        let mut p = plugin();
        p.handle_command(Command::Start).unwrap();
        assert!(p.planner_open());
        assert_eq!(p.menu(), MenuState::PLANNING);
        assert_eq!(p.host().notices(), &[Notice::PlanStart]);
        assert!(p.operation().is_none());

        // closing the planner with a plan starts the pushback
        p.set_plan(plan()).unwrap();
        p.handle_command(Command::StopPlanner).unwrap();
        assert!(!p.planner_open());
        assert!(p.sync().started());
        assert_eq!(p.menu(), MenuState::new(false, false, false, true));
        assert!(!p.sync().tug_name().is_empty());
    }

    #[test]
    fn test_preplan_announces_plan_end() {
        let mut p = plugin();
        p.handle_command(Command::StartPlanner).unwrap();
        p.set_plan(plan()).unwrap();
        p.handle_command(Command::StopPlanner).unwrap();
        assert_eq!(p.host().notices(), &[Notice::PlanEnd]);
        assert!(!p.sync().started());
        assert_eq!(p.menu(), MenuState::IDLE);
    }

    #[test]
    fn test_stop_sets_op_complete_and_finishes() {
        let mut p = plugin();
        p.set_plan(plan()).unwrap();
        p.handle_command(Command::Start).unwrap();
        let mut t = 0.0;
        for _ in 0..40 {
            t += 0.05;
            p.flight_loop(t, 0.05);
        }
        p.handle_command(Command::Stop).unwrap();
        assert!(p.sync().op_complete());
        for _ in 0..4_000 {
            t += 0.05;
            p.flight_loop(t, 0.05);
            if !p.sync().started() {
                break;
            }
        }
        assert!(!p.sync().started());
        assert!(p.operation().is_none());
        assert_eq!(p.menu(), MenuState::IDLE);
        assert!(p.sync().tug_name().is_empty());
        assert_eq!(p.host().live_objects(), 0);
    }

    #[test]
    fn test_connect_first_then_plan() {
        let mut p = plugin();
        p.handle_command(Command::ConnectFirst).unwrap();
        assert!(p.sync().started());
        assert_eq!(p.menu(), MenuState::new(false, false, true, true));
        // the planner cannot be opened directly, only through start
        p.handle_command(Command::StartPlanner).unwrap();
        assert!(!p.planner_open());
        p.handle_command(Command::Start).unwrap();
        assert!(p.planner_open());

        p.set_plan(plan()).unwrap();
        p.handle_command(Command::StopPlanner).unwrap();
        assert!(p.sync().plan_complete());
        assert_eq!(p.menu(), MenuState::new(false, false, false, true));

        let mut t = 0.0;
        let mut pushed = false;
        for _ in 0..4_000 {
            t += 0.05;
            p.flight_loop(t, 0.05);
            if p.operation().is_some_and(|op| op.step() == PbStep::Pushing) {
                pushed = true;
                break;
            }
        }
        assert!(pushed);
    }

    #[test]
    fn test_no_aircraft_fails_start() {
        let mut p = Plugin::with_seed(RecordingHost::new(), SimConfig::default(), 1);
        p.enable();
        p.set_plan(plan()).unwrap();
        assert!(matches!(
            p.handle_command(Command::Start),
            Err(PushbackError::ConsistencyViolation(_))
        ));
        assert!(!p.sync().started());
    }

    #[test]
    fn test_slave_gating() {
        let mut p = plugin();
        p.sync_check(Some(PartnerIndicator::RemoteMaster));
        assert_eq!(p.role(), SyncRole::Slave);
        assert_eq!(p.menu(), MenuState::DISABLED);

        p.handle_command(Command::StartPlanner).unwrap();
        assert!(!p.planner_open());
        p.handle_command(Command::Stop).unwrap();
        assert!(!p.sync().op_complete());

        // no tug name mirrored yet
        assert!(matches!(
            p.handle_command(Command::Start),
            Err(PushbackError::ConsistencyViolation(_))
        ));
    }

    #[test]
    fn test_role_switch_aborts_with_notice() {
        let mut p = plugin();
        p.set_plan(plan()).unwrap();
        p.handle_command(Command::Start).unwrap();
        p.flight_loop(0.05, 0.05);
        let interval = p.sync_check(Some(PartnerIndicator::RemoteMaster));
        assert_eq!(interval, 1.0);
        assert!(!p.sync().started());
        assert!(p.operation().is_none());
        assert_eq!(p.host().notices(), &[Notice::SyncFailure]);
        assert_eq!(p.host().live_objects(), 0);
        assert_eq!(p.menu(), MenuState::DISABLED);
    }

    #[test]
    fn test_slave_mode_write_refused_while_started() {
        let mut p = plugin();
        p.set_plan(plan()).unwrap();
        p.handle_command(Command::Start).unwrap();
        assert!(p.write_slave_mode(true).is_err());
        assert!(!p.sync().slave_mode());
    }

    #[test]
    fn test_plane_reload_tears_down() {
        let mut p = plugin();
        p.set_plan(plan()).unwrap();
        p.handle_command(Command::Start).unwrap();
        p.receive_message(HostMessage::PlaneLoaded(aircraft()));
        assert!(!p.sync().started());
        assert!(p.sync().tug_name().is_empty());
        assert_eq!(p.host().live_sounds(), 0);
        // no audible notice for a host-driven teardown
        assert!(p.host().notices().is_empty());
    }

    #[test]
    fn test_draw_renders_tug() {
        let mut p = plugin();
        p.set_plan(plan()).unwrap();
        p.handle_command(Command::Start).unwrap();
        p.draw(0.0, 0.05);
        assert_eq!(p.host().draw_count(), 3);
    }
}
