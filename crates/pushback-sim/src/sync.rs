//! Master/slave synchronization.
//!
//! Two simulator instances share one pushback operation through a handful of
//! fields mirrored by an external add-on. The master writes `op_complete`,
//! `plan_complete` and `tug_name`; the slave only reads them. A change of
//! role is applied by [`SyncMachine::poll`], which aborts any running
//! operation before switching so a role change never happens silently in the
//! middle of a pushback.

use pushback_domain::{PartnerIndicator, PushbackError, Result, SyncRole, TugName};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Fields replicated from the master to the slave
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MirroredFields {
    pub op_complete: bool,
    pub plan_complete: bool,
    pub tug_name: TugName,
}

/// Rising edges observed while applying mirrored fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MirrorEvents {
    pub op_completed: bool,
    pub plan_completed: bool,
}

/// Process-wide sync fields of one instance
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SyncState {
    started: bool,
    slave_mode: bool,
    requested_slave_mode: Option<bool>,
    op_complete: bool,
    plan_complete: bool,
    tug_name: TugName,
}

impl SyncState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a pushback operation is active on this instance
    pub fn started(&self) -> bool {
        self.started
    }

    pub(crate) fn set_started(&mut self, started: bool) {
        self.started = started;
    }

    pub fn slave_mode(&self) -> bool {
        self.slave_mode
    }

    pub fn op_complete(&self) -> bool {
        self.op_complete
    }

    pub fn plan_complete(&self) -> bool {
        self.plan_complete
    }

    pub fn tug_name(&self) -> &TugName {
        &self.tug_name
    }

    /// Ask for a slave-mode change. Refused while an operation is active;
    /// otherwise applied on the next poll.
    pub fn request_slave_mode(&mut self, on: bool) -> Result<()> {
        if self.started {
            return Err(PushbackError::ConsistencyViolation(
                "slave mode cannot change while a pushback is in progress".to_string(),
            ));
        }
        self.requested_slave_mode = Some(on);
        Ok(())
    }

    fn master_only(&self, field: &str) -> Result<()> {
        if self.slave_mode {
            return Err(PushbackError::ConsistencyViolation(format!(
                "{field} is written by the master only"
            )));
        }
        Ok(())
    }

    pub fn set_op_complete(&mut self, on: bool) -> Result<()> {
        self.master_only("op_complete")?;
        if on && !self.op_complete {
            info!("operation complete signalled");
        }
        self.op_complete = on;
        Ok(())
    }

    pub fn set_plan_complete(&mut self, on: bool) -> Result<()> {
        self.master_only("plan_complete")?;
        self.plan_complete = on;
        Ok(())
    }

    pub fn set_tug_name(&mut self, name: TugName) -> Result<()> {
        self.master_only("tug_name")?;
        self.tug_name = name;
        Ok(())
    }

    /// Local gates reset when an operation starts, on either role.
    pub(crate) fn clear_stage_flags(&mut self) {
        self.op_complete = false;
        self.plan_complete = false;
    }

    /// Local teardown, on either role.
    pub(crate) fn clear_tug_name(&mut self) {
        self.tug_name.clear();
    }

    /// Back to defaults, as at plugin disable.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Snapshot for the transport.
    pub fn mirrored(&self) -> MirroredFields {
        MirroredFields {
            op_complete: self.op_complete,
            plan_complete: self.plan_complete,
            tug_name: self.tug_name.clone(),
        }
    }

    /// Take the master's fields. Only meaningful on a slave.
    pub fn apply_mirrored(&mut self, fields: &MirroredFields) -> Result<MirrorEvents> {
        if !self.slave_mode {
            return Err(PushbackError::ConsistencyViolation(
                "mirrored fields applied on a master instance".to_string(),
            ));
        }
        let events = MirrorEvents {
            op_completed: fields.op_complete && !self.op_complete,
            plan_completed: fields.plan_complete && !self.plan_complete,
        };
        if events.op_completed {
            debug!("op_complete observed from master");
        }
        self.op_complete = fields.op_complete;
        self.plan_complete = fields.plan_complete;
        self.tug_name = fields.tug_name.clone();
        Ok(events)
    }
}

/// Outcome of one poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTransition {
    Unchanged,
    /// Became slave; `aborted` when a running operation had to be stopped
    EnterSlave { aborted: bool },
    /// Stopped being slave
    LeaveSlave { aborted: bool },
}

/// Operations the sync machine needs from whoever owns the pushback
pub trait SyncControl {
    fn operation_active(&self) -> bool;
    /// Abort the running operation and notify the operator. Must leave
    /// `state.started()` false.
    fn abort_operation(&mut self, state: &mut SyncState);
    fn set_controls_enabled(&mut self, enabled: bool);
}

/// Role reconciliation, polled at a fixed interval
#[derive(Debug, Clone)]
pub struct SyncMachine {
    role: SyncRole,
    interval: f64,
}

impl SyncMachine {
    pub fn new(interval: f64) -> Self {
        Self {
            role: SyncRole::Off,
            interval,
        }
    }

    pub fn role(&self) -> SyncRole {
        self.role
    }

    /// Seconds until the next poll.
    pub fn interval(&self) -> f64 {
        self.interval
    }

    /// Reconcile the local role against the partner indicator. `None`
    /// means no sync add-on is present, in which case a pending
    /// [`SyncState::request_slave_mode`] decides.
    pub fn poll<C: SyncControl + ?Sized>(
        &mut self,
        indicator: Option<PartnerIndicator>,
        state: &mut SyncState,
        ctl: &mut C,
    ) -> Result<SyncTransition> {
        let requested = state.requested_slave_mode.take();
        let want_slave = match indicator {
            Some(indicator) => {
                if let Some(slave) = requested {
                    debug!(requested = slave, ?indicator, "slave-mode write overridden by partner indicator");
                }
                indicator == PartnerIndicator::RemoteMaster
            }
            None => requested.unwrap_or(state.slave_mode),
        };

        if want_slave == state.slave_mode {
            if !state.slave_mode {
                self.role = Self::idle_role(indicator);
            }
            return Ok(SyncTransition::Unchanged);
        }

        let aborted = ctl.operation_active();
        if aborted {
            warn!(to_slave = want_slave, "role switch while operating, aborting");
            ctl.abort_operation(state);
        }
        if state.started {
            return Err(PushbackError::ConsistencyViolation(
                "operation still active after sync abort".to_string(),
            ));
        }

        state.slave_mode = want_slave;
        ctl.set_controls_enabled(!want_slave);
        self.role = if want_slave {
            SyncRole::Slave
        } else {
            Self::idle_role(indicator)
        };
        info!(role = ?self.role, aborted, "sync role changed");

        Ok(if want_slave {
            SyncTransition::EnterSlave { aborted }
        } else {
            SyncTransition::LeaveSlave { aborted }
        })
    }

    fn idle_role(indicator: Option<PartnerIndicator>) -> SyncRole {
        match indicator {
            Some(PartnerIndicator::RemoteSlave) => SyncRole::Master,
            _ => SyncRole::Off,
        }
    }
}

impl Default for SyncMachine {
    fn default() -> Self {
        Self::new(1.0)
    }
}
