//! # Pushback Simulator
//!
//! Tug motion, segment following and master/slave synchronization for
//! automated aircraft pushback inside a flight simulator.
//!
//! ## Features
//!
//! - Bicycle-model tug kinematics with wheel roll animation
//! - Segment follower driving straight and turn segments to tolerance
//! - Tug runtime object owning sounds, wheels and the segment queue
//! - Master/slave sync over a small set of mirrored fields
//! - Host shim with the operator commands and menu gating
//! - Headless host for the CLI and the tests

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod config;
pub mod follower;
pub mod headless;
pub mod host;
pub mod kinematics;
pub mod library;
pub mod operation;
pub mod plugin;
pub mod sound;
pub mod sync;
pub mod tug;

pub use config::SimConfig;
pub use follower::{FollowerConfig, FollowerState, SegmentFollower};
pub use headless::RecordingHost;
pub use host::{AssetHost, Notice, Notifier};
pub use library::TugModel;
pub use operation::{Aircraft, PbStep, PushbackOp};
pub use plugin::{Command, HostMessage, MenuState, Plugin};
pub use sync::{MirroredFields, SyncMachine, SyncState, SyncTransition};
pub use tug::{Tug, TugSpawn};
