//! Pushback Simulator CLI
//!
//! Runs one pushback operation headless, optionally paired with a slave
//! instance that mirrors the master's sync fields every frame.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use pushback_domain::{PartnerIndicator, PathSegment, Vec2};
use pushback_sim::{Aircraft, Command, HostMessage, MirroredFields, Plugin, RecordingHost, SimConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PlanPreset {
    /// Straight back 30 m
    Straight,
    /// Back 10 m, then a right-hand quarter turn
    TurnRight,
    /// Back 10 m, then a left-hand quarter turn
    TurnLeft,
}

impl PlanPreset {
    /// Segments for an aircraft parked at the origin facing north; the tug
    /// pushes facing south.
    fn segments(self) -> Vec<PathSegment> {
        let back = PathSegment::straight(Vec2::new(0.0, -10.0));
        match self {
            Self::Straight => vec![PathSegment::straight(Vec2::new(0.0, -30.0))],
            Self::TurnRight => vec![back, PathSegment::turn(Vec2::new(-15.0, -25.0), 270.0)],
            Self::TurnLeft => vec![back, PathSegment::turn(Vec2::new(15.0, -25.0), 90.0)],
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "pushback-sim")]
#[command(about = "Simulate an automated aircraft pushback")]
struct Args {
    /// Aircraft maximum takeoff weight in kg
    #[arg(long, default_value = "78000")]
    mtow: f64,

    /// Nose gear strut length in m
    #[arg(long, default_value = "1.8")]
    ng_len: f64,

    /// Airport ICAO code
    #[arg(short, long, default_value = "KJFK")]
    airport: String,

    /// Built-in plan
    #[arg(short, long, value_enum, default_value = "straight")]
    plan: PlanPreset,

    /// JSON file with a list of path segments, overrides --plan
    #[arg(long)]
    plan_file: Option<PathBuf>,

    /// Frame time step in seconds
    #[arg(long, default_value = "0.05", value_parser = parse_step)]
    dt: f64,

    /// Maximum number of frames
    #[arg(long, default_value = "12000")]
    frames: u32,

    /// Run a paired slave instance
    #[arg(long)]
    slave: bool,

    /// Simulated time at which the partner link flips roles
    #[arg(long)]
    flip_at: Option<f64>,

    /// Pace frames in real time
    #[arg(long)]
    realtime: bool,

    /// Seed for tug selection
    #[arg(long)]
    seed: Option<u64>,

    /// Log as JSON lines
    #[arg(long)]
    json_logs: bool,
}

/// Frame steps must move simulated time forward.
fn parse_step(raw: &str) -> std::result::Result<f64, String> {
    let step: f64 = raw.parse().map_err(|err| format!("{raw}: {err}"))?;
    if step.is_finite() && step > 0.0 && step <= 1.0 {
        Ok(step)
    } else {
        Err(format!("{raw}: frame step must be in (0, 1] seconds"))
    }
}

fn load_plan(args: &Args) -> Result<Vec<PathSegment>> {
    let Some(path) = &args.plan_file else {
        return Ok(args.plan.segments());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading plan file {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing plan file {}", path.display()))
}

fn instance(args: &Args, config: SimConfig, seed_offset: u64) -> Plugin<RecordingHost> {
    let host = RecordingHost::new();
    let mut plugin = match args.seed {
        Some(seed) => Plugin::with_seed(host, config, seed.wrapping_add(seed_offset)),
        None => Plugin::new(host, config),
    };
    plugin.enable();
    plugin.receive_message(HostMessage::AirportLoaded(args.airport.clone()));
    plugin.receive_message(HostMessage::PlaneLoaded(Aircraft {
        nose_gear: Vec2::ZERO,
        hdg: 0.0,
        mtow: args.mtow,
        ng_len: args.ng_len,
    }));
    plugin
}

/// Copy the master's sync fields to the slave through their wire form.
fn mirror(master: &Plugin<RecordingHost>, slave: &mut Plugin<RecordingHost>) -> Result<()> {
    if master.sync().slave_mode() || !slave.sync().slave_mode() {
        return Ok(());
    }
    let wire = serde_json::to_string(&master.mirrored_fields())?;
    let fields: MirroredFields = serde_json::from_str(&wire)?;
    let events = slave.apply_mirrored(&fields)?;
    if events.op_completed {
        info!("slave observed op_complete");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::from_default_env().add_directive("pushback_sim=info".parse()?);
    if args.json_logs {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config = SimConfig::from_env();
    let plan = load_plan(&args)?;

    info!(
        "Starting pushback: MTOW {} kg, nose gear {} m at {} ({} segments)",
        args.mtow,
        args.ng_len,
        args.airport,
        plan.len()
    );

    let mut master = instance(&args, config.clone(), 0);
    let mut slave = args.slave.then(|| instance(&args, config.clone(), 1));

    let link = |flipped: bool, paired: bool| match (flipped, paired) {
        (true, _) => (Some(PartnerIndicator::RemoteMaster), Some(PartnerIndicator::Disconnected)),
        (false, true) => (Some(PartnerIndicator::RemoteSlave), Some(PartnerIndicator::RemoteMaster)),
        (false, false) => (None, None),
    };

    let (master_link, slave_link) = link(false, slave.is_some());
    let mut next_poll = master.sync_check(master_link);
    master.set_plan(plan.clone())?;
    master.handle_command(Command::Start)?;
    if let Some(slave) = slave.as_mut() {
        slave.sync_check(slave_link);
        mirror(&master, slave)?;
        slave.set_plan(plan)?;
        slave.handle_command(Command::Start)?;
    }

    let mut pacing = args
        .realtime
        .then(|| tokio::time::interval(Duration::from_secs_f64(args.dt)));
    let log_every = (1.0 / args.dt).round().max(1.0) as u32;

    for frame in 0..args.frames {
        if let Some(pacing) = pacing.as_mut() {
            pacing.tick().await;
        }
        let t = f64::from(frame) * args.dt;

        if t >= next_poll {
            let flipped = args.flip_at.is_some_and(|at| t >= at);
            let (master_link, slave_link) = link(flipped, slave.is_some());
            next_poll = t + master.sync_check(master_link);
            if let Some(slave) = slave.as_mut() {
                slave.sync_check(slave_link);
            }
        }

        master.flight_loop(t, args.dt);
        master.draw(t, args.dt);
        if let Some(slave) = slave.as_mut() {
            if let Err(err) = mirror(&master, slave) {
                warn!("Mirroring failed: {}", err);
            }
            slave.flight_loop(t, args.dt);
            slave.draw(t, args.dt);
        }

        if frame % log_every == 0 {
            if let Some(op) = master.operation() {
                let pose = op.tug().pose();
                info!(
                    "t={:.1}s | step {:?} | tug ({:.1}, {:.1}) hdg {:.0} | {:.1} m/s",
                    t,
                    op.step(),
                    pose.pos.x,
                    pose.pos.y,
                    pose.hdg,
                    op.tug().speed()
                );
            }
        }

        let slave_busy = slave.as_ref().is_some_and(|s| s.sync().started());
        if !master.sync().started() && !slave_busy {
            info!("Pushback finished at t={:.1}s", t);
            break;
        }
    }

    for notice in master.host().notices() {
        info!("Master notice: {}", notice.text());
    }
    if let Some(slave) = &slave {
        for notice in slave.host().notices() {
            info!("Slave notice: {}", notice.text());
        }
    }
    info!("Simulation complete!");

    Ok(())
}
