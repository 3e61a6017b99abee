mod config;
mod session;
mod simulation;

use anyhow::Result;
use clap::Parser;

use config::SessionConfig;
use replica::{LinkConditions, TimestampPolicy};
use session::ReplicationSession;

#[derive(Parser)]
#[command(name = "replica-sim")]
#[command(about = "Runs a host and its guests in one process and reports how well they agree")]
struct Args {
    #[arg(short, long, default_value_t = 2, help = "Number of guests besides the host")]
    guests: u32,

    #[arg(short, long, default_value_t = 60, help = "Frames per second")]
    frame_rate: u32,

    #[arg(short, long, default_value_t = 10.0, help = "Session length in seconds")]
    duration: f32,

    #[arg(long, help = "Use loopback UDP sockets and the wall clock")]
    udp: bool,

    #[arg(long, default_value_t = 0.0, help = "Packet loss percentage (0-100)")]
    loss_percent: f32,

    #[arg(long, default_value_t = 0, help = "Minimum latency in ms")]
    min_latency: u32,

    #[arg(long, default_value_t = 0, help = "Maximum latency in ms")]
    max_latency: u32,

    #[arg(long, default_value_t = 0, help = "Jitter in ms")]
    jitter: u32,

    #[arg(long, default_value_t = 1, help = "Seed for simulated link randomness")]
    seed: u64,

    #[arg(long, help = "Refuse snapshots older than the stored one")]
    reject_stale: bool,

    #[arg(long, default_value_t = 1.0, help = "Seconds between position reports")]
    report_interval: f32,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = SessionConfig {
        frame_rate: args.frame_rate,
        duration_secs: args.duration,
        guests: args.guests,
        link: LinkConditions::lossy(
            args.loss_percent,
            args.min_latency,
            args.max_latency,
            args.jitter,
        ),
        seed: args.seed,
        timestamp_policy: if args.reject_stale {
            TimestampPolicy::RejectStale
        } else {
            TimestampPolicy::Unchecked
        },
        report_interval_secs: args.report_interval,
    };

    let mut session = if args.udp {
        ReplicationSession::udp(config)?
    } else {
        ReplicationSession::simulated(config)?
    };

    session.spawn_entities()?;
    log::info!(
        "session started: {} guests, {} fps, {:.1}s",
        args.guests,
        args.frame_rate,
        args.duration
    );

    if args.udp {
        session.run_realtime();
    } else {
        session.run_simulated();
    }

    session.report();
    session.log_stats();
    log::info!("session finished");
    Ok(())
}
