//! VELA world server.
//!
//! Loads TOML configuration, opens the durable store, seeds a demo
//! sector, and runs the fixed-timestep tick loop with a periodic
//! write-back flush task.

mod config;
mod server;

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crossbeam_channel::unbounded;
use vela_persist::{EntityCache, EntityStore};
use vela_sim::TickLoop;

use crate::config::ServerConfig;
use crate::server::GameServer;

const DEFAULT_CONFIG_PATH: &str = "vela.toml";

fn print_usage() {
    println!("VELA world server");
    println!();
    println!("USAGE:");
    println!("    vela_server [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -c, --config <PATH>      Config file (default: {DEFAULT_CONFIG_PATH})");
    println!("    -t, --tick-rate <HZ>     Override the configured tick rate");
    println!("        --data-dir <PATH>    Override the configured data directory");
    println!("        --duration <SECS>    Exit after this many seconds");
    println!("    -h, --help               Show this help");
}

/// Wall-clock milliseconds since the UNIX epoch, stamped on snapshots.
fn wall_ms() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0.0, |d| d.as_secs_f64() * 1000.0)
}

#[allow(clippy::too_many_lines)]
fn main() {
    let mut config_path = DEFAULT_CONFIG_PATH.to_owned();
    let mut tick_rate_override: Option<u32> = None;
    let mut data_dir_override: Option<String> = None;
    let mut duration_secs: Option<u64> = None;

    let args: Vec<String> = std::env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                i += 1;
                if i < args.len() {
                    config_path.clone_from(&args[i]);
                }
            }
            "--tick-rate" | "-t" => {
                i += 1;
                if i < args.len() {
                    tick_rate_override = args[i].parse().ok();
                }
            }
            "--data-dir" => {
                i += 1;
                if i < args.len() {
                    data_dir_override = Some(args[i].clone());
                }
            }
            "--duration" => {
                i += 1;
                if i < args.len() {
                    duration_secs = args[i].parse().ok();
                }
            }
            "--help" | "-h" => {
                print_usage();
                return;
            }
            other => {
                eprintln!("unknown argument: {other}");
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let mut config = match ServerConfig::load_or_default(&config_path) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("config error: {error}");
            std::process::exit(1);
        }
    };
    if let Some(rate) = tick_rate_override {
        config.simulation.tick_rate = rate;
    }
    if let Some(dir) = data_dir_override {
        config.persistence.data_dir = dir.into();
    }

    println!("╔══════════════════════════════════════════════════╗");
    println!("║                VELA WORLD SERVER                 ║");
    println!("╠══════════════════════════════════════════════════╣");
    println!("║  Tick rate:  {:>4} Hz                             ║", config.simulation.tick_rate);
    println!("║  Cell size:  {:>7.1} units                       ║", config.interest.cell_size);
    println!("║  Flush every {:>6} ms                            ║", config.persistence.write_back_interval_ms);
    println!("╚══════════════════════════════════════════════════╝");

    let store = match EntityStore::open(&config.persistence.data_dir) {
        Ok(store) => store,
        Err(error) => {
            eprintln!(
                "cannot open data dir {}: {error}",
                config.persistence.data_dir.display()
            );
            std::process::exit(1);
        }
    };
    let cache = Arc::new(EntityCache::new(store, config.persistence.max_entry_age_ms));

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_time()
        .build()
    {
        Ok(runtime) => runtime,
        Err(error) => {
            eprintln!("cannot start flush runtime: {error}");
            std::process::exit(1);
        }
    };
    let flush_cache = Arc::clone(&cache);
    let flush_interval = Duration::from_millis(config.persistence.write_back_interval_ms.max(1));
    runtime.spawn(async move {
        let mut ticker = tokio::time::interval(flush_interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match flush_cache.flush() {
                Ok(0) => {}
                Ok(rows) => tracing::debug!(rows, "periodic flush"),
                Err(error) => tracing::error!(%error, "periodic flush failed"),
            }
        }
    });

    let mut server = GameServer::new(config.interest.cell_size, Arc::clone(&cache));
    let leader = server.seed_demo_sector();

    // Demo observer: a loopback connection attached to the fleet leader,
    // drained every tick so the delta path stays exercised.
    let (observer_tx, observer_rx) = unbounded();
    server.add_connection(leader, observer_tx);

    let mut tick_loop = TickLoop::new(config.simulation.tick_rate);
    let dt = tick_loop.dt_seconds();
    let stats_every = u64::from(config.simulation.tick_rate.max(1)) * 5;
    let started = Instant::now();
    let mut observer_packets: u64 = 0;
    let mut observer_bytes: u64 = 0;

    println!("Server running. Press Ctrl+C to stop.");

    'run: loop {
        tick_loop.wait_for_next_tick();
        while tick_loop.should_tick() {
            let tick_start = tick_loop.begin_tick();
            server.tick(dt, wall_ms());
            tick_loop.end_tick(tick_start);

            while let Ok(packet) = observer_rx.try_recv() {
                observer_packets += 1;
                observer_bytes += packet.len() as u64;
            }

            if tick_loop.tick_count() % stats_every == 0 {
                let stats = tick_loop.stats();
                let world = server.simulation().world();
                println!("┌──────────────── tick {:>8} ────────────────┐", tick_loop.tick_count());
                println!("│ avg tick: {:>6} us   max: {:>6} us   late: {:>4} │", stats.avg_tick_us, stats.max_tick_us, stats.late_ticks);
                println!("│ entities: {:>6}      pending writes: {:>6}    │", world.len(), cache.pending_writes());
                println!("│ observer: {:>6} pkts {:>9} bytes           │", observer_packets, observer_bytes);
                println!("└─────────────────────────────────────────────────┘");
            }

            if let Some(limit) = duration_secs {
                if started.elapsed() >= Duration::from_secs(limit) {
                    break 'run;
                }
            }
        }
    }

    match cache.flush() {
        Ok(rows) => println!("Final flush: {rows} rows."),
        Err(error) => eprintln!("final flush failed: {error}"),
    }

    let stats = tick_loop.stats();
    let metrics = server.metrics();
    let interest = server.interest().metrics();
    println!("╔══════════════════════════════════════════════════╗");
    println!("║                 SHUTDOWN SUMMARY                 ║");
    println!("╠══════════════════════════════════════════════════╣");
    println!("║  Ticks:             {:>12}                 ║", stats.total_ticks);
    println!("║  Avg tick:          {:>9} us                 ║", stats.avg_tick_us);
    println!("║  Late ticks:        {:>12}                 ║", stats.late_ticks);
    println!("║  Commands applied:  {:>12}                 ║", metrics.commands_applied);
    println!("║  Commands rejected: {:>12}                 ║", metrics.commands_rejected);
    println!("║  Interest cut:      {:>11.1}%                 ║", interest.reduction_ratio() * 100.0);
    println!("╚══════════════════════════════════════════════════╝");

    runtime.shutdown_timeout(Duration::from_secs(1));
}
