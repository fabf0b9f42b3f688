// SPDX-License-Identifier: AGPL-3.0-only

//! `qnna`: command-line interface for the QNNA matrix-multiply accelerator.
//!
//! ```text
//! USAGE:
//!   qnna demo                        Run the four reference scenarios
//!   qnna run --m 8 --n 8 --k 8       One configure/start/wait cycle
//!   qnna status                      Decoded STATUS and dimension registers
//! ```
//!
//! Global flags override the `QNNA_*` environment; the default backend is
//! the simulated register file with a device model.

mod demo;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use qnna_driver::{BackendSelection, ClockKind, Dimensions, DriverConfig, DynController};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "qnna", about = "QNNA accelerator control CLI", version)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Args)]
struct GlobalArgs {
    /// Register backend: sim or hw.
    #[arg(long, global = true)]
    backend: Option<BackendSelection>,

    /// Physical base address of the register window (e.g. 0x80000000).
    #[arg(long, global = true, value_parser = parse_addr)]
    base: Option<u64>,

    /// Physical-memory device file.
    #[arg(long, global = true)]
    mem_path: Option<std::path::PathBuf>,

    /// Sleep between STATUS polls, in milliseconds.
    #[arg(long, global = true)]
    poll_interval_ms: Option<u64>,

    /// Count poll iterations instead of reading the wall clock.
    #[arg(long, global = true)]
    step_clock: bool,

    /// Simulated device latency in BUSY polls.
    #[arg(long, global = true)]
    busy_polls: Option<u32>,
}

#[derive(Subcommand)]
enum Cmd {
    /// Run the Basic, ReLU, Performance and Neural Network scenarios.
    Demo,
    /// Configure, kick and wait for one computation.
    Run {
        /// Operand rows.
        #[arg(long)]
        m: u16,
        /// Operand columns.
        #[arg(long)]
        n: u16,
        /// Inner dimension.
        #[arg(long)]
        k: u16,
        /// Apply ReLU to the output.
        #[arg(long)]
        relu: bool,
        /// Give up after this many milliseconds.
        #[arg(long, default_value_t = 1000)]
        timeout_ms: u64,
    },
    /// Print decoded STATUS and the dimension registers.
    Status,
}

fn parse_addr(text: &str) -> std::result::Result<u64, String> {
    qnna_driver::parse_u64(text).map_err(|e| e.to_string())
}

impl GlobalArgs {
    /// Layer the command-line flags over `config`.
    fn apply(&self, mut config: DriverConfig) -> DriverConfig {

        if let Some(backend) = self.backend {
            config = config.with_backend(backend);
        }
        if let Some(base) = self.base {
            config = config.with_base_addr(base);
        }
        if let Some(path) = &self.mem_path {
            config = config.with_mem_path(path);
        }
        if let Some(interval) = self.poll_interval_ms {
            config = config.with_poll_interval_ms(interval);
        }
        if self.step_clock {
            config = config.with_clock(ClockKind::Step);
        }
        if let Some(polls) = self.busy_polls {
            config = config.with_sim_busy_polls(Some(polls));
        }

        config
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let cli = Cli::parse();
    let env = DriverConfig::from_env().context("reading QNNA_* environment")?;
    let config = cli.global.apply(env);
    let mut ctl = DynController::from_config(&config)
        .with_context(|| format!("opening {:?} backend", config.backend))?;

    match cli.command {
        Cmd::Demo => cmd_demo(&mut ctl)?,
        Cmd::Run {
            m,
            n,
            k,
            relu,
            timeout_ms,
        } => cmd_run(&mut ctl, Dimensions::new(m, n, k), relu, timeout_ms)?,
        Cmd::Status => cmd_status(&mut ctl),
    }

    Ok(())
}

fn cmd_demo(ctl: &mut DynController) -> Result<()> {
    println!("QNNA scenarios on {}", ctl.registers().backend().backend_type());
    println!();

    let results = demo::run_all(ctl);
    for result in &results {
        let mark = if result.passed { "PASS" } else { "FAIL" };
        println!("[{mark}] {:<15} {}", result.name, result.detail);
    }

    let passed = results.iter().filter(|r| r.passed).count();
    println!();
    println!("{passed}/{} scenarios passed", results.len());

    if passed != results.len() {
        bail!("{} scenario(s) failed", results.len() - passed);
    }
    Ok(())
}

fn cmd_run(ctl: &mut DynController, dims: Dimensions, relu: bool, timeout_ms: u64) -> Result<()> {
    let report = ctl.run(dims, relu, timeout_ms);

    println!("Dimensions : {dims}");
    println!("ReLU       : {relu}");
    println!("Outcome    : {}", report.outcome);
    println!("Elapsed    : {} ms ({} polls)", report.elapsed_ms, report.polls);
    if ctl.clock().is_degraded() {
        println!("             (step clock: elapsed counts clock reads)");
    }

    if !report.outcome.is_success() {
        bail!("computation {} after {} ms", report.outcome, report.elapsed_ms);
    }
    println!("Throughput : {} ops/s", report.throughput_ops_per_sec());
    Ok(())
}

fn cmd_status(ctl: &mut DynController) {
    let status = ctl.read_status();
    let dims = ctl.read_dimensions();

    println!("Backend    : {}", ctl.registers().backend().backend_type());
    println!("STATUS     : {status} ({:#06x})", status.bits());
    println!("Dimensions : {dims}");
    println!();
    for (reg, value) in ctl.registers_mut().snapshot() {
        println!("  {:<8} {:#05x}  {value:#010x}", reg.name(), reg.offset());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "qnna",
            "--backend",
            "hw",
            "--base",
            "0x4000_0000",
            "--poll-interval-ms",
            "5",
            "--step-clock",
            "status",
        ])
        .unwrap();
        let config = cli.global.apply(DriverConfig::from_lookup(|_| None).unwrap());

        assert_eq!(config.backend, BackendSelection::Hardware);
        assert_eq!(config.base_addr, 0x4000_0000);
        assert_eq!(config.poll_interval_ms, 5);
        assert_eq!(config.clock, ClockKind::Step);
    }

    #[test]
    fn flags_win_over_environment() {
        let env = DriverConfig::from_lookup(|key| match key {
            "QNNA_BACKEND" => Some("hw".into()),
            "QNNA_POLL_INTERVAL_MS" => Some("50".into()),
            _ => None,
        })
        .unwrap();

        let cli = Cli::try_parse_from(["qnna", "--backend", "sim", "--busy-polls", "7", "demo"])
            .unwrap();
        let config = cli.global.apply(env);

        assert_eq!(config.backend, BackendSelection::Simulated);
        assert_eq!(config.poll_interval_ms, 50, "unset flag keeps environment value");
        assert_eq!(config.sim_busy_polls, Some(7));
    }

    #[test]
    fn run_requires_all_dimensions() {
        assert!(Cli::try_parse_from(["qnna", "run", "--m", "4", "--n", "4"]).is_err());

        let cli = Cli::try_parse_from(["qnna", "run", "--m", "4", "--n", "4", "--k", "2", "--relu"])
            .unwrap();
        match cli.command {
            Cmd::Run {
                m, n, k, relu, timeout_ms,
            } => {
                assert_eq!(Dimensions::new(m, n, k), Dimensions::new(4, 4, 2));
                assert!(relu);
                assert_eq!(timeout_ms, 1000);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn bad_base_address_is_rejected() {
        assert!(Cli::try_parse_from(["qnna", "--base", "0xZZ", "demo"]).is_err());
        assert!(Cli::try_parse_from(["qnna", "--backend", "fpga", "demo"]).is_err());
    }
}
