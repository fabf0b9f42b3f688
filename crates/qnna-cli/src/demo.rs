// SPDX-License-Identifier: AGPL-3.0-only

//! Reference scenarios
//!
//! Every scenario starts with [`Controller::configure`], which resets the
//! device first, so scenarios do not depend on each other. The ReLU scenario
//! stops there and checks CONTROL; the others kick and wait.

use qnna_driver::regs::{control, Register};
use qnna_driver::{Clock, Controller, Dimensions, RegisterBackend};

/// What to verify once a scenario has completed.
#[derive(Debug, Clone, Copy)]
enum Check {
    /// DIM_M/N/K read back as configured
    Dimensions,
    /// Configure only, then CONTROL has ReLU set and the interrupt bit clear
    ReluControl,
    /// Report elapsed time and throughput
    Throughput,
    /// Completion is enough
    Completion,
}

#[derive(Debug, Clone, Copy)]
struct Scenario {
    name: &'static str,
    dims: Dimensions,
    relu: bool,
    timeout_ms: u64,
    check: Check,
}

const SCENARIOS: [Scenario; 4] = [
    Scenario {
        name: "Basic",
        dims: Dimensions::square(4),
        relu: false,
        timeout_ms: 500,
        check: Check::Dimensions,
    },
    Scenario {
        name: "ReLU",
        dims: Dimensions::square(4),
        relu: true,
        timeout_ms: 1000,
        check: Check::ReluControl,
    },
    Scenario {
        name: "Performance",
        dims: Dimensions::square(8),
        relu: false,
        timeout_ms: 2000,
        check: Check::Throughput,
    },
    Scenario {
        name: "Neural Network",
        dims: Dimensions::square(4),
        relu: true,
        timeout_ms: 1000,
        check: Check::Completion,
    },
];

/// Outcome of one scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    pub name: &'static str,
    pub passed: bool,
    pub detail: String,
}

/// Run every scenario in order on `ctl`.
pub fn run_all<B: RegisterBackend, C: Clock>(ctl: &mut Controller<B, C>) -> Vec<ScenarioResult> {
    SCENARIOS.iter().map(|s| run_one(ctl, s)).collect()
}

fn run_one<B: RegisterBackend, C: Clock>(
    ctl: &mut Controller<B, C>,
    scenario: &Scenario,
) -> ScenarioResult {
    tracing::info!("Scenario {}: {}", scenario.name, scenario.dims);

    let (passed, detail) = match scenario.check {
        // No kick: the check is on what configure leaves in CONTROL.
        Check::ReluControl => {
            ctl.configure(scenario.dims, scenario.relu);
            let word = ctl.registers_mut().read(Register::Control);
            let relu_set = word & control::RELU_ENABLE != 0;
            let irq_clear = word & control::IRQ_ENABLE == 0;
            (
                relu_set && irq_clear,
                format!("CONTROL={word:#x} relu={relu_set} irq_clear={irq_clear}"),
            )
        }
        check => run_and_check(ctl, scenario, check),
    };

    ScenarioResult {
        name: scenario.name,
        passed,
        detail,
    }
}

fn run_and_check<B: RegisterBackend, C: Clock>(
    ctl: &mut Controller<B, C>,
    scenario: &Scenario,
    check: Check,
) -> (bool, String) {
    let report = ctl.run(scenario.dims, scenario.relu, scenario.timeout_ms);
    let elapsed = elapsed_label(report.elapsed_ms, ctl.clock().is_degraded());

    if !report.outcome.is_success() {
        return (false, format!("{} after {elapsed}", report.outcome));
    }

    match check {
        Check::Dimensions => {
            let read_back = ctl.read_dimensions();
            if read_back == scenario.dims {
                (true, format!("{read_back} read back"))
            } else {
                (false, format!("wrote {} but read {read_back}", scenario.dims))
            }
        }
        Check::Throughput => (
            true,
            format!("{elapsed}, {} ops/s", report.throughput_ops_per_sec()),
        ),
        Check::Completion | Check::ReluControl => (true, format!("{} polls", report.polls)),
    }
}

/// Elapsed figure with its unit; a step clock counts clock reads.
fn elapsed_label(elapsed: u64, degraded: bool) -> String {
    if degraded {
        format!("{elapsed} clock reads")
    } else {
        format!("{elapsed} ms")
    }
}
