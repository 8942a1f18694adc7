//! Money Transfer - demo runner
//!
//! Starts one transfer against the simulated ledger and prints state
//! snapshots until it reaches a terminal outcome.
//!
//! ```text
//! moneytransfer [--env dev] [--scenario HUMAN_IN_LOOP] [--amount 100] [--approve-after 10]
//! ```

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use tracing::info;

use moneytransfer::config::AppConfig;
use moneytransfer::logging::init_logging;
use moneytransfer::transfer::{
    ExecutionScenario, SimulatedLedger, TokioRuntime, TransferCoordinator, TransferParameters,
};

// ============================================================
// ARGUMENTS
// ============================================================

fn get_arg(names: &[&str]) -> Option<String> {
    let args: Vec<String> = std::env::args().collect();
    args.iter()
        .position(|a| names.contains(&a.as_str()))
        .and_then(|i| args.get(i + 1).cloned())
}

fn get_env() -> String {
    get_arg(&["--env", "-e"]).unwrap_or_else(|| "dev".to_string())
}

fn get_scenario() -> Result<ExecutionScenario> {
    match get_arg(&["--scenario", "-s"]) {
        Some(s) => ExecutionScenario::from_str(&s).map_err(anyhow::Error::msg),
        None => Ok(ExecutionScenario::Standard),
    }
}

fn get_amount() -> Result<Decimal> {
    match get_arg(&["--amount", "-a"]) {
        Some(s) => Decimal::from_str(&s).with_context(|| format!("Invalid amount: {}", s)),
        None => Ok(Decimal::new(100, 0)),
    }
}

fn get_approve_after() -> Result<Option<u64>> {
    get_arg(&["--approve-after"])
        .map(|s| {
            s.parse::<u64>()
                .with_context(|| format!("Invalid --approve-after: {}", s))
        })
        .transpose()
}

// ============================================================
// MAIN
// ============================================================

#[tokio::main]
async fn main() -> Result<()> {
    let env = get_env();
    let config = AppConfig::load(&env).with_context(|| format!("Loading config for {}", env))?;
    let _guard = init_logging(&config);

    let scenario = get_scenario()?;
    let amount = get_amount()?;
    let approve_after = get_approve_after()?;

    let ledger = Arc::new(SimulatedLedger::new());
    let runtime = Arc::new(TokioRuntime::new());
    let coordinator = TransferCoordinator::new(ledger.clone(), runtime, config.workflow.clone());

    let params = TransferParameters::new("account-1001", "account-2002", amount, scenario);
    let handle = coordinator.start(params)?;
    let transfer_id = handle.transfer_id();
    info!(transfer_id = %transfer_id, scenario = %scenario, amount = %amount, "Transfer submitted");

    if let Some(secs) = approve_after {
        let approver = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            match approver.approve_transfer_update() {
                Ok(reply) => info!(reply = %reply, "Approval update accepted"),
                Err(e) => info!(error = %e, "Approval update rejected"),
            }
        });
    }

    let reporter = handle.clone();
    let report_task = tokio::spawn(async move {
        loop {
            if let Ok(json) = serde_json::to_string(&reporter.get_state()) {
                println!("{}", json);
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    });

    let outcome = coordinator.wait_for(&transfer_id).await;
    report_task.abort();

    println!("{}", serde_json::to_string_pretty(&handle.get_state())?);
    println!(
        "ledger: withdrawn={} deposited={} undo={}",
        ledger.withdrawn_total(),
        ledger.deposited_total(),
        ledger.undo_count()
    );

    match outcome {
        Ok(charge) => {
            println!("Transfer {} finished, charge {}", transfer_id, charge.charge_id);
            Ok(())
        }
        Err(e) => Err(anyhow::anyhow!("Transfer {} failed [{}]: {}", transfer_id, e.code(), e)),
    }
}
