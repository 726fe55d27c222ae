//! Check and fix: the reconciliation commands.
//!
//! Both resolve the profile, load the policy once, authenticate, and hand
//! off to the orchestrator. Ctrl-C cancels the batch: in-flight writes
//! finish, no new devices start, and the partial result is still printed.

use hvac_core::{BatchOptions, BatchResult, DeviceId, Orchestrator, RetryPolicy, StabilityPolicy};

use crate::cli::{CheckArgs, FixArgs, GlobalOpts};
use crate::config::{self, RunContext};
use crate::error::CliError;
use crate::output;

use super::util;

pub async fn check(args: CheckArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let ctx = config::resolve_context(global)?;
    let policy = load_policy(&ctx)?;
    let client = util::connect(&ctx).await?;

    let options = batch_options(&ctx, args.concurrency);
    let orchestrator = Orchestrator::new(&client, &client, &policy, options);
    install_ctrl_c(&orchestrator);

    let result = orchestrator
        .run_check(&[DeviceId::new(args.device)])
        .await?;

    print_result(&result, false, global);

    if result.has_failures() {
        return Err(CliError::BatchFailures {
            failed: result.summary.failed,
        });
    }
    if !result.is_all_stable() {
        return Err(CliError::DriftDetected {
            deviating: result.summary.deviating,
        });
    }
    Ok(())
}

pub async fn fix(args: FixArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let ctx = config::resolve_context(global)?;
    let policy = load_policy(&ctx)?;

    if !args.dry_run && !global.yes {
        if !std::io::IsTerminal::is_terminal(&std::io::stdin()) {
            return Err(CliError::NonInteractiveRequiresYes {
                target: args.device,
            });
        }
        if !util::confirm(
            &format!("Apply corrective actions to '{}'?", args.device),
            global.yes,
        )? {
            if !global.quiet {
                eprintln!("Aborted.");
            }
            return Ok(());
        }
    }

    let client = util::connect(&ctx).await?;
    let options = batch_options(&ctx, args.concurrency);
    let orchestrator = Orchestrator::new(&client, &client, &policy, options);
    install_ctrl_c(&orchestrator);

    let result = orchestrator
        .run_fix(&[DeviceId::new(args.device)], args.dry_run)
        .await?;

    print_result(&result, args.dry_run, global);

    if result.has_failures() {
        return Err(CliError::BatchFailures {
            failed: result.summary.failed,
        });
    }
    if !result.fix_succeeded(args.dry_run) {
        return Err(CliError::DriftDetected {
            deviating: result.summary.deviating,
        });
    }
    Ok(())
}

// ── Shared plumbing ─────────────────────────────────────────────────

fn load_policy(ctx: &RunContext) -> Result<StabilityPolicy, CliError> {
    if !ctx.policy_path.exists() {
        return Err(CliError::NoPolicy {
            path: ctx.policy_path.display().to_string(),
        });
    }
    Ok(hvac_config::load_policy(&ctx.policy_path)?)
}

fn batch_options(ctx: &RunContext, concurrency_flag: Option<usize>) -> BatchOptions {
    BatchOptions {
        concurrency: concurrency_flag.unwrap_or(ctx.concurrency),
        retry: RetryPolicy::default(),
    }
}

/// Cancel the batch on Ctrl-C. The orchestrator lets in-flight writes
/// finish so no device is left half-configured.
fn install_ctrl_c<C, R>(orchestrator: &Orchestrator<'_, C, R>)
where
    C: hvac_core::DeviceClient,
    R: hvac_core::DeviceRegistry,
{
    let cancel = orchestrator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received; finishing in-flight writes");
            cancel.cancel();
        }
    });
}

fn print_result(result: &BatchResult, dry_run: bool, global: &GlobalOpts) {
    let out = output::render_batch(&global.output, result);
    output::print_output(&out, global.quiet);
    if !global.quiet && matches!(global.output, crate::cli::OutputFormat::Table) {
        let color = output::should_color(&global.color);
        eprintln!("{}", output::batch_summary_line(result, dry_run, color));
    }
}
