use std::path::Path;
use std::process;

use clap::ArgMatches;
use twinroom_core::{discover, load_sidecars, ContractSource, ExecutionPayload};

use super::synth::ProcessInputs;
use super::{Context, RunMode};
use crate::registry::{CompiledContract, Registry};

/// Leaf command: sidecars, then flags and positionals, then run or serve.
pub(crate) fn cmd_run_contract(
    contract: &CompiledContract,
    matches: &ArgMatches,
    mode: RunMode,
    ctx: &Context,
) {
    let mut payload = match load_sidecars(&contract.identity) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    };

    let invocation = contract.cli.invocation(matches);
    if let Err(e) = contract.cli.apply(&invocation, &mut payload, &ProcessInputs) {
        eprintln!("error: {}", e);
        process::exit(1);
    }

    if mode.daemon {
        ctx.serve(ctx.registry.clone(), Some((contract.route(), payload)));
    } else {
        execute(ctx, &payload);
    }
}

/// Root command: `[folder] [path...]`.
pub(crate) fn cmd_run_path(folder: Option<&Path>, path: &[String], mode: RunMode, ctx: &Context) {
    let folder = folder.unwrap_or(&ctx.config.contracts);

    if path.is_empty() {
        if mode.daemon {
            ctx.serve(ctx.load_registry(folder), None);
            return;
        }
        eprintln!("error: no contract path given for folder {}", folder.display());
        process::exit(1);
    }

    let route = contract_route(path, &ctx.config.extension);
    let found = discover(&[ContractSource::directory(folder)], &ctx.config.extension);
    let Some(identity) = found.contracts.iter().find(|c| c.route() == route) else {
        eprintln!("File {} not found in folder {}", route, folder.display());
        process::exit(1);
    };

    let payload = match load_sidecars(identity) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    };

    if mode.daemon {
        let registry = Registry::build(found.contracts.clone(), ctx.engine.as_ref());
        ctx.serve(registry, Some((route, payload)));
    } else {
        execute(ctx, &payload);
    }
}

/// Join path segments into a route, dropping a trailing contract extension.
fn contract_route(path: &[String], extension: &str) -> String {
    let joined = path
        .iter()
        .map(|s| s.trim_matches('/'))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/");
    match joined.strip_suffix(extension) {
        Some(stripped) if !stripped.is_empty() => stripped.to_string(),
        _ => joined,
    }
}

/// Run the engine and print its output. Engine failures are reported with
/// their logs but do not change the exit status.
fn execute(ctx: &Context, payload: &ExecutionPayload) {
    match ctx.engine.exec(payload) {
        Ok(result) => {
            if !result.logs.trim().is_empty() {
                log::debug!("engine logs:\n{}", result.logs);
            }
            println!("{}", result.output);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            let logs = e.logs();
            if !logs.trim().is_empty() {
                eprintln!("{}", logs.trim_end());
            }
        }
    }
}
