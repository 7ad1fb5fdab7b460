mod builtin;
mod commands;
mod config;
mod logging;
mod registry;
mod serve;

use std::path::Path;
use std::process;
use std::sync::Arc;

use twinroom_core::{Engine, SlangroomExec};

use crate::commands::Context;
use crate::config::Config;

const DEFAULT_BIN_NAME: &str = "twinroom";

/// Name the binary was invoked as, used for the root command and the
/// OpenAPI title.
fn bin_name() -> String {
    std::env::args_os()
        .next()
        .and_then(|arg| {
            Path::new(&arg)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_BIN_NAME.to_string())
}

fn main() {
    let (config, warnings) = match Config::load() {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    };
    logging::init(&config.log_level);
    for warning in &warnings {
        log::warn!("{}", warning);
    }

    let engine: Arc<dyn Engine> = Arc::new(SlangroomExec::new(config.engine.clone()));
    let registry = builtin::load(&config.contracts, &config.extension, engine.as_ref());
    log::debug!(
        "{} contract(s) under '{}'",
        registry.len(),
        config.contracts.display()
    );

    let bin_name = bin_name();
    let matches = commands::build_cli(&bin_name, &registry).get_matches();
    let ctx = Context {
        config,
        engine,
        registry,
        bin_name,
    };
    commands::dispatch(&matches, &ctx);
}
