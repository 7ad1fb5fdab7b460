use std::path::Path;

use twinroom_core::ContractIdentity;

use super::{Context, RunMode};

/// `list [folder]`: print every contract, or serve them with `-d`.
pub(crate) fn cmd_list(folder: Option<&Path>, mode: RunMode, ctx: &Context) {
    let registry = match folder {
        Some(folder) => ctx.load_registry(folder),
        None => ctx.registry.clone(),
    };

    if mode.daemon {
        ctx.serve(registry, None);
        return;
    }

    for identity in registry.identities() {
        println!("{}", found_line(&identity));
    }
}

fn found_line(identity: &ContractIdentity) -> String {
    format!(
        "Found file: {} (Path: {})",
        identity.stem(),
        identity.location()
    )
}
