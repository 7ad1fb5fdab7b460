//! Contracts compiled into the binary.
//!
//! They are always available; a file with the same relative path under the
//! configured contracts root replaces the built-in one.

use std::path::Path;

use twinroom_core::{discover, ContractSource, EmbeddedTree, Engine};

use crate::registry::Registry;

/// Root name of the built-in tree, shown in listings.
pub(crate) const ROOT: &str = "contracts";

pub(crate) fn tree() -> EmbeddedTree {
    EmbeddedTree::new(ROOT)
        .with_file("hello.slang", include_str!("../contracts/hello.slang"))
        .with_file(
            "hello.metadata.json",
            include_str!("../contracts/hello.metadata.json"),
        )
}

/// Built-in contracts overlaid with the contracts under `root`, when it exists.
pub(crate) fn load(root: &Path, extension: &str, engine: &dyn Engine) -> Registry {
    let tree = tree();
    let mut sources = vec![ContractSource::Embedded(tree.clone())];
    if root.is_dir() {
        sources.push(ContractSource::overlay(root, &tree));
    } else {
        log::info!("contracts folder '{}' not found", root.display());
    }
    let found = discover(&sources, extension);
    Registry::build(found.contracts, engine)
}
