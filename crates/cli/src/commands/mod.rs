//! Command tree and dispatch.
//!
//! The tree is built at runtime from the discovered contracts: one nested
//! subcommand per directory segment and one leaf per contract.

pub(crate) mod list;
pub(crate) mod run;
pub(crate) mod synth;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Arg, ArgAction, ArgMatches, Command};
use twinroom_core::{discover, ContractSource, ContractTree, Engine, ExecutionPayload};

use crate::config::Config;
use crate::registry::Registry;
use crate::serve::{self, ServeOptions};

const DAEMON_ID: &str = "daemon";
const FOLDER_ID: &str = "folder";
const PATH_ID: &str = "path";
const LIST_CMD: &str = "list";

/// Whether a command executes directly or starts the HTTP surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RunMode {
    pub daemon: bool,
}

/// Everything a command handler needs, built once in `main`.
pub(crate) struct Context {
    pub config: Config,
    pub engine: Arc<dyn Engine>,
    /// Contracts of the configured root.
    pub registry: Registry,
    pub bin_name: String,
}

impl Context {
    /// Start the HTTP surface and block until shutdown. Exits on setup failure.
    pub(crate) fn serve(&self, registry: Registry, pinned: Option<(String, ExecutionPayload)>) {
        let options = ServeOptions {
            title: self.bin_name.clone(),
            port: self.config.port,
            request_timeout: self.config.request_timeout(),
            pinned,
        };
        if let Err(e) = serve::serve_blocking(registry, self.engine.clone(), options) {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    }

    /// Discover and compile the contracts under `folder`.
    pub(crate) fn load_registry(&self, folder: &Path) -> Registry {
        load_registry(folder, &self.config.extension, self.engine.as_ref())
    }
}

/// Discover and compile every contract under `folder`. A missing folder
/// yields an empty registry.
fn load_registry(folder: &Path, extension: &str, engine: &dyn Engine) -> Registry {
    if !folder.is_dir() {
        log::info!("contracts folder '{}' not found", folder.display());
        return Registry::default();
    }
    let found = discover(&[ContractSource::directory(folder)], extension);
    Registry::build(found.contracts, engine)
}

/// Build the full command line: root run, `list`, and the contract tree.
pub(crate) fn build_cli(bin_name: &str, registry: &Registry) -> Command {
    let mut root = Command::new(bin_name.to_string())
        .version(env!("CARGO_PKG_VERSION"))
        .about("Run contracts from the command line or serve them over HTTP")
        .arg_required_else_help(true)
        .args_conflicts_with_subcommands(true)
        .arg(
            Arg::new(DAEMON_ID)
                .short('d')
                .long("daemon")
                .help("Start the HTTP server instead of executing")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new(FOLDER_ID)
                .value_name("FOLDER")
                .help("Folder to search for contracts")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new(PATH_ID)
                .value_name("PATH")
                .help("Contract path inside FOLDER, without extension")
                .num_args(1..),
        )
        .subcommand(
            Command::new(LIST_CMD)
                .about("List the contracts in a folder")
                .arg(
                    Arg::new(FOLDER_ID)
                        .value_name("FOLDER")
                        .help("Folder to list (defaults to the configured contracts root)")
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        );

    let identities = registry.identities();
    let tree = ContractTree::build(&identities);
    for sub in subcommands(&tree, registry, &[LIST_CMD, "help"]) {
        root = root.subcommand(sub);
    }
    root
}

fn subcommands(tree: &ContractTree, registry: &Registry, reserved: &[&str]) -> Vec<Command> {
    let mut taken: HashSet<&str> = reserved.iter().copied().collect();
    let mut commands = Vec::new();

    for (name, child) in &tree.directories {
        if !taken.insert(name.as_str()) {
            log::warn!("directory '{}': command name already in use, skipping", name);
            continue;
        }
        let mut dir = Command::new(name.clone())
            .about(format!("Contracts in {}", name))
            .subcommand_required(true)
            .arg_required_else_help(true);
        for sub in subcommands(child, registry, &["help"]) {
            dir = dir.subcommand(sub);
        }
        commands.push(dir);
    }

    for identity in &tree.contracts {
        let stem = identity.stem();
        let Some(compiled) = registry.get(&identity.route()) else {
            continue;
        };
        if !taken.insert(stem) {
            log::warn!("{}: command name already in use, skipping", identity.route());
            continue;
        }
        commands.push(compiled.cli.command(stem, &compiled.about()));
    }
    commands
}

fn daemon(matches: &ArgMatches) -> bool {
    matches
        .try_get_one::<bool>(DAEMON_ID)
        .ok()
        .flatten()
        .copied()
        .unwrap_or(false)
}

/// Route parsed matches to the matching handler.
pub(crate) fn dispatch(matches: &ArgMatches, ctx: &Context) {
    let mut mode = RunMode {
        daemon: daemon(matches),
    };

    match matches.subcommand() {
        Some((LIST_CMD, sub)) => {
            mode.daemon |= daemon(sub);
            list::cmd_list(sub.get_one::<PathBuf>(FOLDER_ID).map(PathBuf::as_path), mode, ctx);
        }
        Some((name, sub)) => {
            let mut segments = vec![name.to_string()];
            let mut leaf = sub;
            while let Some((name, sub)) = leaf.subcommand() {
                segments.push(name.to_string());
                leaf = sub;
            }
            mode.daemon |= daemon(leaf);
            let route = segments.join("/");
            match ctx.registry.get(&route) {
                Some(contract) => run::cmd_run_contract(contract, leaf, mode, ctx),
                None => {
                    eprintln!("error: no contract at '{}'", route);
                    process::exit(1);
                }
            }
        }
        None => {
            let folder = matches.get_one::<PathBuf>(FOLDER_ID);
            let path: Vec<String> = matches
                .get_many::<String>(PATH_ID)
                .map(|vals| vals.cloned().collect())
                .unwrap_or_default();
            run::cmd_run_path(folder.map(PathBuf::as_path), &path, mode, ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use twinroom_core::{EmbeddedTree, EngineError, EngineOutput};

    struct Silent;

    impl Engine for Silent {
        fn exec(&self, _payload: &ExecutionPayload) -> Result<EngineOutput, EngineError> {
            Ok(EngineOutput::default())
        }

        fn introspect(&self, _contract: &str) -> Result<String, EngineError> {
            Ok(String::new())
        }
    }

    fn registry() -> Registry {
        let tree = EmbeddedTree::new("contracts")
            .with_file("greet.slang", "x")
            .with_file("greet.metadata.json", r#"{"arguments": [{"name": "<name>"}]}"#)
            .with_file("test/deep/hello.slang", "y")
            .with_file("list.slang", "z");
        let found = discover(&[ContractSource::Embedded(tree)], ".slang");
        Registry::build(found.contracts, &Silent)
    }

    fn names(cmd: &Command) -> Vec<String> {
        cmd.get_subcommands().map(|c| c.get_name().to_string()).collect()
    }

    #[test]
    fn tree_mirrors_directories() {
        let cli = build_cli("twinroom", &registry());
        let top = names(&cli);
        assert!(top.contains(&"greet".to_string()));
        assert!(top.contains(&"test".to_string()));

        let test = cli.find_subcommand("test").unwrap();
        let deep = test.find_subcommand("deep").unwrap();
        assert_eq!(names(deep), vec!["hello"]);
    }

    #[test]
    fn contract_named_like_a_builtin_is_skipped() {
        let cli = build_cli("twinroom", &registry());
        let lists = names(&cli).iter().filter(|n| *n == "list").count();
        assert_eq!(lists, 1);
    }

    #[test]
    fn leaf_matches_reach_the_contract_route() {
        let cli = build_cli("twinroom", &registry());
        let matches = cli
            .try_get_matches_from(["twinroom", "test", "deep", "hello", "-d"])
            .unwrap();
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "test");
        let (name, sub) = sub.subcommand().unwrap();
        assert_eq!(name, "deep");
        let (name, leaf) = sub.subcommand().unwrap();
        assert_eq!(name, "hello");
        assert!(daemon(leaf));
    }

    #[test]
    fn required_positional_is_enforced() {
        let cli = build_cli("twinroom", &registry());
        assert!(cli.clone().try_get_matches_from(["twinroom", "greet"]).is_err());
        assert!(cli
            .clone()
            .try_get_matches_from(["twinroom", "greet", "Alice", "extra"])
            .is_err());
        assert!(cli.try_get_matches_from(["twinroom", "greet", "Alice"]).is_ok());
    }

    #[test]
    fn root_takes_folder_and_path() {
        let cli = build_cli("twinroom", &registry());
        let matches = cli
            .try_get_matches_from(["twinroom", "contracts", "test", "deep", "hello"])
            .unwrap();
        assert!(matches.subcommand().is_none());
        assert_eq!(
            matches.get_one::<PathBuf>(FOLDER_ID).unwrap(),
            &PathBuf::from("contracts")
        );
        assert_eq!(matches.get_many::<String>(PATH_ID).unwrap().count(), 3);
    }
}
