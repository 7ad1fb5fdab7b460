//! CLI grammar for one contract, and the flag validation that runs before it
//! executes.

use std::collections::HashSet;
use std::io::{self, Read};

use clap::{Arg, ArgAction, ArgMatches, Command};
use serde_json::{Map, Value};
use twinroom_core::{ComposeError, ExecutionPayload, FileSourcing, ParameterSet, TypeDesc};

/// Arg id holding the positional values of a contract command.
const ARGS_ID: &str = "arguments";

/// Long names owned by the surrounding command tree.
const RESERVED_LONG: [&str; 3] = ["daemon", "help", "version"];
const RESERVED_SHORT: [char; 3] = ['d', 'h', 'V'];

/// Failure while validating flags of a contract command.
#[derive(Debug, thiserror::Error)]
pub enum FlagError {
    #[error("error reading value for flag {flag} from stdin: {source}")]
    Stdin {
        flag: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to read file at path {path} for flag {flag}: {source}")]
    File {
        flag: String,
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid JSON in {flag}: {source}")]
    InvalidJson {
        flag: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid input '{value}' for flag: {flag}. Valid choices are: [{}]", choices.join(" "))]
    InvalidChoice {
        flag: String,
        value: String,
        choices: Vec<String>,
    },

    #[error(transparent)]
    Compose(#[from] ComposeError),
}

/// Where file-sourced flag content and environment fallbacks come from.
pub trait InputSource {
    fn read_stdin(&self) -> io::Result<Vec<u8>>;
    fn read_file(&self, path: &str) -> io::Result<Vec<u8>>;
    fn env(&self, name: &str) -> Option<String>;
}

/// The real process: standard input, the filesystem and the environment.
pub struct ProcessInputs;

impl InputSource for ProcessInputs {
    fn read_stdin(&self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        io::stdin().read_to_end(&mut buf)?;
        Ok(buf)
    }

    fn read_file(&self, path: &str) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn env(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// Validation rules of one flag.
#[derive(Debug, Clone)]
pub struct FlagSpec {
    pub name: String,
    pub choices: Vec<String>,
    pub env: Vec<String>,
    pub sourcing: FileSourcing,
    pub ty: TypeDesc,
}

/// Positional argument names and flags of one contract.
#[derive(Debug, Clone)]
pub struct CliGrammar {
    params: ParameterSet,
    pub arguments: Vec<(String, TypeDesc)>,
    pub required: usize,
    pub flags: Vec<FlagSpec>,
}

/// Raw values of one parsed invocation.
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    pub positionals: Vec<String>,
    /// Current value per flag, in declaration order; empty when not given.
    pub flags: Vec<(String, String)>,
}

impl CliGrammar {
    pub fn new(params: &ParameterSet) -> Self {
        let mut seen: HashSet<&str> = RESERVED_LONG.into_iter().collect();
        seen.insert(ARGS_ID);

        let mut flags = Vec::new();
        for option in &params.options {
            if option.name.is_empty() || !seen.insert(option.name.as_str()) {
                log::warn!("skipping flag '--{}': name already in use", option.name);
                continue;
            }
            flags.push(FlagSpec {
                name: option.name.clone(),
                choices: option.choices.clone(),
                env: option.env.clone(),
                sourcing: option.sourcing,
                ty: option.ty.clone(),
            });
        }

        CliGrammar {
            params: params.clone(),
            arguments: params
                .arguments
                .iter()
                .map(|a| (a.name.clone(), a.ty.clone()))
                .collect(),
            required: params.required_count(),
            flags,
        }
    }

    /// Maximum positional count; `None` when no arguments are declared.
    pub fn max_args(&self) -> Option<usize> {
        (!self.arguments.is_empty()).then_some(self.arguments.len())
    }

    /// Build the clap command for this contract.
    pub fn command(&self, name: &str, about: &str) -> Command {
        let mut cmd = Command::new(name.to_string()).about(about.to_string());

        // A single occurrence bounds the total count; Append would allow repeats.
        let positional = match self.max_args() {
            Some(max) => Arg::new(ARGS_ID)
                .action(ArgAction::Set)
                .num_args(self.required..=max)
                .value_names(self.arguments.iter().map(|(n, _)| n.clone()))
                .required(self.required > 0)
                .help(self.argument_help()),
            None => Arg::new(ARGS_ID)
                .action(ArgAction::Append)
                .num_args(0..)
                .value_name("ARGS")
                .hide(true),
        };
        cmd = cmd.arg(positional);

        let mut shorts: HashSet<char> = RESERVED_SHORT.into_iter().collect();
        for flag in &self.flags {
            let Some(option) = self.params.options.iter().find(|o| o.name == flag.name) else {
                continue;
            };
            let mut arg = Arg::new(flag.name.clone())
                .long(flag.name.clone())
                .action(ArgAction::Set)
                .help(option.flag_help())
                .hide(option.hidden);
            if let Some(short) = option.shorthand {
                if shorts.insert(short) {
                    arg = arg.short(short);
                } else {
                    log::warn!("flag '--{}': shorthand -{} already in use", flag.name, short);
                }
            }
            if let Some(default) = option.default_text() {
                arg = arg.default_value(default);
            }
            cmd = cmd.arg(arg);
        }
        cmd
    }

    fn argument_help(&self) -> String {
        self.params
            .arguments
            .iter()
            .filter(|a| !a.description.is_empty())
            .map(|a| format!("{}: {}", a.name, a.description))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Pull positional and flag values out of parsed matches.
    pub fn invocation(&self, matches: &ArgMatches) -> Invocation {
        let positionals = matches
            .get_many::<String>(ARGS_ID)
            .map(|vals| vals.cloned().collect())
            .unwrap_or_default();
        let flags = self
            .flags
            .iter()
            .map(|f| {
                let value = matches
                    .try_get_one::<String>(&f.name)
                    .ok()
                    .flatten()
                    .cloned()
                    .unwrap_or_default();
                (f.name.clone(), value)
            })
            .collect();
        Invocation { positionals, flags }
    }

    /// Run flag validation, then map positionals, and merge the resulting
    /// argument map into the payload's data channel.
    pub fn apply(
        &self,
        invocation: &Invocation,
        payload: &mut ExecutionPayload,
        inputs: &dyn InputSource,
    ) -> Result<Map<String, Value>, FlagError> {
        let mut args = Map::new();
        validate_flags(&self.flags, &invocation.flags, &mut args, payload, inputs)?;

        for ((name, ty), value) in self.arguments.iter().zip(&invocation.positionals) {
            args.insert(name.clone(), ty.coerce(value));
        }
        if !args.is_empty() {
            payload.merge_data(&args)?;
        }
        Ok(args)
    }
}

/// Per-flag validation, in declaration order:
///
/// 1. file-sourced flags read stdin (`-`) or the named file,
/// 2. JSON content is merged into `data` and the flag's own value cleared,
/// 3. raw content becomes the value (parsed JSON when it parses),
/// 4. empty values fall back to the first non-empty environment variable,
/// 5. non-empty values are recorded in `args`, converted to the declared type,
/// 6. the final value must be one of the declared choices (empty always passes).
pub fn validate_flags(
    flags: &[FlagSpec],
    values: &[(String, String)],
    args: &mut Map<String, Value>,
    payload: &mut ExecutionPayload,
    inputs: &dyn InputSource,
) -> Result<(), FlagError> {
    for flag in flags {
        let mut value = values
            .iter()
            .find(|(name, _)| *name == flag.name)
            .map(|(_, v)| v.clone())
            .unwrap_or_default();

        if flag.sourcing.from_file {
            let content = if value == "-" {
                Some(inputs.read_stdin().map_err(|source| FlagError::Stdin {
                    flag: flag.name.clone(),
                    source,
                })?)
            } else if !value.is_empty() {
                Some(inputs.read_file(&value).map_err(|source| FlagError::File {
                    flag: flag.name.clone(),
                    path: value.clone(),
                    source,
                })?)
            } else {
                None
            };

            if let Some(content) = content {
                if !flag.sourcing.raw {
                    let object: Map<String, Value> =
                        serde_json::from_slice(&content).map_err(|source| {
                            FlagError::InvalidJson {
                                flag: flag.name.clone(),
                                source,
                            }
                        })?;
                    payload.merge_data(&object)?;
                    value.clear();
                } else {
                    match serde_json::from_slice::<Value>(&content) {
                        Ok(parsed) => {
                            args.insert(flag.name.clone(), parsed);
                            value.clear();
                        }
                        Err(_) => value = String::from_utf8_lossy(&content).trim().to_string(),
                    }
                }
            }
        }

        if value.is_empty() {
            if let Some(found) = flag
                .env
                .iter()
                .filter_map(|name| inputs.env(name))
                .find(|v| !v.is_empty())
            {
                value = found;
            }
        }

        if !value.is_empty() {
            args.insert(flag.name.clone(), flag.ty.coerce(&value));
        }

        if !flag.choices.is_empty() && !value.is_empty() && !flag.choices.contains(&value) {
            return Err(FlagError::InvalidChoice {
                flag: flag.name.clone(),
                value,
                choices: flag.choices.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use twinroom_core::metadata::CommandMetadata;

    #[derive(Default)]
    struct FakeInputs {
        stdin: Option<&'static str>,
        files: HashMap<&'static str, &'static str>,
        env: HashMap<&'static str, &'static str>,
    }

    impl InputSource for FakeInputs {
        fn read_stdin(&self) -> io::Result<Vec<u8>> {
            self.stdin
                .map(|s| s.as_bytes().to_vec())
                .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn read_file(&self, path: &str) -> io::Result<Vec<u8>> {
            self.files
                .get(path)
                .map(|s| s.as_bytes().to_vec())
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such file"))
        }

        fn env(&self, name: &str) -> Option<String> {
            self.env.get(name).map(|s| s.to_string())
        }
    }

    fn grammar(metadata: &str) -> CliGrammar {
        let meta: CommandMetadata = serde_json::from_str(metadata).unwrap();
        CliGrammar::new(&ParameterSet::from_metadata(&meta))
    }

    fn run(
        grammar: &CliGrammar,
        argv: &[&str],
        inputs: &FakeInputs,
    ) -> Result<(Map<String, Value>, ExecutionPayload), FlagError> {
        let matches = grammar
            .command("greet", "")
            .try_get_matches_from(argv)
            .unwrap();
        let mut payload = ExecutionPayload::new("contract");
        let args = grammar.apply(&grammar.invocation(&matches), &mut payload, inputs)?;
        Ok((args, payload))
    }

    fn data(payload: &ExecutionPayload) -> Value {
        serde_json::from_str(&payload.data).unwrap()
    }

    #[test]
    fn positional_count_bounds() {
        let g = grammar(r#"{"arguments": [{"name": "<name>"}, {"name": "[title]"}]}"#);
        assert_eq!(g.required, 1);
        assert_eq!(g.max_args(), Some(2));

        let cmd = || g.command("greet", "");
        assert!(cmd().try_get_matches_from(["greet"]).is_err());
        assert!(cmd().try_get_matches_from(["greet", "Alice"]).is_ok());
        assert!(cmd().try_get_matches_from(["greet", "Alice", "Dr"]).is_ok());
        assert!(cmd()
            .try_get_matches_from(["greet", "Alice", "Dr", "extra"])
            .is_err());
    }

    #[test]
    fn all_required_arguments_reject_extras() {
        let g = grammar(r#"{"arguments": [{"name": "<a>"}, {"name": "<b>"}]}"#);
        let cmd = || g.command("pair", "");
        assert!(cmd().try_get_matches_from(["pair", "x"]).is_err());
        assert!(cmd().try_get_matches_from(["pair", "x", "y"]).is_ok());
        assert!(cmd().try_get_matches_from(["pair", "x", "y", "z"]).is_err());
    }

    #[test]
    fn single_required_argument_rejects_extras() {
        let g = grammar(r#"{"arguments": [{"name": "<name>"}]}"#);
        let cmd = || g.command("greet", "");
        assert!(cmd().try_get_matches_from(["greet", "Alice"]).is_ok());
        assert!(cmd()
            .try_get_matches_from(["greet", "Alice", "extra"])
            .is_err());

        let g = grammar(r#"{"arguments": [{"name": "[x]"}]}"#);
        let cmd = || g.command("opt", "");
        assert!(cmd().try_get_matches_from(["opt"]).is_ok());
        assert!(cmd().try_get_matches_from(["opt", "p", "q"]).is_err());
    }

    #[test]
    fn positional_argument_goes_to_data() {
        let g = grammar(r#"{"arguments": [{"name": "<name>"}]}"#);
        let (args, payload) = run(&g, &["greet", "Alice"], &FakeInputs::default()).unwrap();
        assert_eq!(Value::Object(args), json!({"name": "Alice"}));
        assert_eq!(data(&payload), json!({"name": "Alice"}));
    }

    #[test]
    fn environment_fallback_fills_empty_flag() {
        let g = grammar(r#"{"options": [{"name": "--name", "env": ["UNSET_NAME", "GREETING_NAME"]}]}"#);
        let inputs = FakeInputs {
            env: [("GREETING_NAME", "Bob")].into_iter().collect(),
            ..FakeInputs::default()
        };
        let (args, _) = run(&g, &["greet"], &inputs).unwrap();
        assert_eq!(Value::Object(args), json!({"name": "Bob"}));
    }

    #[test]
    fn command_line_value_beats_environment() {
        let g = grammar(r#"{"options": [{"name": "--name", "env": ["GREETING_NAME"]}]}"#);
        let inputs = FakeInputs {
            env: [("GREETING_NAME", "Bob")].into_iter().collect(),
            ..FakeInputs::default()
        };
        let (args, _) = run(&g, &["greet", "--name", "Carol"], &inputs).unwrap();
        assert_eq!(args["name"], json!("Carol"));
    }

    #[test]
    fn stdin_json_merges_into_data_and_clears_the_flag() {
        let g = grammar(r#"{"options": [{"name": "--input", "file": true}]}"#);
        let inputs = FakeInputs {
            stdin: Some(r#"{"k":1}"#),
            ..FakeInputs::default()
        };
        let (args, payload) = run(&g, &["greet", "--input", "-"], &inputs).unwrap();
        assert!(!args.contains_key("input"));
        assert_eq!(data(&payload), json!({"k": 1}));
    }

    #[test]
    fn file_json_must_be_an_object() {
        let g = grammar(r#"{"options": [{"name": "--input", "file": true}]}"#);
        let inputs = FakeInputs {
            files: [("in.json", "[1, 2]")].into_iter().collect(),
            ..FakeInputs::default()
        };
        let err = run(&g, &["greet", "--input", "in.json"], &inputs).unwrap_err();
        assert!(matches!(err, FlagError::InvalidJson { ref flag, .. } if flag == "input"));
    }

    #[test]
    fn unreadable_file_names_the_flag() {
        let g = grammar(r#"{"options": [{"name": "--input", "file": true}]}"#);
        let err = run(&g, &["greet", "--input", "missing.json"], &FakeInputs::default()).unwrap_err();
        assert!(matches!(err, FlagError::File { ref flag, .. } if flag == "input"));
        assert!(err.to_string().contains("missing.json"));
    }

    #[test]
    fn raw_content_is_parsed_or_trimmed() {
        let g = grammar(
            r#"{"options": [
                {"name": "--doc", "file": true, "rawdata": true},
                {"name": "--text", "file": true, "rawdata": true}
            ]}"#,
        );
        let inputs = FakeInputs {
            files: [("doc.json", "[1, 2]"), ("note.txt", "  hello there \n")]
                .into_iter()
                .collect(),
            ..FakeInputs::default()
        };
        let (args, _) = run(
            &g,
            &["greet", "--doc", "doc.json", "--text", "note.txt"],
            &inputs,
        )
        .unwrap();
        assert_eq!(args["doc"], json!([1, 2]));
        assert_eq!(args["text"], json!("hello there"));
    }

    #[test]
    fn invalid_choice_names_flag_value_and_choices() {
        let g = grammar(r#"{"options": [{"name": "--size", "choices": ["small", "large"]}]}"#);
        let err = run(&g, &["greet", "--size", "medium"], &FakeInputs::default()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid input 'medium' for flag: size. Valid choices are: [small large]"
        );
    }

    #[test]
    fn empty_value_passes_choice_check() {
        let g = grammar(r#"{"options": [{"name": "--size", "choices": ["small", "large"]}]}"#);
        let (args, payload) = run(&g, &["greet"], &FakeInputs::default()).unwrap();
        assert!(args.is_empty());
        assert_eq!(payload.data, "");

        let mut payload = ExecutionPayload::new("x");
        let mut args = Map::new();
        validate_flags(
            &g.flags,
            &[("size".to_string(), String::new())],
            &mut args,
            &mut payload,
            &FakeInputs::default(),
        )
        .unwrap();
    }

    #[test]
    fn default_value_is_used_when_flag_is_absent() {
        let g = grammar(r#"{"options": [{"name": "-s, --size", "default": "small", "choices": ["small", "large"]}]}"#);
        let (args, _) = run(&g, &["greet"], &FakeInputs::default()).unwrap();
        assert_eq!(args["size"], json!("small"));
        let (args, _) = run(&g, &["greet", "-s", "large"], &FakeInputs::default()).unwrap();
        assert_eq!(args["size"], json!("large"));
    }

    #[test]
    fn reserved_names_are_skipped() {
        let g = grammar(
            r#"{"options": [{"name": "-d, --daemon"}, {"name": "-h, --hat"}, {"name": "--hat"}]}"#,
        );
        let names: Vec<&str> = g.flags.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["hat"]);
        let matches = g
            .command("greet", "")
            .try_get_matches_from(["greet", "--hat", "fedora"])
            .unwrap();
        assert_eq!(g.invocation(&matches).flags[0].1, "fedora");
    }

    #[test]
    fn typed_arguments_are_coerced() {
        let g = grammar(r#"{"arguments": [{"name": "<count>", "type": "int"}]}"#);
        let (args, _) = run(&g, &["greet", "3"], &FakeInputs::default()).unwrap();
        assert_eq!(args["count"], json!(3));
    }
}
