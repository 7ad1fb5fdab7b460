use std::io::Write;
use std::process::{Command, Stdio};
use std::thread;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use super::{Engine, EngineOutput};
use crate::error::EngineError;
use crate::payload::ExecutionPayload;

/// Runs contracts through an external `slangroom-exec` compatible program.
///
/// Inputs are written to the child's stdin as base64 lines in the order
/// conf, contract, keys, data, extra, context. Stdout is the output and
/// stderr the logs. `-i` asks for an introspection report instead.
#[derive(Debug, Clone)]
pub struct SlangroomExec {
    program: String,
}

impl SlangroomExec {
    pub fn new(program: impl Into<String>) -> Self {
        SlangroomExec {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn run(&self, args: &[&str], lines: Vec<String>) -> Result<EngineOutput, EngineError> {
        log::debug!("spawning {} {:?}", self.program, args);
        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| EngineError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        // stdin is fed from its own thread while stdout and stderr drain.
        let stdin = child.stdin.take();
        let writer = thread::spawn(move || -> std::io::Result<()> {
            if let Some(mut stdin) = stdin {
                for line in lines {
                    stdin.write_all(line.as_bytes())?;
                    stdin.write_all(b"\n")?;
                }
            }
            Ok(())
        });

        let result = child.wait_with_output()?;
        let written = writer
            .join()
            .unwrap_or_else(|_| Err(std::io::Error::other("stdin writer panicked")));

        let output = String::from_utf8_lossy(&result.stdout).into_owned();
        let logs = String::from_utf8_lossy(&result.stderr).into_owned();
        if !result.status.success() {
            return Err(EngineError::Failed {
                status: result.status.to_string(),
                logs,
            });
        }
        written?;
        Ok(EngineOutput { output, logs })
    }
}

fn encode(text: &str) -> String {
    STANDARD.encode(text.as_bytes())
}

impl Engine for SlangroomExec {
    fn exec(&self, payload: &ExecutionPayload) -> Result<EngineOutput, EngineError> {
        let lines = [
            &payload.conf,
            &payload.contract,
            &payload.keys,
            &payload.data,
            &payload.extra,
            &payload.context,
        ]
        .into_iter()
        .map(|s| encode(s))
        .collect();
        self.run(&[], lines)
    }

    fn introspect(&self, contract: &str) -> Result<String, EngineError> {
        self.run(&["-i"], vec![encode(contract)])
            .map(|out| out.output)
    }
}
