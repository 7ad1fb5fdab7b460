//! Schema resolution: sidecar metadata first, engine introspection otherwise.

use crate::engine::Engine;
use crate::error::MetadataError;
use crate::introspect;
use crate::locate::ContractIdentity;
use crate::metadata::load_metadata;
use crate::params::{ParameterSet, Schema};

/// Resolve the parameter schema of `contract`.
///
/// Never fails: a malformed sidecar yields [`Schema::Unresolved`] and a failed
/// introspection yields an empty derived schema, both with a warning, so one
/// bad contract does not stop the others from registering.
pub fn resolve(contract: &ContractIdentity, engine: &dyn Engine) -> Schema {
    match load_metadata(contract) {
        Ok(meta) => Schema::Explicit(ParameterSet::from_metadata(&meta)),
        Err(MetadataError::NotFound { .. }) => Schema::Derived(introspected(contract, engine)),
        Err(e) => {
            log::warn!("{}: {}", contract.relative_path, e);
            Schema::Unresolved
        }
    }
}

fn introspected(contract: &ContractIdentity, engine: &dyn Engine) -> ParameterSet {
    let report = match engine.introspect(&contract.content) {
        Ok(report) => report,
        Err(e) => {
            log::warn!("{}: introspection failed: {}", contract.relative_path, e);
            return ParameterSet::default();
        }
    };
    if report.trim().is_empty() {
        return ParameterSet::default();
    }
    match introspect::clean(&contract.content, &report) {
        Ok(codecs) => {
            log::debug!(
                "{}: {} input(s) from introspection",
                contract.relative_path,
                codecs.len()
            );
            ParameterSet::from_introspection(&codecs)
        }
        Err(e) => {
            log::warn!(
                "{}: failed to parse introspection data: {}",
                contract.relative_path,
                e
            );
            ParameterSet::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineOutput;
    use crate::error::EngineError;
    use crate::locate::{discover, ContractSource, EmbeddedTree};
    use crate::params::Origin;
    use crate::payload::ExecutionPayload;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Introspector {
        report: Result<String, ()>,
        calls: AtomicUsize,
    }

    impl Introspector {
        fn returning(report: &str) -> Self {
            Introspector {
                report: Ok(report.to_string()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl Engine for Introspector {
        fn exec(&self, _payload: &ExecutionPayload) -> Result<EngineOutput, EngineError> {
            unreachable!("resolution never executes contracts")
        }

        fn introspect(&self, _contract: &str) -> Result<String, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.report.clone().map_err(|_| EngineError::Failed {
                status: "exit status: 1".into(),
                logs: "boom".into(),
            })
        }
    }

    fn contract(tree: EmbeddedTree) -> ContractIdentity {
        discover(&[ContractSource::Embedded(tree)], ".slang")
            .contracts
            .remove(0)
    }

    #[test]
    fn metadata_overrides_introspection() {
        let greet = contract(
            EmbeddedTree::new("contracts")
                .with_file("greet.slang", "Given I have a 'string' named 'name'")
                .with_file("greet.metadata.json", r#"{"arguments": [{"name": "<name>"}]}"#),
        );
        let engine = Introspector::returning(r#"{"other": {"encoding": "string"}}"#);
        let schema = resolve(&greet, &engine);

        assert_eq!(schema.origin(), Some(Origin::ExplicitMetadata));
        let params = schema.parameters();
        assert_eq!(params.arguments[0].name, "name");
        assert!(params.options.is_empty());
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn missing_metadata_falls_back_to_introspection_without_outputs() {
        let body = "Given I have a 'string' named 'endpoint'\nThen print 'x' and output into 'result'";
        let fetch = contract(EmbeddedTree::new("contracts").with_file("fetch.slang", body));
        let engine = Introspector::returning(
            r#"{
                "endpoint": {"encoding": "string", "missing": true, "name": "endpoint", "zentype": "e"},
                "result": {"encoding": "string", "missing": true, "name": "result", "zentype": "e"}
            }"#,
        );
        let schema = resolve(&fetch, &engine);

        assert_eq!(schema.origin(), Some(Origin::DerivedIntrospection));
        let names: Vec<String> = schema.parameters().all().map(|p| p.name.clone()).collect();
        assert_eq!(names, vec!["endpoint"]);
    }

    #[test]
    fn malformed_metadata_is_unresolved_and_skips_introspection() {
        let broken = contract(
            EmbeddedTree::new("contracts")
                .with_file("broken.slang", "x")
                .with_file("broken.metadata.json", "{\"arguments\": 5}"),
        );
        let engine = Introspector::returning("{}");
        assert_eq!(resolve(&broken, &engine), Schema::Unresolved);
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn failed_introspection_gives_an_empty_derived_schema() {
        let plain = contract(EmbeddedTree::new("contracts").with_file("plain.slang", "x"));
        let engine = Introspector {
            report: Err(()),
            calls: AtomicUsize::new(0),
        };
        assert_eq!(
            resolve(&plain, &engine),
            Schema::Derived(ParameterSet::default())
        );
    }
}
