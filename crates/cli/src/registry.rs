//! Compiled contracts: one schema per contract, projected onto both surfaces.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use twinroom_core::{
    resolve, ContractIdentity, Engine, ParameterSet, RequestValidator, Schema, SchemaError,
};

use crate::commands::synth::CliGrammar;

/// HTTP view of a contract's parameters.
#[derive(Debug)]
pub struct HttpInterface {
    pub request_schema: Value,
    pub validator: RequestValidator,
}

/// A contract with both surfaces derived from the same resolved schema.
#[derive(Debug)]
pub struct CompiledContract {
    pub identity: ContractIdentity,
    pub schema: Schema,
    pub params: ParameterSet,
    pub cli: CliGrammar,
    pub http: HttpInterface,
}

impl CompiledContract {
    pub fn compile(identity: ContractIdentity, schema: Schema) -> Result<Self, SchemaError> {
        let params = schema.parameters();
        let request_schema = params.request_schema();
        let validator = RequestValidator::new(&request_schema)?;
        Ok(CompiledContract {
            cli: CliGrammar::new(&params),
            http: HttpInterface {
                request_schema,
                validator,
            },
            identity,
            schema,
            params,
        })
    }

    pub fn route(&self) -> String {
        self.identity.route()
    }

    /// Command about text: the metadata description, or a generic line.
    pub fn about(&self) -> String {
        if self.params.description.is_empty() {
            format!("Execute the contract {}", self.identity.stem())
        } else {
            self.params.description.clone()
        }
    }
}

/// All compiled contracts of one discovery pass, keyed by route. Read-only
/// once built.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    contracts: BTreeMap<String, Arc<CompiledContract>>,
}

impl Registry {
    /// Resolve and compile every contract. A contract whose schema fails to
    /// compile is skipped with a warning.
    pub fn build(contracts: Vec<ContractIdentity>, engine: &dyn Engine) -> Registry {
        let mut registry = Registry::default();
        for identity in contracts {
            let schema = resolve(&identity, engine);
            let route = identity.route();
            match CompiledContract::compile(identity, schema) {
                Ok(compiled) => registry.insert(compiled),
                Err(e) => log::warn!("{}: {}", route, e),
            }
        }
        registry
    }

    /// Add a compiled contract, replacing any contract with the same route.
    pub fn insert(&mut self, compiled: CompiledContract) {
        self.contracts.insert(compiled.route(), Arc::new(compiled));
    }

    pub fn get(&self, route: &str) -> Option<&Arc<CompiledContract>> {
        self.contracts.get(route)
    }

    /// Contracts in route order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<CompiledContract>> {
        self.contracts.values()
    }

    /// Identities in route order, for grouping.
    pub fn identities(&self) -> Vec<ContractIdentity> {
        self.iter().map(|c| c.identity.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.contracts.len()
    }
}
