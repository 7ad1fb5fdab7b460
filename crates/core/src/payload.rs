//! Input composition: sidecar channel files plus caller data into one
//! execution payload.

use serde_json::{Map, Value};

use crate::error::ComposeError;
use crate::locate::ContractIdentity;

/// One JSON channel of an execution payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Data,
    Keys,
    Extra,
    Context,
    Conf,
}

impl Channel {
    pub const ALL: [Channel; 5] = [
        Channel::Data,
        Channel::Keys,
        Channel::Extra,
        Channel::Context,
        Channel::Conf,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Data => "data",
            Channel::Keys => "keys",
            Channel::Extra => "extra",
            Channel::Context => "context",
            Channel::Conf => "conf",
        }
    }
}

/// Everything the engine needs for one run. Each channel holds JSON text or
/// is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionPayload {
    pub contract: String,
    pub data: String,
    pub keys: String,
    pub extra: String,
    pub context: String,
    pub conf: String,
}

impl ExecutionPayload {
    pub fn new(contract: impl Into<String>) -> Self {
        ExecutionPayload {
            contract: contract.into(),
            ..ExecutionPayload::default()
        }
    }

    pub fn channel(&self, channel: Channel) -> &str {
        match channel {
            Channel::Data => &self.data,
            Channel::Keys => &self.keys,
            Channel::Extra => &self.extra,
            Channel::Context => &self.context,
            Channel::Conf => &self.conf,
        }
    }

    fn channel_mut(&mut self, channel: Channel) -> &mut String {
        match channel {
            Channel::Data => &mut self.data,
            Channel::Keys => &mut self.keys,
            Channel::Extra => &mut self.extra,
            Channel::Context => &mut self.context,
            Channel::Conf => &mut self.conf,
        }
    }

    /// Shallow-merge `incoming` into the data channel; top-level keys of
    /// `incoming` win. Nested objects are replaced, not combined.
    pub fn merge_data(&mut self, incoming: &Map<String, Value>) -> Result<(), ComposeError> {
        let mut merged: Map<String, Value> = if self.data.trim().is_empty() {
            Map::new()
        } else {
            serde_json::from_str(&self.data).map_err(ComposeError::DataChannel)?
        };
        for (key, value) in incoming {
            merged.insert(key.clone(), value.clone());
        }
        self.data = serde_json::to_string(&merged).map_err(ComposeError::Encode)?;
        Ok(())
    }

    /// Merge JSON object text into the data channel.
    pub fn merge_data_text(&mut self, path: &str, text: &str) -> Result<(), ComposeError> {
        let incoming: Map<String, Value> =
            serde_json::from_str(text).map_err(|source| ComposeError::InvalidJson {
                path: path.to_string(),
                source,
            })?;
        self.merge_data(&incoming)
    }
}

/// Build a payload from the contract text and its `<stem>.<channel>.json`
/// sidecars. Every present sidecar must hold a JSON object.
pub fn load_sidecars(contract: &ContractIdentity) -> Result<ExecutionPayload, ComposeError> {
    let mut payload = ExecutionPayload::new(contract.content.clone());
    for channel in Channel::ALL {
        let name = contract.sidecar_name(&format!("{}.json", channel.as_str()));
        let path = contract.sibling_location(&name);
        let Some(bytes) = contract
            .read_sibling(&name)
            .map_err(|source| ComposeError::Read {
                path: path.clone(),
                source,
            })?
        else {
            continue;
        };
        serde_json::from_slice::<Map<String, Value>>(&bytes)
            .map_err(|source| ComposeError::InvalidJson { path, source })?;
        *payload.channel_mut(channel) = String::from_utf8_lossy(&bytes).into_owned();
    }
    Ok(payload)
}

/// Sidecars of `contract` with `data` shallow-merged over their data channel.
pub fn compose(
    contract: &ContractIdentity,
    data: &Map<String, Value>,
) -> Result<ExecutionPayload, ComposeError> {
    let mut payload = load_sidecars(contract)?;
    if !data.is_empty() {
        payload.merge_data(data)?;
    }
    Ok(payload)
}
