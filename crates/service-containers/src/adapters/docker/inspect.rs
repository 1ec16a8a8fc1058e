//! Tolerant parsing of `docker inspect` output.
//!
//! Docker's inspect JSON is large and loosely typed across versions, so it is
//! walked as a [`serde_json::Value`] instead of being deserialized into a
//! fixed schema. Anything unexpected inside a single port entry is skipped
//! without failing the rest of the container or the batch.

use crate::{Error, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// The parts of one inspected container this crate cares about
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct InspectedContainer {
    pub id: String,
    pub ports: BTreeMap<u16, u16>,
    pub labels: BTreeMap<String, String>,
    /// RFC 3339 creation time, e.g. `2024-05-01T10:00:00.123456789Z`
    pub created: Option<String>,
}

/// Parse the JSON array printed by `docker inspect`.
///
/// Elements that are not objects or carry no string `Id` are skipped.
pub(crate) fn parse_inspect(json: &str) -> Result<Vec<InspectedContainer>> {
    let value: Value = serde_json::from_str(json)?;
    let Value::Array(elements) = value else {
        return Err(Error::MalformedOutput {
            command: "docker inspect".to_string(),
            output: json.to_string(),
        });
    };

    Ok(elements.iter().filter_map(parse_container).collect())
}

fn parse_container(element: &Value) -> Option<InspectedContainer> {
    let Some(id) = element.get("Id").and_then(Value::as_str) else {
        debug!("Skipping inspect entry without an Id");
        return None;
    };

    let ports = element
        .pointer("/NetworkSettings/Ports")
        .and_then(Value::as_object)
        .map(|ports| {
            ports
                .iter()
                .filter_map(|(key, bindings)| parse_binding(id, key, bindings))
                .collect()
        })
        .unwrap_or_default();

    let labels = element
        .pointer("/Config/Labels")
        .and_then(Value::as_object)
        .map(|labels| {
            labels
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                .collect()
        })
        .unwrap_or_default();

    let created = element.get("Created").and_then(Value::as_str).map(str::to_string);

    Some(InspectedContainer {
        id: id.to_string(),
        ports,
        labels,
        created,
    })
}

/// Sort key for a docker `Created` timestamp.
///
/// Docker prints UTC with trailing fraction zeros trimmed, so plain string
/// order is wrong within one second (`.1Z` sorts after `.12Z`). The fraction
/// is padded to nanoseconds instead.
pub(crate) fn creation_key(created: &str) -> (String, String) {
    let created = created.trim();
    let seconds_end = created.find(['.', 'Z', '+']).unwrap_or(created.len());
    let (seconds, rest) = created.split_at(seconds_end);

    let fraction: String = rest
        .strip_prefix('.')
        .map(|rest| rest.chars().take_while(char::is_ascii_digit).collect())
        .unwrap_or_default();
    (seconds.to_string(), format!("{fraction:0<9}"))
}

/// One `"<port>/<proto>": [{"HostPort": ...}, ...]` entry
fn parse_binding(id: &str, key: &str, bindings: &Value) -> Option<(u16, u16)> {
    let port = key.split('/').next().unwrap_or(key);
    let Ok(container_port) = port.parse::<u16>() else {
        debug!("Container {}: skipping unparsable port key {:?}", id, key);
        return None;
    };

    let host_port = bindings
        .as_array()
        .into_iter()
        .flatten()
        .find_map(|binding| binding.get("HostPort").and_then(host_port));

    if host_port.is_none() {
        debug!("Container {}: no usable host port for {}", id, key);
    }
    host_port.map(|host_port| (container_port, host_port))
}

/// `HostPort` is a string in current docker versions and a number in some
/// older ones
fn host_port(value: &Value) -> Option<u16> {
    match value {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        _ => None,
    }
}
