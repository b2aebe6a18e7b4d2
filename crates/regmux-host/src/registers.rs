//! Typed client for the host's register slots and link table.
//!
//! Register functions report no domain errors; every failure is either a
//! host call failure or an invalid response.

use std::collections::BTreeMap;

use regmux_core::{InstanceId, LinkTable, RegLink, RegisterUpdates, RegisterValues, Regname, RegistryId};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::bridge::HostBridge;
use crate::error::Result;
use crate::reply::{map_or_empty, Empty, ValuesReply};

#[derive(Deserialize)]
struct LinksReply {
    #[serde(deserialize_with = "map_or_empty")]
    links: BTreeMap<InstanceId, RegistryCounts>,
}

#[derive(Deserialize)]
struct RegistryCounts(#[serde(deserialize_with = "map_or_empty")] BTreeMap<RegistryId, u32>);

/// Register functions of the host's internal API.
#[derive(Clone)]
pub struct RegClient {
    bridge: HostBridge,
}

impl RegClient {
    pub fn new(bridge: HostBridge) -> Self {
        Self { bridge }
    }

    /// Every set register. Names the host reports that are not valid
    /// register names are dropped.
    pub async fn get_all_registers(&self) -> Result<RegisterValues> {
        let reply: ValuesReply = self
            .bridge
            .call_api_no_error("get_all_registers", vec![])
            .await?;
        Ok(coerce_regnames(reply.values))
    }

    /// Replace every register with `values`.
    pub async fn clear_and_replace_registers(&self, values: &RegisterValues) -> Result<()> {
        let _: Empty = self
            .bridge
            .call_api_no_error("clear_and_replace_registers", vec![json!(values)])
            .await?;
        Ok(())
    }

    /// Set or delete (`None`) individual registers.
    pub async fn set_multiple_registers(&self, values: &RegisterUpdates) -> Result<()> {
        let _: Empty = self
            .bridge
            .call_api_no_error("set_multiple_registers", vec![encode_updates(values)])
            .await?;
        Ok(())
    }

    pub async fn add_link(&self, link: &RegLink) -> Result<()> {
        let _: Empty = self
            .bridge
            .call_api_no_error("add_reg_link", link_args(link))
            .await?;
        Ok(())
    }

    pub async fn remove_link(&self, link: &RegLink) -> Result<()> {
        let _: Empty = self
            .bridge
            .call_api_no_error("remove_reg_link", link_args(link))
            .await?;
        Ok(())
    }

    /// The host's link table.
    pub async fn list_links(&self) -> Result<LinkTable> {
        let reply: LinksReply = self.bridge.call_api_no_error("list_reg_links", vec![]).await?;
        let counts = reply
            .links
            .into_iter()
            .map(|(instance, registries)| (instance, registries.0))
            .collect();
        Ok(LinkTable::from_counts(counts))
    }

    /// Tell the host the process side is ready; doubles as a liveness probe.
    pub async fn mark_loaded(&self) -> Result<()> {
        let _: Empty = self.bridge.call_api_no_error("mark_loaded", vec![]).await?;
        Ok(())
    }
}

fn link_args(link: &RegLink) -> Vec<Value> {
    vec![json!(link.instance), json!(link.registry)]
}

/// Deletions travel to the host as empty lists; the host has no null inside
/// a table.
fn encode_updates(values: &RegisterUpdates) -> Value {
    let map: Map<String, Value> = values
        .iter()
        .map(|(name, value)| {
            let encoded = match value {
                Some(v) => Value::String(v.clone()),
                None => Value::Array(vec![]),
            };
            (name.to_string(), encoded)
        })
        .collect();
    Value::Object(map)
}

fn coerce_regnames(values: BTreeMap<String, String>) -> RegisterValues {
    values
        .into_iter()
        .filter_map(|(raw, value)| match Regname::parse(&raw) {
            Ok(name) => Some((name, value)),
            Err(e) => {
                tracing::error!(error = %e, "host returned an invalid register name");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::BridgeConfig;
    use crate::error::HostError;
    use crate::memory::MemoryHost;

    fn reg(c: &str) -> Regname {
        Regname::parse(c).unwrap()
    }

    fn client(host: &MemoryHost) -> RegClient {
        RegClient::new(HostBridge::start(host.clone(), BridgeConfig::default()).unwrap())
    }

    #[test]
    fn test_encode_updates() {
        let mut updates = RegisterUpdates::new();
        updates.insert(reg("a"), None);
        updates.insert(reg("b"), Some("v".into()));
        assert_eq!(encode_updates(&updates), json!({"a": [], "b": "v"}));
    }

    #[test]
    fn test_invalid_names_dropped() {
        let mut raw = BTreeMap::new();
        raw.insert("a".to_string(), "1".to_string());
        raw.insert("ab".to_string(), "2".to_string());
        raw.insert("!".to_string(), "3".to_string());
        let coerced = coerce_regnames(raw);
        assert_eq!(coerced.len(), 1);
        assert_eq!(coerced[&reg("a")], "1");
    }

    #[tokio::test]
    async fn test_partial_update() {
        let host = MemoryHost::new();
        let regs = client(&host);

        let mut initial = RegisterValues::new();
        initial.insert(reg("a"), "old".into());
        initial.insert(reg("c"), "keep".into());
        regs.clear_and_replace_registers(&initial).await.unwrap();

        let mut updates = RegisterUpdates::new();
        updates.insert(reg("a"), None);
        updates.insert(reg("b"), Some("v".into()));
        regs.set_multiple_registers(&updates).await.unwrap();

        let all = regs.get_all_registers().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[&reg("b")], "v");
        assert_eq!(all[&reg("c")], "keep");
    }

    #[tokio::test]
    async fn test_empty_registers() {
        let host = MemoryHost::new();
        let regs = client(&host);
        assert!(regs.get_all_registers().await.unwrap().is_empty());
        assert!(regs.list_links().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_link_refcount_through_host() {
        let host = MemoryHost::new();
        let regs = client(&host);
        let link = RegLink::new("peer", "0");

        regs.add_link(&link).await.unwrap();
        regs.add_link(&link).await.unwrap();
        regs.remove_link(&link).await.unwrap();
        assert!(regs.list_links().await.unwrap().contains(&link));

        regs.remove_link(&link).await.unwrap();
        assert!(!regs.list_links().await.unwrap().contains(&link));
    }

    #[tokio::test]
    async fn test_mark_loaded() {
        let host = MemoryHost::new();
        let regs = client(&host);
        assert!(!host.is_loaded());
        regs.mark_loaded().await.unwrap();
        assert!(host.is_loaded());
    }

    #[tokio::test]
    async fn test_scripted_garbage_is_invalid() {
        let host = MemoryHost::new();
        host.script_reply("list_reg_links", json!({"result": {"links": "nope"}}));
        let regs = client(&host);

        let err = regs.list_links().await.unwrap_err();
        assert!(matches!(err, HostError::InvalidResponse(_)));
    }
}
