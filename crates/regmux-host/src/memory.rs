//! In-memory implementation of the Host trait.
//!
//! Speaks the same dispatch protocol as the embedded host, including its
//! encoding quirks (empty maps come back as `[]`), so everything above the
//! bridge can be exercised without an editor process. Clones share state,
//! which lets a test keep a handle while the bridge owns the host.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use regmux_core::{ErrorCode, LinkTable, RegLink, Reference, Scope};
use serde_json::{json, Map, Value};

use crate::traits::{Host, HostRaise};

type LocationKey = (Scope, i64);

/// In-memory scripting host.
#[derive(Clone, Default)]
pub struct MemoryHost {
    state: Arc<Mutex<HostState>>,
}

struct HostState {
    locations: HashMap<LocationKey, Location>,
    registers: BTreeMap<String, String>,
    links: LinkTable,
    loaded: bool,
    calls: Vec<String>,
    scripted: HashMap<String, VecDeque<Scripted>>,
    latency: Option<Duration>,
}

#[derive(Default)]
struct Location {
    parent: Option<LocationKey>,
    namespaces: HashMap<String, BTreeMap<String, String>>,
}

enum Scripted {
    Reply(Value),
    Raise(String),
}

impl Default for HostState {
    fn default() -> Self {
        let mut locations = HashMap::new();
        locations.insert((Scope::Session, 0), Location::default());
        Self {
            locations,
            registers: BTreeMap::new(),
            links: LinkTable::new(),
            loaded: false,
            calls: Vec::new(),
            scripted: HashMap::new(),
            latency: None,
        }
    }
}

impl MemoryHost {
    /// A host with only the current session location.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a location whose variables inherit from `parent`.
    pub fn add_location(&self, location: &Reference, parent: Option<&Reference>) {
        let mut state = self.lock();
        let entry = state
            .locations
            .entry((location.scope, location.target_id))
            .or_default();
        entry.parent = parent.map(|p| (p.scope, p.target_id));
    }

    /// Whether `mark_loaded` has been called.
    pub fn is_loaded(&self) -> bool {
        self.lock().loaded
    }

    /// Snapshot of the register slots, keyed by raw name.
    pub fn registers(&self) -> BTreeMap<String, String> {
        self.lock().registers.clone()
    }

    /// Set a register directly, as an editor user would.
    pub fn set_register(&self, name: &str, value: Option<&str>) {
        let mut state = self.lock();
        match value {
            Some(v) => {
                state.registers.insert(name.to_string(), v.to_string());
            }
            None => {
                state.registers.remove(name);
            }
        }
    }

    /// Snapshot of the link table.
    pub fn links(&self) -> LinkTable {
        self.lock().links.clone()
    }

    /// Variables set directly on a location.
    pub fn vars(&self, location: &Reference, namespace: &str) -> BTreeMap<String, String> {
        self.lock()
            .locations
            .get(&(location.scope, location.target_id))
            .and_then(|l| l.namespaces.get(namespace))
            .cloned()
            .unwrap_or_default()
    }

    /// Names of every function called so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Forget the recorded calls.
    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Answer the next call of `function` with `reply` instead of running it.
    pub fn script_reply(&self, function: &str, reply: Value) {
        self.script(function, Scripted::Reply(reply));
    }

    /// Make the next call of `function` raise `message`.
    pub fn script_failure(&self, function: &str, message: &str) {
        self.script(function, Scripted::Raise(message.to_string()));
    }

    /// Block every call for `latency` before running it.
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = Some(latency);
    }

    fn script(&self, function: &str, scripted: Scripted) {
        self.lock()
            .scripted
            .entry(function.to_string())
            .or_default()
            .push_back(scripted);
    }

    fn lock(&self) -> MutexGuard<'_, HostState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Host for MemoryHost {
    fn call(&mut self, function: &str, args: &[Value]) -> Result<Value, HostRaise> {
        let latency = self.lock().latency;
        if let Some(latency) = latency {
            std::thread::sleep(latency);
        }

        let mut state = self.lock();
        state.calls.push(function.to_string());

        if let Some(scripted) = state
            .scripted
            .get_mut(function)
            .and_then(VecDeque::pop_front)
        {
            return match scripted {
                Scripted::Reply(reply) => Ok(reply),
                Scripted::Raise(message) => Err(message.into()),
            };
        }

        state.dispatch(function, args)
    }
}

impl HostState {
    fn dispatch(&mut self, function: &str, args: &[Value]) -> Result<Value, HostRaise> {
        match function {
            "get_all_vars" => {
                let key = location_arg(args)?;
                let namespace = str_arg(args, 2)?;
                let Some(location) = self.locations.get(&key) else {
                    return Ok(location_dne(key));
                };
                let values = location.namespaces.get(namespace).cloned().unwrap_or_default();
                Ok(ok(json!({ "values": encode_map(values) })))
            }
            "resolve_all_vars" => {
                let key = location_arg(args)?;
                let namespace = str_arg(args, 2)?;
                match self.resolve(key, namespace) {
                    Some(values) => Ok(ok(json!({ "values": encode_map(values) }))),
                    None => Ok(location_dne(key)),
                }
            }
            "clear_and_replace_vars" => {
                let key = location_arg(args)?;
                let namespace = str_arg(args, 2)?.to_string();
                let values = string_map_arg(args, 3)?;
                let Some(location) = self.locations.get_mut(&key) else {
                    return Ok(location_dne(key));
                };
                location.namespaces.insert(namespace, values);
                Ok(ok(json!([])))
            }
            "set_multiple_vars" => {
                let key = location_arg(args)?;
                let namespace = str_arg(args, 2)?.to_string();
                let updates = update_map_arg(args, 3)?;
                let Some(location) = self.locations.get_mut(&key) else {
                    return Ok(location_dne(key));
                };
                apply_updates(location.namespaces.entry(namespace).or_default(), updates);
                Ok(ok(json!([])))
            }
            "get_location_info" => {
                let key = location_arg(args)?;
                let Some(location) = self.locations.get(&key) else {
                    return Ok(location_dne(key));
                };
                let parent = location
                    .parent
                    .map(|(scope, id)| Reference::new(scope, id).to_string());
                Ok(ok(json!({ "scope": key.0, "id": key.1, "parent": parent })))
            }
            "get_all_registers" => Ok(ok(json!({ "values": encode_map(self.registers.clone()) }))),
            "clear_and_replace_registers" => {
                self.registers = string_map_arg(args, 0)?;
                Ok(ok(json!([])))
            }
            "set_multiple_registers" => {
                let updates = update_map_arg(args, 0)?;
                apply_updates(&mut self.registers, updates);
                Ok(ok(json!([])))
            }
            "add_reg_link" => {
                let link = link_arg(args)?;
                self.links.add(&link);
                Ok(ok(json!([])))
            }
            "remove_reg_link" => {
                let link = link_arg(args)?;
                self.links.remove(&link);
                Ok(ok(json!([])))
            }
            "list_reg_links" => {
                let links = if self.links.is_empty() {
                    json!([])
                } else {
                    json!(self.links.counts())
                };
                Ok(ok(json!({ "links": links })))
            }
            "mark_loaded" => {
                self.loaded = true;
                Ok(ok(json!([])))
            }
            other => Err(format!("unknown function: {}", other).into()),
        }
    }

    /// Variables visible at `key`, outermost ancestor first so inner
    /// locations override.
    fn resolve(&self, key: LocationKey, namespace: &str) -> Option<BTreeMap<String, String>> {
        let mut chain = Vec::new();
        let mut cursor = Some(key);
        while let Some(current) = cursor {
            if chain.contains(&current) {
                break;
            }
            let location = self.locations.get(&current)?;
            chain.push(current);
            cursor = location.parent;
        }

        let mut resolved = BTreeMap::new();
        for current in chain.iter().rev() {
            if let Some(values) = self
                .locations
                .get(current)
                .and_then(|l| l.namespaces.get(namespace))
            {
                resolved.extend(values.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
        }
        Some(resolved)
    }
}

fn ok(result: Value) -> Value {
    json!({ "result": result })
}

fn location_dne((scope, id): LocationKey) -> Value {
    json!({
        "error": {
            "code": ErrorCode::LocationDoesNotExist.code(),
            "data": { "scope": scope.prefix(), "id": id },
        }
    })
}

fn encode_map(map: BTreeMap<String, String>) -> Value {
    if map.is_empty() {
        json!([])
    } else {
        json!(map)
    }
}

fn apply_updates(target: &mut BTreeMap<String, String>, updates: BTreeMap<String, Option<String>>) {
    for (key, value) in updates {
        match value {
            Some(v) => {
                target.insert(key, v);
            }
            None => {
                target.remove(&key);
            }
        }
    }
}

fn arg(args: &[Value], index: usize) -> Result<&Value, HostRaise> {
    args.get(index)
        .ok_or_else(|| format!("missing argument #{}", index + 1).into())
}

fn str_arg(args: &[Value], index: usize) -> Result<&str, HostRaise> {
    arg(args, index)?
        .as_str()
        .ok_or_else(|| format!("argument #{} must be a string", index + 1).into())
}

fn location_arg(args: &[Value]) -> Result<LocationKey, HostRaise> {
    let prefix = str_arg(args, 0)?;
    let scope = Scope::from_prefix(prefix).ok_or_else(|| format!("unknown scope: {}", prefix))?;
    let id = arg(args, 1)?
        .as_i64()
        .ok_or_else(|| "argument #2 must be an integer".to_string())?;
    Ok((scope, id))
}

fn link_arg(args: &[Value]) -> Result<RegLink, HostRaise> {
    Ok(RegLink::new(str_arg(args, 0)?, str_arg(args, 1)?))
}

fn table_arg(args: &[Value], index: usize) -> Result<Map<String, Value>, HostRaise> {
    match arg(args, index)? {
        Value::Object(map) => Ok(map.clone()),
        Value::Array(list) if list.is_empty() => Ok(Map::new()),
        _ => Err(format!("argument #{} must be a table", index + 1).into()),
    }
}

fn string_map_arg(args: &[Value], index: usize) -> Result<BTreeMap<String, String>, HostRaise> {
    table_arg(args, index)?
        .into_iter()
        .map(|(key, value)| match value {
            Value::String(s) => Ok((key, s)),
            _ => Err(format!("value for {} must be a string", key).into()),
        })
        .collect()
}

/// Null and empty lists both delete.
fn update_map_arg(
    args: &[Value],
    index: usize,
) -> Result<BTreeMap<String, Option<String>>, HostRaise> {
    table_arg(args, index)?
        .into_iter()
        .map(|(key, value)| match value {
            Value::String(s) => Ok((key, Some(s))),
            Value::Null => Ok((key, None)),
            Value::Array(list) if list.is_empty() => Ok((key, None)),
            _ => Err(format!("value for {} must be a string or nil", key).into()),
        })
        .collect()
}
