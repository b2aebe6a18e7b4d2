//! Host trait: the embedded scripting host behind the bridge.
//!
//! A host executes one call at a time and blocks its caller while doing so.
//! It is never called concurrently: the bridge owns it on a dedicated worker
//! thread and feeds it calls in submission order.

use serde_json::Value;

/// Error raised by a host while executing a call.
pub type HostRaise = Box<dyn std::error::Error + Send + Sync>;

/// The canonical dispatch entry point of an embedded scripting host.
///
/// `function` names an entry of the host's internal API (for example
/// `get_all_registers`); arguments are positional JSON primitives, and order
/// is significant. A well-behaved host answers with a map holding either a
/// `result` or an `error` key; the bridge checks that, not the host.
pub trait Host: Send + 'static {
    /// Execute one call, blocking until the host returns or raises.
    fn call(&mut self, function: &str, args: &[Value]) -> Result<Value, HostRaise>;
}

impl<F> Host for F
where
    F: FnMut(&str, &[Value]) -> Result<Value, HostRaise> + Send + 'static,
{
    fn call(&mut self, function: &str, args: &[Value]) -> Result<Value, HostRaise> {
        self(function, args)
    }
}
