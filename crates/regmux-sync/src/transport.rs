//! Transport abstraction for peer calls.
//!
//! A transport delivers one [`Request`] to a peer instance and returns its
//! reply. Implementations may use sockets, a message router or anything
//! else; this crate ships an in-memory network for tests and embedding.

use async_trait::async_trait;
use regmux_core::{ApiError, InstanceId, RegLink, RegisterValues, RegistryId, VarValues};

use crate::error::{Result, SyncError};
use crate::messages::{Request, Response};

/// Delivery of requests to peer instances.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` to `peer` and wait for its reply.
    async fn request(&self, peer: &InstanceId, request: Request) -> Result<Response>;

    /// The local instance's identity.
    fn local_instance(&self) -> &InstanceId;
}

/// The serving side of a peer connection.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Handle one request from a peer.
    async fn handle(&self, request: Request) -> std::result::Result<Response, ApiError>;
}

/// A network instances join to serve requests and reach each other.
#[async_trait]
pub trait Network: Send + Sync {
    type Transport: Transport + Clone + 'static;

    /// A transport sending from `local`.
    fn connect(&self, local: InstanceId) -> Self::Transport;

    /// Start serving requests for `instance`.
    ///
    /// The network holds `handler` weakly; dropping the handler disconnects.
    async fn join(&self, instance: InstanceId, handler: std::sync::Weak<dyn RequestHandler>);

    /// Stop serving requests for `instance`.
    async fn leave(&self, instance: &InstanceId);
}

/// Typed helpers over [`Transport::request`].
#[async_trait]
pub trait TransportExt: Transport {
    /// Read every register of `registry` on `peer`.
    async fn get_all_registers(&self, peer: &InstanceId, registry: &RegistryId) -> Result<RegisterValues> {
        let request = Request::GetAll {
            registry: registry.clone(),
        };
        match self.request(peer, request).await? {
            Response::Registers { values } => Ok(values),
            other => Err(unexpected("reg.get_all", &other)),
        }
    }

    /// Add `link` to the link table of `target`.
    async fn add_link(&self, target: &RegLink, link: RegLink) -> Result<()> {
        let request = Request::AddLink {
            registry: target.registry.clone(),
            link,
        };
        expect_done(self.request(&target.instance, request).await?, "reg.add_link")
    }

    /// Remove `link` from the link table of `target`.
    async fn remove_link(&self, target: &RegLink, link: RegLink) -> Result<()> {
        let request = Request::RemoveLink {
            registry: target.registry.clone(),
            link,
        };
        expect_done(self.request(&target.instance, request).await?, "reg.remove_link")
    }

    /// Replace `namespace` at `location` on `peer`'s mux.
    async fn mux_clear_and_replace(
        &self,
        peer: &InstanceId,
        location: &str,
        namespace: &str,
        values: VarValues,
    ) -> Result<()> {
        let request = Request::MuxClearAndReplace {
            location: location.to_string(),
            namespace: namespace.to_string(),
            values,
        };
        expect_done(self.request(peer, request).await?, "mux.clear_and_replace")
    }
}

impl<T: Transport + ?Sized> TransportExt for T {}

fn expect_done(response: Response, method: &str) -> Result<()> {
    match response {
        Response::Done => Ok(()),
        other => Err(unexpected(method, &other)),
    }
}

fn unexpected(method: &str, response: &Response) -> SyncError {
    SyncError::TransportError(format!("unexpected reply to {}: {:?}", method, response))
}

/// A simple in-memory transport.
///
/// Requests and replies go through their wire encoding, so what a peer
/// receives is exactly what a real transport would deliver.
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Weak};

    use regmux_core::WireError;
    use serde::de::DeserializeOwned;
    use serde::Serialize;
    use tokio::sync::RwLock;

    /// Shared registry of the instances on one in-memory network.
    pub struct MemoryNetwork {
        handlers: RwLock<HashMap<InstanceId, Weak<dyn RequestHandler>>>,
    }

    impl MemoryNetwork {
        /// Create a new memory network.
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// Serve `instance` with `handler`, replacing any previous handler.
        ///
        /// The network only holds a weak reference; a dropped handler
        /// behaves like a disconnected peer.
        pub async fn register(&self, instance: InstanceId, handler: Weak<dyn RequestHandler>) {
            tracing::debug!(instance = %instance, "instance joined memory network");
            self.handlers.write().await.insert(instance, handler);
        }

        /// Stop serving `instance`.
        pub async fn unregister(&self, instance: &InstanceId) {
            tracing::debug!(instance = %instance, "instance left memory network");
            self.handlers.write().await.remove(instance);
        }

        /// Whether `instance` is currently served.
        pub async fn is_connected(&self, instance: &InstanceId) -> bool {
            self.handlers
                .read()
                .await
                .get(instance)
                .map(|h| h.strong_count() > 0)
                .unwrap_or(false)
        }

        /// Create a transport for `local` on this network.
        pub fn transport(self: &Arc<Self>, local: InstanceId) -> MemoryTransport {
            MemoryTransport {
                local,
                network: Arc::clone(self),
            }
        }

        async fn handler(&self, instance: &InstanceId) -> Option<Arc<dyn RequestHandler>> {
            self.handlers.read().await.get(instance).and_then(Weak::upgrade)
        }
    }

    impl Default for MemoryNetwork {
        fn default() -> Self {
            Self {
                handlers: RwLock::new(HashMap::new()),
            }
        }
    }

    #[async_trait]
    impl Network for Arc<MemoryNetwork> {
        type Transport = MemoryTransport;

        fn connect(&self, local: InstanceId) -> MemoryTransport {
            self.transport(local)
        }

        async fn join(&self, instance: InstanceId, handler: Weak<dyn RequestHandler>) {
            self.register(instance, handler).await;
        }

        async fn leave(&self, instance: &InstanceId) {
            self.unregister(instance).await;
        }
    }

    /// In-memory transport implementation.
    #[derive(Clone)]
    pub struct MemoryTransport {
        local: InstanceId,
        network: Arc<MemoryNetwork>,
    }

    #[async_trait]
    impl Transport for MemoryTransport {
        async fn request(&self, peer: &InstanceId, request: Request) -> Result<Response> {
            let Some(handler) = self.network.handler(peer).await else {
                return Err(SyncError::PeerNotConnected(peer.to_string()));
            };

            tracing::debug!(
                from = %self.local,
                to = %peer,
                method = request.method(),
                "peer request"
            );

            let request: Request = over_wire(&request)?;
            match handler.handle(request).await {
                Ok(response) => over_wire(&response),
                Err(e) => {
                    let wire: WireError = over_wire(&e.to_wire())?;
                    Err(SyncError::Peer(ApiError::from_wire(wire)))
                }
            }
        }

        fn local_instance(&self) -> &InstanceId {
            &self.local
        }
    }

    fn over_wire<T: Serialize + DeserializeOwned>(value: &T) -> Result<T> {
        serde_json::to_value(value)
            .and_then(serde_json::from_value)
            .map_err(|e| SyncError::TransportError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryNetwork;
    use super::*;
    use regmux_core::{LocationDoesNotExist, Regname};
    use std::sync::{Arc, Mutex};

    /// Records requests and answers with a fixed reply.
    struct Recorder {
        seen: Mutex<Vec<Request>>,
        reply: std::result::Result<Response, ApiError>,
    }

    impl Recorder {
        fn new(reply: std::result::Result<Response, ApiError>) -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::new(Vec::new()),
                reply,
            })
        }
    }

    #[async_trait]
    impl RequestHandler for Recorder {
        async fn handle(&self, request: Request) -> std::result::Result<Response, ApiError> {
            self.seen.lock().unwrap().push(request);
            self.reply.clone()
        }
    }

    async fn join(network: &Arc<MemoryNetwork>, id: &str, handler: &Arc<Recorder>) {
        let handler: Arc<dyn RequestHandler> = handler.clone();
        network.register(id.into(), Arc::downgrade(&handler)).await;
    }

    #[tokio::test]
    async fn test_request_reaches_peer() {
        let network = MemoryNetwork::new();
        let b = Recorder::new(Ok(Response::Done));
        join(&network, "b", &b).await;

        let a = network.transport("a".into());
        a.add_link(&RegLink::new("b", "0"), RegLink::new("a", "0"))
            .await
            .unwrap();

        let seen = b.seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![Request::AddLink {
                registry: RegistryId::root(),
                link: RegLink::new("a", "0"),
            }]
        );
    }

    #[tokio::test]
    async fn test_unknown_peer() {
        let network = MemoryNetwork::new();
        let a = network.transport("a".into());

        let err = a
            .get_all_registers(&"nobody".into(), &RegistryId::root())
            .await
            .unwrap_err();
        assert_eq!(err, SyncError::PeerNotConnected("nobody".into()));
    }

    #[tokio::test]
    async fn test_dropped_handler_is_disconnected() {
        let network = MemoryNetwork::new();
        let b = Recorder::new(Ok(Response::Done));
        join(&network, "b", &b).await;
        assert!(network.is_connected(&"b".into()).await);

        drop(b);
        assert!(!network.is_connected(&"b".into()).await);
    }

    #[tokio::test]
    async fn test_peer_error_decoded() {
        let network = MemoryNetwork::new();
        let missing = ApiError::LocationDoesNotExist(LocationDoesNotExist {
            location: "w:3".into(),
        });
        let b = Recorder::new(Err(missing.clone()));
        join(&network, "b", &b).await;

        let a = network.transport("a".into());
        let err = a
            .mux_clear_and_replace(&"b".into(), "w:3", "INFO", VarValues::new())
            .await
            .unwrap_err();
        assert_eq!(err, SyncError::Peer(missing));
    }

    #[tokio::test]
    async fn test_unexpected_reply() {
        let network = MemoryNetwork::new();
        let mut values = RegisterValues::new();
        values.insert(Regname::UNNAMED, "x".into());
        let b = Recorder::new(Ok(Response::Registers { values }));
        join(&network, "b", &b).await;

        let a = network.transport("a".into());
        let err = a
            .remove_link(&RegLink::new("b", "0"), RegLink::new("a", "0"))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::TransportError(_)));
    }

    #[tokio::test]
    async fn test_unregister() {
        let network = MemoryNetwork::new();
        let b = Recorder::new(Ok(Response::Done));
        join(&network, "b", &b).await;
        network.unregister(&"b".into()).await;

        let a = network.transport("a".into());
        assert!(a
            .get_all_registers(&"b".into(), &RegistryId::root())
            .await
            .is_err());
    }
}
