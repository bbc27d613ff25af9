use crate::config::{NodeConfig, DEFAULT_IDENTIFIER};
use crate::error::{ObsidianError, Result};
use crate::node::Node;
use crate::voice::VoiceGateway;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

pub(crate) struct RegistryInner {
    nodes: Mutex<HashMap<String, Node>>,
    gateway: Arc<dyn VoiceGateway>,
}

impl RegistryInner {
    fn nodes(&self) -> MutexGuard<'_, HashMap<String, Node>> {
        self.nodes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn remove(&self, identifier: &str) -> Option<Node> {
        self.nodes().remove(identifier)
    }

    /// Unregister `node` only if it is the one stored under its identifier
    pub(crate) fn remove_node(&self, node: &Node) -> bool {
        let mut nodes = self.nodes();
        if nodes.get(node.identifier()).is_some_and(|stored| stored.same_node(node)) {
            nodes.remove(node.identifier());
            return true;
        }
        false
    }
}

/// Set of connected nodes keyed by identifier
///
/// Owned by the application; every node created through
/// [`initiate`](Self::initiate) shares the registry's voice gateway.
#[derive(Clone)]
pub struct NodeRegistry {
    inner: Arc<RegistryInner>,
}

impl NodeRegistry {
    pub fn new(gateway: Arc<dyn VoiceGateway>) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                nodes: Mutex::new(HashMap::new()),
                gateway,
            }),
        }
    }

    /// Create, connect and register a node
    ///
    /// Fails with [`ObsidianError::AlreadyExists`] if the identifier is
    /// taken; the registry is left untouched on any failure.
    pub async fn initiate(&self, config: NodeConfig) -> Result<Node> {
        let identifier = config.identifier.clone();
        if self.inner.nodes().contains_key(&identifier) {
            return Err(ObsidianError::AlreadyExists(identifier));
        }

        let node = Node::new(config, self.inner.gateway.clone())?;
        node.connect().await?;

        {
            let mut nodes = self.inner.nodes();
            if !nodes.contains_key(&identifier) {
                node.attach_registry(Arc::downgrade(&self.inner));
                nodes.insert(identifier.clone(), node.clone());
                tracing::info!("NODE {:?} | Registered", identifier);
                return Ok(node);
            }
        }

        // lost a race with a concurrent initiate for the same identifier
        node.disconnect(true).await?;
        Err(ObsidianError::AlreadyExists(identifier))
    }

    pub fn get(&self, identifier: &str) -> Option<Node> {
        self.inner.nodes().get(identifier).cloned()
    }

    /// The `"MAIN"` node if registered, otherwise the first by identifier
    pub fn get_or_default(&self) -> Option<Node> {
        let nodes = self.inner.nodes();
        nodes.get(DEFAULT_IDENTIFIER).cloned().or_else(|| {
            nodes
                .iter()
                .min_by(|a, b| a.0.cmp(b.0))
                .map(|(_, node)| node.clone())
        })
    }

    pub fn nodes(&self) -> Vec<Node> {
        let mut nodes: Vec<Node> = self.inner.nodes().values().cloned().collect();
        nodes.sort_by(|a, b| a.identifier().cmp(b.identifier()));
        nodes
    }

    pub fn len(&self) -> usize {
        self.inner.nodes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.nodes().is_empty()
    }

    /// Unregister a node without disconnecting it
    pub fn remove(&self, identifier: &str) -> Option<Node> {
        self.inner.remove(identifier)
    }

    /// Destroy every registered node
    pub async fn destroy_all(&self, force: bool) -> Result<()> {
        for node in self.nodes() {
            if let Err(e) = node.destroy(force).await {
                tracing::warn!("NODE {:?} | Failed to destroy: {}", node.identifier(), e);
            }
        }
        self.inner.nodes().clear();
        Ok(())
    }
}

impl std::fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("nodes", &self.nodes())
            .finish_non_exhaustive()
    }
}
