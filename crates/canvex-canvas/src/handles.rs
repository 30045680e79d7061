//! Handle pool: stable small ids for elements and composite objects.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use tracing::warn;

use canvex_core::error::{CanvexError, Result};
use canvex_core::protocol::{Handle, HandleId, Value};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum PoolKey {
    Element(String),
    Args(u64),
}

/// Per-session pool of handles. Entries are never evicted.
#[derive(Debug)]
pub struct HandlePool {
    cache: HashMap<PoolKey, Handle>,
    warn_threshold: usize,
    warned: bool,
}

impl Default for HandlePool {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl HandlePool {
    pub fn new(warn_threshold: usize) -> Self {
        Self {
            cache: HashMap::new(),
            warn_threshold,
            warned: false,
        }
    }

    /// Handle for a native element addressed by a stable key.
    ///
    /// Numeric keys map to themselves; anything else is hashed.
    pub fn handle_for_element(&mut self, key: &str) -> Result<Handle> {
        let key = key.trim();
        if key.is_empty() {
            return Err(CanvexError::InvalidArgument(
                "element key must not be empty".into(),
            ));
        }

        let pool_key = PoolKey::Element(key.to_string());
        if let Some(handle) = self.cache.get(&pool_key) {
            return Ok(handle.clone());
        }

        let id = match key.parse::<HandleId>() {
            Ok(id) => id,
            Err(_) => {
                let mut hasher = DefaultHasher::new();
                key.hash(&mut hasher);
                fold(hasher.finish())
            }
        };
        Ok(self.insert(pool_key, Handle::element(id)))
    }

    /// Handle pre-assigned to a composite-producing call, derived from its
    /// argument tuple. Order-sensitive.
    pub fn handle_for_args(&mut self, args: &[Value]) -> Handle {
        let mut hasher = DefaultHasher::new();
        args.len().hash(&mut hasher);
        for arg in args {
            hash_value(arg, &mut hasher);
        }
        let digest = hasher.finish();

        let pool_key = PoolKey::Args(digest);
        if let Some(handle) = self.cache.get(&pool_key) {
            return handle.clone();
        }
        self.insert(pool_key, Handle::composite(fold(digest)))
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    fn insert(&mut self, key: PoolKey, handle: Handle) -> Handle {
        self.cache.insert(key, handle.clone());
        if !self.warned && self.cache.len() > self.warn_threshold {
            self.warned = true;
            warn!(
                size = self.cache.len(),
                threshold = self.warn_threshold,
                "Handle pool keeps growing; handles are never evicted"
            );
        }
        handle
    }
}

fn fold(digest: u64) -> HandleId {
    ((digest >> 32) ^ digest) as HandleId
}

fn hash_value<H: Hasher>(value: &Value, state: &mut H) {
    match value {
        Value::Null => 0u8.hash(state),
        Value::Bool(b) => {
            1u8.hash(state);
            b.hash(state);
        }
        Value::Number(n) => {
            2u8.hash(state);
            // -0.0 and 0.0 address the same object
            let n = if *n == 0.0 { 0.0 } else { *n };
            n.to_bits().hash(state);
        }
        Value::Str(s) => {
            3u8.hash(state);
            s.hash(state);
        }
        Value::Handle(h) => {
            4u8.hash(state);
            h.hash(state);
        }
        Value::Array(items) => {
            5u8.hash(state);
            items.len().hash(state);
            for item in items {
                hash_value(item, state);
            }
        }
    }
}
