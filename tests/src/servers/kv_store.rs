//! # Key-Value Store Server
//!
//! A map owned by a server process, with a typed façade over the generic
//! call interface.
//!
//! | Operation | Payload              | Reply |
//! |-----------|----------------------|-------|
//! | `get`     | `K`                  | `V`   |
//! | `put`     | `KeyValuePair<K, V>` | none  |
//! | `delete`  | `K`                  | `V`   |

use gen_server::handler::{self, HandleResult, Handler};
use gen_server::{GenServer, GenServerError, Payload, ReplySlot, ReplyTo, ServerConfig};
use std::any::Any;
use std::collections::HashMap;
use std::hash::Hash;
use std::marker::PhantomData;
use thiserror::Error;

/// Errors returned by the store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KvError {
    #[error("key not found")]
    NotFound,

    #[error("key already exists")]
    AlreadyExists,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValuePair<K, V> {
    pub key: K,
    pub value: V,
}

impl<K, V> KeyValuePair<K, V> {
    pub fn new(key: K, value: V) -> Self {
        Self { key, value }
    }
}

/// The state behind the server: a plain map, never shared.
pub struct KvStore<K, V> {
    data: HashMap<K, V>,
}

impl<K, V> KvStore<K, V>
where
    K: Eq + Hash,
{
    pub fn new(entries: impl IntoIterator<Item = (K, V)>) -> Self {
        Self {
            data: entries.into_iter().collect(),
        }
    }

    fn get(&self, key: &K) -> Result<V, KvError>
    where
        V: Clone,
    {
        self.data.get(key).cloned().ok_or(KvError::NotFound)
    }

    fn put(&mut self, key: K, value: V) -> Result<(), KvError> {
        if self.data.contains_key(&key) {
            return Err(KvError::AlreadyExists);
        }
        self.data.insert(key, value);
        Ok(())
    }

    fn delete(&mut self, key: &K) -> Result<V, KvError> {
        self.data.remove(key).ok_or(KvError::NotFound)
    }
}

impl<K, V> Handler for KvStore<K, V>
where
    K: Eq + Hash + Send + 'static,
    V: Clone + Send + 'static,
{
    fn handle(&mut self, operation: &str, _sequence: u64, payload: Payload) -> HandleResult {
        match operation {
            "get" => {
                let key = handler::downcast_payload::<K>(operation, payload)?;
                handler::respond(self.get(&key)?)
            }
            "put" => {
                let pair = handler::downcast_payload::<KeyValuePair<K, V>>(operation, payload)?;
                self.put(pair.key, pair.value)?;
                handler::no_reply()
            }
            "delete" => {
                let key = handler::downcast_payload::<K>(operation, payload)?;
                handler::respond(self.delete(&key)?)
            }
            other => Err(handler::unsupported(other)),
        }
    }
}

/// Typed façade over a key-value server process.
pub struct KvStoreServer<K, V> {
    server: GenServer,
    _types: PhantomData<fn() -> (K, V)>,
}

impl<K, V> KvStoreServer<K, V>
where
    K: Eq + Hash + Send + 'static,
    V: Any + Clone + Default + Send + 'static,
{
    pub fn new(entries: impl IntoIterator<Item = (K, V)>) -> Result<Self, GenServerError> {
        Self::with_config(ServerConfig::default().with_name("kv-store"), entries)
    }

    pub fn with_config(
        config: ServerConfig,
        entries: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Self, GenServerError> {
        let store = KvStore::new(entries);
        Ok(Self {
            server: GenServer::start(config, store)?,
            _types: PhantomData,
        })
    }

    pub async fn get(&self, key: K) -> Result<V, GenServerError> {
        let reply = ReplySlot::<V>::default();
        self.server.call("get", key, ReplyTo::from(&reply)).await?;
        Ok(reply.take())
    }

    pub async fn put(&self, key: K, value: V) -> Result<(), GenServerError> {
        self.server
            .call("put", KeyValuePair::new(key, value), ReplyTo::Discard)
            .await
    }

    pub async fn delete(&self, key: K) -> Result<V, GenServerError> {
        let reply = ReplySlot::<V>::default();
        self.server.call("delete", key, ReplyTo::from(&reply)).await?;
        Ok(reply.take())
    }

    /// The generic process reference, for untyped calls.
    pub fn server(&self) -> &GenServer {
        &self.server
    }

    pub fn close(&self) -> Result<(), GenServerError> {
        self.server.close()
    }
}
