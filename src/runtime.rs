//! Partitioned stream processing.
//!
//! The processors only see the [`Context`] traits. The rest of the module is an in-process
//! implementation: records are routed by key to a fixed partition, and every partition is
//! a single task, so the records of a key are never processed concurrently.

use bytes::Bytes;

use crate::prelude::*;
use crate::trainer::models::{Entry, Message};

pub mod broker;
pub mod partition;
pub mod shutdown;
pub mod table;

/// Record of a topic.
#[derive(Clone, Debug)]
pub struct Record {
    pub key: String,

    /// Publish time.
    pub timestamp: DateTime,

    pub payload: Bytes,
}

/// Topics of a learner group.
#[derive(Clone, Debug)]
pub struct Topics {
    /// Raw ratings keyed by the user ID.
    pub input: String,

    /// Direct feature overwrites.
    pub update: String,

    /// Messages waiting for the next training pass, consumed by the refeeder.
    pub refeed: String,

    /// Loopback of the learner, also fed by the refeeder.
    pub loopback: String,
}

impl Topics {
    pub fn new(group: &str) -> Self {
        Self {
            input: format!("{}-input", group),
            update: format!("{}-update", group),
            refeed: format!("{}-refeed", group),
            loopback: format!("{}-loop", group),
        }
    }
}

/// Processing context of the current record.
pub trait Context {
    /// Key of the current record.
    fn key(&self) -> &str;

    /// Timestamp of the current record.
    fn timestamp(&self) -> DateTime;

    /// Publishes the message to the topic.
    fn emit(&mut self, topic: &str, key: &str, message: &Message) -> Result;
}

/// Context of a processor which owns a table partition.
pub trait StatefulContext: Context {
    /// Stored state of the current key.
    fn value(&self) -> Result<Option<Entry>>;

    /// Stores the state of the current key.
    fn set_value(&mut self, entry: &Entry) -> Result;

    /// Delivers the message back to the same processor under the specified key.
    fn loopback(&mut self, key: &str, message: &Message) -> Result;
}
