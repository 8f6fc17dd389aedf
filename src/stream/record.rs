//! # Stream collaborators.
//!
//! The supervisor only sees three narrow contracts:
//! - [`RecordSource`]: an ordered, offset-addressable log;
//! - [`Publisher`]: where each record is applied downstream;
//! - [`CheckpointStore`](crate::CheckpointStore): where progress is persisted.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StreamError;

/// One entry of the ordered log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    /// Position in the log; strictly increasing across records.
    pub offset: u64,
    /// Id of the aggregate the record belongs to.
    pub aggregate_id: String,
    /// Aggregate version after this record.
    pub version: u64,
    /// Opaque payload.
    pub data: Bytes,
}

impl Record {
    /// Creates a record.
    pub fn new(offset: u64, aggregate_id: impl Into<String>, version: u64, data: impl Into<Bytes>) -> Self {
        Self {
            offset,
            aggregate_id: aggregate_id.into(),
            version,
            data: data.into(),
        }
    }
}

/// Ordered record log.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Reads up to `limit` records with `offset > after`, in ascending offset order.
    async fn read(&self, after: u64, limit: usize) -> Result<Vec<Record>, StreamError>;
}

/// Downstream sink for records.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Applies one record. An error makes the supervisor retry it on the next poll.
    async fn publish(&self, record: &Record) -> Result<(), StreamError>;
}
