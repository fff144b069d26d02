//! Transaction and query wire types (spec §6): the shapes a client submits a transaction
//! or opens a query with, independent of whatever transport carries them.

use crate::engine::core::temporal::TimeClause;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One operation within a submitted transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TxOp {
    Put {
        table: String,
        doc: Value,
        valid_from: Option<String>,
        valid_to: Option<String>,
    },
    Delete {
        table: String,
        id: Value,
        valid_from: Option<String>,
        valid_to: Option<String>,
    },
    Erase {
        table: String,
        id: Value,
    },
    /// A raw query submitted for side effects only (e.g. a DML statement); out of scope
    /// to execute (SPEC_FULL.md Non-goals), but the shape still needs to round-trip.
    Sql(String),
    Xtql(Value),
    Call {
        fn_id: Value,
        args: Vec<Value>,
    },
}

/// Pins a query (or a transaction's read side) to a specific system-time basis.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct Basis {
    pub at_tx: Option<i64>,
    pub current_time: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenQueryRequest {
    pub query: Value,
    #[serde(default)]
    pub args: Vec<Value>,
    pub basis: Basis,
    #[serde(default)]
    pub after_tx: Option<i64>,
    #[serde(default)]
    pub tx_timeout_ms: Option<u64>,
    #[serde(default)]
    pub default_tz: Option<String>,
    #[serde(default)]
    pub default_all_valid_time: bool,
    #[serde(default)]
    pub explain: bool,
    #[serde(default)]
    pub system_time_clause: Option<TimeClause>,
    #[serde(default)]
    pub valid_time_clause: Option<TimeClause>,
}

/// A source of committed transactions a query's `after_tx` can await against; the actual
/// transaction log/ingest path is out of scope here (SPEC_FULL.md Non-goals name it), but
/// `OpenQueryRequest.after_tx` needs a seam to block on.
pub trait TransactionSource: Send + Sync {
    fn latest_committed_tx(&self) -> i64;
    fn await_tx(&self, tx_id: i64, timeout_ms: u64) -> Result<(), crate::engine::errors::CoreError>;
}
