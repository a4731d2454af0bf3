//! Adapter binding the consensus engine to the storage contract: the
//! application log-record framing, an in-memory log store, the replicated
//! state machine, and the TCP transport replicas use to talk to each other.

pub mod log_store;
pub mod network;
pub mod state_machine;
pub mod types;
