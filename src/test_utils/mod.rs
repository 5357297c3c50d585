//! Test helpers shared by unit tests and, through the `test-util` feature,
//! integration tests.
//!
//! Nothing here touches the network: connections are scripted in memory so
//! state machine behaviour can be asserted step by step.

pub mod core_harness;
pub mod scripted_remote;

pub use core_harness::CoreHarness;
pub use scripted_remote::{ScriptedConnector, ScriptedOutcome, ScriptedRemote};
