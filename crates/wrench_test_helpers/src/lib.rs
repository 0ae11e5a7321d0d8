//! Shared test utilities for Wrench test suites
//!
//! # Modules
//!
//! - [`workspace`]: Temporary workspaces with a `.wrench` directory
//! - [`cli`]: Command builders with pre-configured environments
//! - [`logging`]: Test logging configuration
//! - [`transport`]: A scriptable in-memory [`wrench_sync::Transport`]
//! - [`storage`]: Storage that suspends between read and write
//!
//! # Example
//!
//! ```rust
//! use wrench_test_helpers::prelude::*;
//! use wrench_sync::{Method, TransportError};
//!
//! let transport = ScriptedTransport::new();
//! transport.fail_once(Method::Put, "/api/assets/1", TransportError::status(503, "busy"));
//! assert_eq!(transport.call_count(), 0);
//! ```

pub mod cli;
pub mod logging;
pub mod storage;
pub mod transport;
pub mod workspace;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cli::wrench_command;
    pub use crate::logging::{init_test_logging, suppress_logs};
    pub use crate::storage::YieldingStorage;
    pub use crate::transport::ScriptedTransport;
    pub use crate::workspace::{init_workspace, temp_dir, workspace_with_config};
}
