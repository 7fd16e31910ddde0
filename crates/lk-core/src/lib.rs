//! logkeep core: session-scoped rotating log storage.
//!
//! This crate provides:
//! - A session log writer with line-count rotation and crash-safe
//!   finalization (`session::writer`)
//! - Shutdown coordination tying termination signals to exactly one
//!   finalization (`session::shutdown`)
//! - An age-based retention pruner driven purely by directory names
//!   (`retention`)
//! - Log root preparation and structured logging setup for the CLI

pub mod exit_codes;
pub mod logging;
pub mod retention;
pub mod root;
pub mod session;

pub use retention::{sweep, sweep_with_options, RetentionError, RetentionPolicy, SweepOptions, SweepReport};
pub use session::naming::RUNNING_MARKER;
pub use session::shutdown::{ShutdownCoordinator, ShutdownGuard};
pub use session::writer::{SessionWriter, SharedSessionWriter, WriteError, WriterOptions};
