//! Session log storage: naming contract, writer, shutdown coordination.

pub mod naming;
pub mod shutdown;
pub mod writer;

pub use naming::RUNNING_MARKER;
pub use shutdown::{ShutdownCoordinator, ShutdownGuard};
pub use writer::{SessionWriter, SharedSessionWriter, WriteError, WriterOptions};
