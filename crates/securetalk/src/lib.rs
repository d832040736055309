//! Facade crate re-exporting the connection core, credential store, and
//! shared utilities under short names for downstream binaries.

pub use securetalk_auth as auth;
pub use securetalk_net as net;
pub use securetalk_utils as utils;
pub use tracing;
