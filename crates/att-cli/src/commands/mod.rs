//! CLI command implementations.

pub mod attendance;
pub mod init;
pub mod promote;
pub mod session;
pub mod status;
pub mod student;
