//! IPC module for communication with the presentation layer and other
//! collaborators

mod protocol;
mod server;

pub use protocol::{DaemonStatus, Notification, Request, Response, MAX_MESSAGE_LEN};
pub use server::{Server, ServerContext};
