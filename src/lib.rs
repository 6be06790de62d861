mod alloc;
mod client;
pub mod config;
mod consts;
mod error;
pub mod event;
pub mod operate;
mod package;
mod processor;
mod server;
mod session;
pub mod staging;
mod task;

pub use alloc::{SessionId, TransferId};
pub use client::Client;
pub use config::{Config, Role};
pub use consts::{DELIMITER, MAX_BODY_LENGTH};
pub use error::Error;
pub use event::{ClientEvent, ServerEvent};
pub use operate::{Binding, Console, Operate, Settings, Stdout, registration};
pub use package::{FileChunks, Kind, Package};
pub use processor::{Processor, register_processor};
pub use server::Server;
pub use session::Session;
