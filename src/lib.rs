//! Drive adapter: projects a remote document store into a virtual filesystem.
//!
//! The remote side is reached through [`api`]; [`vfs`] reconciles listings
//! into a node tree, dispatches nodes to type handlers and performs
//! mutations; [`registry`] hands out one filesystem per (endpoint, user).

pub mod api;
pub mod config;
pub mod error;
pub mod registry;
pub mod vfs;

pub use config::{DriveConfig, MountOptions, ReadOptions, TransportMode, WriteOptions};
pub use error::{DriveError, Result};
pub use registry::FsRegistry;
pub use vfs::node::{HandlerKind, NodeId, ROOT_ID};
pub use vfs::{DriveFs, NodeInfo};
