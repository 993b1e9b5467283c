//! JSON-RPC session layer: envelope codec, correlation engine, and the
//! typed aria2 method surface.

pub mod calls;
mod client;
mod envelope;
mod error;

pub use calls::{GlobalStat, VersionInfo};
pub use client::{
    open, CallOptions, CallTimeout, Connection, MulticallCall, OpenOptions, Subscription,
    DEFAULT_TIMEOUT,
};
pub use error::{RemoteError, RpcError};
