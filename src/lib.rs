//! Client for the Minecraft [Query](https://wiki.vg/Query) protocol, the
//! GameSpy4 style UDP status protocol enabled by `enable-query=true`.
//!
//! Use [Conf::query]/[Conf::query_full] for one-off requests, or keep a
//! [QueryClient] around to reuse its session and challenge token.

mod client;
pub mod codec;
mod conf;
mod error;
mod query;
mod session;
pub mod transport;

pub use client::{QueryClient, QueryState};
pub use conf::{
    Conf, SocketConf, DEFAULT_QUERY_PORT, DEFAULT_READ_BUFFER_SIZE, DEFAULT_READ_TIMEOUT,
    DEFAULT_TOKEN_TTL,
};
pub use error::QueryErr;
pub use query::{FullResponse, ModPlugin, SimpleResponse};
pub use session::{ChallengeToken, Session, SessionId};
