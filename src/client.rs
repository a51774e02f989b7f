use crate::{
    codec::{
        decode_challenge, decode_full, decode_simple, encode_challenge_request,
        encode_full_request, encode_simple_request,
    },
    conf::DEFAULT_READ_TIMEOUT,
    session::{ChallengeToken, Session, SessionId},
    transport::{dial, Transport},
    FullResponse, QueryErr, SimpleResponse, SocketConf,
};
use rand::{rngs::StdRng, SeedableRng};
use serde::Serialize;
use std::{
    net::{SocketAddr, ToSocketAddrs},
    time::{Duration, Instant},
};
use tracing::debug;

/// Where a [QueryClient] is in its connect/handshake lifecycle.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    Unconnected,
    /// Connected without a cached challenge token.
    Connected,
    ChallengeValid,
    ChallengeExpired,
}

struct Connection {
    peer: SocketAddr,
    transport: Transport,
    session: Session,
}

impl Connection {
    fn challenge(
        &mut self,
        timeout: Duration,
        token_ttl: Option<Duration>,
    ) -> Result<ChallengeToken, QueryErr> {
        if let Some(token) = self.session.valid_token(Instant::now()) {
            debug!(peer = %self.peer, "reusing cached challenge token");
            return Ok(token);
        }

        let session_id = self.session.id();

        self.transport.send(&encode_challenge_request(session_id))?;

        let token = decode_challenge(&self.transport.read_response(timeout)?, session_id)?;

        match token_ttl {
            Some(ttl) => self.session.set_token(token, ttl, Instant::now()),
            None => self.session.clear_token(),
        }

        debug!(peer = %self.peer, session_id = %session_id, "challenge handshake completed");

        Ok(token)
    }

    fn stat(
        &mut self,
        timeout: Duration,
        token_ttl: Option<Duration>,
        full_stat: bool,
    ) -> Result<Vec<u8>, QueryErr> {
        let token = self.challenge(timeout, token_ttl)?;
        let session_id = self.session.id();
        let packet = match full_stat {
            true => encode_full_request(session_id, token),
            false => encode_simple_request(session_id, token),
        };

        self.transport.send(&packet)?;

        let bufs = self.transport.read_response(timeout)?;

        debug!(peer = %self.peer, full_stat, len = bufs.len(), "stat response received");

        Ok(bufs)
    }
}

/// Client for the [Query](https://wiki.vg/Query) protocol.
///
/// Owns one connected UDP socket and the session used on it. Methods take
/// `&mut self`; share a client between threads behind a `Mutex`.
///
/// ```no_run
/// use mcq::{QueryClient, QueryErr};
/// use std::time::Duration;
///
/// fn main() -> Result<(), QueryErr> {
///     let mut client = QueryClient::create();
///
///     client.connect("www.example.com:25565")?;
///     client.set_read_timeout(Duration::from_secs(2));
///
///     println!("{}", client.simple()?);
///     println!("{}", client.full()?);
///
///     Ok(())
/// }
/// ```
pub struct QueryClient {
    socket_conf: SocketConf,
    read_timeout: Duration,
    rng: StdRng,
    connection: Option<Connection>,
}

impl Default for QueryClient {
    fn default() -> Self {
        Self::create()
    }
}

impl QueryClient {
    pub fn create() -> Self {
        Self::create_with_conf(SocketConf::default())
    }

    pub fn create_with_conf(socket_conf: SocketConf) -> Self {
        Self::create_with_rng(socket_conf, StdRng::from_entropy())
    }

    /// Session ids are drawn from an RNG seeded with `seed`, making them reproducible.
    pub fn create_with_seed(socket_conf: SocketConf, seed: u64) -> Self {
        Self::create_with_rng(socket_conf, StdRng::seed_from_u64(seed))
    }

    fn create_with_rng(socket_conf: SocketConf, rng: StdRng) -> Self {
        Self {
            read_timeout: socket_conf.read_time_out.unwrap_or(DEFAULT_READ_TIMEOUT),
            socket_conf,
            rng,
            connection: None,
        }
    }

    /// Resolve `addr`, open a connected UDP socket to it and start a new session.
    ///
    /// IPv4 addresses are preferred when the host resolves to both families.
    /// Connecting again replaces the previous socket and session.
    pub fn connect<A: ToSocketAddrs>(&mut self, addr: A) -> Result<(), QueryErr> {
        let addrs = addr
            .to_socket_addrs()
            .map_err(|err| QueryErr::ResolveErr(err.to_string()))?
            .collect::<Vec<_>>();
        let peer = match addrs.iter().find(|a| a.is_ipv4()).or(addrs.first()) {
            Some(&peer) => peer,
            None => {
                return Err(QueryErr::ResolveErr(
                    "Address resolved to no socket address".into(),
                ));
            }
        };

        let socket = dial(peer, &self.socket_conf).map_err(QueryErr::DialErr)?;
        let session = Session::create(&mut self.rng);

        debug!(peer = %peer, session_id = %session.id(), "query socket connected");

        self.connection = Some(Connection {
            peer,
            transport: Transport::create(socket, self.socket_conf.read_buffer_size),
            session,
        });

        Ok(())
    }

    /// Read timeout for every later operation, including the handshake.
    pub fn set_read_timeout(&mut self, timeout: Duration) {
        self.read_timeout = timeout;
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    /// Lifetime of cached challenge tokens, `None` to handshake before every query.
    pub fn set_token_ttl(&mut self, token_ttl: Option<Duration>) {
        self.socket_conf.token_ttl = token_ttl;

        if token_ttl.is_none() {
            if let Some(connection) = self.connection.as_mut() {
                connection.session.clear_token();
            }
        }
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.connection.as_ref().map(|c| c.session.id())
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.connection.as_ref().map(|c| c.peer)
    }

    pub fn state(&self) -> QueryState {
        match &self.connection {
            None => QueryState::Unconnected,
            Some(c) if c.session.has_valid_token(Instant::now()) => QueryState::ChallengeValid,
            Some(c) if c.session.has_token() => QueryState::ChallengeExpired,
            Some(_) => QueryState::Connected,
        }
    }

    /// Return a valid challenge token, performing the handshake unless a
    /// cached one is still valid.
    pub fn get_challenge_token(&mut self) -> Result<ChallengeToken, QueryErr> {
        self.with_connection(|connection, timeout, token_ttl| {
            connection.challenge(timeout, token_ttl)
        })
    }

    /// Get [basic stat](https://wiki.vg/Query#Basic_stat) info.
    pub fn simple(&mut self) -> Result<SimpleResponse, QueryErr> {
        self.with_connection(|connection, timeout, token_ttl| {
            let bufs = connection.stat(timeout, token_ttl, false)?;

            decode_simple(&bufs, connection.session.id())
        })
    }

    /// Get [full stat](https://wiki.vg/Query#Full_stat) info.
    pub fn full(&mut self) -> Result<FullResponse, QueryErr> {
        self.with_connection(|connection, timeout, token_ttl| {
            let bufs = connection.stat(timeout, token_ttl, true)?;

            decode_full(&bufs, connection.session.id())
        })
    }

    // Any failure drops the cached token, the next call starts with a handshake.
    fn with_connection<T>(
        &mut self,
        op: impl FnOnce(&mut Connection, Duration, Option<Duration>) -> Result<T, QueryErr>,
    ) -> Result<T, QueryErr> {
        let (timeout, token_ttl) = (self.read_timeout, self.socket_conf.token_ttl);
        let connection = self.connection.as_mut().ok_or(QueryErr::NotConnected)?;
        let result = op(connection, timeout, token_ttl);

        if result.is_err() {
            connection.session.clear_token();
        }

        result
    }
}
