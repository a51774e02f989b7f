use crate::{FullResponse, QueryClient, QueryErr, SimpleResponse};
use std::{
    net::{Ipv4Addr, SocketAddr, ToSocketAddrs},
    time::Duration,
};

/// Query port used by servers with `enable-query=true` unless `query.port` is changed.
pub const DEFAULT_QUERY_PORT: u16 = 25565;
/// Read timeout used when [SocketConf::read_time_out] is `None`.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);
/// How long a challenge token is reused before a new handshake.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(25);
/// Size of a single socket read, the largest UDP payload. A read filling it completely means
/// more data may follow.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 65535;

/// Main struct used for configuring the connection.
#[derive(Debug, Clone)]
pub struct Conf {
    /// Server IP address or a domain name.
    pub host: String,
    /// Server query port.
    pub port: u16,
    /// See [SocketConf].
    pub socket_conf: SocketConf,
}

/// Additional socket configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketConf {
    /// Read timeout for one logical response, [DEFAULT_READ_TIMEOUT] when `None`.
    pub read_time_out: Option<Duration>,
    /// Set the write timeout for socket.
    pub write_timeout: Option<Duration>,
    /// Specify the address for creating a UDP connection to an IPv4 server.
    /// The default value is [Ipv4Addr::UNSPECIFIED].
    pub rep_udp_ipv4: Ipv4Addr,
    /// Specify the local port for creating a UDP connection.
    /// The default value is 0, letting the system pick one.
    pub rep_udp_port: u16,
    /// See [DEFAULT_READ_BUFFER_SIZE].
    pub read_buffer_size: usize,
    /// Lifetime of a cached challenge token, `None` disables caching and
    /// every query performs its own handshake.
    pub token_ttl: Option<Duration>,
}

impl Default for SocketConf {
    fn default() -> Self {
        Self {
            read_time_out: None,
            write_timeout: None,
            rep_udp_ipv4: Ipv4Addr::UNSPECIFIED,
            rep_udp_port: 0,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            token_ttl: Some(DEFAULT_TOKEN_TTL),
        }
    }
}

impl ToSocketAddrs for Conf {
    type Iter = std::vec::IntoIter<SocketAddr>;

    fn to_socket_addrs(&self) -> std::io::Result<Self::Iter> {
        (&*self.host, self.port).to_socket_addrs()
    }
}

impl std::fmt::Display for Conf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.host.contains(':') {
            true => write!(f, "[{}]:{}", self.host, self.port),
            false => write!(f, "{}:{}", self.host, self.port),
        }
    }
}

impl Conf {
    /// Create a connection configuration using the default query port(25565).
    ///
    /// # Examples
    ///
    /// ```
    /// # use mcq::{Conf, SocketConf};
    /// #
    /// let conf = Conf::create("www.example.com");
    /// #
    /// # assert_eq!(conf.host, "www.example.com");
    /// # assert_eq!(conf.port, 25565);
    /// # assert_eq!(conf.socket_conf, SocketConf::default());
    /// ```
    pub fn create(host: &str) -> Self {
        Self {
            host: host.trim().into(),
            port: DEFAULT_QUERY_PORT,
            socket_conf: SocketConf::default(),
        }
    }

    /// Create a connection configuration using the specified port.
    ///
    /// # Example
    ///
    /// ```
    /// # use mcq::Conf;
    /// #
    /// let conf = Conf::create_with_port("www.example.com", 25575);
    /// #
    /// # assert_eq!(conf.port, 25575);
    /// ```
    pub fn create_with_port(host: &str, port: u16) -> Self {
        Self {
            host: host.trim().into(),
            port,
            socket_conf: SocketConf::default(),
        }
    }

    /// Create a connection configuration by using a string.
    ///
    /// The string is split at its last colon, the first part being the host
    /// and the second the port. IPv6 hosts must be bracketed. If the port
    /// cannot be converted to [u16], a [QueryErr::DataErr] is returned.
    ///
    /// # Example
    ///
    /// ```
    /// # use mcq::{Conf, QueryErr};
    /// #
    /// # fn main() -> Result<(), QueryErr> {
    ///     let conf = Conf::create_from_str("www.example.com:25565")?;
    /// #
    /// #   assert_eq!(conf.host, "www.example.com");
    /// #   assert_eq!(conf.port, 25565);
    /// #
    /// #   let conf = Conf::create_from_str("[::1]:25565")?;
    /// #   assert_eq!(conf.host, "::1");
    /// #
    /// #   assert!(Conf::create_from_str("25565").is_err());
    /// #   assert!(Conf::create_from_str("www.example.com:-1").is_err());
    /// #   Ok(())
    /// # }
    /// ```
    pub fn create_from_str(addr: &str) -> Result<Self, QueryErr> {
        let (host, port) = match addr.trim().rsplit_once(':') {
            Some((host, port)) if !host.trim().is_empty() => (host.trim(), port.trim()),
            _ => {
                return Err(QueryErr::DataErr(format!(
                    "Invalid socket address syntax: {}",
                    addr
                )));
            }
        };
        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);

        match port.parse::<u16>() {
            Ok(port) => Ok(Self::create_with_port(host, port)),
            Err(_) => Err(QueryErr::DataErr(format!("Invalid port: {}", port))),
        }
    }

    /// Get **basic** info from a Java Edition server using the [Query](https://wiki.vg/Query) protocol.
    ///
    /// To use this protocol, the server needs `enable-query=true` in its
    /// `server.properties`. Return type is [SimpleResponse].
    ///
    /// # Example
    ///
    /// ```no_run
    /// use mcq::{Conf, QueryErr};
    ///
    /// fn main() -> Result<(), QueryErr> {
    ///     let server = Conf::create_with_port("www.example.com", 25565);
    ///     let info = server.query()?;
    ///
    ///     Ok(())
    /// }
    /// ```
    pub fn query(&self) -> Result<SimpleResponse, QueryErr> {
        self.connect()?.simple()
    }

    /// Get **full** info, including players and plugins, using the [Query](https://wiki.vg/Query) protocol.
    ///
    /// Return type is [FullResponse].
    ///
    /// # Example
    ///
    /// ```no_run
    /// use mcq::{Conf, QueryErr};
    ///
    /// fn main() -> Result<(), QueryErr> {
    ///     let server = Conf::create_with_port("www.example.com", 25565);
    ///     let info = server.query_full()?;
    ///
    ///     Ok(())
    /// }
    /// ```
    pub fn query_full(&self) -> Result<FullResponse, QueryErr> {
        self.connect()?.full()
    }

    /// Create a [QueryClient] from this configuration and connect it.
    pub fn connect(&self) -> Result<QueryClient, QueryErr> {
        let mut client = QueryClient::create_with_conf(self.socket_conf.clone());

        client.connect(self)?;

        Ok(client)
    }
}
