use crate::{QueryErr, SocketConf};
use std::{
    io::{self, ErrorKind},
    net::{Ipv6Addr, SocketAddr, UdpSocket},
    time::{Duration, Instant},
};
use tracing::trace;

/// The socket operations the read loop relies on.
pub trait DatagramSocket {
    fn send(&self, bufs: &[u8]) -> io::Result<usize>;
    fn recv(&self, bufs: &mut [u8]) -> io::Result<usize>;
    fn set_read_timeout(&self, dur: Option<Duration>) -> io::Result<()>;
}

impl DatagramSocket for UdpSocket {
    fn send(&self, bufs: &[u8]) -> io::Result<usize> {
        UdpSocket::send(self, bufs)
    }

    fn recv(&self, bufs: &mut [u8]) -> io::Result<usize> {
        UdpSocket::recv(self, bufs)
    }

    fn set_read_timeout(&self, dur: Option<Duration>) -> io::Result<()> {
        UdpSocket::set_read_timeout(self, dur)
    }
}

/// Bind a local UDP socket of the same family as `peer` and connect it.
pub fn dial(peer: SocketAddr, socket_conf: &SocketConf) -> io::Result<UdpSocket> {
    let socket = match peer {
        SocketAddr::V4(_) => UdpSocket::bind((socket_conf.rep_udp_ipv4, socket_conf.rep_udp_port))?,
        SocketAddr::V6(_) => UdpSocket::bind((Ipv6Addr::UNSPECIFIED, socket_conf.rep_udp_port))?,
    };

    socket.set_write_timeout(socket_conf.write_timeout)?;
    socket.connect(peer)?;

    Ok(socket)
}

/// Connected datagram transport assembling one logical response per request.
#[derive(Debug)]
pub struct Transport<S: DatagramSocket = UdpSocket> {
    socket: S,
    read_buffer_size: usize,
}

impl<S: DatagramSocket> Transport<S> {
    pub fn create(socket: S, read_buffer_size: usize) -> Self {
        Self {
            socket,
            read_buffer_size: read_buffer_size.max(1),
        }
    }

    pub fn socket(&self) -> &S {
        &self.socket
    }

    /// Send one request packet, write errors are returned as is.
    pub fn send(&self, packet: &[u8]) -> Result<(), QueryErr> {
        let sent = self.socket.send(packet)?;

        if sent != packet.len() {
            return Err(QueryErr::IoErr(io::Error::new(
                ErrorKind::WriteZero,
                format!("Only {} of {} request bytes were sent", sent, packet.len()),
            )));
        }

        trace!(len = sent, "request sent");

        Ok(())
    }

    /// Read one logical response, made of one or more datagrams.
    ///
    /// A read filling the whole read buffer means more data may follow, the
    /// first shorter read ends the response. All reads share one deadline of
    /// `timeout` from now. When it passes with nothing received the result is
    /// [QueryErr::Timeout], otherwise whatever was gathered is returned and
    /// the decoder decides whether it is complete.
    ///
    /// The socket read timeout is always reset to `None` before returning.
    pub fn read_response(&self, timeout: Duration) -> Result<Vec<u8>, QueryErr> {
        let result = self.read_until_short(timeout);
        let cleared = self.socket.set_read_timeout(None);
        let bufs = result?;

        cleared?;

        Ok(bufs)
    }

    fn read_until_short(&self, timeout: Duration) -> Result<Vec<u8>, QueryErr> {
        let deadline = Instant::now().checked_add(timeout);
        let mut chunk = vec![0u8; self.read_buffer_size];
        let mut bufs = Vec::new();

        loop {
            let remaining = match deadline {
                Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                None => timeout,
            };

            if remaining.is_zero() {
                return expire(bufs, timeout);
            }

            self.socket.set_read_timeout(Some(remaining))?;

            match self.socket.recv(&mut chunk) {
                Ok(len) => {
                    trace!(len, total = bufs.len() + len, "datagram received");
                    bufs.extend_from_slice(&chunk[..len]);

                    if len < chunk.len() {
                        return Ok(bufs);
                    }
                }
                Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return expire(bufs, timeout);
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(QueryErr::IoErr(err)),
            }
        }
    }
}

fn expire(bufs: Vec<u8>, timeout: Duration) -> Result<Vec<u8>, QueryErr> {
    match bufs.is_empty() {
        true => Err(QueryErr::Timeout(timeout)),
        false => {
            trace!(total = bufs.len(), "deadline passed, returning partial response");
            Ok(bufs)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::RefCell, collections::VecDeque};

    /// Socket replaying scripted reads, an empty script behaves like a silent peer.
    #[derive(Default)]
    struct ScriptedSocket {
        reads: RefCell<VecDeque<io::Result<Vec<u8>>>>,
        timeouts: RefCell<Vec<Option<Duration>>>,
        sent: RefCell<Vec<Vec<u8>>>,
        send_limit: Option<usize>,
    }

    impl ScriptedSocket {
        fn with_reads(reads: Vec<io::Result<Vec<u8>>>) -> Self {
            Self {
                reads: RefCell::new(reads.into()),
                ..Default::default()
            }
        }
    }

    impl DatagramSocket for ScriptedSocket {
        fn send(&self, bufs: &[u8]) -> io::Result<usize> {
            let len = self.send_limit.unwrap_or(bufs.len()).min(bufs.len());

            self.sent.borrow_mut().push(bufs[..len].to_vec());

            Ok(len)
        }

        fn recv(&self, bufs: &mut [u8]) -> io::Result<usize> {
            match self.reads.borrow_mut().pop_front() {
                Some(Ok(datagram)) => {
                    // Datagrams longer than the buffer are truncated, as with UDP.
                    let len = datagram.len().min(bufs.len());

                    bufs[..len].copy_from_slice(&datagram[..len]);

                    Ok(len)
                }
                Some(Err(err)) => Err(err),
                None => Err(io::Error::new(ErrorKind::WouldBlock, "timed out")),
            }
        }

        fn set_read_timeout(&self, dur: Option<Duration>) -> io::Result<()> {
            self.timeouts.borrow_mut().push(dur);

            Ok(())
        }
    }

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[test]
    fn short_read_ends_response() {
        let transport = Transport::create(ScriptedSocket::with_reads(vec![Ok(vec![1, 2, 3])]), 8);

        assert_eq!(transport.read_response(TIMEOUT).unwrap(), vec![1, 2, 3]);

        let timeouts = transport.socket().timeouts.borrow();

        assert!(matches!(timeouts.first(), Some(Some(d)) if *d <= TIMEOUT));
        assert_eq!(timeouts.last(), Some(&None));
    }

    #[test]
    fn full_reads_are_accumulated() {
        let socket = ScriptedSocket::with_reads(vec![
            Ok(vec![1; 4]),
            Ok(vec![2; 4]),
            Ok(vec![3; 2]),
            Ok(vec![4; 4]),
        ]);
        let transport = Transport::create(socket, 4);

        assert_eq!(
            transport.read_response(TIMEOUT).unwrap(),
            vec![1, 1, 1, 1, 2, 2, 2, 2, 3, 3]
        );
        // The datagram after the short read is left for the next request.
        assert_eq!(transport.socket().reads.borrow().len(), 1);
    }

    #[test]
    fn partial_data_survives_deadline() {
        let transport = Transport::create(ScriptedSocket::with_reads(vec![Ok(vec![7; 4])]), 4);

        assert_eq!(transport.read_response(TIMEOUT).unwrap(), vec![7; 4]);
        assert_eq!(transport.socket().timeouts.borrow().last(), Some(&None));
    }

    #[test]
    fn silence_is_timeout() {
        let transport = Transport::create(ScriptedSocket::default(), 4);
        let timeout = Duration::from_millis(250);

        match transport.read_response(timeout) {
            Err(QueryErr::Timeout(d)) => assert_eq!(d, timeout),
            other => panic!("expected timeout, got {:?}", other),
        }

        assert_eq!(transport.socket().timeouts.borrow().last(), Some(&None));
    }

    #[test]
    fn zero_timeout_never_reads() {
        let transport = Transport::create(ScriptedSocket::with_reads(vec![Ok(vec![1])]), 4);

        assert!(matches!(
            transport.read_response(Duration::ZERO),
            Err(QueryErr::Timeout(_))
        ));
        assert_eq!(transport.socket().reads.borrow().len(), 1);
    }

    #[test]
    fn socket_error_is_surfaced_and_deadline_cleared() {
        let socket = ScriptedSocket::with_reads(vec![
            Ok(vec![1; 4]),
            Err(io::Error::new(ErrorKind::ConnectionRefused, "refused")),
        ]);
        let transport = Transport::create(socket, 4);

        match transport.read_response(TIMEOUT) {
            Err(QueryErr::IoErr(err)) => assert_eq!(err.kind(), ErrorKind::ConnectionRefused),
            other => panic!("expected io error, got {:?}", other),
        }

        assert_eq!(transport.socket().timeouts.borrow().last(), Some(&None));
    }

    #[test]
    fn interrupted_read_is_retried() {
        let socket = ScriptedSocket::with_reads(vec![
            Err(io::Error::new(ErrorKind::Interrupted, "signal")),
            Ok(vec![9]),
        ]);

        assert_eq!(Transport::create(socket, 4).read_response(TIMEOUT).unwrap(), vec![9]);
    }

    #[test]
    fn short_send_is_an_error() {
        let socket = ScriptedSocket {
            send_limit: Some(3),
            ..Default::default()
        };
        let transport = Transport::create(socket, 4);

        assert!(matches!(
            transport.send(&[0xFE, 0xFD, 0x09, 0, 0, 0, 1]),
            Err(QueryErr::IoErr(_))
        ));
        assert!(transport.send(&[0xFE, 0xFD]).is_ok());
    }
}
