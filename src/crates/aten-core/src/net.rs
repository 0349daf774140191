//! Buffered reading and writing over the blocking TCP connection to the
//! device.
//!
//! The upstream dialect interleaves many tiny reads (one-byte message
//! types, fixed headers) with occasional very large ones (whole-frame
//! pixel payloads).  [`Connection`] therefore keeps a small receive
//! buffer to amortize syscall overhead on the tiny reads, while requests
//! larger than the buffer go straight into the caller's slice so frame
//! data is never copied twice.
//!
//! One connection serves two threads, one per direction: the session
//! reader owns the `Connection` itself and is the only caller of the read
//! methods, while the session writer holds a [`StreamWriter`] cloned from
//! the same socket.  No locking is needed between them beyond what TCP
//! already provides.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};

use thiserror::Error;
use tracing::{debug, warn};

/// Initial capacity of both the receive buffer and the scratch buffer.
const INITIAL_BUF_LEN: usize = 1024;

/// Errors produced by the connection layer.
#[derive(Debug, Error)]
pub enum NetError {
    /// Host name resolution failed.
    #[error("failed to resolve {host}:{port}: {source}")]
    Resolve {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },
    /// Every resolved address candidate refused the connection.
    #[error("failed to connect to {host}:{port}: {source}")]
    Connect {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },
    /// The remote side closed the connection (`read` returned 0).
    #[error("remote host closed the connection")]
    PeerClosed,
    /// A receive failed with something other than an interrupt.
    #[error("read failed: {0}")]
    Read(#[source] io::Error),
    /// A send failed with something other than an interrupt.
    #[error("write failed: {0}")]
    Write(#[source] io::Error),
    /// A socket-level operation (clone, shutdown) failed.
    #[error("socket operation failed: {0}")]
    Socket(#[source] io::Error),
}

/// A connected TCP stream with a small receive buffer and a reusable
/// scratch buffer for by-reference reads.
///
/// Invariant: the buffered-but-unconsumed region is
/// `recv[cursor..cursor + data_len]`.
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,

    /// Fixed-size receive buffer; refilled from offset zero once drained.
    recv: Box<[u8]>,
    cursor: usize,
    data_len: usize,

    /// Grow-by-doubling scratch for [`Connection::read_bytes`]; its
    /// contents are only valid until the next scratch read.
    scratch: Vec<u8>,
}

impl Connection {
    /// Resolves `host:port` and connects to the first address candidate
    /// that accepts.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Resolve`] if resolution fails outright, or
    /// [`NetError::Connect`] (carrying the last candidate's error) if
    /// every candidate refuses.
    pub fn connect(host: &str, port: u16) -> Result<Self, NetError> {
        let candidates = (host, port).to_socket_addrs().map_err(|source| NetError::Resolve {
            host: host.to_string(),
            port,
            source,
        })?;

        let mut last_err = io::Error::new(io::ErrorKind::NotFound, "no address candidates");
        for addr in candidates {
            match TcpStream::connect(addr) {
                Ok(stream) => {
                    debug!("connected to {addr}");
                    return Ok(Self::from_stream(stream));
                }
                Err(e) => {
                    warn!("connect to {addr} failed: {e}");
                    last_err = e;
                }
            }
        }

        Err(NetError::Connect {
            host: host.to_string(),
            port,
            source: last_err,
        })
    }

    /// Wraps an already connected stream.  Used directly by tests.
    pub fn from_stream(stream: TcpStream) -> Self {
        Self {
            stream,
            recv: vec![0u8; INITIAL_BUF_LEN].into_boxed_slice(),
            cursor: 0,
            data_len: 0,
            scratch: vec![0u8; INITIAL_BUF_LEN],
        }
    }

    /// Returns an independent write handle on the same socket for the
    /// writer thread.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Socket`] if the descriptor cannot be duplicated.
    pub fn writer(&self) -> Result<StreamWriter, NetError> {
        let stream = self.stream.try_clone().map_err(NetError::Socket)?;
        Ok(StreamWriter { stream })
    }

    /// Shuts down both directions of the socket, unblocking any thread
    /// parked in a read or write on it.  Errors are ignored: the socket
    /// may already be gone.
    pub fn shutdown(&self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }

    /// Fills `dst` with exactly `dst.len()` bytes from the connection.
    ///
    /// Three paths, tried in order:
    ///
    /// 1. buffered bytes are copied out first;
    /// 2. while the remainder exceeds the receive-buffer capacity, reads
    ///    go directly into `dst` with no intermediate copy;
    /// 3. otherwise the receive buffer is refilled from offset zero until
    ///    it covers the remainder, and the tail is copied out, leaving
    ///    any excess buffered for the next call.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::PeerClosed`] on end of stream and
    /// [`NetError::Read`] on any other receive failure.  Interrupted
    /// reads are retried.
    pub fn read_exact_into(&mut self, dst: &mut [u8]) -> Result<(), NetError> {
        let len = dst.len();
        let mut off = 0;

        // 1. Take whatever is already buffered.
        if self.data_len > 0 {
            let take = self.data_len.min(len);
            dst[..take].copy_from_slice(&self.recv[self.cursor..self.cursor + take]);
            self.cursor += take;
            self.data_len -= take;
            off += take;
        }

        // 2. Oversized remainder: read straight into the caller's slice.
        while len - off > self.recv.len() {
            off += recv_some(&self.stream, &mut dst[off..len])?;
        }

        // 3. Refill the receive buffer, then copy the remainder out.
        if len - off > 0 {
            self.cursor = 0;
            self.data_len = 0;
            while self.data_len < len - off {
                self.data_len += recv_some(&self.stream, &mut self.recv[self.data_len..])?;
            }

            let take = len - off;
            dst[off..].copy_from_slice(&self.recv[..take]);
            self.cursor = take;
            self.data_len -= take;
        }

        Ok(())
    }

    /// Reads `len` bytes and returns them as a slice into the internal
    /// scratch buffer.
    ///
    /// The returned slice is invalidated by the next call to this method;
    /// callers must finish decoding (or copy out) before reading again.
    /// The scratch doubles in size until it can hold `len`.
    ///
    /// # Errors
    ///
    /// Same as [`Connection::read_exact_into`].
    pub fn read_bytes(&mut self, len: usize) -> Result<&[u8], NetError> {
        if self.scratch.len() < len {
            let mut capacity = self.scratch.len().max(1);
            while capacity < len {
                capacity <<= 1;
            }
            self.scratch.resize(capacity, 0);
        }

        let mut scratch = std::mem::take(&mut self.scratch);
        let result = self.read_exact_into(&mut scratch[..len]);
        self.scratch = scratch;
        result?;

        Ok(&self.scratch[..len])
    }

    /// Reads a single byte.
    ///
    /// # Errors
    ///
    /// Same as [`Connection::read_exact_into`].
    pub fn read_u8(&mut self) -> Result<u8, NetError> {
        let mut buf = [0u8; 1];
        self.read_exact_into(&mut buf)?;
        Ok(buf[0])
    }

    /// Reads a big-endian `u16`.
    ///
    /// # Errors
    ///
    /// Same as [`Connection::read_exact_into`].
    pub fn read_u16_be(&mut self) -> Result<u16, NetError> {
        let mut buf = [0u8; 2];
        self.read_exact_into(&mut buf)?;
        Ok(u16::from_be_bytes(buf))
    }

    /// Reads a big-endian `u32`.
    ///
    /// # Errors
    ///
    /// Same as [`Connection::read_exact_into`].
    pub fn read_u32_be(&mut self) -> Result<u32, NetError> {
        let mut buf = [0u8; 4];
        self.read_exact_into(&mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }

    /// Sends all of `buf`, retrying interrupted writes.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Write`] on any non-interrupt send failure.
    pub fn write_all(&mut self, buf: &[u8]) -> Result<(), NetError> {
        send_all(&self.stream, buf)
    }
}

/// Write-only handle on the connection's socket, held by the writer thread.
pub struct StreamWriter {
    stream: TcpStream,
}

impl StreamWriter {
    /// Sends all of `buf`, retrying interrupted writes.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Write`] on any non-interrupt send failure.
    pub fn write_all(&mut self, buf: &[u8]) -> Result<(), NetError> {
        send_all(&self.stream, buf)
    }

    /// Shuts down both directions of the socket so the reader thread
    /// observes end-of-stream.  Errors are ignored.
    pub fn shutdown(&self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

/// One receive call on the socket, retrying interrupts.
fn recv_some(mut stream: &TcpStream, buf: &mut [u8]) -> Result<usize, NetError> {
    loop {
        match stream.read(buf) {
            Ok(0) => return Err(NetError::PeerClosed),
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(NetError::Read(e)),
        }
    }
}

/// Sends the whole buffer, retrying interrupts.
fn send_all(mut stream: &TcpStream, buf: &[u8]) -> Result<(), NetError> {
    let mut off = 0;
    while off < buf.len() {
        match stream.write(&buf[off..]) {
            Ok(0) => {
                return Err(NetError::Write(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "socket accepted zero bytes",
                )))
            }
            Ok(n) => off += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(NetError::Write(e)),
        }
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
