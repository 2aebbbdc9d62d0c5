//! Minimal blocking RESP2 client used by the collector.
//!
//! Only what a scrape needs: one connection, one command at a time, with
//! read/write timeouts. Commands are sent as arrays of bulk strings.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

#[cfg(unix)]
use std::os::unix::net::UnixStream;

/// Upper bound on a single bulk reply we are willing to buffer.
const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("connection error: {0}")]
    Io(#[from] io::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("server error: {0}")]
    Server(String),

    #[error("unexpected reply to {command}: {reply:?}")]
    UnexpectedReply { command: String, reply: Reply },
}

/// A decoded RESP2 reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Option<Vec<u8>>),
    Array(Option<Vec<Reply>>),
}

impl Reply {
    /// Text of a simple or bulk string reply.
    pub fn into_string(self) -> Option<String> {
        match self {
            Reply::Simple(s) => Some(s),
            Reply::Bulk(Some(bytes)) => Some(String::from_utf8_lossy(&bytes).into_owned()),
            _ => None,
        }
    }
}

enum Stream {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Stream::Tcp(s) => s.read(buf),
            #[cfg(unix)]
            Stream::Unix(s) => s.read(buf),
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Stream::Tcp(s) => s.write(buf),
            #[cfg(unix)]
            Stream::Unix(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Stream::Tcp(s) => s.flush(),
            #[cfg(unix)]
            Stream::Unix(s) => s.flush(),
        }
    }
}

/// One open connection to a Redis server.
pub struct Connection {
    reader: BufReader<Stream>,
}

impl Connection {
    pub fn connect_tcp(host: &str, port: u16, timeout: Duration) -> Result<Self, ClientError> {
        let mut last_err = None;
        for addr in (host, port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(timeout))?;
                    stream.set_write_timeout(Some(timeout))?;
                    stream.set_nodelay(true)?;
                    return Ok(Self {
                        reader: BufReader::new(Stream::Tcp(stream)),
                    });
                }
                Err(e) => last_err = Some(e),
            }
        }

        Err(ClientError::Io(last_err.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no addresses resolved for {host}"),
            )
        })))
    }

    #[cfg(unix)]
    pub fn connect_unix(path: &Path, timeout: Duration) -> Result<Self, ClientError> {
        let stream = UnixStream::connect(path)?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        Ok(Self {
            reader: BufReader::new(Stream::Unix(stream)),
        })
    }

    #[cfg(not(unix))]
    pub fn connect_unix(path: &Path, _timeout: Duration) -> Result<Self, ClientError> {
        Err(ClientError::Io(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("unix sockets are not supported here: {}", path.display()),
        )))
    }

    /// Sends one command and reads its reply. Error replies become
    /// [`ClientError::Server`].
    pub fn query(&mut self, args: &[&str]) -> Result<Reply, ClientError> {
        let stream = self.reader.get_mut();
        stream.write_all(&encode_command(args))?;
        stream.flush()?;

        match read_reply(&mut self.reader)? {
            Reply::Error(msg) => Err(ClientError::Server(msg)),
            reply => Ok(reply),
        }
    }

    pub fn query_string(&mut self, args: &[&str]) -> Result<String, ClientError> {
        let reply = self.query(args)?;
        reply
            .clone()
            .into_string()
            .ok_or_else(|| unexpected(args, reply))
    }

    pub fn query_int(&mut self, args: &[&str]) -> Result<i64, ClientError> {
        match self.query(args)? {
            Reply::Integer(n) => Ok(n),
            reply => Err(unexpected(args, reply)),
        }
    }

    pub fn auth(&mut self, user: Option<&str>, password: &str) -> Result<(), ClientError> {
        match user {
            Some(user) => self.query(&["AUTH", user, password])?,
            None => self.query(&["AUTH", password])?,
        };
        Ok(())
    }

    pub fn select(&mut self, db: u32) -> Result<(), ClientError> {
        self.query(&["SELECT", &db.to_string()])?;
        Ok(())
    }

    /// Iterates `SCAN` to completion and returns every matching key.
    pub fn scan(&mut self, pattern: &str, count: usize) -> Result<Vec<String>, ClientError> {
        let count = count.to_string();
        let mut cursor = "0".to_string();
        let mut keys = Vec::new();

        loop {
            let args = ["SCAN", cursor.as_str(), "MATCH", pattern, "COUNT", count.as_str()];
            let reply = self.query(&args)?;

            let (next, batch) = match reply {
                Reply::Array(Some(mut parts)) if parts.len() == 2 => {
                    let batch = parts.pop();
                    let next = parts.pop().and_then(Reply::into_string);
                    match (next, batch) {
                        (Some(next), Some(Reply::Array(Some(batch)))) => (next, batch),
                        _ => return Err(ClientError::Protocol("malformed SCAN reply".into())),
                    }
                }
                reply => return Err(unexpected(&args, reply)),
            };

            keys.extend(batch.into_iter().filter_map(Reply::into_string));

            if next == "0" {
                return Ok(keys);
            }
            cursor = next;
        }
    }
}

fn unexpected(args: &[&str], reply: Reply) -> ClientError {
    ClientError::UnexpectedReply {
        command: args.first().copied().unwrap_or_default().to_string(),
        reply,
    }
}

/// Encodes a command as a RESP array of bulk strings.
pub fn encode_command(args: &[&str]) -> Vec<u8> {
    let mut out = Vec::with_capacity(16 + args.iter().map(|a| a.len() + 16).sum::<usize>());
    out.extend_from_slice(format!("*{}\r\n", args.len()).as_bytes());
    for arg in args {
        out.extend_from_slice(format!("${}\r\n", arg.len()).as_bytes());
        out.extend_from_slice(arg.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    out
}

fn read_line<R: BufRead>(reader: &mut R) -> Result<String, ClientError> {
    let mut line = Vec::new();
    let n = reader.read_until(b'\n', &mut line)?;
    if n == 0 {
        return Err(ClientError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "connection closed by server",
        )));
    }
    if !line.ends_with(b"\r\n") {
        return Err(ClientError::Protocol("line not terminated by CRLF".into()));
    }
    line.truncate(line.len() - 2);
    String::from_utf8(line).map_err(|_| ClientError::Protocol("line is not valid UTF-8".into()))
}

fn parse_len(s: &str) -> Result<i64, ClientError> {
    s.parse::<i64>()
        .map_err(|_| ClientError::Protocol(format!("invalid length '{s}'")))
}

/// Reads one reply from `reader`.
pub fn read_reply<R: BufRead>(reader: &mut R) -> Result<Reply, ClientError> {
    let line = read_line(reader)?;
    let (kind, rest) = match line.chars().next() {
        Some(kind) => (kind, &line[kind.len_utf8()..]),
        None => return Err(ClientError::Protocol("empty reply line".into())),
    };

    match kind {
        '+' => Ok(Reply::Simple(rest.to_string())),
        '-' => Ok(Reply::Error(rest.to_string())),
        ':' => rest
            .parse::<i64>()
            .map(Reply::Integer)
            .map_err(|_| ClientError::Protocol(format!("invalid integer '{rest}'"))),
        '$' => {
            let len = parse_len(rest)?;
            if len < 0 {
                return Ok(Reply::Bulk(None));
            }
            if len > MAX_BULK_LEN {
                return Err(ClientError::Protocol(format!("bulk reply too large ({len} bytes)")));
            }
            let mut buf = vec![0u8; len as usize + 2];
            reader.read_exact(&mut buf)?;
            if !buf.ends_with(b"\r\n") {
                return Err(ClientError::Protocol("bulk reply not terminated by CRLF".into()));
            }
            buf.truncate(len as usize);
            Ok(Reply::Bulk(Some(buf)))
        }
        '*' => {
            let len = parse_len(rest)?;
            if len < 0 {
                return Ok(Reply::Array(None));
            }
            let mut items = Vec::with_capacity(len.min(1024) as usize);
            for _ in 0..len {
                items.push(read_reply(reader)?);
            }
            Ok(Reply::Array(Some(items)))
        }
        other => Err(ClientError::Protocol(format!("unknown reply type '{other}'"))),
    }
}
