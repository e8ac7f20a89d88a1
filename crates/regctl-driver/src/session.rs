//! The driver session: connection state, the mutex that serializes every
//! public operation, the timeout, and the last-error slot (spec §4.4, §5).

use std::time::Duration;

use regctl_protocol::Message;
use tokio::{
    io::{AsyncReadExt as _, AsyncWriteExt as _},
    net::TcpStream,
    sync::Mutex,
};

use crate::error::{Error, ErrorKind};

/// Default send/receive timeout (spec §4.4).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// A caller-supplied logging hook (spec §4.4 "an optional log callback"),
/// independent of the `log` crate: it exists so host applications embedding
/// the driver can route messages without installing a global logger.
pub type LogCallback = Box<dyn Fn(&str) + Send + Sync>;

pub(crate) struct SessionState {
    pub(crate) stream: Option<TcpStream>,
    pub(crate) timeout: Duration,
    pub(crate) last_error: Option<Error>,
}

/// A driver's per-instance state: socket, mutex, timeout, and last-error
/// buffer (spec GLOSSARY "Session").
///
/// All public operations take `&self` and serialize through an internal
/// `tokio::sync::Mutex`, matching spec §5's "one lock guarding all mutable
/// state... every public operation acquires it for its full duration".
pub struct DriverSession {
    pub(crate) state: Mutex<SessionState>,
    log_cb: Option<LogCallback>,
}

impl DriverSession {
    /// `create(log_cb)`: allocates a session with the default timeout.
    /// Socket/OS handles are not allocated until [`connect`](Self::connect).
    #[must_use]
    pub fn new(log_cb: Option<LogCallback>) -> Self {
        Self {
            state: Mutex::new(SessionState {
                stream: None,
                timeout: DEFAULT_TIMEOUT,
                last_error: None,
            }),
            log_cb,
        }
    }

    pub(crate) fn log(&self, message: &str) {
        log::debug!("{message}");
        if let Some(cb) = &self.log_cb {
            cb(message);
        }
    }

    pub(crate) async fn record_error(&self, err: Error) -> Error {
        let mut state = self.state.lock().await;
        state.last_error = Some(err.clone());
        err
    }

    /// Copies the last human-readable error description, if any.
    pub async fn get_last_error_message(&self) -> Option<String> {
        self.state.lock().await.last_error.as_ref().map(|e| e.message.clone())
    }

    /// `connect(host, port)`: opens a stream to `host:port`, then reads
    /// exactly `ACK`. Fails with [`ErrorKind::AlreadyInitialized`] if already
    /// connected.
    pub async fn connect(&self, host: &str, port: u16) -> Result<(), Error> {
        let mut state = self.state.lock().await;
        if state.stream.is_some() {
            drop(state);
            return Err(self
                .record_error(Error::new(ErrorKind::AlreadyInitialized, "session already connected"))
                .await);
        }

        let timeout = state.timeout;
        let connect_fut = TcpStream::connect((host, port));
        let mut stream = match tokio::time::timeout(timeout, connect_fut).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(err)) => {
                drop(state);
                return Err(self
                    .record_error(Error::new(
                        ErrorKind::ConnectionFailed,
                        format!("connect to {host}:{port} failed: {err}"),
                    ))
                    .await);
            }
            Err(_) => {
                drop(state);
                return Err(self
                    .record_error(Error::new(ErrorKind::Timeout, "connect timed out"))
                    .await);
            }
        };

        let mut ack = [0u8; 3];
        match tokio::time::timeout(timeout, stream.read_exact(&mut ack)).await {
            Ok(Ok(_)) if &ack == regctl_protocol::tokens::ACK => {}
            Ok(Ok(_)) => {
                drop(state);
                return Err(self
                    .record_error(Error::new(ErrorKind::ConnectionFailed, "handshake did not return ACK"))
                    .await);
            }
            Ok(Err(err)) => {
                drop(state);
                return Err(self
                    .record_error(Error::new(
                        ErrorKind::ConnectionFailed,
                        format!("handshake read failed: {err}"),
                    ))
                    .await);
            }
            Err(_) => {
                drop(state);
                return Err(self
                    .record_error(Error::new(ErrorKind::Timeout, "handshake timed out"))
                    .await);
            }
        }

        state.stream = Some(stream);
        drop(state);
        self.log(&format!("connected to {host}:{port}"));
        Ok(())
    }

    /// `disconnect()`: sends `exit` and closes the stream. Always leaves the
    /// session disconnected, even if the `exit` write fails.
    pub async fn disconnect(&self) -> Result<(), Error> {
        let mut state = self.state.lock().await;
        if let Some(mut stream) = state.stream.take() {
            let _ = stream.write_all(regctl_protocol::tokens::EXIT).await;
        }
        Ok(())
    }

    /// `destroy()`: if connected, disconnects (sending `exit`), then
    /// consumes the session. Rust frees the underlying socket when `self`
    /// drops; this method exists to mirror the explicit lifecycle of spec
    /// §4.4 for callers that model sessions that way.
    pub async fn destroy(self) -> Result<(), Error> {
        self.disconnect().await
    }

    /// `set_timeout(ms)`: updates the timeout applied to subsequent send
    /// and receive operations.
    pub async fn set_timeout(&self, ms: u64) -> Result<(), Error> {
        let mut state = self.state.lock().await;
        state.timeout = Duration::from_millis(ms);
        Ok(())
    }

    /// Sends `frame` verbatim and returns the response frame, without
    /// access-permission checks or write verification. `send_raw` (spec
    /// §4.4: "Reserved for tests; not part of the shipping surface").
    pub async fn send_raw(&self, frame: &str) -> Result<String, Error> {
        let msg = Message::parse(frame).map_err(Error::from);
        let msg = match msg {
            Ok(msg) => msg,
            Err(err) => return Err(self.record_error(err).await),
        };
        let response = self.exchange(&msg).await?;
        Ok(response.format())
    }

    /// Sends `request` and returns the parsed response, bounded by the
    /// session's configured timeout (spec §4.4, §5 "Suspension points").
    pub(crate) async fn exchange(&self, request: &Message) -> Result<Message, Error> {
        let mut state = self.state.lock().await;
        let timeout = state.timeout;
        let stream = match state.stream.as_mut() {
            Some(stream) => stream,
            None => {
                drop(state);
                return Err(self
                    .record_error(Error::new(ErrorKind::NotConnected, "session is not connected"))
                    .await);
            }
        };

        let frame = request.format();
        let send_and_recv = async {
            stream.write_all(frame.as_bytes()).await?;
            let mut buf = [0u8; 6];
            stream.read_exact(&mut buf).await?;
            Ok::<_, std::io::Error>(buf)
        };

        let result = tokio::time::timeout(timeout, send_and_recv).await;
        drop(state);

        let buf = match result {
            Ok(Ok(buf)) => buf,
            Ok(Err(err)) => {
                return Err(self
                    .record_error(Error::new(
                        ErrorKind::CommunicationFailed,
                        format!("send/recv failed: {err}"),
                    ))
                    .await);
            }
            Err(_) => {
                return Err(self
                    .record_error(Error::new(ErrorKind::Timeout, "send/recv timed out"))
                    .await);
            }
        };

        let response_frame = std::str::from_utf8(&buf).map_err(|_| {
            Error::new(ErrorKind::ProtocolError, "response was not valid UTF-8")
        });
        let response_frame = match response_frame {
            Ok(s) => s,
            Err(err) => return Err(self.record_error(err).await),
        };

        match Message::parse(response_frame) {
            Ok(msg) => Ok(msg),
            Err(err) => Err(self.record_error(Error::from(err)).await),
        }
    }
}
