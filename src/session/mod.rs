mod buffer;
pub mod telnet;

use crate::error::{GatewayError, GatewayResult};
use crate::transport::Transport;
use buffer::{RecvBuffer, SendBuffer};
use futures::FutureExt;
use std::collections::HashMap;
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use telnet::{Decoded, TelnetDecoder, command_name};
use tokio::sync::{Notify, RwLock};

pub type SessionId = u64;

/// Per-session tunables, normally taken from the gateway config.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub rows: u16,
    pub recv_capacity: usize,
    pub send_capacity: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            rows: 24,
            recv_capacity: 1024,
            send_capacity: 1024,
        }
    }
}

/// Everything the data path touches, under one lock: the transport handle,
/// both buffers, the decoder state and the tracked cursor. One logical
/// read/write/flush at a time per session; the only suspension points are
/// the transport calls.
struct IoState {
    conn: Box<dyn Transport>,
    rx: RecvBuffer,
    tx: SendBuffer,
    decoder: TelnetDecoder,
    cursor_x: i32,
    cursor_y: i32,
    rows: i32,
}

impl IoState {
    async fn flush_out(&mut self) -> GatewayResult<()> {
        if self.tx.is_empty() {
            return Ok(());
        }
        let Self { conn, tx, .. } = self;
        conn.send(tx.filled()).await?;
        tx.clear();
        Ok(())
    }

    /// Append one outbound byte, flushing the full buffer first when needed.
    async fn push_out(&mut self, byte: u8) -> GatewayResult<()> {
        if self.tx.is_full() {
            self.flush_out().await?;
        }
        self.tx.push(byte);
        Ok(())
    }

    /// Converting send for one byte: LF expands to CR LF and moves the
    /// cursor to the start of the next row (bounded by the terminal
    /// height), backspace walks the column back, everything else advances
    /// it.
    async fn push_converted(&mut self, byte: u8) -> GatewayResult<()> {
        if byte == b'\n' {
            self.push_out(b'\r').await?;
            self.push_out(b'\n').await?;
            self.cursor_x = 0;
            if self.cursor_y < self.rows - 1 {
                self.cursor_y += 1;
            }
        } else {
            self.push_out(byte).await?;
            if byte == 0x08 {
                self.cursor_x -= 1;
            } else {
                self.cursor_x += 1;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Lifecycle {
    refs: u32,
    task_finished: bool,
    socket_closed: bool,
}

impl Lifecycle {
    fn is_zombie(&self) -> bool {
        self.task_finished || self.socket_closed
    }
}

/// One telnet console session over an exclusively owned transport.
///
/// Sessions are shared as `Arc<Session>` between the registry, lookup
/// holders and the I/O paths; dropping the last clone releases the buffers
/// and the connection.
pub struct Session {
    id: SessionId,
    service_name: String,
    io: tokio::sync::Mutex<IoState>,
    lifecycle: Mutex<Lifecycle>,
    drained: Notify,
}

impl Session {
    fn new(id: SessionId, conn: Box<dyn Transport>, options: &SessionOptions) -> Self {
        Self {
            id,
            service_name: format!("term/telnet{}.{}", process::id(), id),
            io: tokio::sync::Mutex::new(IoState {
                conn,
                rx: RecvBuffer::new(options.recv_capacity),
                tx: SendBuffer::new(options.send_capacity),
                decoder: TelnetDecoder::default(),
                cursor_x: 0,
                cursor_y: 0,
                rows: i32::from(options.rows),
            }),
            lifecycle: Mutex::new(Lifecycle::default()),
            drained: Notify::new(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Location-service style name for this session, `term/telnet<pid>.<id>`.
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Read decoded application bytes into `dest`.
    ///
    /// Suspends until at least one byte is available or the connection
    /// fails. Once something has been produced the call never waits for
    /// more: it continues across a buffer refill only when the transport
    /// has bytes ready immediately, and otherwise returns what it has.
    pub async fn read(&self, dest: &mut [u8]) -> GatewayResult<usize> {
        assert!(!dest.is_empty(), "read into an empty destination");
        let mut io = self.io.lock().await;
        let mut nread = 0;

        loop {
            while nread < dest.len() {
                let Some(byte) = io.rx.next() else { break };
                match io.decoder.decode(byte) {
                    Decoded::Data(b) => {
                        dest[nread] = b;
                        nread += 1;
                    }
                    Decoded::Nothing => {}
                    Decoded::Command { command, option } => {
                        tracing::debug!(
                            session = self.id,
                            command = command_name(command),
                            code = command,
                            option,
                            "Ignoring telnet command"
                        );
                    }
                }
            }

            if nread == dest.len() {
                return Ok(nread);
            }

            // The receive buffer is dry. With nothing produced yet this is
            // a blocking refill; with a partial result we only take bytes
            // the transport can hand over without waiting.
            if nread == 0 {
                let count = {
                    let IoState { conn, rx, .. } = &mut *io;
                    conn.recv(rx.space()).await?
                };
                if count == 0 {
                    self.mark_socket_closed();
                    return Err(GatewayError::PeerClosed);
                }
                io.rx.commit(count);
            } else {
                let immediate = {
                    let IoState { conn, rx, .. } = &mut *io;
                    conn.recv(rx.space()).now_or_never()
                };
                match immediate {
                    Some(Ok(0)) => {
                        // Report the close on the next read; this one
                        // still delivers what it decoded.
                        self.mark_socket_closed();
                        return Ok(nread);
                    }
                    Some(Ok(count)) => io.rx.commit(count),
                    Some(Err(err)) => {
                        tracing::warn!(
                            session = self.id,
                            error = %err,
                            "Receive failed after a partial read"
                        );
                        return Ok(nread);
                    }
                    None => return Ok(nread),
                }
            }
        }
    }

    /// Converting write: newline expansion and cursor tracking applied.
    pub async fn write(&self, data: &[u8]) -> GatewayResult<()> {
        let mut io = self.io.lock().await;
        for &byte in data {
            io.push_converted(byte).await?;
        }
        Ok(())
    }

    /// Raw write: bytes reach the send buffer untouched, with no cursor
    /// tracking. For control sequences that must not be reinterpreted.
    pub async fn write_raw(&self, data: &[u8]) -> GatewayResult<()> {
        let mut io = self.io.lock().await;
        for &byte in data {
            io.push_out(byte).await?;
        }
        Ok(())
    }

    /// Push any partially filled send buffer out to the peer.
    pub async fn flush(&self) -> GatewayResult<()> {
        let mut io = self.io.lock().await;
        io.flush_out().await
    }

    /// Move the tracked cursor column, emitting a single backspace when
    /// the target is exactly one column to the left. Any other move only
    /// updates the tracked value; redrawing is the caller's business.
    pub async fn set_cursor_column(&self, column: i32) -> GatewayResult<()> {
        let mut io = self.io.lock().await;
        let result = if io.cursor_x - 1 == column {
            io.push_converted(0x08).await
        } else {
            Ok(())
        };
        io.cursor_x = column;
        result
    }

    pub async fn cursor(&self) -> (i32, i32) {
        let io = self.io.lock().await;
        (io.cursor_x, io.cursor_y)
    }

    pub fn ref_count(&self) -> u32 {
        self.lock_lifecycle().refs
    }

    /// True once either end has gone away: the client task exited or the
    /// peer closed the connection. Monotonic.
    pub fn is_zombie(&self) -> bool {
        self.lock_lifecycle().is_zombie()
    }

    /// Record that the client-side task has exited.
    pub fn notify_task_finished(&self) {
        self.lock_lifecycle().task_finished = true;
    }

    /// Drop a reference obtained through [`Registry::find_and_acquire`].
    /// The last release wakes any teardown waiting in [`Session::wait_drained`].
    pub fn release(&self) {
        let mut lifecycle = self.lock_lifecycle();
        assert!(
            lifecycle.refs > 0,
            "session reference released without a matching acquire"
        );
        lifecycle.refs -= 1;
        let drained = lifecycle.refs == 0;
        drop(lifecycle);
        if drained {
            self.drained.notify_waiters();
        }
    }

    /// Suspend until the reference count reaches zero.
    pub async fn wait_drained(&self) {
        loop {
            let notified = self.drained.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.lock_lifecycle().refs == 0 {
                return;
            }
            notified.await;
        }
    }

    fn try_acquire(&self) -> bool {
        let mut lifecycle = self.lock_lifecycle();
        if lifecycle.is_zombie() {
            return false;
        }
        lifecycle.refs += 1;
        true
    }

    fn mark_socket_closed(&self) {
        self.lock_lifecycle().socket_closed = true;
    }

    fn lock_lifecycle(&self) -> std::sync::MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().expect("lifecycle mutex poisoned")
    }
}

/// The process-wide set of live sessions.
///
/// Owns nothing but membership: a session lives in the registry from
/// `insert` until `remove`, and `remove` is the only path that makes it
/// unreachable for new lookups.
pub struct Registry {
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
    next_id: AtomicU64,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Allocate a session around an exclusively owned transport. The new
    /// session is not yet registered; pair with [`Registry::insert`].
    pub fn create(&self, conn: Box<dyn Transport>, options: &SessionOptions) -> Arc<Session> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Arc::new(Session::new(id, conn, options))
    }

    pub async fn insert(&self, session: Arc<Session>) {
        self.sessions.write().await.insert(session.id(), session);
    }

    pub async fn remove(&self, session: &Session) -> bool {
        self.sessions.write().await.remove(&session.id()).is_some()
    }

    /// Look a session up by id and take a reference on it in one step.
    ///
    /// A session that is already a zombie is never handed out: the call
    /// reports not-found and provably leaves its reference count alone.
    pub async fn find_and_acquire(&self, id: SessionId) -> Option<Arc<Session>> {
        let sessions = self.sessions.read().await;
        let session = sessions.get(&id)?;
        if session.try_acquire() {
            Some(Arc::clone(session))
        } else {
            None
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
