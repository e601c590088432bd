//! Scripted transport for testing without an SSH server.
//!
//! Each line written to the transport releases the next scripted reply into
//! the output queue. Reads drain that queue one chunk at a time; when it is
//! empty they wait out the idle timeout, like a quiet shell would.
//!
//! ```rust
//! use remote_commands::transport::ScriptedTransport;
//!
//! let transport = ScriptedTransport::new()
//!     // reply to the prompt probe
//!     .reply(["Last login: Mon Oct 19\r\n[deploy@web1 ~]$ "])
//!     // reply to the first command
//!     .reply(["ls\r\nfile1\r\nfile2\r\n", "[deploy@web1 ~]$ "]);
//! let handle = transport.handle();
//! # drop(handle);
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::Transport;
use crate::error::{ChannelError, Result};

#[derive(Debug, Clone)]
enum Event {
    Data(Vec<u8>),
    Pause(Duration),
}

#[derive(Debug, Clone)]
enum Reply {
    Output(Vec<Event>),
    Silence,
    Hangup,
    /// Fails the write that would release it.
    WriteError,
}

#[derive(Debug, Default)]
struct ScriptState {
    writes: Vec<String>,
    closes: usize,
}

/// In-memory [`Transport`] that answers writes from a script.
#[derive(Debug)]
pub struct ScriptedTransport {
    pending: VecDeque<Event>,
    replies: VecDeque<Reply>,
    hung_up: bool,
    fail_close: bool,
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedTransport {
    /// Create a transport with an empty script.
    pub fn new() -> Self {
        Self {
            pending: VecDeque::new(),
            replies: VecDeque::new(),
            hung_up: false,
            fail_close: false,
            state: Arc::new(Mutex::new(ScriptState::default())),
        }
    }

    /// Output that is already waiting before anything is written.
    pub fn greeting(mut self, chunk: impl AsRef<[u8]>) -> Self {
        self.pending.push_back(Event::Data(chunk.as_ref().to_vec()));
        self
    }

    /// Queue the chunks released by the next write.
    pub fn reply<I, C>(mut self, chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: AsRef<[u8]>,
    {
        let chunks = chunks
            .into_iter()
            .map(|c| Event::Data(c.as_ref().to_vec()))
            .collect();
        self.replies.push_back(Reply::Output(chunks));
        self
    }

    /// Append a chunk that arrives `delay` after the chunks before it. It
    /// extends the last queued reply, or the greeting when the last queued
    /// step is not an output reply.
    pub fn then_after(mut self, delay: Duration, chunk: impl AsRef<[u8]>) -> Self {
        let events = [Event::Pause(delay), Event::Data(chunk.as_ref().to_vec())];
        match self.replies.back_mut() {
            Some(Reply::Output(reply)) => reply.extend(events),
            _ => self.pending.extend(events),
        }
        self
    }

    /// The next write gets no output at all.
    pub fn silence(mut self) -> Self {
        self.replies.push_back(Reply::Silence);
        self
    }

    /// The next write makes the remote side close the channel.
    pub fn hangup(mut self) -> Self {
        self.replies.push_back(Reply::Hangup);
        self
    }

    /// The next write fails as if the channel had gone away. The failed write
    /// is not recorded.
    pub fn fail_write(mut self) -> Self {
        self.replies.push_back(Reply::WriteError);
        self
    }

    /// Make `close` report an error. The close is still counted.
    pub fn fail_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    /// A handle for inspecting writes and closes after the transport is moved.
    pub fn handle(&self) -> ScriptHandle {
        ScriptHandle {
            state: self.state.clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for ScriptedTransport {
    async fn send(&mut self, data: &[u8]) -> std::result::Result<(), ChannelError> {
        if self.hung_up {
            return Err(ChannelError::Closed);
        }
        if matches!(self.replies.front(), Some(Reply::WriteError)) {
            self.replies.pop_front();
            return Err(ChannelError::Closed);
        }

        self.lock()
            .writes
            .push(String::from_utf8_lossy(data).into_owned());

        match self.replies.pop_front() {
            Some(Reply::Output(chunks)) => self.pending.extend(chunks),
            Some(Reply::Hangup) => self.hung_up = true,
            Some(Reply::Silence) | Some(Reply::WriteError) | None => {}
        }
        Ok(())
    }

    async fn read_chunk(&mut self, idle: Duration) -> std::result::Result<Vec<u8>, ChannelError> {
        while let Some(event) = self.pending.pop_front() {
            match event {
                Event::Data(chunk) => return Ok(chunk),
                Event::Pause(left) if left > idle => {
                    self.pending.push_front(Event::Pause(left - idle));
                    tokio::time::sleep(idle).await;
                    return Err(ChannelError::IdleTimeout(idle));
                }
                Event::Pause(left) => tokio::time::sleep(left).await,
            }
        }
        if self.hung_up {
            return Err(ChannelError::Closed);
        }
        tokio::time::sleep(idle).await;
        Err(ChannelError::IdleTimeout(idle))
    }

    async fn close(self) -> Result<()> {
        self.lock().closes += 1;
        if self.fail_close {
            return Err(ChannelError::Closed.into());
        }
        Ok(())
    }
}

/// Observer for a [`ScriptedTransport`].
#[derive(Debug, Clone)]
pub struct ScriptHandle {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptHandle {
    /// Everything written to the transport, one entry per write.
    pub fn writes(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .writes
            .clone()
    }

    /// How many times the transport was closed.
    pub fn close_count(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .closes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_write_releases_reply() {
        let mut transport = ScriptedTransport::new().reply(["one", "two"]);
        let handle = transport.handle();

        transport.send(b"cmd\n").await.unwrap();
        assert_eq!(transport.read_chunk(Duration::from_secs(1)).await.unwrap(), b"one");
        assert_eq!(transport.read_chunk(Duration::from_secs(1)).await.unwrap(), b"two");
        assert_eq!(handle.writes(), vec!["cmd\n"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_queue_idles_out() {
        let mut transport = ScriptedTransport::new();
        let err = transport.read_chunk(Duration::from_secs(10)).await.unwrap_err();
        assert!(matches!(err, ChannelError::IdleTimeout(d) if d == Duration::from_secs(10)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delayed_chunk() {
        let mut transport = ScriptedTransport::new()
            .reply(["first"])
            .then_after(Duration::from_millis(300), "second");

        transport.send(b"go\n").await.unwrap();
        let idle = Duration::from_millis(200);
        assert_eq!(transport.read_chunk(idle).await.unwrap(), b"first");
        assert!(matches!(
            transport.read_chunk(idle).await,
            Err(ChannelError::IdleTimeout(_))
        ));
        assert_eq!(transport.read_chunk(idle).await.unwrap(), b"second");
    }

    #[tokio::test(start_paused = true)]
    async fn test_hangup() {
        let mut transport = ScriptedTransport::new().hangup();
        transport.send(b"exit\n").await.unwrap();
        assert!(matches!(
            transport.read_chunk(Duration::from_secs(1)).await,
            Err(ChannelError::Closed)
        ));
        assert!(matches!(transport.send(b"ls\n").await, Err(ChannelError::Closed)));
    }

    #[tokio::test]
    async fn test_failed_write() {
        let mut transport = ScriptedTransport::new().reply(["ok"]).fail_write();
        let handle = transport.handle();

        transport.send(b"first\n").await.unwrap();
        assert!(matches!(transport.send(b"second\n").await, Err(ChannelError::Closed)));
        transport.send(b"third\n").await.unwrap();
        assert_eq!(handle.writes(), vec!["first\n", "third\n"]);
    }

    #[tokio::test]
    async fn test_failed_close_is_still_counted() {
        let transport = ScriptedTransport::new().fail_close();
        let handle = transport.handle();
        assert!(transport.close().await.is_err());
        assert_eq!(handle.close_count(), 1);
    }

    #[tokio::test]
    async fn test_close_is_recorded() {
        let transport = ScriptedTransport::new();
        let handle = transport.handle();
        transport.close().await.unwrap();
        assert_eq!(handle.close_count(), 1);
    }
}
