//! PTY channel: pattern-bounded reads over a raw transport.

use std::time::Duration;

use log::trace;
use tokio::time::Instant;

use super::buffer::PatternBuffer;
use super::patterns::PromptMatcher;
use crate::error::{ChannelError, Result};
use crate::transport::Transport;

type ChannelResult<T> = std::result::Result<T, ChannelError>;

/// Configuration for PTY channel behavior.
#[derive(Debug, Clone)]
pub struct PtyConfig {
    /// Longest wait for a single chunk of output.
    pub idle_timeout: Duration,

    /// Quiet interval that ends a raw read or a drain.
    pub settle: Duration,

    /// Search depth for pattern matching.
    pub search_depth: usize,
}

impl Default for PtyConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(10),
            settle: Duration::from_millis(200),
            search_depth: 1000,
        }
    }
}

/// High-level PTY channel for an interactive shell.
///
/// This wraps a [`Transport`] and provides line writes plus the two read
/// primitives the session needs: a raw read of whatever is available and a
/// read that stops once the last line matches a prompt.
pub struct PtyChannel<T> {
    transport: T,

    /// Configuration for this channel.
    config: PtyConfig,

    /// Pattern buffer for accumulating output.
    buffer: PatternBuffer,
}

impl<T: Transport> PtyChannel<T> {
    /// Create a new PTY channel over a connected transport.
    pub fn new(transport: T, config: PtyConfig) -> Self {
        Self {
            buffer: PatternBuffer::new(config.search_depth),
            transport,
            config,
        }
    }

    /// Get the per-read idle timeout.
    pub fn idle_timeout(&self) -> Duration {
        self.config.idle_timeout
    }

    /// Send `line` followed by a newline.
    pub async fn write_line(&mut self, line: &str) -> ChannelResult<()> {
        let mut data = Vec::with_capacity(line.len() + 1);
        data.extend_from_slice(line.as_bytes());
        data.push(b'\n');
        self.transport.send(&data).await
    }

    /// Read until the last line of the accumulated output matches `matcher`.
    ///
    /// Every chunk must arrive within the idle timeout. Returns everything read,
    /// including the matching prompt line, with escape sequences removed.
    pub async fn read_until<M: PromptMatcher + ?Sized>(&mut self, matcher: &M) -> ChannelResult<Vec<u8>> {
        self.buffer.clear();
        loop {
            let chunk = match self.transport.read_chunk(self.config.idle_timeout).await {
                Ok(chunk) => chunk,
                Err(e) => {
                    self.buffer.clear();
                    return Err(e);
                }
            };

            self.buffer.extend(&chunk);
            trace!(
                "read {} bytes, buffer: {} bytes",
                chunk.len(),
                self.buffer.len()
            );

            if self.buffer.tail_matches(matcher) {
                return Ok(self.buffer.take());
            }
        }
    }

    /// Read whatever output is currently available.
    ///
    /// Waits up to `idle` for the first chunk, then keeps collecting while
    /// further chunks follow within the settle interval (bounded by `idle`
    /// overall).
    pub async fn read_available(&mut self, idle: Duration) -> ChannelResult<Vec<u8>> {
        self.buffer.clear();

        let first = self.transport.read_chunk(idle).await?;
        self.buffer.extend(&first);

        let deadline = Instant::now() + idle;
        while Instant::now() < deadline {
            let wait = self
                .config
                .settle
                .min(deadline.saturating_duration_since(Instant::now()));
            match self.transport.read_chunk(wait).await {
                Ok(chunk) => self.buffer.extend(&chunk),
                Err(ChannelError::IdleTimeout(_)) => break,
                Err(e) => {
                    self.buffer.clear();
                    return Err(e);
                }
            }
        }

        Ok(self.buffer.take())
    }

    /// Throw away output until the stream has been quiet for the settle
    /// interval. Returns the number of bytes discarded.
    pub async fn discard_pending(&mut self) -> ChannelResult<usize> {
        let mut discarded = 0;
        loop {
            match self.transport.read_chunk(self.config.settle).await {
                Ok(chunk) => discarded += chunk.len(),
                Err(ChannelError::IdleTimeout(_)) => return Ok(discarded),
                Err(e) => return Err(e),
            }
        }
    }

    /// Close the underlying transport.
    pub async fn close(self) -> Result<()> {
        self.transport.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::PromptPattern;
    use crate::transport::ScriptedTransport;

    fn channel(transport: ScriptedTransport) -> PtyChannel<ScriptedTransport> {
        PtyChannel::new(transport, PtyConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_until_spans_chunks() {
        let transport = ScriptedTransport::new().reply(["ls\r\nfile1\r\n[deploy@", "web1 ~]$ "]);
        let mut channel = channel(transport);
        let prompt = PromptPattern::compile("[deploy@web1 ~]$").unwrap();

        channel.write_line("ls").await.unwrap();
        let data = channel.read_until(&prompt).await.unwrap();
        assert_eq!(data, b"ls\r\nfile1\r\n[deploy@web1 ~]$ ");
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_until_idle_timeout() {
        let transport = ScriptedTransport::new().reply(["partial output\r\n"]);
        let mut channel = channel(transport);
        let prompt = PromptPattern::compile("[deploy@web1 ~]$").unwrap();

        channel.write_line("sleep 60").await.unwrap();
        let err = channel.read_until(&prompt).await.unwrap_err();
        assert!(matches!(err, ChannelError::IdleTimeout(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_available_coalesces_chunks() {
        let transport = ScriptedTransport::new()
            .greeting("Last login: today\r\n")
            .greeting("\x1b[1m[deploy@web1 ~]$ \x1b[0m");
        let mut channel = channel(transport);

        let data = channel.read_available(Duration::from_secs(10)).await.unwrap();
        assert_eq!(data, b"Last login: today\r\n[deploy@web1 ~]$ ");
    }

    #[tokio::test(start_paused = true)]
    async fn test_discard_pending() {
        let transport = ScriptedTransport::new().greeting("[a b]$ ").greeting("\r\n[a b]$ ");
        let mut channel = channel(transport);

        assert_eq!(channel.discard_pending().await.unwrap(), 16);
        assert_eq!(channel.discard_pending().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_write_line_appends_newline() {
        let transport = ScriptedTransport::new();
        let handle = transport.handle();
        let mut channel = channel(transport);

        channel.write_line("uptime").await.unwrap();
        assert_eq!(handle.writes(), vec!["uptime\n"]);
    }
}
