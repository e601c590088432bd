//! Interactive session: prompt caching and batch execution.

use std::convert::Infallible;
use std::fmt;
use std::time::Duration;

use futures_core::Stream;
use log::{debug, warn};

use super::runner;
use super::stream::{self, OutputLine};
use crate::channel::{PromptPattern, PtyChannel, PtyConfig, detect_prompt};
use crate::error::{BoxError, Result, SessionError};
use crate::transport::{SshTransport, Transport};

/// Timing and buffering knobs for a session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Longest wait for any single chunk of output (default: 10s).
    pub idle_timeout: Duration,

    /// Total time allowed for prompt detection (default: 10s).
    pub detect_timeout: Duration,

    /// Quiet interval that ends a raw read or drain (default: 200ms).
    pub settle: Duration,

    /// Bytes of output tail searched for the prompt (default: 1000).
    pub search_depth: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(10),
            detect_timeout: Duration::from_secs(10),
            settle: Duration::from_millis(200),
            search_depth: 1000,
        }
    }
}

impl SessionOptions {
    fn pty_config(&self) -> PtyConfig {
        PtyConfig {
            idle_timeout: self.idle_timeout,
            settle: self.settle,
            search_depth: self.search_depth,
        }
    }
}

/// One interactive shell on a remote host.
///
/// A session runs exactly one batch: [`run`](Self::run),
/// [`try_run`](Self::try_run) and [`into_lines`](Self::into_lines) consume it
/// and disconnect when the batch ends, whether it succeeded or not. Use
/// [`Connector::connect`](super::Connector::connect) again for the next batch.
///
/// # Example
///
/// ```rust,no_run
/// use remote_commands::{Connector, ServerRegistry};
///
/// # async fn example() -> Result<(), remote_commands::Error> {
/// let registry = ServerRegistry::from_path("servers.json")?;
/// let session = Connector::new(registry).connect("web1").await?;
///
/// session
///     .run(["cd /var/log", "ls"], |line| println!("{line}"))
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct Session<T: Transport = SshTransport> {
    channel: PtyChannel<T>,

    /// Detected on first use, then fixed for the session's lifetime.
    prompt: Option<PromptPattern>,

    options: SessionOptions,
}

impl<T: Transport> Session<T> {
    /// Wrap a connected transport.
    pub fn new(transport: T, options: SessionOptions) -> Self {
        Self {
            channel: PtyChannel::new(transport, options.pty_config()),
            prompt: None,
            options,
        }
    }

    /// Use a known prompt pattern instead of detecting one.
    pub fn with_prompt(mut self, prompt: PromptPattern) -> Self {
        self.prompt = Some(prompt);
        self
    }

    /// The prompt pattern, once known.
    pub fn prompt(&self) -> Option<&PromptPattern> {
        self.prompt.as_ref()
    }

    /// Get the session options.
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Run `commands` in order, passing each output line to `on_line`.
    ///
    /// Lines are delivered as soon as their command's output is complete, and
    /// before the next command is sent. Lines delivered before a failure stay
    /// delivered. The connection is closed before this returns.
    pub async fn run<I, S, F>(self, commands: I, mut on_line: F) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: FnMut(&str),
    {
        self.try_run(commands, |line| {
            on_line(line);
            Ok::<(), Infallible>(())
        })
        .await
    }

    /// Like [`run`](Self::run), but `on_line` may stop the batch by returning
    /// an error.
    pub async fn try_run<I, S, F, E>(mut self, commands: I, mut on_line: F) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: FnMut(&str) -> std::result::Result<(), E>,
        E: Into<BoxError>,
    {
        let outcome =
            match ensure_prompt(&mut self.channel, &mut self.prompt, self.options.detect_timeout)
                .await
            {
                Ok(prompt) => {
                    runner::run_commands(&mut self.channel, prompt, commands, &mut on_line).await
                }
                Err(e) => Err(e),
            };

        release(self.channel, outcome).await
    }

    /// Run `commands` and yield their output lines as a stream.
    ///
    /// Nothing is sent until the stream is polled. The connection is closed
    /// when the stream ends or yields an error.
    pub fn into_lines<I, S>(self, commands: I) -> impl Stream<Item = Result<OutputLine>> + Send
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        stream::lines(
            self.channel,
            self.prompt,
            commands.into_iter().map(Into::<String>::into).collect(),
            self.options.detect_timeout,
        )
    }
}

impl<T: Transport> fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("prompt", &self.prompt.as_ref().map(PromptPattern::as_str))
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Return the cached prompt pattern, detecting and compiling it first if
/// needed.
pub(crate) async fn ensure_prompt<'a, T: Transport>(
    channel: &mut PtyChannel<T>,
    cached: &'a mut Option<PromptPattern>,
    budget: Duration,
) -> Result<&'a PromptPattern> {
    let prompt = match cached.take() {
        Some(prompt) => prompt,
        None => {
            let line = detect_prompt(channel, budget).await?;
            let prompt = PromptPattern::compile(&line)?;
            debug!(
                "prompt {:?} compiled to {} (generalized: {})",
                line,
                prompt,
                prompt.is_generalized()
            );

            let discarded = channel
                .discard_pending()
                .await
                .map_err(|source| SessionError::ReadFailed {
                    command: None,
                    source,
                })?;
            if discarded > 0 {
                debug!("discarded {} bytes of probe output", discarded);
            }
            prompt
        }
    };
    Ok(cached.insert(prompt))
}

/// Close the channel, then hand back the batch outcome.
pub(crate) async fn release<T: Transport>(channel: PtyChannel<T>, outcome: Result<()>) -> Result<()> {
    match channel.close().await {
        Ok(()) => debug!("session closed"),
        Err(e) if outcome.is_ok() => warn!("failed to close session cleanly: {}", e),
        Err(e) => debug!("close after failed batch also failed: {}", e),
    }
    outcome
}
