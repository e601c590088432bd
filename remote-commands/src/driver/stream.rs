//! Pull-based delivery of command output.
//!
//! [`Session::into_lines`](super::Session::into_lines) yields the same lines
//! that [`Session::run`](super::Session::run) would hand to its callback, as a
//! `Stream` the caller drains at its own pace. Commands are still sent one at
//! a time: the next one goes out only after every line of the previous one
//! has been taken from the stream.

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use futures_core::Stream;
use futures_util::stream::try_unfold;
use log::warn;

use super::runner;
use super::session::{ensure_prompt, release};
use crate::channel::{PromptPattern, PtyChannel};
use crate::error::{ChannelError, Result, SessionError};
use crate::transport::Transport;

/// One line of command output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    /// The command that produced this line.
    pub command: String,

    /// The trimmed, non-empty line text.
    pub text: String,
}

impl fmt::Display for OutputLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

struct LineState<T: Transport> {
    /// `None` once the connection has been released.
    channel: Option<PtyChannel<T>>,
    prompt: Option<PromptPattern>,
    commands: VecDeque<String>,
    pending: VecDeque<OutputLine>,
    detect_timeout: Duration,
}

impl<T: Transport> LineState<T> {
    async fn next_line(&mut self) -> Result<Option<OutputLine>> {
        loop {
            if let Some(line) = self.pending.pop_front() {
                return Ok(Some(line));
            }

            let Some(command) = self.commands.pop_front() else {
                self.finish(Ok(())).await?;
                return Ok(None);
            };

            match self.execute(&command).await {
                Ok(lines) => self.pending.extend(lines.into_iter().map(|text| OutputLine {
                    command: command.clone(),
                    text,
                })),
                Err(e) => {
                    self.finish(Err(e)).await?;
                    return Ok(None);
                }
            }
        }
    }

    async fn execute(&mut self, command: &str) -> Result<Vec<String>> {
        let Some(channel) = self.channel.as_mut() else {
            return Err(SessionError::ReadFailed {
                command: Some(command.to_string()),
                source: ChannelError::Closed,
            }
            .into());
        };
        let prompt = ensure_prompt(channel, &mut self.prompt, self.detect_timeout).await?;
        runner::execute(channel, prompt, command).await
    }

    async fn finish(&mut self, outcome: Result<()>) -> Result<()> {
        match self.channel.take() {
            Some(channel) => release(channel, outcome).await,
            None => outcome,
        }
    }
}

impl<T: Transport> Drop for LineState<T> {
    fn drop(&mut self) {
        if self.channel.is_some() {
            warn!(
                "line stream dropped with {} commands left; connection dropped without an explicit close",
                self.commands.len()
            );
        }
    }
}

pub(crate) fn lines<T: Transport>(
    channel: PtyChannel<T>,
    prompt: Option<PromptPattern>,
    commands: VecDeque<String>,
    detect_timeout: Duration,
) -> impl Stream<Item = Result<OutputLine>> + Send {
    let state = LineState {
        channel: Some(channel),
        prompt,
        commands,
        pending: VecDeque::new(),
        detect_timeout,
    };

    try_unfold(state, |mut state| async move {
        Ok(state.next_line().await?.map(|line| (line, state)))
    })
}

#[cfg(test)]
mod tests {
    use futures_util::TryStreamExt;

    use super::*;
    use crate::driver::{Session, SessionOptions};
    use crate::error::ErrorKind;
    use crate::transport::ScriptedTransport;

    const PROMPT: &str = "[deploy@web1 ~]$ ";

    #[tokio::test(start_paused = true)]
    async fn test_lines_stream() {
        let transport = ScriptedTransport::new()
            .reply([PROMPT])
            .reply(["ls\nfile1\nfile2\n", PROMPT])
            .reply(["cd /tmp\n[deploy@web1 /tmp]$ "])
            .reply(["pwd\n/tmp\n[deploy@web1 /tmp]$ "]);
        let handle = transport.handle();

        let session = Session::new(transport, SessionOptions::default());
        let lines: Vec<OutputLine> = session
            .into_lines(["ls", "cd /tmp", "pwd"])
            .try_collect()
            .await
            .unwrap();

        let texts: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["file1", "file2", "/tmp"]);
        assert_eq!(lines[2].command, "pwd");
        assert_eq!(handle.close_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_is_lazy_per_command() {
        let transport = ScriptedTransport::new()
            .reply([PROMPT])
            .reply(["seq 2\n1\n2\n", PROMPT])
            .reply(["echo done\ndone\n", PROMPT]);
        let handle = transport.handle();

        let session = Session::new(transport, SessionOptions::default());
        let stream = session.into_lines(["seq 2", "echo done"]);
        futures_util::pin_mut!(stream);

        assert_eq!(handle.writes(), Vec::<String>::new());

        let first = stream.try_next().await.unwrap().unwrap();
        assert_eq!(first.text, "1");
        assert_eq!(handle.writes(), vec!["\n", "seq 2\n"]);

        let rest: Vec<OutputLine> = stream.try_collect().await.unwrap();
        assert_eq!(rest.len(), 2);
        assert_eq!(handle.writes(), vec!["\n", "seq 2\n", "echo done\n"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_stream_skips_close() {
        let transport = ScriptedTransport::new()
            .reply([PROMPT])
            .reply(["ls\nfile1\nfile2\n", PROMPT]);
        let handle = transport.handle();

        let session = Session::new(transport, SessionOptions::default());
        {
            let stream = session.into_lines(["ls", "pwd"]);
            futures_util::pin_mut!(stream);
            assert_eq!(stream.try_next().await.unwrap().unwrap().text, "file1");
        }

        assert_eq!(handle.writes(), vec!["\n", "ls\n"]);
        assert_eq!(handle.close_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_error_ends_stream_and_closes() {
        let transport = ScriptedTransport::new()
            .reply([PROMPT])
            .reply(["date\nMon Oct 19\n", PROMPT])
            .silence();
        let handle = transport.handle();

        let session = Session::new(transport, SessionOptions::default());
        let stream = session.into_lines(["date", "hang"]);
        futures_util::pin_mut!(stream);

        assert_eq!(stream.try_next().await.unwrap().unwrap().text, "Mon Oct 19");
        let err = stream.try_next().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Read);
        assert_eq!(err.command(), Some("hang"));
        assert_eq!(handle.close_count(), 1);
    }
}
