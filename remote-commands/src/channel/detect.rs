//! Prompt detection on a freshly opened shell.
//!
//! Login banners and MOTD text vary too much to predict, so the detector pokes
//! the shell with an empty line and picks the most prompt-like line out of
//! what comes back.

use std::sync::LazyLock;
use std::time::Duration;

use log::{debug, trace};
use regex::Regex;
use tokio::time::Instant;

use super::pty::PtyChannel;
use crate::error::{ChannelError, Result, SessionError};
use crate::transport::Transport;

/// A line ending in `]$` or `]#`.
static BRACKET_TERMINATED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\][#$]\s*$").expect("prompt signal regex is valid"));

/// Pick the prompt candidate from one chunk of shell output.
///
/// The last line ending in `]$` / `]#` wins. Without one, the last non-empty
/// line is taken instead. Returns `None` if the chunk holds only whitespace.
pub fn pick_prompt_line(chunk: &str) -> Option<&str> {
    let lines: Vec<&str> = chunk.trim().lines().collect();

    lines
        .iter()
        .rev()
        .find(|line| BRACKET_TERMINATED.is_match(line))
        .or_else(|| lines.iter().rev().find(|line| !line.trim().is_empty()))
        .map(|line| line.trim())
}

/// Capture one literal prompt line from the shell.
///
/// Sends a bare newline, then reads until a chunk yields a candidate line.
/// Each read waits at most the channel's idle timeout, and the whole search is
/// bounded by `budget`.
pub async fn detect_prompt<T: Transport>(
    channel: &mut PtyChannel<T>,
    budget: Duration,
) -> Result<String> {
    channel
        .write_line("")
        .await
        .map_err(|source| SessionError::ReadFailed {
            command: None,
            source,
        })?;

    let start = Instant::now();
    loop {
        let remaining = budget.saturating_sub(start.elapsed());
        if remaining.is_zero() {
            return Err(SessionError::PromptTimeout(budget).into());
        }

        let idle = channel.idle_timeout().min(remaining);
        match channel.read_available(idle).await {
            Ok(data) => {
                let text = String::from_utf8_lossy(&data);
                if let Some(line) = pick_prompt_line(&text) {
                    debug!("detected prompt {:?} after {:?}", line, start.elapsed());
                    return Ok(line.to_string());
                }
                trace!("no prompt candidate in {} bytes", data.len());
            }
            Err(ChannelError::IdleTimeout(_)) => {}
            Err(source) => {
                return Err(SessionError::ReadFailed {
                    command: None,
                    source,
                }
                .into());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::PtyConfig;
    use crate::error::{Error, ErrorKind};
    use crate::transport::ScriptedTransport;

    const BUDGET: Duration = Duration::from_secs(10);

    fn channel(transport: ScriptedTransport) -> PtyChannel<ScriptedTransport> {
        PtyChannel::new(transport, PtyConfig::default())
    }

    #[test]
    fn test_pick_strong_signal() {
        let chunk = "Last login: Mon Oct 19 03:09:11 2026 from 10.0.0.1\r\n\
                     [deploy@web1 ~]$ \r\n\
                     [deploy@web1 ~]$ ";
        assert_eq!(pick_prompt_line(chunk), Some("[deploy@web1 ~]$"));
    }

    #[test]
    fn test_strong_signal_beats_later_lines() {
        let chunk = "[root@db /]#\r\nsome trailing noise\r\n";
        assert_eq!(pick_prompt_line(chunk), Some("[root@db /]#"));
    }

    #[test]
    fn test_pick_weak_signal() {
        let chunk = "Welcome to Ubuntu\r\n\r\ndeploy@web1:~$ ";
        assert_eq!(pick_prompt_line(chunk), Some("deploy@web1:~$"));
    }

    #[test]
    fn test_pick_nothing_from_blank_chunk() {
        assert_eq!(pick_prompt_line("\r\n  \r\n"), None);
        assert_eq!(pick_prompt_line(""), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_detect_prompt_after_banner() {
        let transport = ScriptedTransport::new()
            .greeting("Last login: Mon Oct 19\r\n")
            .reply(["[deploy@web1 ~]$ "]);
        let handle = transport.handle();
        let mut channel = channel(transport);

        let prompt = detect_prompt(&mut channel, BUDGET).await.unwrap();
        assert_eq!(prompt, "[deploy@web1 ~]$");
        assert_eq!(handle.writes(), vec!["\n"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_detect_skips_blank_chunks() {
        let transport = ScriptedTransport::new().reply(["\r\n", "\r\n"]);
        let mut channel = channel(transport);

        // Blank chunk first, then nothing: the budget runs out.
        let err = detect_prompt(&mut channel, BUDGET).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }

    #[tokio::test(start_paused = true)]
    async fn test_detect_times_out_on_silent_shell() {
        let transport = ScriptedTransport::new().silence();
        let mut channel = channel(transport);

        let start = Instant::now();
        let err = detect_prompt(&mut channel, BUDGET).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Session(SessionError::PromptTimeout(d)) if d == BUDGET
        ));
        assert!(start.elapsed() >= BUDGET);
    }

    #[tokio::test(start_paused = true)]
    async fn test_detect_read_failure() {
        let transport = ScriptedTransport::new().hangup();
        let mut channel = channel(transport);

        let err = detect_prompt(&mut channel, BUDGET).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Session(SessionError::ReadFailed {
                command: None,
                source: ChannelError::Closed
            })
        ));
    }
}
