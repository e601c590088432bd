//! Command runner: write a command, read to the next prompt, split the reply
//! into lines.

use log::debug;
use tokio::time::Instant;

use crate::channel::{PromptPattern, PtyChannel};
use crate::error::{BoxError, Result, SessionError};
use crate::transport::Transport;

/// Turn one command's raw reply into its output lines.
///
/// The reply is trimmed and split on line boundaries. A final line that is
/// the next prompt is dropped, as is a first line that merely echoes the
/// command. The rest are trimmed and empty ones skipped.
pub fn process_output<'a>(raw: &'a str, command: &str, prompt: &PromptPattern) -> Vec<&'a str> {
    let mut lines: Vec<&str> = raw.trim().lines().collect();

    if lines.last().is_some_and(|last| prompt.is_prompt_line(last)) {
        lines.pop();
    }

    let command = command.trim();
    if !command.is_empty() && lines.first().is_some_and(|first| first.trim() == command) {
        lines.remove(0);
    }

    lines
        .into_iter()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect()
}

/// Send one command and collect its output lines.
pub(crate) async fn execute<T: Transport>(
    channel: &mut PtyChannel<T>,
    prompt: &PromptPattern,
    command: &str,
) -> Result<Vec<String>> {
    let start = Instant::now();

    channel
        .write_line(command)
        .await
        .map_err(|source| SessionError::WriteFailed {
            command: command.to_string(),
            source,
        })?;

    let data = channel
        .read_until(prompt)
        .await
        .map_err(|source| SessionError::ReadFailed {
            command: Some(command.to_string()),
            source,
        })?;

    let raw = String::from_utf8_lossy(&data);
    let lines: Vec<String> = process_output(&raw, command, prompt)
        .into_iter()
        .map(str::to_string)
        .collect();

    debug!(
        "command {:?} produced {} lines in {:?}",
        command,
        lines.len(),
        start.elapsed()
    );
    Ok(lines)
}

/// Run `commands` in order, handing every output line to `on_line` before the
/// next command is sent.
pub(crate) async fn run_commands<T, I, S, F, E>(
    channel: &mut PtyChannel<T>,
    prompt: &PromptPattern,
    commands: I,
    on_line: &mut F,
) -> Result<()>
where
    T: Transport,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
    F: FnMut(&str) -> std::result::Result<(), E>,
    E: Into<BoxError>,
{
    for command in commands {
        let command = command.as_ref();
        for line in execute(channel, prompt, command).await? {
            on_line(&line).map_err(|e| SessionError::Callback {
                command: command.to_string(),
                source: e.into(),
            })?;
        }
    }
    Ok(())
}
