//! Prompt matchers and the compiler that generalizes a captured prompt.

use std::fmt;
use std::sync::LazyLock;

use regex::bytes::Regex;

use crate::error::ChannelError;

/// Trait for prompt matching - regex by default, extensible for custom parsers.
pub trait PromptMatcher: Send + Sync {
    /// Returns byte offset where match ends, or None if no match.
    fn find_match(&self, data: &[u8]) -> Option<usize>;

    /// Check if the data matches the pattern.
    fn is_match(&self, data: &[u8]) -> bool {
        self.find_match(data).is_some()
    }
}

/// Regex-based prompt matcher (the default implementation).
impl PromptMatcher for Regex {
    fn find_match(&self, data: &[u8]) -> Option<usize> {
        self.find(data).map(|m| m.end())
    }
}

/// `[identity path]$` with optional trailing whitespace. The identity is the
/// text up to the first space.
static BRACKETED_PROMPT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[(.+?) (.+?)\]([#$])\s*$").expect("bracketed prompt regex is valid")
});

/// Shell privilege marker that ends a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminator {
    /// `$`
    Unprivileged,
    /// `#`
    Privileged,
}

impl Terminator {
    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'$' => Some(Self::Unprivileged),
            b'#' => Some(Self::Privileged),
            _ => None,
        }
    }

    /// The character the shell prints.
    pub fn as_char(self) -> char {
        match self {
            Self::Unprivileged => '$',
            Self::Privileged => '#',
        }
    }
}

impl fmt::Display for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

#[derive(Debug, Clone)]
enum Shape {
    /// `[identity <any path>]terminator`
    Bracketed {
        identity: String,
        terminator: Terminator,
    },
    /// The captured line, verbatim.
    Literal(String),
}

/// A prompt pattern compiled from one captured prompt line.
///
/// Bracketed prompts such as `[deploy@web1 ~]$` keep the identity and the
/// terminator literal but accept any path, so the pattern keeps matching after
/// a `cd`. Anything else is matched verbatim.
///
/// Patterns are anchored to a whole line. Against a multi-line buffer they
/// match a prompt that forms the final line.
#[derive(Debug, Clone)]
pub struct PromptPattern {
    regex: Regex,
    shape: Shape,
}

impl PromptPattern {
    /// Compile a captured prompt line.
    pub fn compile(line: &str) -> Result<Self, ChannelError> {
        let line = line.trim();

        if let Some((identity, terminator)) = parse_bracketed(line) {
            let pattern = format!(
                r"(?m)^\[{} [^\]\n]+\]{}[ \t\r]*\z",
                regex::escape(&identity),
                regex::escape(&terminator.to_string()),
            );

            return Ok(Self {
                regex: Regex::new(&pattern)?,
                shape: Shape::Bracketed {
                    identity,
                    terminator,
                },
            });
        }

        let pattern = format!(r"(?m)^{}[ \t\r]*\z", regex::escape(line));
        Ok(Self {
            regex: Regex::new(&pattern)?,
            shape: Shape::Literal(line.to_string()),
        })
    }

    /// Check whether a single output line is a prompt.
    pub fn is_prompt_line(&self, line: &str) -> bool {
        self.regex.is_match(line.as_bytes())
    }

    /// The identity token (`user@host`) of a bracketed prompt.
    pub fn identity(&self) -> Option<&str> {
        match &self.shape {
            Shape::Bracketed { identity, .. } => Some(identity),
            Shape::Literal(_) => None,
        }
    }

    /// The terminator of a bracketed prompt.
    pub fn terminator(&self) -> Option<Terminator> {
        match &self.shape {
            Shape::Bracketed { terminator, .. } => Some(*terminator),
            Shape::Literal(_) => None,
        }
    }

    /// Whether the path segment was generalized.
    pub fn is_generalized(&self) -> bool {
        matches!(self.shape, Shape::Bracketed { .. })
    }

    /// The compiled regular expression.
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

fn parse_bracketed(line: &str) -> Option<(String, Terminator)> {
    let caps = BRACKETED_PROMPT.captures(line.as_bytes())?;
    let terminator = Terminator::from_byte(*caps[3].first()?)?;
    Some((String::from_utf8_lossy(&caps[1]).into_owned(), terminator))
}

impl PromptMatcher for PromptPattern {
    fn find_match(&self, data: &[u8]) -> Option<usize> {
        self.regex.find_match(data)
    }
}

impl fmt::Display for PromptPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.regex.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regex_prompt_matcher() {
        let pattern = Regex::new(r"router#\s*$").unwrap();
        assert!(pattern.is_match(b"router# "));
        assert!(pattern.is_match(b"some output\nrouter#"));
        assert!(!pattern.is_match(b"router> "));
    }

    #[test]
    fn test_bracketed_prompt_generalizes_path() {
        let prompt = PromptPattern::compile("[deploy@web1 ~]$").unwrap();
        assert!(prompt.is_generalized());
        assert_eq!(prompt.identity(), Some("deploy@web1"));
        assert_eq!(prompt.terminator(), Some(Terminator::Unprivileged));

        assert!(prompt.is_prompt_line("[deploy@web1 ~]$"));
        assert!(prompt.is_prompt_line("[deploy@web1 ~]$ "));
        assert!(prompt.is_prompt_line("[deploy@web1 /var/log]$ "));
        assert!(prompt.is_prompt_line("[deploy@web1 my dir (1)]$"));
        assert!(prompt.is_prompt_line("[deploy@web1 ~]$\r"));
    }

    #[test]
    fn test_bracketed_prompt_rejects_other_identity_or_terminator() {
        let prompt = PromptPattern::compile("[deploy@web1 ~]$ ").unwrap();
        assert!(!prompt.is_prompt_line("[root@web1 ~]$"));
        assert!(!prompt.is_prompt_line("[deploy@web2 ~]$"));
        assert!(!prompt.is_prompt_line("[deploy@web1 ~]#"));
        assert!(!prompt.is_prompt_line("[deploy@web1 ~]$ ls"));
        assert!(!prompt.is_prompt_line("echo [deploy@web1 ~]$"));
    }

    #[test]
    fn test_privileged_prompt() {
        let prompt = PromptPattern::compile("[root@db-01.internal /etc]#").unwrap();
        assert_eq!(prompt.identity(), Some("root@db-01.internal"));
        assert_eq!(prompt.terminator(), Some(Terminator::Privileged));
        assert!(prompt.is_prompt_line("[root@db-01.internal /]#"));
        assert!(!prompt.is_prompt_line("[root@db-01xinternal /]#"));
        assert!(!prompt.is_prompt_line("[root@db-01.internal /]$"));
    }

    #[test]
    fn test_unusual_prompt_is_literal() {
        let prompt = PromptPattern::compile("deploy@web1:~$ ").unwrap();
        assert!(!prompt.is_generalized());
        assert_eq!(prompt.identity(), None);

        assert!(prompt.is_prompt_line("deploy@web1:~$"));
        assert!(prompt.is_prompt_line("deploy@web1:~$ "));
        assert!(!prompt.is_prompt_line("deploy@web1:/tmp$"));
        assert!(!prompt.is_prompt_line("xdeploy@web1:~$"));
    }

    #[test]
    fn test_literal_escapes_regex_syntax() {
        let prompt = PromptPattern::compile("(venv) [x] ->").unwrap();
        assert!(prompt.is_prompt_line("(venv) [x] ->"));
        assert!(!prompt.is_prompt_line("venv x ->"));
    }

    #[test]
    fn test_matches_prompt_as_last_line_of_output() {
        let prompt = PromptPattern::compile("[deploy@web1 ~]$").unwrap();
        assert!(prompt.is_match(b"pwd\r\n/var/log\r\n[deploy@web1 /var/log]$ "));
        assert!(!prompt.is_match(b"[deploy@web1 ~]$ \r\nstill going"));
    }
}
