//! Text layout of the deployment ledger comment.
//!
//! A ledger body is a marker header, an optional revision tag, and one
//! `<Provider>: <value>` line per provider. Lines are addressed by provider
//! label, never by position, and every line an update does not target is
//! kept byte-for-byte, terminator included.

use std::fmt;

use crate::error::MalformedReason;
use crate::models::Provider;

/// First line of every ledger comment.
pub const LEDGER_MARKER: &str = "### App PR Deployer";

/// Value of a provider that has not reported yet.
pub const NOT_INITIALIZED: &str = "Not initialized";

pub const REVISION: u32 = 3;

/// Parsed ledger text, kept as its original line segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerBody {
    /// Each segment includes its own `\n` or `\r\n`, except possibly the last.
    lines: Vec<String>,
}

impl LedgerBody {
    /// Canonical body for a pull request with no ledger yet.
    pub fn template() -> Self {
        Self::render(|_| NOT_INITIALIZED)
    }

    /// Canonical body with one provider already set.
    pub fn initial(provider: Provider, value: &str) -> Self {
        Self::render(|p| if p == provider { value } else { NOT_INITIALIZED })
    }

    fn render<'a>(value_of: impl Fn(Provider) -> &'a str) -> Self {
        let mut text = format!("{}\nComment revision: {}\n\n", LEDGER_MARKER, REVISION);
        for provider in Provider::ALL {
            text.push_str(&format!("{}: {}\n", provider.label(), value_of(provider)));
        }
        Self::split(&text)
    }

    /// Check whether a comment body is a ledger at all.
    pub fn is_ledger(text: &str) -> bool {
        text.starts_with(LEDGER_MARKER)
    }

    /// Parse an existing comment body.
    ///
    /// Only the marker is checked here; provider lines are validated when
    /// they are read or rewritten.
    pub fn parse(text: &str) -> Result<Self, MalformedReason> {
        if !Self::is_ledger(text) {
            return Err(MalformedReason::MissingMarker);
        }
        Ok(Self::split(text))
    }

    fn split(text: &str) -> Self {
        Self {
            lines: text.split_inclusive('\n').map(str::to_string).collect(),
        }
    }

    /// Current value on the provider's line, `None` while not initialized.
    pub fn value(&self, provider: Provider) -> Result<Option<&str>, MalformedReason> {
        let index = self.provider_line(provider)?;
        let (content, _) = split_terminator(&self.lines[index]);
        let value = label_value(content, provider)
            .unwrap_or_default()
            .trim();

        if value == NOT_INITIALIZED {
            Ok(None)
        } else {
            Ok(Some(value))
        }
    }

    /// Rewrite the value portion of one provider line.
    ///
    /// The provider line must be present exactly once. Nothing is added when
    /// it is missing.
    pub fn set_value(&mut self, provider: Provider, value: &str) -> Result<(), MalformedReason> {
        let index = self.provider_line(provider)?;
        let (_, terminator) = split_terminator(&self.lines[index]);
        let rewritten = format!("{}: {}{}", provider.label(), value, terminator);
        self.lines[index] = rewritten;
        Ok(())
    }

    /// Values of all providers, in ledger order.
    pub fn snapshot(&self) -> Result<LedgerSnapshot, MalformedReason> {
        let mut entries = Vec::with_capacity(Provider::ALL.len());
        for provider in Provider::ALL {
            entries.push((provider, self.value(provider)?.map(str::to_string)));
        }
        Ok(LedgerSnapshot { entries })
    }

    fn provider_line(&self, provider: Provider) -> Result<usize, MalformedReason> {
        let mut matches = self
            .lines
            .iter()
            .enumerate()
            .filter(|(_, line)| label_value(split_terminator(line).0, provider).is_some())
            .map(|(index, _)| index);

        let first = matches
            .next()
            .ok_or(MalformedReason::MissingProvider(provider))?;
        if matches.next().is_some() {
            return Err(MalformedReason::DuplicateProvider(provider));
        }
        Ok(first)
    }
}

impl fmt::Display for LedgerBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            f.write_str(line)?;
        }
        Ok(())
    }
}

/// Per-provider values read from a ledger; `None` means not initialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub entries: Vec<(Provider, Option<String>)>,
}

impl LedgerSnapshot {
    pub fn get(&self, provider: Provider) -> Option<&str> {
        self.entries
            .iter()
            .find(|(p, _)| *p == provider)
            .and_then(|(_, value)| value.as_deref())
    }
}

/// Text after `<label>:` when the line belongs to the provider.
///
/// Leading whitespace before the label is tolerated, and so is column
/// padding after the colon (`AWS:   Not initialized`).
fn label_value(content: &str, provider: Provider) -> Option<&str> {
    content
        .trim_start()
        .strip_prefix(provider.label())?
        .strip_prefix(':')
}

fn split_terminator(line: &str) -> (&str, &str) {
    if let Some(content) = line.strip_suffix("\r\n") {
        (content, "\r\n")
    } else if let Some(content) = line.strip_suffix('\n') {
        (content, "\n")
    } else {
        (line, "")
    }
}
