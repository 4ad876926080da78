//! Operator commands read from stdin by the monitor and producer binaries.

/// A parsed operator command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `set <bpm>` with a numeric argument. Range checking happens in
    /// [`BpmSetting::set`](crate::bpm::BpmSetting::set).
    SetBpm(i64),
    /// `set` with a missing or non-numeric argument.
    InvalidBpm(String),
    /// `status`.
    Status,
    /// `quit` or `exit`.
    Quit,
    /// Blank line.
    Empty,
    /// Anything else.
    Unknown(String),
}

impl Command {
    /// Parse one input line. Keywords are case-insensitive.
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }

        let mut parts = line.splitn(2, char::is_whitespace);
        let keyword = parts.next().unwrap_or_default().to_ascii_lowercase();
        let rest = parts.next().map(str::trim).unwrap_or_default();

        match (keyword.as_str(), rest.is_empty()) {
            ("quit" | "exit", true) => Self::Quit,
            ("status", true) => Self::Status,
            ("set", _) => rest
                .parse()
                .map_or_else(|_| Self::InvalidBpm(rest.to_owned()), Self::SetBpm),
            _ => Self::Unknown(line.to_owned()),
        }
    }
}
