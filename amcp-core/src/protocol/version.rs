//! Server version as reported by the `VERSION` command.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::AmcpError;

static VERSION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\.(\d+)\.(\d+)\.(\d+)\s+(.*)$").expect("version pattern is valid")
});

/// `<generation>.<major>.<minor>.<revision> <tag>`, e.g. `2.0.7.12345 Stable`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    pub generation: u32,
    pub major: u32,
    pub minor: u32,
    pub revision: u32,
    pub tag: String,
}

impl FromStr for Version {
    type Err = AmcpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || AmcpError::MalformedResponse(format!("malformed version reply: {s:?}"));

        let caps = VERSION_PATTERN.captures(s).ok_or_else(malformed)?;
        let number = |i: usize| caps[i].parse::<u32>().map_err(|_| malformed());

        Ok(Self {
            generation: number(1)?,
            major: number(2)?,
            minor: number(3)?,
            revision: number(4)?,
            tag: caps[5].to_string(),
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{} {}",
            self.generation, self.major, self.minor, self.revision, self.tag
        )
    }
}
