use std::fmt;

use crate::error::{Error, Result};
use crate::hash::ObjectId;

/// author or committer identity with timestamp
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    pub email: String,
    /// seconds since the unix epoch
    pub time: i64,
    /// utc offset in minutes, rendered as `±HHMM`
    pub offset_minutes: i32,
}

impl Signature {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        time: i64,
        offset_minutes: i32,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            time,
            offset_minutes,
        }
    }

    /// identity stamped with the current local time
    pub fn now(name: impl Into<String>, email: impl Into<String>) -> Self {
        let now = chrono::Local::now();
        Self::new(
            name,
            email,
            now.timestamp(),
            now.offset().local_minus_utc() / 60,
        )
    }

    /// parse the `<name> <<email>> <epoch> <±HHMM>` form
    pub fn parse(s: &str) -> Result<Self> {
        let malformed = || Error::MalformedObject(format!("bad signature: {:?}", s));

        let lt = s.rfind('<').ok_or_else(malformed)?;
        let gt = s.rfind('>').ok_or_else(malformed)?;
        if gt < lt {
            return Err(malformed());
        }

        let name = s[..lt].trim_end().to_string();
        let email = s[lt + 1..gt].to_string();

        let mut rest = s[gt + 1..].split_whitespace();
        let time: i64 = rest
            .next()
            .and_then(|t| t.parse().ok())
            .ok_or_else(malformed)?;
        let tz = rest.next().ok_or_else(malformed)?;
        if rest.next().is_some() {
            return Err(malformed());
        }

        let offset_minutes = parse_offset(tz).ok_or_else(malformed)?;

        Ok(Self {
            name,
            email,
            time,
            offset_minutes,
        })
    }

    /// the `±HHMM` rendering of the utc offset
    pub fn offset_string(&self) -> String {
        let sign = if self.offset_minutes < 0 { '-' } else { '+' };
        let abs = self.offset_minutes.abs();
        format!("{}{:02}{:02}", sign, abs / 60, abs % 60)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} <{}> {} {}",
            self.name,
            self.email,
            self.time,
            self.offset_string()
        )
    }
}

fn parse_offset(tz: &str) -> Option<i32> {
    let (sign, digits) = match tz.as_bytes().first()? {
        b'+' => (1, &tz[1..]),
        b'-' => (-1, &tz[1..]),
        _ => return None,
    };
    if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    Some(sign * (hours * 60 + minutes))
}

/// a commit object: a root tree, its ancestry, and the message
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Commit {
    pub tree: ObjectId,
    /// parent commit ids (empty for a root commit, 2+ for a merge)
    pub parents: Vec<ObjectId>,
    pub author: Signature,
    pub committer: Signature,
    /// message bytes, carried verbatim
    pub message: String,
}

impl Commit {
    pub fn new(
        tree: ObjectId,
        parents: Vec<ObjectId>,
        author: Signature,
        committer: Signature,
        message: impl Into<String>,
    ) -> Self {
        Self {
            tree,
            parents,
            author,
            committer,
            message: message.into(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    /// serialize to the git text payload
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = String::new();
        out.push_str(&format!("tree {}\n", self.tree));
        for parent in &self.parents {
            out.push_str(&format!("parent {}\n", parent));
        }
        out.push_str(&format!("author {}\n", self.author));
        out.push_str(&format!("committer {}\n", self.committer));
        out.push('\n');
        out.push_str(&self.message);
        out.into_bytes()
    }

    /// parse a commit payload
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| Error::MalformedObject("commit payload is not UTF-8".to_string()))?;

        let (header, message) = text
            .split_once("\n\n")
            .ok_or_else(|| Error::MalformedObject("commit has no message separator".to_string()))?;

        let mut tree = None;
        let mut parents = Vec::new();
        let mut author = None;
        let mut committer = None;

        for line in header.lines() {
            if let Some(hex) = line.strip_prefix("tree ") {
                if tree.is_some() {
                    return Err(Error::MalformedObject("duplicate tree line".to_string()));
                }
                tree = Some(ObjectId::from_hex(hex)?);
            } else if let Some(hex) = line.strip_prefix("parent ") {
                parents.push(ObjectId::from_hex(hex)?);
            } else if let Some(sig) = line.strip_prefix("author ") {
                author = Some(Signature::parse(sig)?);
            } else if let Some(sig) = line.strip_prefix("committer ") {
                committer = Some(Signature::parse(sig)?);
            } else {
                return Err(Error::MalformedObject(format!(
                    "unexpected commit header line: {:?}",
                    line
                )));
            }
        }

        Ok(Self {
            tree: tree.ok_or_else(|| Error::MalformedObject("commit missing tree".to_string()))?,
            parents,
            author: author
                .ok_or_else(|| Error::MalformedObject("commit missing author".to_string()))?,
            committer: committer
                .ok_or_else(|| Error::MalformedObject("commit missing committer".to_string()))?,
            message: message.to_string(),
        })
    }
}
