use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, FixedOffset, Offset, Utc};

use crate::error::Result;
use crate::hash::ObjectId;
use crate::refs;
use crate::repo::Repository;
use crate::store;
use crate::types::Commit;

/// a commit with its id, for history output
#[derive(Clone, Debug)]
pub struct LogEntry {
    pub id: ObjectId,
    pub commit: Commit,
}

/// commit history reachable from HEAD, newest first
///
/// an unborn HEAD has no history and yields an empty list.
pub fn log(repo: &Repository, max_count: Option<usize>) -> Result<Vec<LogEntry>> {
    match refs::read_head(repo)?.id() {
        Some(id) => log_from(repo, &id, max_count),
        None => Ok(Vec::new()),
    }
}

/// commit history reachable from a starting commit
pub fn log_from(
    repo: &Repository,
    start: &ObjectId,
    max_count: Option<usize>,
) -> Result<Vec<LogEntry>> {
    let mut entries = Vec::new();
    let mut to_visit = vec![*start];
    let mut visited = HashSet::new();

    while let Some(id) = to_visit.pop() {
        if !visited.insert(id) {
            continue;
        }

        let commit = store::read_commit(repo, &id)?;

        // visit first parents first for a linear-looking history
        for parent in commit.parents.iter().rev() {
            to_visit.push(*parent);
        }

        entries.push(LogEntry { id, commit });
    }

    // newest first by committer timestamp
    entries.sort_by(|a, b| b.commit.committer.time.cmp(&a.commit.committer.time));

    if let Some(max) = max_count {
        entries.truncate(max);
    }

    Ok(entries)
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "commit {}", self.id)?;
        writeln!(
            f,
            "Author: {} <{}>",
            self.commit.author.name, self.commit.author.email
        )?;
        writeln!(f, "Date:   {}", format_date(&self.commit.author))?;
        writeln!(f)?;
        for line in self.commit.message.lines() {
            writeln!(f, "    {}", line)?;
        }
        Ok(())
    }
}

/// git's default date rendering, in the signature's own offset
fn format_date(sig: &crate::types::Signature) -> String {
    let offset = FixedOffset::east_opt(sig.offset_minutes * 60)
        .unwrap_or_else(|| Utc.fix());
    match DateTime::from_timestamp(sig.time, 0) {
        Some(utc) => utc
            .with_timezone(&offset)
            .format("%a %b %-d %H:%M:%S %Y %z")
            .to_string(),
        None => sig.time.to_string(),
    }
}
