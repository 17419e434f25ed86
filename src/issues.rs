//! Import issues: failed scrapes recorded for later triage

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::result::{FailureKind, ScrapeFailure};

/// One failed product URL, as written to the issue log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportIssue {
    pub url: String,
    pub domain: Option<String>,
    pub kind: FailureKind,
    pub reason: String,
    pub attempts: u32,
    pub recorded_at: DateTime<Utc>,
}

impl From<&ScrapeFailure> for ImportIssue {
    fn from(failure: &ScrapeFailure) -> Self {
        Self {
            url: failure.url.clone(),
            domain: failure.domain.clone(),
            kind: failure.kind,
            reason: failure.reason.clone(),
            attempts: failure.attempts,
            recorded_at: failure.timestamp,
        }
    }
}

/// Appends issues to a JSON-lines file
#[derive(Debug, Clone)]
pub struct IssueSink {
    path: PathBuf,
}

impl IssueSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `issues`, one JSON object per line, creating the file if needed
    pub async fn record(&self, issues: &[ImportIssue]) -> anyhow::Result<()> {
        if issues.is_empty() {
            return Ok(());
        }

        let mut buf = Vec::new();
        for issue in issues {
            serde_json::to_writer(&mut buf, issue)?;
            buf.push(b'\n');
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&buf).await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn appends_one_line_per_issue() {
        let dir = tempfile::tempdir().unwrap();
        let sink = IssueSink::new(dir.path().join("issues.jsonl"));

        let failure = ScrapeFailure::new(
            "https://www.zara.com/tr/p1.html",
            FailureKind::Exhausted,
            "Navigation timeout after 60000ms",
            3,
        );
        sink.record(&[ImportIssue::from(&failure)]).await.unwrap();
        sink.record(&[ImportIssue::from(&failure)]).await.unwrap();
        sink.record(&[]).await.unwrap();

        let contents = tokio::fs::read_to_string(sink.path()).await.unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let issue: ImportIssue = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(issue.domain.as_deref(), Some("zara.com"));
        assert_eq!(issue.kind, FailureKind::Exhausted);
        assert_eq!(issue.attempts, 3);
    }
}
