//! Page rows read from the assessment store and the per-target records built from them.

use crate::json::parse_json_with_context;
use crate::title::normalize_title;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

/// Stand-in for an empty assessment class or importance.
pub const UNKNOWN_ASSESSMENT: &str = "Unknown";

/// One row from the assessment store.
///
/// A target with several redirects appears once per redirect; a target with
/// none appears once with `redirect_title` unset. Field aliases accept the
/// replica column names so raw query dumps load unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PageRow {
    #[serde(alias = "page_title")]
    pub title: String,
    #[serde(default, alias = "redir_title")]
    pub redirect_title: Option<String>,
    #[serde(default, alias = "pa_class")]
    pub assessment_class: Option<String>,
    #[serde(default, alias = "pa_importance")]
    pub assessment_importance: Option<String>,
}

impl PageRow {
    pub fn new(title: impl Into<String>, redirect_title: Option<&str>) -> Self {
        Self {
            title: title.into(),
            redirect_title: redirect_title.map(str::to_owned),
            assessment_class: None,
            assessment_importance: None,
        }
    }

    pub fn with_assessment(mut self, class: &str, importance: &str) -> Self {
        self.assessment_class = Some(class.to_owned());
        self.assessment_importance = Some(importance.to_owned());
        self
    }

    /// Display-form titles, with an empty redirect treated as no redirect.
    fn normalized(self) -> Self {
        Self {
            title: normalize_title(&self.title),
            redirect_title: self
                .redirect_title
                .filter(|r| !r.is_empty())
                .map(|r| normalize_title(&r)),
            ..self
        }
    }
}

/// Accumulated views for one target page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetRecord {
    pub title: String,
    pub pageviews: u64,
    pub assessment_class: String,
    pub assessment_importance: String,
}

impl TargetRecord {
    /// A zero-view record for the row's target.
    pub fn from_row(row: &PageRow) -> Self {
        Self {
            title: row.title.clone(),
            pageviews: 0,
            assessment_class: assessment_or_unknown(row.assessment_class.as_deref()),
            assessment_importance: assessment_or_unknown(row.assessment_importance.as_deref()),
        }
    }
}

fn assessment_or_unknown(value: Option<&str>) -> String {
    match value {
        Some(v) if !v.is_empty() => v.to_owned(),
        _ => UNKNOWN_ASSESSMENT.to_owned(),
    }
}

/// Forward-only reader over a JSON-lines row dump.
///
/// Yields rows until the input ends or a line fails to read or parse. The
/// failure is held back and returned by [`JsonLinesRows::finish`], so callers
/// can hand `&mut reader` to anything expecting an `Iterator<Item = PageRow>`.
pub struct JsonLinesRows<R> {
    lines: Lines<R>,
    line: usize,
    error: Option<anyhow::Error>,
}

impl JsonLinesRows<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open row file {}", path.display()))?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> JsonLinesRows<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line: 0,
            error: None,
        }
    }

    /// Surface the error that stopped iteration, if any.
    pub fn finish(self) -> Result<()> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn parse_line(&self, text: &str) -> Result<PageRow> {
        let row: PageRow = parse_json_with_context(text)
            .with_context(|| format!("malformed row on line {}", self.line))?;
        if row.title.is_empty() {
            anyhow::bail!("row on line {} has no target title", self.line);
        }
        Ok(row.normalized())
    }
}

impl<R: BufRead> Iterator for JsonLinesRows<R> {
    type Item = PageRow;

    fn next(&mut self) -> Option<PageRow> {
        if self.error.is_some() {
            return None;
        }

        loop {
            let text = match self.lines.next()? {
                Ok(text) => text,
                Err(e) => {
                    self.error = Some(
                        anyhow::Error::new(e)
                            .context(format!("failed to read line {}", self.line + 1)),
                    );
                    return None;
                }
            };
            self.line += 1;

            let trimmed = text.trim();
            if trimmed.is_empty() {
                continue;
            }

            match self.parse_line(trimmed) {
                Ok(row) => return Some(row),
                Err(e) => {
                    self.error = Some(e);
                    return None;
                }
            }
        }
    }
}

/// Count non-blank lines without holding the file in memory.
pub fn count_rows(path: &Path) -> Result<usize> {
    let file = File::open(path)
        .with_context(|| format!("failed to open row file {}", path.display()))?;
    let mut count = 0;
    for line in BufReader::new(file).lines() {
        if !line?.trim().is_empty() {
            count += 1;
        }
    }
    Ok(count)
}
