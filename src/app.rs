use crate::cli::Args;
use crate::config::Config;
use crate::dates::DateRange;
use crate::project::{ProjectConfig, load_project};
use crate::report::{PopularPages, Report};
use crate::rows::{JsonLinesRows, count_rows};
use crate::utils::{fmt_duration, log_if_slow};
use anyhow::Context;
use chrono::Utc;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::info;

/// What gets written out: the report plus enough project context to publish it.
#[derive(Debug, Serialize)]
pub struct ReportDocument<'a> {
    pub project: &'a str,
    pub name: &'a str,
    pub report_page: &'a str,
    pub limit: i64,
    #[serde(flatten)]
    pub report: &'a Report,
}

/// One report run for one project.
pub struct App {
    config: Config,
    args: Args,
}

impl App {
    pub fn new(config: Config, args: Args) -> Self {
        Self { config, args }
    }

    /// Explicit `--start`/`--end`, or the previous calendar month.
    pub fn date_range(&self) -> anyhow::Result<DateRange> {
        match (self.args.start, self.args.end) {
            (Some(start), Some(end)) => Ok(DateRange::new(start, end)?),
            _ => Ok(DateRange::previous_month(Utc::now().date_naive())),
        }
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        let started = Instant::now();
        let project = load_project(&self.args.project_config, &self.args.project)?;
        let range = self.date_range()?;
        info!(
            project = %project.key,
            name = %project.name,
            limit = project.limit,
            start = %range.start(),
            end = %range.end(),
            "Building popular pages report"
        );

        let count_started = Instant::now();
        let total_rows = count_rows(&self.args.rows)?;
        log_if_slow(count_started, Duration::from_secs(5), "counting page rows");
        if total_rows == 0 {
            info!(project = %project.key, "No pages found");
            return Ok(());
        }

        let client = self.config.pageview_client(&self.args.wiki)?;
        let engine = PopularPages::new(client, self.config.engine_options());

        let mut rows = JsonLinesRows::open(&self.args.rows)?;
        let outcome = engine
            .run(&mut rows, Some(total_rows), &range, project.limit)
            .await;
        rows.finish().context("Failed to read page rows")?;
        let report = outcome.with_context(|| format!("Report run failed for {}", project.key))?;

        self.write_report(&project, &report)?;
        info!(
            project = %project.key,
            pages = report.pages.len(),
            targets = report.targets,
            total_views = report.total_pageviews,
            duration = fmt_duration(started.elapsed()),
            "Report complete"
        );
        Ok(())
    }

    fn write_report(&self, project: &ProjectConfig, report: &Report) -> anyhow::Result<()> {
        let document = ReportDocument {
            project: &project.key,
            name: &project.name,
            report_page: &project.report,
            limit: project.limit,
            report,
        };
        let json =
            serde_json::to_string_pretty(&document).context("Failed to serialize report")?;

        match &self.args.output {
            Some(path) => std::fs::write(path, json)
                .with_context(|| format!("Failed to write report to {}", path.display()))?,
            None => println!("{json}"),
        }
        Ok(())
    }
}
