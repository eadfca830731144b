//! End-to-end report runs against an in-memory pageviews service.

mod helpers;

use helpers::{FakeWiki, client, date, engine, january, rows};
use http::StatusCode;
use popular_pages::batch::{Batch, BatchBuilder};
use popular_pages::dates::DateRange;
use popular_pages::error::ReportError;
use popular_pages::pageviews::{RetryPolicy, RetryTransport};
use popular_pages::report::{EngineOptions, PopularPages};
use popular_pages::rows::{JsonLinesRows, PageRow};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

fn titles(report: &popular_pages::report::Report) -> Vec<&str> {
    report.pages.iter().map(|p| p.title.as_str()).collect()
}

#[tokio::test]
async fn test_redirect_views_are_summed_into_target() {
    let wiki = Arc::new(FakeWiki::new().page("A", &[100]).page("B", &[50]));
    let report = engine(&wiki, 60)
        .run(rows(&[("A", Some("B"))]).into_iter(), Some(1), &january(), 10)
        .await
        .unwrap();

    assert_eq!(titles(&report), vec!["A"]);
    assert_eq!(report.pages[0].pageviews, 150);
    assert_eq!(report.total_pageviews, 150);
}

#[tokio::test]
async fn test_missing_page_contributes_zero_without_aborting() {
    let wiki = Arc::new(FakeWiki::new().page("D", &[40]));
    let report = engine(&wiki, 60)
        .run(
            rows(&[("C", None), ("D", None)]).into_iter(),
            Some(2),
            &january(),
            10,
        )
        .await
        .unwrap();

    assert_eq!(titles(&report), vec!["D", "C"]);
    assert_eq!(report.pages[1].pageviews, 0);
    assert_eq!(report.total_pageviews, 40);
}

#[tokio::test]
async fn test_single_failing_target_reports_zero() {
    let wiki = Arc::new(FakeWiki::new().script("Lonely", &[StatusCode::INTERNAL_SERVER_ERROR]));
    let report = engine(&wiki, 60)
        .run(rows(&[("Lonely", None)]).into_iter(), Some(1), &january(), 5)
        .await
        .unwrap();

    assert_eq!(report.targets, 1);
    assert_eq!(report.pages[0].pageviews, 0);
    assert_eq!(report.total_pageviews, 0);
}

#[tokio::test]
async fn test_grand_total_equals_sum_of_all_targets() {
    let mut wiki = FakeWiki::new();
    let mut input = Vec::new();
    for i in 0..40u64 {
        wiki = wiki
            .page(&format!("Target {i}"), &[i * 10, 1])
            .page(&format!("Alias {i}"), &[i]);
        input.push(PageRow::new(format!("Target {i}"), Some(&format!("Alias {i}"))));
    }
    let wiki = Arc::new(wiki);

    let aggregation = engine(&wiki, 7)
        .aggregate_all(input.into_iter(), None, &january())
        .await
        .unwrap();
    let summed: u64 = aggregation.records.values().map(|r| r.pageviews).sum();
    let expected: u64 = (0..40u64).map(|i| i * 11 + 1).sum();
    assert_eq!(summed, expected);
    assert_eq!(aggregation.run_total.get(), expected);
}

#[tokio::test]
async fn test_total_includes_pages_cut_by_limit() {
    let wiki = Arc::new(FakeWiki::new().page("A", &[5]).page("B", &[7]).page("C", &[9]));
    let report = engine(&wiki, 60)
        .run(
            rows(&[("A", None), ("B", None), ("C", None)]).into_iter(),
            Some(3),
            &january(),
            2,
        )
        .await
        .unwrap();

    assert_eq!(titles(&report), vec!["C", "B"]);
    assert_eq!(report.total_pageviews, 21);
}

#[tokio::test]
async fn test_zero_limit_is_rejected_before_any_request() {
    let wiki = Arc::new(FakeWiki::new().page("A", &[5]));
    let err = engine(&wiki, 60)
        .run(rows(&[("A", None)]).into_iter(), Some(1), &january(), 0)
        .await
        .unwrap_err();

    assert_eq!(err, ReportError::InvalidLimit(0));
    assert!(wiki.requests().is_empty());
}

#[tokio::test]
async fn test_ties_are_deterministic() {
    let wiki = Arc::new(FakeWiki::new().page("Early", &[300]).page("Late", &[300]));
    let input = rows(&[("Early", None), ("Late", None)]);

    for _ in 0..3 {
        let report = engine(&wiki, 60)
            .run(input.clone().into_iter(), Some(2), &january(), 1)
            .await
            .unwrap();
        assert_eq!(titles(&report), vec!["Early"]);
    }
}

#[test]
fn test_130_titles_make_three_batches() {
    let input: Vec<PageRow> = (0..130).map(|i| PageRow::new(format!("Page {i}"), None)).collect();
    let sizes: Vec<usize> = BatchBuilder::new(input.into_iter(), 60, Some(130))
        .map(|batch: Batch| batch.len())
        .collect();
    assert_eq!(sizes, vec![60, 60, 10]);
}

#[tokio::test]
async fn test_every_title_is_queried_once_across_batches() {
    let input: Vec<PageRow> = (0..130).map(|i| PageRow::new(format!("Page {i}"), None)).collect();
    let wiki = Arc::new(FakeWiki::new());
    engine(&wiki, 60)
        .run(input.into_iter(), Some(130), &january(), 500)
        .await
        .unwrap();

    let requests = wiki.requests();
    assert_eq!(requests.len(), 130);
    assert_eq!(wiki.request_count("Page 0"), 1);
    assert_eq!(wiki.request_count("Page 129"), 1);
}

#[tokio::test]
async fn test_target_spilling_across_batches_is_not_double_counted() {
    // Threshold 2: "Hub" lands in the first batch, its later redirects spill over
    let wiki = Arc::new(
        FakeWiki::new()
            .page("Hub", &[100])
            .page("R1", &[10])
            .page("R2", &[20])
            .page("R3", &[30])
            .page("Other", &[1]),
    );
    let input = rows(&[
        ("Hub", Some("R1")),
        ("Hub", Some("R2")),
        ("Other", None),
        ("Hub", Some("R3")),
    ]);

    let report = engine(&wiki, 2)
        .run(input.into_iter(), Some(4), &january(), 10)
        .await
        .unwrap();

    assert_eq!(titles(&report), vec!["Hub", "Other"]);
    assert_eq!(report.pages[0].pageviews, 160);
    assert_eq!(report.total_pageviews, 161);
    assert_eq!(wiki.request_count("Hub"), 1);
    assert_eq!(wiki.requests().len(), 5);
}

#[tokio::test]
async fn test_redirect_reporting_target_article_counts_once() {
    // Both responses name "Target"; the redirect's is treated as a duplicate
    let wiki = Arc::new(
        FakeWiki::new()
            .page("Target", &[10])
            .page("Old name", &[4])
            .canonical("Old name", "Target"),
    );
    let report = engine(&wiki, 60)
        .run(rows(&[("Target", Some("Old name"))]).into_iter(), Some(1), &january(), 10)
        .await
        .unwrap();

    assert_eq!(report.pages[0].pageviews, 10);
    assert_eq!(report.total_pageviews, 10);
}

#[tokio::test]
async fn test_throttled_title_recovers_through_retries() {
    let wiki = Arc::new(
        FakeWiki::new()
            .page("Busy", &[70])
            .script(
                "Busy",
                &[StatusCode::TOO_MANY_REQUESTS, StatusCode::SERVICE_UNAVAILABLE],
            )
            .page("Calm", &[5]),
    );
    let policy = RetryPolicy {
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        max_retries: 3,
    };
    let pages = PopularPages::new(
        client(RetryTransport::new(Arc::clone(&wiki), policy)),
        EngineOptions::default(),
    );

    let report = pages
        .run(rows(&[("Calm", Some("Busy"))]).into_iter(), Some(1), &january(), 10)
        .await
        .unwrap();

    assert_eq!(report.pages[0].pageviews, 75);
    assert_eq!(wiki.request_count("Busy"), 3);
}

#[tokio::test]
async fn test_exhausted_retries_contribute_zero() {
    let wiki = Arc::new(
        FakeWiki::new()
            .page("Stuck", &[70])
            .script("Stuck", &[StatusCode::TOO_MANY_REQUESTS; 4])
            .page("Fine", &[3]),
    );
    let policy = RetryPolicy {
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(2),
        max_retries: 2,
    };
    let pages = PopularPages::new(
        client(RetryTransport::new(Arc::clone(&wiki), policy)),
        EngineOptions::default(),
    );

    let report = pages
        .run(
            rows(&[("Stuck", None), ("Fine", None)]).into_iter(),
            Some(2),
            &january(),
            10,
        )
        .await
        .unwrap();

    assert_eq!(titles(&report), vec!["Fine", "Stuck"]);
    assert_eq!(report.pages[1].pageviews, 0);
    assert_eq!(wiki.request_count("Stuck"), 3);
}

#[tokio::test]
async fn test_rows_from_json_lines() {
    let dump = r#"{"page_title": "Heart", "redir_title": "Cardiac_muscle_pump", "pa_class": "FA", "pa_importance": "Top"}

{"page_title": "Liver", "redir_title": null, "pa_class": "", "pa_importance": ""}
"#;
    let wiki = Arc::new(
        FakeWiki::new()
            .page("Heart", &[620])
            .page("Cardiac muscle pump", &[31])
            .page("Liver", &[93]),
    );
    let mut reader = JsonLinesRows::new(Cursor::new(dump.as_bytes()));
    let range = DateRange::new(date(2024, 2, 1), date(2024, 2, 29)).unwrap();

    let report = engine(&wiki, 60)
        .run(&mut reader, Some(2), &range, 10)
        .await
        .unwrap();
    reader.finish().unwrap();

    assert_eq!(titles(&report), vec!["Heart", "Liver"]);
    assert_eq!(report.pages[0].pageviews, 651);
    assert_eq!(report.pages[0].average_per_day, 22);
    assert_eq!(report.pages[0].assessment_class, "FA");
    assert_eq!(report.pages[1].assessment_class, "Unknown");
    assert_eq!(report.days, 29);
}

#[tokio::test]
async fn test_unreadable_row_surfaces_after_run() {
    let dump = "{\"page_title\": \"Heart\"}\nnot json\n{\"page_title\": \"Liver\"}\n";
    let wiki = Arc::new(FakeWiki::new().page("Heart", &[1]).page("Liver", &[2]));
    let mut reader = JsonLinesRows::new(Cursor::new(dump.as_bytes()));

    engine(&wiki, 60)
        .run(&mut reader, None, &january(), 10)
        .await
        .unwrap();

    assert!(reader.finish().is_err());
    assert_eq!(wiki.request_count("Liver"), 0);
}
