mod common;

use common::{
    fast_config, listing_page, listing_url, results_page, search_url, site_page, FakePage,
    FakeWeb,
};
use harvest_core::{EngineState, HarvestConfig, RecentLogs};
use harvest_scanner::{Engine, ScanError};
use harvest_store::DedupStore;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn engine_for(web: &Arc<FakeWeb>, config: HarvestConfig) -> Engine {
    let store = DedupStore::open(&config.output_filename).unwrap();
    Engine::new(config, Arc::new(store), web.driver(), RecentLogs::default())
}

async fn run_to_end(engine: &Engine) -> harvest_scanner::RunSummary {
    let handle = engine.start().expect("engine should be idle");
    let summary = handle.await.unwrap().unwrap();
    assert_eq!(engine.state(), EngineState::Idle);
    summary
}

/// One query, two listings, two websites: one with an email, one without.
fn seed_bakery_springfield(web: &FakeWeb) {
    let listings = vec![listing_url("Golden+Crust"), listing_url("Rye+House")];
    web.html(&search_url("Bakery", "Springfield"), results_page(&listings));
    web.html(&listings[0], listing_page(Some("https://www.golden-crust.com/?utm_source=maps"), ""));
    web.html(&listings[1], listing_page(Some("https://rye-house.com/"), ""));
    web.html(
        "https://www.golden-crust.com/",
        site_page(r#"<a href="mailto:hello@golden-crust.com">hello@golden-crust.com</a> Call (217) 555-0100"#),
    );
    web.html(
        "https://rye-house.com/",
        site_page(r#"<a href="/menu">Menu</a><a href="/contact">Contact us</a>"#),
    );
    web.html("https://rye-house.com/contact", site_page("<form>Write to us</form>"));
}

#[tokio::test]
async fn test_scenario_a_single_query_one_record() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("recipients.csv");
    let web = FakeWeb::new();
    seed_bakery_springfield(&web);

    let engine = engine_for(&web, fast_config("Bakery", &["Springfield"], &output));
    let summary = run_to_end(&engine).await;

    assert_eq!(summary.queries, 1);
    assert_eq!(summary.listings, 2);
    assert_eq!(summary.websites, 2);
    assert_eq!(summary.sites.visited, 2);
    assert_eq!(summary.records, 1);

    let records = engine.store().snapshot();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].email, "hello@golden-crust.com");
    assert_eq!(records[0].company, "Golden Crust");
    assert_eq!(records[0].phone.as_deref(), Some("(217) 555-0100"));
    assert_eq!(records[0].source_url, "https://www.golden-crust.com/");
    assert_eq!(records[0].listing_url.as_deref(), Some(listing_url("Golden+Crust").as_str()));

    // The site without emails got its contact-page fallback
    assert_eq!(web.navigation_count("https://rye-house.com/contact"), 1);

    let persisted = std::fs::read_to_string(&output).unwrap();
    assert_eq!(
        persisted,
        "Company,Email,Phone,Website\n\
         Golden Crust,hello@golden-crust.com,(217) 555-0100,https://www.golden-crust.com/\n"
    );
    assert_eq!(web.open_sessions(), 0, "every session is closed");
}

#[tokio::test]
async fn test_scenario_b_same_email_on_two_sites() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("recipients.csv");
    let web = FakeWeb::new();

    let listings = vec![listing_url("Example+Co+North"), listing_url("Example+Co+South")];
    web.html(&search_url("Bakery", "Springfield"), results_page(&listings));
    web.html(&listings[0], listing_page(Some("https://north.example-co.com/"), ""));
    web.html(&listings[1], listing_page(Some("https://south.example-co.net/"), ""));
    web.html("https://north.example-co.com/", site_page("info@example-co.com"));
    web.html("https://south.example-co.net/", site_page("INFO@example-co.com"));

    let mut config = fast_config("Bakery", &["Springfield"], &output);
    config.max_concurrent_pages = 1;
    let engine = engine_for(&web, config);
    let summary = run_to_end(&engine).await;

    assert_eq!(summary.sites.visited, 2);
    assert_eq!(summary.sites.found, 1);

    let records = engine.store().snapshot();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].email, "info@example-co.com");
    assert_eq!(records[0].source_url, "https://north.example-co.com/");
}

#[tokio::test]
async fn test_scenario_c_resume_skips_visited_site() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("recipients.csv");
    std::fs::write(
        &output,
        "Company,Email,Phone,Website\n\
         Golden Crust,hello@golden-crust.com,,https://www.golden-crust.com/\n",
    )
    .unwrap();

    let web = FakeWeb::new();
    let listings = vec![listing_url("Golden+Crust"), listing_url("Bread+Barn")];
    web.html(&search_url("Bakery", "Springfield"), results_page(&listings));
    web.html(&listings[0], listing_page(Some("https://www.golden-crust.com/"), ""));
    web.html(&listings[1], listing_page(Some("https://bread-barn.com/"), ""));
    web.html("https://www.golden-crust.com/", site_page("other@golden-crust.com"));
    web.html("https://bread-barn.com/", site_page("orders@bread-barn.com"));

    let engine = engine_for(&web, fast_config("Bakery", &["Springfield"], &output));
    assert_eq!(engine.store().len(), 1);
    let summary = run_to_end(&engine).await;

    assert_eq!(summary.records, 2);
    assert_eq!(web.navigation_count("https://www.golden-crust.com/"), 0);
    assert_eq!(web.navigation_count("https://bread-barn.com/"), 1);

    let emails: Vec<String> = engine.store().snapshot().into_iter().map(|r| r.email).collect();
    assert_eq!(emails, vec!["orders@bread-barn.com", "hello@golden-crust.com"]);
}

#[tokio::test]
async fn test_scenario_d_stop_during_first_query() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("recipients.csv");
    let web = FakeWeb::new();

    let locations = ["Springfield", "Shelbyville", "Capital City"];
    for (i, location) in locations.iter().enumerate() {
        let listing = listing_url(&format!("Bakery+{i}"));
        web.html(&search_url("Bakery", location), results_page(&[listing.clone()]));
        web.html(
            &listing,
            listing_page(
                Some(&format!("https://bakery{i}.com/")),
                &format!("<p>owner{i}@bakery{i}.com</p>"),
            ),
        );
        web.html(&format!("https://bakery{i}.com/"), site_page(&format!("site{i}@bakery{i}.com")));
    }

    let engine = engine_for(&web, fast_config("Bakery", &locations, &output));
    let stopper = engine.clone();
    web.on_navigate(&listing_url("Bakery+0"), move || {
        stopper.stop();
    });

    let summary = run_to_end(&engine).await;

    assert!(summary.stopped);
    assert_eq!(summary.queries, 3);
    assert_eq!(summary.queries_run, 1);
    assert_eq!(web.navigation_count(&search_url("Bakery", "Shelbyville")), 0);
    assert_eq!(web.navigation_count("https://bakery0.com/"), 0);

    // Only what the first query captured on its listing page is persisted
    let persisted = DedupStore::open(&output).unwrap().snapshot();
    assert_eq!(persisted.len(), 1);
    assert_eq!(persisted[0].email, "owner0@bakery0.com");
    assert_eq!(persisted[0].source_url, listing_url("Bakery+0"));
}

#[tokio::test]
async fn test_scenario_e_clear_after_run() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("recipients.csv");
    let web = FakeWeb::new();
    seed_bakery_springfield(&web);

    let engine = engine_for(&web, fast_config("Bakery", &["Springfield"], &output));
    run_to_end(&engine).await;
    assert!(output.exists());
    assert_eq!(engine.status().record_count, 1);

    engine.clear().unwrap();

    let status = engine.status();
    assert_eq!(status.record_count, 0);
    assert!(status.records.is_empty());
    assert!(!status.running);
    assert!(!output.exists());
}

#[tokio::test]
async fn test_concurrency_bound_is_respected() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("recipients.csv");
    let web = FakeWeb::new();

    let listings: Vec<String> = (0..25).map(|i| listing_url(&format!("Shop+{i}"))).collect();
    web.html(&search_url("Bakery", "Springfield"), results_page(&listings));
    for (i, listing) in listings.iter().enumerate() {
        let site = format!("https://shop{i}.com/");
        web.html(listing, listing_page(Some(&site), ""));
        web.html(&site, site_page(&format!("hello@shop{i}.com")));
    }

    let mut config = fast_config("Bakery", &["Springfield"], &output);
    config.max_concurrent_pages = 3;
    let engine = engine_for(&web, config);
    let summary = run_to_end(&engine).await;

    assert_eq!(summary.sites.batches, 3);
    assert_eq!(summary.records, 25);
    assert!(web.peak_sessions() <= 3, "peak was {}", web.peak_sessions());
    assert!(web.peak_sessions() >= 2, "sites should run in parallel");
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("recipients.csv");
    let web = FakeWeb::new();
    seed_bakery_springfield(&web);

    let engine = engine_for(&web, fast_config("Bakery", &["Springfield"], &output));
    run_to_end(&engine).await;
    let first = engine.store().snapshot();
    let navigations = web.navigations().len();

    run_to_end(&engine).await;
    assert_eq!(engine.store().snapshot(), first);
    // Only the search view is loaded again; listings and sites are visited
    assert_eq!(web.navigations().len(), navigations + 1);

    // A fresh process resuming from the file ends with the same records
    let resumed = engine_for(&web, fast_config("Bakery", &["Springfield"], &output));
    run_to_end(&resumed).await;
    let emails = |records: Vec<harvest_core::ContactRecord>| {
        records.into_iter().map(|r| r.email).collect::<Vec<_>>()
    };
    assert_eq!(emails(resumed.store().snapshot()), emails(first));
}

#[tokio::test]
async fn test_dns_failures_are_not_retried_but_others_are() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("recipients.csv");
    let web = FakeWeb::new();

    let listings = vec![listing_url("Gone"), listing_url("Flaky")];
    web.html(&search_url("Bakery", "Springfield"), results_page(&listings));
    web.html(&listings[0], listing_page(Some("https://gone.example-shop.com/"), ""));
    web.html(&listings[1], listing_page(Some("https://flaky-shop.com/"), ""));
    web.page("https://gone.example-shop.com/", FakePage::Dns);
    web.page("https://flaky-shop.com/", FakePage::Fail);

    let engine = engine_for(&web, fast_config("Bakery", &["Springfield"], &output));
    let summary = run_to_end(&engine).await;

    assert_eq!(summary.sites.abandoned, 2);
    assert_eq!(web.navigation_count("https://gone.example-shop.com/"), 1);
    assert_eq!(web.navigation_count("https://flaky-shop.com/"), 3);
    assert_eq!(web.open_sessions(), 0);
}

#[tokio::test]
async fn test_excluded_websites_are_not_visited() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("recipients.csv");
    let web = FakeWeb::new();

    let listings = vec![listing_url("Social+Only")];
    web.html(&search_url("Bakery", "Springfield"), results_page(&listings));
    web.html(
        &listings[0],
        listing_page(Some("https://www.facebook.com/socialonly"), "<p>Call 217-555-0199</p>"),
    );

    let engine = engine_for(&web, fast_config("Bakery", &["Springfield"], &output));
    let summary = run_to_end(&engine).await;

    assert_eq!(summary.websites, 0);
    assert_eq!(web.navigation_count("https://www.facebook.com/socialonly"), 0);
}

#[tokio::test]
async fn test_status_reports_recent_logs() {
    use tracing_subscriber::prelude::*;

    let dir = TempDir::new().unwrap();
    let output = dir.path().join("recipients.csv");
    let web = FakeWeb::new();
    seed_bakery_springfield(&web);

    let logs = RecentLogs::new(50);
    let _subscriber = tracing::subscriber::set_default(tracing_subscriber::registry().with(logs.layer()));

    let config = fast_config("Bakery", &["Springfield"], &output);
    let store = DedupStore::open(&config.output_filename).unwrap();
    let engine = Engine::new(config, Arc::new(store), web.driver(), logs);
    run_to_end(&engine).await;

    let status = engine.status();
    assert!(!status.running);
    assert!(status
        .recent_logs
        .iter()
        .any(|line| line.contains("Run finished")));
    assert!(status
        .recent_logs
        .iter()
        .any(|line| line.contains("Recorded hello@golden-crust.com")));
}

#[tokio::test]
async fn test_failed_flush_aborts_run_and_returns_to_idle() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data");
    let output = data.join("recipients.csv");
    let web = FakeWeb::new();
    web.html(&search_url("Bakery", "Springfield"), results_page(&[]));

    let engine = engine_for(&web, fast_config("Bakery", &["Springfield"], &output));
    // The output directory can no longer be created
    std::fs::write(&data, "not a directory").unwrap();

    let handle = engine.start().unwrap();
    let result = handle.await.unwrap();

    assert!(matches!(result, Err(ScanError::Persistence(_))));
    assert_eq!(engine.state(), EngineState::Idle);
    let again = engine.start().expect("engine accepts a new run");
    assert!(matches!(again.await.unwrap(), Err(ScanError::Persistence(_))));
}

#[tokio::test]
async fn test_stop_cuts_query_pause_short() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("recipients.csv");
    let web = FakeWeb::new();
    web.html(&search_url("Bakery", "Springfield"), results_page(&[]));
    web.html(&search_url("Bakery", "Shelbyville"), results_page(&[]));

    let mut config = fast_config("Bakery", &["Springfield", "Shelbyville"], &output);
    config.delay_between_queries_min = 30.0;
    config.delay_between_queries_max = 30.0;
    let engine = engine_for(&web, config);

    let handle = engine.start().unwrap();
    while web.navigation_count(&search_url("Bakery", "Springfield")) == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(engine.stop());

    let summary = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("stop should end the pause")
        .unwrap()
        .unwrap();

    assert!(summary.stopped);
    assert_eq!(summary.queries_run, 1);
    assert_eq!(web.navigation_count(&search_url("Bakery", "Shelbyville")), 0);
    assert_eq!(engine.state(), EngineState::Idle);
}
