//! End-to-end runs against a mocked job board and mail API.

use std::sync::Arc;

use offerwatch::models::{Config, Keywords, RunMode};
use offerwatch::notify::{Notifier, NotifyOutcome, SendGridTransport};
use offerwatch::pipeline::{RunOptions, RunReport, run_scrape};
use offerwatch::services::OfferFetcher;
use offerwatch::storage::{CsvMasterStore, DailyExport, OfferStore};
use offerwatch::utils::http::create_client;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

const KEYWORD: &str = "Accountant";

fn listing(ids: &[&str]) -> String {
    let offers: Vec<(&str, String)> = ids
        .iter()
        .map(|id| (*id, format!("Chief Accountant {id}")))
        .collect();
    listing_with_titles(&offers)
}

fn listing_with_titles(offers: &[(&str, String)]) -> String {
    let cards: String = offers
        .iter()
        .map(|(id, title)| {
            format!(
                r#"<div data-test="default-offer">
                     <a href="/praca/chief-accountant,oferta,{id}">
                       <span data-test="offer-title">{title}</span>
                     </a>
                     <span data-test="text-company-name">Company {id}</span>
                   </div>"#
            )
        })
        .collect();
    format!("<html><body>{cards}</body></html>")
}

fn test_config(server: &MockServer) -> Config {
    let mut config = Config::default();
    config.site.base_url = server.uri();
    config.site.search_url = format!("{}/search?kw={{keyword}}", server.uri());
    config.fetcher.request_delay_ms = 0;
    config.fetcher.detail_delay_ms = 0;
    config.fetcher.max_detail_requests = 0;
    config.fetcher.timeout_secs = 5;
    config.notify.attach_xlsx = false;
    config
}

async fn mount_page(server: &MockServer, page: Option<u32>, ids: &[&str]) {
    let mock = Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("kw", KEYWORD));
    let mock = match page {
        Some(n) => mock.and(query_param("pn", n.to_string())),
        None => mock.and(query_param_is_missing("pn")),
    };
    mock.respond_with(ResponseTemplate::new(200).set_body_string(listing(ids)))
        .mount(server)
        .await;
}

async fn mount_mail_api(server: &MockServer, status: u16) {
    Mock::given(method("POST"))
        .and(path("/v3/mail/send"))
        .and(header("authorization", "Bearer SG.test"))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

fn notifier(server: &MockServer, config: &Config) -> Notifier {
    let client = create_client(&config.fetcher).unwrap();
    let transport = SendGridTransport::with_endpoint(
        client,
        "SG.test",
        format!("{}/v3/mail/send", server.uri()),
    );
    Notifier::new(Box::new(transport), "cfo@example.com", "bot@example.com", config)
}

async fn run(
    server: &MockServer,
    config: &Config,
    dir: &TempDir,
    options: RunOptions,
) -> RunReport {
    let config = Arc::new(config.clone());
    let keywords = Keywords::new([KEYWORD]).unwrap();
    let store = CsvMasterStore::new(config.master_path(dir.path()));
    let export = DailyExport::new(dir.path(), &config.paths.daily_prefix);
    let client = create_client(&config.fetcher).unwrap();
    let fetcher = OfferFetcher::new(Arc::clone(&config), client).unwrap();
    let notifier = notifier(server, &config);

    run_scrape(&config, &keywords, &store, &fetcher, &notifier, &export, options)
        .await
        .unwrap()
}

async fn stored_ids(config: &Config, dir: &TempDir) -> Vec<String> {
    CsvMasterStore::new(config.master_path(dir.path()))
        .load()
        .await
        .unwrap()
        .into_iter()
        .map(|o| o.id)
        .collect()
}

async fn sent_mail_bodies(server: &MockServer) -> Vec<serde_json::Value> {
    server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path() == "/v3/mail/send")
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect()
}

#[tokio::test]
async fn test_first_run_backfills_and_creates_store() {
    let server = MockServer::start().await;
    mount_page(&server, None, &["1000001", "1000002"]).await;
    mount_page(&server, Some(2), &["1000003"]).await;
    mount_page(&server, Some(3), &[]).await;
    mount_mail_api(&server, 202).await;

    let dir = TempDir::new().unwrap();
    let config = test_config(&server);
    let report = run(&server, &config, &dir, RunOptions::default()).await;

    assert_eq!(report.mode, RunMode::FullBackfill);
    assert_eq!(report.fetched, 3);
    assert_eq!(report.new, 3);
    assert_eq!(report.appended, 3);
    assert_eq!(report.total, 3);
    assert_eq!(report.notification, NotifyOutcome::Sent { transport: "sendgrid" });
    assert_eq!(stored_ids(&config, &dir).await, vec!["1000001", "1000002", "1000003"]);

    let mails = sent_mail_bodies(&server).await;
    assert_eq!(mails.len(), 1);
    let attachments = mails[0]["attachments"].as_array().unwrap();
    assert_eq!(attachments.len(), 1);
    assert!(
        attachments[0]["filename"]
            .as_str()
            .unwrap()
            .starts_with("offers_NEW_")
    );
}

#[tokio::test]
async fn test_steady_state_reports_only_new_offer() {
    let server = MockServer::start().await;
    mount_page(&server, None, &["1000001", "1000002", "1000003"]).await;
    mount_page(&server, Some(2), &[]).await;
    mount_mail_api(&server, 202).await;

    let dir = TempDir::new().unwrap();
    let config = test_config(&server);
    run(&server, &config, &dir, RunOptions::default()).await;

    server.reset().await;
    mount_page(&server, None, &["1000001", "1000002", "1000003", "1000004"]).await;
    mount_page(&server, Some(2), &[]).await;
    mount_mail_api(&server, 202).await;

    let report = run(&server, &config, &dir, RunOptions::default()).await;

    assert_eq!(report.mode, RunMode::Incremental);
    assert_eq!(report.new, 1);
    assert_eq!(report.appended, 1);
    assert_eq!(report.total, 4);
    assert_eq!(
        stored_ids(&config, &dir).await,
        vec!["1000001", "1000002", "1000003", "1000004"]
    );

    let mails = sent_mail_bodies(&server).await;
    assert_eq!(mails.len(), 1);
    let text = mails[0]["content"][0]["value"].as_str().unwrap();
    assert!(text.contains("oferta,1000004"));
    assert!(!text.contains("oferta,1000001"));
}

#[tokio::test]
async fn test_second_identical_run_is_idempotent() {
    let server = MockServer::start().await;
    mount_page(&server, None, &["1000001", "1000002"]).await;
    mount_page(&server, Some(2), &[]).await;
    mount_mail_api(&server, 202).await;

    let dir = TempDir::new().unwrap();
    let config = test_config(&server);
    run(&server, &config, &dir, RunOptions::default()).await;
    let master = config.master_path(dir.path());
    let before = std::fs::read(&master).unwrap();

    let report = run(&server, &config, &dir, RunOptions::default()).await;

    assert_eq!(report.new, 0);
    assert_eq!(report.appended, 0);
    assert_eq!(report.total, 2);
    assert_eq!(std::fs::read(&master).unwrap(), before);
    // "no new offers" notice goes out by default
    assert_eq!(report.notification, NotifyOutcome::Sent { transport: "sendgrid" });
}

#[tokio::test]
async fn test_empty_first_page_ends_pagination() {
    let server = MockServer::start().await;
    mount_page(&server, None, &[]).await;
    mount_mail_api(&server, 202).await;

    let dir = TempDir::new().unwrap();
    let config = test_config(&server);
    let report = run(&server, &config, &dir, RunOptions::default()).await;

    assert_eq!(report.fetched, 0);
    assert_eq!(report.page_failures, 0);
    let search_requests = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path() == "/search")
        .count();
    assert_eq!(search_requests, 1);
    assert!(stored_ids(&config, &dir).await.is_empty());
}

#[tokio::test]
async fn test_failing_page_stops_keyword_without_error() {
    let server = MockServer::start().await;
    mount_page(&server, None, &["1000001"]).await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("pn", "2"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    mount_mail_api(&server, 202).await;

    let dir = TempDir::new().unwrap();
    let config = test_config(&server);
    let report = run(&server, &config, &dir, RunOptions::default()).await;

    assert_eq!(report.page_failures, 1);
    assert_eq!(report.appended, 1);
}

#[tokio::test]
async fn test_notifier_failure_keeps_append() {
    let server = MockServer::start().await;
    mount_page(&server, None, &["1000001", "1000002"]).await;
    mount_page(&server, Some(2), &[]).await;
    mount_mail_api(&server, 401).await;

    let dir = TempDir::new().unwrap();
    let config = test_config(&server);
    let report = run(&server, &config, &dir, RunOptions::default()).await;

    assert!(matches!(report.notification, NotifyOutcome::Failed(_)));
    assert_eq!(report.appended, 2);
    assert_eq!(stored_ids(&config, &dir).await, vec!["1000001", "1000002"]);
}

#[tokio::test]
async fn test_dry_run_writes_nothing() {
    let server = MockServer::start().await;
    mount_page(&server, None, &["1000001"]).await;
    mount_page(&server, Some(2), &[]).await;
    mount_mail_api(&server, 202).await;

    let dir = TempDir::new().unwrap();
    let config = test_config(&server);
    let options = RunOptions {
        dry_run: true,
        ..RunOptions::default()
    };
    let report = run(&server, &config, &dir, options).await;

    assert_eq!(report.new, 1);
    assert_eq!(report.appended, 0);
    assert_eq!(report.notification, NotifyOutcome::Skipped("dry run"));
    assert!(!config.master_path(dir.path()).exists());
    assert!(sent_mail_bodies(&server).await.is_empty());
}

async fn fetch_ids(config: &Config, mode: RunMode) -> (Vec<String>, usize) {
    let config = Arc::new(config.clone());
    let client = create_client(&config.fetcher).unwrap();
    let fetcher = OfferFetcher::new(Arc::clone(&config), client).unwrap();
    let keywords = Keywords::new([KEYWORD]).unwrap();

    let outcome = fetcher
        .fetch_all(&keywords, mode, "2026-10-18 07:00:00+0200")
        .await;
    let ids = outcome.offers.into_iter().map(|o| o.id).collect();
    (ids, outcome.pages_fetched)
}

#[tokio::test]
async fn test_endless_site_stops_at_mode_page_cap() {
    let server = MockServer::start().await;
    mount_page(&server, None, &["1000001"]).await;
    for page in 2..=12u32 {
        let id = format!("{}", 1000000 + page);
        mount_page(&server, Some(page), &[id.as_str()]).await;
    }

    let mut config = test_config(&server);
    config.fetcher.full_page_cap = 7;
    config.fetcher.incremental_page_cap = 3;

    let (ids, pages) = fetch_ids(&config, RunMode::FullBackfill).await;
    assert_eq!(pages, 7);
    assert_eq!(ids.len(), 7);
    assert_eq!(ids.last().map(String::as_str), Some("1000007"));

    let (ids, pages) = fetch_ids(&config, RunMode::Incremental).await;
    assert_eq!(pages, 3);
    assert_eq!(ids, vec!["1000001", "1000002", "1000003"]);
}

#[tokio::test]
async fn test_repeated_page_ends_pagination() {
    let server = MockServer::start().await;
    mount_page(&server, None, &["1000001", "1000002"]).await;
    mount_page(&server, Some(2), &["1000003"]).await;
    mount_page(&server, Some(3), &["1000003", "1000001"]).await;
    mount_page(&server, Some(4), &["1000004"]).await;

    let config = test_config(&server);
    let (ids, pages) = fetch_ids(&config, RunMode::FullBackfill).await;

    assert_eq!(ids, vec!["1000001", "1000002", "1000003"]);
    assert_eq!(pages, 3);
}

#[tokio::test]
async fn test_titles_without_phrase_are_dropped() {
    let server = MockServer::start().await;
    let page = listing_with_titles(&[
        ("1000001", "Chief ACCOUNTANT (m/f)".to_string()),
        ("1000002", "Senior Rust Developer".to_string()),
        ("1000003", "Starszy accountant ds. płac".to_string()),
    ]);
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param_is_missing("pn"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page))
        .mount(&server)
        .await;
    mount_page(&server, Some(2), &[]).await;

    let config = test_config(&server);
    let (ids, _) = fetch_ids(&config, RunMode::FullBackfill).await;

    assert_eq!(ids, vec!["1000001", "1000003"]);
}
