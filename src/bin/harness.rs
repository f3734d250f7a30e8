//! Demonstration harness.
//!
//! Parses a page on the task scheduler, asks the LLM service for a reply and
//! prints what it found as JSON.
//!
//! ```text
//! browseruse-harness [page.html | https://url]
//! ```
//!
//! Without an argument an embedded sample page is used. A URL argument is
//! opened in Chromium instead: its title and a screenshot are added to the
//! report while the sample page is still parsed. Settings come from the
//! environment (a `.env` file is loaded into it first) and
//! `application.properties` in the working directory.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use std::{env, fs};

use anyhow::Context;
use browseruse::browser::{visit_page, BrowserController, ChromiumBrowserController, PageVisit};
use browseruse::config::ConfigLoader;
use browseruse::core::{SimpleTaskScheduler, Task, TaskScheduler};
use browseruse::html::{HtmlParser, ParsedDocument, ScraperHtmlParser};
use browseruse::llm::{LlmError, LlmService, RuleBasedLlmService};
use browseruse::util::{init_tracing, to_json};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{info, warn};

const SAMPLE_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <title>Weather in Berlin</title>
  <meta name="description" content="Current conditions and forecast">
  <meta property="og:type" content="article">
</head>
<body>
  <h1>Berlin</h1>
  <p class="summary">Light rain, 14&deg;C.</p>
  <a href="/forecast">Forecast</a>
  <a href="https://example.com/radar">Radar</a>
  <script>trackPageView();</script>
</body>
</html>"#;

#[derive(Debug, Default, Serialize)]
struct Report {
    title: String,
    metadata: std::collections::BTreeMap<String, String>,
    text: String,
    links: Vec<String>,
    summaries: Vec<String>,
    reply: Option<String>,
    visit: Option<PageVisit>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = dotenvy::dotenv();
    init_tracing();
    if let Ok(path) = dotenv {
        info!(path = %path.display(), "Loaded environment file");
    }

    let arg = env::args().nth(1);
    let url = arg.as_deref().filter(|a| a.starts_with("http://") || a.starts_with("https://"));
    let page = match arg.as_deref() {
        Some(path) if url.is_none() => fs::read_to_string(path).with_context(|| format!("reading {path}"))?,
        _ => SAMPLE_PAGE.to_string(),
    };
    let page = Arc::new(page);

    let loader = ConfigLoader::new();
    let scheduler = SimpleTaskScheduler::from_loader(&loader)?;
    let parser = Arc::new(ScraperHtmlParser::new());
    let report = Arc::new(Mutex::new(Report::default()));

    let tasks = vec![
        {
            let (page, parser, report) = (Arc::clone(&page), Arc::clone(&parser), Arc::clone(&report));
            Task::new(move || {
                let ParsedDocument { title, text, metadata, .. } = parser.parse_html(&page);
                let mut report = report.lock();
                report.title = title;
                report.text = text;
                report.metadata = metadata;
            })
            .with_name("parse-document")
        },
        {
            let (page, parser, report) = (Arc::clone(&page), Arc::clone(&parser), Arc::clone(&report));
            Task::new(move || {
                let links = parser.extract_links(&page);
                report.lock().links = links;
            })
            .with_name("extract-links")
        },
        {
            let (page, parser, report) = (Arc::clone(&page), Arc::clone(&parser), Arc::clone(&report));
            Task::fallible(move || {
                let summaries = parser.select_elements(&page, "p.summary")?;
                report.lock().summaries = summaries.into_iter().map(|e| e.text).collect();
                Ok(())
            })
            .with_name("select-summary")
        },
    ];

    let batch = scheduler.execute_async_tasks(tasks);
    match batch.wait_for(Duration::from_secs(30)).await {
        Some(outcome) => outcome?,
        None => warn!("Parsing batch still running after 30s"),
    }

    match RuleBasedLlmService::from_loader(&loader) {
        Ok(llm) if llm.is_available() => {
            let title = report.lock().title.clone();
            let reply = llm.generate_text(&format!("What is the weather? {title}")).await?;
            report.lock().reply = Some(reply);
        }
        Ok(_) | Err(LlmError::MissingApiKey) => {
            info!("LLM service not configured, set llm.api.key to enable replies");
        }
        Err(err) => return Err(err.into()),
    }

    if let Some(url) = url {
        let browser = ChromiumBrowserController::from_loader(&loader).await?;
        let visit = visit_page(&browser, url, Path::new("harness.png")).await;
        browser.close().await?;
        report.lock().visit = Some(visit?);
    }

    println!("{}", to_json(&*report.lock()));

    let outcome = scheduler.shutdown();
    info!(?outcome, "Harness finished");
    Ok(())
}
