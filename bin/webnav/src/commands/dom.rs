use serde_json::Value;
use std::time::Duration;
use webnav_browser::DomContentType;
use webnav_core::{Config, Paths};

use super::browser::BrowserSession;

/// Open a page and print its tree (or text) for the given content type.
pub async fn run(url: &str, content_type: &str, session: &str) -> anyhow::Result<()> {
    let content_type: DomContentType = content_type.parse()?;
    let paths = Paths::new();
    let config = Config::load_or_default(&paths)?;

    let browser = BrowserSession::start(&config, &paths, session).await?;
    let result = fetch(&browser, url, content_type).await;
    browser.close().await;

    match result? {
        Value::String(text) => println!("{}", text),
        Value::Null => println!("No accessibility tree is available for this page."),
        tree => println!("{}", serde_json::to_string_pretty(&tree)?),
    }
    Ok(())
}

async fn fetch(browser: &BrowserSession, url: &str, content_type: DomContentType) -> anyhow::Result<Value> {
    let loaded = browser.executor.open_url(url, Duration::from_secs(10)).await?;
    tracing::info!("{}", loaded);
    Ok(browser.executor.get_dom(content_type).await?)
}
