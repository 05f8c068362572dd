use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{ACCEPT, REFERER};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::core::relay::ReportSource;
use crate::core::report::Report;

pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

const CSRF_COOKIE: &str = "csrftoken";

/// Reports API client. The API only answers requests carrying the session
/// and CSRF cookies the site hands out on a normal page load, so every fetch
/// opens a fresh session first.
pub struct IceoutClient {
    http: Client,
    jar: Arc<Jar>,
    site_url: Url,
}

impl IceoutClient {
    pub fn new(site_url: &str, timeout: Duration) -> Result<Self> {
        let site_url = Url::parse(site_url).with_context(|| format!("invalid site url {}", site_url))?;
        let jar = Arc::new(Jar::default());
        let http = Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .cookie_provider(jar.clone())
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            jar,
            site_url,
        })
    }

    pub fn reports_url(&self, limit: usize) -> Result<Url> {
        let mut url = self.site_url.join("/api/reports/")?;
        url.query_pairs_mut()
            .append_pair("count", &limit.to_string());
        Ok(url)
    }

    async fn open_session(&self) -> Result<()> {
        info!("[iceout] Opening session at {}", self.site_url);
        let res = self
            .http
            .get(self.site_url.clone())
            .send()
            .await
            .context("loading site")?;
        if !res.status().is_success() {
            return Err(anyhow!("site returned HTTP {}", res.status()));
        }
        // Drain the body so every Set-Cookie on redirects and the final page lands.
        res.bytes().await.context("reading site page")?;
        Ok(())
    }

    fn csrf_token(&self) -> Option<String> {
        let header = self.jar.cookies(&self.site_url)?;
        let cookies = header.to_str().ok()?;
        cookies.split(';').find_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            (name == CSRF_COOKIE).then(|| value.to_string())
        })
    }

    pub async fn fetch_reports(&self, limit: usize) -> Result<Vec<Report>> {
        self.open_session().await?;

        let url = self.reports_url(limit)?;
        info!("[iceout] Requesting the latest {} reports", limit);
        let mut req = self
            .http
            .get(url)
            .header(ACCEPT, "application/json")
            .header(REFERER, self.site_url.as_str());
        match self.csrf_token() {
            Some(token) => req = req.header("X-CSRFToken", token),
            None => debug!("[iceout] No {} cookie in session", CSRF_COOKIE),
        }

        let res = req.send().await.context("requesting reports")?;
        let status = res.status();
        if !status.is_success() {
            return Err(anyhow!("reports API returned HTTP {}", status));
        }
        let body: serde_json::Value = res.json().await.context("decoding reports body")?;
        let reports = parse_reports(body)?;
        info!("[iceout] Received {} reports", reports.len());
        Ok(reports)
    }
}

#[async_trait]
impl ReportSource<Report> for IceoutClient {
    async fn fetch(&self, limit: usize) -> Result<Vec<Report>> {
        self.fetch_reports(limit).await
    }
}

/// Accepts a bare array or an object wrapping it under `results` or `data`.
/// Records that fail to decode are skipped so one bad row cannot sink a batch.
pub fn parse_reports(body: serde_json::Value) -> Result<Vec<Report>> {
    let rows = match body {
        serde_json::Value::Array(rows) => rows,
        serde_json::Value::Object(mut obj) => match obj
            .remove("results")
            .or_else(|| obj.remove("data"))
        {
            Some(serde_json::Value::Array(rows)) => rows,
            _ => return Err(anyhow!("reports body has no results array")),
        },
        other => return Err(anyhow!("unexpected reports body: {}", other)),
    };

    let mut reports = Vec::with_capacity(rows.len());
    for row in rows {
        match serde_json::from_value::<Report>(row) {
            Ok(report) => reports.push(report),
            Err(e) => warn!("[iceout] Skipping undecodable report: {}", e),
        }
    }
    Ok(reports)
}

/// Downloads report photos. Failures are logged and yield `None`; the
/// notification then goes out as text only.
pub struct MediaDownloader {
    http: Client,
}

impl MediaDownloader {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self { http })
    }

    pub async fn download(&self, url: &str) -> Option<Vec<u8>> {
        info!("[media] Downloading photo...");
        let res = match self.http.get(url).send().await {
            Ok(res) => res,
            Err(e) => {
                warn!("[media] Photo download failed: {}", e);
                return None;
            }
        };
        if !res.status().is_success() {
            warn!("[media] Photo download returned HTTP {}", res.status());
            return None;
        }
        match res.bytes().await {
            Ok(bytes) if !bytes.is_empty() => {
                info!("[media] Photo downloaded ({} KB)", bytes.len() / 1024);
                Some(bytes.to_vec())
            }
            Ok(_) => {
                warn!("[media] Photo download returned an empty body");
                None
            }
            Err(e) => {
                warn!("[media] Photo download failed: {}", e);
                None
            }
        }
    }
}
