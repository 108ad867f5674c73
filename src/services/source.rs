// src/services/source.rs

//! Catalog source client.
//!
//! The source answers XHR requests with a JSON envelope `{content, errors}`
//! whose `content` is an HTML fragment: a `ul` of entries for a namespace
//! index, or a heading plus description paragraph for a single entry.

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{EntryDetail, EntryStub, Param, SourceConfig};
use crate::utils::http::create_async_client;

/// Remote catalog operations used by the crawl orchestrator.
///
/// Both calls must be safe to retry.
#[async_trait]
pub trait SourceClient: Send + Sync {
    /// List the entries of one namespace.
    async fn fetch_namespace_index(&self, namespace: &str) -> Result<Vec<EntryStub>>;

    /// Fetch the full detail of one entry.
    async fn fetch_entry_detail(&self, id: &str) -> Result<EntryDetail>;
}

/// HTTP implementation of [`SourceClient`].
pub struct HttpSourceClient {
    client: Client,
    base_url: Url,
    namespace_path: String,
    entry_path: String,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    errors: Option<serde_json::Value>,
}

impl HttpSourceClient {
    /// Create a new source client with the given configuration.
    pub fn new(config: &SourceConfig) -> Result<Self> {
        Ok(Self {
            client: create_async_client(config)?,
            base_url: Url::parse(&config.base_url)?,
            namespace_path: config.namespace_path.clone(),
            entry_path: config.entry_path.clone(),
        })
    }

    fn url(&self, prefix: &str, name: &str) -> Result<Url> {
        Ok(self.base_url.join(&format!("{prefix}{name}"))?)
    }

    /// GET a URL and unwrap the envelope's HTML content.
    async fn fetch_content(&self, url: Url, context: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::remote(context, e, true))?;

        let status = response.status();
        if !status.is_success() {
            let transient = status.is_server_error() || status.as_u16() == 429;
            return Err(AppError::remote(context, format!("HTTP {status}"), transient));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AppError::remote(context, e, true))?;
        parse_envelope(&body, context)
    }
}

#[async_trait]
impl SourceClient for HttpSourceClient {
    async fn fetch_namespace_index(&self, namespace: &str) -> Result<Vec<EntryStub>> {
        let url = self.url(&self.namespace_path, namespace)?;
        let content = self.fetch_content(url, namespace).await?;
        parse_namespace_index(&content).map_err(|e| AppError::remote(namespace, e, false))
    }

    async fn fetch_entry_detail(&self, id: &str) -> Result<EntryDetail> {
        let url = self.url(&self.entry_path, id)?;
        let content = self.fetch_content(url, id).await?;
        parse_entry_detail(&content).map_err(|e| AppError::remote(id, e, false))
    }
}

/// Unwrap a `{content, errors}` response body.
pub fn parse_envelope(body: &str, context: &str) -> Result<String> {
    let envelope: Envelope = serde_json::from_str(body)
        .map_err(|e| AppError::remote(context, format!("invalid JSON response: {e}"), false))?;

    if let Some(errors) = envelope.errors.filter(|e| !e.is_null()) {
        return Err(AppError::remote(context, errors, false));
    }

    envelope
        .content
        .ok_or_else(|| AppError::remote(context, "response has no content", false))
}

/// Parse the HTML list of a namespace index.
pub fn parse_namespace_index(html: &str) -> Result<Vec<EntryStub>> {
    let document = Html::parse_fragment(html);
    let item_sel = parse_selector("ul li")?;
    let span_sel = parse_selector("a:last-child span")?;
    let type_sel = parse_selector("span.fntype")?;
    let comm_sel = parse_selector("span.fncomm")?;

    let mut stubs = Vec::new();
    for item in document.select(&item_sel) {
        let Some(span) = item.select(&span_sel).next() else {
            continue;
        };
        match parse_index_item(span, &type_sel, &comm_sel) {
            Some(stub) => stubs.push(stub),
            None => log::warn!("Skipping malformed index item: {}", element_text(span)),
        }
    }
    Ok(stubs)
}

fn parse_index_item(span: ElementRef, type_sel: &Selector, comm_sel: &Selector) -> Option<EntryStub> {
    let raw = element_text(span);
    let return_type = span
        .select(type_sel)
        .next()
        .map(element_text)
        .unwrap_or_default();

    // The comment reads "// <id> <hash>".
    let comment: String = span.select(comm_sel).map(element_text).collect();
    let address: String = comment.chars().skip(3).collect();
    let id = address.split_whitespace().next()?.to_string();

    let signature = raw.trim_start();
    let signature = signature
        .strip_prefix(return_type.as_str())
        .unwrap_or(signature);
    let open = signature.find('(')?;
    let name = signature[..open].trim().to_string();
    if name.is_empty() {
        return None;
    }

    let rest = &signature[open + 1..];
    let close = rest.find(')').unwrap_or(rest.len());
    let params = parse_params(&rest[..close]);

    Some(EntryStub {
        id,
        name,
        return_type,
        params,
    })
}

/// Parse `"type name, type name"` into positional params.
fn parse_params(raw: &str) -> Vec<Param> {
    if raw.trim().is_empty() {
        return Vec::new();
    }
    raw.split(',')
        .map(|part| {
            let mut tokens = part.split_whitespace();
            let kind = tokens.next().unwrap_or_default();
            let name = tokens.next().unwrap_or_default();
            Param::new(kind, name)
        })
        .collect()
}

/// Parse the HTML of an entry detail page.
pub fn parse_entry_detail(html: &str) -> Result<EntryDetail> {
    let document = Html::parse_fragment(html);
    let heading_sel = parse_selector("h2")?;
    let address_sel = parse_selector("i")?;
    let body_sel = parse_selector("p")?;
    let line_break = Regex::new(r"(?i)<\n*b\n*r\n*/?>").map_err(|e| AppError::config(e.to_string()))?;

    let heading = document
        .select(&heading_sel)
        .next()
        .map(element_text)
        .unwrap_or_default();
    let mut heading_parts = heading.splitn(2, "::");
    let namespace = heading_parts.next().unwrap_or_default().trim().to_string();
    let name = heading_parts.next().unwrap_or_default().trim().to_string();

    // The address line reads "// <id> <hash>".
    let address = document
        .select(&address_sel)
        .next()
        .map(element_text)
        .unwrap_or_default();
    let secondary_hash = address
        .split_whitespace()
        .nth(2)
        .unwrap_or_default()
        .to_string();

    let body = document
        .select(&body_sel)
        .next()
        .ok_or_else(|| AppError::validation("entry detail has no description paragraph"))?;
    let description_lines = line_break
        .split(&body.inner_html())
        .map(String::from)
        .collect();

    Ok(EntryDetail {
        name,
        namespace,
        secondary_hash,
        description_lines,
    })
}

fn element_text(element: ElementRef) -> String {
    element.text().collect()
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}
