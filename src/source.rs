use reqwest::StatusCode;
use reqwest::blocking::Client;
use scraper::{Html, Selector};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::config::ScrapeConfig;
use crate::error::{FetchError, FetchResult};
use crate::http_client::http_client;
use crate::model::{RawGame, RawMatch};

const JSON_SCRIPT_SELECTOR: &str = r#"script[type="application/json"]"#;
const MATCH_LIST_POINTER: &str = "/props/pageProps/allMatches";
const MATCH_GAMES_POINTER: &str = "/props/pageProps/initialMatchState/games";

/// Where match lists and per-match games come from.
pub trait MatchSource {
    fn fetch_match_list(&self) -> FetchResult<Vec<RawMatch>>;

    fn fetch_match_detail(&self, match_id: u64) -> FetchResult<Vec<RawGame>>;
}

/// Reads the stats site's server-rendered pages.
pub struct HttpSource {
    client: Client,
    base_url: String,
}

impl HttpSource {
    pub fn new(config: &ScrapeConfig) -> anyhow::Result<Self> {
        let client = http_client(config.request_timeout)?.clone();
        Ok(Self::with_client(client, &config.base_url))
    }

    /// Use this when the client needs its own proxy, headers or timeouts.
    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn match_list_url(&self) -> String {
        format!("{}/matches", self.base_url)
    }

    pub fn match_detail_url(&self, match_id: u64) -> String {
        format!("{}/match/{match_id}", self.base_url)
    }
}

impl MatchSource for HttpSource {
    #[instrument(skip(self))]
    fn fetch_match_list(&self) -> FetchResult<Vec<RawMatch>> {
        fetch_match_list(&self.client, &self.match_list_url())
    }

    #[instrument(skip(self))]
    fn fetch_match_detail(&self, match_id: u64) -> FetchResult<Vec<RawGame>> {
        let html = get_document(&self.client, &self.match_detail_url(match_id))?;
        parse_match_detail_html(&html)
    }
}

pub fn fetch_match_list(client: &Client, url: &str) -> FetchResult<Vec<RawMatch>> {
    let html = get_document(client, url)?;
    let matches = parse_match_list_html(&html)?;
    debug!(count = matches.len(), "parsed match list");
    Ok(matches)
}

/// Fetches a page body. 404 is reported as [`FetchError::NotFound`].
pub fn get_document(client: &Client, url: &str) -> FetchResult<String> {
    debug!(url, "fetching page");

    let response = client.get(url).send().map_err(|e| FetchError::Http {
        url: url.to_owned(),
        source: e,
    })?;

    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(FetchError::NotFound {
            url: url.to_owned(),
        });
    }
    if !status.is_success() {
        return Err(FetchError::UnexpectedStatus {
            url: url.to_owned(),
            status,
        });
    }

    response.text().map_err(|e| FetchError::ResponseBody {
        url: url.to_owned(),
        source: e,
    })
}

/// Finds the block holding `allMatches` and decodes its entries.
pub fn parse_match_list_html(html: &str) -> FetchResult<Vec<RawMatch>> {
    let entries = find_array(html, MATCH_LIST_POINTER).ok_or(
        FetchError::MissingPayload {
            context: "props.pageProps.allMatches",
        },
    )?;
    decode_entries(entries, "match list entry")
}

/// Finds the first block whose `initialMatchState.games` list carries at
/// least one player line. Blocks holding only game shells are passed over.
pub fn parse_match_detail_html(html: &str) -> FetchResult<Vec<RawGame>> {
    let mut last_err = None;
    for mut block in json_blocks(html)? {
        let Some(entries) = block
            .pointer_mut(MATCH_GAMES_POINTER)
            .and_then(Value::as_array_mut)
        else {
            continue;
        };
        if entries.is_empty() {
            continue;
        }
        match decode_entries::<RawGame>(std::mem::take(entries), "match game") {
            Ok(games) if games.iter().any(|g| !g.player_stats.is_empty()) => return Ok(games),
            Ok(games) => debug!(games = games.len(), "skipping games block without player lines"),
            Err(err) => last_err = Some(err),
        }
    }
    Err(last_err.unwrap_or(FetchError::MissingPayload {
        context: "props.pageProps.initialMatchState.games",
    }))
}

/// Every embedded JSON block on the page that parses, in document order.
pub fn json_blocks(html: &str) -> FetchResult<Vec<Value>> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(JSON_SCRIPT_SELECTOR)?;
    let mut blocks = Vec::new();
    for script in document.select(&selector) {
        let content = script.text().collect::<String>();
        let trimmed = content.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(trimmed) {
            Ok(value) => blocks.push(value),
            Err(err) => debug!(error = %err, "skipping unparsable json block"),
        }
    }
    Ok(blocks)
}

fn find_array(html: &str, pointer: &str) -> Option<Vec<Value>> {
    let blocks = json_blocks(html).ok()?;
    blocks.into_iter().find_map(|mut block| {
        let entries = block.pointer_mut(pointer)?.as_array_mut()?;
        Some(std::mem::take(entries))
    })
}

/// Skips entries that do not decode. Fails only when there were entries and
/// none of them decoded.
fn decode_entries<T: DeserializeOwned>(
    entries: Vec<Value>,
    context: &'static str,
) -> FetchResult<Vec<T>> {
    let mut out = Vec::with_capacity(entries.len());
    let mut last_err = None;
    for (idx, entry) in entries.into_iter().enumerate() {
        match serde_json::from_value::<T>(entry) {
            Ok(item) => out.push(item),
            Err(err) => {
                warn!(index = idx, error = %err, "skipping undecodable {context}");
                last_err = Some(err);
            }
        }
    }
    match last_err {
        Some(source) if out.is_empty() => Err(FetchError::Json { context, source }),
        _ => Ok(out),
    }
}
