//! reqwest-backed Zotero Web API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use tracing::{debug, instrument};
use url::Url;

use zoteroimport_shared::{ImportError, LibraryRef, Result, ZoteroConfig};

use crate::RemoteLibrary;
use crate::feed::{Feed, FeedPage, RemoteItem, parse_feed, parse_tag_feed};

/// User-Agent string for API requests.
const USER_AGENT: &str = concat!("zoteroimport/", env!("CARGO_PKG_VERSION"));

/// Zotero API version requested on every call.
const API_VERSION: &str = "3";

/// Maximum number of redirects to follow for feed requests.
const MAX_REDIRECTS: usize = 5;

/// Connection settings for [`ZoteroClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// API base URL (scheme + host).
    pub base_url: String,
    /// Private key sent as `Zotero-API-Key`; public libraries need none.
    pub api_key: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Entries per feed page.
    pub page_limit: Option<u32>,
}

impl ClientOptions {
    pub fn from_config(config: &ZoteroConfig, api_key: Option<String>) -> Self {
        Self {
            base_url: config.base_url.clone(),
            api_key,
            timeout_secs: config.timeout_secs,
            page_limit: config.page_limit,
        }
    }
}

/// Zotero Web API client.
pub struct ZoteroClient {
    client: Client,
    /// Does not follow redirects, so file locations can be read from `Location`.
    file_client: Client,
    base_url: Url,
    api_key: Option<String>,
    page_limit: Option<u32>,
}

impl ZoteroClient {
    pub fn new(opts: ClientOptions) -> Result<Self> {
        let base_url = Url::parse(&opts.base_url).map_err(|e| {
            ImportError::config(format!("invalid Zotero base URL '{}': {e}", opts.base_url))
        })?;
        let timeout = Duration::from_secs(opts.timeout_secs);

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(timeout)
            .build()
            .map_err(|e| ImportError::RemoteFetch(format!("failed to build HTTP client: {e}")))?;

        let file_client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()
            .map_err(|e| ImportError::RemoteFetch(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            file_client,
            base_url,
            api_key: opts.api_key,
            page_limit: opts.page_limit,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| ImportError::config(format!("invalid API path '{path}': {e}")))
    }

    /// Atom feed URL for `path`, starting at `start`.
    fn feed_url(&self, path: &str, start: u64, html_content: bool) -> Result<Url> {
        let mut url = self.endpoint(path)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("format", "atom");
            if html_content {
                query.append_pair("content", "html");
            }
            query.append_pair("start", &start.to_string());
            if let Some(limit) = self.page_limit {
                query.append_pair("limit", &limit.to_string());
            }
        }
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header("Zotero-API-Version", API_VERSION);
        match &self.api_key {
            Some(key) => request.header("Zotero-API-Key", key),
            None => request,
        }
    }

    async fn get_text(&self, url: &Url) -> Result<String> {
        debug!(%url, "fetching feed");

        let response = self
            .authorized(self.client.get(url.as_str()))
            .send()
            .await
            .map_err(|e| ImportError::RemoteFetch(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ImportError::RemoteFetch(format!("{url}: HTTP {status}")));
        }

        response
            .text()
            .await
            .map_err(|e| ImportError::RemoteFetch(format!("{url}: body read failed: {e}")))
    }

    /// Fetch every page of a feed and concatenate the entries.
    async fn collect_pages<T>(
        &self,
        path: &str,
        html_content: bool,
        parse: fn(&str) -> Result<Feed<T>>,
    ) -> Result<Vec<T>> {
        let mut entries = Vec::new();
        let mut start = 0;

        loop {
            let url = self.feed_url(path, start, html_content)?;
            let page = parse(&self.get_text(&url).await?)?;
            if page.is_last() || page.links.last.is_none() {
                entries.extend(page.entries);
                break;
            }

            let next = page.next_start()?;
            entries.extend(page.entries);
            match next {
                Some(next) if next > start => start = next,
                _ => break,
            }
        }

        Ok(entries)
    }
}

#[async_trait]
impl RemoteLibrary for ZoteroClient {
    #[instrument(skip_all, fields(library = %library, start = start))]
    async fn items_top(&self, library: &LibraryRef, start: u64) -> Result<FeedPage> {
        let path = format!("{}/items/top", library.path_prefix());
        let url = self.feed_url(&path, start, true)?;
        parse_feed(&self.get_text(&url).await?)
    }

    async fn item_tags(&self, library: &LibraryRef, key: &str) -> Result<Vec<String>> {
        let path = format!("{}/items/{key}/tags", library.path_prefix());
        self.collect_pages(&path, false, parse_tag_feed).await
    }

    async fn item_children(&self, library: &LibraryRef, key: &str) -> Result<Vec<RemoteItem>> {
        let path = format!("{}/items/{key}/children", library.path_prefix());
        self.collect_pages(&path, true, parse_feed).await
    }

    async fn item_file(&self, library: &LibraryRef, key: &str) -> Result<Option<String>> {
        let url = self.endpoint(&format!("{}/items/{key}/file", library.path_prefix()))?;
        debug!(%url, "resolving file location");

        let response = self
            .authorized(self.file_client.get(url.as_str()))
            .send()
            .await
            .map_err(|e| ImportError::RemoteFetch(format!("{url}: {e}")))?;

        let status = response.status();
        if status.is_redirection() {
            let location = response
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|value| value.to_str().ok())
                .map(String::from);
            return Ok(location);
        }
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if status.is_success() {
            // Served inline; the endpoint needs our API key, so it is no
            // location the destination could fetch.
            debug!(%url, "file served inline, no download location");
            return Ok(None);
        }

        Err(ImportError::RemoteFetch(format!("{url}: HTTP {status}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use zoteroimport_shared::LibraryType;

    fn client_for(server: &MockServer, api_key: Option<&str>) -> ZoteroClient {
        ZoteroClient::new(ClientOptions {
            base_url: server.uri(),
            api_key: api_key.map(String::from),
            timeout_secs: 5,
            page_limit: None,
        })
        .unwrap()
    }

    fn group() -> LibraryRef {
        LibraryRef::new(LibraryType::Group, "42")
    }

    fn load_fixture(name: &str) -> String {
        let path = format!("../../../fixtures/atom/{name}");
        std::fs::read_to_string(&path).unwrap_or_else(|_| panic!("missing fixture: {path}"))
    }

    #[test]
    fn feed_url_carries_paging_params() {
        let client = ZoteroClient::new(ClientOptions {
            base_url: "https://api.zotero.org".into(),
            api_key: None,
            timeout_secs: 5,
            page_limit: Some(25),
        })
        .unwrap();
        let url = client.feed_url("/users/7/items/top", 50, true).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.zotero.org/users/7/items/top?format=atom&content=html&start=50&limit=25"
        );
    }

    #[test]
    fn rejects_invalid_base_url() {
        let result = ZoteroClient::new(ClientOptions {
            base_url: "not a url".into(),
            api_key: None,
            timeout_secs: 5,
            page_limit: None,
        });
        assert!(matches!(result, Err(ImportError::Config { .. })));
    }

    #[tokio::test]
    async fn items_top_sends_key_and_parses_page() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/groups/42/items/top"))
            .and(query_param("start", "0"))
            .and(query_param("content", "html"))
            .and(header("Zotero-API-Key", "secret"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(load_fixture("items-top-page1.xml")),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Some("secret"));
        let page = client.items_top(&group(), 0).await.unwrap();
        assert_eq!(page.entries.len(), 2);
        assert_eq!(page.next_start().unwrap(), Some(2));
    }

    #[tokio::test]
    async fn user_library_uses_users_prefix() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/users/7/items/top"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(load_fixture("items-top-page2.xml")),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, None);
        let library = LibraryRef::new(LibraryType::User, "7");
        let page = client.items_top(&library, 2).await.unwrap();
        assert!(page.is_last());
    }

    #[tokio::test]
    async fn http_error_is_remote_fetch_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/groups/42/items/top"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = client_for(&server, None);
        let err = client.items_top(&group(), 0).await.unwrap_err();
        assert!(matches!(err, ImportError::RemoteFetch(_)));
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn tags_and_children() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/groups/42/items/ABCD2345/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_string(load_fixture("tags.xml")))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/groups/42/items/ABCD2345/children"))
            .respond_with(ResponseTemplate::new(200).set_body_string(load_fixture("children.xml")))
            .mount(&server)
            .await;

        let client = client_for(&server, None);
        let tags = client.item_tags(&group(), "ABCD2345").await.unwrap();
        assert_eq!(tags, ["fiction,drama", "regency"]);

        let children = client.item_children(&group(), "ABCD2345").await.unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].key, "NOTE0001");
    }

    #[tokio::test]
    async fn children_follow_next_links() {
        let server = MockServer::start().await;
        let base = format!("{}/groups/42/items/P1/children?format=atom", server.uri());

        let first = format!(
            r#"<feed xmlns:zapi="http://zotero.org/ns/api">
  <link rel="self" href="{base}&amp;start=0"/>
  <link rel="next" href="{base}&amp;start=1"/>
  <link rel="last" href="{base}&amp;start=1"/>
  <entry><title>First</title><zapi:key>C1</zapi:key><zapi:itemType>note</zapi:itemType></entry>
</feed>"#
        );
        let second = format!(
            r#"<feed xmlns:zapi="http://zotero.org/ns/api">
  <link rel="self" href="{base}&amp;start=1"/>
  <link rel="last" href="{base}&amp;start=1"/>
  <entry><title>Second</title><zapi:key>C2</zapi:key><zapi:itemType>note</zapi:itemType></entry>
</feed>"#
        );

        Mock::given(method("GET"))
            .and(path("/groups/42/items/P1/children"))
            .and(query_param("start", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_string(first))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/groups/42/items/P1/children"))
            .and(query_param("start", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(second))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, None);
        let children = client.item_children(&group(), "P1").await.unwrap();
        let keys: Vec<_> = children.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, ["C1", "C2"]);
    }

    #[tokio::test]
    async fn file_location_from_redirect() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/groups/42/items/EFGH6789/file"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("Location", "https://files.example.org/scan.pdf?sig=abc"),
            )
            .mount(&server)
            .await;

        let client = client_for(&server, None);
        let location = client.item_file(&group(), "EFGH6789").await.unwrap();
        assert_eq!(
            location.as_deref(),
            Some("https://files.example.org/scan.pdf?sig=abc")
        );
    }

    #[tokio::test]
    async fn missing_file_is_none() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/groups/42/items/NOFILE01/file"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = client_for(&server, None);
        assert!(client.item_file(&group(), "NOFILE01").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn inline_file_has_no_location() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/groups/42/items/INLINE01/file"))
            .respond_with(ResponseTemplate::new(200).set_body_string("%PDF-1.4"))
            .mount(&server)
            .await;

        let client = client_for(&server, Some("secret"));
        assert!(client.item_file(&group(), "INLINE01").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn file_server_error_propagates() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/groups/42/items/BROKEN01/file"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = client_for(&server, None);
        assert!(client.item_file(&group(), "BROKEN01").await.is_err());
    }
}
