use crate::errors::{AccessError, ReadError, ReadResult};
use crate::media_type::MediaType;
use crate::resource::{self, Resource, ResourceProperties};
use crate::util::sync::CloseFlag;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, RANGE};
use reqwest::{Client, Response, StatusCode};
use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

/// A [`Resource`] fetched from an HTTP server.
///
/// - [`estimated_length`](Resource::estimated_length) issues a `HEAD` request
///   and reports the `Content-Length`, if any.
/// - Ranged reads issue a `GET` request with a `Range` header.
///   Servers ignoring the header are supported by slicing the full response.
pub struct HttpResource {
    url: String,
    client: Result<Client, AccessError>,
    head: OnceCell<ReadResult<HeadDetails>>,
    closed: CloseFlag,
}

#[derive(Clone, Debug)]
struct HeadDetails {
    length: Option<u64>,
    media_type: Option<MediaType>,
}

impl HttpResource {
    /// Creates a resource for `url` with default [`HttpSettings`].
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_settings(url, HttpSettings::default())
    }

    /// Creates a resource for `url` with the specified [`HttpSettings`].
    ///
    /// If the HTTP client cannot be built, the failure is reported on first read.
    pub fn with_settings(url: impl Into<String>, settings: impl Into<HttpSettings>) -> Self {
        let url = url.into();
        let client = settings.into().build_client().map_err(|error| AccessError::Network {
            source: Arc::new(error),
            url: url.clone(),
        });
        Self::from_parts(url, client)
    }

    /// Creates a resource for `url` sharing an existing [`Client`].
    pub fn with_client(url: impl Into<String>, client: Client) -> Self {
        Self::from_parts(url.into(), Ok(client))
    }

    fn from_parts(url: String, client: Result<Client, AccessError>) -> Self {
        Self {
            url,
            client,
            head: OnceCell::new(),
            closed: CloseFlag::new(),
        }
    }

    fn client(&self) -> ReadResult<&Client> {
        self.client.as_ref().map_err(|error| error.clone().into())
    }

    fn network_error(&self, error: reqwest::Error) -> ReadError {
        AccessError::Network {
            source: Arc::new(error),
            url: self.url.clone(),
        }
        .into()
    }

    fn status_error(&self, status: StatusCode) -> ReadError {
        match status {
            StatusCode::NOT_FOUND | StatusCode::GONE => AccessError::NotFound(self.url.clone()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                AccessError::Forbidden(self.url.clone())
            }
            _ => AccessError::Http {
                status: status.as_u16(),
                url: self.url.clone(),
            },
        }
        .into()
    }

    async fn head(&self) -> ReadResult<HeadDetails> {
        self.head
            .get_or_init(|| async {
                tracing::trace!(url = %self.url, "HEAD");
                let response = self
                    .client()?
                    .head(&self.url)
                    .send()
                    .await
                    .map_err(|error| self.network_error(error))?;

                let status = response.status();
                if status == StatusCode::METHOD_NOT_ALLOWED {
                    // Nothing can be learned without a GET
                    return Ok(HeadDetails {
                        length: None,
                        media_type: None,
                    });
                }
                if !status.is_success() {
                    return Err(self.status_error(status));
                }
                Ok(HeadDetails {
                    length: header_str(&response, CONTENT_LENGTH.as_str())
                        .and_then(|value| value.parse().ok()),
                    media_type: header_str(&response, CONTENT_TYPE.as_str()).map(MediaType::from),
                })
            })
            .await
            .clone()
    }

    async fn get(&self, range: Option<&Range<u64>>) -> ReadResult<Response> {
        let mut request = self.client()?.get(&self.url);

        if let Some(range) = range {
            request = request.header(RANGE, format!("bytes={}-{}", range.start, range.end - 1));
        }
        tracing::trace!(url = %self.url, ?range, "GET");

        request
            .send()
            .await
            .map_err(|error| self.network_error(error))
    }
}

#[async_trait]
impl Resource for HttpResource {
    fn href(&self) -> Option<&str> {
        Some(&self.url)
    }

    async fn properties(&self) -> ReadResult<ResourceProperties> {
        let mut properties = ResourceProperties::new();
        let media_type = match self.head().await {
            Ok(head) => head.media_type,
            // Properties are best-effort
            Err(_) => None,
        };

        if let Some(media_type) = media_type.or_else(|| MediaType::for_path(&self.url)) {
            properties.set_media_type(&media_type);
        }
        Ok(properties)
    }

    async fn estimated_length(&self) -> ReadResult<Option<u64>> {
        self.closed.ensure_open()?;
        self.head().await.map(|head| head.length)
    }

    async fn read(&self, range: Option<Range<u64>>) -> ReadResult<Bytes> {
        self.closed.ensure_open()?;

        if let Some(range) = &range
            && range.start >= range.end
        {
            return Ok(Bytes::new());
        }
        let response = self.get(range.as_ref()).await?;

        let status = response.status();
        let body = match status {
            StatusCode::RANGE_NOT_SATISFIABLE => return Ok(Bytes::new()),
            status if status.is_success() => response
                .bytes()
                .await
                .map_err(|error| self.network_error(error))?,
            status => return Err(self.status_error(status)),
        };
        self.closed.ensure_open()?;

        Ok(match range {
            // The server honored the range; guard against over-long bodies
            Some(range) if status == StatusCode::PARTIAL_CONTENT => {
                resource::slice(&body, Some(0..range.end - range.start))
            }
            // The server ignored the range and sent everything
            range => resource::slice(&body, range),
        })
    }

    async fn close(&self) {
        self.closed.close();
    }
}

fn header_str<'a>(response: &'a Response, name: &str) -> Option<&'a str> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
}

/// Settings used to build the HTTP client of an [`HttpResource`].
///
/// To create a mutable settings instance, see
/// [`HttpSettings::builder`] or [`HttpSettings::default`].
#[non_exhaustive]
#[derive(Clone, Debug)]
pub struct HttpSettings {
    /// Timeout applied to each request, including reading the body.
    ///
    /// Default: `30 seconds`
    pub timeout: Option<Duration>,
    /// The `User-Agent` header sent with each request.
    ///
    /// Default: [`None`]
    pub user_agent: Option<String>,
}

impl HttpSettings {
    /// Returns a builder to create an [`HttpSettings`] instance.
    pub fn builder() -> HttpSettingsBuilder {
        HttpSettingsBuilder(Self::default())
    }

    fn build_client(&self) -> Result<Client, reqwest::Error> {
        let mut builder = Client::builder();

        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(user_agent) = &self.user_agent {
            builder = builder.user_agent(user_agent.as_str());
        }
        builder.build()
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(30)),
            user_agent: None,
        }
    }
}

impl From<HttpSettingsBuilder> for HttpSettings {
    fn from(value: HttpSettingsBuilder) -> Self {
        value.build()
    }
}

/// Builder to construct an [`HttpSettings`] instance.
#[derive(Clone, Debug)]
pub struct HttpSettingsBuilder(HttpSettings);

impl HttpSettingsBuilder {
    /// Turn this builder into an [`HttpSettings`] instance.
    pub fn build(self) -> HttpSettings {
        self.0
    }

    /// See [`HttpSettings::timeout`].
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.0.timeout = timeout;
        self
    }

    /// See [`HttpSettings::user_agent`].
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.0.user_agent = Some(user_agent.into());
        self
    }
}
