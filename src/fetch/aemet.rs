//! [`RecordSource`] backed by the AEMET OpenData daily climatology endpoint.
//!
//! AEMET answers a query in two steps: the first request returns a small envelope
//! (`estado`, `descripcion`, `datos`) and the actual records are downloaded from the
//! temporary URL in `datos`. Both requests pass the rate limiter.

use crate::fetch::rate_limiter::RateLimiter;
use crate::fetch::source::{RecordSource, SourceError};
use crate::types::chunk::Chunk;
use crate::types::payload::RawPayload;
use async_trait::async_trait;
use bon::bon;
use chrono::NaiveDate;
use log::{debug, info};
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

pub const AEMET_BASE_URL: &str =
    "https://opendata.aemet.es/opendata/api/valores/climatologicos/diarios/datos";
pub const API_KEY_ENV: &str = "AEMET_API_KEY";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    descripcion: Option<String>,
    estado: u16,
    #[serde(default)]
    datos: Option<String>,
}

pub struct AemetSource {
    client: Client,
    api_key: String,
    base_url: String,
}

#[bon]
impl AemetSource {
    /// Builds a source with a pooled HTTP client.
    ///
    /// ```no_run
    /// # use station_harvest::AemetSource;
    /// # use std::time::Duration;
    /// let source = AemetSource::builder()
    ///     .api_key("my-key".to_string())
    ///     .timeout(Duration::from_secs(10))
    ///     .build()
    ///     .unwrap();
    /// ```
    #[builder]
    pub fn new(
        api_key: String,
        base_url: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()
            .map_err(SourceError::ClientBuild)?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url
                .unwrap_or_else(|| AEMET_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        })
    }

    /// Reads the API key from `AEMET_API_KEY`.
    pub fn from_env() -> Result<Self, SourceError> {
        let api_key = std::env::var(API_KEY_ENV)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or(SourceError::MissingApiKey)?;
        Self::builder().api_key(api_key).build()
    }

    fn query_url(&self, chunk: &Chunk) -> String {
        format!(
            "{}/fechaini/{}/fechafin/{}/estacion/{}",
            self.base_url,
            format_bound(chunk.start, "00:00:00"),
            format_bound(chunk.end, "23:59:59"),
            chunk.station_id
        )
    }

    async fn get(&self, url: &str, gate: &RateLimiter) -> Result<String, SourceError> {
        gate.acquire().await;
        let response = self
            .client
            .get(url)
            .header("api_key", &self.api_key)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| SourceError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::HttpStatus {
                url: url.to_string(),
                status,
            });
        }

        // AEMET serves Latin-1 bodies; `text()` honours the declared charset.
        response
            .text()
            .await
            .map_err(|e| SourceError::from_reqwest(url, e))
    }
}

/// `2009-01-01T00%3A00%3A00UTC`: AEMET wants the colons percent-encoded.
fn format_bound(date: NaiveDate, time: &str) -> String {
    format!("{}T{}UTC", date.format("%Y-%m-%d"), time).replace(':', "%3A")
}

#[async_trait]
impl RecordSource for AemetSource {
    async fn fetch_records(
        &self,
        chunk: &Chunk,
        gate: &RateLimiter,
    ) -> Result<RawPayload, SourceError> {
        let url = self.query_url(chunk);
        debug!("Querying {}", url);

        let body = self.get(&url, gate).await?;
        let envelope: Envelope =
            serde_json::from_str(&body).map_err(|e| SourceError::Malformed {
                url: url.clone(),
                message: format!("unexpected envelope: {e}"),
            })?;

        match envelope.estado {
            200 => {}
            404 => {
                info!(
                    "No data for {} between {} and {}",
                    chunk.station_id, chunk.start, chunk.end
                );
                return Err(SourceError::NoData {
                    station_id: chunk.station_id.clone(),
                    start: chunk.start,
                    end: chunk.end,
                });
            }
            code => {
                return Err(match StatusCode::from_u16(code) {
                    Ok(status) => SourceError::HttpStatus { url, status },
                    Err(_) => SourceError::Malformed {
                        url,
                        message: format!(
                            "estado {code}: {}",
                            envelope.descripcion.unwrap_or_default()
                        ),
                    },
                });
            }
        }

        let datos = envelope.datos.ok_or_else(|| SourceError::Malformed {
            url: url.clone(),
            message: "envelope has no 'datos' link".to_string(),
        })?;

        let body = self.get(&datos, gate).await?;
        serde_json::from_str::<RawPayload>(&body).map_err(|e| SourceError::Malformed {
            url: datos,
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::time::Instant;

    const RECORDS: &str = r#"[{"fecha":"2009-01-01","indicativo":"0061X","tmed":"9,5","prec":"Ip"},{"fecha":"2009-01-02","indicativo":"0061X","tmed":"8,1","prec":"0,0"}]"#;

    /// Local HTTP/1.1 server answering every request with `respond(base_url, path)`.
    struct StubServer {
        base: String,
        requests: Arc<Mutex<Vec<String>>>,
    }

    impl StubServer {
        async fn start<F>(respond: F) -> Self
        where
            F: Fn(&str, &str) -> (u16, String) + Send + Sync + 'static,
        {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let base = format!("http://{}", listener.local_addr().unwrap());
            let requests = Arc::new(Mutex::new(Vec::new()));
            let (seen, root) = (requests.clone(), base.clone());
            tokio::spawn(async move {
                while let Ok((mut socket, _)) = listener.accept().await {
                    let mut head = Vec::new();
                    let mut buf = [0_u8; 1024];
                    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut buf).await {
                            Ok(0) | Err(_) => break,
                            Ok(n) => head.extend_from_slice(&buf[..n]),
                        }
                    }
                    let head = String::from_utf8_lossy(&head).to_string();
                    let path = head.split_whitespace().nth(1).unwrap_or("/").to_string();
                    let (status, body) = respond(&root, &path);
                    seen.lock().unwrap().push(head);
                    let response = format!(
                        "HTTP/1.1 {status} Stub\r\nContent-Type: application/json\r\n\
                         Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                }
            });
            Self { base, requests }
        }

        fn source(&self) -> AemetSource {
            AemetSource {
                client: Client::builder()
                    .no_proxy()
                    .timeout(Duration::from_secs(5))
                    .build()
                    .unwrap(),
                api_key: "secret".to_string(),
                base_url: format!("{}/api", self.base),
            }
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    fn envelope(estado: u16, datos: Option<String>) -> String {
        serde_json::json!({
            "descripcion": "stub",
            "estado": estado,
            "datos": datos,
        })
        .to_string()
    }

    fn chunk() -> Chunk {
        Chunk::new(
            "0061X",
            NaiveDate::from_ymd_opt(2009, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2009, 6, 30).unwrap(),
        )
    }

    async fn fetch_with<F>(respond: F) -> (Result<RawPayload, SourceError>, Vec<String>)
    where
        F: Fn(&str, &str) -> (u16, String) + Send + Sync + 'static,
    {
        let server = StubServer::start(respond).await;
        let result = server
            .source()
            .fetch_records(&chunk(), &RateLimiter::new(1000.0))
            .await;
        (result, server.requests())
    }

    #[tokio::test]
    async fn test_fetch_follows_datos_link() {
        let (result, requests) = fetch_with(|root, path| {
            if path.starts_with("/api/") {
                (200, envelope(200, Some(format!("{root}/datos/abc"))))
            } else {
                (200, RECORDS.to_string())
            }
        })
        .await;

        let payload = result.unwrap();
        assert_eq!(payload.len(), 2);
        assert_eq!(payload.records()[1]["tmed"], "8,1");
        assert_eq!(requests.len(), 2);
        assert!(requests[0].starts_with(
            "GET /api/fechaini/2009-01-01T00%3A00%3A00UTC/fechafin/2009-06-30T23%3A59%3A59UTC/estacion/0061X "
        ));
        assert!(requests[0].to_ascii_lowercase().contains("api_key: secret"));
        assert!(requests[1].starts_with("GET /datos/abc "));
    }

    #[tokio::test]
    async fn test_estado_404_is_no_data() {
        let (result, requests) = fetch_with(|_, _| (200, envelope(404, None))).await;
        let err = result.unwrap_err();
        assert!(matches!(err, SourceError::NoData { ref station_id, .. } if station_id == "0061X"), "{err:?}");
        assert!(!err.is_transient());
        assert_eq!(requests.len(), 1);
    }

    #[tokio::test]
    async fn test_estado_429_is_transient() {
        let (result, requests) = fetch_with(|_, _| (200, envelope(429, None))).await;
        let err = result.unwrap_err();
        assert!(
            matches!(err, SourceError::HttpStatus { status, .. } if status == StatusCode::TOO_MANY_REQUESTS),
            "{err:?}"
        );
        assert!(err.is_transient());
        assert_eq!(requests.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_datos_is_malformed() {
        let (result, requests) = fetch_with(|_, _| (200, envelope(200, None))).await;
        let err = result.unwrap_err();
        assert!(matches!(err, SourceError::Malformed { .. }), "{err:?}");
        assert!(!err.is_transient());
        assert_eq!(requests.len(), 1);
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let (result, _) = fetch_with(|_, _| (500, "oops".to_string())).await;
        let err = result.unwrap_err();
        assert!(
            matches!(err, SourceError::HttpStatus { status, .. } if status == StatusCode::INTERNAL_SERVER_ERROR),
            "{err:?}"
        );
        assert!(err.is_transient());

        // The records download can fail on its own too.
        let (result, requests) = fetch_with(|root, path| {
            if path.starts_with("/api/") {
                (200, envelope(200, Some(format!("{root}/datos/abc"))))
            } else {
                (503, String::new())
            }
        })
        .await;
        assert!(result.unwrap_err().is_transient());
        assert_eq!(requests.len(), 2);
    }

    #[tokio::test]
    async fn test_records_that_are_not_a_list_are_malformed() {
        let (result, _) = fetch_with(|root, path| {
            if path.starts_with("/api/") {
                (200, envelope(200, Some(format!("{root}/datos/abc"))))
            } else {
                (200, r#"{"fecha":"2009-01-01"}"#.to_string())
            }
        })
        .await;
        assert!(matches!(result.unwrap_err(), SourceError::Malformed { .. }));
    }

    #[tokio::test]
    async fn test_every_request_waits_for_the_gate() {
        let server = StubServer::start(|root, path| {
            if path.starts_with("/api/") {
                (200, envelope(200, Some(format!("{root}/datos/abc"))))
            } else {
                (200, RECORDS.to_string())
            }
        })
        .await;
        let gate = RateLimiter::new(4.0);

        let started = Instant::now();
        server.source().fetch_records(&chunk(), &gate).await.unwrap();

        // Two requests through a 4/s gate: the second waits one full interval.
        assert_eq!(server.requests().len(), 2);
        assert!(Instant::now() - started >= gate.interval());
    }

    #[test]
    fn test_query_url_format() {
        let source = AemetSource::builder()
            .api_key("k".to_string())
            .base_url("https://aemet.test/api/".to_string())
            .build()
            .unwrap();
        let chunk = Chunk::new(
            "0061X",
            NaiveDate::from_ymd_opt(2009, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2009, 6, 30).unwrap(),
        );
        assert_eq!(
            source.query_url(&chunk),
            "https://aemet.test/api/fechaini/2009-01-01T00%3A00%3A00UTC\
             /fechafin/2009-06-30T23%3A59%3A59UTC/estacion/0061X"
        );
    }

    #[test]
    fn test_envelope_decodes() {
        let envelope: Envelope = serde_json::from_str(
            r#"{"descripcion":"exito","estado":200,"datos":"https://x/y","metadatos":"https://x/m"}"#,
        )
        .unwrap();
        assert_eq!(envelope.estado, 200);
        assert_eq!(envelope.datos.as_deref(), Some("https://x/y"));

        let envelope: Envelope =
            serde_json::from_str(r#"{"descripcion":"No hay datos","estado":404}"#).unwrap();
        assert_eq!(envelope.estado, 404);
        assert!(envelope.datos.is_none());
    }
}
