use std::time::Duration;

use reqwest::Url;
use reqwest::blocking::{Client, RequestBuilder, multipart};
use serde::Deserialize;
use tracing::{debug, trace};

use crate::domain::ViewerError;
use crate::service::{DataService, DatasetDescriptor, PageResult, Row, ServiceError};
use crate::upload::UploadCandidate;

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    row_count: u64,
    #[serde(default)]
    headers: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct PageResponse {
    #[serde(default)]
    data: Option<Vec<Row>>,
    #[serde(default)]
    total: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

/// `DataService` bound to the CSV viewer REST API.
pub struct HttpDataService {
    client: Client,
    base_url: Url,
}

impl HttpDataService {
    pub fn new(server_url: &str, timeout: Duration) -> Result<Self, ViewerError> {
        let base_url = parse_base_url(server_url)?;
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("csvview/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ViewerError::Client)?;
        Ok(Self { client, base_url })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ServiceError> {
        self.base_url
            .join(path)
            .map_err(|e| ServiceError::Endpoint(e.to_string()))
    }

    fn send(&self, request: RequestBuilder) -> Result<Vec<u8>, ServiceError> {
        let response = request.send()?;
        let status = response.status();
        let body = response.bytes()?;
        trace!("HTTP {status}, {} bytes", body.len());
        if status.is_success() {
            Ok(body.to_vec())
        } else {
            Err(ServiceError::Status {
                status: status.as_u16(),
                message: error_message(&body, status.canonical_reason()),
            })
        }
    }

    fn fetch_page(&self, request: RequestBuilder) -> Result<PageResult, ServiceError> {
        let body = self.send(request)?;
        decode_page(&body)
    }
}

impl DataService for HttpDataService {
    fn upload(&self, file: &UploadCandidate) -> Result<DatasetDescriptor, ServiceError> {
        let url = self.endpoint("api/upload")?;
        debug!("POST {url} <- {}", file.path.display());
        let form = multipart::Form::new()
            .file("file", &file.path)
            .map_err(|source| ServiceError::File {
                path: file.path.display().to_string(),
                source,
            })?;
        let body = self.send(self.client.post(url).multipart(form))?;
        decode_upload(&body)
    }

    fn list_page(&self, page: u64, page_size: u64) -> Result<PageResult, ServiceError> {
        let url = self.endpoint("api/data")?;
        debug!("GET {url} page={page} per_page={page_size}");
        self.fetch_page(
            self.client
                .get(url)
                .query(&[("page", page), ("per_page", page_size)]),
        )
    }

    fn search_page(
        &self,
        query_text: &str,
        page: u64,
        page_size: u64,
    ) -> Result<PageResult, ServiceError> {
        let url = self.endpoint("api/search")?;
        debug!("GET {url} q='{query_text}' page={page} per_page={page_size}");
        let page = page.to_string();
        let page_size = page_size.to_string();
        self.fetch_page(self.client.get(url).query(&[
            ("q", query_text),
            ("page", page.as_str()),
            ("per_page", page_size.as_str()),
        ]))
    }

    fn clear(&self) -> Result<(), ServiceError> {
        let url = self.endpoint("api/clear")?;
        debug!("DELETE {url}");
        self.send(self.client.delete(url)).map(|_| ())
    }
}

/// Parse the server url, making sure it ends in `/` so joins append.
fn parse_base_url(server_url: &str) -> Result<Url, ViewerError> {
    let mut normalized = server_url.trim().to_string();
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    let url = Url::parse(&normalized).map_err(|e| ViewerError::InvalidServerUrl {
        url: server_url.to_string(),
        message: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ViewerError::InvalidServerUrl {
            url: server_url.to_string(),
            message: format!("unsupported scheme '{}'", url.scheme()),
        });
    }
    Ok(url)
}

fn decode_page(body: &[u8]) -> Result<PageResult, ServiceError> {
    let page: PageResponse = serde_json::from_slice(body)?;
    Ok(PageResult {
        rows: page.data.unwrap_or_default(),
        total_records: page.total,
    })
}

fn decode_upload(body: &[u8]) -> Result<DatasetDescriptor, ServiceError> {
    let upload: UploadResponse = serde_json::from_slice(body)?;
    Ok(DatasetDescriptor {
        headers: upload.headers,
        row_count: upload.row_count,
    })
}

/// The server reports failures as `{"error": "..."}`, fall back to the status text.
fn error_message(body: &[u8], reason: Option<&str>) -> String {
    serde_json::from_slice::<ErrorResponse>(body)
        .map(|e| e.error)
        .unwrap_or_else(|_| reason.unwrap_or("unknown error").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::display_cell;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Serve one request with an empty page and hand back its request line.
    fn serve_once(listener: TcpListener) -> thread::JoinHandle<String> {
        thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut request_line = String::new();
            reader.read_line(&mut request_line).unwrap();
            let mut header = String::new();
            while reader.read_line(&mut header).unwrap() > 0 && header != "\r\n" {
                header.clear();
            }
            let body = r#"{"data": [], "total": 0}"#;
            let mut stream = stream;
            write!(
                stream,
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            )
            .unwrap();
            request_line.trim_end().to_string()
        })
    }

    fn local_service(listener: &TcpListener, timeout: Duration) -> HttpDataService {
        let addr = listener.local_addr().unwrap();
        HttpDataService::new(&format!("http://{addr}"), timeout).unwrap()
    }

    #[test]
    fn list_page_sends_page_and_per_page() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let service = local_service(&listener, Duration::from_secs(5));
        let server = serve_once(listener);

        assert_eq!(service.list_page(3, 50).unwrap(), PageResult::empty());
        assert_eq!(
            server.join().unwrap(),
            "GET /api/data?page=3&per_page=50 HTTP/1.1"
        );
    }

    #[test]
    fn search_page_encodes_query_text() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let service = local_service(&listener, Duration::from_secs(5));
        let server = serve_once(listener);

        assert_eq!(service.search_page("a b&c", 2, 50).unwrap(), PageResult::empty());
        assert_eq!(
            server.join().unwrap(),
            "GET /api/search?q=a+b%26c&page=2&per_page=50 HTTP/1.1"
        );
    }

    #[test]
    fn silent_server_times_out_as_transport_error() {
        // Connections queue in the backlog but nobody ever answers.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let service = local_service(&listener, Duration::from_millis(100));

        let started = std::time::Instant::now();
        let outcome = service.list_page(1, 50);
        assert!(matches!(outcome, Err(ServiceError::Transport(_))), "{outcome:?}");
        assert!(started.elapsed() < Duration::from_secs(5));
        drop(listener);
    }

    #[test]
    fn base_url_gets_trailing_slash() {
        let url = parse_base_url("http://localhost:8080/viewer").unwrap();
        assert_eq!(url.join("api/data").unwrap().as_str(), "http://localhost:8080/viewer/api/data");

        let url = parse_base_url("http://localhost:8080").unwrap();
        assert_eq!(url.join("api/clear").unwrap().as_str(), "http://localhost:8080/api/clear");
    }

    #[test]
    fn base_url_rejects_garbage() {
        assert!(matches!(
            parse_base_url("not a url"),
            Err(ViewerError::InvalidServerUrl { .. })
        ));
        assert!(matches!(
            parse_base_url("ftp://example.com"),
            Err(ViewerError::InvalidServerUrl { .. })
        ));
    }

    #[test]
    fn decodes_paginated_response() {
        let body = br#"{
            "data": [{"name": "alice", "age": "30"}, {"name": "bob"}],
            "total": 120, "page": 3, "per_page": 50, "headers": ["name", "age"]
        }"#;
        let page = decode_page(body).unwrap();
        assert_eq!(page.total_records, 120);
        assert_eq!(page.rows.len(), 2);
        assert_eq!(display_cell(&page.rows[1], "age"), "-");
    }

    #[test]
    fn null_data_is_an_empty_page() {
        let page = decode_page(br#"{"data": null, "total": 0, "page": 1, "per_page": 50}"#).unwrap();
        assert_eq!(page, PageResult::empty());
    }

    #[test]
    fn decodes_upload_descriptor() {
        let body = br#"{
            "message": "File uploaded successfully",
            "row_count": 120,
            "headers": ["id", "name", "email"],
            "sample_data": [{"id": "1", "name": "alice", "email": "a@x.io"}]
        }"#;
        let d = decode_upload(body).unwrap();
        assert_eq!(d.row_count, 120);
        assert_eq!(d.headers, vec!["id", "name", "email"]);
    }

    #[test]
    fn error_body_becomes_message() {
        assert_eq!(
            error_message(br#"{"error": "Failed to search data"}"#, Some("Internal Server Error")),
            "Failed to search data"
        );
        assert_eq!(error_message(b"<html>", Some("Bad Gateway")), "Bad Gateway");
    }

    #[test]
    fn malformed_page_is_a_decode_error() {
        assert!(matches!(decode_page(b"{"), Err(ServiceError::Decode(_))));
    }
}
