//! 测试用的 [`HttpClient`]，从内存中的数据响应 Range 请求

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_TYPE, RANGE};
use reqwest::{Method, Request, Response, StatusCode};
use url::Url;

use crate::download::client::HttpClient;
use crate::download::util::merge_headers;

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub headers: HeaderMap,
}

impl RecordedRequest {
    pub fn range(&self) -> Option<String> {
        self.headers
            .get(RANGE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    }
}

pub struct FakeClient {
    resource: Vec<u8>,
    probe_headers: Vec<(String, String)>,
    probe_fails: bool,
    generate_fails: bool,
    // 忽略 Range，总是返回 200 和完整数据
    ignores_range: bool,
    chunk_status: HashMap<u64, StatusCode>,
    transient_failures: Mutex<HashMap<u64, u32>>,
    // 按 chunk 下标倒序完成
    reverse_completion: Option<u64>,
    delay: Duration,
    requests: Mutex<Vec<RecordedRequest>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeClient {
    pub fn new(resource: Vec<u8>) -> Self {
        let probe_headers = vec![
            (ACCEPT_RANGES.to_string(), "bytes".to_string()),
            (CONTENT_LENGTH.to_string(), resource.len().to_string()),
            (CONTENT_TYPE.to_string(), "application/octet-stream".to_string()),
        ];

        Self {
            resource,
            probe_headers,
            probe_fails: false,
            generate_fails: false,
            ignores_range: false,
            chunk_status: HashMap::new(),
            transient_failures: Mutex::new(HashMap::new()),
            reverse_completion: None,
            delay: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_probe_header(mut self, name: &str, value: &str) -> Self {
        self.probe_headers.retain(|(header, _)| !header.eq_ignore_ascii_case(name));
        self.probe_headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn without_probe_header(mut self, name: &str) -> Self {
        self.probe_headers.retain(|(header, _)| !header.eq_ignore_ascii_case(name));
        self
    }

    pub fn fail_probe(mut self) -> Self {
        self.probe_fails = true;
        self
    }

    pub fn fail_generate(mut self) -> Self {
        self.generate_fails = true;
        self
    }

    pub fn ignore_range(mut self) -> Self {
        self.ignores_range = true;
        self
    }

    /// 起点为 `start` 的 range 请求固定返回 `status`
    pub fn with_chunk_status(mut self, start: u64, status: StatusCode) -> Self {
        self.chunk_status.insert(start, status);
        self
    }

    /// 起点为 `start` 的 range 请求前 `times` 次返回传输错误
    pub fn with_transient_failures(self, start: u64, times: u32) -> Self {
        self.transient_failures.lock().insert(start, times);
        self
    }

    pub fn with_reverse_completion(mut self, chunk_size: u64) -> Self {
        self.reverse_completion = Some(chunk_size);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    pub fn ranges(&self) -> Vec<String> {
        self.requests()
            .iter()
            .filter(|request| request.method == Method::GET)
            .filter_map(RecordedRequest::range)
            .collect()
    }

    pub fn content_length(&self) -> u64 {
        self.resource.len() as u64
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn response(status: StatusCode, headers: &[(String, String)], body: Vec<u8>) -> Response {
        let mut builder = http::Response::builder().status(status);
        for (name, value) in headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        Response::from(builder.body(body).unwrap())
    }

    fn parse_range(request: &Request) -> Result<(u64, u64)> {
        let value = request
            .headers()
            .get(RANGE)
            .ok_or_else(|| anyhow!("missing range header"))?
            .to_str()?;
        let (start, end) = value
            .strip_prefix("bytes=")
            .and_then(|range| range.split_once('-'))
            .ok_or_else(|| anyhow!("malformed range header: {}", value))?;

        Ok((start.parse()?, end.parse()?))
    }

    fn completion_delay(&self, start: u64) -> Duration {
        match self.reverse_completion {
            Some(chunk_size) => {
                let index = start.saturating_sub(1) / chunk_size;
                let count = (self.resource.len() as u64).div_ceil(chunk_size).max(1);
                self.delay + Duration::from_millis(15 * count.saturating_sub(index))
            }
            None => self.delay,
        }
    }

    fn slice(&self, start: u64, end: u64) -> Vec<u8> {
        let len = self.resource.len() as u64;
        if start >= len {
            return Vec::new();
        }

        let end = end.min(len - 1);
        self.resource[start as usize..=end as usize].to_vec()
    }
}

#[async_trait]
impl HttpClient for FakeClient {
    fn generate_request(&self, method: Method, url: &str, body: Option<Bytes>) -> Result<Request> {
        if self.generate_fails {
            return Err(anyhow!("request generation failed"));
        }

        let mut request = Request::new(method, Url::parse(url)?);
        if let Some(body) = body {
            *request.body_mut() = Some(body.into());
        }

        Ok(request)
    }

    async fn execute(&self, mut request: Request, extra_headers: Option<&HeaderMap>) -> Result<Response> {
        if let Some(extra_headers) = extra_headers {
            merge_headers(request.headers_mut(), extra_headers);
        }
        self.requests.lock().push(RecordedRequest {
            method: request.method().clone(),
            headers: request.headers().clone(),
        });

        if request.method() == Method::HEAD {
            if self.probe_fails {
                return Err(anyhow!("request failed... "));
            }
            return Ok(Self::response(StatusCode::OK, &self.probe_headers, Vec::new()));
        }

        let (start, end) = Self::parse_range(&request)?;

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        let delay = self.completion_delay(start);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let transient = {
            let mut failures = self.transient_failures.lock();
            match failures.get_mut(&start) {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    true
                }
                _ => false,
            }
        };
        if transient {
            return Err(anyhow!("connection reset"));
        }

        if let Some(status) = self.chunk_status.get(&start) {
            return Ok(Self::response(*status, &[], Vec::new()));
        }

        if self.ignores_range {
            return Ok(Self::response(StatusCode::OK, &[], self.resource.clone()));
        }

        Ok(Self::response(StatusCode::PARTIAL_CONTENT, &[], self.slice(start, end)))
    }
}

pub fn resource(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
