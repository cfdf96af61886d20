//!
//! # HTTP 客户端抽象
//! 下载流程只依赖 [`HttpClient`]，不直接创建底层连接，便于测试时替换
//!

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method, Request, Response};
use url::Url;

use crate::download::util::merge_headers;

#[async_trait]
pub trait HttpClient: Send + Sync + 'static {
    /// 构造请求，不发送
    fn generate_request(&self, method: Method, url: &str, body: Option<Bytes>) -> Result<Request>;

    /// 发送请求，`extra_headers` 会覆盖请求上的同名 header
    async fn execute(&self, request: Request, extra_headers: Option<&HeaderMap>) -> Result<Response>;
}

#[async_trait]
impl<T: HttpClient> HttpClient for Arc<T> {
    fn generate_request(&self, method: Method, url: &str, body: Option<Bytes>) -> Result<Request> {
        (**self).generate_request(method, url, body)
    }

    async fn execute(&self, request: Request, extra_headers: Option<&HeaderMap>) -> Result<Response> {
        (**self).execute(request, extra_headers).await
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReqwestClient {
    // Client 内部拥有连接池且由 Arc 包裹，clone 复用即可
    client: Client,
}

impl ReqwestClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    fn generate_request(&self, method: Method, url: &str, body: Option<Bytes>) -> Result<Request> {
        let url = Url::parse(url).with_context(|| format!("Invalid url: {}", url))?;
        let mut request = Request::new(method, url);
        if let Some(body) = body {
            *request.body_mut() = Some(body.into());
        }

        Ok(request)
    }

    async fn execute(&self, mut request: Request, extra_headers: Option<&HeaderMap>) -> Result<Response> {
        if let Some(extra_headers) = extra_headers {
            merge_headers(request.headers_mut(), extra_headers);
        }

        let url = request.url().clone();
        self.client
            .execute(request)
            .await
            .with_context(|| format!("Send {} request failed", url))
    }
}
