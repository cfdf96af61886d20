use reqwest::header::HeaderMap;
use reqwest::Request;

use crate::download::config::DownloadConfig;

/// 写入配置中的公共 header 和超时
pub fn apply_config(request: &mut Request, config: &DownloadConfig) {
    let header_map = request.headers_mut();
    for (header_name, header_value) in config.header_map.iter() {
        header_map.insert(header_name, header_value.clone());
    }

    *request.timeout_mut() = config.request_timeout;
}

pub fn clone_request(request: &Request) -> Request {
    let mut req = Request::new(request.method().clone(), request.url().clone());
    *req.headers_mut() = request.headers().clone();
    *req.version_mut() = request.version();
    *req.timeout_mut() = request.timeout().map(Clone::clone);

    req
}

/// 同名 header 以 `extra` 为准
pub fn merge_headers(target: &mut HeaderMap, extra: &HeaderMap) {
    for name in extra.keys() {
        target.remove(name);
    }
    for (name, value) in extra.iter() {
        target.append(name, value.clone());
    }
}
