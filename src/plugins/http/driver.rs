use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, RANGE, USER_AGENT};
use reqwest::StatusCode;
use std::time::Duration;
use url::Url;

use crate::core::buffer::ChunkBuffer;
use crate::core::error::TransferError;
use crate::core::lifecycle::TransportLifecycle;
use crate::core::model::ByteRange;
use crate::plugins::registry::{RangeTransport, TransportContext};

/// Process-wide client plus the connect timeout it was built with.
#[derive(Clone)]
pub struct SharedClient {
    client: reqwest::Client,
    connect_timeout: Option<Duration>,
}

/// Shared HTTP client for the whole process. Torn down by `main` on exit.
pub static HTTP_SUBSYSTEM: TransportLifecycle<SharedClient> = TransportLifecycle::new();

pub struct HttpDriver;

impl HttpDriver {
    pub fn new() -> Self {
        Self
    }

    /// User agent and headers go out per request; the connect timeout is baked into
    /// the shared client, so a context asking for a different one is refused.
    fn client(ctx: &TransportContext) -> Result<reqwest::Client, TransferError> {
        let shared = HTTP_SUBSYSTEM.init_once(|| {
            let mut builder = reqwest::Client::builder().redirect(reqwest::redirect::Policy::limited(10));
            if let Some(t) = ctx.connect_timeout {
                builder = builder.connect_timeout(t);
            }
            let client = builder
                .build()
                .map_err(|e| TransferError::Setup(format!("build http client: {}", e)))?;
            Ok(SharedClient { client, connect_timeout: ctx.connect_timeout })
        })?;

        if shared.connect_timeout != ctx.connect_timeout {
            return Err(TransferError::Setup(format!(
                "http client already built with connect timeout {:?}, requested {:?}",
                shared.connect_timeout, ctx.connect_timeout
            )));
        }
        Ok(shared.client)
    }

    fn build_headers(ctx: &TransportContext, range: ByteRange) -> Result<HeaderMap, TransferError> {
        let mut h = HeaderMap::new();
        let ua = HeaderValue::from_str(&ctx.user_agent)
            .map_err(|e| TransferError::Setup(format!("user agent {:?}: {}", ctx.user_agent, e)))?;
        h.insert(USER_AGENT, ua);
        for (k, v) in &ctx.headers {
            let name = HeaderName::from_bytes(k.as_bytes())
                .map_err(|e| TransferError::Setup(format!("header name {:?}: {}", k, e)))?;
            let value = HeaderValue::from_str(v)
                .map_err(|e| TransferError::Setup(format!("header value for {:?}: {}", k, e)))?;
            h.insert(name, value);
        }
        let value = HeaderValue::from_str(&range.header_value())
            .map_err(|e| TransferError::Setup(format!("range header: {}", e)))?;
        h.insert(RANGE, value);
        Ok(h)
    }
}

impl Default for HttpDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RangeTransport for HttpDriver {
    fn name(&self) -> &'static str {
        "http-driver"
    }

    fn supports(&self, url: &Url) -> bool {
        matches!(url.scheme(), "http" | "https")
    }

    async fn fetch_range(
        &self,
        url: &Url,
        ctx: &TransportContext,
        range: ByteRange,
        sink: &mut ChunkBuffer,
    ) -> Result<(), TransferError> {
        let client = Self::client(ctx)?;
        let headers = Self::build_headers(ctx, range)?;

        let resp = client
            .get(url.clone())
            .headers(headers)
            .send()
            .await
            .map_err(|e| TransferError::Request(e.to_string()))?;

        match resp.status() {
            StatusCode::PARTIAL_CONTENT => {}

            // 整个资源从 0 开始返回，超出分片范围时在读流中截停
            StatusCode::OK if range.start == 0 => {}
            StatusCode::OK => return Err(TransferError::RangeIgnored),

            StatusCode::RANGE_NOT_SATISFIABLE => {
                tracing::debug!(%range, "range starts past end of resource");
                return Ok(());
            }

            s => return Err(TransferError::Status(s.as_u16())),
        }

        let limit = range.span();
        let mut stream = resp.bytes_stream();
        while let Some(fragment) = stream.next().await {
            let fragment = fragment.map_err(|e| TransferError::Request(e.to_string()))?;
            if sink.len() as u64 + fragment.len() as u64 > limit {
                tracing::warn!(%range, buffered = sink.len(), "response runs past requested range");
                return Err(TransferError::Overflow { limit });
            }
            sink.append(&fragment)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_carry_range_and_extras() {
        let mut ctx = TransportContext::default();
        ctx.headers.insert("X-Token".to_string(), "abc".to_string());
        let h = HttpDriver::build_headers(&ctx, ByteRange { start: 100, end_inclusive: 199 }).unwrap();
        assert_eq!(h.get(RANGE).unwrap(), "bytes=100-199");
        assert_eq!(h.get(USER_AGENT).unwrap(), "multiget/0.1");
        assert_eq!(h.get("x-token").unwrap(), "abc");
    }

    #[test]
    fn test_bad_header_is_setup_error() {
        let mut ctx = TransportContext::default();
        ctx.headers.insert("Bad Header".to_string(), "v".to_string());
        let err = HttpDriver::build_headers(&ctx, ByteRange { start: 0, end_inclusive: 0 }).unwrap_err();
        assert!(matches!(err, TransferError::Setup(_)));
    }

    #[test]
    fn test_extra_header_overrides_user_agent() {
        let mut ctx = TransportContext { user_agent: "agent-a".to_string(), ..Default::default() };
        assert_eq!(
            HttpDriver::build_headers(&ctx, ByteRange { start: 0, end_inclusive: 0 })
                .unwrap()
                .get(USER_AGENT)
                .unwrap(),
            "agent-a"
        );
        ctx.headers.insert("User-Agent".to_string(), "agent-b".to_string());
        let h = HttpDriver::build_headers(&ctx, ByteRange { start: 0, end_inclusive: 0 }).unwrap();
        assert_eq!(h.get(USER_AGENT).unwrap(), "agent-b");
    }

    #[tokio::test]
    async fn test_connect_timeout_mismatch_is_setup_error() {
        let first = TransportContext::default();
        HttpDriver::client(&first).unwrap();
        HttpDriver::client(&TransportContext { user_agent: "other".to_string(), ..first.clone() }).unwrap();

        let other = TransportContext { connect_timeout: Some(Duration::from_secs(5)), ..first };
        let err = HttpDriver::client(&other).unwrap_err();
        assert!(matches!(err, TransferError::Setup(ref m) if m.contains("connect timeout")));
    }

    #[test]
    fn test_supports_only_http_schemes() {
        let d = HttpDriver::new();
        assert!(d.supports(&Url::parse("https://host/x").unwrap()));
        assert!(!d.supports(&Url::parse("file:///tmp/x").unwrap()));
    }
}
