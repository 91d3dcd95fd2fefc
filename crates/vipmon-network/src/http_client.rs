//! HTTP 수집 서버 클라이언트.
//!
//! `TelemetryCollector` + `ErrorCollector` 포트 구현.
//! Bearer API 키 헤더 주입 + 재시도 가능한 에러에 한한 exponential backoff.

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};
use vipmon_core::error::CoreError;
use vipmon_core::models::error_report::ErrorPayload;
use vipmon_core::models::telemetry::TelemetryPayload;
use vipmon_core::ports::collector::{ErrorCollector, TelemetryCollector};
use vipmon_core::DIAGNOSTICS_TARGET;

/// 기본 재시도 횟수
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Retry-After 헤더가 없을 때 기본 대기 (초)
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// 재시도 가능한 에러인지 판별
fn is_retryable(error: &CoreError) -> bool {
    matches!(
        error,
        CoreError::Network(_) | CoreError::ServiceUnavailable(_) | CoreError::RateLimit { .. }
    )
}

/// 수집 서버 HTTP 클라이언트
///
/// 엔드포인트 하나당 인스턴스 하나. 텔레메트리/에러 수집 서버에 각각 생성해 와이어링한다.
pub struct HttpCollectorClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    max_retries: u32,
}

impl HttpCollectorClient {
    /// 새 HTTP 수집 클라이언트 생성
    pub fn new(endpoint: &str, api_key: &str, timeout: Duration) -> Result<Self, CoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::Network(format!("HTTP 클라이언트 빌드 실패: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
        })
    }

    /// 재시도 횟수 설정
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// 전송 대상 엔드포인트
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// 응답 상태 코드 확인 및 에러 매핑
    async fn check_response(resp: reqwest::Response) -> Result<(), CoreError> {
        let status = resp.status();

        if status.is_success() {
            return Ok(());
        }

        let retry_after = resp
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_RETRY_AFTER_SECS);

        let text = resp.text().await.unwrap_or_else(|e| {
            warn!(target: DIAGNOSTICS_TARGET, "응답 본문 읽기 실패: {e}");
            String::new()
        });

        match status.as_u16() {
            401 | 403 => Err(CoreError::Auth(format!("API 키 거부 ({status}): {text}"))),
            429 => Err(CoreError::RateLimit {
                retry_after_secs: retry_after,
            }),
            503 => Err(CoreError::ServiceUnavailable(text)),
            _ => Err(CoreError::Internal(format!("수집 서버 에러 ({status}): {text}"))),
        }
    }

    /// JSON 본문 1회 전송
    async fn post_once<P: Serialize + Sync>(&self, payload: &P) -> Result<(), CoreError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(payload)
            .send()
            .await
            .map_err(|e| CoreError::Network(format!("수집 서버 요청 실패: {e}")))?;

        Self::check_response(resp).await
    }

    /// 재시도가 포함된 전송
    ///
    /// exponential backoff: 1s → 2s → 4s (최대 30s). 재시도 불가 에러는 즉시 반환.
    async fn post_with_retry<P: Serialize + Sync>(&self, payload: &P) -> Result<(), CoreError> {
        let mut delay = Duration::from_secs(1);
        let mut attempt = 0;

        loop {
            match self.post_once(payload).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    if !is_retryable(&e) || attempt >= self.max_retries {
                        return Err(e);
                    }

                    // RateLimit의 경우 서버 지정 대기 시간 사용
                    if let CoreError::RateLimit { retry_after_secs } = &e {
                        delay = Duration::from_secs(*retry_after_secs);
                    }

                    warn!(
                        target: DIAGNOSTICS_TARGET,
                        "전송 실패 (시도 {}/{}): {e}, {delay:?} 후 재시도",
                        attempt + 1,
                        self.max_retries + 1
                    );

                    attempt += 1;
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(Duration::from_secs(30));
                }
            }
        }
    }
}

#[async_trait]
impl TelemetryCollector for HttpCollectorClient {
    async fn send_telemetry(&self, payload: &TelemetryPayload) -> Result<(), CoreError> {
        debug!("텔레메트리 배치 전송: {} 레코드", payload.batch.len());
        self.post_with_retry(payload).await
    }
}

#[async_trait]
impl ErrorCollector for HttpCollectorClient {
    async fn send_errors(&self, payload: &ErrorPayload) -> Result<(), CoreError> {
        debug!("에러 배치 전송: {} 레코드", payload.errors.len());
        self.post_with_retry(payload).await
    }
}
