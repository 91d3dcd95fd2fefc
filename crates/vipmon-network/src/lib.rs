//! # vipmon-network
//!
//! 수집 서버 네트워크 어댑터.
//! 텔레메트리/에러 배치를 Bearer 인증 HTTP POST로 전송하며,
//! 개발 환경에서는 네트워크 대신 콘솔(tracing)로 출력한다.
//!
//! ## 모듈
//!
//! - `http_client`: `TelemetryCollector` + `ErrorCollector` HTTP 구현 (reqwest)
//! - `console`: 개발용 콘솔 전송
//! - `batch_uploader`: 제한 큐 + 재삽입 + 중복 flush 방지 배치 업로더

pub mod batch_uploader;
pub mod console;
pub mod http_client;
