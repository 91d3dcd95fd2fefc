//! VIPMON 도메인 모델.
//!
//! 파이프라인과 수집 서버 간 공유하는 데이터 구조체를 정의한다.
//! 모든 모델은 `serde` Serialize/Deserialize를 구현한다.

pub mod context;
pub mod device;
pub mod error_report;
pub mod session;
pub mod telemetry;
