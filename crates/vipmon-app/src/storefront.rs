//! 스토어프론트 데모 드라이버.
//!
//! VIP 구독 화면 사용 흐름(화면 진입, 탭 전환, 캐릭터 카드, 요금제 선택, 구매)을
//! 흉내 내며 두 파이프라인의 공개 API를 호출한다. 실패는 결정적으로 발생한다.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{error, info};
use vipmon_core::error::CoreError;
use vipmon_core::models::error_report::ErrorInput;
use vipmon_monitor::error_monitor::ErrorMonitor;
use vipmon_monitor::telemetry::AnimationTelemetry;

/// 요금제 목록
const PLANS: &[&str] = &["monthly", "yearly", "lifetime"];

/// 캐릭터 카드 목록
const CHARACTERS: &[&str] = &["luna", "kai", "mira", "oto"];

/// 라운드 사이 대기
const ROUND_PAUSE: Duration = Duration::from_millis(200);

/// 구매 시뮬레이션 실패
#[derive(Debug, Error)]
pub enum PurchaseError {
    #[error("purchase declined by store for plan {0}")]
    Declined(String),
}

/// 결정적 구매 시뮬레이터 (`fail_every`번째 시도마다 실패)
pub struct PurchaseSimulator {
    attempts: u32,
    fail_every: u32,
}

impl PurchaseSimulator {
    pub fn new(fail_every: u32) -> Self {
        Self {
            attempts: 0,
            fail_every: fail_every.max(1),
        }
    }

    pub fn purchase(&mut self, plan_id: &str) -> Result<(), PurchaseError> {
        self.attempts += 1;
        if self.attempts % self.fail_every == 0 {
            return Err(PurchaseError::Declined(plan_id.to_string()));
        }
        Ok(())
    }
}

/// 데모 실행. 종료 신호를 받거나 모든 라운드를 마치면 반환
///
/// 마지막에 남은 텔레메트리를 전송하며, 그 실패는 호출자에게 돌려준다.
pub async fn run(
    telemetry: Arc<AnimationTelemetry>,
    errors: Arc<ErrorMonitor>,
    rounds: u32,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<(), CoreError> {
    let mut purchases = PurchaseSimulator::new(3);

    for round in 0..rounds {
        if *shutdown_rx.borrow() {
            break;
        }
        info!("스토어프론트 라운드 {}/{rounds}", round + 1);

        // 화면 진입
        let screen = telemetry.track_screen_entrance("vip_home");
        tokio::time::sleep(Duration::from_millis(12 + u64::from(round % 4) * 9)).await;
        telemetry.end_tracking(&screen, true, 0);

        // 탭 전환 (자동 종료)
        telemetry.track_tab_switch("characters", "vip");

        // 캐릭터 카드 목록
        for (index, character) in CHARACTERS.iter().enumerate() {
            let card = telemetry.track_character_card(character, index as u32);
            if (round as usize + index) % 5 == 0 {
                telemetry.record_frame_drop(&card);
            }
            tokio::time::sleep(Duration::from_millis(8)).await;
            telemetry.end_tracking(&card, true, 0);
        }

        // 요금제 선택 → 구매
        let plan = PLANS[round as usize % PLANS.len()];
        telemetry.track_plan_selection(plan);
        let button = telemetry.track_purchase_button(plan);

        let modal = telemetry.track_modal("purchase_confirm");
        tokio::time::sleep(Duration::from_millis(30)).await;

        match purchases.purchase(plan) {
            Ok(()) => {
                telemetry.end_tracking(&button, true, 0);
                telemetry.end_tracking(&modal, true, 0);
            }
            Err(e) => {
                telemetry.end_tracking(&button, false, 0);
                telemetry.end_tracking(&modal, false, 1);
                errors
                    .log_purchase_error(ErrorInput::from_error(&e), plan)
                    .await;
            }
        }

        if round % 5 == 4 {
            errors
                .log_network_error(
                    ErrorInput::new("FetchError", "plan catalog request timed out"),
                    "/v1/plans",
                    Some(504),
                )
                .await;
        }
        if round == 1 {
            // 콘솔 에러 가로채기 확인용
            error!(target: "storefront::render", screen = "vip_home", "배너 이미지 로드 실패");
        }

        tokio::select! {
            _ = tokio::time::sleep(ROUND_PAUSE) => {}
            _ = shutdown_rx.changed() => {}
        }
    }

    let sent = telemetry.flush().await?;
    info!("스토어프론트 데모 종료 (텔레메트리 {sent}개 전송)");
    Ok(())
}
