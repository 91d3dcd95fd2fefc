//! 분류기.
//!
//! 성능 등급, 에러 심각도, 에러 지문을 계산하는 순수 함수 모음.
//! 부수 효과 없음: 같은 입력은 항상 같은 결과를 낸다.

use sha2::{Digest, Sha256};

use crate::models::context::{ContextMap, ContextValue};
use crate::models::error_report::Severity;
use crate::models::telemetry::PerformanceTier;

/// Excellent 상한 (60fps 1프레임)
pub const EXCELLENT_MAX_MS: f64 = 16.67;
/// Good 상한 (2프레임)
pub const GOOD_MAX_MS: f64 = 33.33;
/// Fair 상한
pub const FAIR_MAX_MS: f64 = 50.0;

/// High로 분류되는 에러 종류 (이름 완전 일치)
pub const CRITICAL_ERROR_KINDS: &[&str] = &[
    "TypeError",
    "ReferenceError",
    "SyntaxError",
    "RangeError",
    "PurchaseError",
    "Panic",
];

/// High로 분류되는 메시지 부분 문자열 (소문자 비교)
const CRITICAL_MESSAGE_KEYWORDS: &[&str] = &["payment", "purchase", "crash"];

/// Medium으로 분류되는 컨텍스트 태그 값
const MEDIUM_CONTEXT_TAGS: &[&str] = &["animation", "performance", "accessibility"];

/// 스택 서명에 사용하는 최대 줄 수
const STACK_SIGNATURE_LINES: usize = 3;

/// 지문 길이 (hex 문자 수)
const FINGERPRINT_LEN: usize = 16;

/// 소요 시간 → 성능 등급 (경계값 포함)
pub fn classify_performance(duration_ms: f64) -> PerformanceTier {
    if duration_ms <= EXCELLENT_MAX_MS {
        PerformanceTier::Excellent
    } else if duration_ms <= GOOD_MAX_MS {
        PerformanceTier::Good
    } else if duration_ms <= FAIR_MAX_MS {
        PerformanceTier::Fair
    } else {
        PerformanceTier::Poor
    }
}

/// 에러 심각도 분류
///
/// 1. 컨텍스트가 치명적(`isFatal`/`critical`/`severity="critical"`)이면 Critical
/// 2. 종류가 [`CRITICAL_ERROR_KINDS`]에 있거나 메시지에 결제/구매/크래시 키워드가 있으면 High
/// 3. 컨텍스트가 애니메이션/성능/접근성 관련이면 Medium
/// 4. 그 외 Low
pub fn classify_severity(error_kind: &str, message: &str, context: &ContextMap) -> Severity {
    if is_flagged_critical(context) {
        return Severity::Critical;
    }

    let lowered = message.to_lowercase();
    if CRITICAL_ERROR_KINDS.contains(&error_kind)
        || CRITICAL_MESSAGE_KEYWORDS
            .iter()
            .any(|keyword| lowered.contains(keyword))
    {
        return Severity::High;
    }

    if is_performance_or_accessibility(context) {
        return Severity::Medium;
    }

    Severity::Low
}

fn is_flagged_critical(context: &ContextMap) -> bool {
    let flag = |key: &str| {
        context
            .get(key)
            .and_then(ContextValue::as_bool)
            .unwrap_or(false)
    };

    flag("isFatal")
        || flag("critical")
        || context.get("severity").and_then(ContextValue::as_str) == Some("critical")
}

fn is_performance_or_accessibility(context: &ContextMap) -> bool {
    if context.contains_key("performance") || context.contains_key("accessibility") {
        return true;
    }

    ["errorType", "category"].iter().any(|key| {
        context
            .get(*key)
            .and_then(ContextValue::as_str)
            .map(|tag| MEDIUM_CONTEXT_TAGS.contains(&tag))
            .unwrap_or(false)
    })
}

/// 스택 트레이스 앞 3줄에서 서명 추출
///
/// 파싱 가능한 줄은 `함수@파일:줄`로, 아니면 공백 제거한 원문 그대로 사용.
pub fn stack_signature(stack: Option<&str>) -> String {
    let Some(stack) = stack else {
        return String::new();
    };

    stack
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(STACK_SIGNATURE_LINES)
        .map(|line| parse_frame(line).unwrap_or_else(|| line.to_string()))
        .collect::<Vec<_>>()
        .join("|")
}

/// 스택 한 줄을 (함수, 파일, 줄) 형태로 파싱
///
/// 지원 형식:
/// - `at func (file:line:col)`
/// - `func@file:line:col`
/// - `at file:line:col`
fn parse_frame(line: &str) -> Option<String> {
    let line = line.strip_prefix("at ").unwrap_or(line).trim();

    if let (Some(open), true) = (line.rfind('('), line.ends_with(')')) {
        let func = line[..open].trim();
        let (file, lineno) = split_location(&line[open + 1..line.len() - 1])?;
        let func = if func.is_empty() { "<anonymous>" } else { func };
        return Some(format!("{func}@{file}:{lineno}"));
    }

    if let Some((func, location)) = line.split_once('@') {
        let (file, lineno) = split_location(location)?;
        let func = if func.is_empty() { "<anonymous>" } else { func };
        return Some(format!("{func}@{file}:{lineno}"));
    }

    let (file, lineno) = split_location(line)?;
    Some(format!("<anonymous>@{file}:{lineno}"))
}

/// `file:line[:col]` → (file, line)
fn split_location(location: &str) -> Option<(&str, u32)> {
    let mut parts = location.rsplitn(3, ':');
    let last = parts.next()?;
    let middle = parts.next()?;

    match parts.next() {
        // file:line:col
        Some(file) if middle.parse::<u32>().is_ok() && last.parse::<u32>().is_ok() => {
            Some((file, middle.parse().ok()?))
        }
        // file:line (파일 경로에 ':'가 없는 경우)
        _ => {
            let lineno = last.parse::<u32>().ok()?;
            let file = location.rsplit_once(':')?.0;
            if file.is_empty() {
                None
            } else {
                Some((file, lineno))
            }
        }
    }
}

/// 에러 지문: SHA-256(kind, message, signature) 앞 16자
pub fn fingerprint(error_kind: &str, message: &str, stack_signature: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(error_kind.as_bytes());
    hasher.update(b"\n");
    hasher.update(message.as_bytes());
    hasher.update(b"\n");
    hasher.update(stack_signature.as_bytes());

    let digest = hasher.finalize();
    let mut hex = String::with_capacity(FINGERPRINT_LEN);
    for byte in digest.iter().take(FINGERPRINT_LEN / 2) {
        hex.push_str(&format!("{byte:02x}"));
    }
    hex
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::context::context_from;

    #[test]
    fn performance_tiers() {
        assert_eq!(classify_performance(10.0), PerformanceTier::Excellent);
        assert_eq!(classify_performance(20.0), PerformanceTier::Good);
        assert_eq!(classify_performance(40.0), PerformanceTier::Fair);
        assert_eq!(classify_performance(60.0), PerformanceTier::Poor);
    }

    #[test]
    fn performance_tier_boundaries_are_inclusive() {
        assert_eq!(classify_performance(16.67), PerformanceTier::Excellent);
        assert_eq!(classify_performance(16.68), PerformanceTier::Good);
        assert_eq!(classify_performance(33.33), PerformanceTier::Good);
        assert_eq!(classify_performance(33.34), PerformanceTier::Fair);
        assert_eq!(classify_performance(50.0), PerformanceTier::Fair);
        assert_eq!(classify_performance(50.01), PerformanceTier::Poor);
        assert_eq!(classify_performance(0.0), PerformanceTier::Excellent);
    }

    #[test]
    fn type_error_is_high() {
        let severity = classify_severity("TypeError", "undefined is not a function", &ContextMap::new());
        assert_eq!(severity, Severity::High);
    }

    #[test]
    fn purchase_message_is_high() {
        let severity = classify_severity("CustomError", "purchase failed", &ContextMap::new());
        assert_eq!(severity, Severity::High);

        let severity = classify_severity("CustomError", "Payment sheet dismissed", &ContextMap::new());
        assert_eq!(severity, Severity::High);
    }

    #[test]
    fn fatal_flag_is_critical() {
        let ctx = context_from([("isFatal", true)]);
        assert_eq!(classify_severity("CustomError", "boom", &ctx), Severity::Critical);

        let ctx = context_from([("severity", "critical")]);
        assert_eq!(classify_severity("TypeError", "boom", &ctx), Severity::Critical);

        let ctx = context_from([("isFatal", false)]);
        assert_eq!(classify_severity("CustomError", "boom", &ctx), Severity::Low);
    }

    #[test]
    fn animation_and_accessibility_are_medium() {
        let ctx = context_from([("errorType", "animation")]);
        assert_eq!(classify_severity("Error", "jank", &ctx), Severity::Medium);

        let ctx = context_from([("accessibility", true)]);
        assert_eq!(classify_severity("Error", "label missing", &ctx), Severity::Medium);

        let ctx = context_from([("errorType", "network")]);
        assert_eq!(classify_severity("Error", "timeout", &ctx), Severity::Low);
    }

    #[test]
    fn kind_match_is_exact() {
        assert_eq!(
            classify_severity("typeerror", "x", &ContextMap::new()),
            Severity::Low
        );
    }

    #[test]
    fn stack_signature_parses_known_formats() {
        let stack = "TypeError: x is undefined\n    at renderPlan (VipScreen.js:42:13)\n    at commit@react.js:10:2\n    at app.bundle.js:7:1\n    at deeper (x.js:1:1)";
        let sig = stack_signature(Some(stack));
        assert_eq!(
            sig,
            "TypeError: x is undefined|renderPlan@VipScreen.js:42|commit@react.js:10"
        );
    }

    #[test]
    fn stack_signature_handles_bare_location_and_missing_stack() {
        assert_eq!(stack_signature(None), "");
        assert_eq!(
            stack_signature(Some("at src/main.rs:12:5")),
            "<anonymous>@src/main.rs:12"
        );
        assert_eq!(stack_signature(Some("  garbage line  ")), "garbage line");
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let a = fingerprint("TypeError", "boom", "f@a.js:1");
        let b = fingerprint("TypeError", "boom", "f@a.js:1");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn fingerprint_changes_with_any_input() {
        let base = fingerprint("TypeError", "boom", "f@a.js:1");
        assert_ne!(base, fingerprint("RangeError", "boom", "f@a.js:1"));
        assert_ne!(base, fingerprint("TypeError", "bang", "f@a.js:1"));
        assert_ne!(base, fingerprint("TypeError", "boom", "f@a.js:2"));
    }
}
