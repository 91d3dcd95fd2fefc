//! 컨텍스트 속성 맵.
//!
//! 호출자가 이벤트/에러에 붙이는 key-value 속성.
//! 허용 값은 문자열, 숫자, 불리언, 1단계 중첩 맵으로 제한된다.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 중첩 맵 내부 값 (더 이상 중첩 불가)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlatValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

/// 컨텍스트 값
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContextValue {
    Bool(bool),
    Number(f64),
    Text(String),
    Map(BTreeMap<String, FlatValue>),
}

/// 컨텍스트 속성 맵 (키 순서 고정)
pub type ContextMap = BTreeMap<String, ContextValue>;

impl ContextValue {
    /// 불리언 값이면 반환
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ContextValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// 문자열 값이면 반환
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ContextValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl From<&str> for ContextValue {
    fn from(value: &str) -> Self {
        ContextValue::Text(value.to_string())
    }
}

impl From<String> for ContextValue {
    fn from(value: String) -> Self {
        ContextValue::Text(value)
    }
}

impl From<bool> for ContextValue {
    fn from(value: bool) -> Self {
        ContextValue::Bool(value)
    }
}

impl From<f64> for ContextValue {
    fn from(value: f64) -> Self {
        ContextValue::Number(value)
    }
}

impl From<i64> for ContextValue {
    fn from(value: i64) -> Self {
        ContextValue::Number(value as f64)
    }
}

impl From<u32> for ContextValue {
    fn from(value: u32) -> Self {
        ContextValue::Number(f64::from(value))
    }
}

impl From<u16> for ContextValue {
    fn from(value: u16) -> Self {
        ContextValue::Number(f64::from(value))
    }
}

impl From<BTreeMap<String, FlatValue>> for ContextValue {
    fn from(value: BTreeMap<String, FlatValue>) -> Self {
        ContextValue::Map(value)
    }
}

/// (키, 값) 목록으로 컨텍스트 맵 생성
pub fn context_from<K, V, I>(pairs: I) -> ContextMap
where
    K: Into<String>,
    V: Into<ContextValue>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
