//! 해시 태그
//!
//! 키에서 실제로 해시할 부분(유효 키)을 뽑아냅니다. 같은 태그를 가진 키는
//! 같은 샤드에 놓입니다.

use std::fmt;
use std::sync::Arc;

use regex::Regex;

use super::super::error::{ShardError, ShardResult};

/// 기본 태그 패턴 (첫 `{...}` 태그)
pub const DEFAULT_TAG_PATTERN: &str = r"\{(.+?)\}";

type TagFn = dyn for<'a> Fn(&'a str) -> &'a str + Send + Sync;

/// 해시 태그 추출 방식
#[derive(Clone, Default)]
pub enum KeyTag {
    /// 태그 없음 (키 전체 사용)
    #[default]
    None,
    /// 첫 `{` 와 그 뒤 첫 `}` 사이 (비어 있지 않을 때만)
    Braces,
    /// 정규식 첫 번째 캡처 그룹
    Pattern(Regex),
    /// 사용자 함수
    Custom(Arc<TagFn>),
}

impl KeyTag {
    /// 정규식 패턴으로 생성
    pub fn pattern(pattern: &str) -> ShardResult<Self> {
        Regex::new(pattern)
            .map(Self::Pattern)
            .map_err(|e| ShardError::configuration(format!("Invalid key tag pattern: {}", e)))
    }

    /// 기본 태그 패턴 (`\{(.+?)\}`, 첫 태그 사용)
    pub fn default_pattern() -> Self {
        match Regex::new(DEFAULT_TAG_PATTERN) {
            Ok(re) => Self::Pattern(re),
            // 상수 패턴은 항상 유효
            Err(_) => Self::Braces,
        }
    }

    /// 사용자 함수로 생성
    pub fn custom<F>(f: F) -> Self
    where
        F: for<'a> Fn(&'a str) -> &'a str + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    /// 유효 키 추출
    ///
    /// 태그가 없거나 매칭되지 않으면 키 전체를 돌려줍니다.
    pub fn effective_key<'a>(&self, key: &'a str) -> &'a str {
        match self {
            Self::None => key,
            Self::Braces => braces_tag(key).unwrap_or(key),
            Self::Pattern(re) => re
                .captures(key)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str())
                .unwrap_or(key),
            Self::Custom(f) => f(key),
        }
    }
}

fn braces_tag(key: &str) -> Option<&str> {
    let start = key.find('{')? + 1;
    let len = key[start..].find('}')?;
    if len == 0 {
        return None;
    }
    Some(&key[start..start + len])
}

impl fmt::Debug for KeyTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Braces => f.write_str("Braces"),
            Self::Pattern(re) => f.debug_tuple("Pattern").field(&re.as_str()).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}
