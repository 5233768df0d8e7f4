//! URL 패턴 - 라우트 문자열과 이름, 핸들러 ID

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use trellis_foundation::{Error, Result};

lazy_static! {
    static ref PARAM_RE: Regex =
        Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder regex");
}

/// 라우트 패턴
///
/// `handler`는 호스트의 핸들러 테이블에서 찾는 ID이다. 테이블 자체는
/// 핸들러를 실행하지 않는다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UrlPattern {
    /// `/r/{review_id}/diff/` 형태
    pub route: String,

    /// 역방향 조회용 이름
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// 핸들러 ID
    pub handler: String,
}

impl UrlPattern {
    pub fn new(route: impl Into<String>, handler: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            name: None,
            handler: handler.into(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// 접두사를 붙인 복사본
    pub fn prefixed(&self, prefix: &str) -> Self {
        Self {
            route: join_route(prefix, &self.route),
            name: self.name.clone(),
            handler: self.handler.clone(),
        }
    }

    /// 플레이스홀더 이름 (등장 순서)
    pub fn params(&self) -> Vec<&str> {
        PARAM_RE
            .captures_iter(&self.route)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect()
    }

    /// 라우트를 매칭용 정규식으로 컴파일
    pub(crate) fn compile(&self) -> Result<Regex> {
        let mut source = String::from("^");
        let mut last = 0;

        for m in PARAM_RE.find_iter(&self.route) {
            let literal = &self.route[last..m.start()];
            check_literal(&self.route, literal)?;
            source.push_str(&regex::escape(literal));

            let name = &m.as_str()[1..m.as_str().len() - 1];
            source.push_str(&format!("(?P<{}>[^/]+)", name));
            last = m.end();
        }

        let tail = &self.route[last..];
        check_literal(&self.route, tail)?;
        source.push_str(&regex::escape(tail));
        source.push('$');

        Regex::new(&source)
            .map_err(|e| Error::InvalidInput(format!("Invalid route '{}': {}", self.route, e)))
    }

    /// 파라미터로 경로 생성
    ///
    /// 파라미터 집합이 플레이스홀더 집합과 정확히 같을 때만 성공한다.
    pub fn reverse(&self, kwargs: &HashMap<String, String>) -> Option<String> {
        let params: HashSet<&str> = self.params().into_iter().collect();
        if params.len() != kwargs.len() || !kwargs.keys().all(|k| params.contains(k.as_str())) {
            return None;
        }

        if kwargs.values().any(|v| v.is_empty() || v.contains('/')) {
            return None;
        }

        let path = PARAM_RE.replace_all(&self.route, |caps: &regex::Captures| {
            caps.get(1)
                .and_then(|m| kwargs.get(m.as_str()))
                .cloned()
                .unwrap_or_default()
        });

        Some(path.into_owned())
    }
}

fn check_literal(route: &str, literal: &str) -> Result<()> {
    if literal.contains('{') || literal.contains('}') {
        return Err(Error::InvalidInput(format!(
            "Invalid placeholder in route '{}'",
            route
        )));
    }
    Ok(())
}

/// 접두사와 라우트를 `/` 하나로 이어 붙인다
pub fn join_route(prefix: &str, route: &str) -> String {
    let mut joined = format!(
        "{}/{}",
        prefix.trim_end_matches('/'),
        route.trim_start_matches('/')
    );
    if !joined.starts_with('/') {
        joined.insert(0, '/');
    }
    joined
}
