//! 요청 컨텍스트 - 템플릿 훅과 미들웨어가 보는 현재 요청

use serde_json::Value;
use std::collections::HashMap;

/// 현재 요청 정보
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// 마운트 지점 기준 현재 경로
    pub path_info: String,

    /// URL 해석 시 캡처된 파라미터
    pub url_kwargs: HashMap<String, String>,

    /// 미들웨어가 남기는 임의 데이터
    pub attributes: HashMap<String, Value>,
}

impl RequestContext {
    pub fn new(path_info: impl Into<String>) -> Self {
        Self {
            path_info: path_info.into(),
            ..Default::default()
        }
    }

    /// 캡처된 파라미터 추가
    pub fn with_kwarg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.url_kwargs.insert(key.into(), value.into());
        self
    }
}
