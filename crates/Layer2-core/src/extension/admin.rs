//! AdminSite - 확장별 관리 인터페이스

use crate::urls::UrlPattern;
use trellis_foundation::{Error, Result};

/// 확장 전용 관리 사이트
///
/// 등록된 모델마다 목록/추가/수정 라우트를 만든다. 라우트는 상대 경로이며
/// 매니저가 `<adminPrefix><id>/db/` 아래에 붙인다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminSite {
    name: String,
    models: Vec<String>,
}

impl AdminSite {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            models: Vec::new(),
        }
    }

    /// 네임스페이스
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 모델 등록
    pub fn register(&mut self, model: impl Into<String>) -> Result<()> {
        let model = model.into();
        if self.models.iter().any(|m| m.eq_ignore_ascii_case(&model)) {
            return Err(Error::InvalidInput(format!(
                "Model '{}' is already registered with admin site '{}'",
                model, self.name
            )));
        }
        self.models.push(model);
        Ok(())
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// 관리 라우트
    pub fn urls(&self) -> Vec<UrlPattern> {
        let mut patterns =
            vec![UrlPattern::new("", "admin.index").with_name(format!("{}:index", self.name))];

        for model in &self.models {
            let slug = model.to_lowercase();
            patterns.push(
                UrlPattern::new(format!("{}/", slug), "admin.changelist")
                    .with_name(format!("{}:{}_changelist", self.name, slug)),
            );
            patterns.push(
                UrlPattern::new(format!("{}/add/", slug), "admin.add")
                    .with_name(format!("{}:{}_add", self.name, slug)),
            );
            patterns.push(
                UrlPattern::new(format!("{}/{{object_id}}/", slug), "admin.change")
                    .with_name(format!("{}:{}_change", self.name, slug)),
            );
        }

        patterns
    }
}
