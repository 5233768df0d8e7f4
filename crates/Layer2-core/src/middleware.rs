//! ExtensionsMiddleware - 요청마다 확장 상태를 최신으로 유지
//!
//! 호스트의 요청 처리 앞단에 둔다. 다른 프로세스가 확장 상태를 바꿨으면
//! 다시 로드하고, 해석된 URL 파라미터를 요청에 남긴 뒤 확장 미들웨어 체인을
//! 실행한다.

use crate::extension::ExtensionManager;
use crate::request::RequestContext;
use std::sync::Arc;
use tracing::debug;
use trellis_foundation::Result;

pub struct ExtensionsMiddleware {
    manager: Arc<ExtensionManager>,
}

impl ExtensionsMiddleware {
    pub fn new(manager: Arc<ExtensionManager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Arc<ExtensionManager> {
        &self.manager
    }

    /// 요청 처리
    pub async fn process_request(&self, request: &mut RequestContext) -> Result<()> {
        if self.manager.is_expired().await {
            debug!("Extension state expired; reloading");
            self.manager.load(false).await?;
        }

        if request.url_kwargs.is_empty() {
            if let Some(resolved) = self.manager.get_url_patterns().resolve(&request.path_info) {
                request.url_kwargs = resolved.kwargs;
            }
        }

        for middleware in self.manager.middleware().await {
            middleware.process_request(request)?;
        }

        Ok(())
    }
}
