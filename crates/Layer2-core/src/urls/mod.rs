//! # Dynamic URL table
//!
//! 확장이 런타임에 라우트를 추가/제거하는 URL 테이블.
//! 호스트는 `ExtensionManager::get_url_patterns()`가 돌려주는 테이블 하나를
//! 마운트하고, 이후의 변경은 재마운트 없이 바로 반영된다.
//!
//! 라우트는 `{name}` 형태의 플레이스홀더를 가진다:
//!
//! ```ignore
//! let table = DynamicUrlTable::new();
//! table.add_patterns(&[UrlPattern::new("/r/{review_id}/", "review.detail").with_name("review-detail")])?;
//!
//! let resolved = table.resolve("/r/42/").unwrap();
//! assert_eq!(resolved.kwargs["review_id"], "42");
//! ```

mod pattern;
mod table;

pub use pattern::{join_route, UrlPattern};
pub use table::{DynamicUrlTable, ResolvedUrl, UrlResolver};
