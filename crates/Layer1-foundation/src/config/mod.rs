//! Config - 통합 설정 관리
//!
//! - `trellis.rs` - TrellisConfig 통합 설정 (글로벌 + 프로젝트 병합)

mod trellis;

pub use trellis::{
    TrellisConfig, DEFAULT_ADMIN_PREFIX, DEFAULT_MANAGER_KEY, TRELLIS_CONFIG_FILE,
};
