//! Registration Record - 확장별 영속 상태
//!
//! 확장 ID 하나당 레코드 하나. 매니저는 레코드를 삭제하지 않고
//! enabled/installed 플래그만 바꾼다.

use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 등록된 확장 레코드
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredExtension {
    /// 행 ID (저장 전에는 0)
    pub id: i64,

    /// 확장 ID (모듈 경로 + 클래스 이름)
    pub class_name: String,

    /// 사람이 읽는 이름 (배포 패키지 이름)
    pub name: String,

    /// 활성화 여부
    pub enabled: bool,

    /// 설치 (데이터/스키마) 완료 여부
    pub installed: bool,

    /// 확장별 설정
    #[serde(default)]
    pub settings: Value,
}

impl RegisteredExtension {
    pub fn new(class_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: 0,
            class_name: class_name.into(),
            name: name.into(),
            enabled: false,
            installed: false,
            settings: Value::Object(Default::default()),
        }
    }
}

/// Registration Record 저장소
///
/// 여러 프로세스가 동시에 발견 과정을 돌려도 `get_or_create_registration`은
/// 레코드를 하나만 만들어야 한다.
pub trait RegistrationStore: Send + Sync {
    /// 모든 레코드
    fn all_registrations(&self) -> Result<Vec<RegisteredExtension>>;

    /// ID로 레코드 조회
    fn find_registration(&self, class_name: &str) -> Result<Option<RegisteredExtension>>;

    /// 조회 후 없으면 생성. 두 번째 값은 새로 만들었는지 여부
    fn get_or_create_registration(
        &self,
        class_name: &str,
        name: &str,
    ) -> Result<(RegisteredExtension, bool)>;

    /// 레코드 저장
    fn save_registration(&self, registration: &RegisteredExtension) -> Result<()>;
}
