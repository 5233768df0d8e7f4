//! Extension Events - 확장 라이프사이클 이벤트

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

// ============================================================================
// ExtensionEvent
// ============================================================================

/// 이벤트 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// 인스턴스 생성 (훅/URL 연결 완료)
    Initialized,

    /// 인스턴스 제거
    Uninitialized,

    /// 설치 부수 효과 완료
    Installed,

    /// 활성화 (레코드 저장 완료)
    Enabled,

    /// 비활성화 (레코드 저장 완료)
    Disabled,
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initialized => write!(f, "initialized"),
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Installed => write!(f, "installed"),
            Self::Enabled => write!(f, "enabled"),
            Self::Disabled => write!(f, "disabled"),
        }
    }
}

/// 확장 이벤트
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionEvent {
    pub event_type: EventType,

    /// 확장 ID
    pub extension_id: String,

    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ExtensionEvent {
    pub fn new(event_type: EventType, extension_id: impl Into<String>) -> Self {
        Self {
            event_type,
            extension_id: extension_id.into(),
            timestamp: chrono::Utc::now(),
        }
    }
}

// ============================================================================
// EventBus
// ============================================================================

/// 이벤트 버스 (발행/구독)
pub struct EventBus {
    sender: broadcast::Sender<ExtensionEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// 이벤트 발행. 구독자가 없으면 버려진다
    pub fn publish(&self, event: ExtensionEvent) {
        debug!("Extension event: {} {}", event.event_type, event.extension_id);
        let _ = self.sender.send(event);
    }

    pub fn emit(&self, event_type: EventType, extension_id: &str) {
        self.publish(ExtensionEvent::new(event_type, extension_id));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ExtensionEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
