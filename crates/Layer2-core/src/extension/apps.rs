//! AppRegistry - 프로세스의 활성 앱 목록

use parking_lot::RwLock;

/// 활성 앱 목록
///
/// 스키마 도구와 호스트는 이 목록을 보고 어떤 앱의 테이블/마이그레이션을
/// 다룰지 정한다. 같은 모듈의 확장 여러 개가 한 앱을 공유할 수 있으므로
/// 앱마다 등록 횟수를 세고, 마지막 등록이 해제될 때 목록에서 뺀다.
#[derive(Debug, Default)]
pub struct AppRegistry {
    /// (앱 이름, 등록 횟수), 처음 등록된 순서
    apps: RwLock<Vec<(String, usize)>>,
}

impl AppRegistry {
    pub fn new(base: Vec<String>) -> Self {
        let registry = Self::default();
        registry.add(&base);
        registry
    }

    pub fn add(&self, apps: &[String]) {
        let mut list = self.apps.write();
        for app in apps {
            match list.iter_mut().find(|(name, _)| name == app) {
                Some((_, count)) => *count += 1,
                None => list.push((app.clone(), 1)),
            }
        }
    }

    pub fn remove(&self, apps: &[String]) {
        let mut list = self.apps.write();
        for app in apps {
            if let Some(pos) = list.iter().position(|(name, _)| name == app) {
                list[pos].1 -= 1;
                if list[pos].1 == 0 {
                    list.remove(pos);
                }
            }
        }
    }

    pub fn contains(&self, app: &str) -> bool {
        self.apps.read().iter().any(|(name, _)| name == app)
    }

    pub fn list(&self) -> Vec<String> {
        self.apps.read().iter().map(|(name, _)| name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_remove() {
        let registry = AppRegistry::new(vec!["core".into()]);
        registry.add(&["rb_stats".into(), "core".into()]);

        assert_eq!(registry.list(), vec!["core", "rb_stats"]);

        registry.remove(&["rb_stats".into()]);
        assert!(!registry.contains("rb_stats"));
        assert!(registry.contains("core"));
    }

    #[test]
    fn test_shared_app_kept_until_last_remove() {
        let registry = AppRegistry::default();
        registry.add(&["shared".into()]);
        registry.add(&["shared".into()]);

        registry.remove(&["shared".into()]);
        assert!(registry.contains("shared"));

        registry.remove(&["shared".into()]);
        assert!(!registry.contains("shared"));

        registry.remove(&["shared".into()]);
        assert!(registry.list().is_empty());
    }
}
