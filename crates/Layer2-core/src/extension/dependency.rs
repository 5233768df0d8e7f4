//! 요구 관계 그래프 순회
//!
//! 활성화는 요구 대상이 먼저, 비활성화는 의존하는 쪽이 먼저 처리된다.

use std::collections::HashSet;
use trellis_foundation::{Error, Result};

/// 활성화 순서 (요구 대상 먼저, `root`는 마지막)
///
/// `requirements`가 `None`을 돌려주면 알 수 없는 확장이다. 순환이 있으면
/// 순환 경로와 함께 `CyclicDependency`를 돌려준다.
pub(crate) fn enable_order<F>(root: &str, requirements: F) -> Result<Vec<String>>
where
    F: Fn(&str) -> Option<Vec<String>>,
{
    let mut order = Vec::new();
    let mut done = HashSet::new();
    let mut path = Vec::new();

    visit(root, &requirements, &mut path, &mut done, &mut order)?;
    Ok(order)
}

fn visit<F>(
    id: &str,
    requirements: &F,
    path: &mut Vec<String>,
    done: &mut HashSet<String>,
    order: &mut Vec<String>,
) -> Result<()>
where
    F: Fn(&str) -> Option<Vec<String>>,
{
    if done.contains(id) {
        return Ok(());
    }

    if let Some(start) = path.iter().position(|p| p == id) {
        let mut cycle = path[start..].to_vec();
        cycle.push(id.to_string());
        return Err(Error::CyclicDependency(cycle));
    }

    let reqs = requirements(id).ok_or_else(|| Error::UnknownExtension(id.to_string()))?;

    path.push(id.to_string());
    for req in &reqs {
        visit(req, requirements, path, done, order)?;
    }
    path.pop();

    done.insert(id.to_string());
    order.push(id.to_string());
    Ok(())
}

/// 비활성화 순서 (가장 먼 의존자 먼저, `root`는 마지막)
pub(crate) fn disable_order<F>(root: &str, dependents: F) -> Vec<String>
where
    F: Fn(&str) -> Vec<String>,
{
    let mut order = Vec::new();
    let mut seen = HashSet::new();
    collect_dependents(root, &dependents, &mut seen, &mut order);
    order
}

fn collect_dependents<F>(id: &str, dependents: &F, seen: &mut HashSet<String>, order: &mut Vec<String>)
where
    F: Fn(&str) -> Vec<String>,
{
    if !seen.insert(id.to_string()) {
        return;
    }

    for dependent in dependents(id) {
        collect_dependents(&dependent, dependents, seen, order);
    }
    order.push(id.to_string());
}
