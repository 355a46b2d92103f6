//! 依存グラフ
//!
//! 記述子間の依存エッジからプロビジョニング順を求めます。
//!
//! - 同時にプロビジョニング可能なリソースを「ウェーブ」にまとめる
//! - ウェーブ内は宣言順（結果は常に決定的）
//! - 循環がある場合は具体的な経路（`A -> B -> A`）を返す

use crate::model::{Edge, LogicalId};
use indexmap::{IndexMap, IndexSet};
use std::collections::BTreeSet;

/// トポロジカルソートの結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologicalOrder {
    /// 平坦化したプロビジョニング順
    pub order: Vec<LogicalId>,
    /// 並列実行可能なレベル
    pub waves: Vec<Vec<LogicalId>>,
}

/// ノード（宣言順）とエッジからトポロジカル順を計算
///
/// エッジ `from -> to` は「from が to に依存する」を意味します。
/// 循環が見つかった場合は循環経路を `Err` で返します。
pub fn topological_order(
    nodes: &[LogicalId],
    edges: &BTreeSet<Edge>,
) -> Result<TopologicalOrder, Vec<LogicalId>> {
    // 依存先リスト（宣言順）
    let mut deps: IndexMap<&LogicalId, IndexSet<&LogicalId>> =
        nodes.iter().map(|n| (n, IndexSet::new())).collect();
    for edge in edges {
        if let Some(set) = deps.get_mut(&edge.from) {
            set.insert(&edge.to);
        }
    }

    let mut placed: IndexSet<&LogicalId> = IndexSet::new();
    let mut waves = Vec::new();

    while placed.len() < nodes.len() {
        let wave: Vec<&LogicalId> = nodes
            .iter()
            .filter(|n| !placed.contains(n))
            .filter(|n| {
                deps.get(n)
                    .is_some_and(|d| d.iter().all(|dep| placed.contains(dep)))
            })
            .collect();

        if wave.is_empty() {
            let remaining: Vec<&LogicalId> =
                nodes.iter().filter(|n| !placed.contains(n)).collect();
            return Err(trace_cycle(&remaining, &deps));
        }

        placed.extend(wave.iter().copied());
        waves.push(wave.into_iter().cloned().collect::<Vec<_>>());
    }

    let order = waves.iter().flatten().cloned().collect();
    Ok(TopologicalOrder { order, waves })
}

/// 未配置ノードから循環経路を1つ取り出す
///
/// 未配置ノードは必ず未配置の依存先を持つため、依存先をたどれば必ず循環に入る。
fn trace_cycle(
    remaining: &[&LogicalId],
    deps: &IndexMap<&LogicalId, IndexSet<&LogicalId>>,
) -> Vec<LogicalId> {
    let Some(&start) = remaining.first() else {
        return Vec::new();
    };

    let mut path: Vec<&LogicalId> = vec![start];
    let mut current = start;
    loop {
        let next = deps
            .get(current)
            .and_then(|d| d.iter().find(|dep| remaining.contains(*dep)))
            .copied();
        let Some(next) = next else {
            break;
        };

        if let Some(pos) = path.iter().position(|p| *p == next) {
            let mut cycle: Vec<LogicalId> = path[pos..].iter().map(|p| (*p).clone()).collect();
            cycle.push(next.clone());
            return cycle;
        }
        path.push(next);
        current = next;
    }

    path.into_iter().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<LogicalId> {
        names.iter().map(|n| LogicalId::new(*n)).collect()
    }

    fn edges(pairs: &[(&str, &str)]) -> BTreeSet<Edge> {
        pairs.iter().map(|(f, t)| Edge::new(*f, *t)).collect()
    }

    #[test]
    fn test_no_edges_single_wave() {
        let nodes = ids(&["A", "B", "C"]);
        let result = topological_order(&nodes, &BTreeSet::new()).unwrap();
        assert_eq!(result.waves.len(), 1);
        assert_eq!(result.order, nodes);
    }

    #[test]
    fn test_chain() {
        let nodes = ids(&["Alias", "Version", "Bot"]);
        let result =
            topological_order(&nodes, &edges(&[("Alias", "Version"), ("Version", "Bot")])).unwrap();
        assert_eq!(result.order, ids(&["Bot", "Version", "Alias"]));
        assert_eq!(result.waves.len(), 3);
    }

    #[test]
    fn test_waves_keep_declaration_order() {
        let nodes = ids(&["Fn", "LogGroup", "Bucket", "Role"]);
        let result = topological_order(
            &nodes,
            &edges(&[("Role", "LogGroup"), ("Role", "Bucket")]),
        )
        .unwrap();
        assert_eq!(result.waves[0], ids(&["Fn", "LogGroup", "Bucket"]));
        assert_eq!(result.waves[1], ids(&["Role"]));
    }

    #[test]
    fn test_cycle_path() {
        let nodes = ids(&["A", "B", "C"]);
        let err = topological_order(&nodes, &edges(&[("A", "B"), ("B", "C"), ("C", "A")]))
            .unwrap_err();
        assert_eq!(err, ids(&["A", "B", "C", "A"]));
    }

    #[test]
    fn test_cycle_behind_acyclic_prefix() {
        let nodes = ids(&["Root", "X", "Y"]);
        let err = topological_order(
            &nodes,
            &edges(&[("X", "Root"), ("X", "Y"), ("Y", "X")]),
        )
        .unwrap_err();
        assert_eq!(err, ids(&["X", "Y", "X"]));
    }

    #[test]
    fn test_self_loop() {
        let nodes = ids(&["A"]);
        let err = topological_order(&nodes, &edges(&[("A", "A")])).unwrap_err();
        assert_eq!(err, ids(&["A", "A"]));
    }
}
