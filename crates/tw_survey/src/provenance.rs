// crates/tw_survey/src/provenance.rs
//! 出处解析
//!
//! 新测量的足迹与已处理足迹的精确相交面积超过阈值时，
//! 该历史测量成为候选前序。排序键：
//!
//! 1. `processed_index` 降序（最近处理的优先）
//! 2. 相交面积降序
//!
//! 即时间新近优先于重叠面积。排名第一的前序作为"基准"标签；
//! 没有任何候选时，基准为构筑物原始地形。

use crate::record::{BaseReference, Footprint};
use serde::{Deserialize, Serialize};
use tracing::debug;
use tw_geo::FootprintIndex;

/// 历史足迹
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// 足迹
    pub footprint: Footprint,
    /// 处理顺序（从 0 开始）
    pub processed_index: usize,
}

/// 出处边
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceEdge {
    /// 新测量 ID
    pub new_id: String,
    /// 前序测量 ID
    pub predecessor_id: String,
    /// 相交面积 [m²]
    pub overlap_area: f64,
    /// 排名（1 为最高）
    pub rank: usize,
}

/// 出处解析结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    /// 按排名排列的全部显著重叠
    pub edges: Vec<ProvenanceEdge>,
}

impl Provenance {
    /// 排名最高的前序
    pub fn predecessor(&self) -> Option<&ProvenanceEdge> {
        self.edges.first()
    }

    /// 基准来源
    pub fn base_reference(&self) -> BaseReference {
        match self.predecessor() {
            Some(edge) => BaseReference::Predecessor(edge.predecessor_id.clone()),
            None => BaseReference::Original,
        }
    }
}

/// 出处解析器
#[derive(Debug, Clone)]
pub struct ProvenanceResolver {
    min_overlap_area: f64,
}

impl Default for ProvenanceResolver {
    fn default() -> Self {
        Self::new(10.0)
    }
}

impl ProvenanceResolver {
    /// 以最小相交面积 [m²] 创建
    pub fn new(min_overlap_area: f64) -> Self {
        Self { min_overlap_area }
    }

    /// 最小相交面积
    pub fn min_overlap_area(&self) -> f64 {
        self.min_overlap_area
    }

    /// 解析新足迹的前序
    pub fn resolve(&self, new_footprint: &Footprint, history: &[HistoryEntry]) -> Provenance {
        if history.is_empty() {
            return Provenance::default();
        }

        let index = FootprintIndex::bulk_load(
            history
                .iter()
                .enumerate()
                .map(|(i, entry)| (entry.footprint.polygon.bbox(), i))
                .collect(),
        );

        let mut candidates: Vec<(&HistoryEntry, f64)> = index
            .query_intersecting(&new_footprint.polygon.bbox())
            .into_iter()
            .map(|&i| &history[i])
            .filter_map(|entry| {
                let area = new_footprint
                    .polygon
                    .intersection_area(&entry.footprint.polygon);
                (area > self.min_overlap_area).then_some((entry, area))
            })
            .collect();

        candidates.sort_by(|(a, area_a), (b, area_b)| {
            b.processed_index
                .cmp(&a.processed_index)
                .then(area_b.total_cmp(area_a))
        });

        let edges: Vec<ProvenanceEdge> = candidates
            .into_iter()
            .enumerate()
            .map(|(i, (entry, area))| ProvenanceEdge {
                new_id: new_footprint.survey_id.clone(),
                predecessor_id: entry.footprint.survey_id.clone(),
                overlap_area: area,
                rank: i + 1,
            })
            .collect();

        debug!(
            survey = %new_footprint.survey_id,
            predecessors = edges.len(),
            "出处解析完成"
        );
        Provenance { edges }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tw_geo::Polygon;

    fn footprint(id: &str, polygon: Polygon) -> Footprint {
        Footprint {
            survey_id: id.into(),
            structure: "MP".into(),
            sector: None,
            polygon,
            centerline: None,
        }
    }

    fn entry(id: &str, polygon: Polygon, processed_index: usize) -> HistoryEntry {
        HistoryEntry {
            footprint: footprint(id, polygon),
            processed_index,
        }
    }

    #[test]
    fn test_no_history_means_original() {
        let new = footprint("C", Polygon::rectangle(0.0, 0.0, 10.0, 10.0).unwrap());
        let provenance = ProvenanceResolver::default().resolve(&new, &[]);
        assert!(provenance.edges.is_empty());
        assert_eq!(provenance.base_reference(), BaseReference::Original);
    }

    #[test]
    fn test_threshold_is_strict() {
        // 相交恰为 10 m²，不超过阈值
        let history = vec![entry("A", Polygon::rectangle(0.0, 0.0, 10.0, 1.0).unwrap(), 0)];
        let new = footprint("B", Polygon::rectangle(0.0, 0.0, 20.0, 20.0).unwrap());
        let provenance = ProvenanceResolver::default().resolve(&new, &history);
        assert!(provenance.predecessor().is_none());
    }

    #[test]
    fn test_area_breaks_ties_within_same_index() {
        let history = vec![
            entry("small", Polygon::rectangle(0.0, 0.0, 4.0, 4.0).unwrap(), 3),
            entry("large", Polygon::rectangle(0.0, 0.0, 8.0, 8.0).unwrap(), 3),
        ];
        let new = footprint("N", Polygon::rectangle(0.0, 0.0, 10.0, 10.0).unwrap());
        let provenance = ProvenanceResolver::default().resolve(&new, &history);
        assert_eq!(provenance.edges[0].predecessor_id, "large");
        assert_eq!(provenance.edges[0].rank, 1);
        assert_eq!(provenance.edges[1].rank, 2);
    }
}
