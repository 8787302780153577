// crates/tw_survey/tests/provenance_ranking.rs
//! 出处排名：时间新近优先于重叠面积
//!
//! A = [0,10]x[0,10]（第 1 个处理），B = [5,15]x[0,10]（第 2 个处理，与 A 重叠 50 m²）。

use tw_geo::Polygon;
use tw_survey::{BaseReference, Footprint, HistoryEntry, ProvenanceResolver};

fn footprint(id: &str, polygon: Polygon) -> Footprint {
    Footprint {
        survey_id: id.into(),
        structure: "MP".into(),
        sector: Some("SECTOR 1".into()),
        polygon,
        centerline: None,
    }
}

fn rect(x0: f64, x1: f64) -> Polygon {
    Polygon::rectangle(x0, 0.0, x1, 10.0).unwrap()
}

fn history() -> Vec<HistoryEntry> {
    vec![
        HistoryEntry {
            footprint: footprint("A", rect(0.0, 10.0)),
            processed_index: 0,
        },
        HistoryEntry {
            footprint: footprint("B", rect(5.0, 15.0)),
            processed_index: 1,
        },
    ]
}

fn overlaps(c: &Polygon, history: &[HistoryEntry]) -> (f64, f64) {
    (
        c.intersection_area(&history[0].footprint.polygon),
        c.intersection_area(&history[1].footprint.polygon),
    )
}

#[test]
fn small_overlap_with_older_is_ignored() {
    let history = history();
    let c = rect(9.5, 12.5);
    let (a, b) = overlaps(&c, &history);
    assert!((a - 5.0).abs() < 1e-9);
    assert!((b - 30.0).abs() < 1e-9);

    let provenance = ProvenanceResolver::default().resolve(&footprint("C", c), &history);
    assert_eq!(provenance.edges.len(), 1);
    assert_eq!(provenance.base_reference(), BaseReference::Predecessor("B".into()));
}

#[test]
fn recency_wins_over_area() {
    let history = history();
    let c = rect(0.0, 8.0);
    let (a, b) = overlaps(&c, &history);
    assert!((a - 80.0).abs() < 1e-9);
    assert!((b - 30.0).abs() < 1e-9);

    let provenance = ProvenanceResolver::default().resolve(&footprint("C", c), &history);
    assert_eq!(provenance.edges.len(), 2);
    assert_eq!(provenance.edges[0].predecessor_id, "B");
    assert_eq!(provenance.edges[1].predecessor_id, "A");
    assert_eq!(provenance.edges[1].rank, 2);
}

#[test]
fn overlap_below_threshold_falls_back_to_older() {
    let history = history();
    let c = rect(0.0, 5.5);
    let (a, b) = overlaps(&c, &history);
    assert!((a - 55.0).abs() < 1e-9);
    assert!((b - 5.0).abs() < 1e-9);

    let provenance = ProvenanceResolver::default().resolve(&footprint("C", c), &history);
    assert_eq!(provenance.base_reference(), BaseReference::Predecessor("A".into()));
}

#[test]
fn no_significant_overlap_uses_original() {
    let history = history();
    let c = Polygon::rectangle(14.5, 0.0, 20.0, 10.0).unwrap();
    let provenance = ProvenanceResolver::default().resolve(&footprint("C", c), &history);
    assert_eq!(provenance.base_reference(), BaseReference::Original);
}
