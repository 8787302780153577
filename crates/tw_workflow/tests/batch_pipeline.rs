// crates/tw_workflow/tests/batch_pipeline.rs

//! 批处理端到端场景

use parking_lot::Mutex;
use std::sync::Arc;
use tw_config::PipelineConfig;
use tw_geo::{CrsDefinition, Point2D};
use tw_survey::{BaseReference, SurveyCandidate};
use tw_terrain::{GridGeometry, ProfileRole, TerrainGrid};
use tw_workflow::{
    BatchRunner, FileGridStorage, GridStorage, InMemorySurfaces, MemoryGridStorage,
    PipelineEvent, StorageError, StructureSpec, StructureStatus, WallStateStore,
};

/// 20x20 m、1 m 分辨率、高程 100 的原始地形（无 CRS）
fn original() -> TerrainGrid {
    TerrainGrid::filled(GridGeometry::new(0.0, 20.0, 1.0, 1.0, 20, 20).unwrap(), 100.0)
}

/// 覆盖 [x0, x1] × [y0, y1] 的平坦测量面
fn patch(x0: f64, y0: f64, x1: f64, y1: f64, z: f64) -> TerrainGrid {
    let g = GridGeometry::new(x0, y1, 1.0, 1.0, (x1 - x0) as usize, (y1 - y0) as usize).unwrap();
    TerrainGrid::filled(g, z)
}

fn candidate(id: &str, structure: &str, date: &str, rect: (f64, f64, f64, f64)) -> SurveyCandidate {
    let (x0, y0, x1, y1) = rect;
    SurveyCandidate {
        id: Some(id.into()),
        structure: Some(structure.into()),
        date: Some(date.into()),
        footprint: vec![
            Point2D::new(x0, y0),
            Point2D::new(x1, y0),
            Point2D::new(x1, y1),
            Point2D::new(x0, y1),
        ],
        ..Default::default()
    }
}

const CENTER: (f64, f64, f64, f64) = (8.0, 8.0, 12.0, 12.0);

/// MP：两次在同一位置加高（输入顺序与日期相反）
fn two_lifts() -> (Vec<SurveyCandidate>, InMemorySurfaces) {
    let candidates = vec![
        candidate("S2", "MP", "01-02-2024", CENTER),
        candidate("S1", "MP", "10-01-2024", CENTER),
    ];
    let surfaces = InMemorySurfaces::new()
        .with_original("MP", original())
        .with_surface("S1", patch(8.0, 8.0, 12.0, 12.0, 102.0))
        .with_surface("S2", patch(8.0, 8.0, 12.0, 12.0, 103.0));
    (candidates, surfaces)
}

fn runner_with(storage: Arc<dyn GridStorage>, surfaces: InMemorySurfaces, config: PipelineConfig) -> BatchRunner {
    let store = Arc::new(WallStateStore::new(storage));
    BatchRunner::new(config, store, Arc::new(surfaces)).unwrap()
}

fn memory_runner(surfaces: InMemorySurfaces) -> BatchRunner {
    runner_with(Arc::new(MemoryGridStorage::new()), surfaces, PipelineConfig::default())
}

#[test]
fn test_sequential_commits_observe_previous_state() {
    let (candidates, surfaces) = two_lifts();
    let runner = memory_runner(surfaces);
    let report = runner.run(&candidates, &[StructureSpec::new("MP")]);

    let mp = report.structure("MP").unwrap();
    assert_eq!(mp.status, StructureStatus::Completed);
    assert_eq!((mp.succeeded, mp.failed, mp.skipped), (2, 0, 0));
    assert_eq!(mp.final_version, 2);

    // 按日期处理：S1 先于 S2
    assert_eq!(mp.surveys[0].survey, "S1");
    assert_eq!(mp.surveys[1].survey, "S2");

    let s1 = &mp.surveys[0];
    assert!((s1.metrics.fill_volume - 32.0).abs() < 1e-9);
    assert_eq!(s1.metrics.cut_volume, 0.0);
    assert_eq!(s1.base_reference, BaseReference::Original);
    assert!(s1.crs_assigned);
    assert!((s1.dimensions.area - 16.0).abs() < 1e-9);
    assert!((s1.dimensions.width.unwrap() - 4.0).abs() < 1e-9);
    assert!((s1.dimensions.length - 4.0).abs() < 1e-9);
    // 极值顶点落在测量面边界上，高程取自 S1
    assert_eq!((s1.extremes.west.easting, s1.extremes.west.northing), (8.0, 8.0));
    assert_eq!(s1.extremes.north.northing, 12.0);
    assert!(s1.extremes.as_array().iter().all(|p| p.elevation == Some(102.0)));

    // S2 相对 S1 提交后的累积面只加高 1 m
    let s2 = &mp.surveys[1];
    assert!((s2.metrics.fill_volume - 16.0).abs() < 1e-9);
    assert!((s2.metrics.mean_thickness - 1.0).abs() < 1e-9);
    assert_eq!(s2.base_reference, BaseReference::Predecessor("S1".into()));
    assert_eq!(s2.predecessors.len(), 1);
    assert!((s2.predecessors[0].overlap_area - 16.0).abs() < 1e-9);

    let profile = s2.profile.as_ref().unwrap();
    assert!(!profile.sparse);
    assert!(profile.elevations[&ProfileRole::Superseded].iter().all(|&z| z == 102.0));
    assert!(profile.elevations[&ProfileRole::Survey].iter().all(|&z| z == 103.0));
    assert!(profile.elevations[&ProfileRole::Original].iter().all(|&z| z == 100.0));

    // 历史：窗口内累计增长
    assert_eq!(mp.history.len(), 2);
    assert_eq!(mp.history[1].last_intervention, Some(s1.date));
    assert!((mp.history[1].annual_growth - 3.0).abs() < 1e-9);

    // 累积面：测量面内 103，远处保持原值，并已赋予规范 CRS
    let snapshot = runner.store().current("MP").unwrap();
    assert_eq!(snapshot.version, 2);
    assert_eq!(snapshot.grid.sample(&Point2D::new(10.5, 10.5)), Some(103.0));
    assert_eq!(snapshot.grid.value(0, 0), Some(100.0));
    assert_eq!(snapshot.grid.crs(), Some(&CrsDefinition::Epsg(32719)));
    assert_eq!(snapshot.history.len(), 2);
}

#[test]
fn test_crs_mismatch_skips_only_that_survey() {
    let candidates = vec![
        candidate("S1", "MP", "10-01-2024", CENTER),
        candidate("S2", "MP", "01-02-2024", CENTER),
        candidate("S3", "MP", "05-03-2024", (2.0, 2.0, 5.0, 5.0)),
    ];
    let surfaces = InMemorySurfaces::new()
        .with_original("MP", original())
        .with_surface("S1", patch(8.0, 8.0, 12.0, 12.0, 102.0))
        .with_surface(
            "S2",
            patch(8.0, 8.0, 12.0, 12.0, 110.0).with_crs(Some(CrsDefinition::Epsg(4326))),
        )
        .with_surface("S3", patch(2.0, 2.0, 5.0, 5.0, 101.0));

    let runner = memory_runner(surfaces);
    let report = runner.run(&candidates, &[StructureSpec::new("MP")]);
    let mp = report.structure("MP").unwrap();

    assert_eq!(mp.status, StructureStatus::Completed);
    assert_eq!((mp.succeeded, mp.failed), (2, 1));
    assert_eq!(mp.failures[0].survey, "S2");
    assert_eq!(mp.failures[0].kind, "CRSMismatchError");

    // 被跳过的测量没有改变累积面
    let snapshot = runner.store().current("MP").unwrap();
    assert_eq!(snapshot.version, 2);
    assert_eq!(snapshot.grid.sample(&Point2D::new(10.5, 10.5)), Some(102.0));
}

#[test]
fn test_missing_original_aborts_only_its_structure() {
    let (mut candidates, surfaces) = two_lifts();
    candidates.push(candidate("E1", "ME", "10-01-2024", CENTER));
    candidates.push(candidate("E2", "ME", "11-01-2024", CENTER));

    let runner = memory_runner(surfaces);
    let report = runner.run(&candidates, &[StructureSpec::new("MP"), StructureSpec::new("ME")]);

    let me = report.structure("ME").unwrap();
    assert!(matches!(
        &me.status,
        StructureStatus::Aborted { kind, .. } if kind == "MissingReferenceError"
    ));
    assert_eq!((me.succeeded, me.failed, me.skipped), (0, 0, 2));

    let mp = report.structure("MP").unwrap();
    assert_eq!(mp.succeeded, 2);
    assert_eq!(report.total_succeeded(), 2);
    assert_eq!(report.total_skipped(), 2);
    // 按代码排序
    assert_eq!(report.structures[0].structure, "ME");
}

/// 写入总是失败的存储
struct FullDisk;

impl GridStorage for FullDisk {
    fn load(&self, _structure: &str) -> Result<Option<TerrainGrid>, StorageError> {
        Ok(None)
    }

    fn store(&self, _structure: &str, _grid: &TerrainGrid) -> Result<(), StorageError> {
        Err(StorageError::Other("磁盘已满".into()))
    }

    fn remove(&self, _structure: &str) -> Result<(), StorageError> {
        Ok(())
    }

    fn structures(&self) -> Result<Vec<String>, StorageError> {
        Ok(Vec::new())
    }
}

#[test]
fn test_io_failure_stops_structure_queue() {
    let (candidates, surfaces) = two_lifts();
    let runner = runner_with(Arc::new(FullDisk), surfaces, PipelineConfig::default());

    let fatal = Arc::new(Mutex::new(Vec::new()));
    let sink = fatal.clone();
    runner.events().add_fn_listener("fatal", move |event| {
        if let PipelineEvent::SurveyFailed { survey, fatal: true, .. } = event {
            sink.lock().push(survey.clone());
        }
    });

    let report = runner.run(&candidates, &[StructureSpec::new("MP")]);
    let mp = report.structure("MP").unwrap();

    assert!(mp.status.is_aborted());
    assert_eq!((mp.succeeded, mp.failed, mp.skipped), (0, 1, 1));
    assert_eq!(mp.failures[0].kind, "IOError");
    assert_eq!(*fatal.lock(), vec!["S1".to_string()]);
    assert_eq!(runner.store().version("MP").unwrap(), 0);
}

#[test]
fn test_rejected_records_are_reported() {
    let (mut candidates, surfaces) = two_lifts();
    candidates.push(candidate("S9", "MP", "ayer", CENTER));
    let mut anonymous = candidate("", "", "10-01-2024", CENTER);
    anonymous.id = None;
    candidates.push(anonymous);

    let runner = memory_runner(surfaces);
    let report = runner.run(&candidates, &[StructureSpec::new("MP")]);
    let mp = report.structure("MP").unwrap();

    assert_eq!((mp.succeeded, mp.failed), (2, 1));
    assert_eq!(mp.failures[0].survey, "S9");
    assert_eq!(mp.failures[0].kind, "DateParseError");
    assert_eq!(report.unassigned.len(), 1);
    assert_eq!(report.total_failed(), 2);
}

#[test]
fn test_insufficient_overlap_still_commits() {
    // 足迹与测量面不相交：差分数据不足，融合照常进行
    let candidates = vec![candidate("S1", "MP", "10-01-2024", (15.0, 15.0, 18.0, 18.0))];
    let surfaces = InMemorySurfaces::new()
        .with_original("MP", original())
        .with_surface("S1", patch(2.0, 2.0, 5.0, 5.0, 101.0));

    let runner = memory_runner(surfaces);
    let report = runner.run(&candidates, &[StructureSpec::new("MP")]);
    let mp = report.structure("MP").unwrap();

    assert_eq!(mp.succeeded, 1);
    let s1 = &mp.surveys[0];
    assert!(s1.metrics.insufficient_data);
    assert_eq!(s1.metrics.fill_volume, 0.0);
    assert!(s1.diff.is_none());
    assert_eq!(s1.version, 1);
}

#[test]
fn test_events_follow_processing_order() {
    let (candidates, surfaces) = two_lifts();
    let runner = memory_runner(surfaces);

    let names = Arc::new(Mutex::new(Vec::new()));
    let sink = names.clone();
    runner.events().add_fn_listener("order", move |event| {
        let label = match event {
            PipelineEvent::SurveyProcessed { survey, version, .. } => format!("{survey}@{version}"),
            other => other.name().to_string(),
        };
        sink.lock().push(label);
    });

    runner.run(&candidates, &[StructureSpec::new("MP")]);
    assert_eq!(
        *names.lock(),
        vec!["StructureStarted", "S1@1", "S2@2", "StructureFinished"]
    );
}

#[test]
fn test_parallel_structures_match_sequential() {
    let build = || {
        let (mut candidates, surfaces) = two_lifts();
        candidates.push(candidate("E1", "ME", "10-01-2024", (2.0, 2.0, 6.0, 6.0)));
        surfaces.insert_original("ME", original());
        surfaces.insert_surface("E1", patch(2.0, 2.0, 6.0, 6.0, 99.0));
        (candidates, surfaces)
    };
    let specs = [StructureSpec::new("MP"), StructureSpec::new("ME")];

    let (candidates, surfaces) = build();
    let sequential = memory_runner(surfaces).run(&candidates, &specs);

    let (candidates, surfaces) = build();
    let mut config = PipelineConfig::default();
    config.run.parallel_structures = true;
    let parallel = runner_with(Arc::new(MemoryGridStorage::new()), surfaces, config)
        .run(&candidates, &specs);

    assert_eq!(sequential.structures.len(), parallel.structures.len());
    for (a, b) in sequential.structures.iter().zip(&parallel.structures) {
        assert_eq!(a.structure, b.structure);
        assert_eq!(a.succeeded, b.succeeded);
        let volumes = |r: &tw_workflow::StructureReport| -> Vec<(f64, f64)> {
            r.surveys
                .iter()
                .map(|s| (s.metrics.fill_volume, s.metrics.cut_volume))
                .collect()
        };
        assert_eq!(volumes(a), volumes(b));
    }
    let me = parallel.structure("ME").unwrap();
    assert!((me.surveys[0].metrics.cut_volume - 16.0).abs() < 1e-9);
}

#[test]
fn test_file_backend_persists_working_grid() {
    let dir = tempfile::tempdir().unwrap();
    let work = dir.path().join("work");
    let (candidates, surfaces) = two_lifts();

    let storage = Arc::new(FileGridStorage::new(&work).unwrap());
    let runner = runner_with(storage, surfaces, PipelineConfig::default());
    let report = runner.run(&candidates, &[StructureSpec::new("MP")]);
    assert_eq!(report.structure("MP").unwrap().succeeded, 2);

    assert!(work.join("MP_work.twg").exists());
    let reopened = FileGridStorage::new(&work).unwrap();
    let grid = reopened.load("MP").unwrap().unwrap();
    assert_eq!(grid, runner.store().current("MP").unwrap().grid);
    assert_eq!(grid.sample(&Point2D::new(10.5, 10.5)), Some(103.0));
}
