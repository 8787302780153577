// crates/tw_workflow/src/runner.rs

//! 批处理运行器
//!
//! 每个构筑物的队列严格顺序处理，第 i+1 条测量的差分与融合一定看到第 i 条提交后的状态：
//!
//! ```text
//! current() → 差分 → 出处 → 剖面 → 融合 → 核验 → commit()
//! ```
//!
//! 不同构筑物之间没有共享可变状态，开启 `run.parallel_structures` 时用 rayon 并行。
//! 单条测量的错误被记录后继续队列；使累积状态失效的错误停止该构筑物的剩余队列。

use crate::error::{PipelineError, PipelineResult};
use crate::events::{EventDispatcher, PipelineEvent};
use crate::report::{
    BatchReport, FailureEntry, RunId, StructureReport, StructureStatus, SurveyOutcome,
};
use crate::sources::SurfaceProvider;
use crate::store::{WallSnapshot, WallStateStore};
use chrono::Utc;
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tw_config::PipelineConfig;
use tw_foundation::{Tolerance, TwError};
use tw_geo::CrsDefinition;
use tw_survey::{
    ExtremePoints, FootprintDimensions, HistoryAnalyzer, ProvenanceResolver, SurveyMetrics,
    SurveyOrderer, SurveyQueue, SurveyRecord,
};
use tw_terrain::verify::{self, VerifyParams};
use tw_terrain::{
    ProfileRole, ProfileSampler, SlopeProjectionMerger, TerrainGrid, VolumeDiffCalculator,
};

/// 构筑物描述
#[derive(Debug, Clone, PartialEq)]
pub struct StructureSpec {
    /// 构筑物代码
    pub code: String,
    /// 规范 CRS；缺省时使用配置中的 `canonical_epsg`
    pub canonical_crs: Option<CrsDefinition>,
}

impl StructureSpec {
    /// 创建构筑物描述
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            canonical_crs: None,
        }
    }

    /// 设置规范 CRS
    #[must_use]
    pub fn with_crs(mut self, crs: CrsDefinition) -> Self {
        self.canonical_crs = Some(crs);
        self
    }
}

/// 批处理运行器
pub struct BatchRunner {
    config: PipelineConfig,
    store: Arc<WallStateStore>,
    surfaces: Arc<dyn SurfaceProvider>,
    events: EventDispatcher,
    orderer: SurveyOrderer,
    resolver: ProvenanceResolver,
    analyzer: HistoryAnalyzer,
    calculator: VolumeDiffCalculator,
    merger: SlopeProjectionMerger,
    sampler: ProfileSampler,
    verify: VerifyParams,
    tolerance: Tolerance,
}

impl BatchRunner {
    /// 创建运行器
    ///
    /// # Errors
    ///
    /// 配置校验失败或算法参数无效时返回错误。
    pub fn new(
        config: PipelineConfig,
        store: Arc<WallStateStore>,
        surfaces: Arc<dyn SurfaceProvider>,
    ) -> PipelineResult<Self> {
        config.validate()?;
        let calculator = VolumeDiffCalculator::new(config.diff_params()).map_err(TwError::from)?;
        let merger = SlopeProjectionMerger::new(config.merge_params()).map_err(TwError::from)?;
        let sampler = ProfileSampler::new(config.profile_params()).map_err(TwError::from)?;

        Ok(Self {
            orderer: config.survey_orderer(),
            resolver: config.provenance_resolver(),
            analyzer: config.history_analyzer(),
            verify: config.verify_params(),
            tolerance: Tolerance::default(),
            calculator,
            merger,
            sampler,
            config,
            store,
            surfaces,
            events: EventDispatcher::new(),
        })
    }

    /// 事件分发器
    pub fn events(&self) -> &EventDispatcher {
        &self.events
    }

    /// 状态存储
    pub fn store(&self) -> &Arc<WallStateStore> {
        &self.store
    }

    /// 配置
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// 运行一批候选测量
    ///
    /// `structures` 中的构筑物即使没有测量也会登记原始地形；
    /// 候选测量引用但未列出的构筑物同样处理，使用配置中的规范 CRS。
    pub fn run(
        &self,
        candidates: &[tw_survey::SurveyCandidate],
        structures: &[StructureSpec],
    ) -> BatchReport {
        let run_id = RunId::new();
        let started_at = Utc::now();
        info!(run = %run_id, candidates = candidates.len(), "批处理开始");

        let mut ingestion = self.orderer.ingest(candidates);

        let mut crs_by_code: BTreeMap<String, Option<CrsDefinition>> = BTreeMap::new();
        for spec in structures {
            crs_by_code.insert(spec.code.clone(), spec.canonical_crs.clone());
        }
        let codes: BTreeSet<String> = crs_by_code
            .keys()
            .cloned()
            .chain(ingestion.queues.keys().cloned())
            .collect();

        let jobs: Vec<(String, Option<CrsDefinition>, SurveyQueue)> = codes
            .into_iter()
            .map(|code| {
                let canonical = crs_by_code
                    .get(&code)
                    .cloned()
                    .flatten()
                    .or_else(|| self.config.canonical_epsg.map(CrsDefinition::Epsg));
                let queue = ingestion.queues.remove(&code).unwrap_or_default();
                (code, canonical, queue)
            })
            .collect();

        let mut reports: Vec<StructureReport> = if self.config.run.parallel_structures {
            jobs.into_par_iter()
                .map(|(code, canonical, queue)| self.run_structure(&code, canonical.as_ref(), queue))
                .collect()
        } else {
            jobs.into_iter()
                .map(|(code, canonical, queue)| self.run_structure(&code, canonical.as_ref(), queue))
                .collect()
        };
        reports.sort_by(|a, b| a.structure.cmp(&b.structure));

        let report = BatchReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            structures: reports,
            unassigned: ingestion.unassigned.iter().map(FailureEntry::from).collect(),
        };
        info!(
            run = %run_id,
            succeeded = report.total_succeeded(),
            failed = report.total_failed(),
            skipped = report.total_skipped(),
            "批处理结束"
        );
        report
    }

    /// 顺序处理单个构筑物的队列
    fn run_structure(
        &self,
        code: &str,
        canonical: Option<&CrsDefinition>,
        queue: SurveyQueue,
    ) -> StructureReport {
        let mut report = StructureReport::new(code);
        for rejected in &queue.rejected {
            report.record_failure(FailureEntry::from(rejected));
        }

        self.events.emit(PipelineEvent::StructureStarted {
            structure: code.to_string(),
            surveys: queue.records.len(),
        });

        if let Err(e) = self.prepare_structure(code, canonical) {
            error!(structure = code, error = %e, "构筑物无法开始处理");
            self.abort(&mut report, None, &e, queue.records.len());
            return self.finish(report, &[]);
        }

        let mut committed: Vec<SurveyRecord> = Vec::new();
        let total = queue.records.len();
        for (position, record) in queue.records.into_iter().enumerate() {
            match self.process_survey(code, canonical, &record) {
                Ok(outcome) => {
                    self.events.emit(PipelineEvent::SurveyProcessed {
                        structure: code.to_string(),
                        survey: record.id.clone(),
                        version: outcome.version,
                        fill: outcome.metrics.fill_volume,
                        cut: outcome.metrics.cut_volume,
                    });
                    report.final_version = outcome.version;
                    report.succeeded += 1;
                    committed.push(
                        record.with_results(outcome.metrics.clone(), outcome.base_reference.clone()),
                    );
                    report.surveys.push(outcome);
                }
                Err(e) if e.is_fatal_for_structure() => {
                    error!(structure = code, survey = %record.id, error = %e, "构筑物队列中止");
                    self.abort(&mut report, Some(&record.id), &e, total - position - 1);
                    break;
                }
                Err(e) => {
                    warn!(structure = code, survey = %record.id, kind = e.kind(), error = %e, "测量被跳过");
                    self.events.emit(PipelineEvent::SurveyFailed {
                        structure: code.to_string(),
                        survey: record.id.clone(),
                        kind: e.kind().to_string(),
                        message: e.to_string(),
                        fatal: false,
                    });
                    report.record_failure(FailureEntry::from_error(&record.id, &e));
                }
            }
        }

        self.finish(report, &committed)
    }

    /// 读取原始地形并登记到状态存储
    fn prepare_structure(
        &self,
        code: &str,
        canonical: Option<&CrsDefinition>,
    ) -> PipelineResult<()> {
        let mut original = self.surfaces.original(code)?;
        if original.crs().is_none() {
            if let Some(crs) = canonical {
                info!(structure = code, crs = %crs, "原始地形未定义 CRS，赋予规范 CRS");
                original.set_crs(Some(crs.clone()));
            }
        }
        self.store.initialize(code, original)
    }

    /// 中止构筑物；`survey` 为触发错误的测量，开始处理前失败时为 `None`
    fn abort(
        &self,
        report: &mut StructureReport,
        survey: Option<&str>,
        e: &PipelineError,
        skipped: usize,
    ) {
        self.events.emit(PipelineEvent::SurveyFailed {
            structure: report.structure.clone(),
            survey: survey.unwrap_or_default().to_string(),
            kind: e.kind().to_string(),
            message: e.to_string(),
            fatal: true,
        });
        if let Some(survey) = survey {
            report.record_failure(FailureEntry::from_error(survey, e));
        }
        report.skipped += skipped;
        report.status = StructureStatus::Aborted {
            kind: e.kind().to_string(),
            message: e.to_string(),
        };
    }

    fn finish(&self, mut report: StructureReport, committed: &[SurveyRecord]) -> StructureReport {
        report.history = self.analyzer.summarize(committed);
        self.events.emit(PipelineEvent::StructureFinished {
            structure: report.structure.clone(),
            succeeded: report.succeeded,
            failed: report.failed,
        });
        report
    }

    /// 处理单条测量
    fn process_survey(
        &self,
        code: &str,
        canonical: Option<&CrsDefinition>,
        record: &SurveyRecord,
    ) -> PipelineResult<SurveyOutcome> {
        let survey = record.id.as_str();
        let footprint = &record.footprint;

        // 每条测量都重新读取，不跨提交持有旧栅格
        let WallSnapshot {
            version,
            grid: mut base,
            history,
            ..
        } = self.store.current(code)?;

        let mut patch = self.surfaces.surface(survey)?;
        let crs_assigned = reconcile_crs(survey, &mut patch, &mut base, canonical)?;

        let (metrics, diff) = match self.calculator.compute(&patch, &base, &footprint.polygon) {
            Ok(diff) => (SurveyMetrics::from(&diff), Some(diff)),
            Err(e) if e.is_insufficient_data() => {
                warn!(structure = code, survey, "足迹内没有有效重叠单元，指标记为零");
                (SurveyMetrics::insufficient(), None)
            }
            Err(e) => return Err(PipelineError::terrain(survey, e)),
        };

        let dimensions = FootprintDimensions::measure(&footprint.polygon);
        let extremes = ExtremePoints::locate(&footprint.polygon, &patch);

        let provenance = self.resolver.resolve(footprint, &history);
        let base_reference = provenance.base_reference();

        let profile = self.sample_profile(code, record, &base, &patch, &provenance);

        let outcome = self
            .merger
            .merge(&patch, &base)
            .map_err(|e| PipelineError::terrain(survey, e))?;
        if let Some(change) = outcome.report.resolution_change {
            info!(
                structure = code,
                survey,
                from = ?change.from,
                to = ?change.to,
                "累积面已上采样到测量面分辨率"
            );
            self.events.emit(PipelineEvent::ResolutionUpsampled {
                structure: code.to_string(),
                survey: survey.to_string(),
                from: change.from,
                to: change.to,
            });
        }

        let change = verify::compare(&base, &outcome.grid, &self.verify, &self.tolerance);
        if !change.effective {
            warn!(
                structure = code,
                survey,
                changed = change.changed_cells,
                mean_change = change.mean_abs_change,
                "融合对累积面的改变低于阈值"
            );
        }

        let new_version = self
            .store
            .commit(code, version, &outcome.grid, footprint.clone())?;
        debug!(
            structure = code,
            survey,
            version = new_version,
            base = base_reference.label(),
            "测量已提交"
        );

        let profile_sparse = profile.as_ref().is_some_and(|p| p.sparse);
        Ok(SurveyOutcome {
            survey: record.id.clone(),
            date: record.date,
            sector: record.sector.clone(),
            material: record.material.clone(),
            version: new_version,
            base_reference,
            predecessors: provenance.edges,
            metrics,
            dimensions,
            extremes,
            diff,
            merge: outcome.report,
            change,
            profile,
            profile_sparse,
            crs_assigned,
        })
    }

    /// 剖面：原始地形、本次之前的累积面、被取代的前序测量、本次测量
    ///
    /// 剖面只用于诊断，失败时记录警告并返回 `None`。
    fn sample_profile(
        &self,
        code: &str,
        record: &SurveyRecord,
        base: &TerrainGrid,
        patch: &TerrainGrid,
        provenance: &tw_survey::Provenance,
    ) -> Option<tw_terrain::ProfileSeries> {
        let original = match self.store.original(code) {
            Ok(original) => original,
            Err(e) => {
                warn!(structure = code, survey = %record.id, error = %e, "剖面缺少原始地形");
                return None;
            }
        };

        let superseded = provenance.predecessor().and_then(|edge| {
            match self.surfaces.surface(&edge.predecessor_id) {
                Ok(grid) => Some(grid),
                Err(e) => {
                    debug!(survey = %record.id, predecessor = %edge.predecessor_id, error = %e, "前序测量面不可用");
                    None
                }
            }
        });

        let mut grids: BTreeMap<ProfileRole, &TerrainGrid> = BTreeMap::new();
        grids.insert(ProfileRole::Original, original.as_ref());
        grids.insert(ProfileRole::Baseline, base);
        if let Some(grid) = &superseded {
            grids.insert(ProfileRole::Superseded, grid);
        }
        grids.insert(ProfileRole::Survey, patch);

        let footprint = &record.footprint;
        match self
            .sampler
            .sample(&footprint.polygon, footprint.centerline.as_ref(), &grids)
        {
            Ok(series) => {
                if series.sparse {
                    warn!(structure = code, survey = %record.id, "剖面覆盖稀疏");
                }
                Some(series)
            }
            Err(e) => {
                warn!(structure = code, survey = %record.id, error = %e, "剖面采样失败");
                None
            }
        }
    }
}

impl std::fmt::Debug for BatchRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchRunner")
            .field("store", &self.store)
            .field("surfaces", &self.surfaces.name())
            .field("events", &self.events)
            .finish()
    }
}

/// 协调测量面与累积面的 CRS；返回是否发生了自动赋值
///
/// 一侧未定义时赋予另一侧的定义，两侧都未定义时赋予规范 CRS；
/// 两侧都已定义且不一致时返回 [`PipelineError::CrsMismatch`]。
fn reconcile_crs(
    survey: &str,
    patch: &mut TerrainGrid,
    base: &mut TerrainGrid,
    canonical: Option<&CrsDefinition>,
) -> PipelineResult<bool> {
    let fallback = match canonical.or(base.crs()).or(patch.crs()) {
        Some(crs) => crs.clone(),
        None => return Ok(false),
    };

    match tw_geo::crs::reconcile(patch.crs(), base.crs(), &fallback) {
        Ok(reconciled) => {
            if reconciled.patch_assigned {
                patch.set_crs(Some(reconciled.crs.clone()));
            }
            if reconciled.base_assigned {
                base.set_crs(Some(reconciled.crs.clone()));
            }
            if reconciled.any_assigned() {
                info!(survey, crs = %reconciled.crs, "自动赋予 CRS");
            }
            Ok(reconciled.any_assigned())
        }
        Err(_) => Err(PipelineError::CrsMismatch {
            survey: survey.to_string(),
            patch: patch.crs().map(ToString::to_string).unwrap_or_default(),
            base: base.crs().map(ToString::to_string).unwrap_or_default(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tw_terrain::GridGeometry;

    fn grid(crs: Option<CrsDefinition>) -> TerrainGrid {
        TerrainGrid::filled(GridGeometry::new(0.0, 2.0, 1.0, 1.0, 2, 2).unwrap(), 1.0).with_crs(crs)
    }

    #[test]
    fn test_reconcile_assigns_missing_side() {
        let mut patch = grid(None);
        let mut base = grid(Some(CrsDefinition::Epsg(32719)));
        let assigned = reconcile_crs("S1", &mut patch, &mut base, None).unwrap();
        assert!(assigned);
        assert_eq!(patch.crs(), Some(&CrsDefinition::Epsg(32719)));
    }

    #[test]
    fn test_reconcile_uses_canonical_when_both_undefined() {
        let mut patch = grid(None);
        let mut base = grid(None);
        let canonical = CrsDefinition::Epsg(32719);
        assert!(reconcile_crs("S1", &mut patch, &mut base, Some(&canonical)).unwrap());
        assert_eq!(base.crs(), Some(&canonical));

        let mut patch = grid(None);
        let mut base = grid(None);
        assert!(!reconcile_crs("S1", &mut patch, &mut base, None).unwrap());
        assert!(base.crs().is_none());
    }

    #[test]
    fn test_reconcile_mismatch() {
        let mut patch = grid(Some(CrsDefinition::Epsg(4326)));
        let mut base = grid(Some(CrsDefinition::Epsg(32719)));
        let err = reconcile_crs("S1", &mut patch, &mut base, None).unwrap_err();
        assert!(matches!(err, PipelineError::CrsMismatch { .. }));
        assert!(!err.is_fatal_for_structure());
    }
}
