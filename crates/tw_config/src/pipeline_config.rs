// crates/tw_config/src/pipeline_config.rs

//! PipelineConfig - 批处理管线配置
//!
//! 定义差分、融合、出处、剖面、历史分析与运行方式的全部参数。
//! 每个字段都可以在 JSON 中省略，省略时取默认值。

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use tw_survey::{HistoryAnalyzer, ProvenanceResolver, SurveyOrderer};
use tw_terrain::{DiffParams, InterpolationMethod, MergeParams, ProfileParams, VerifyParams};

/// 管线配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// 构筑物规范 EPSG 代码，栅格缺少 CRS 时赋予
    #[serde(default = "default_canonical_epsg")]
    pub canonical_epsg: Option<u32>,

    /// 差分参数
    #[serde(default)]
    pub diff: DiffConfig,

    /// 融合参数
    #[serde(default)]
    pub merge: MergeConfig,

    /// 出处参数
    #[serde(default)]
    pub provenance: ProvenanceConfig,

    /// 剖面参数
    #[serde(default)]
    pub profile: ProfileConfig,

    /// 历史分析参数
    #[serde(default)]
    pub history: HistoryConfig,

    /// 运行方式
    #[serde(default)]
    pub run: RunConfig,

    /// 接受的测量日期格式（按顺序尝试）
    #[serde(default = "default_date_formats")]
    pub date_formats: Vec<String>,
}

fn default_canonical_epsg() -> Option<u32> { Some(32719) }
fn default_date_formats() -> Vec<String> {
    tw_survey::DEFAULT_DATE_FORMATS.iter().map(|s| s.to_string()).collect()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            canonical_epsg: default_canonical_epsg(),
            diff: DiffConfig::default(),
            merge: MergeConfig::default(),
            provenance: ProvenanceConfig::default(),
            profile: ProfileConfig::default(),
            history: HistoryConfig::default(),
            run: RunConfig::default(),
            date_formats: default_date_formats(),
        }
    }
}

/// 差分配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffConfig {
    /// 厚度下限 [m]
    #[serde(default = "default_min_thickness_floor")]
    pub min_thickness_floor: f64,

    /// 是否启用百分位过滤
    #[serde(default = "default_true")]
    pub filter_outliers: bool,

    /// 下百分位
    #[serde(default = "default_percentile_low")]
    pub percentile_low: f64,

    /// 上百分位
    #[serde(default = "default_percentile_high")]
    pub percentile_high: f64,

    /// 绝对厚度上限 [m]
    #[serde(default)]
    pub abs_cap: Option<f64>,

    /// 启用过滤所需的最少样本数
    #[serde(default = "default_min_filter_samples")]
    pub min_filter_samples: usize,
}

fn default_min_thickness_floor() -> f64 { 0.001 }
fn default_true() -> bool { true }
fn default_percentile_low() -> f64 { 2.0 }
fn default_percentile_high() -> f64 { 98.0 }
fn default_min_filter_samples() -> usize { 10 }

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            min_thickness_floor: default_min_thickness_floor(),
            filter_outliers: true,
            percentile_low: default_percentile_low(),
            percentile_high: default_percentile_high(),
            abs_cap: None,
            min_filter_samples: default_min_filter_samples(),
        }
    }
}

/// 融合配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeConfig {
    /// 坡比（水平/垂直）
    #[serde(default = "default_slope_ratio")]
    pub slope_ratio: f64,

    /// 过渡带宽度 [m]
    #[serde(default = "default_transition_distance")]
    pub transition_distance: f64,

    /// 分辨率容差（相对）
    #[serde(default = "default_resolution_tolerance")]
    pub resolution_tolerance: f64,

    /// patch 对齐方法
    #[serde(default)]
    pub patch_resample: PatchResample,

    /// 判定融合有效的最少变化单元数
    #[serde(default = "default_min_changed_cells")]
    pub min_changed_cells: usize,

    /// 判定融合有效的最小平均变化 [m]
    #[serde(default = "default_min_mean_change")]
    pub min_mean_change: f64,
}

fn default_slope_ratio() -> f64 { 1.0 }
fn default_transition_distance() -> f64 { 5.0 }
fn default_resolution_tolerance() -> f64 { 0.10 }
fn default_min_changed_cells() -> usize { 100 }
fn default_min_mean_change() -> f64 { 0.001 }

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            slope_ratio: default_slope_ratio(),
            transition_distance: default_transition_distance(),
            resolution_tolerance: default_resolution_tolerance(),
            patch_resample: PatchResample::default(),
            min_changed_cells: default_min_changed_cells(),
            min_mean_change: default_min_mean_change(),
        }
    }
}

/// patch 对齐方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PatchResample {
    /// 最近邻
    #[default]
    Nearest,
    /// 双线性
    Bilinear,
}

impl From<PatchResample> for InterpolationMethod {
    fn from(value: PatchResample) -> Self {
        match value {
            PatchResample::Nearest => InterpolationMethod::Nearest,
            PatchResample::Bilinear => InterpolationMethod::Bilinear,
        }
    }
}

/// 出处配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceConfig {
    /// 最小相交面积 [m²]
    #[serde(default = "default_min_overlap_area")]
    pub min_overlap_area: f64,
}

fn default_min_overlap_area() -> f64 { 10.0 }

impl Default for ProvenanceConfig {
    fn default() -> Self {
        Self {
            min_overlap_area: default_min_overlap_area(),
        }
    }
}

/// 剖面配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// 采样点数
    #[serde(default = "default_n_points")]
    pub n_points: usize,

    /// 稀疏判定比例
    #[serde(default = "default_sparse_start_fraction")]
    pub sparse_start_fraction: f64,
}

fn default_n_points() -> usize { 200 }
fn default_sparse_start_fraction() -> f64 { 0.1 }

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            n_points: default_n_points(),
            sparse_start_fraction: default_sparse_start_fraction(),
        }
    }
}

/// 历史分析配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// 年增长窗口 [天]
    #[serde(default = "default_growth_window_days")]
    pub growth_window_days: i64,
}

fn default_growth_window_days() -> i64 { tw_survey::DEFAULT_GROWTH_WINDOW_DAYS }

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            growth_window_days: default_growth_window_days(),
        }
    }
}

/// 运行方式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RunConfig {
    /// 是否并行处理不同构筑物
    #[serde(default)]
    pub parallel_structures: bool,

    /// 工作栅格目录；为空时使用内存存储
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

impl PipelineConfig {
    /// 从文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;

        let config: PipelineConfig =
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        std::fs::write(path, content).map_err(ConfigError::Io)?;
        Ok(())
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        // 差分
        let d = &self.diff;
        if !(d.min_thickness_floor >= 0.0) {
            return Err(ConfigError::invalid_value(
                "diff.min_thickness_floor",
                d.min_thickness_floor,
                "不能为负",
            ));
        }
        for (key, p) in [
            ("diff.percentile_low", d.percentile_low),
            ("diff.percentile_high", d.percentile_high),
        ] {
            if !(0.0..=100.0).contains(&p) {
                return Err(ConfigError::invalid_value(key, p, "百分位必须在 [0, 100] 范围内"));
            }
        }
        if d.percentile_low > d.percentile_high {
            return Err(ConfigError::invalid_value(
                "diff.percentile_low",
                d.percentile_low,
                "不能大于 diff.percentile_high",
            ));
        }
        if let Some(cap) = d.abs_cap {
            if !(cap > 0.0) {
                return Err(ConfigError::invalid_value("diff.abs_cap", cap, "上限必须为正"));
            }
        }

        // 融合
        let m = &self.merge;
        if !(m.slope_ratio > 0.0 && m.slope_ratio.is_finite()) {
            return Err(ConfigError::invalid_value("merge.slope_ratio", m.slope_ratio, "坡比必须为正"));
        }
        if !(m.transition_distance >= 0.0 && m.transition_distance.is_finite()) {
            return Err(ConfigError::invalid_value(
                "merge.transition_distance",
                m.transition_distance,
                "过渡带宽度不能为负",
            ));
        }
        if !(m.resolution_tolerance >= 0.0) {
            return Err(ConfigError::invalid_value(
                "merge.resolution_tolerance",
                m.resolution_tolerance,
                "容差不能为负",
            ));
        }
        if !(m.min_mean_change >= 0.0) {
            return Err(ConfigError::invalid_value(
                "merge.min_mean_change",
                m.min_mean_change,
                "不能为负",
            ));
        }

        // 出处
        if !(self.provenance.min_overlap_area >= 0.0) {
            return Err(ConfigError::invalid_value(
                "provenance.min_overlap_area",
                self.provenance.min_overlap_area,
                "面积阈值不能为负",
            ));
        }

        // 剖面
        if self.profile.n_points < 2 {
            return Err(ConfigError::invalid_value(
                "profile.n_points",
                self.profile.n_points,
                "至少需要 2 个采样点",
            ));
        }
        if !(0.0..=1.0).contains(&self.profile.sparse_start_fraction) {
            return Err(ConfigError::invalid_value(
                "profile.sparse_start_fraction",
                self.profile.sparse_start_fraction,
                "必须在 [0, 1] 范围内",
            ));
        }

        // 历史
        if !(30..=730).contains(&self.history.growth_window_days) {
            return Err(ConfigError::invalid_value(
                "history.growth_window_days",
                self.history.growth_window_days,
                "窗口必须在 [30, 730] 天范围内",
            ));
        }

        if self.date_formats.is_empty() {
            return Err(ConfigError::Missing("date_formats".to_string()));
        }

        Ok(())
    }

    /// 差分参数
    pub fn diff_params(&self) -> DiffParams {
        DiffParams {
            min_thickness_floor: self.diff.min_thickness_floor,
            filter_outliers: self.diff.filter_outliers,
            percentile_low: self.diff.percentile_low,
            percentile_high: self.diff.percentile_high,
            abs_cap: self.diff.abs_cap,
            min_filter_samples: self.diff.min_filter_samples,
            resolution_tolerance: self.merge.resolution_tolerance,
        }
    }

    /// 融合参数
    pub fn merge_params(&self) -> MergeParams {
        MergeParams {
            slope_ratio: self.merge.slope_ratio,
            transition_distance: self.merge.transition_distance,
            resolution_tolerance: self.merge.resolution_tolerance,
            patch_resample: self.merge.patch_resample.into(),
        }
    }

    /// 融合核验阈值
    pub fn verify_params(&self) -> VerifyParams {
        VerifyParams {
            min_changed_cells: self.merge.min_changed_cells,
            min_mean_change: self.merge.min_mean_change,
        }
    }

    /// 剖面参数
    pub fn profile_params(&self) -> ProfileParams {
        ProfileParams {
            n_points: self.profile.n_points,
            sparse_start_fraction: self.profile.sparse_start_fraction,
        }
    }

    /// 出处解析器
    pub fn provenance_resolver(&self) -> ProvenanceResolver {
        ProvenanceResolver::new(self.provenance.min_overlap_area)
    }

    /// 时间排序器
    pub fn survey_orderer(&self) -> SurveyOrderer {
        SurveyOrderer::new(self.date_formats.clone())
    }

    /// 历史分析器
    pub fn history_analyzer(&self) -> HistoryAnalyzer {
        HistoryAnalyzer::new(self.history.growth_window_days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.canonical_epsg, Some(32719));
        assert_eq!(config.diff_params(), DiffParams::default());
        assert_eq!(config.merge_params(), MergeParams::default());
        assert_eq!(config.verify_params(), VerifyParams::default());
        assert_eq!(config.profile_params(), ProfileParams::default());
    }

    #[test]
    fn test_empty_json_uses_defaults() {
        let config: PipelineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, PipelineConfig::default());

        let config: PipelineConfig =
            serde_json::from_str(r#"{"merge": {"patch_resample": "bilinear"}}"#).unwrap();
        assert_eq!(config.merge.patch_resample, PatchResample::Bilinear);
        assert_eq!(config.merge.slope_ratio, 1.0);
    }

    #[test]
    fn test_invalid_values_name_the_key() {
        let mut config = PipelineConfig::default();
        config.merge.slope_ratio = 0.0;
        match config.validate() {
            Err(ConfigError::InvalidValue { key, .. }) => assert_eq!(key, "merge.slope_ratio"),
            other => panic!("unexpected: {other:?}"),
        }

        let mut config = PipelineConfig::default();
        config.diff.percentile_low = 99.0;
        config.diff.percentile_high = 50.0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.date_formats.clear();
        assert!(matches!(config.validate(), Err(ConfigError::Missing(_))));
    }

    #[test]
    fn test_file_round_trip() {
        let path = std::env::temp_dir().join(format!("tw_config_{}.json", std::process::id()));
        let mut config = PipelineConfig::default();
        config.run.parallel_structures = true;
        config.diff.abs_cap = Some(4.0);
        config.save_to_file(&path).unwrap();

        let loaded = PipelineConfig::from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, config);
    }
}
