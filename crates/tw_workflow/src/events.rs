// crates/tw_workflow/src/events.rs

//! 管线事件
//!
//! 运行器在构筑物开始与结束、每条测量提交或失败、累积面上采样时发出事件，
//! 由注册的监听器消费（日志、进度、测试断言）。

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// 管线事件
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// 构筑物开始处理
    StructureStarted {
        /// 构筑物代码
        structure: String,
        /// 队列中的测量数
        surveys: usize,
    },
    /// 测量已提交
    SurveyProcessed {
        /// 构筑物代码
        structure: String,
        /// 测量 ID
        survey: String,
        /// 提交后的版本
        version: u64,
        /// 填方 [m³]
        fill: f64,
        /// 挖方 [m³]
        cut: f64,
    },
    /// 测量失败
    SurveyFailed {
        /// 构筑物代码
        structure: String,
        /// 测量 ID
        survey: String,
        /// 错误类别
        kind: String,
        /// 错误信息
        message: String,
        /// 是否停止了该构筑物
        fatal: bool,
    },
    /// 累积面被上采样到测量面分辨率
    ResolutionUpsampled {
        /// 构筑物代码
        structure: String,
        /// 触发的测量 ID
        survey: String,
        /// 原像素尺寸
        from: (f64, f64),
        /// 新像素尺寸
        to: (f64, f64),
    },
    /// 构筑物处理结束
    StructureFinished {
        /// 构筑物代码
        structure: String,
        /// 成功数
        succeeded: usize,
        /// 失败数
        failed: usize,
    },
}

impl PipelineEvent {
    /// 事件所属构筑物
    pub fn structure(&self) -> &str {
        match self {
            Self::StructureStarted { structure, .. }
            | Self::SurveyProcessed { structure, .. }
            | Self::SurveyFailed { structure, .. }
            | Self::ResolutionUpsampled { structure, .. }
            | Self::StructureFinished { structure, .. } => structure,
        }
    }

    /// 事件名称
    pub fn name(&self) -> &'static str {
        match self {
            Self::StructureStarted { .. } => "StructureStarted",
            Self::SurveyProcessed { .. } => "SurveyProcessed",
            Self::SurveyFailed { .. } => "SurveyFailed",
            Self::ResolutionUpsampled { .. } => "ResolutionUpsampled",
            Self::StructureFinished { .. } => "StructureFinished",
        }
    }
}

/// 事件监听器
///
/// 并行处理构筑物时监听器会被多个线程同时调用。
pub trait EventListener: Send + Sync {
    /// 处理事件
    fn on_event(&self, event: &PipelineEvent);

    /// 监听器名称
    fn name(&self) -> &str {
        "anonymous"
    }
}

/// 闭包监听器
pub struct FnListener<F> {
    name: String,
    handler: F,
}

impl<F> FnListener<F>
where
    F: Fn(&PipelineEvent) + Send + Sync,
{
    /// 包装闭包
    pub fn new(name: impl Into<String>, handler: F) -> Self {
        Self {
            name: name.into(),
            handler,
        }
    }
}

impl<F> EventListener for FnListener<F>
where
    F: Fn(&PipelineEvent) + Send + Sync,
{
    fn on_event(&self, event: &PipelineEvent) {
        (self.handler)(event);
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// 把事件写入 tracing 日志
///
/// 单条测量提交只记 `debug`，失败记 `warn`（中止构筑物时记 `error`）。
pub struct LoggingListener {
    run: String,
}

impl LoggingListener {
    /// `run` 作为每条日志的 `run` 字段
    pub fn new(run: impl Into<String>) -> Self {
        Self { run: run.into() }
    }
}

impl EventListener for LoggingListener {
    fn on_event(&self, event: &PipelineEvent) {
        let run = self.run.as_str();
        match event {
            PipelineEvent::StructureStarted { structure, surveys } => {
                info!(run, structure = %structure, surveys, "构筑物开始处理");
            }
            PipelineEvent::SurveyProcessed {
                structure,
                survey,
                version,
                fill,
                cut,
            } => {
                debug!(run, structure = %structure, survey = %survey, version, fill, cut, "测量已提交");
            }
            PipelineEvent::SurveyFailed {
                structure,
                survey,
                kind,
                message,
                fatal: true,
            } => {
                error!(run, structure = %structure, survey = %survey, kind = %kind, "{message}; 构筑物已停止");
            }
            PipelineEvent::SurveyFailed {
                structure,
                survey,
                kind,
                message,
                fatal: false,
            } => {
                warn!(run, structure = %structure, survey = %survey, kind = %kind, "{message}; 已跳过");
            }
            PipelineEvent::ResolutionUpsampled {
                structure,
                survey,
                from,
                to,
            } => {
                info!(
                    run,
                    structure = %structure,
                    survey = %survey,
                    "累积面分辨率 {:.3}x{:.3} -> {:.3}x{:.3}",
                    from.0,
                    from.1,
                    to.0,
                    to.1
                );
            }
            PipelineEvent::StructureFinished {
                structure,
                succeeded,
                failed,
            } => {
                info!(run, structure = %structure, succeeded, failed, "构筑物处理结束");
            }
        }
    }

    fn name(&self) -> &str {
        "logging"
    }
}

/// 事件分发器
///
/// 监听器按注册顺序同步调用；同一构筑物的事件保持处理顺序。
#[derive(Default)]
pub struct EventDispatcher {
    listeners: RwLock<Vec<Arc<dyn EventListener>>>,
}

impl EventDispatcher {
    /// 空分发器
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册监听器
    pub fn add_listener(&self, listener: Arc<dyn EventListener>) {
        debug!(listener = listener.name(), "注册事件监听器");
        self.listeners.write().push(listener);
    }

    /// 注册闭包监听器
    pub fn add_fn_listener<F>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(&PipelineEvent) + Send + Sync + 'static,
    {
        self.add_listener(Arc::new(FnListener::new(name, handler)));
    }

    /// 分发事件
    pub fn emit(&self, event: PipelineEvent) {
        for listener in self.listeners.read().iter() {
            listener.on_event(&event);
        }
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self
            .listeners
            .read()
            .iter()
            .map(|l| l.name().to_string())
            .collect();
        f.debug_struct("EventDispatcher")
            .field("listeners", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn finished(structure: &str) -> PipelineEvent {
        PipelineEvent::StructureFinished {
            structure: structure.into(),
            succeeded: 2,
            failed: 0,
        }
    }

    #[test]
    fn test_listeners_called_in_order() {
        let dispatcher = EventDispatcher::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["a", "b"] {
            let seen = seen.clone();
            dispatcher.add_fn_listener(tag, move |event| {
                seen.lock().push(format!("{tag}:{}", event.structure()));
            });
        }
        dispatcher.add_listener(Arc::new(LoggingListener::new("test")));

        dispatcher.emit(PipelineEvent::StructureStarted {
            structure: "MP".into(),
            surveys: 2,
        });
        dispatcher.emit(finished("ME"));

        assert_eq!(*seen.lock(), vec!["a:MP", "b:MP", "a:ME", "b:ME"]);
        assert!(format!("{dispatcher:?}").contains("logging"));
    }

    #[test]
    fn test_event_structure_and_name() {
        let event = PipelineEvent::SurveyFailed {
            structure: "ME".into(),
            survey: "S1".into(),
            kind: "CRSMismatchError".into(),
            message: "EPSG:4326 != EPSG:32719".into(),
            fatal: false,
        };

        assert_eq!(event.structure(), "ME");
        assert_eq!(event.name(), "SurveyFailed");
        assert_eq!(finished("MO").name(), "StructureFinished");
    }
}
