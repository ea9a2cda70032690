//! 配置问题诊断

use std::fmt;

use parking_lot::Mutex;

use crate::error::{ContextError, ContextResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProblemKind {
    CircularImport,
    ImportDepthExceeded,
    FinalConfiguration,
    NonOverridableBeanMethod,
}

/// 问题所在位置：配置类，可选的方法
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub class_name: String,
    pub method_name: Option<String>,
}

impl Location {
    pub fn class(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            method_name: None,
        }
    }

    pub fn method(class_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            method_name: Some(method_name.into()),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.method_name {
            Some(method) => write!(f, "{}.{}", self.class_name, method),
            None => f.write_str(&self.class_name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    pub kind: ProblemKind,
    pub message: String,
    pub location: Location,
}

impl Problem {
    pub fn new(kind: ProblemKind, message: impl Into<String>, location: Location) -> Self {
        Self {
            kind,
            message: message.into(),
            location,
        }
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Configuration problem: {}\nOffending resource: {}", self.message, self.location)
    }
}

/// 问题报告器
pub trait ProblemReporter: Send + Sync {
    fn error(&self, problem: Problem) -> ContextResult<()>;
}

/// 收集所有问题，解析继续进行
#[derive(Default)]
pub struct CollectingProblemReporter {
    problems: Mutex<Vec<Problem>>,
}

impl CollectingProblemReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn problems(&self) -> Vec<Problem> {
        self.problems.lock().clone()
    }

    pub fn has_problems(&self) -> bool {
        !self.problems.lock().is_empty()
    }
}

impl ProblemReporter for CollectingProblemReporter {
    fn error(&self, problem: Problem) -> ContextResult<()> {
        tracing::warn!("{}", problem);
        self.problems.lock().push(problem);
        Ok(())
    }
}

/// 遇到第一个问题即失败
pub struct FailFastProblemReporter;

impl ProblemReporter for FailFastProblemReporter {
    fn error(&self, problem: Problem) -> ContextResult<()> {
        tracing::error!("{}", problem);
        Err(ContextError::Problem(problem))
    }
}
