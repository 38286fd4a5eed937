//! Units of work and the registry that maps categories to them.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use taskloop_core::{CategoryName, CategorySpec, Task};

use crate::error::{ConfigurationError, TaskExecutionError};

/// The work performed for every task of a category.
///
/// Implementations are black boxes to the runner: they get the task, and
/// return a payload on success or an error that the retry policy handles.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// Attempt the task once.
    async fn execute(&self, task: &Task) -> Result<Value, TaskExecutionError>;

    /// Execution budget for a single attempt. Exceeding it fails the attempt.
    fn timeout(&self) -> Duration;
}

/// Unit of work backed by an async closure.
pub struct FnWork<F> {
    f: F,
    timeout: Duration,
}

impl<F> FnWork<F> {
    pub fn new<Fut>(timeout: Duration, f: F) -> Self
    where
        F: Fn(Task) -> Fut + Send + Sync,
        Fut: Future<Output = Result<Value, TaskExecutionError>> + Send,
    {
        Self { f, timeout }
    }
}

#[async_trait]
impl<F, Fut> UnitOfWork for FnWork<F>
where
    F: Fn(Task) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, TaskExecutionError>> + Send,
{
    async fn execute(&self, task: &Task) -> Result<Value, TaskExecutionError> {
        (self.f)(task.clone()).await
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Category → unit of work.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<CategoryName, Arc<dyn UnitOfWork>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the unit of work for a category, replacing any previous one.
    pub fn register(
        &mut self,
        category: impl Into<CategoryName>,
        handler: Arc<dyn UnitOfWork>,
    ) -> &mut Self {
        self.handlers.insert(category.into(), handler);
        self
    }

    /// Builder form of [`HandlerRegistry::register`].
    pub fn with(mut self, category: impl Into<CategoryName>, handler: Arc<dyn UnitOfWork>) -> Self {
        self.register(category, handler);
        self
    }

    pub fn get(&self, category: &CategoryName) -> Option<Arc<dyn UnitOfWork>> {
        self.handlers.get(category).cloned()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Fail unless every category has a registered unit of work.
    pub fn ensure_covers(&self, categories: &[CategorySpec]) -> Result<(), ConfigurationError> {
        match categories
            .iter()
            .find(|spec| !self.handlers.contains_key(&spec.name))
        {
            Some(missing) => Err(ConfigurationError::MissingHandler(
                missing.name.to_string(),
            )),
            None => Ok(()),
        }
    }
}
