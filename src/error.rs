use thiserror::Error;

use crate::config::ConfigError;
use crate::engine::EngineError;
use crate::graph::GraphError;
use crate::provider::SortError;
use crate::rule::scope::ScopeError;
use crate::rule::EvalError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Sort error: {0}")]
    Sort(#[from] SortError),
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
    // eval error
    #[error("Eval error: {0}")]
    Eval(#[from] EvalError),
    #[error("Scope error: {0}")]
    Scope(#[from] ScopeError),
    // working set
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type InternalResult<T> = Result<T, Error>;

impl Error {
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Error::Internal(message.into())
    }
}
