//! Exact constraint engines.
//!
//! The search loop only talks to engines through [`Engine`] and
//! [`EngineContext`]: build a fresh context, load a [`Model`], solve it
//! under a [`Budget`], read the assignment. A context is used for exactly
//! one trial height and then dropped.

use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::Model;

#[cfg(feature = "milp")]
pub mod milp;
pub mod search;

/// Answer to a feasibility query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Feasible,
    Infeasible,
}

/// Anything other than a definite answer. Never read as infeasibility.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("time budget exhausted")]
    Timeout,
    #[error("cancelled")]
    Cancelled,
    #[error("{0}")]
    Unavailable(String),
}

pub trait Engine: Send + Sync {
    fn name(&self) -> &'static str;

    /// A fresh context holding no constraints.
    fn context(&self) -> Box<dyn EngineContext>;
}

pub trait EngineContext {
    fn load(&mut self, model: &Model) -> Result<(), EngineError>;

    fn solve(&mut self, budget: &Budget) -> Result<Verdict, EngineError>;

    /// One value per model variable, available after a `Feasible` verdict.
    fn assignment(&self) -> Option<Vec<bool>>;
}

/// Shared cancellation flag. A child token also reports cancelled once its
/// parent is.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    parent: Option<Arc<AtomicBool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
            || self
                .parent
                .as_ref()
                .is_some_and(|p| p.load(Ordering::Relaxed))
    }

    /// Token that can be cancelled on its own without touching `self`.
    pub fn child(&self) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            parent: Some(self.flag.clone()),
        }
    }
}

/// Time and cancellation limits for one engine invocation.
#[derive(Debug, Clone)]
pub struct Budget {
    limit: Option<Duration>,
    deadline: Option<Instant>,
    cancel: CancelToken,
}

impl Budget {
    /// Starts the clock now.
    pub fn new(limit: Option<Duration>, cancel: CancelToken) -> Self {
        Self {
            limit,
            deadline: limit.map(|l| Instant::now() + l),
            cancel,
        }
    }

    pub fn unlimited() -> Self {
        Self::new(None, CancelToken::new())
    }

    pub fn limit(&self) -> Option<Duration> {
        self.limit
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    pub fn expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    pub fn check(&self) -> Result<(), EngineError> {
        if self.cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        if self.expired() {
            return Err(EngineError::Timeout);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// Built-in backtracking engine.
    #[default]
    Search,
    /// HiGHS through `good_lp`, requires the `milp` feature.
    Milp,
}

impl FromStr for EngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "search" => Ok(EngineKind::Search),
            "milp" => Ok(EngineKind::Milp),
            _ => Err(format!("invalid engine '{s}', expected: search or milp")),
        }
    }
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineKind::Search => write!(f, "search"),
            EngineKind::Milp => write!(f, "milp"),
        }
    }
}

pub fn engine_for(kind: EngineKind) -> Result<Box<dyn Engine>, EngineError> {
    match kind {
        EngineKind::Search => Ok(Box::new(search::SearchEngine::default())),
        #[cfg(feature = "milp")]
        EngineKind::Milp => Ok(Box::new(milp::MilpEngine)),
        #[cfg(not(feature = "milp"))]
        EngineKind::Milp => Err(EngineError::Unavailable(
            "milp engine not available (compile with the 'milp' feature)".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_token_follows_parent() {
        let parent = CancelToken::new();
        let child = parent.child();
        assert!(!child.is_cancelled());
        parent.cancel();
        assert!(child.is_cancelled());
    }

    #[test]
    fn test_child_cancel_leaves_parent() {
        let parent = CancelToken::new();
        let child = parent.child();
        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());
    }

    #[test]
    fn test_budget_check() {
        assert_eq!(Budget::unlimited().check(), Ok(()));

        let expired = Budget::new(Some(Duration::ZERO), CancelToken::new());
        assert_eq!(expired.check(), Err(EngineError::Timeout));

        let token = CancelToken::new();
        token.cancel();
        let cancelled = Budget::new(Some(Duration::ZERO), token);
        assert_eq!(cancelled.check(), Err(EngineError::Cancelled));
    }

    #[test]
    fn test_engine_kind_parse() {
        assert_eq!("search".parse::<EngineKind>(), Ok(EngineKind::Search));
        assert_eq!("milp".parse::<EngineKind>(), Ok(EngineKind::Milp));
        assert!("cbc".parse::<EngineKind>().is_err());
    }

    #[cfg(not(feature = "milp"))]
    #[test]
    fn test_milp_without_feature_is_unavailable() {
        assert!(matches!(
            engine_for(EngineKind::Milp),
            Err(EngineError::Unavailable(_))
        ));
    }
}
