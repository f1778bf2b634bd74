use std::collections::{BTreeMap, HashSet};
use std::time::Instant;

use crate::candidates::{self, CandidateSet};
use crate::config::SolverConfig;
use crate::engine::{self, Budget, CancelToken, Engine, EngineError, Verdict};
use crate::error::{Error, Result};
use crate::model::{self, Model};
use crate::types::{Item, Placement, PlacementResult, TrialOutcome, TrialReport};

/// Finds the lowest strip height holding every item, trying heights one by
/// one from the area bound.
pub struct Solver {
    engine: Box<dyn Engine>,
    config: SolverConfig,
    cancel: CancelToken,
}

struct Trial {
    report: TrialReport,
    placements: Option<BTreeMap<String, Placement>>,
}

/// `ceil(total item area / width)`.
pub fn lower_bound(items: &[Item], width: u32) -> u32 {
    let area: u64 = items.iter().map(|i| i.size().area()).sum();
    clamp_height(area.div_ceil(width as u64))
}

/// Stacking every item in its own band always fits, so the search never
/// needs to go above the sum of the heights.
pub fn height_ceiling(items: &[Item]) -> u32 {
    clamp_height(items.iter().map(|i| i.h as u64).sum())
}

fn clamp_height(h: u64) -> u32 {
    u32::try_from(h).unwrap_or(u32::MAX)
}

/// Rejects input that could never produce a placement.
pub fn validate(items: &[Item], width: u32) -> Result<()> {
    if items.is_empty() {
        return Err(Error::EmptyInput);
    }
    if width == 0 {
        return Err(Error::InvalidWidth);
    }
    let mut seen = HashSet::with_capacity(items.len());
    for item in items {
        if item.w == 0 || item.h == 0 {
            return Err(Error::invalid_item(
                &item.id,
                format!("size {} has a zero side", item.size()),
            ));
        }
        if item.w > width {
            return Err(Error::invalid_item(
                &item.id,
                format!("width {} exceeds strip width {}", item.w, width),
            ));
        }
        if !seen.insert(item.id.as_str()) {
            return Err(Error::DuplicateItem(item.id.clone()));
        }
    }
    Ok(())
}

/// Solves with the default configuration.
pub fn solve_strip(items: &[Item], width: u32) -> Result<PlacementResult> {
    Solver::new(SolverConfig::default())?.solve_strip(items, width)
}

impl Solver {
    pub fn new(config: SolverConfig) -> Result<Self> {
        let engine = engine::engine_for(config.engine)
            .map_err(|e| Error::SolverUnavailable(e.to_string()))?;
        Ok(Self::with_engine(engine, config))
    }

    pub fn with_engine(engine: Box<dyn Engine>, config: SolverConfig) -> Self {
        Self {
            engine,
            config,
            cancel: CancelToken::new(),
        }
    }

    /// Uses `token` to stop the search from another thread.
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn solve_strip(&self, items: &[Item], width: u32) -> Result<PlacementResult> {
        validate(items, width)?;

        let start = lower_bound(items, width);
        let ceiling = height_ceiling(items);
        tracing::info!(
            items = items.len(),
            width,
            lower_bound = start,
            ceiling,
            engine = self.engine.name(),
            "solving strip"
        );

        let mut trials = Vec::new();
        let mut height = start;
        while height <= ceiling {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let found = if self.config.speculative && height < ceiling {
                let (lower, upper) = self.speculative_pair(items, width, height)?;
                trials.push(lower.report);
                match (lower.placements, upper) {
                    (Some(p), _) => Some((height, p)),
                    (None, Some(upper)) => {
                        trials.push(upper.report);
                        upper.placements.map(|p| (height + 1, p))
                    }
                    (None, None) => None,
                }
            } else {
                let trial = self.run_trial(items, width, height, &self.cancel)?;
                trials.push(trial.report);
                trial.placements.map(|p| (height, p))
            };

            if let Some((height, placements)) = found {
                tracing::info!(
                    height,
                    trials = trials.len(),
                    "found minimal strip height"
                );
                return Ok(PlacementResult {
                    width,
                    height,
                    placements,
                    trials,
                });
            }
            height = trials.last().map_or(height, |t| t.height) + 1;
        }

        tracing::error!(ceiling, "no feasible height up to the stacking bound");
        Err(Error::HeightCeilingExceeded { ceiling })
    }

    /// Solves `height` and `height + 1` on two threads. The upper trial is
    /// stopped and dropped unless the lower one is infeasible.
    fn speculative_pair(
        &self,
        items: &[Item],
        width: u32,
        height: u32,
    ) -> Result<(Trial, Option<Trial>)> {
        let upper_cancel = self.cancel.child();
        let (lower, upper) = std::thread::scope(|s| {
            let handle = s.spawn(|| self.run_trial(items, width, height + 1, &upper_cancel));
            let lower = self.run_trial(items, width, height, &self.cancel);
            if !matches!(&lower, Ok(t) if t.placements.is_none()) {
                upper_cancel.cancel();
            }
            (lower, handle.join())
        });

        let lower = lower?;
        if lower.placements.is_some() {
            return Ok((lower, None));
        }
        let upper = upper
            .map_err(|_| Error::SolverUnavailable("speculative trial panicked".to_string()))??;
        Ok((lower, Some(upper)))
    }

    fn run_trial(
        &self,
        items: &[Item],
        width: u32,
        height: u32,
        cancel: &CancelToken,
    ) -> Result<Trial> {
        let started = Instant::now();
        let set = candidates::generate(items, width, height);

        if let Some(item) = set.unplaceable().next() {
            tracing::debug!(height, item = %item.id, "item has no position, skipping engine");
            return Ok(Trial {
                report: TrialReport {
                    height,
                    outcome: TrialOutcome::ShortCircuit,
                    candidates: set.len(),
                    constraints: 0,
                    elapsed: started.elapsed(),
                },
                placements: None,
            });
        }

        let model = model::build(items, &set, width, height);
        let budget = Budget::new(self.config.trial_timeout(), cancel.clone());

        let mut context = self.engine.context();
        let verdict = context
            .load(&model)
            .and_then(|()| context.solve(&budget))
            .map_err(|e| self.engine_error(e, height, &budget))?;

        let placements = match verdict {
            Verdict::Feasible => {
                let assignment = context.assignment().ok_or_else(|| {
                    Error::SolverUnavailable(
                        "engine reported feasible without an assignment".to_string(),
                    )
                })?;
                Some(decode(&set, &model, &assignment)?)
            }
            Verdict::Infeasible => None,
        };

        let report = TrialReport {
            height,
            outcome: if placements.is_some() {
                TrialOutcome::Feasible
            } else {
                TrialOutcome::Infeasible
            },
            candidates: set.len(),
            constraints: model.constraints().len(),
            elapsed: started.elapsed(),
        };
        tracing::debug!(
            height,
            outcome = ?report.outcome,
            candidates = report.candidates,
            constraints = report.constraints,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "trial finished"
        );
        Ok(Trial { report, placements })
    }

    fn engine_error(&self, e: EngineError, height: u32, budget: &Budget) -> Error {
        match e {
            EngineError::Timeout => {
                tracing::warn!(height, "engine timed out");
                Error::SolverTimeout {
                    height,
                    limit: budget.limit().unwrap_or_default(),
                }
            }
            EngineError::Cancelled => Error::Cancelled,
            EngineError::Unavailable(reason) => {
                tracing::error!(height, %reason, "engine failed");
                Error::SolverUnavailable(reason)
            }
        }
    }
}

/// Reads each item's chosen candidate out of a feasible assignment.
fn decode(
    set: &CandidateSet<'_>,
    model: &Model,
    assignment: &[bool],
) -> Result<BTreeMap<String, Placement>> {
    if !model.is_satisfied_by(assignment) {
        return Err(Error::SolverUnavailable(
            "engine assignment violates the model".to_string(),
        ));
    }
    let mut placements = BTreeMap::new();
    for (idx, item) in set.items().iter().enumerate() {
        let mut chosen = set.ids_for(idx).filter(|&id| assignment[id]);
        let (Some(id), None) = (chosen.next(), chosen.next()) else {
            return Err(Error::SolverUnavailable(format!(
                "item '{}' is not chosen exactly once",
                item.id
            )));
        };
        let Some(c) = set.get(id) else {
            return Err(Error::SolverUnavailable(format!("unknown candidate {id}")));
        };
        placements.insert(item.id.clone(), Placement { x: c.x, y: c.y });
    }
    Ok(placements)
}
