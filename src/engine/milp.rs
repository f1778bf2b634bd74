//! HiGHS-backed engine through `good_lp`.
//!
//! Every model variable becomes a binary column, every constraint a row,
//! and the objective is the constant zero. HiGHS only sees the per-trial
//! time limit; cancellation is honoured before the call.

use good_lp::solvers::WithTimeLimit;
use good_lp::{
    Expression, ProblemVariables, ResolutionError, Solution, SolverModel, Variable, constraint,
    variable,
};

use super::{Budget, Engine, EngineContext, EngineError, Verdict};
use crate::model::{Model, Relation};

#[derive(Debug, Clone, Copy, Default)]
pub struct MilpEngine;

impl Engine for MilpEngine {
    fn name(&self) -> &'static str {
        "milp"
    }

    fn context(&self) -> Box<dyn EngineContext> {
        Box::new(MilpContext::default())
    }
}

#[derive(Debug, Default)]
struct MilpContext {
    model: Option<Model>,
    solution: Option<Vec<bool>>,
}

impl EngineContext for MilpContext {
    fn load(&mut self, model: &Model) -> Result<(), EngineError> {
        self.model = Some(model.clone());
        self.solution = None;
        Ok(())
    }

    fn solve(&mut self, budget: &Budget) -> Result<Verdict, EngineError> {
        budget.check()?;
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| EngineError::Unavailable("no model loaded".to_string()))?;

        let mut vars = ProblemVariables::new();
        let x: Vec<Variable> = (0..model.num_vars())
            .map(|i| vars.add(variable().binary().name(format!("x_{i}"))))
            .collect();

        let mut problem = vars.minimise(0.0).using(good_lp::highs);
        if let Some(remaining) = budget.remaining() {
            problem = problem.with_time_limit(remaining.as_secs_f64());
        }

        for c in model.constraints() {
            let lhs: Expression = c.terms.iter().map(|t| t.coef as f64 * x[t.var]).sum();
            let rhs = c.rhs as f64;
            problem = match c.relation {
                Relation::LessEq => problem.with(constraint!(lhs <= rhs)),
                Relation::Equal => problem.with(constraint!(lhs == rhs)),
            };
        }

        tracing::debug!(
            vars = x.len(),
            rows = model.constraints().len(),
            "solving with HiGHS"
        );

        match problem.solve() {
            Ok(solution) => {
                self.solution = Some(x.iter().map(|&v| solution.value(v) > 0.5).collect());
                Ok(Verdict::Feasible)
            }
            Err(ResolutionError::Infeasible) => Ok(Verdict::Infeasible),
            Err(_) if budget.expired() => Err(EngineError::Timeout),
            Err(e) => Err(EngineError::Unavailable(format!("HiGHS: {e}"))),
        }
    }

    fn assignment(&self) -> Option<Vec<bool>> {
        self.solution.clone()
    }
}
