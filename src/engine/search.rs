//! Built-in exact engine for 0/1 models with non-negative coefficients.
//!
//! Depth-first search with propagation. Each row tracks the weight of its
//! true variables (`fixed`) and of its unassigned ones (`free`); a row
//! forces a variable false when taking it would overshoot `rhs`, and an
//! equality row forces a variable true when the row cannot reach `rhs`
//! without it. Branching follows Algorithm X: pick the open equality row
//! with the fewest unassigned variables and try each of them in turn.
//!
//! Once every equality row is met the remaining variables are set false,
//! which keeps every `<=` row satisfied.

use super::{Budget, Engine, EngineContext, EngineError, Verdict};
use crate::model::{Model, Relation, VarId};

/// How many search nodes between budget checks.
const CHECK_INTERVAL: u64 = 256;

#[derive(Debug, Clone, Copy, Default)]
pub struct SearchEngine;

impl Engine for SearchEngine {
    fn name(&self) -> &'static str {
        "search"
    }

    fn context(&self) -> Box<dyn EngineContext> {
        Box::new(SearchContext::default())
    }
}

#[derive(Debug, Clone)]
struct Row {
    terms: Vec<(VarId, u64)>,
    equal: bool,
    rhs: u64,
    max_coef: u64,
    fixed: u64,
    free: u64,
    free_count: usize,
}

#[derive(Debug, Default)]
pub struct SearchContext {
    rows: Vec<Row>,
    /// Rows each variable appears in, with its coefficient.
    occurs: Vec<Vec<(usize, u64)>>,
    equalities: Vec<usize>,
    values: Vec<Option<bool>>,
    trail: Vec<VarId>,
    queue: Vec<usize>,
    nodes: u64,
    solution: Option<Vec<bool>>,
}

impl SearchContext {
    fn assign(&mut self, var: VarId, value: bool) {
        self.values[var] = Some(value);
        self.trail.push(var);
        for &(r, coef) in &self.occurs[var] {
            let row = &mut self.rows[r];
            row.free -= coef;
            row.free_count -= 1;
            if value {
                row.fixed += coef;
            }
            self.queue.push(r);
        }
    }

    fn undo_to(&mut self, mark: usize) {
        while self.trail.len() > mark {
            let Some(var) = self.trail.pop() else { break };
            let value = self.values[var].take() == Some(true);
            for &(r, coef) in &self.occurs[var] {
                let row = &mut self.rows[r];
                row.free += coef;
                row.free_count += 1;
                if value {
                    row.fixed -= coef;
                }
            }
        }
    }

    /// Assigns `var` and propagates to a fixpoint. False on conflict; the
    /// caller undoes the trail.
    fn decide(&mut self, var: VarId, value: bool) -> bool {
        self.queue.clear();
        self.assign(var, value);
        self.propagate()
    }

    fn propagate(&mut self) -> bool {
        let mut forced = Vec::new();
        while let Some(r) = self.queue.pop() {
            let row = &self.rows[r];
            if row.fixed > row.rhs || (row.equal && row.fixed + row.free < row.rhs) {
                self.queue.clear();
                return false;
            }
            let may_force_false = row.fixed + row.max_coef > row.rhs;
            let may_force_true = row.equal && row.fixed + row.free < row.rhs + row.max_coef;
            if !may_force_false && !may_force_true {
                continue;
            }
            for &(var, coef) in &row.terms {
                if self.values[var].is_some() {
                    continue;
                }
                if row.fixed + coef > row.rhs {
                    forced.push((var, false));
                } else if row.equal && row.fixed + row.free - coef < row.rhs {
                    forced.push((var, true));
                }
            }
            for (var, value) in forced.drain(..) {
                if self.values[var].is_none() {
                    self.assign(var, value);
                }
            }
        }
        true
    }

    /// Open equality row with the fewest unassigned variables.
    fn pick_row(&self) -> Option<usize> {
        self.equalities
            .iter()
            .copied()
            .filter(|&r| self.rows[r].fixed < self.rows[r].rhs)
            .min_by_key(|&r| self.rows[r].free_count)
    }

    fn first_free(&self, r: usize) -> Option<VarId> {
        self.rows[r]
            .terms
            .iter()
            .map(|&(var, _)| var)
            .find(|&var| self.values[var].is_none())
    }

    fn is_open(&self, r: usize) -> bool {
        self.rows[r].fixed < self.rows[r].rhs
    }

    fn search(&mut self, budget: &Budget) -> Result<bool, EngineError> {
        self.nodes += 1;
        if self.nodes % CHECK_INTERVAL == 0 {
            budget.check()?;
        }

        let Some(r) = self.pick_row() else {
            return Ok(true);
        };
        let level = self.trail.len();

        while let Some(var) = self.first_free(r) {
            let mark = self.trail.len();
            if self.decide(var, true) && self.search(budget)? {
                return Ok(true);
            }
            self.undo_to(mark);

            if !self.decide(var, false) {
                break;
            }
            if !self.is_open(r) {
                // Propagation closed the row for us.
                if self.search(budget)? {
                    return Ok(true);
                }
                break;
            }
        }

        self.undo_to(level);
        Ok(false)
    }
}

impl EngineContext for SearchContext {
    fn load(&mut self, model: &Model) -> Result<(), EngineError> {
        let n = model.num_vars();
        let mut occurs = vec![Vec::new(); n];
        let mut rows = Vec::with_capacity(model.constraints().len());
        let mut equalities = Vec::new();

        for (r, c) in model.constraints().iter().enumerate() {
            let mut terms = Vec::with_capacity(c.terms.len());
            for t in &c.terms {
                if t.var >= n {
                    return Err(EngineError::Unavailable(format!(
                        "constraint '{}' references unknown variable {}",
                        c.name, t.var
                    )));
                }
                if t.coef > 0 {
                    terms.push((t.var, t.coef));
                    occurs[t.var].push((r, t.coef));
                }
            }
            let equal = c.relation == Relation::Equal;
            if equal {
                equalities.push(r);
            }
            rows.push(Row {
                max_coef: terms.iter().map(|&(_, coef)| coef).max().unwrap_or(0),
                free: terms.iter().map(|&(_, coef)| coef).sum(),
                free_count: terms.len(),
                fixed: 0,
                equal,
                rhs: c.rhs,
                terms,
            });
        }

        *self = SearchContext {
            rows,
            occurs,
            equalities,
            values: vec![None; n],
            ..SearchContext::default()
        };
        Ok(())
    }

    fn solve(&mut self, budget: &Budget) -> Result<Verdict, EngineError> {
        budget.check()?;
        self.solution = None;
        self.queue = (0..self.rows.len()).collect();
        if !self.propagate() {
            return Ok(Verdict::Infeasible);
        }
        if !self.search(budget)? {
            return Ok(Verdict::Infeasible);
        }
        self.solution = Some(self.values.iter().map(|v| *v == Some(true)).collect());
        Ok(Verdict::Feasible)
    }

    fn assignment(&self) -> Option<Vec<bool>> {
        self.solution.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidates::generate;
    use crate::engine::CancelToken;
    use crate::model::{self, ConstraintKind, LinearConstraint, Term};
    use crate::types::Item;
    use std::time::Duration;

    fn solve_model(model: &Model) -> (Verdict, Option<Vec<bool>>) {
        let mut ctx = SearchEngine.context();
        ctx.load(model).unwrap();
        let verdict = ctx.solve(&Budget::unlimited()).unwrap();
        (verdict, ctx.assignment())
    }

    fn strip_model(items: &[Item], w: u32, h: u32) -> Model {
        let set = generate(items, w, h);
        model::build(items, &set, w, h)
    }

    #[test]
    fn test_single_item_feasible() {
        let items = vec![Item::new("a", 2, 2)];
        let model = strip_model(&items, 2, 2);
        let (verdict, assignment) = solve_model(&model);
        assert_eq!(verdict, Verdict::Feasible);
        assert!(model.is_satisfied_by(&assignment.unwrap()));
    }

    #[test]
    fn test_two_wide_items_need_four_rows() {
        let items = vec![Item::new("a", 3, 2), Item::new("b", 3, 2)];
        for h in 2..4 {
            let (verdict, _) = solve_model(&strip_model(&items, 3, h));
            assert_eq!(verdict, Verdict::Infeasible, "height {h}");
        }
        let model = strip_model(&items, 3, 4);
        let (verdict, assignment) = solve_model(&model);
        assert_eq!(verdict, Verdict::Feasible);
        assert!(model.is_satisfied_by(&assignment.unwrap()));
    }

    #[test]
    fn test_perfect_tiling() {
        // 2x1 dominoes tiling a 4x3 strip exactly.
        let items: Vec<Item> = (0..6).map(|i| Item::new(format!("d{i}"), 2, 1)).collect();
        let model = strip_model(&items, 4, 3);
        let (verdict, assignment) = solve_model(&model);
        assert_eq!(verdict, Verdict::Feasible);
        assert!(model.is_satisfied_by(&assignment.unwrap()));
    }

    #[test]
    fn test_area_fits_but_shapes_do_not() {
        // Three 2x2 squares in a 3x4 strip: area 12 = 12, but no tiling.
        let items: Vec<Item> = (0..3).map(|i| Item::new(format!("s{i}"), 2, 2)).collect();
        let (verdict, _) = solve_model(&strip_model(&items, 3, 4));
        assert_eq!(verdict, Verdict::Infeasible);
    }

    #[test]
    fn test_empty_equality_is_infeasible() {
        let items = vec![Item::new("tall", 1, 5)];
        let (verdict, assignment) = solve_model(&strip_model(&items, 2, 2));
        assert_eq!(verdict, Verdict::Infeasible);
        assert!(assignment.is_none());
    }

    #[test]
    fn test_weighted_rows() {
        // 3a + 2b + 2c == 4, a + b <= 1
        let model_rows = vec![
            LinearConstraint {
                kind: ConstraintKind::Coverage,
                name: "sum".to_string(),
                terms: vec![
                    Term { var: 0, coef: 3 },
                    Term { var: 1, coef: 2 },
                    Term { var: 2, coef: 2 },
                ],
                relation: Relation::Equal,
                rhs: 4,
            },
            LinearConstraint {
                kind: ConstraintKind::Exclusivity,
                name: "pair".to_string(),
                terms: vec![Term { var: 0, coef: 1 }, Term { var: 1, coef: 1 }],
                relation: Relation::LessEq,
                rhs: 1,
            },
        ];
        let mut ctx = SearchContext::default();
        let model = Model::from_parts(3, model_rows);
        ctx.load(&model).unwrap();
        assert_eq!(ctx.solve(&Budget::unlimited()), Ok(Verdict::Feasible));
        assert_eq!(ctx.assignment(), Some(vec![false, true, true]));
    }

    #[test]
    fn test_cancelled_before_start() {
        let items = vec![Item::new("a", 1, 1)];
        let model = strip_model(&items, 1, 1);
        let token = CancelToken::new();
        token.cancel();
        let mut ctx = SearchEngine.context();
        ctx.load(&model).unwrap();
        let budget = Budget::new(Some(Duration::from_secs(10)), token);
        assert_eq!(ctx.solve(&budget), Err(EngineError::Cancelled));
        assert!(ctx.assignment().is_none());
    }

    #[test]
    fn test_deadline_stops_running_search() {
        // Exact area fit in an odd width: infeasible, and slow to prove.
        let items: Vec<Item> = (0..14).map(|i| Item::new(format!("s{i}"), 2, 2)).collect();
        let model = strip_model(&items, 7, 8);
        let mut ctx = SearchEngine.context();
        ctx.load(&model).unwrap();

        let started = std::time::Instant::now();
        let budget = Budget::new(Some(Duration::from_millis(50)), CancelToken::new());
        assert_eq!(ctx.solve(&budget), Err(EngineError::Timeout));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(ctx.assignment().is_none());
    }

    #[test]
    fn test_context_reload_discards_previous_model() {
        let items = vec![Item::new("a", 3, 2), Item::new("b", 3, 2)];
        let mut ctx = SearchEngine.context();
        ctx.load(&strip_model(&items, 3, 2)).unwrap();
        assert_eq!(ctx.solve(&Budget::unlimited()), Ok(Verdict::Infeasible));
        let model = strip_model(&items, 3, 4);
        ctx.load(&model).unwrap();
        assert_eq!(ctx.solve(&Budget::unlimited()), Ok(Verdict::Feasible));
        assert!(model.is_satisfied_by(&ctx.assignment().unwrap()));
    }
}
