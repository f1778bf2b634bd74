//! 0/1 feasibility model over placement candidates.
//!
//! Variable `i` is true when candidate `i` of the trial's [`CandidateSet`]
//! is chosen. Three constraint families are emitted:
//!
//! - exclusivity: every touched cell is covered at most once,
//! - coverage: every item is placed exactly once,
//! - capacity: chosen cells never exceed the strip area.
//!
//! There is no objective; engines only answer "is there an assignment".

use crate::candidates::CandidateSet;
use crate::types::Item;

pub type VarId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    Exclusivity,
    Coverage,
    Capacity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    LessEq,
    Equal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Term {
    pub var: VarId,
    pub coef: u64,
}

/// `sum(coef * var) <relation> rhs`, coefficients non-negative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinearConstraint {
    pub kind: ConstraintKind,
    pub name: String,
    pub terms: Vec<Term>,
    pub relation: Relation,
    pub rhs: u64,
}

impl LinearConstraint {
    pub fn lhs(&self, assignment: &[bool]) -> u64 {
        self.terms
            .iter()
            .filter(|t| assignment[t.var])
            .map(|t| t.coef)
            .sum()
    }

    pub fn is_satisfied_by(&self, assignment: &[bool]) -> bool {
        let lhs = self.lhs(assignment);
        match self.relation {
            Relation::LessEq => lhs <= self.rhs,
            Relation::Equal => lhs == self.rhs,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Model {
    num_vars: usize,
    constraints: Vec<LinearConstraint>,
}

impl Model {
    /// Model with hand-written rows, for engines and tests that do not go
    /// through [`build`].
    pub fn from_parts(num_vars: usize, constraints: Vec<LinearConstraint>) -> Self {
        Self {
            num_vars,
            constraints,
        }
    }

    pub fn num_vars(&self) -> usize {
        self.num_vars
    }

    pub fn constraints(&self) -> &[LinearConstraint] {
        &self.constraints
    }

    pub fn count(&self, kind: ConstraintKind) -> usize {
        self.constraints.iter().filter(|c| c.kind == kind).count()
    }

    pub fn is_satisfied_by(&self, assignment: &[bool]) -> bool {
        assignment.len() == self.num_vars
            && self.constraints.iter().all(|c| c.is_satisfied_by(assignment))
    }
}

/// Builds the model for one trial. Reads `items` and `candidates` only.
pub fn build(items: &[Item], candidates: &CandidateSet<'_>, width: u32, height: u32) -> Model {
    debug_assert_eq!(items.len(), candidates.items().len());
    debug_assert_eq!((width, height), (candidates.width(), candidates.height()));

    let mut constraints = Vec::new();

    // Cell index y * width + x keeps the rows in row-major order.
    let mut covering: Vec<Vec<VarId>> = vec![Vec::new(); width as usize * height as usize];
    for (id, c) in candidates.iter() {
        for (x, y) in c.cells() {
            covering[y as usize * width as usize + x as usize].push(id);
        }
    }
    for (cell, vars) in covering.into_iter().enumerate() {
        if vars.is_empty() {
            continue;
        }
        let (x, y) = (cell % width as usize, cell / width as usize);
        constraints.push(LinearConstraint {
            kind: ConstraintKind::Exclusivity,
            name: format!("cell_{x}_{y}"),
            terms: vars.into_iter().map(|var| Term { var, coef: 1 }).collect(),
            relation: Relation::LessEq,
            rhs: 1,
        });
    }

    for (idx, item) in items.iter().enumerate() {
        constraints.push(LinearConstraint {
            kind: ConstraintKind::Coverage,
            name: format!("place_{}", item.id),
            terms: candidates
                .ids_for(idx)
                .map(|var| Term { var, coef: 1 })
                .collect(),
            relation: Relation::Equal,
            rhs: 1,
        });
    }

    constraints.push(LinearConstraint {
        kind: ConstraintKind::Capacity,
        name: "capacity".to_string(),
        terms: candidates
            .iter()
            .map(|(var, c)| Term {
                var,
                coef: c.cell_count(),
            })
            .collect(),
        relation: Relation::LessEq,
        rhs: width as u64 * height as u64,
    });

    Model {
        num_vars: candidates.len(),
        constraints,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidates::generate;

    fn model_for(items: &[Item], w: u32, h: u32) -> Model {
        let set = generate(items, w, h);
        build(items, &set, w, h)
    }

    #[test]
    fn test_one_variable_per_candidate() {
        let items = vec![Item::new("a", 1, 1), Item::new("b", 2, 1)];
        let set = generate(&items, 3, 2);
        let model = build(&items, &set, 3, 2);
        assert_eq!(model.num_vars(), set.len());
    }

    #[test]
    fn test_constraint_families() {
        let items = vec![Item::new("a", 1, 1), Item::new("b", 2, 2)];
        let model = model_for(&items, 3, 3);
        // Every cell of a 3x3 strip is touched by the 1x1 item.
        assert_eq!(model.count(ConstraintKind::Exclusivity), 9);
        assert_eq!(model.count(ConstraintKind::Coverage), 2);
        assert_eq!(model.count(ConstraintKind::Capacity), 1);

        let capacity = model.constraints().last().unwrap();
        assert_eq!(capacity.kind, ConstraintKind::Capacity);
        assert_eq!(capacity.rhs, 9);
        assert!(capacity.terms.iter().any(|t| t.coef == 4));
    }

    #[test]
    fn test_cell_rows_list_covering_candidates() {
        let items = vec![Item::new("a", 2, 2)];
        let model = model_for(&items, 3, 2);
        assert_eq!(model.count(ConstraintKind::Exclusivity), 6);
        let corner = model
            .constraints()
            .iter()
            .find(|c| c.name == "cell_0_0")
            .unwrap();
        assert_eq!(corner.terms.len(), 1);
        let middle = model
            .constraints()
            .iter()
            .find(|c| c.name == "cell_1_0")
            .unwrap();
        assert_eq!(middle.terms.len(), 2);
    }

    #[test]
    fn test_untouched_strip_has_no_cell_rows() {
        let items = vec![Item::new("wide", 4, 1)];
        let model = model_for(&items, 2, 2);
        assert_eq!(model.count(ConstraintKind::Exclusivity), 0);
        assert_eq!(model.num_vars(), 0);
    }

    #[test]
    fn test_unplaceable_item_gives_empty_equality() {
        let items = vec![Item::new("tall", 1, 4)];
        let model = model_for(&items, 2, 2);
        let cover = model
            .constraints()
            .iter()
            .find(|c| c.kind == ConstraintKind::Coverage)
            .unwrap();
        assert!(cover.terms.is_empty());
        assert_eq!(cover.relation, Relation::Equal);
        assert!(!model.is_satisfied_by(&[]));
    }

    #[test]
    fn test_overlapping_assignment_is_rejected() {
        let items = vec![Item::new("a", 1, 1), Item::new("b", 1, 1)];
        let set = generate(&items, 2, 1);
        let model = build(&items, &set, 2, 1);
        // ids: a@(0,0)=0, a@(1,0)=1, b@(0,0)=2, b@(1,0)=3
        assert!(model.is_satisfied_by(&[true, false, false, true]));
        assert!(!model.is_satisfied_by(&[true, false, true, false]));
        assert!(!model.is_satisfied_by(&[true, true, false, true]));
    }
}
