//! Chain definition and build-time validation
//!
//! A [`Chain`] only exists once [`ChainBuilder::build`] has checked every step
//! id and dependency, so the engine never meets a dangling reference or a cycle
//! at run time.

use super::error::{BuildIssue, ChainBuildError};
use super::step::Step;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

/// A validated graph of steps, stored in execution order
#[derive(Debug, Clone)]
pub struct Chain {
    id: String,
    name: String,
    steps: Vec<Arc<Step>>,
}

impl Chain {
    /// Create a new chain builder
    pub fn builder(id: impl Into<String>) -> ChainBuilder {
        ChainBuilder::new(id)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Top-level steps, dependencies first
    pub fn steps(&self) -> &[Arc<Step>] {
        &self.steps
    }

    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id).map(Arc::as_ref)
    }

    /// Ids of the top-level steps in the order the engine runs them
    pub fn execution_order(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Builder for [`Chain`]
#[derive(Debug, Clone)]
pub struct ChainBuilder {
    id: String,
    name: Option<String>,
    steps: Vec<Step>,
}

impl ChainBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            steps: Vec::new(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Append a top-level step
    pub fn step(mut self, step: impl Into<Step>) -> Self {
        self.steps.push(step.into());
        self
    }

    /// Validate the graph and fix the execution order
    ///
    /// Every issue is collected before failing, so one error lists all
    /// duplicate ids, unknown dependencies and cycles at once.
    pub fn build(self) -> Result<Chain, ChainBuildError> {
        let mut issues = Vec::new();
        check_ids(&self.steps, &mut issues);

        let index: HashMap<&str, usize> = self
            .steps
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id.as_str(), i))
            .collect();

        // dependencies[i] holds the indices step i waits on
        let mut dependencies: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); self.steps.len()];
        for (i, step) in self.steps.iter().enumerate() {
            for dep in &step.depends_on {
                match index.get(dep.as_str()) {
                    Some(&d) => {
                        dependencies[i].insert(d);
                    }
                    None => issues.push(BuildIssue::MissingDependency {
                        step: step.id.clone(),
                        dependency: dep.clone(),
                    }),
                }
            }
        }

        let order = match topological_order(&dependencies) {
            Ok(order) => order,
            Err(stuck) => {
                issues.push(BuildIssue::Cycle(
                    stuck.into_iter().map(|i| self.steps[i].id.clone()).collect(),
                ));
                Vec::new()
            }
        };

        if !issues.is_empty() {
            return Err(ChainBuildError {
                chain: self.id,
                issues,
            });
        }

        let mut slots: Vec<Option<Step>> = self.steps.into_iter().map(Some).collect();
        let steps = order
            .into_iter()
            .filter_map(|i| slots[i].take())
            .map(Arc::new)
            .collect();

        tracing::debug!(chain = %self.id, "chain built");
        Ok(Chain {
            name: self.name.unwrap_or_else(|| self.id.clone()),
            id: self.id,
            steps,
        })
    }
}

/// Report empty and duplicate ids across top-level and nested steps
fn check_ids(steps: &[Step], issues: &mut Vec<BuildIssue>) {
    fn visit<'a>(step: &'a Step, seen: &mut HashSet<&'a str>, reported: &mut HashSet<&'a str>, issues: &mut Vec<BuildIssue>) {
        if step.id.trim().is_empty() {
            if reported.insert("") {
                issues.push(BuildIssue::EmptyStepId);
            }
        } else if !seen.insert(step.id.as_str()) && reported.insert(step.id.as_str()) {
            issues.push(BuildIssue::DuplicateStepId(step.id.clone()));
        }
        for child in step.kind.children() {
            visit(child, seen, reported, issues);
        }
    }

    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    for step in steps {
        visit(step, &mut seen, &mut reported, issues);
    }
}

/// Kahn's algorithm, always taking the earliest-declared ready step
///
/// On a cycle, returns the indices that could never become ready.
fn topological_order(dependencies: &[BTreeSet<usize>]) -> Result<Vec<usize>, Vec<usize>> {
    let count = dependencies.len();
    let mut remaining: Vec<usize> = dependencies.iter().map(BTreeSet::len).collect();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); count];
    for (i, deps) in dependencies.iter().enumerate() {
        for &d in deps {
            dependents[d].push(i);
        }
    }

    let mut ready: BTreeSet<usize> = (0..count).filter(|&i| remaining[i] == 0).collect();
    let mut order = Vec::with_capacity(count);
    while let Some(next) = ready.pop_first() {
        order.push(next);
        for &dependent in &dependents[next] {
            remaining[dependent] -= 1;
            if remaining[dependent] == 0 {
                ready.insert(dependent);
            }
        }
    }

    if order.len() == count {
        Ok(order)
    } else {
        Err((0..count).filter(|&i| remaining[i] > 0).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn noop(id: &str) -> crate::workflow::StepBuilder {
        Step::transform(id, |_, _| Ok(Value::Null))
    }

    #[test]
    fn test_declaration_order_without_dependencies() {
        let chain = ChainBuilder::new("plain")
            .step(noop("a"))
            .step(noop("b"))
            .step(noop("c"))
            .build()
            .unwrap();

        assert_eq!(chain.execution_order(), vec!["a", "b", "c"]);
        assert_eq!(chain.name(), "plain");
    }

    #[test]
    fn test_dependencies_reorder_steps() {
        let chain = ChainBuilder::new("deps")
            .name("Dependency ordering")
            .step(noop("report").depends_on("parse"))
            .step(noop("parse").depends_on("fetch"))
            .step(noop("fetch"))
            .step(noop("audit"))
            .build()
            .unwrap();

        assert_eq!(chain.execution_order(), vec!["fetch", "parse", "report", "audit"]);
        assert!(chain.step("parse").is_some());
    }

    #[test]
    fn test_missing_dependency_and_duplicate_reported_together() {
        let err = ChainBuilder::new("broken")
            .step(noop("a"))
            .step(noop("a"))
            .step(noop("b").depends_on("ghost"))
            .build()
            .unwrap_err();

        assert_eq!(err.chain, "broken");
        assert!(err.issues.contains(&BuildIssue::DuplicateStepId("a".into())));
        assert!(err.issues.contains(&BuildIssue::MissingDependency {
            step: "b".into(),
            dependency: "ghost".into(),
        }));
    }

    #[test]
    fn test_cycle_detected() {
        let err = ChainBuilder::new("loop")
            .step(noop("a").depends_on("c"))
            .step(noop("b").depends_on("a"))
            .step(noop("c").depends_on("b"))
            .step(noop("free"))
            .build()
            .unwrap_err();

        assert_eq!(
            err.issues,
            vec![BuildIssue::Cycle(vec!["a".into(), "b".into(), "c".into()])]
        );
    }

    #[test]
    fn test_self_dependency_is_cycle() {
        let err = ChainBuilder::new("self")
            .step(noop("a").depends_on("a"))
            .build()
            .unwrap_err();
        assert_eq!(err.issues, vec![BuildIssue::Cycle(vec!["a".into()])]);
    }

    #[test]
    fn test_nested_duplicate_and_empty_ids() {
        let err = ChainBuilder::new("nested")
            .step(noop("x"))
            .step(Step::parallel("group", [noop("x"), noop("")]))
            .build()
            .unwrap_err();

        assert!(err.issues.contains(&BuildIssue::DuplicateStepId("x".into())));
        assert!(err.issues.contains(&BuildIssue::EmptyStepId));
    }
}
