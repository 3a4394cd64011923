// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task classes and the exclusion policy (§3 "TaskClass", §4.1).

use std::collections::{HashMap, HashSet};

use vra_core::AgentError;

/// A named class of work, represented as a small integer id (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskClassId(pub(crate) u32);

impl TaskClassId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The exclusion graph: for each registered class, the set of classes that
/// must never run concurrently with it. Symmetric by construction (§3
/// invariant: "exclusion is symmetric at run time").
#[derive(Debug, Default, Clone)]
pub struct Policy {
    names: Vec<String>,
    by_name: HashMap<String, TaskClassId>,
    excludes: Vec<HashSet<TaskClassId>>,
    /// Raw exclude names as declared, kept to detect conflicting re-registration.
    declared: Vec<Vec<String>>,
}

impl Policy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn class_id(&self, name: &str) -> Option<TaskClassId> {
        self.by_name.get(name).copied()
    }

    pub fn name(&self, id: TaskClassId) -> &str {
        &self.names[id.index()]
    }

    pub fn excludes(&self, id: TaskClassId) -> &HashSet<TaskClassId> {
        &self.excludes[id.index()]
    }

    pub fn is_excluded(&self, a: TaskClassId, b: TaskClassId) -> bool {
        self.excludes[a.index()].contains(&b)
    }

    fn ensure_class(&mut self, name: &str) -> TaskClassId {
        if let Some(id) = self.by_name.get(name) {
            return *id;
        }
        let id = TaskClassId(self.names.len() as u32);
        self.names.push(name.to_string());
        self.excludes.push(HashSet::new());
        self.declared.push(Vec::new());
        self.by_name.insert(name.to_string(), id);
        id
    }

    /// Register `name` with the given excluded class names, recomputing the
    /// symmetric closure. Excluded names may not be registered yet — they
    /// are allocated ids eagerly and resolved as declarations arrive, which
    /// is why `install_default_policy` can list a table whose entries
    /// forward-reference each other.
    ///
    /// Returns `InvariantViolation` if `name` was already declared with a
    /// *different* exclude set and classes already observed activity
    /// (checked by the caller via `used`).
    pub fn register(
        &mut self,
        name: &str,
        excludes: &[&str],
        used: &HashSet<TaskClassId>,
    ) -> Result<TaskClassId, AgentError> {
        let id = self.ensure_class(name);
        let mut declared: Vec<String> = excludes.iter().map(|s| s.to_string()).collect();
        declared.sort();

        if !self.declared[id.index()].is_empty() && self.declared[id.index()] != declared {
            if used.contains(&id) {
                return Err(AgentError::invariant(format!(
                    "class `{name}` re-registered with a different exclusion set after tasks ran"
                )));
            }
        }
        self.declared[id.index()] = declared;

        let excluded_ids: Vec<TaskClassId> =
            excludes.iter().map(|n| self.ensure_class(n)).collect();

        self.recompute_closure(id, &excluded_ids);
        Ok(id)
    }

    fn recompute_closure(&mut self, id: TaskClassId, excluded_ids: &[TaskClassId]) {
        for &other in excluded_ids {
            self.excludes[id.index()].insert(other);
            self.excludes[other.index()].insert(id);
        }
    }
}

#[cfg(test)]
#[path = "class_tests.rs"]
mod tests;
