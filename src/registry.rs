//! Rule plugin contract and the registry that scopes rules to entity kinds.
//!
//! Rules are registered explicitly, in a fixed order, by whoever builds the
//! engine. Evaluation goes through `evaluate_guarded`, the fault boundary: a
//! rule that errors or panics is logged and counts as "no issue".

use crate::error::{LintelError, Result, RuleError};
use crate::models::entity::{EntityFilter, EntityKind};
use crate::models::{Issue, TrackedPath};
use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::warn;

/// A pure check of one path, plus configuration captured at construction.
///
/// Implementations must not block; a slow rule stalls the tick that runs it.
pub trait Rule: Send + Sync {
    /// Stable identifier, unique within a registry.
    fn id(&self) -> &str;

    /// Which entity kinds this rule applies to. Defaults to all of them.
    fn applicable_type(&self) -> EntityFilter {
        EntityFilter::Any
    }

    fn evaluate(&self, path: &str) -> std::result::Result<Option<Issue>, RuleError>;

    /// Directories whose direct entries this rule must re-check when
    /// `changed` appears, disappears or changes. Rules that read only their
    /// own path keep the empty default.
    fn dependent_dirs(&self, _changed: &str) -> Vec<TrackedPath> {
        Vec::new()
    }
}

/// Ordered collection of rules.
#[derive(Default, Clone)]
pub struct RuleRegistry {
    rules: Vec<Arc<dyn Rule>>,
}

impl std::fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.rules.iter().map(|r| r.id().to_string()))
            .finish()
    }
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, rule: impl Rule + 'static) -> Result<()> {
        self.register_arc(Arc::new(rule))
    }

    /// Append a shared rule. Ids must be unique so ordering stays total.
    pub fn register_arc(&mut self, rule: Arc<dyn Rule>) -> Result<()> {
        if self.get(rule.id()).is_some() {
            return Err(LintelError::DuplicateRule(rule.id().to_string()));
        }
        self.rules.push(rule);
        Ok(())
    }

    /// Rules whose filter admits `kind`, in registration order.
    pub fn rules_for(&self, kind: EntityKind) -> Vec<Arc<dyn Rule>> {
        self.rules
            .iter()
            .filter(|r| r.applicable_type().admits(kind))
            .cloned()
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn Rule>> {
        self.rules.iter().find(|r| r.id() == id)
    }

    pub fn rules(&self) -> &[Arc<dyn Rule>] {
        &self.rules
    }

    /// Paths among `tracked` whose result may change because `changed` did,
    /// as declared through `Rule::dependent_dirs`.
    pub fn dependents<'a>(
        &self,
        changed: impl IntoIterator<Item = &'a TrackedPath>,
        tracked: impl IntoIterator<Item = &'a TrackedPath>,
    ) -> BTreeSet<TrackedPath> {
        let mut watched: BTreeMap<TrackedPath, Vec<EntityFilter>> = BTreeMap::new();
        for path in changed {
            for rule in &self.rules {
                for dir in rule.dependent_dirs(path) {
                    watched.entry(dir).or_default().push(rule.applicable_type());
                }
            }
        }
        if watched.is_empty() {
            return BTreeSet::new();
        }
        tracked
            .into_iter()
            .filter(|p| {
                let dir = p.rsplit_once('/').map_or("", |(d, _)| d);
                let kind = EntityKind::of(p);
                watched
                    .get(dir)
                    .is_some_and(|filters| filters.iter().any(|f| f.admits(kind)))
            })
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Evaluate one (path, rule) pair inside the fault boundary.
pub fn evaluate_guarded(rule: &dyn Rule, path: &str) -> Option<Issue> {
    match catch_unwind(AssertUnwindSafe(|| rule.evaluate(path))) {
        Ok(Ok(found)) => found,
        Ok(Err(e)) => {
            warn!(rule = rule.id(), path, error = %e, "rule evaluation failed");
            None
        }
        Err(payload) => {
            warn!(
                rule = rule.id(),
                path,
                panic = %panic_message(payload.as_ref()),
                "rule panicked during evaluation"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Severity;

    struct Flag {
        id: &'static str,
        filter: EntityFilter,
    }

    impl Rule for Flag {
        fn id(&self) -> &str {
            self.id
        }
        fn applicable_type(&self) -> EntityFilter {
            self.filter
        }
        fn evaluate(&self, path: &str) -> std::result::Result<Option<Issue>, RuleError> {
            Ok(Some(Issue::new(path, self.id, Severity::Info, "flagged")))
        }
    }

    /// Re-checks manifests in every ancestor directory of a changed script.
    struct Ancestors;

    impl Rule for Ancestors {
        fn id(&self) -> &str {
            "ancestors"
        }
        fn applicable_type(&self) -> EntityFilter {
            EntityFilter::Kind(EntityKind::AssemblyDefinition)
        }
        fn evaluate(&self, _path: &str) -> std::result::Result<Option<Issue>, RuleError> {
            Ok(None)
        }
        fn dependent_dirs(&self, changed: &str) -> Vec<TrackedPath> {
            let mut dirs = Vec::new();
            let mut rest = changed;
            while let Some((dir, _)) = rest.rsplit_once('/') {
                dirs.push(dir.to_string());
                rest = dir;
            }
            dirs
        }
    }

    struct Broken;

    impl Rule for Broken {
        fn id(&self) -> &str {
            "broken"
        }
        fn evaluate(&self, path: &str) -> std::result::Result<Option<Issue>, RuleError> {
            if path.ends_with(".cs") {
                panic!("cannot read {}", path);
            }
            Err(RuleError("unreadable".into()))
        }
    }

    #[test]
    fn rules_for_respects_filter_and_order() {
        let mut reg = RuleRegistry::new();
        reg.register(Flag { id: "scenes", filter: EntityFilter::Kind(EntityKind::Scene) })
            .unwrap();
        reg.register(Flag { id: "all", filter: EntityFilter::Any }).unwrap();
        reg.register(Flag { id: "scripts", filter: EntityFilter::Kind(EntityKind::Script) })
            .unwrap();

        let ids: Vec<String> = reg
            .rules_for(EntityKind::Scene)
            .iter()
            .map(|r| r.id().to_string())
            .collect();
        assert_eq!(ids, vec!["scenes", "all"]);
        let ids: Vec<String> = reg
            .rules_for(EntityKind::Other)
            .iter()
            .map(|r| r.id().to_string())
            .collect();
        assert_eq!(ids, vec!["all"]);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut reg = RuleRegistry::new();
        reg.register(Flag { id: "x", filter: EntityFilter::Any }).unwrap();
        let err = reg
            .register(Flag { id: "x", filter: EntityFilter::Any })
            .unwrap_err();
        assert!(matches!(err, LintelError::DuplicateRule(id) if id == "x"));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn dependents_follow_declared_directories_and_kinds() {
        let mut reg = RuleRegistry::new();
        reg.register(Flag { id: "all", filter: EntityFilter::Any }).unwrap();
        reg.register(Ancestors).unwrap();
        let tracked: Vec<TrackedPath> = [
            "Assets/Game/Game.asmdef",
            "Assets/Game/Notes.txt",
            "Assets/Game/Sub/Sub.asmdef",
            "Assets/Other/Other.asmdef",
            "Assets/Root.asmdef",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let changed = vec!["Assets/Game/Player.cs".to_string()];

        let deps: Vec<TrackedPath> = reg
            .dependents(&changed, &tracked)
            .into_iter()
            .collect();
        assert_eq!(deps, vec!["Assets/Game/Game.asmdef", "Assets/Root.asmdef"]);

        let plain = {
            let mut r = RuleRegistry::new();
            r.register(Flag { id: "all", filter: EntityFilter::Any }).unwrap();
            r
        };
        assert!(plain.dependents(&changed, &tracked).is_empty());
    }

    #[test]
    fn errors_and_panics_become_no_issue() {
        assert!(evaluate_guarded(&Broken, "Assets/a.txt").is_none());
        assert!(evaluate_guarded(&Broken, "Assets/A.cs").is_none());
        let flag = Flag { id: "f", filter: EntityFilter::Any };
        assert_eq!(
            evaluate_guarded(&flag, "Assets/a.txt").map(|i| i.path),
            Some("Assets/a.txt".to_string())
        );
    }
}
