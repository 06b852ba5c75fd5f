//! Conformance profiles declared by projected crates.

/// Base RO-Crate profile every crate conforms to.
pub const RO_CRATE_PROFILE: &str = "https://w3id.org/ro/crate/1.2-DRAFT";

/// Declared by child and parent crate references.
pub const RO_CRATE_GENERIC: &str = "https://w3id.org/ro/crate";

pub const WORKFLOW_RO_CRATE_PROFILE: &str = "https://w3id.org/workflowhub/workflow-ro-crate/1.0";

/// Workflow-run terms, added to the metadata context.
pub const WORKFLOW_RUN_TERMS: &str = "https://w3id.org/ro/terms/workflow-run/context";

/// Profile entities linked from the root of a workflow-run crate.
pub const WORKFLOW_RUN_PROFILES: [&str; 3] = [
    "https://w3id.org/ro/wfrun/process/0.5",
    "https://w3id.org/ro/wfrun/workflow/0.5",
    WORKFLOW_RO_CRATE_PROFILE,
];

/// Profiles declared by a crate, grouped by where they are declared.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Profiles {
    /// `conformsTo` of the metadata descriptor.
    pub descriptor: Vec<String>,
    /// Extra contexts of the metadata document.
    pub contexts: Vec<String>,
    /// Profile entities linked from the root dataset.
    pub entities: Vec<String>,
}

impl Profiles {
    pub fn base() -> Self {
        Self {
            descriptor: vec![RO_CRATE_PROFILE.to_string()],
            ..Self::default()
        }
    }

    /// Every declaration in order: descriptor, contexts, entities.
    pub fn declared(&self) -> Vec<&str> {
        self.descriptor
            .iter()
            .chain(&self.contexts)
            .chain(&self.entities)
            .map(String::as_str)
            .collect()
    }

    pub fn is_workflow_crate(&self) -> bool {
        self.descriptor.iter().any(|p| p == WORKFLOW_RO_CRATE_PROFILE)
    }

    pub fn is_workflow_run_crate(&self) -> bool {
        !self.entities.is_empty()
    }
}

/// Version label of a profile URI: its last path segment.
pub fn profile_version(uri: &str) -> &str {
    uri.rsplit('/').next().unwrap_or(uri)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_come_from_last_segment() {
        assert_eq!(profile_version(WORKFLOW_RUN_PROFILES[0]), "0.5");
        assert_eq!(profile_version(WORKFLOW_RO_CRATE_PROFILE), "1.0");
    }

    #[test]
    fn declared_concatenates_in_order() {
        let mut p = Profiles::base();
        p.contexts.push(WORKFLOW_RUN_TERMS.into());
        assert_eq!(p.declared(), vec![RO_CRATE_PROFILE, WORKFLOW_RUN_TERMS]);
        assert!(!p.is_workflow_crate());
    }
}
