// 📋 Screening Consolidator - Flatten an ownership tree into names to screen
//
// Root: the target itself, then its active officers and controllers.
// Other nodes, depth-first: one entity-level entry each; resolved domestic
// companies add their own active officers (never controllers).
// Everything is deduplicated on the canonical key; first occurrence wins.

use crate::canonical::canonicalize;
use crate::collaborators::{CollaboratorResult, Officer, OfficerController, RegistryId};
use crate::config::ResolverConfig;
use crate::tree::{Classification, OwnershipNode};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub const TARGET_CATEGORY: &str = "Target Company";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Entity,
    Director,
    Officer,
    Controller,
    IndividualShareholder,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScreeningEntry {
    pub display_name: String,
    pub canonical_key: String,
    pub role: Role,
    pub category: String,
    pub depth: usize,

    /// Only when the entry's own node resolved
    pub registry_id: Option<RegistryId>,

    /// Entity-level entries only
    pub classification: Option<Classification>,

    /// A lookup for this entry (or its officers) failed
    pub annotation: Option<String>,
}

/// Ordered, deduplicated screening list
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ScreeningList {
    entries: Vec<ScreeningEntry>,
}

impl ScreeningList {
    pub fn entries(&self) -> &[ScreeningEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry whose canonical key matches `name`'s
    pub fn find(&self, name: &str) -> Option<&ScreeningEntry> {
        let key = canonicalize(name);
        self.entries.iter().find(|e| e.canonical_key == key)
    }
}

/// Builds a ScreeningList while enforcing first-wins dedup
#[derive(Default)]
struct ListBuilder {
    entries: Vec<ScreeningEntry>,
    by_key: HashMap<String, usize>,
}

impl ListBuilder {
    /// Returns the index holding this key, or None for an empty key
    fn push(&mut self, entry: ScreeningEntry) -> Option<usize> {
        if entry.canonical_key.is_empty() {
            return None;
        }

        if let Some(&index) = self.by_key.get(&entry.canonical_key) {
            let existing = &mut self.entries[index];
            if existing.registry_id.is_none() && entry.registry_id.is_some() {
                existing.registry_id = entry.registry_id;
            }
            if existing.annotation.is_none() && entry.annotation.is_some() {
                existing.annotation = entry.annotation;
            }
            return Some(index);
        }

        let index = self.entries.len();
        self.by_key.insert(entry.canonical_key.clone(), index);
        self.entries.push(entry);
        Some(index)
    }

    fn annotate(&mut self, index: Option<usize>, message: String) {
        if let Some(entry) = index.and_then(|i| self.entries.get_mut(i)) {
            if entry.annotation.is_none() {
                entry.annotation = Some(message);
            }
        }
    }

    fn finish(self) -> ScreeningList {
        ScreeningList {
            entries: self.entries,
        }
    }
}

// ============================================================================
// CONSOLIDATOR
// ============================================================================

pub struct ScreeningConsolidator {
    officers: Arc<dyn OfficerController>,
    individual_threshold_pct: f64,
}

impl ScreeningConsolidator {
    pub fn new(officers: Arc<dyn OfficerController>, config: &ResolverConfig) -> Self {
        ScreeningConsolidator {
            officers,
            individual_threshold_pct: config.individual_threshold_pct,
        }
    }

    /// Flatten `tree` into a screening list. Never fails: officer lookup
    /// failures annotate the owning entity entry.
    pub async fn consolidate(&self, tree: &OwnershipNode) -> ScreeningList {
        let mut list = ListBuilder::default();

        // Officer lookups for every resolved domestic node below the root, in one batch
        let nodes = tree.walk();
        let lookups = join_all(nodes.iter().skip(1).map(|node| async move {
            match (node.classification(), node.identity()) {
                (Classification::DomesticResolved, Some(id)) => Some(self.officers.get_officers(id).await),
                _ => None,
            }
        }))
        .await;

        self.add_root(&mut list, tree).await;

        // Depth-first over the non-root nodes, remembering each node's parent name
        let mut stack: Vec<(&OwnershipNode, &str)> = tree
            .children()
            .iter()
            .rev()
            .map(|child| (child, tree.display_name()))
            .collect();
        let mut lookups = lookups.into_iter();

        while let Some((node, parent)) = stack.pop() {
            let officers = lookups.next().flatten();
            self.add_node(&mut list, node, parent, officers);
            stack.extend(
                node.children()
                    .iter()
                    .rev()
                    .map(|child| (child, node.display_name())),
            );
        }

        let list = list.finish();
        debug!(target_name = tree.display_name(), entries = list.len(), "screening list consolidated");
        list
    }

    async fn add_root(&self, list: &mut ListBuilder, root: &OwnershipNode) {
        let index = list.push(entity_entry(root, TARGET_CATEGORY.to_string()));

        let Some(id) = root.identity() else {
            return;
        };

        let category = format!("Controllers/Officers of {}", root.display_name());
        let (officers, controllers) = futures::join!(
            self.officers.get_officers(id),
            self.officers.get_controllers(id)
        );

        for (result, role) in [(officers, None), (controllers, Some(Role::Controller))] {
            match result {
                Ok(people) => {
                    for person in people.iter().filter(|p| p.is_active()) {
                        let role = role.unwrap_or_else(|| officer_role(person));
                        list.push(person_entry(person, role, category.clone(), root.depth()));
                    }
                }
                Err(e) => {
                    warn!(entity = %id, error = %e, "target officer/controller lookup failed");
                    list.annotate(index, e.to_string());
                }
            }
        }
    }

    fn add_node(
        &self,
        list: &mut ListBuilder,
        node: &OwnershipNode,
        parent: &str,
        officers: Option<CollaboratorResult<Vec<Officer>>>,
    ) {
        if node.classification() == Classification::Individual {
            if node.ownership_pct() >= self.individual_threshold_pct {
                let mut entry = entity_entry(node, format!("Individual Shareholders of {}", parent));
                entry.role = Role::IndividualShareholder;
                list.push(entry);
            }
            return;
        }

        let index = list.push(entity_entry(node, depth_category(node.depth()).to_string()));

        match officers {
            Some(Ok(people)) => {
                for person in people.iter().filter(|p| p.is_active()) {
                    let category = officer_category(person, node.display_name());
                    list.push(person_entry(person, officer_role(person), category, node.depth()));
                }
            }
            Some(Err(e)) => {
                warn!(entity = node.display_name(), error = %e, "officer lookup failed");
                list.annotate(index, e.to_string());
            }
            None => {}
        }
    }
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn entity_entry(node: &OwnershipNode, category: String) -> ScreeningEntry {
    let registry_id = if node.classification().is_resolved() {
        node.identity().cloned()
    } else {
        None
    };

    ScreeningEntry {
        display_name: node.display_name().to_string(),
        canonical_key: canonicalize(node.display_name()),
        role: Role::Entity,
        category,
        depth: node.depth(),
        registry_id,
        classification: Some(node.classification()),
        annotation: node.failure().map(|f| f.to_string()),
    }
}

fn person_entry(person: &Officer, role: Role, category: String, depth: usize) -> ScreeningEntry {
    ScreeningEntry {
        display_name: person.name.trim().to_string(),
        canonical_key: canonicalize(&person.name),
        role,
        category,
        depth,
        registry_id: None,
        classification: None,
        annotation: None,
    }
}

fn officer_role(officer: &Officer) -> Role {
    if officer.role.to_lowercase().contains("director") {
        Role::Director
    } else {
        Role::Officer
    }
}

/// Category for an entity entry by its depth below the target
pub fn depth_category(depth: usize) -> &'static str {
    match depth {
        0 => TARGET_CATEGORY,
        1 => "Corporate Shareholders",
        2 => "Parent Companies",
        3 => "Grandparent Companies",
        _ => "Ultimate Parent Companies",
    }
}

/// "Directors of X", "Company Secretaries of X" or "Officers of X"
pub fn officer_category(officer: &Officer, company: &str) -> String {
    let role = officer.role.to_lowercase();
    if role.contains("director") {
        format!("Directors of {}", company)
    } else if role.contains("secretary") {
        format!("Company Secretaries of {}", company)
    } else {
        format!("Officers of {}", company)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{CallSite, FixtureCompany, FixtureRegistry};
    use crate::tree::{Collaborators, OwnershipTreeBuilder};

    async fn screen(registry: Arc<FixtureRegistry>, target: &str) -> ScreeningList {
        let config = ResolverConfig::default();
        let builder = OwnershipTreeBuilder::new(Collaborators::from_registry(registry.clone()), config.clone());
        let tree = builder.build(&RegistryId::new(target), 0, config.max_depth).await;
        ScreeningConsolidator::new(registry, &config).consolidate(&tree).await
    }

    fn group() -> FixtureRegistry {
        FixtureRegistry::new()
            .with_company(
                FixtureCompany::new("T", "TARGET TRADING LIMITED")
                    .shareholder("ENTERPRISE LTD", 80, 80.0)
                    .shareholder("John Smith", 15, 15.0)
                    .shareholder("Amy Small", 5, 5.0)
                    .officer("Alice Brown", "director")
                    .officer("Carol White", "secretary")
                    .controller("Enterprise Limited", &["ownership-of-shares-75-to-100-percent"]),
            )
            .with_company(
                FixtureCompany::new("E", "ENTERPRISE LIMITED")
                    .shareholder("EAGLE PARENT HOLDINGS LIMITED", 100, 100.0)
                    .officer("Bob Green", "director")
                    .officer("Dan Black", "secretary")
                    .controller("Zed Hidden", &["ownership-of-shares-75-to-100-percent"]),
            )
            .with_company(FixtureCompany::new("P", "EAGLE PARENT HOLDINGS LIMITED").officer("Alice Brown", "director"))
    }

    #[tokio::test]
    async fn test_root_entries_come_first() {
        let list = screen(Arc::new(group()), "T").await;
        let entries = list.entries();

        assert_eq!(entries[0].display_name, "TARGET TRADING LIMITED");
        assert_eq!(entries[0].category, TARGET_CATEGORY);
        assert_eq!(entries[0].registry_id.as_ref().map(|i| i.as_str()), Some("T"));

        assert_eq!(entries[1].display_name, "Alice Brown");
        assert_eq!(entries[1].role, Role::Director);
        assert_eq!(entries[1].category, "Controllers/Officers of TARGET TRADING LIMITED");
        assert_eq!(entries[2].role, Role::Officer);
        assert_eq!(entries[3].role, Role::Controller);
        assert_eq!(entries[3].canonical_key, "enterprise");
    }

    #[tokio::test]
    async fn test_dedup_first_wins_and_fills_registry_id() {
        let list = screen(Arc::new(group()), "T").await;

        let enterprise: Vec<&ScreeningEntry> = list
            .entries()
            .iter()
            .filter(|e| e.canonical_key == "enterprise")
            .collect();

        assert_eq!(enterprise.len(), 1);
        assert_eq!(enterprise[0].display_name, "Enterprise Limited");
        assert_eq!(enterprise[0].role, Role::Controller);
        assert_eq!(enterprise[0].registry_id.as_ref().map(|i| i.as_str()), Some("E"));

        // Alice is a director of both the target and the parent
        assert_eq!(
            list.entries().iter().filter(|e| e.canonical_key == "alice brown").count(),
            1
        );
    }

    #[tokio::test]
    async fn test_non_root_controllers_excluded() {
        let registry = Arc::new(group());
        let list = screen(registry.clone(), "T").await;

        assert!(list.find("Zed Hidden").is_none());
        assert_eq!(registry.call_count(CallSite::Controllers, "E"), 0);
    }

    #[tokio::test]
    async fn test_categories() {
        let list = screen(Arc::new(group()), "T").await;

        assert_eq!(list.find("Bob Green").unwrap().category, "Directors of ENTERPRISE LIMITED");
        assert_eq!(list.find("Dan Black").unwrap().category, "Company Secretaries of ENTERPRISE LIMITED");

        let parent = list.find("EAGLE PARENT HOLDINGS LIMITED").unwrap();
        assert_eq!(parent.category, "Parent Companies");
        assert_eq!(parent.depth, 2);
        assert_eq!(parent.classification, Some(Classification::DomesticResolved));
    }

    #[tokio::test]
    async fn test_individual_threshold() {
        let list = screen(Arc::new(group()), "T").await;

        let john = list.find("John Smith").unwrap();
        assert_eq!(john.role, Role::IndividualShareholder);
        assert_eq!(john.category, "Individual Shareholders of TARGET TRADING LIMITED");
        assert!(john.registry_id.is_none());

        assert!(list.find("Amy Small").is_none());
    }

    #[tokio::test]
    async fn test_officer_failure_annotates_entity() {
        let registry = Arc::new(group().with_failure(CallSite::Officers, "P"));
        let list = screen(registry, "T").await;

        let parent = list.find("EAGLE PARENT HOLDINGS LIMITED").unwrap();
        assert!(parent.annotation.as_deref().unwrap().contains("officer-register"));

        // Alice still present from the target's own officers
        assert!(list.find("Alice Brown").is_some());
    }

    #[tokio::test]
    async fn test_unresolved_nodes_have_no_registry_id() {
        let registry = Arc::new(
            FixtureRegistry::new()
                .with_company(FixtureCompany::new("T", "TARGET TRADING LIMITED").shareholder("MYSTERY VENTURES LIMITED", 1, 100.0))
                .with_company(FixtureCompany::new("M", "MYSTERY VENTURES LIMITED").officer("Eve Grey", "director"))
                .with_failure(CallSite::Profile, "M"),
        );
        let list = screen(registry, "T").await;

        let mystery = list.find("MYSTERY VENTURES LIMITED").unwrap();
        assert_eq!(mystery.classification, Some(Classification::Unresolved));
        assert!(mystery.registry_id.is_none());
        assert!(mystery.annotation.is_some());
        assert!(list.find("Eve Grey").is_none());
    }

    #[test]
    fn test_depth_category() {
        assert_eq!(depth_category(1), "Corporate Shareholders");
        assert_eq!(depth_category(3), "Grandparent Companies");
        assert_eq!(depth_category(7), "Ultimate Parent Companies");
    }
}
