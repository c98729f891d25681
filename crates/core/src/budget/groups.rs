use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::budget::{BudgetAllocation, GroupAllocation};
use crate::naming::normalize_name;

/// Configured organizational groups: group name to member names, as written
/// by whoever maintains the table. Member names are matched normalized.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupMembership(BTreeMap<String, Vec<String>>);

impl GroupMembership {
    pub fn new(groups: BTreeMap<String, Vec<String>>) -> Self {
        Self(groups)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Normalized member name to group name. A member listed under several
    /// groups stays with the first one in name order.
    pub fn index(&self) -> GroupIndex<'_> {
        let mut index: BTreeMap<String, &str> = BTreeMap::new();
        for (group, members) in &self.0 {
            for member in members {
                match index.entry(normalize_name(member)) {
                    Entry::Vacant(slot) => {
                        slot.insert(group.as_str());
                    }
                    Entry::Occupied(existing) if *existing.get() != group.as_str() => {
                        warn!(
                            event_name = "budget.groups.duplicate_member",
                            member = %existing.key(),
                            kept_group = *existing.get(),
                            ignored_group = %group,
                            "salesperson listed in more than one group"
                        );
                    }
                    Entry::Occupied(_) => {}
                }
            }
        }
        GroupIndex(index)
    }

    pub fn group_of(&self, name: &str) -> Option<&str> {
        let key = normalize_name(name);
        self.0
            .iter()
            .find(|(_, members)| members.iter().any(|member| normalize_name(member) == key))
            .map(|(group, _)| group.as_str())
    }
}

/// Resolved membership lookup, built once per plan.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GroupIndex<'a>(BTreeMap<String, &'a str>);

impl<'a> GroupIndex<'a> {
    pub fn get(&self, normalized_name: &str) -> Option<&'a str> {
        self.0.get(normalized_name).copied()
    }

    /// Group label for a normalized salesperson id; unmatched ids label themselves.
    pub fn label(&self, normalized_id: &str) -> String {
        self.get(normalized_id).unwrap_or(normalized_id).to_string()
    }
}

/// Attaches group labels; unmatched salespeople keep their normalized name.
pub fn label_allocations(allocations: &mut [BudgetAllocation], index: &GroupIndex<'_>) {
    for allocation in allocations {
        allocation.group = index.label(allocation.id().as_str());
    }
}

pub fn consolidate(
    allocations: &[BudgetAllocation],
    membership: &GroupMembership,
) -> Vec<GroupAllocation> {
    consolidate_indexed(allocations, &membership.index())
}

pub fn consolidate_indexed(
    allocations: &[BudgetAllocation],
    index: &GroupIndex<'_>,
) -> Vec<GroupAllocation> {
    let mut groups: BTreeMap<String, GroupAllocation> = BTreeMap::new();

    for allocation in allocations {
        let name = index.label(allocation.id().as_str());
        let entry = groups.entry(name.clone()).or_insert_with(|| GroupAllocation {
            group: name,
            members: Vec::new(),
            allocation: 0.0,
            prior_total: 0.0,
            current_total: 0.0,
            clients: 0,
        });

        let aggregate = allocation.aggregate();
        entry.members.push(aggregate.id.clone());
        entry.allocation += allocation.allocation;
        entry.prior_total += aggregate.prior_total;
        entry.current_total += aggregate.current_total;
        entry.clients += aggregate.clients;
    }

    let mut consolidated: Vec<GroupAllocation> = groups.into_values().collect();
    consolidated.sort_by(|left, right| {
        right.allocation.total_cmp(&left.allocation).then_with(|| left.group.cmp(&right.group))
    });
    consolidated
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::{consolidate, label_allocations, GroupMembership};
    use crate::domain::budget::{BudgetAllocation, SalespersonAggregate, ScoredSalesperson};
    use crate::domain::sales::SalespersonId;

    fn allocation(
        name: &str,
        prior: f64,
        current: f64,
        clients: usize,
        amount: f64,
    ) -> BudgetAllocation {
        let id = SalespersonId::from_name(name);
        BudgetAllocation {
            scored: ScoredSalesperson {
                aggregate: SalespersonAggregate {
                    id: id.clone(),
                    name: name.to_string(),
                    prior_total: prior,
                    current_total: current,
                    clients,
                    product_lines: 0,
                    brands: 0,
                    share: 0.0,
                },
                growth_rate: 0.0,
                clamped_growth: 0.0,
                diversity_index: 0.0,
                raw_score: 0.0,
            },
            preliminary: amount,
            band_floor: 0.0,
            band_ceiling: 0.0,
            clamped: amount,
            allocation: amount,
            within_band: true,
            group: id.to_string(),
        }
    }

    fn membership(groups: &[(&str, &[&str])]) -> GroupMembership {
        GroupMembership::new(
            groups
                .iter()
                .map(|(group, members)| {
                    (group.to_string(), members.iter().map(|member| member.to_string()).collect())
                })
                .collect::<BTreeMap<_, _>>(),
        )
    }

    #[test]
    fn name_variants_resolve_to_configured_group() {
        let groups = membership(&[("MOSTRADOR", &["José Pérez", "Ana Gómez"][..])]);
        let allocations = vec![
            allocation("JOSE PEREZ", 100.0, 120.0, 5, 130.0),
            allocation("ana gomez", 50.0, 60.0, 3, 70.0),
        ];

        let consolidated = consolidate(&allocations, &groups);

        assert_eq!(consolidated.len(), 1);
        assert_eq!(consolidated[0].group, "MOSTRADOR");
        assert_eq!(consolidated[0].members.len(), 2);
        assert_eq!(consolidated[0].allocation, 200.0);
        assert_eq!(consolidated[0].prior_total, 150.0);
        assert_eq!(consolidated[0].current_total, 180.0);
        assert_eq!(consolidated[0].clients, 8);
    }

    #[test]
    fn unmatched_salesperson_forms_singleton_group() {
        let groups = membership(&[("MOSTRADOR", &["José Pérez"][..])]);
        let allocations = vec![
            allocation("José Pérez", 0.0, 0.0, 0, 10.0),
            allocation("Luis Ñáñez", 0.0, 0.0, 0, 20.0),
        ];

        let consolidated = consolidate(&allocations, &groups);

        assert_eq!(consolidated[0].group, "LUIS NANEZ");
        assert_eq!(consolidated[1].group, "MOSTRADOR");
    }

    #[test]
    fn duplicate_member_stays_with_first_group_by_name() {
        let groups = membership(&[("NORTE", &["Ana"][..]), ("CENTRO", &["ANA"][..])]);

        assert_eq!(groups.group_of("ana"), Some("CENTRO"));
        assert_eq!(groups.index().get("ANA"), Some("CENTRO"));
    }

    #[test]
    fn labels_are_attached_to_allocations() {
        let groups = membership(&[("MOSTRADOR", &["José Pérez"][..])]);
        let mut allocations =
            vec![allocation("JOSE PEREZ", 0.0, 0.0, 0, 1.0), allocation("Eva", 0.0, 0.0, 0, 1.0)];

        label_allocations(&mut allocations, &groups.index());

        assert_eq!(allocations[0].group, "MOSTRADOR");
        assert_eq!(allocations[1].group, "EVA");
    }

    #[test]
    fn empty_membership_keeps_everyone_alone() {
        let allocations =
            vec![allocation("Ana", 0.0, 0.0, 0, 5.0), allocation("Eva", 0.0, 0.0, 0, 5.0)];

        let consolidated = consolidate(&allocations, &GroupMembership::default());

        assert_eq!(consolidated.len(), 2);
        assert_eq!(consolidated[0].group, "ANA");
        assert_eq!(consolidated[1].group, "EVA");
    }
}
