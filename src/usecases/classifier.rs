//! Split a dialog listing into categories by kind.

use crate::domain::{CategorySet, ConversationEntity};

/// Single pass over `entities`. Each entity lands in exactly one bucket;
/// `groups` is derived from basic groups and supergroups, never stored.
pub fn classify(entities: &[ConversationEntity]) -> CategorySet {
    let mut set = CategorySet::default();
    for entity in entities {
        let bucket = match entity {
            ConversationEntity::Person { .. } => &mut set.users,
            ConversationEntity::BasicGroup { .. } => &mut set.basic_groups,
            ConversationEntity::BroadcastChannel { .. } => &mut set.channels,
            ConversationEntity::Supergroup { .. } => &mut set.supergroups,
            ConversationEntity::Unknown { .. } => &mut set.unknown,
        };
        bucket.push(entity.clone());
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn sample(n: i64) -> Vec<ConversationEntity> {
        (0..n)
            .map(|i| match i % 5 {
                0 => ConversationEntity::Person {
                    id: i,
                    display_name: format!("user {}", i),
                    username: None,
                    deleted: i % 3 == 0,
                    is_bot: false,
                    is_scam: false,
                    is_fake: false,
                    is_verified: false,
                },
                1 => ConversationEntity::BasicGroup {
                    id: i,
                    title: format!("group {}", i),
                    member_count: Some(3),
                },
                2 => ConversationEntity::Supergroup {
                    id: i,
                    title: format!("supergroup {}", i),
                    username: None,
                    member_count: None,
                    is_verified: false,
                },
                3 => ConversationEntity::BroadcastChannel {
                    id: i,
                    title: format!("channel {}", i),
                    username: None,
                    member_count: None,
                    is_verified: false,
                },
                _ => ConversationEntity::Unknown {
                    id: i,
                    display_name: "?".into(),
                },
            })
            .collect()
    }

    #[test]
    fn totals_are_preserved() {
        for n in [0, 1, 7, 23, 100] {
            let input = sample(n);
            let set = classify(&input);
            assert_eq!(
                set.users.len()
                    + set.basic_groups.len()
                    + set.supergroups.len()
                    + set.channels.len()
                    + set.unknown.len(),
                input.len()
            );
            assert_eq!(set.stats().total, input.len());
        }
    }

    #[test]
    fn groups_is_exact_union_of_basic_and_super() {
        let set = classify(&sample(40));
        let groups: HashSet<i64> = set.groups().iter().map(|e| e.id()).collect();
        let expected: HashSet<i64> = set
            .basic_groups
            .iter()
            .chain(&set.supergroups)
            .map(|e| e.id())
            .collect();
        assert_eq!(groups, expected);
        assert_eq!(set.groups().len(), set.basic_groups.len() + set.supergroups.len());
        assert_eq!(set.stats().groups, set.groups().len());
    }

    #[test]
    fn each_kind_lands_in_its_bucket() {
        let set = classify(&sample(5));
        assert_eq!(set.users[0].id(), 0);
        assert_eq!(set.basic_groups[0].id(), 1);
        assert_eq!(set.supergroups[0].id(), 2);
        assert_eq!(set.channels[0].id(), 3);
        assert_eq!(set.unknown[0].id(), 4);
    }

    #[test]
    fn no_entity_is_in_two_buckets() {
        let set = classify(&sample(50));
        let ids: Vec<i64> = set.iter().map(|e| e.id()).collect();
        let unique: HashSet<i64> = ids.iter().copied().collect();
        assert_eq!(ids.len(), unique.len());
    }
}
