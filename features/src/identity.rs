//! Replacement of records by identity.
//!
//! A fresher copy of a record replaces every copy with the same id in every
//! collection that holds one. Collections that do not hold the id are left
//! alone: replacement never inserts.

use popseoul_clients::{Attraction, Challenge};

/// A record with a stable identity
pub trait Identified {
    /// The record's id
    fn identity(&self) -> i64;
}

impl Identified for Challenge {
    fn identity(&self) -> i64 {
        self.id
    }
}

impl Identified for Attraction {
    fn identity(&self) -> i64 {
        self.id
    }
}

/// Replace every element with `updated`'s id; returns how many were replaced
pub fn replace_by_id<T: Identified + Clone>(list: &mut [T], updated: &T) -> usize {
    let id = updated.identity();
    let mut replaced = 0;
    for slot in list.iter_mut().filter(|item| item.identity() == id) {
        slot.clone_from(updated);
        replaced += 1;
    }
    replaced
}

/// [`replace_by_id`] over several lists, e.g. the values of a grouped map
pub fn replace_in_groups<'a, T>(groups: impl IntoIterator<Item = &'a mut Vec<T>>, updated: &T) -> usize
where
    T: Identified + Clone + 'a,
{
    groups.into_iter().map(|list| replace_by_id(list, updated)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn challenge(id: i64, likes: u32) -> Challenge {
        Challenge {
            id,
            likes,
            ..Challenge::default()
        }
    }

    #[test]
    fn replaces_in_every_group() {
        let mut groups = BTreeMap::from([
            (1, vec![challenge(1, 0), challenge(2, 0)]),
            (2, vec![challenge(2, 0)]),
            (3, vec![challenge(3, 0)]),
        ]);

        let replaced = replace_in_groups(groups.values_mut(), &challenge(2, 7));

        assert_eq!(replaced, 2);
        assert_eq!(groups[&1][1].likes, 7);
        assert_eq!(groups[&2][0].likes, 7);
        assert_eq!(groups[&3], vec![challenge(3, 0)]);
    }

    #[test]
    fn absent_id_is_not_inserted() {
        let mut list = vec![challenge(1, 0)];
        assert_eq!(replace_by_id(&mut list, &challenge(9, 1)), 0);
        assert_eq!(list, vec![challenge(1, 0)]);
    }

    proptest! {
        #[test]
        fn replacement_updates_every_copy_without_duplicating(
            ids in proptest::collection::vec(0i64..6, 0..24),
            target in 0i64..6,
        ) {
            let mut list: Vec<Challenge> = ids.iter().map(|id| challenge(*id, 0)).collect();
            let before = list.clone();

            let replaced = replace_by_id(&mut list, &challenge(target, 42));

            prop_assert_eq!(list.len(), before.len());
            prop_assert_eq!(replaced, ids.iter().filter(|id| **id == target).count());
            for (after, before) in list.iter().zip(&before) {
                if before.id == target {
                    prop_assert_eq!(after.likes, 42);
                } else {
                    prop_assert_eq!(after, before);
                }
            }
        }
    }
}
