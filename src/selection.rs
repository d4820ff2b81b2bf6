// selection.rs - Eligible Member Resolution and Random Selection
// Expands mentioned users and roles into a deduplicated candidate set and
// draws an unbiased random sample from it.
//
// Used by: commands/picker.rs

use rand::Rng;
use serenity::model::id::{RoleId, UserId};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Candidate {
    pub id: UserId,
    pub is_bot: bool,
}

impl Candidate {
    pub fn new(id: UserId, is_bot: bool) -> Self {
        Self { id, is_bot }
    }
}

/// A mentioned user, or a role whose membership has already been fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityRef {
    Candidate(Candidate),
    Group { id: RoleId, members: Vec<Candidate> },
}

impl IdentityRef {
    fn candidates(&self) -> &[Candidate] {
        match self {
            IdentityRef::Candidate(candidate) => std::slice::from_ref(candidate),
            IdentityRef::Group { members, .. } => members,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("Not enough eligible candidates: requested {requested}, only {available} available")]
    InsufficientCandidates { requested: usize, available: usize },
}

/// Build the eligible set. Exclusions always win over targets, the bot itself
/// is never eligible, and other bots only stay when `include_bots` is set.
pub fn resolve(
    targets: &[IdentityRef],
    excludes: &[IdentityRef],
    self_id: UserId,
    include_bots: bool,
) -> Vec<Candidate> {
    let mut eligible: HashMap<UserId, Candidate> = HashMap::new();
    for candidate in targets.iter().flat_map(IdentityRef::candidates) {
        eligible.insert(candidate.id, *candidate);
    }

    eligible.remove(&self_id);

    if !include_bots {
        eligible.retain(|_, candidate| !candidate.is_bot);
    }

    let excluded_ids: HashSet<UserId> = excludes
        .iter()
        .flat_map(IdentityRef::candidates)
        .map(|candidate| candidate.id)
        .collect();
    eligible.retain(|id, _| !excluded_ids.contains(id));

    eligible.into_values().collect()
}

/// Fisher-Yates shuffle, then take the first `count`.
pub fn select<R: Rng + ?Sized>(
    eligible: Vec<Candidate>,
    count: usize,
    rng: &mut R,
) -> Result<Vec<Candidate>, SelectionError> {
    if count > eligible.len() {
        return Err(SelectionError::InsufficientCandidates {
            requested: count,
            available: eligible.len(),
        });
    }

    let mut pool = eligible;
    for i in (1..pool.len()).rev() {
        let j = rng.gen_range(0..=i);
        pool.swap(i, j);
    }
    pool.truncate(count);
    Ok(pool)
}
