mod config;

pub mod builder;
pub mod manual;
pub mod session;

use log::{debug, info};

use std::{cmp::Ordering, collections::HashMap};

pub use crate::config::*;
pub use crate::session::SessionStateMachine;

const NO_IDEAS: &str = "no ideas to resolve";
const NOT_ENOUGH_IDEAS: &str = "not enough ideas to fill the remaining seats";
const NO_SEAT_LEFT: &str = "all the winning seats are already taken";

// **** Private structures ****

#[derive(Eq, PartialEq, Debug, Clone, Copy, PartialOrd, Ord, Hash)]
struct VoteCount(u64);

// All the ideas sharing one vote count, in input order.
#[derive(Eq, PartialEq, Debug, Clone)]
struct Tier {
    count: VoteCount,
    ideas: Vec<Idea>,
}

/// Groups the ideas by vote count.
///
/// Within a group, the ideas keep their relative order from the input. The keys come
/// in no particular order. An empty input gives an empty map.
pub fn group_by_vote_count(ideas: &[Idea]) -> HashMap<u64, Vec<Idea>> {
    let mut groups: HashMap<u64, Vec<Idea>> = HashMap::new();
    for idea in ideas.iter() {
        groups
            .entry(idea.vote_count)
            .or_insert_with(Vec::new)
            .push(idea.clone());
    }
    groups
}

// The tiers, highest count first.
fn ranked_tiers(ideas: &[Idea]) -> Vec<Tier> {
    let mut tiers: Vec<Tier> = group_by_vote_count(ideas)
        .into_iter()
        .map(|(count, ideas)| Tier {
            count: VoteCount(count),
            ideas,
        })
        .collect();
    tiers.sort_by(|t1, t2| t2.count.cmp(&t1.count));
    tiers
}

/// Decides whether the round can conclude with the three winners, or if a tie-break
/// round is needed.
///
/// The tiers are considered from the highest vote count down:
/// - a tier that fits in the seats still open is locked in,
/// - a tier that fills the open seats exactly ends the vote,
/// - a tier that has more ideas than open seats is sent to a tie-break round, along
///   with the ideas locked so far.
///
/// Lower tiers are never looked at past that point: they cannot win this round.
///
/// ```
/// use idea_selection::{resolve, Idea, ResolutionOutcome};
///
/// let ideas: Vec<Idea> = [10, 7, 7, 7, 5]
///     .iter()
///     .enumerate()
///     .map(|(idx, c)| Idea::new(&format!("idea{}", idx + 1), "", "anna").with_votes(*c))
///     .collect();
///
/// match resolve(&ideas) {
///     ResolutionOutcome::NewRound { locked, candidates } => {
///         assert_eq!(locked.len(), 1);
///         assert_eq!(candidates.len(), 3);
///     }
///     x => panic!("unexpected outcome {:?}", x),
/// }
/// ```
pub fn resolve(ideas: &[Idea]) -> ResolutionOutcome {
    resolve_seats(ideas, NUMBER_OF_WINNERS)
}

/// Resolves a round that only contests the seats left open by earlier rounds.
///
/// `locked` are the ideas that secured a seat in earlier rounds and `snapshot` the
/// ideas on the current ballot with their counts for this round. The outcome covers
/// the whole session: the winners of a `Finalize` and the locked ideas of a `NewRound`
/// start with the `locked` ideas given here.
pub fn resolve_round(locked: &[Idea], snapshot: &[Idea]) -> ResolutionOutcome {
    if locked.len() >= NUMBER_OF_WINNERS {
        return ResolutionOutcome::Error {
            reason: NO_SEAT_LEFT.to_string(),
        };
    }
    let seats = NUMBER_OF_WINNERS - locked.len();
    debug!(
        "resolve_round: {} locked ideas, {} seats open",
        locked.len(),
        seats
    );
    match resolve_seats(snapshot, seats) {
        ResolutionOutcome::Finalize { winners } => ResolutionOutcome::Finalize {
            winners: locked.iter().cloned().chain(winners).collect(),
        },
        ResolutionOutcome::NewRound {
            locked: newly_locked,
            candidates,
        } => ResolutionOutcome::NewRound {
            locked: locked.iter().cloned().chain(newly_locked).collect(),
            candidates,
        },
        err => err,
    }
}

fn resolve_seats(ideas: &[Idea], seats: usize) -> ResolutionOutcome {
    if ideas.is_empty() {
        return ResolutionOutcome::Error {
            reason: NO_IDEAS.to_string(),
        };
    }

    let tiers = ranked_tiers(ideas);
    debug!(
        "resolve_seats: seats: {} tiers: {:?}",
        seats,
        tiers
            .iter()
            .map(|t| (t.count.0, t.ideas.len()))
            .collect::<Vec<(u64, usize)>>()
    );

    let mut locked: Vec<Idea> = Vec::new();
    for tier in tiers.into_iter() {
        // Invariant: locked.len() < seats
        let open_seats = seats - locked.len();
        match tier.ideas.len().cmp(&open_seats) {
            Ordering::Equal => {
                locked.extend(tier.ideas);
                info!(
                    "resolve_seats: tier with {} votes fills the last {} seats",
                    tier.count.0, open_seats
                );
                return ResolutionOutcome::Finalize { winners: locked };
            }
            Ordering::Greater => {
                info!(
                    "resolve_seats: {} ideas tied at {} votes for {} seats, tie-break needed",
                    tier.ideas.len(),
                    tier.count.0,
                    open_seats
                );
                return ResolutionOutcome::NewRound {
                    locked,
                    candidates: tier.ideas,
                };
            }
            Ordering::Less => {
                debug!(
                    "resolve_seats: locking {} ideas with {} votes",
                    tier.ideas.len(),
                    tier.count.0
                );
                locked.extend(tier.ideas);
            }
        }
    }

    // All the tiers fit in the open seats: the pool is smaller than the seats.
    ResolutionOutcome::Error {
        reason: NOT_ENOUGH_IDEAS.to_string(),
    }
}

/// A digest of the ids and counts of a snapshot, in order.
///
/// Two snapshots with the same digest resolve to the same outcome.
pub fn snapshot_digest(ideas: &[Idea]) -> String {
    // Ids are length-prefixed: any character may appear in an id.
    let canonical: String = ideas
        .iter()
        .map(|idea| format!("{}:{}:{}\n", idea.id.len(), idea.id, idea.vote_count))
        .collect();
    sha256::digest(canonical.as_str())
}
