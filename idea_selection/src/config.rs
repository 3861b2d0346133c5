// ********* Input data structures ***********

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::Display;

/// The number of winning ideas a session settles on.
pub const NUMBER_OF_WINNERS: usize = 3;

/// An idea submitted to a session, together with its vote count for the round
/// currently being resolved.
///
/// The vote count is provided by whoever counts the ballots (see
/// [`crate::session::SessionStateMachine::tally`]). The engine only reads it.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct Idea {
    pub id: String,
    pub content: String,
    pub author_id: String,
    pub vote_count: u64,
}

impl Idea {
    /// A freshly submitted idea, with no votes yet.
    pub fn new(id: &str, content: &str, author_id: &str) -> Idea {
        Idea {
            id: id.to_string(),
            content: content.to_string(),
            author_id: author_id.to_string(),
            vote_count: 0,
        }
    }

    /// The same idea with a different vote count.
    pub fn with_votes(&self, vote_count: u64) -> Idea {
        Idea {
            vote_count,
            ..self.clone()
        }
    }
}

/// One vote cast by one voter for one idea in a given round.
///
/// A voter may vote for several distinct ideas in the same round, but at most once
/// for each of them.
#[derive(Eq, PartialEq, Debug, Clone, Hash, Ord, PartialOrd)]
pub struct VoteRecord {
    pub voter_id: String,
    pub idea_id: String,
    pub round: u32,
}

// ******** Output data structures *********

/// The decision taken when a round is closed.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum ResolutionOutcome {
    /// Voting is over. Always exactly [`NUMBER_OF_WINNERS`] ideas, higher tiers first.
    Finalize { winners: Vec<Idea> },
    /// Another round is needed.
    ///
    /// `locked` ideas already hold a winning seat and are not voted on again.
    /// `candidates` are the only ideas on the next ballot.
    NewRound {
        locked: Vec<Idea>,
        candidates: Vec<Idea>,
    },
    /// The round could not be resolved. No state should change.
    Error { reason: String },
}

impl ResolutionOutcome {
    /// The tag used when exchanging outcomes with other systems.
    pub fn action(&self) -> &'static str {
        match self {
            ResolutionOutcome::Finalize { .. } => "FINALIZE",
            ResolutionOutcome::NewRound { .. } => "NEW_ROUND",
            ResolutionOutcome::Error { .. } => "ERROR",
        }
    }
}

/// The coarse lifecycle of a session.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum SessionStatus {
    Waiting,
    CollectingIdeas,
    Voting,
    Revoting,
    Finished,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Waiting => "WAITING",
            SessionStatus::CollectingIdeas => "COLLECTING_IDEAS",
            SessionStatus::Voting => "VOTING",
            SessionStatus::Revoting => "REVOTING",
            SessionStatus::Finished => "FINISHED",
        }
    }

    /// True for the states in which ballots are accepted.
    pub fn is_voting(&self) -> bool {
        matches!(self, SessionStatus::Voting | SessionStatus::Revoting)
    }
}

impl Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The state of the round being voted on, as the session stores it.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct RoundState {
    pub round: u32,
    pub status: SessionStatus,
    pub locked_ideas: Vec<Idea>,
    pub candidate_ideas: Vec<Idea>,
    /// voter id -> ids of the ideas this voter picked in this round
    pub ballot: BTreeMap<String, Vec<String>>,
}

/// Errors raised when the session is driven in a way its lifecycle does not allow.
///
/// Resolution problems (for example an empty snapshot) are not errors: they come back
/// as [`ResolutionOutcome::Error`].
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum SelectionErrors {
    InvalidTransition {
        from: SessionStatus,
        action: &'static str,
    },
    DuplicateIdea(String),
    NotEnoughIdeas {
        submitted: usize,
        required: usize,
    },
    NotOnBallot {
        idea_id: String,
        round: u32,
    },
    DuplicateVote(VoteRecord),
    TooManyVotes {
        voter_id: String,
        round: u32,
        max: u32,
    },
    UnknownRound {
        round: u32,
        current: u32,
    },
    StaleRound {
        round: u32,
        current: u32,
    },
    InvalidRules(String),
}

impl Error for SelectionErrors {}

impl Display for SelectionErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectionErrors::InvalidTransition { from, action } => {
                write!(f, "cannot {} while the session is {}", action, from)
            }
            SelectionErrors::DuplicateIdea(id) => write!(f, "idea {} was already submitted", id),
            SelectionErrors::NotEnoughIdeas {
                submitted,
                required,
            } => write!(
                f,
                "{} ideas submitted, at least {} are needed to vote",
                submitted, required
            ),
            SelectionErrors::NotOnBallot { idea_id, round } => {
                write!(f, "idea {} is not on the ballot of round {}", idea_id, round)
            }
            SelectionErrors::DuplicateVote(vr) => write!(
                f,
                "voter {} already voted for idea {} in round {}",
                vr.voter_id, vr.idea_id, vr.round
            ),
            SelectionErrors::TooManyVotes {
                voter_id,
                round,
                max,
            } => write!(
                f,
                "voter {} cannot cast more than {} votes in round {}",
                voter_id, max, round
            ),
            SelectionErrors::UnknownRound { round, current } => {
                write!(f, "round {} has not started (current round: {})", round, current)
            }
            SelectionErrors::StaleRound { round, current } => write!(
                f,
                "round {} was already closed with different counts (current round: {})",
                round, current
            ),
            SelectionErrors::InvalidRules(msg) => write!(f, "invalid session rules: {}", msg),
        }
    }
}

// ********* Configuration **********

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SessionRules {
    /// How many distinct ideas a voter may pick in one round.
    pub max_votes_per_voter: u32,
    /// Voting cannot start with fewer ideas. Never below [`NUMBER_OF_WINNERS`].
    pub minimum_ideas: usize,
}

impl SessionRules {
    pub const DEFAULT_RULES: SessionRules = SessionRules {
        max_votes_per_voter: 3,
        minimum_ideas: NUMBER_OF_WINNERS,
    };

    pub fn validate(&self) -> Result<(), SelectionErrors> {
        if self.max_votes_per_voter == 0 {
            return Err(SelectionErrors::InvalidRules(
                "a voter must be allowed at least one vote".to_string(),
            ));
        }
        if self.minimum_ideas < NUMBER_OF_WINNERS {
            return Err(SelectionErrors::InvalidRules(format!(
                "at least {} ideas are needed to pick {} winners, got minimum {}",
                NUMBER_OF_WINNERS, NUMBER_OF_WINNERS, self.minimum_ideas
            )));
        }
        Ok(())
    }
}
