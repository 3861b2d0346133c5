use log::{debug, info, warn};

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::config::*;
use crate::{resolve_round, snapshot_digest};

impl RoundState {
    /// The first round: every submitted idea is on the ballot.
    pub fn first_round(ideas: &[Idea]) -> RoundState {
        RoundState {
            round: 1,
            status: SessionStatus::Voting,
            locked_ideas: Vec::new(),
            candidate_ideas: ideas.to_vec(),
            ballot: BTreeMap::new(),
        }
    }

    /// The state of the tie-break round that follows this one.
    ///
    /// The locked ideas and the candidates are taken as they are. The ballot starts
    /// empty: no vote carries over from one round to the next.
    pub fn next_round(&self, locked: &[Idea], candidates: &[Idea]) -> RoundState {
        RoundState {
            round: self.round + 1,
            status: SessionStatus::Revoting,
            locked_ideas: locked.to_vec(),
            candidate_ideas: candidates.to_vec(),
            ballot: BTreeMap::new(),
        }
    }

    pub fn is_candidate(&self, idea_id: &str) -> bool {
        self.candidate_ideas.iter().any(|i| i.id == idea_id)
    }
}

// What was decided when a round was closed, kept to recognize retried closures.
#[derive(Eq, PartialEq, Debug, Clone)]
struct ClosedRound {
    digest: String,
    outcome: ResolutionOutcome,
}

/// The lifecycle of one session:
/// WAITING -> COLLECTING_IDEAS -> VOTING -> REVOTING* -> FINISHED
///
/// The machine holds the submitted ideas, records the ballots of the current round and
/// moves to the next state when a round is closed. It does not persist anything:
/// callers store [`SessionStateMachine::round_state`] after each transition.
#[derive(Debug, Clone)]
pub struct SessionStateMachine {
    rules: SessionRules,
    status: SessionStatus,
    ideas: Vec<Idea>,
    round_state: Option<RoundState>,
    winners: Option<Vec<Idea>>,
    vote_records: Vec<VoteRecord>,
    closed_rounds: HashMap<u32, ClosedRound>,
}

impl SessionStateMachine {
    pub fn new(rules: &SessionRules) -> Result<SessionStateMachine, SelectionErrors> {
        rules.validate()?;
        Ok(SessionStateMachine {
            rules: rules.clone(),
            status: SessionStatus::Waiting,
            ideas: Vec::new(),
            round_state: None,
            winners: None,
            vote_records: Vec::new(),
            closed_rounds: HashMap::new(),
        })
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn ideas(&self) -> &[Idea] {
        &self.ideas
    }

    /// The round being voted on, or the last round once the session is finished.
    pub fn round_state(&self) -> Option<&RoundState> {
        self.round_state.as_ref()
    }

    /// The three winners, once the session is finished.
    pub fn winners(&self) -> Option<&[Idea]> {
        self.winners.as_deref()
    }

    /// Every vote accepted so far, all rounds included.
    pub fn vote_records(&self) -> &[VoteRecord] {
        &self.vote_records
    }

    fn expect_status(
        &self,
        expected: SessionStatus,
        action: &'static str,
    ) -> Result<(), SelectionErrors> {
        if self.status != expected {
            return Err(SelectionErrors::InvalidTransition {
                from: self.status,
                action,
            });
        }
        Ok(())
    }

    fn current_round(&self, action: &'static str) -> Result<&RoundState, SelectionErrors> {
        match (&self.round_state, self.status.is_voting()) {
            (Some(rs), true) => Ok(rs),
            _ => Err(SelectionErrors::InvalidTransition {
                from: self.status,
                action,
            }),
        }
    }

    /// Opens the session to idea submissions.
    pub fn open(&mut self) -> Result<(), SelectionErrors> {
        self.expect_status(SessionStatus::Waiting, "open the session")?;
        self.status = SessionStatus::CollectingIdeas;
        info!("Session open for ideas");
        Ok(())
    }

    pub fn submit_idea(&mut self, idea: &Idea) -> Result<(), SelectionErrors> {
        self.expect_status(SessionStatus::CollectingIdeas, "submit an idea")?;
        if self.ideas.iter().any(|i| i.id == idea.id) {
            return Err(SelectionErrors::DuplicateIdea(idea.id.clone()));
        }
        debug!("submit_idea: {:?}", idea);
        // Counts are only meaningful per round.
        self.ideas.push(idea.with_votes(0));
        Ok(())
    }

    /// Closes idea submissions and starts the first round, with every idea on the ballot.
    pub fn start_voting(&mut self) -> Result<&RoundState, SelectionErrors> {
        self.expect_status(SessionStatus::CollectingIdeas, "start voting")?;
        if self.ideas.len() < self.rules.minimum_ideas {
            return Err(SelectionErrors::NotEnoughIdeas {
                submitted: self.ideas.len(),
                required: self.rules.minimum_ideas,
            });
        }
        self.status = SessionStatus::Voting;
        info!("Voting starts with {} ideas", self.ideas.len());
        Ok(self.round_state.insert(RoundState::first_round(&self.ideas)))
    }

    /// Records the picks of one voter in the current round.
    ///
    /// Nothing is recorded if one of the picks is rejected.
    pub fn cast_votes(
        &mut self,
        voter_id: &str,
        idea_ids: &[String],
    ) -> Result<(), SelectionErrors> {
        let max_votes = self.rules.max_votes_per_voter;
        let rs = self.current_round("cast votes")?;
        let round = rs.round;

        let previous: Vec<String> = rs.ballot.get(voter_id).cloned().unwrap_or_default();
        let mut seen: HashSet<&str> = previous.iter().map(|s| s.as_str()).collect();
        for idea_id in idea_ids.iter() {
            if !rs.is_candidate(idea_id) {
                return Err(SelectionErrors::NotOnBallot {
                    idea_id: idea_id.clone(),
                    round,
                });
            }
            if !seen.insert(idea_id.as_str()) {
                return Err(SelectionErrors::DuplicateVote(VoteRecord {
                    voter_id: voter_id.to_string(),
                    idea_id: idea_id.clone(),
                    round,
                }));
            }
        }
        if seen.len() > max_votes as usize {
            return Err(SelectionErrors::TooManyVotes {
                voter_id: voter_id.to_string(),
                round,
                max: max_votes,
            });
        }

        debug!(
            "cast_votes: round {}: voter {} picks {:?}",
            round, voter_id, idea_ids
        );
        for idea_id in idea_ids.iter() {
            self.vote_records.push(VoteRecord {
                voter_id: voter_id.to_string(),
                idea_id: idea_id.clone(),
                round,
            });
        }
        if let Some(rs) = self.round_state.as_mut() {
            rs.ballot
                .entry(voter_id.to_string())
                .or_insert_with(Vec::new)
                .extend(idea_ids.iter().cloned());
        }
        Ok(())
    }

    /// The candidates of the current round with their vote counts from the ballot,
    /// in ballot order.
    pub fn tally(&self) -> Result<Vec<Idea>, SelectionErrors> {
        let rs = self.current_round("tally the votes")?;
        let mut counts: HashMap<&str, u64> = HashMap::new();
        for idea_id in rs.ballot.values().flatten() {
            *counts.entry(idea_id.as_str()).or_insert(0) += 1;
        }
        Ok(rs
            .candidate_ideas
            .iter()
            .map(|idea| idea.with_votes(counts.get(idea.id.as_str()).cloned().unwrap_or(0)))
            .collect())
    }

    /// Closes the given round with a snapshot of the vote counts of its candidates.
    ///
    /// - `Finalize`: the session is finished and the winners are stored.
    /// - `NewRound`: a tie-break round starts with the returned candidates.
    /// - `Error`: returned as is, nothing changes and the round stays open.
    ///
    /// Closing a round that is already closed, with the same snapshot, returns the
    /// outcome decided the first time and changes nothing.
    pub fn close_round(
        &mut self,
        round: u32,
        snapshot: &[Idea],
    ) -> Result<ResolutionOutcome, SelectionErrors> {
        let digest = snapshot_digest(snapshot);
        let current = self.round_state.as_ref().map(|rs| rs.round).unwrap_or(0);

        if let Some(closed) = self.closed_rounds.get(&round) {
            if closed.digest == digest {
                info!("close_round: round {} already closed, replaying outcome", round);
                return Ok(closed.outcome.clone());
            }
            warn!(
                "close_round: round {} was closed with a different snapshot",
                round
            );
            return Err(SelectionErrors::StaleRound { round, current });
        }

        let rs = self.current_round("close a round")?.clone();
        if round != rs.round {
            return Err(SelectionErrors::UnknownRound { round, current });
        }
        let mut seen: HashSet<&str> = HashSet::new();
        for idea in snapshot.iter() {
            if !rs.is_candidate(&idea.id) {
                return Err(SelectionErrors::NotOnBallot {
                    idea_id: idea.id.clone(),
                    round,
                });
            }
            if !seen.insert(idea.id.as_str()) {
                return Err(SelectionErrors::DuplicateIdea(idea.id.clone()));
            }
        }

        let outcome = resolve_round(&rs.locked_ideas, snapshot);
        info!("Round {}: {}", round, outcome.action());
        let next_state = match &outcome {
            ResolutionOutcome::Finalize { winners } => {
                self.winners = Some(winners.clone());
                self.status = SessionStatus::Finished;
                RoundState {
                    status: SessionStatus::Finished,
                    ..rs
                }
            }
            ResolutionOutcome::NewRound { locked, candidates } => {
                self.status = SessionStatus::Revoting;
                rs.next_round(locked, candidates)
            }
            ResolutionOutcome::Error { reason } => {
                warn!("close_round: round {} stays open: {}", round, reason);
                return Ok(outcome.clone());
            }
        };
        self.round_state = Some(next_state);
        self.closed_rounds.insert(
            round,
            ClosedRound {
                digest,
                outcome: outcome.clone(),
            },
        );
        Ok(outcome)
    }
}
