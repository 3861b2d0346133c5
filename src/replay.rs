use log::{debug, info, warn};

use idea_selection::builder::Builder;
use idea_selection::*;
use snafu::{prelude::*, Snafu};

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::replay::config_reader::*;

mod config_reader;
mod io_common;
mod io_json;
mod io_msforms;

#[derive(Debug, Snafu)]
pub enum SessionError {
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON: {source}"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Expected a non-negative number"))]
    ParsingJsonNumber {},
    #[snafu(display("Error opening Excel file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("Empty Excel file or worksheet"))]
    EmptyExcel {},
    #[snafu(display("Cannot find column {column_name} in the first row"))]
    ExcelCannotFindColumn { column_name: String },
    #[snafu(display("Unexpected cell content at line {lineno}: {content}"))]
    ExcelWrongCellType { lineno: u64, content: String },
    #[snafu(display("The session description has no parent directory"))]
    MissingParentDir {},
    #[snafu(display("Error writing the summary to {path}"))]
    WritingSummary {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("{source}"))]
    Selection { source: SelectionErrors },
    #[snafu(display("Difference detected between calculated summary and reference summary"))]
    ReferenceMismatch {},

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type SessionResult<T> = Result<T, SessionError>;

/// A ballot, as parsed by the readers.
/// This is before the session checks it against the rules.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ParsedBallot {
    pub id: String,
    pub round: u32,
    pub voter_id: String,
    pub choices: Vec<String>,
}

/// Ballots given on the command line, replacing the sources of the session description.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct InputOverride {
    pub path: String,
    pub input_type: Option<String>,
    pub excel_worksheet_name: Option<String>,
}

/// One closed round, as reported in the summary.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct RoundReport {
    pub round: u32,
    pub tally: Vec<Idea>,
    pub outcome: ResolutionOutcome,
    pub next_round: Option<RoundState>,
}

pub struct ReplayReport {
    pub session: SessionStateMachine,
    pub rounds: Vec<RoundReport>,
}

fn idea_to_json(idea: &Idea) -> JSValue {
    json!({
        "id": idea.id,
        "content": idea.content,
        "authorId": idea.author_id,
        "voteCount": idea.vote_count
    })
}

fn ideas_to_json(ideas: &[Idea]) -> JSValue {
    JSValue::Array(ideas.iter().map(idea_to_json).collect())
}

fn outcome_to_json(outcome: &ResolutionOutcome) -> JSValue {
    match outcome {
        ResolutionOutcome::Finalize { winners } => json!({
            "action": outcome.action(),
            "winners": ideas_to_json(winners)
        }),
        ResolutionOutcome::NewRound { locked, candidates } => json!({
            "action": outcome.action(),
            "locked": ideas_to_json(locked),
            "candidates": ideas_to_json(candidates)
        }),
        ResolutionOutcome::Error { reason } => json!({
            "action": outcome.action(),
            "reason": reason
        }),
    }
}

fn round_state_to_json(rs: &RoundState) -> JSValue {
    let mut ballot: JSMap<String, JSValue> = JSMap::new();
    for (voter_id, idea_ids) in rs.ballot.iter() {
        ballot.insert(voter_id.clone(), json!(idea_ids));
    }
    json!({
        "round": rs.round,
        "status": rs.status.as_str(),
        "lockedIdeas": ideas_to_json(&rs.locked_ideas),
        "candidateIdeas": ideas_to_json(&rs.candidate_ideas),
        "ballot": ballot
    })
}

fn rounds_to_json(rounds: &[RoundReport]) -> Vec<JSValue> {
    let mut l: Vec<JSValue> = Vec::new();
    for rr in rounds.iter() {
        let mut tally: JSMap<String, JSValue> = JSMap::new();
        for idea in rr.tally.iter() {
            tally.insert(idea.id.clone(), json!(idea.vote_count));
        }
        let mut js = json!({
            "round": rr.round,
            "tally": tally,
            "outcome": outcome_to_json(&rr.outcome)
        });
        if let Some(next_round) = &rr.next_round {
            js["nextRound"] = round_state_to_json(next_round);
        }
        l.push(js);
    }
    l
}

fn build_summary_js(config: &SessionConfig, report: &ReplayReport) -> JSValue {
    let c = OutputConfig {
        session: config.output_settings.session_name.clone(),
        date: config.output_settings.session_date.clone(),
        ideas: report.session.ideas().len().to_string(),
    };
    json!({
        "config": c,
        "results": rounds_to_json(&report.rounds),
        "status": report.session.status().as_str(),
        "winners": ideas_to_json(report.session.winners().unwrap_or(&[]))
    })
}

fn validate_rules(rules_config: &Option<RulesConfig>) -> SessionResult<SessionRules> {
    let mut rules = SessionRules::DEFAULT_RULES;
    if let Some(rc) = rules_config {
        if let Some(x) = rc.max_votes_per_voter()? {
            rules.max_votes_per_voter = match u32::try_from(x) {
                Ok(x) => x,
                Err(_) => whatever!("maxVotesPerVoter is too large: {}", x),
            };
        }
        if let Some(x) = rc.minimum_ideas()? {
            rules.minimum_ideas = x;
        }
    }
    rules.validate().context(SelectionSnafu {})?;
    Ok(rules)
}

fn read_ballot_data(root_path: &Path, source: &BallotSource) -> SessionResult<Vec<ParsedBallot>> {
    let p: PathBuf = root_path.join(&source.file_path);
    let p2 = p.as_path().display().to_string();
    info!("Attempting to read ballot file {:?}", p2);
    match source.provider.as_str() {
        "json" => io_json::read_json_ballots(&p2),
        "msforms" => io_msforms::read_msforms_ballots(&p2, source),
        x => whatever!("Provider not implemented {:?}", x),
    }
}

/// Replays the session: the ideas are submitted, then the ballots are cast and counted
/// round by round until the session finishes or the ballots run out.
pub fn replay_session(
    config: &SessionConfig,
    ballots: &[ParsedBallot],
) -> SessionResult<ReplayReport> {
    let rules = validate_rules(&config.rules)?;
    info!("rules: {:?}", rules);

    let mut builder = Builder::new(&rules).context(SelectionSnafu {})?;
    for idea in config.ideas.iter() {
        builder
            .add_idea(&idea.id, &idea.content, &idea.author_id)
            .context(SelectionSnafu {})?;
    }
    let mut session = builder.build().context(SelectionSnafu {})?;
    session.start_voting().context(SelectionSnafu {})?;

    let mut ballots_by_round: BTreeMap<u32, Vec<&ParsedBallot>> = BTreeMap::new();
    for b in ballots.iter() {
        ballots_by_round.entry(b.round).or_default().push(b);
    }

    let mut rounds: Vec<RoundReport> = Vec::new();
    for (round, round_ballots) in ballots_by_round.iter() {
        let current = match session.round_state() {
            Some(rs) if session.status().is_voting() => rs.round,
            _ => {
                warn!(
                    "Session is {}: ignoring {} ballots of round {}",
                    session.status(),
                    round_ballots.len(),
                    round
                );
                continue;
            }
        };
        if *round != current {
            whatever!(
                "Found ballots for round {} while round {} is open",
                round,
                current
            );
        }

        info!("Round {}: {} ballots", round, round_ballots.len());
        for b in round_ballots.iter() {
            if let Err(e) = session.cast_votes(&b.voter_id, &b.choices) {
                warn!("Ballot {}: rejected: {}", b.id, e);
            }
        }

        let tally = session.tally().context(SelectionSnafu {})?;
        debug!("Round {}: tally: {:?}", round, tally);
        let outcome = session
            .close_round(*round, &tally)
            .context(SelectionSnafu {})?;
        if let ResolutionOutcome::Error { reason } = &outcome {
            whatever!("Round {} could not be resolved: {}", round, reason);
        }
        let next_round = match &outcome {
            ResolutionOutcome::NewRound { .. } => session.round_state().cloned(),
            _ => None,
        };
        rounds.push(RoundReport {
            round: *round,
            tally,
            outcome,
            next_round,
        });
    }

    if session.status().is_voting() {
        warn!(
            "No more ballots while the session is {}: no winners yet",
            session.status()
        );
    }
    if let Some(winners) = session.winners() {
        for (idx, w) in winners.iter().enumerate() {
            info!("Winner {}: {} ({})", idx + 1, w.id, w.content);
        }
    }

    Ok(ReplayReport { session, rounds })
}

fn write_summary(pretty_js_stats: &str, out_path: &str) -> SessionResult<()> {
    if out_path == "stdout" {
        println!("{}", pretty_js_stats);
        return Ok(());
    }
    info!("Writing summary to {:?}", out_path);
    fs::write(out_path, pretty_js_stats).context(WritingSummarySnafu { path: out_path })
}

pub fn run_session(
    config_path: String,
    out_path: Option<String>,
    check_summary_path: Option<String>,
    input: Option<InputOverride>,
) -> SessionResult<()> {
    let config_p = Path::new(config_path.as_str());
    let config = read_config(&config_path)?;
    info!("config: {:?}", config);

    let root_p = config_p.parent().context(MissingParentDirSnafu {})?;

    let sources: Vec<BallotSource> = match input {
        Some(io) => {
            let cwd = std::env::current_dir().context(OpeningJsonSnafu {
                path: io.path.clone(),
            })?;
            vec![BallotSource {
                provider: io.input_type.unwrap_or_else(|| "json".to_string()),
                file_path: cwd.join(&io.path).display().to_string(),
                excel_worksheet_name: io.excel_worksheet_name,
                voter_column: None,
                round_column: None,
                choices_column: None,
                choices_delimiter: None,
            }]
        }
        None => config.ballot_sources.clone(),
    };
    if sources.is_empty() {
        whatever!("No ballot sources: use ballotSources in the session description or --input");
    }

    let mut data: Vec<ParsedBallot> = Vec::new();
    for source in sources.iter() {
        let mut file_data = read_ballot_data(root_p, source)?;
        data.append(&mut file_data);
    }
    info!("Read {} ballots", data.len());

    let report = replay_session(&config, &data)?;

    // Assemble the final json
    let result_js = build_summary_js(&config, &report);
    let pretty_js_stats = serde_json::to_string_pretty(&result_js).context(ParsingJsonSnafu {})?;

    let out = match (out_path, &config.output_settings.output_directory) {
        (Some(p), _) => p,
        (None, Some(dir)) => root_p
            .join(dir)
            .join("summary.json")
            .display()
            .to_string(),
        (None, None) => "stdout".to_string(),
    };
    write_summary(&pretty_js_stats, &out)?;

    // The reference summary, if provided for comparison
    if let Some(summary_p) = check_summary_path {
        let summary_ref = read_summary(summary_p)?;
        let pretty_js_summary_ref =
            serde_json::to_string_pretty(&summary_ref).context(ParsingJsonSnafu {})?;
        if pretty_js_summary_ref != pretty_js_stats {
            warn!("Found differences with the reference string");
            print_diff(
                pretty_js_summary_ref.as_str(),
                pretty_js_stats.as_ref(),
                "\n",
            );
            return ReferenceMismatchSnafu {}.fail();
        }
        info!("Summary matches the reference");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn test_wrapper(test_name: &str) {
        init();
        let test_dir = format!("{}/tests/data/{}", env!("CARGO_MANIFEST_DIR"), test_name);
        let res = run_session(
            format!("{}/{}_config.json", test_dir, test_name),
            Some("stdout".to_string()),
            Some(format!("{}/{}_expected_summary.json", test_dir, test_name)),
            None,
        );
        if let Err(e) = res {
            panic!("Test {} failed: {}", test_name, e);
        }
    }

    fn five_ideas() -> SessionConfig {
        let ideas: Vec<IdeaEntry> = (1..=5)
            .map(|idx| IdeaEntry {
                id: format!("idea{}", idx),
                content: format!("content {}", idx),
                author_id: "anna".to_string(),
            })
            .collect();
        SessionConfig {
            output_settings: OutputSettings {
                session_name: "test".to_string(),
                session_date: None,
                output_directory: None,
            },
            ideas,
            ballot_sources: vec![],
            rules: None,
        }
    }

    fn ballot(round: u32, voter_id: &str, choices: &[&str]) -> ParsedBallot {
        ParsedBallot {
            id: format!("{}-{}", voter_id, round),
            round,
            voter_id: voter_id.to_string(),
            choices: choices.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn direct_finalize() {
        test_wrapper("direct_finalize");
    }

    #[test]
    fn tie_break() {
        test_wrapper("tie_break");
    }

    #[test]
    fn ballots_run_out() {
        init();
        let ballots = vec![
            ballot(1, "anna", &["idea1", "idea2", "idea3"]),
            ballot(1, "bob", &["idea1", "idea2", "idea3", "idea4"]),
        ];
        // bob picks too many ideas: only anna's ballot counts, three-way tie at the top.
        let report = replay_session(&five_ideas(), &ballots).unwrap();
        assert_eq!(report.session.status(), SessionStatus::Finished);

        let ballots = vec![ballot(1, "anna", &["idea1"]), ballot(1, "bob", &["idea2"])];
        let report = replay_session(&five_ideas(), &ballots).unwrap();
        assert_eq!(report.session.status(), SessionStatus::Revoting);
        assert!(report.session.winners().is_none());
        let summary = build_summary_js(&five_ideas(), &report);
        assert_eq!(summary["status"], json!("REVOTING"));
        assert_eq!(summary["winners"], json!([]));
        assert_eq!(summary["results"][0]["nextRound"]["round"], json!(2));
        assert_eq!(summary["results"][0]["nextRound"]["ballot"], json!({}));
    }

    #[test]
    fn skipped_round() {
        init();
        let ballots = vec![
            ballot(1, "anna", &["idea1", "idea2"]),
            ballot(3, "anna", &["idea3"]),
        ];
        assert!(matches!(
            replay_session(&five_ideas(), &ballots),
            Err(SessionError::Whatever { .. })
        ));
    }

    #[test]
    fn not_enough_ideas() {
        init();
        let mut config = five_ideas();
        config.ideas.truncate(2);
        assert!(matches!(
            replay_session(&config, &[]),
            Err(SessionError::Selection {
                source: SelectionErrors::NotEnoughIdeas { .. }
            })
        ));
    }

    #[test]
    fn rules_from_config() {
        let rules: RulesConfig =
            serde_json::from_str(r#"{"maxVotesPerVoter": "2", "minimumIdeas": 4}"#).unwrap();
        assert_eq!(
            validate_rules(&Some(rules)).unwrap(),
            SessionRules {
                max_votes_per_voter: 2,
                minimum_ideas: 4
            }
        );
        let rules: RulesConfig = serde_json::from_str(r#"{"maxVotesPerVoter": 0}"#).unwrap();
        assert!(validate_rules(&Some(rules)).is_err());
        assert_eq!(
            validate_rules(&None).unwrap(),
            SessionRules::DEFAULT_RULES
        );
    }

    #[test]
    fn outcome_format() {
        let idea = Idea::new("idea1", "More plants", "anna").with_votes(4);
        assert_eq!(
            outcome_to_json(&ResolutionOutcome::NewRound {
                locked: vec![],
                candidates: vec![idea.clone()]
            }),
            json!({
                "action": "NEW_ROUND",
                "locked": [],
                "candidates": [
                    {"id": "idea1", "content": "More plants", "authorId": "anna", "voteCount": 4}
                ]
            })
        );
        assert_eq!(
            outcome_to_json(&ResolutionOutcome::Error {
                reason: "no ideas to resolve".to_string()
            }),
            json!({"action": "ERROR", "reason": "no ideas to resolve"})
        );
    }
}
