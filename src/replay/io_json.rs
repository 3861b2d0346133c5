// Ballots recorded in JSON.

use serde::Deserialize;

use crate::replay::{io_common::make_default_id, *};

#[derive(Debug, Clone, Deserialize)]
struct BallotFile {
    ballots: Vec<JsonBallot>,
}

#[derive(Debug, Clone, Deserialize)]
struct JsonBallot {
    id: Option<String>,
    round: Option<u32>,
    #[serde(rename = "voterId")]
    voter_id: String,
    #[serde(rename = "ideaIds")]
    idea_ids: Vec<String>,
}

pub fn read_json_ballots(path: &str) -> SessionResult<Vec<ParsedBallot>> {
    let default_id = make_default_id(path);
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    debug!("read_json_ballots: read {} bytes from {:?}", contents.len(), path);
    parse_json_ballots(&contents, default_id)
}

fn parse_json_ballots(
    contents: &str,
    default_id: impl Fn(usize) -> String,
) -> SessionResult<Vec<ParsedBallot>> {
    let bf: BallotFile = serde_json::from_str(contents).context(ParsingJsonSnafu {})?;
    let res = bf
        .ballots
        .into_iter()
        .enumerate()
        .map(|(idx, jb)| ParsedBallot {
            id: jb.id.unwrap_or_else(|| default_id(idx + 1)),
            round: jb.round.unwrap_or(1),
            voter_id: jb.voter_id,
            choices: jb.idea_ids,
        })
        .collect();
    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_defaults_to_one() {
        let contents = r#"{"ballots": [
            {"voterId": "anna", "ideaIds": ["idea1", "idea2"]},
            {"id": "b-2", "round": 2, "voterId": "bob", "ideaIds": []}
        ]}"#;
        let ballots = parse_json_ballots(contents, |idx| format!("line{}", idx)).unwrap();
        assert_eq!(
            ballots,
            vec![
                ParsedBallot {
                    id: "line1".to_string(),
                    round: 1,
                    voter_id: "anna".to_string(),
                    choices: vec!["idea1".to_string(), "idea2".to_string()],
                },
                ParsedBallot {
                    id: "b-2".to_string(),
                    round: 2,
                    voter_id: "bob".to_string(),
                    choices: vec![],
                },
            ]
        );
    }

    #[test]
    fn missing_voter() {
        let contents = r#"{"ballots": [{"ideaIds": ["idea1"]}]}"#;
        assert!(matches!(
            parse_json_ballots(contents, |idx| format!("line{}", idx)),
            Err(SessionError::ParsingJson { .. })
        ));
    }
}
