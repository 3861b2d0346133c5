use crate::replay::*;

use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(rename = "sessionName")]
    pub session_name: String,
    #[serde(rename = "sessionDate")]
    pub session_date: Option<String>,
    #[serde(rename = "outputDirectory")]
    pub output_directory: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub session: String,
    pub date: Option<String>,
    pub ideas: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct IdeaEntry {
    pub id: String,
    pub content: String,
    #[serde(rename = "authorId")]
    pub author_id: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct BallotSource {
    pub provider: String,
    #[serde(rename = "filePath")]
    pub file_path: String,
    #[serde(rename = "excelWorksheetName")]
    pub excel_worksheet_name: Option<String>,
    #[serde(rename = "voterColumn")]
    pub voter_column: Option<String>,
    #[serde(rename = "roundColumn")]
    pub round_column: Option<String>,
    #[serde(rename = "choicesColumn")]
    pub choices_column: Option<String>,
    #[serde(rename = "choicesDelimiter")]
    pub choices_delimiter: Option<String>,
}

impl BallotSource {
    pub fn voter_column(&self) -> String {
        self.voter_column
            .clone()
            .unwrap_or_else(|| "Voter".to_string())
    }

    pub fn round_column(&self) -> String {
        self.round_column
            .clone()
            .unwrap_or_else(|| "Round".to_string())
    }

    pub fn choices_column(&self) -> String {
        self.choices_column
            .clone()
            .unwrap_or_else(|| "Ideas".to_string())
    }

    pub fn choices_delimiter(&self) -> String {
        match self.choices_delimiter.clone() {
            Some(d) if !d.is_empty() => d,
            _ => ";".to_string(),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    #[serde(rename = "maxVotesPerVoter")]
    _max_votes_per_voter: Option<JSValue>,
    #[serde(rename = "minimumIdeas")]
    _minimum_ideas: Option<JSValue>,
}

impl RulesConfig {
    pub fn max_votes_per_voter(&self) -> SessionResult<Option<usize>> {
        if self._max_votes_per_voter.is_some() {
            read_js_int(&self._max_votes_per_voter).map(Some)
        } else {
            Ok(None)
        }
    }

    pub fn minimum_ideas(&self) -> SessionResult<Option<usize>> {
        if self._minimum_ideas.is_some() {
            read_js_int(&self._minimum_ideas).map(Some)
        } else {
            Ok(None)
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(rename = "outputSettings")]
    pub output_settings: OutputSettings,
    pub ideas: Vec<IdeaEntry>,
    #[serde(rename = "ballotSources", default)]
    pub ballot_sources: Vec<BallotSource>,
    pub rules: Option<RulesConfig>,
}

pub fn read_config(path: &str) -> SessionResult<SessionConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    serde_json::from_str(&contents).context(ParsingJsonSnafu {})
}

pub fn read_summary(path: String) -> SessionResult<JSValue> {
    let contents = fs::read_to_string(path.clone()).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(js)
}

pub(crate) fn read_js_int(x: &Option<JSValue>) -> SessionResult<usize> {
    match x {
        Some(JSValue::Number(n)) => n
            .as_u64()
            .map(|x| x as usize)
            .context(ParsingJsonNumberSnafu {}),
        Some(JSValue::String(s)) => s
            .trim()
            .parse::<usize>()
            .ok()
            .context(ParsingJsonNumberSnafu {}),
        _ => None.context(ParsingJsonNumberSnafu {}),
    }
}
