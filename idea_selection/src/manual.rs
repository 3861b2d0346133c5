/*!

This is the long-form manual for `idea_selection` and `ideavote`.

## How winners are picked

Each round, every voter picks up to three ideas (see `maxVotesPerVoter`). When the
round is closed, the ideas are grouped by vote count and the groups are considered from
the highest count down:

- a group that fits in the seats still open takes these seats (the ideas are *locked*),
- a group that fills the open seats exactly ends the session with three winners,
- a group with more ideas than open seats goes to a tie-break round.

A tie-break round only shows the tied ideas on the ballot, and only contests the seats
that are still open. Locked ideas keep their seats and are never voted on again.

| votes in round 1  | outcome                                              |
|-------------------|------------------------------------------------------|
| `5 5 5 2 1`       | finished: ideas 1, 2, 3                              |
| `7 7 5 5 5`       | tie-break: 1 and 2 locked, 3, 4, 5 for the last seat |
| `10 7 7 7 5`      | tie-break: 1 locked, 2, 3, 4 for the last two seats  |
| `7 7 7 7 5`       | tie-break: 1, 2, 3, 4 for all three seats            |

## Session description

`ideavote` replays a session from a JSON description:

```text
{
  "outputSettings": { "sessionName": "Team offsite", "sessionDate": "2024-05-02" },
  "ideas": [
    { "id": "idea1", "content": "More plants", "authorId": "anna" },
    ...
  ],
  "ballotSources": [ { "provider": "json", "filePath": "ballots.json" } ],
  "rules": { "maxVotesPerVoter": 3, "minimumIdeas": 3 }
}
```

The rules are optional. File paths are relative to the description file.

## Input formats

### `json`

```text
{ "ballots": [
  { "round": 1, "voterId": "anna", "ideaIds": ["idea1", "idea3"] },
  { "round": 2, "voterId": "anna", "ideaIds": ["idea4"] }
] }
```

### `msforms`

Results from Microsoft Forms or Google Forms, exported in Excel (.xlsx) format. Each
row is one ballot. The columns are found by their name in the first row:

|             | `voterColumn` | `roundColumn` | `choicesColumn` |
|-------------|---------------|---------------|-----------------|
| default     | `Voter`       | `Round`       | `Ideas`         |

The choices cell holds the ids of the picked ideas, separated by `choicesDelimiter`
(`;` by default, which is what the forms use for multiple choice questions). The round
column is optional; without it, every ballot is for round 1. Use `excelWorksheetName`
when the workbook has more than one worksheet.

## Output

The summary lists each round with its tally and its outcome (`FINALIZE`, `NEW_ROUND`
with the state of the next round, or `ERROR`), the final status and the winners. Pass
`--reference` to compare the summary with an expected one.

 */
