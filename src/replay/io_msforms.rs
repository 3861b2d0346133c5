// Ballots exported from Microsoft Forms or Google Forms, in Excel format.

use calamine::{open_workbook, DataType, Reader, Xlsx};
use std::collections::HashMap;

use crate::replay::{
    io_common::{make_default_id, split_choices},
    *,
};

pub fn read_msforms_ballots(
    path: &str,
    source: &BallotSource,
) -> SessionResult<Vec<ParsedBallot>> {
    let default_id = make_default_id(path);
    let wrange = get_range(path, source)?;
    parse_msforms_rows(&wrange, source, default_id)
}

fn parse_msforms_rows(
    wrange: &calamine::Range<DataType>,
    source: &BallotSource,
    default_id: impl Fn(usize) -> String,
) -> SessionResult<Vec<ParsedBallot>> {
    let header = wrange.rows().next().context(EmptyExcelSnafu {})?;
    debug!("read_msforms_ballots: header: {:?}", header);

    let voter_idx = get_col_index(&source.voter_column(), header)?;
    let choices_idx = get_col_index(&source.choices_column(), header)?;
    // Single-round forms usually have no round column.
    let round_idx = get_col_index(&source.round_column(), header).ok();
    let delimiter = source.choices_delimiter();
    debug!(
        "read_msforms_ballots: voter: {} choices: {} round: {:?}",
        voter_idx, choices_idx, round_idx
    );

    let mut iter = wrange.rows();
    iter.next();
    let mut res: Vec<ParsedBallot> = Vec::new();
    for (idx, row) in iter.enumerate() {
        // The header is the first line of the sheet.
        let lineno = idx + 2;
        let voter_id = match row.get(voter_idx) {
            Some(DataType::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(DataType::Int(i)) => i.to_string(),
            Some(DataType::Float(f)) => format!("{}", f),
            Some(DataType::String(_)) | Some(DataType::Empty) | None => {
                warn!(
                    "read_msforms_ballots: line {}: no voter, skipping row {:?}",
                    lineno, row
                );
                continue;
            }
            Some(x) => {
                return Err(SessionError::ExcelWrongCellType {
                    lineno: lineno as u64,
                    content: format!("{:?}", x),
                });
            }
        };

        let round: u32 = match round_idx.map(|i| row.get(i)) {
            None | Some(None) | Some(Some(DataType::Empty)) => 1,
            Some(Some(DataType::Int(i))) if *i >= 1 => {
                u32::try_from(*i).ok().context(ExcelWrongCellTypeSnafu {
                    lineno: lineno as u64,
                    content: i.to_string(),
                })?
            }
            Some(Some(DataType::Float(f)))
                if *f >= 1.0 && *f <= u32::MAX as f64 && f.fract() == 0.0 =>
            {
                *f as u32
            }
            Some(Some(DataType::String(s))) => s
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|r| *r >= 1)
                .context(ExcelWrongCellTypeSnafu {
                    lineno: lineno as u64,
                    content: s.clone(),
                })?,
            Some(Some(x)) => {
                return Err(SessionError::ExcelWrongCellType {
                    lineno: lineno as u64,
                    content: format!("{:?}", x),
                });
            }
        };

        let choices: Vec<String> = match row.get(choices_idx) {
            Some(DataType::String(s)) => split_choices(s, &delimiter),
            Some(DataType::Empty) | None => vec![],
            Some(x) => {
                return Err(SessionError::ExcelWrongCellType {
                    lineno: lineno as u64,
                    content: format!("{:?}", x),
                });
            }
        };

        debug!(
            "read_msforms_ballots: line {}: round {} voter {} choices {:?}",
            lineno, round, voter_id, choices
        );
        res.push(ParsedBallot {
            id: default_id(lineno),
            round,
            voter_id,
            choices,
        });
    }
    Ok(res)
}

/// Given the header of a file (names of each of the columns), finds the position of a column.
fn get_col_index(col_name: &str, header: &[DataType]) -> SessionResult<usize> {
    let col_names: HashMap<String, usize> = header
        .iter()
        .enumerate()
        .filter_map(|(idx, x)| match x {
            DataType::String(s) => Some((s.trim().to_string(), idx)),
            _ => None,
        })
        .collect();

    col_names
        .get(col_name)
        .cloned()
        .context(ExcelCannotFindColumnSnafu {
            column_name: col_name,
        })
}

fn get_range(path: &str, source: &BallotSource) -> SessionResult<calamine::Range<DataType>> {
    let worksheet_name_o = source.excel_worksheet_name.clone();
    debug!(
        "get_range: path: {:?} worksheet: {:?}",
        &path, &worksheet_name_o
    );
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;

    // A worksheet name was provided, use it.
    if let Some(worksheet_name) = worksheet_name_o {
        let wrange = workbook
            .worksheet_range(&worksheet_name)
            .context(EmptyExcelSnafu {})?
            .context(OpeningExcelSnafu { path })?;
        Ok(wrange)
    } else {
        let all_worksheets = workbook.worksheets();
        match all_worksheets.as_slice() {
            [] => EmptyExcelSnafu {}.fail(),
            [(worksheet_name, wrange)] => {
                debug!("get_range: path: {:?} worksheet: {:?}", &path, &worksheet_name);
                Ok(wrange.clone())
            }
            _ => whatever!(
                "{}: {} worksheets found, the worksheet name must be provided",
                path,
                all_worksheets.len()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> Vec<DataType> {
        vec![
            DataType::String("ID".to_string()),
            DataType::String("Voter".to_string()),
            DataType::Empty,
            DataType::String(" Ideas ".to_string()),
        ]
    }

    fn sheet(rows: &[Vec<DataType>]) -> calamine::Range<DataType> {
        let width = rows.iter().map(|r| r.len()).max().unwrap_or(1);
        let mut range = calamine::Range::new((0, 0), (rows.len() as u32 - 1, width as u32 - 1));
        for (r, row) in rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                range.set_value((r as u32, c as u32), cell.clone());
            }
        }
        range
    }

    fn source() -> BallotSource {
        BallotSource {
            provider: "msforms".to_string(),
            file_path: "offsite.xlsx".to_string(),
            excel_worksheet_name: None,
            voter_column: None,
            round_column: None,
            choices_column: None,
            choices_delimiter: None,
        }
    }

    fn s(x: &str) -> DataType {
        DataType::String(x.to_string())
    }

    fn line_id(lineno: usize) -> String {
        format!("line{}", lineno)
    }

    #[test]
    fn rows_with_rounds() {
        let wrange = sheet(&[
            vec![s("ID"), s("Voter"), s("Round"), s("Ideas")],
            vec![DataType::Int(1), s("anna"), DataType::Int(1), s("idea1; idea2")],
            vec![DataType::Int(2), DataType::Float(7.0), DataType::Float(2.0), s("idea3")],
            vec![DataType::Int(3), DataType::Empty, DataType::Int(1), s("idea1")],
            vec![DataType::Int(4), s("  "), DataType::Int(1), s("idea1")],
            vec![DataType::Int(5), DataType::Int(42), s(" 3 "), DataType::Empty],
        ]);
        let ballots = parse_msforms_rows(&wrange, &source(), line_id).unwrap();
        assert_eq!(
            ballots,
            vec![
                ParsedBallot {
                    id: "line2".to_string(),
                    round: 1,
                    voter_id: "anna".to_string(),
                    choices: vec!["idea1".to_string(), "idea2".to_string()],
                },
                ParsedBallot {
                    id: "line3".to_string(),
                    round: 2,
                    voter_id: "7".to_string(),
                    choices: vec!["idea3".to_string()],
                },
                ParsedBallot {
                    id: "line6".to_string(),
                    round: 3,
                    voter_id: "42".to_string(),
                    choices: vec![],
                },
            ]
        );
    }

    #[test]
    fn single_round_forms_with_custom_columns() {
        let wrange = sheet(&[
            vec![s("Name"), s("Picks")],
            vec![s("anna"), s("idea1,idea3")],
        ]);
        let mut src = source();
        src.voter_column = Some("Name".to_string());
        src.choices_column = Some("Picks".to_string());
        src.choices_delimiter = Some(",".to_string());
        let ballots = parse_msforms_rows(&wrange, &src, line_id).unwrap();
        assert_eq!(ballots.len(), 1);
        assert_eq!(ballots[0].round, 1);
        assert_eq!(ballots[0].choices, vec!["idea1", "idea3"]);
    }

    #[test]
    fn bad_rounds() {
        for bad_round in [
            DataType::Int(4294967297),
            DataType::Int(0),
            DataType::Float(1.5),
            s("first"),
            DataType::Bool(true),
        ] {
            let wrange = sheet(&[
                vec![s("Voter"), s("Round"), s("Ideas")],
                vec![s("anna"), bad_round.clone(), s("idea1")],
            ]);
            assert!(
                matches!(
                    parse_msforms_rows(&wrange, &source(), line_id),
                    Err(SessionError::ExcelWrongCellType { lineno: 2, .. })
                ),
                "round cell {:?} should be rejected",
                bad_round
            );
        }
    }

    #[test]
    fn bad_cells() {
        let wrange = sheet(&[
            vec![s("Voter"), s("Ideas")],
            vec![DataType::Bool(false), s("idea1")],
        ]);
        assert!(matches!(
            parse_msforms_rows(&wrange, &source(), line_id),
            Err(SessionError::ExcelWrongCellType { lineno: 2, .. })
        ));
        let wrange = sheet(&[vec![s("Voter"), s("Ideas")], vec![s("anna"), DataType::Int(3)]]);
        assert!(matches!(
            parse_msforms_rows(&wrange, &source(), line_id),
            Err(SessionError::ExcelWrongCellType { lineno: 2, .. })
        ));
        let wrange = sheet(&[vec![s("Voter")], vec![s("anna")]]);
        assert!(matches!(
            parse_msforms_rows(&wrange, &source(), line_id),
            Err(SessionError::ExcelCannotFindColumn { .. })
        ));
    }

    #[test]
    fn columns_by_name() {
        assert_eq!(get_col_index("Voter", &header()).unwrap(), 1);
        assert_eq!(get_col_index("Ideas", &header()).unwrap(), 3);
        assert!(matches!(
            get_col_index("Round", &header()),
            Err(SessionError::ExcelCannotFindColumn { .. })
        ));
    }
}
