use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use dfcore::model::bond::BondRecord;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::io::tokenizer::{tokenize, TokenCursor};

pub const TIME_MARKER: i64 = 2;
pub const ENDS_MARKER: i64 = 5;
pub const FORCE_MARKER: i64 = 18;
pub const LIFETIME_MARKER: i64 = 24;

/// Force magnitude above which a post-failure sample is reported.
pub const FORCE_EPSILON: f64 = 1e-6;

/// A bond that still reports force after its logged death time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForceAnomaly {
    pub bond_id: u64,
    pub line: usize,
    pub time: f64,
    pub force: f64,
}

/// Validated content of a bond log.
#[derive(Clone, Debug, Default)]
pub struct BondLog {
    pub bonds: BTreeMap<u64, BondRecord>,
    /// Time/force samples per bond, `None` for a log without bonds
    pub event_count: Option<usize>,
    pub anomalies: Vec<ForceAnomaly>,
}

/// One parsed bond line.
#[derive(Clone, Debug, PartialEq)]
pub struct BondLine {
    pub bond: BondRecord,
    pub events: usize,
    /// `(time, force)` samples after the death time with non-zero force
    pub late_forces: Vec<(f64, f64)>,
}

/// Parses the tokens of one bond line.
pub fn parse_bond_tokens(cursor: &mut TokenCursor) -> std::result::Result<BondLine, String> {
    let id = cursor.record_header()?;
    let mut ends: Option<(u64, u64)> = None;
    let mut death_time: Option<f64> = None;
    let mut events = 0usize;
    let mut late_forces = Vec::new();

    while !cursor.is_done() {
        if cursor.eat_marker(ENDS_MARKER) {
            let begin = cursor.take_id("begin particle id")?;
            let end = cursor.take_id("end particle id")?;
            ends = Some((begin, end));
        } else if cursor.eat_marker(LIFETIME_MARKER) {
            let birth = cursor.take_f64("birth time")?;
            if birth != 0.0 {
                return Err(format!("bond {} born at {}, expected 0", id, birth));
            }
            death_time = Some(cursor.take_f64("death time")?);
        } else if cursor.eat_marker(TIME_MARKER) {
            let time = cursor.take_f64("time")?;
            cursor.expect_marker(FORCE_MARKER, &format!("after time {}", time))?;
            let force = cursor.take_f64("force")?;
            if let Some(death) = death_time {
                if time > death && force.abs() > FORCE_EPSILON {
                    late_forces.push((time, force));
                }
            }
            events += 1;
        } else {
            cursor.skip();
        }
    }

    let (begin, end) = ends.ok_or_else(|| format!("bond {}: endpoints marker {} not found", id, ENDS_MARKER))?;
    let death_time =
        death_time.ok_or_else(|| format!("bond {}: lifetime marker {} not found", id, LIFETIME_MARKER))?;

    Ok(BondLine {
        bond: BondRecord::new(id, begin, end, death_time),
        events,
        late_forces,
    })
}

/// Reads a bond log.
///
/// # Arguments
///
/// * `reader` - Line source.
/// * `source_name` - Name used in error messages, usually the path.
///
/// # Returns
///
/// * bonds keyed by id and the force anomalies seen on the way. Fails on the
///   first malformed line, on differing sample counts and on duplicate ids.
///
pub fn parse_bond_log<R: BufRead>(reader: R, source_name: &str) -> Result<BondLog> {
    let mut bond_log = BondLog::default();

    for (i, line) in reader.lines().enumerate() {
        let line_no = i + 1;
        let line = line.map_err(|e| Error::io(Path::new(source_name), e))?;
        let tokens = match tokenize(&line).map_err(|d| Error::format(source_name, line_no, d))? {
            Some(tokens) => tokens,
            None => continue,
        };

        let parsed = parse_bond_tokens(&mut TokenCursor::new(&tokens))
            .map_err(|d| Error::format(source_name, line_no, d))?;
        let id = parsed.bond.id;

        match bond_log.event_count {
            None => bond_log.event_count = Some(parsed.events),
            Some(expected) if expected != parsed.events => {
                return Err(Error::consistency(
                    source_name,
                    format!(
                        "line {}: bond {} has {} events, expected {}",
                        line_no, id, parsed.events, expected
                    ),
                ));
            }
            Some(_) => {}
        }

        bond_log.anomalies.extend(parsed.late_forces.into_iter().map(|(time, force)| ForceAnomaly {
            bond_id: id,
            line: line_no,
            time,
            force,
        }));

        if bond_log.bonds.insert(id, parsed.bond).is_some() {
            return Err(Error::consistency(source_name, format!("line {}: duplicate bond id {}", line_no, id)));
        }
    }

    log::info!(
        "read {} bonds with {} events each from {}",
        bond_log.bonds.len(),
        bond_log.event_count.unwrap_or(0),
        source_name
    );
    if !bond_log.anomalies.is_empty() {
        log::warn!(
            "{} samples in {} report non-zero force after bond death",
            bond_log.anomalies.len(),
            source_name
        );
    }
    Ok(bond_log)
}

pub fn read_bond_log(path: &Path) -> Result<BondLog> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    parse_bond_log(BufReader::new(file), &path.display().to_string())
}
