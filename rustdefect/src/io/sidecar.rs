use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use dfcore::model::time_points::TimePointTable;

use crate::error::{Error, Result};

pub const TIME_POINTS_FILE: &str = "time_points.txt";

/// Writes the time axis as one line of space-separated values.
///
/// Values use the shortest representation that parses back to the same
/// `f64`, each followed by a space.
pub fn write_time_points(path: &Path, table: &TimePointTable) -> Result<()> {
    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    let mut out = BufWriter::new(file);
    let io = |e| Error::io(path, e);
    for t in table.as_slice() {
        write!(out, "{} ", t).map_err(io)?;
    }
    writeln!(out).map_err(io)?;
    out.flush().map_err(io)?;
    Ok(())
}

/// Reads a time axis written by `write_time_points`.
pub fn read_time_points(path: &Path) -> Result<TimePointTable> {
    let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let source = path.display().to_string();
    let line = text.lines().next().unwrap_or("");

    let mut times = Vec::new();
    for field in line.split_whitespace() {
        let t: f64 = field
            .parse()
            .map_err(|_| Error::format(&source, 1, format!("not a time value: '{}'", field)))?;
        if let Some(&prev) = times.last() {
            if t <= prev {
                return Err(Error::format(&source, 1, format!("time {} does not follow {}", t, prev)));
            }
        }
        times.push(t);
    }
    if times.is_empty() {
        return Err(Error::consistency(&source, "no time points"));
    }
    Ok(TimePointTable::new(times))
}
