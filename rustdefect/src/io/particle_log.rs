use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use dfcore::model::particle::{ParticleRecord, TrajectorySample};
use dfcore::model::time_points::TimePointTable;
use nalgebra::Point3;

use crate::error::{Error, Result};
use crate::io::tokenizer::{tokenize, TokenCursor};

pub const TIME_MARKER: i64 = 2;
pub const RADIUS_MARKER: i64 = 5;
pub const COORD_MARKER: i64 = 12;

/// Positions are logged in meters and stored in millimeters.
pub const POSITION_SCALE: f64 = 1000.0;

/// Validated content of a particle log.
#[derive(Clone, Debug)]
pub struct ParticleLog {
    pub particles: BTreeMap<u64, ParticleRecord>,
    /// Trajectory length shared by every particle
    pub event_count: usize,
    pub time_points: TimePointTable,
}

/// Parses the tokens of one particle line into a record.
pub fn parse_particle_tokens(cursor: &mut TokenCursor) -> std::result::Result<ParticleRecord, String> {
    let id = cursor.record_header()?;
    let mut radius: Option<f64> = None;
    let mut trajectory: Vec<TrajectorySample> = Vec::new();

    while !cursor.is_done() {
        if cursor.eat_marker(RADIUS_MARKER) {
            let r = cursor.take_f64("radius")?;
            if !(r > 0.0 && r.is_finite()) {
                return Err(format!("radius must be positive, got {}", r));
            }
            radius = Some(r);
        } else if cursor.eat_marker(TIME_MARKER) {
            let time = cursor.take_f64("time")?;
            cursor.expect_marker(COORD_MARKER, &format!("after time {}", time))?;
            let x = cursor.take_f64("x coordinate")?;
            let y = cursor.take_f64("y coordinate")?;
            let z = cursor.take_f64("z coordinate")?;

            if let Some(prev) = trajectory.last() {
                if time <= prev.time {
                    return Err(format!("time {} does not follow previous sample {}", time, prev.time));
                }
            }
            let position = Point3::new(x, y, z) * POSITION_SCALE;
            trajectory.push(TrajectorySample::new(time, position));
        } else {
            cursor.skip();
        }
    }

    let radius = radius.ok_or_else(|| format!("particle {}: radius marker {} not found", id, RADIUS_MARKER))?;
    Ok(ParticleRecord::new(id, radius, trajectory))
}

/// Reads a particle log.
///
/// # Arguments
///
/// * `reader` - Line source.
/// * `source_name` - Name used in error messages, usually the path.
///
/// # Returns
///
/// * particles keyed by id, with the time table taken from the first
///   particle. Fails on the first malformed line, on differing event counts,
///   on duplicate ids and on particles whose sample times differ from the
///   first particle.
///
pub fn parse_particle_log<R: BufRead>(reader: R, source_name: &str) -> Result<ParticleLog> {
    let mut particles: BTreeMap<u64, ParticleRecord> = BTreeMap::new();
    let mut time_points: Option<TimePointTable> = None;

    for (i, line) in reader.lines().enumerate() {
        let line_no = i + 1;
        let line = line.map_err(|e| Error::io(Path::new(source_name), e))?;
        let tokens = match tokenize(&line).map_err(|d| Error::format(source_name, line_no, d))? {
            Some(tokens) => tokens,
            None => continue,
        };

        let particle = parse_particle_tokens(&mut TokenCursor::new(&tokens))
            .map_err(|d| Error::format(source_name, line_no, d))?;

        match &time_points {
            None => time_points = Some(TimePointTable::from_particle(&particle)),
            Some(table) => {
                if particle.event_count() != table.len() {
                    return Err(Error::consistency(
                        source_name,
                        format!(
                            "line {}: particle {} has {} events, expected {}",
                            line_no,
                            particle.id,
                            particle.event_count(),
                            table.len()
                        ),
                    ));
                }
                if !particle.times().eq(table.as_slice().iter().copied()) {
                    return Err(Error::consistency(
                        source_name,
                        format!("line {}: particle {} is sampled at different times", line_no, particle.id),
                    ));
                }
            }
        }

        if particles.contains_key(&particle.id) {
            return Err(Error::consistency(
                source_name,
                format!("line {}: duplicate particle id {}", line_no, particle.id),
            ));
        }
        particles.insert(particle.id, particle);
    }

    let time_points = match time_points {
        Some(t) if !t.is_empty() => t,
        _ => return Err(Error::consistency(source_name, "no particle time samples found")),
    };

    log::info!(
        "read {} particles with {} events each from {}",
        particles.len(),
        time_points.len(),
        source_name
    );
    Ok(ParticleLog { particles, event_count: time_points.len(), time_points })
}

pub fn read_particle_log(path: &Path) -> Result<ParticleLog> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    parse_particle_log(BufReader::new(file), &path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<ParticleLog> {
        parse_particle_log(text.as_bytes(), "particles.txt")
    }

    #[test]
    fn test_parse_scales_to_millimeters() {
        let log = parse("0 1 5 0.0005 2 0 12 0.001 0.002 -0.003 2 0.1 12 0 0 0.01\n").unwrap();
        let p = &log.particles[&1];
        assert_eq!(p.radius, 0.0005);
        assert_eq!(p.event_count(), 2);
        assert!((p.trajectory[0].position - Point3::new(1.0, 2.0, -3.0)).norm() < 1e-12);
        assert!((p.trajectory[1].position.z - 10.0).abs() < 1e-12);
        assert_eq!(log.time_points.as_slice(), &[0.0, 0.1]);
    }

    #[test]
    fn test_unknown_fields_are_skipped_and_blank_lines_ignored() {
        let text = "0 1 7 3.5 5 0.1 2 0 12 0 0 0\n\n0 2 2 0 12 1 1 1 9 9 5 0.2\n";
        let log = parse(text).unwrap();
        assert_eq!(log.particles.len(), 2);
        assert_eq!(log.particles[&2].radius, 0.2);
        assert_eq!(log.event_count, 1);
    }

    #[test]
    fn test_missing_coordinate_marker_is_format_error() {
        let err = parse("0 1 5 0.1 2 0 13 0 0 0\n").unwrap_err();
        match err {
            Error::Format { line, detail, .. } => {
                assert_eq!(line, 1);
                assert!(detail.contains("expected marker 12"), "{}", detail);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_missing_radius_is_format_error() {
        let err = parse("0 1 5 0.1 2 0 12 0 0 0\n0 2 2 0 12 0 0 0\n").unwrap_err();
        assert!(matches!(err, Error::Format { line: 2, .. }));
    }

    #[test]
    fn test_leading_field_must_be_zero() {
        let err = parse("1 1 5 0.1 2 0 12 0 0 0\n").unwrap_err();
        assert!(matches!(err, Error::Format { line: 1, .. }));
    }

    #[test]
    fn test_truncated_coordinates() {
        let err = parse("0 1 5 0.1 2 0 12 0 0\n").unwrap_err();
        assert!(matches!(err, Error::Format { .. }));
    }

    #[test]
    fn test_event_count_mismatch_is_consistency_error() {
        let text = "0 1 5 0.1 2 0 12 0 0 0 2 1 12 0 0 0\n0 2 5 0.1 2 0 12 0 0 0\n";
        assert!(matches!(parse(text).unwrap_err(), Error::Consistency { .. }));
    }

    #[test]
    fn test_duplicate_id_is_consistency_error() {
        let text = "0 1 5 0.1 2 0 12 0 0 0\n0 1 5 0.1 2 0 12 0 0 0\n";
        assert!(matches!(parse(text).unwrap_err(), Error::Consistency { .. }));
    }

    #[test]
    fn test_empty_file_is_consistency_error() {
        assert!(matches!(parse("\n\n").unwrap_err(), Error::Consistency { .. }));
    }

    #[test]
    fn test_non_ascending_times_rejected() {
        let err = parse("0 1 5 0.1 2 1 12 0 0 0 2 0.5 12 0 0 0\n").unwrap_err();
        assert!(matches!(err, Error::Format { .. }));
    }
}
