use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use dfcore::model::bond::ReconstructedBond;
use dfcore::model::point::BondFailure;
use nalgebra::Point3;

use crate::error::{Error, Result};

pub const PREPROCESSED_FILE: &str = "bonds_preprocessed.txt";

pub const HEADER: [&str; 13] = [
    "BondId",
    "BondX,mm",
    "BondY,mm",
    "BondZ,mm",
    "DeathT,s",
    "BeginParticleId",
    "BeginParticleX,mm",
    "BeginParticleY,mm",
    "BeginParticleZ,mm",
    "EndParticleId",
    "EndParticleX,mm",
    "EndParticleY,mm",
    "EndParticleZ,mm",
];

/// Writes one space-separated row per reconstructed bond.
pub fn write_preprocessed(path: &Path, bonds: &[ReconstructedBond]) -> Result<()> {
    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    let mut out = BufWriter::new(file);
    let io = |e| Error::io(path, e);

    writeln!(out, "{}", HEADER.join(" ")).map_err(io)?;
    for b in bonds {
        writeln!(
            out,
            "{} {} {} {} {} {} {} {} {} {} {} {} {}",
            b.id,
            b.position.x,
            b.position.y,
            b.position.z,
            b.death_time,
            b.begin_particle_id,
            b.begin_position.x,
            b.begin_position.y,
            b.begin_position.z,
            b.end_particle_id,
            b.end_position.x,
            b.end_position.y,
            b.end_position.z,
        )
        .map_err(io)?;
    }
    out.flush().map_err(io)?;
    log::info!("wrote {} bonds to {}", bonds.len(), path.display());
    Ok(())
}

/// Reads bond positions and death times from a preprocessed file.
///
/// Columns are located by header name, so extra columns or a different
/// column order are accepted.
pub fn parse_preprocessed<R: BufRead>(reader: R, source_name: &str) -> Result<Vec<BondFailure>> {
    let mut lines = reader.lines();
    let header = match lines.next() {
        Some(line) => line.map_err(|e| Error::io(Path::new(source_name), e))?,
        None => return Err(Error::format(source_name, 1, "missing header")),
    };
    let columns: Vec<&str> = header.split_whitespace().collect();
    let column = |name: &str| {
        columns
            .iter()
            .position(|&c| c == name)
            .ok_or_else(|| Error::format(source_name, 1, format!("missing column '{}'", name)))
    };
    let (cx, cy, cz, ct) = (column("BondX,mm")?, column("BondY,mm")?, column("BondZ,mm")?, column("DeathT,s")?);

    let mut failures = Vec::new();
    for (i, line) in lines.enumerate() {
        let line_no = i + 2;
        let line = line.map_err(|e| Error::io(Path::new(source_name), e))?;
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }
        let value = |idx: usize, name: &str| -> Result<f64> {
            fields
                .get(idx)
                .and_then(|f| f.parse::<f64>().ok())
                .ok_or_else(|| Error::format(source_name, line_no, format!("bad or missing {}", name)))
        };
        let position = Point3::new(value(cx, "BondX,mm")?, value(cy, "BondY,mm")?, value(cz, "BondZ,mm")?);
        failures.push(BondFailure::new(position, value(ct, "DeathT,s")?));
    }
    Ok(failures)
}

pub fn read_preprocessed(path: &Path) -> Result<Vec<BondFailure>> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let failures = parse_preprocessed(BufReader::new(file), &path.display().to_string())?;
    log::info!("read {} bond failures from {}", failures.len(), path.display());
    Ok(failures)
}
