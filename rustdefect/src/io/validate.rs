use crate::error::{Error, Result};
use crate::io::bond_log::BondLog;
use crate::io::particle_log::ParticleLog;

/// Checks that a particle log and a bond log describe the same simulation.
///
/// The event count of both files must agree and every bond endpoint must be
/// a known particle. A bond log without bonds has no event count and is
/// accepted as is.
pub fn cross_validate(
    particles: &ParticleLog,
    bonds: &BondLog,
    particle_source: &str,
    bond_source: &str,
) -> Result<()> {
    if let Some(bond_events) = bonds.event_count {
        if bond_events != particles.event_count {
            return Err(Error::consistency(
                &format!("{} / {}", particle_source, bond_source),
                format!(
                    "files are mismatched: {} particle events, {} bond events",
                    particles.event_count, bond_events
                ),
            ));
        }
    } else {
        log::warn!("{} contains no bonds", bond_source);
    }

    for bond in bonds.bonds.values() {
        for id in [bond.begin_particle_id, bond.end_particle_id] {
            if !particles.particles.contains_key(&id) {
                return Err(Error::consistency(
                    bond_source,
                    format!("bond {} references unknown particle {}", bond.id, id),
                ));
            }
        }
    }
    Ok(())
}
