//! Reading and writing the plain-text particle format.
//!
//! A file starts with the particle count on its own line, followed by one
//! line per particle:
//!
//! ```text
//! index	x	y	mass	vx	vy
//! ```
//!
//! Fields are tab-separated on output; any whitespace is accepted on input.
//! Floats are written with six decimals.
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use log::{debug, warn};

use crate::errors::SimulationError;
use crate::particles::Particle;

const MAX_PREALLOCATED_PARTICLES: usize = 1 << 16;

/// Parses a particle set from `reader`.
///
/// # Errors
///
/// Returns `MalformedInput` for an unparsable header or particle line, and
/// `ParticleCountMismatch` if fewer particles follow than the header announces.
///
/// # Examples
///
/// ```
/// use rs_barnes_hut::particles::read_particles;
///
/// let text = "2\n0\t1.0\t1.0\t2.0\t0.0\t0.0\n1\t3.0\t3.0\t2.0\t0.1\t-0.1\n";
/// let particles = read_particles(text.as_bytes()).expect("valid input");
/// assert_eq!(particles.len(), 2);
/// assert_eq!(particles[1].vy, -0.1);
/// ```
pub fn read_particles<R: BufRead>(reader: R) -> Result<Vec<Particle>, SimulationError> {
    let mut lines = reader
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line))
        .filter(|(_, line)| line.as_ref().map_or(true, |l| !l.trim().is_empty()));

    let expected = match lines.next() {
        Some((line_no, line)) => {
            let line = line.map_err(|e| malformed(line_no, e.to_string()))?;
            line.trim()
                .parse::<usize>()
                .map_err(|e| malformed(line_no, format!("invalid particle count '{}': {}", line.trim(), e)))?
        }
        None => return Err(malformed(1, "missing particle count".to_string())),
    };
    debug!("reading {} particles", expected);

    // The header is untrusted until the lines are actually there.
    let mut particles = Vec::with_capacity(expected.min(MAX_PREALLOCATED_PARTICLES));
    for (line_no, line) in lines {
        if particles.len() == expected {
            warn!("ignoring particle data from line {}: header announced {} particles", line_no, expected);
            break;
        }
        let line = line.map_err(|e| malformed(line_no, e.to_string()))?;
        particles.push(parse_particle(line_no, &line)?);
    }

    if particles.len() < expected {
        return Err(SimulationError::ParticleCountMismatch { expected, found: particles.len() });
    }
    Ok(particles)
}

fn parse_particle(line_no: usize, line: &str) -> Result<Particle, SimulationError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != 6 {
        return Err(malformed(line_no, format!("expected 6 fields, found {}", fields.len())));
    }

    let index = fields[0]
        .parse::<usize>()
        .map_err(|e| malformed(line_no, format!("invalid index '{}': {}", fields[0], e)))?;

    let mut values = [0.0; 5];
    for (value, field) in values.iter_mut().zip(&fields[1..]) {
        *value = field
            .parse::<f64>()
            .map_err(|e| malformed(line_no, format!("invalid number '{}': {}", field, e)))?;
    }
    let [x, y, mass, vx, vy] = values;

    Ok(Particle { index, x, y, mass, vx, vy, ax: 0.0, ay: 0.0 })
}

fn malformed(line: usize, message: String) -> SimulationError {
    SimulationError::MalformedInput { line, message }
}

/// Writes `particles` to `writer` in the particle file format.
///
/// Out-of-bounds particles are written like any other, with their sentinel mass.
pub fn write_particles<W: Write>(mut writer: W, particles: &[Particle]) -> std::io::Result<()> {
    writeln!(writer, "{}", particles.len())?;
    for p in particles {
        writeln!(
            writer,
            "{}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.6}",
            p.index, p.x, p.y, p.mass, p.vx, p.vy
        )?;
    }
    writer.flush()
}

/// Opens `path` and reads a particle set from it.
pub fn read_particle_file(path: &Path) -> Result<Vec<Particle>, SimulationError> {
    let file = File::open(path).map_err(|e| io_error(path, e))?;
    read_particles(BufReader::new(file))
}

/// Creates (or truncates) `path` and writes `particles` to it.
pub fn write_particle_file(path: &Path, particles: &[Particle]) -> Result<(), SimulationError> {
    let file = File::create(path).map_err(|e| io_error(path, e))?;
    write_particles(BufWriter::new(file), particles).map_err(|e| io_error(path, e))
}

fn io_error(path: &Path, error: std::io::Error) -> SimulationError {
    SimulationError::Io { path: path.to_path_buf(), message: error.to_string() }
}
