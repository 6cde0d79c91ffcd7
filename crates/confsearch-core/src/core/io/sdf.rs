use super::traits::MolecularFile;
use crate::core::models::atom::Atom;
use crate::core::models::geometry::Geometry;
use crate::core::models::topology::{Bond, BondOrder};
use nalgebra::Point3;
use std::io::{self, BufRead, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdfError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("Only the V2000 connection table format is supported")]
    UnsupportedVersion,
    #[error("Unexpected end of record: expected {expected} lines, found {found}")]
    UnexpectedEof { expected: usize, found: usize },
}

impl SdfError {
    fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }
}

/// Title and data fields of an SDF record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SdfMetadata {
    pub title: String,
    /// Data items written after `M  END` as `> <name>` blocks, in order.
    pub properties: Vec<(String, String)>,
}

impl SdfMetadata {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            properties: Vec::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.properties.push((name.into(), value.to_string()));
        self
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

pub struct SdfFile;

impl MolecularFile for SdfFile {
    type Metadata = SdfMetadata;
    type Error = SdfError;

    fn read_from(reader: &mut impl BufRead) -> Result<(Geometry, Self::Metadata), Self::Error> {
        let lines = collect_first_record(reader)?;
        if lines.len() < 4 {
            return Err(SdfError::UnexpectedEof {
                expected: 4,
                found: lines.len(),
            });
        }

        let counts = &lines[3];
        if counts.contains("V3000") {
            return Err(SdfError::UnsupportedVersion);
        }
        let (atom_count, bond_count) = parse_counts(counts)?;

        let atom_start = 4;
        let bond_start = atom_start + atom_count;
        let block_end = bond_start + bond_count;
        if lines.len() < block_end {
            return Err(SdfError::UnexpectedEof {
                expected: block_end,
                found: lines.len(),
            });
        }

        let mut geometry = Geometry::default();
        for (offset, raw) in lines[atom_start..bond_start].iter().enumerate() {
            geometry.add_atom(parse_atom(raw, atom_start + offset + 1)?);
        }
        for (offset, raw) in lines[bond_start..block_end].iter().enumerate() {
            geometry
                .bonds
                .push(parse_bond(raw, bond_start + offset + 1, atom_count)?);
        }

        let metadata = SdfMetadata {
            title: lines[0].trim().to_string(),
            properties: parse_properties(&lines[block_end..]),
        };
        Ok((geometry, metadata))
    }

    /// Writes one record. Detached atoms and their bonds are left out and the
    /// remaining atoms are renumbered.
    fn write_to(
        geometry: &Geometry,
        metadata: &Self::Metadata,
        writer: &mut impl Write,
    ) -> Result<(), Self::Error> {
        let mut remap = vec![None; geometry.len()];
        let mut next = 0usize;
        for (i, _) in geometry.active_atoms() {
            next += 1;
            remap[i] = Some(next);
        }
        let bonds: Vec<(usize, usize, BondOrder)> = geometry
            .bonds
            .iter()
            .filter_map(|bond| Some((remap[bond.a]?, remap[bond.b]?, bond.order)))
            .collect();

        writeln!(writer, "{}", metadata.title)?;
        writeln!(writer, "  confsearch")?;
        writeln!(writer)?;
        writeln!(
            writer,
            "{:>3}{:>3}  0  0  0  0  0  0  0  0999 V2000",
            next,
            bonds.len()
        )?;
        for (_, atom) in geometry.active_atoms() {
            writeln!(
                writer,
                "{:>10.4}{:>10.4}{:>10.4} {:<3} 0  0  0  0  0  0  0  0  0  0  0  0",
                atom.position.x, atom.position.y, atom.position.z, atom.element
            )?;
        }
        for (a, b, order) in bonds {
            writeln!(writer, "{:>3}{:>3}{:>3}  0  0  0  0", a, b, order.mdl_code())?;
        }
        writeln!(writer, "M  END")?;
        for (name, value) in &metadata.properties {
            writeln!(writer, "> <{}>", name)?;
            writeln!(writer, "{}", value)?;
            writeln!(writer)?;
        }
        writeln!(writer, "$$$$")?;
        Ok(())
    }
}

fn collect_first_record(reader: &mut impl BufRead) -> Result<Vec<String>, SdfError> {
    let mut lines = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim() == "$$$$" {
            break;
        }
        lines.push(line);
    }
    Ok(lines)
}

fn fixed_field(raw: &str, start: usize, end: usize) -> &str {
    let end = end.min(raw.len());
    if start >= end {
        return "";
    }
    raw.get(start..end).unwrap_or("").trim()
}

fn parse_counts(raw: &str) -> Result<(usize, usize), SdfError> {
    let atoms = fixed_field(raw, 0, 3)
        .parse::<usize>()
        .map_err(|_| SdfError::parse(4, "invalid atom count"))?;
    let bonds = fixed_field(raw, 3, 6)
        .parse::<usize>()
        .map_err(|_| SdfError::parse(4, "invalid bond count"))?;
    Ok((atoms, bonds))
}

fn parse_atom(raw: &str, line: usize) -> Result<Atom, SdfError> {
    let tokens: Vec<&str> = raw.split_whitespace().collect();
    if tokens.len() < 4 {
        return Err(SdfError::parse(line, "atom line needs coordinates and element"));
    }
    let mut coords = [0.0f64; 3];
    for (k, token) in tokens[..3].iter().enumerate() {
        coords[k] = token
            .parse::<f64>()
            .map_err(|_| SdfError::parse(line, format!("invalid coordinate '{}'", token)))?;
    }
    Ok(Atom::new(
        tokens[3],
        Point3::new(coords[0], coords[1], coords[2]),
    ))
}

fn parse_bond(raw: &str, line: usize, atom_count: usize) -> Result<Bond, SdfError> {
    let a = fixed_field(raw, 0, 3)
        .parse::<usize>()
        .map_err(|_| SdfError::parse(line, "invalid first atom index"))?;
    let b = fixed_field(raw, 3, 6)
        .parse::<usize>()
        .map_err(|_| SdfError::parse(line, "invalid second atom index"))?;
    let code = fixed_field(raw, 6, 9)
        .parse::<u8>()
        .map_err(|_| SdfError::parse(line, "invalid bond type"))?;
    let order = BondOrder::from_mdl_code(code)
        .ok_or_else(|| SdfError::parse(line, format!("unsupported bond type {}", code)))?;
    if a == 0 || b == 0 || a > atom_count || b > atom_count {
        return Err(SdfError::parse(line, "bond references atom outside declared range"));
    }
    Ok(Bond::new(a - 1, b - 1, order))
}

fn parse_properties(lines: &[String]) -> Vec<(String, String)> {
    let mut properties = Vec::new();
    let mut iter = lines.iter().peekable();
    while let Some(line) = iter.next() {
        let Some(rest) = line.trim_start().strip_prefix('>') else {
            continue;
        };
        let Some(name) = rest
            .split('<')
            .nth(1)
            .and_then(|s| s.split('>').next())
            .map(str::to_string)
        else {
            continue;
        };
        let mut value = Vec::new();
        while let Some(next) = iter.peek() {
            if next.trim().is_empty() {
                iter.next();
                break;
            }
            value.push(next.trim().to_string());
            iter.next();
        }
        properties.push((name, value.join("\n")));
    }
    properties
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const ETHANOL: &str = "ethanol
  hand written

  9  8  0  0  0  0  0  0  0  0999 V2000
   -0.8883    0.1670   -0.0273 C   0  0  0  0  0  0  0  0  0  0  0  0
    0.4658   -0.5116   -0.0368 C   0  0  0  0  0  0  0  0  0  0  0  0
    1.4311    0.3229    0.5867 O   0  0  0  0  0  0  0  0  0  0  0  0
   -0.8487    1.1275   -0.5545 H   0  0  0  0  0  0  0  0  0  0  0  0
   -1.6573   -0.4643   -0.4860 H   0  0  0  0  0  0  0  0  0  0  0  0
   -1.1914    0.3835    1.0022 H   0  0  0  0  0  0  0  0  0  0  0  0
    0.3816   -1.4645    0.4964 H   0  0  0  0  0  0  0  0  0  0  0  0
    0.7715   -0.7423   -1.0627 H   0  0  0  0  0  0  0  0  0  0  0  0
    1.5301    1.1149    0.0290 H   0  0  0  0  0  0  0  0  0  0  0  0
  1  2  1  0  0  0  0
  2  3  1  0  0  0  0
  1  4  1  0  0  0  0
  1  5  1  0  0  0  0
  1  6  1  0  0  0  0
  2  7  1  0  0  0  0
  2  8  1  0  0  0  0
  3  9  1  0  0  0  0
M  END
> <energy>
-154.25

$$$$
";

    #[test]
    fn reads_atoms_bonds_and_properties() {
        let (geometry, metadata) = SdfFile::read_from(&mut Cursor::new(ETHANOL)).unwrap();
        assert_eq!(geometry.len(), 9);
        assert_eq!(geometry.bonds.len(), 8);
        assert_eq!(geometry.atoms[2].element, "O");
        assert!((geometry.atoms[2].position.x - 1.4311).abs() < 1e-9);
        assert_eq!(geometry.bonds[1], Bond::new(1, 2, BondOrder::Single));
        assert_eq!(metadata.title, "ethanol");
        assert_eq!(metadata.property("energy"), Some("-154.25"));
    }

    #[test]
    fn write_then_read_preserves_geometry() {
        let (geometry, _) = SdfFile::read_from(&mut Cursor::new(ETHANOL)).unwrap();
        let metadata = SdfMetadata::new("structure_3").with_property("energy", -1.5);
        let mut buffer = Vec::new();
        SdfFile::write_to(&geometry, &metadata, &mut buffer).unwrap();

        let (parsed, parsed_meta) = SdfFile::read_from(&mut Cursor::new(buffer)).unwrap();
        assert_eq!(parsed.len(), geometry.len());
        assert_eq!(parsed.bonds, geometry.bonds);
        for (a, b) in geometry.atoms.iter().zip(parsed.atoms.iter()) {
            assert_eq!(a.element, b.element);
            assert!((a.position - b.position).norm() < 1e-4);
        }
        assert_eq!(parsed_meta.title, "structure_3");
        assert_eq!(parsed_meta.property("energy"), Some("-1.5"));
    }

    #[test]
    fn detached_atoms_are_not_written() {
        let (mut geometry, _) = SdfFile::read_from(&mut Cursor::new(ETHANOL)).unwrap();
        geometry.set_detached(8, true);
        let mut buffer = Vec::new();
        SdfFile::write_to(&geometry, &SdfMetadata::default(), &mut buffer).unwrap();

        let (parsed, _) = SdfFile::read_from(&mut Cursor::new(buffer)).unwrap();
        assert_eq!(parsed.len(), 8);
        assert_eq!(parsed.bonds.len(), 7);
        assert!(parsed.bonds.iter().all(|b| b.a < 8 && b.b < 8));
    }

    #[test]
    fn rejects_v3000_records() {
        let record = "x\n\n\n  0  0  0     0  0            999 V3000\nM  END\n$$$$\n";
        let result = SdfFile::read_from(&mut Cursor::new(record));
        assert!(matches!(result, Err(SdfError::UnsupportedVersion)));
    }

    #[test]
    fn reports_truncated_atom_block() {
        let record = "x\n\n\n  3  0  0  0  0  0  0  0  0  0999 V2000\n    0.0 0.0 0.0 C\n";
        let result = SdfFile::read_from(&mut Cursor::new(record));
        assert!(matches!(result, Err(SdfError::UnexpectedEof { .. })));
    }

    #[test]
    fn round_trips_through_a_file() {
        let (geometry, _) = SdfFile::read_from(&mut Cursor::new(ETHANOL)).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ethanol.sdf");
        SdfFile::write_to_path(&geometry, &SdfMetadata::new("ethanol"), &path).unwrap();
        let (parsed, _) = SdfFile::read_from_path(&path).unwrap();
        assert_eq!(parsed.len(), 9);
    }
}
