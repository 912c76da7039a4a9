use nalgebra::Point3;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The two coordinate-bearing record types of a fixed-column structure file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RecordType {
    /// Standard polymer atom (`ATOM  `).
    #[default]
    Atom,
    /// Heterogen atom such as a ligand, ion or water (`HETATM`).
    Hetatm,
}

impl RecordType {
    /// Returns the six-character, left-justified tag written in columns 1-6.
    pub fn tag(&self) -> &'static str {
        match self {
            RecordType::Atom => "ATOM  ",
            RecordType::Hetatm => "HETATM",
        }
    }
}

impl FromStr for RecordType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "ATOM" => Ok(RecordType::Atom),
            "HETATM" => Ok(RecordType::Hetatm),
            _ => Err(()),
        }
    }
}

/// Describes why a fixed-column atom line could not be decoded.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AtomParseErrorKind {
    #[error("Invalid integer format in columns {columns} (value: '{value}')")]
    InvalidInt { columns: &'static str, value: String },
    #[error("Invalid float format in columns {columns} (value: '{value}')")]
    InvalidFloat { columns: &'static str, value: String },
    #[error("Required field in columns {columns} is empty")]
    MissingRequiredField { columns: &'static str },
    #[error("Line is too short for ATOM/HETATM record (must be at least 54 chars, got {0})")]
    LineTooShort(usize),
    #[error("Unrecognized record type '{0}'")]
    UnknownRecordType(String),
}

/// Identity of the residue an atom belongs to, as written in columns 22-27.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResidueKey {
    pub chain_id: char,
    pub sequence_number: i32,
    pub insertion_code: char,
}

/// A single `ATOM`/`HETATM` line decoded into named fields.
///
/// Columns past 66 (element symbol, formal charge, segment identifiers written by
/// some tools) are not interpreted; they are carried verbatim in `tail`. A parsed
/// record also remembers its source line, and [`AtomRecord::to_line`] reproduces that
/// line byte for byte until a field is modified.
#[derive(Debug, Clone)]
pub struct AtomRecord {
    pub record_type: RecordType,
    /// Atom serial number (columns 7-11).
    pub serial: u32,
    /// Atom name with surrounding blanks removed (columns 13-16).
    pub name: String,
    /// Alternate location indicator (column 17), blank when absent.
    pub alt_loc: char,
    /// Residue name (columns 18-20).
    pub residue_name: String,
    /// Chain identifier (column 22), blank when absent.
    pub chain_id: char,
    /// Residue sequence number (columns 23-26).
    pub residue_number: i32,
    /// Residue insertion code (column 27), blank when absent.
    pub insertion_code: char,
    /// Orthogonal coordinates in Angstroms (columns 31-54).
    pub position: Point3<f64>,
    /// Occupancy (columns 55-60); `1.0` when the column is blank.
    pub occupancy: f64,
    /// Temperature factor (columns 61-66); `0.0` when the column is blank.
    pub temp_factor: f64,
    /// Everything after column 66, untouched.
    pub tail: String,
    source: Option<String>,
}

impl PartialEq for AtomRecord {
    fn eq(&self, other: &Self) -> bool {
        self.same_fields_except_name_and_position(other)
            && self.name == other.name
            && self.position == other.position
    }
}

fn slice(line: &str, start: usize, end: usize) -> &str {
    line.get(start..end.min(line.len())).unwrap_or("")
}

fn slice_and_trim(line: &str, start: usize, end: usize) -> &str {
    slice(line, start, end).trim()
}

fn column_char(line: &str, index: usize) -> char {
    slice(line, index, index + 1).chars().next().unwrap_or(' ')
}

fn parse_float(
    line: &str,
    start: usize,
    end: usize,
    columns: &'static str,
) -> Result<f64, AtomParseErrorKind> {
    let raw = slice_and_trim(line, start, end);
    raw.parse().map_err(|_| AtomParseErrorKind::InvalidFloat {
        columns,
        value: raw.to_string(),
    })
}

fn parse_optional_float(
    line: &str,
    start: usize,
    end: usize,
    columns: &'static str,
    default: f64,
) -> Result<f64, AtomParseErrorKind> {
    if slice_and_trim(line, start, end).is_empty() {
        Ok(default)
    } else {
        parse_float(line, start, end, columns)
    }
}

impl AtomRecord {
    /// Creates a record with blank optional columns, mostly useful when synthesizing
    /// structures programmatically.
    pub fn new(
        serial: u32,
        name: &str,
        residue_name: &str,
        chain_id: char,
        residue_number: i32,
        position: Point3<f64>,
    ) -> Self {
        Self {
            record_type: RecordType::Atom,
            serial,
            name: name.to_string(),
            alt_loc: ' ',
            residue_name: residue_name.to_string(),
            chain_id,
            residue_number,
            insertion_code: ' ',
            position,
            occupancy: 1.0,
            temp_factor: 0.0,
            tail: String::new(),
            source: None,
        }
    }

    /// Decodes one fixed-column `ATOM`/`HETATM` line.
    ///
    /// # Arguments
    ///
    /// * `line` - The raw line without its trailing newline.
    ///
    /// # Errors
    ///
    /// Returns an [`AtomParseErrorKind`] naming the offending columns when a required
    /// field is missing or cannot be parsed.
    pub fn parse(line: &str) -> Result<Self, AtomParseErrorKind> {
        let tag = slice_and_trim(line, 0, 6);
        let record_type = RecordType::from_str(tag)
            .map_err(|_| AtomParseErrorKind::UnknownRecordType(tag.to_string()))?;
        if line.len() < 54 {
            return Err(AtomParseErrorKind::LineTooShort(line.len()));
        }

        let serial_str = slice_and_trim(line, 6, 11);
        let serial = serial_str
            .parse()
            .map_err(|_| AtomParseErrorKind::InvalidInt {
                columns: "7-11",
                value: serial_str.to_string(),
            })?;

        let name = slice_and_trim(line, 12, 16);
        if name.is_empty() {
            return Err(AtomParseErrorKind::MissingRequiredField { columns: "13-16" });
        }

        let residue_number_str = slice_and_trim(line, 22, 26);
        let residue_number =
            residue_number_str
                .parse()
                .map_err(|_| AtomParseErrorKind::InvalidInt {
                    columns: "23-26",
                    value: residue_number_str.to_string(),
                })?;

        let x = parse_float(line, 30, 38, "31-38")?;
        let y = parse_float(line, 38, 46, "39-46")?;
        let z = parse_float(line, 46, 54, "47-54")?;

        Ok(Self {
            record_type,
            serial,
            name: name.to_string(),
            alt_loc: column_char(line, 16),
            residue_name: slice_and_trim(line, 17, 20).to_string(),
            chain_id: column_char(line, 21),
            residue_number,
            insertion_code: column_char(line, 26),
            position: Point3::new(x, y, z),
            occupancy: parse_optional_float(line, 54, 60, "55-60", 1.0)?,
            temp_factor: parse_optional_float(line, 60, 66, "61-66", 0.0)?,
            tail: line.get(66..).unwrap_or("").to_string(),
            source: Some(line.to_string()),
        })
    }

    pub fn residue_key(&self) -> ResidueKey {
        ResidueKey {
            chain_id: self.chain_id,
            sequence_number: self.residue_number,
            insertion_code: self.insertion_code,
        }
    }

    /// Returns the line this record was parsed from, if any.
    pub fn source_line(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Renders the coordinate block as it appears in columns 31-54.
    ///
    /// Unmodified parsed records return the source text, so precision and padding
    /// written by other tools survive.
    pub fn coordinate_field(&self) -> String {
        let line = self.to_line();
        match line.get(30..54) {
            Some(field) => field.to_string(),
            None => self.encode_coordinates(),
        }
    }

    fn encode_coordinates(&self) -> String {
        format!(
            "{:>8.3}{:>8.3}{:>8.3}",
            self.position.x, self.position.y, self.position.z
        )
    }

    /// Renders the four-character atom name field (columns 13-16).
    ///
    /// Names shorter than four characters are shifted one column right unless they
    /// start with a digit, matching the layout written by common structure tools.
    fn name_field(&self) -> String {
        let starts_with_digit = self
            .name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_digit());
        if self.name.len() >= 4 || starts_with_digit {
            format!("{:<4}", self.name)
        } else {
            format!(" {:<3}", self.name)
        }
    }

    fn same_fields_except_name_and_position(&self, other: &Self) -> bool {
        self.record_type == other.record_type
            && self.serial == other.serial
            && self.alt_loc == other.alt_loc
            && self.residue_name == other.residue_name
            && self.chain_id == other.chain_id
            && self.residue_number == other.residue_number
            && self.insertion_code == other.insertion_code
            && self.occupancy == other.occupancy
            && self.temp_factor == other.temp_factor
            && self.tail == other.tail
    }

    /// Encodes the record as a fixed-column line (without newline).
    ///
    /// A parsed record is written from its source line: untouched records come back
    /// verbatim, and a changed name or coordinate only rewrites its own columns. Any
    /// other modification, or a record built in memory, gets the canonical layout.
    pub fn to_line(&self) -> String {
        match self.source.as_deref() {
            Some(source) => self.patch_source(source),
            None => self.encode(),
        }
    }

    fn patch_source(&self, source: &str) -> String {
        let Ok(original) = AtomRecord::parse(source) else {
            return self.encode();
        };
        if !self.same_fields_except_name_and_position(&original)
            || !source.get(..54).is_some_and(|fixed| fixed.is_ascii())
        {
            return self.encode();
        }

        let mut line = source.to_string();
        if self.name != original.name {
            line.replace_range(12..16, &self.name_field());
        }
        for (axis, start) in [(0, 30), (1, 38), (2, 46)] {
            if self.position[axis] != original.position[axis] {
                line.replace_range(start..start + 8, &format!("{:>8.3}", self.position[axis]));
            }
        }
        line
    }

    fn encode(&self) -> String {
        format!(
            "{}{:>5} {}{}{:>3} {}{:>4}{}   {}{:>6.2}{:>6.2}{}",
            self.record_type.tag(),
            self.serial,
            self.name_field(),
            self.alt_loc,
            self.residue_name,
            self.chain_id,
            self.residue_number,
            self.insertion_code,
            self.encode_coordinates(),
            self.occupancy,
            self.temp_factor,
            self.tail
        )
    }
}

impl fmt::Display for AtomRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_line())
    }
}
