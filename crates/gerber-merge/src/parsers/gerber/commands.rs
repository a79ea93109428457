use crate::error::MergeError;
use crate::parsers::coord::{FixedPointFormat, Units};

/// Zero suppression declared by `%FS`. Only `Trailing` coordinates can be
/// decoded; `Leading` is accepted here and rejected at the first coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZeroSuppression {
    Leading,
    Trailing,
}

impl ZeroSuppression {
    pub fn code(&self) -> char {
        match self {
            Self::Leading => 'L',
            Self::Trailing => 'T',
        }
    }
}

/// Coordinate format from the %FS (Format Specification) parameter.
///
/// Example: `%FSTAX24Y24*%` means trailing-zero suppression, absolute mode,
/// 2 integer digits + 4 decimal digits for both X and Y.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatSpec {
    pub zeros: ZeroSuppression,
    pub x: FixedPointFormat,
    pub y: FixedPointFormat,
}

/// A parameter statement from a `%...%` block.
#[derive(Debug, Clone, PartialEq)]
pub enum Parameter {
    /// %MO - Unit mode
    Units(Units),
    /// %FS - Format specification
    FormatSpec(FormatSpec),
    /// %AM - Aperture macro; the body is kept as written.
    MacroDefine { name: String, body: String },
    /// %AD - Aperture descriptor; the definition is kept as written.
    ApertureDefine { id: u32, definition: String },
    /// Any other parameter, carried through to the output untouched.
    PassThrough { code: String, blocks: Vec<String> },
}

/// A word command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// G04 comment, G75 multi-quadrant, G01 linear: nothing to record.
    Ignored,
    /// G36/G37 - region boundary, opens a layer tagged with the code.
    Region(String),
    /// M02 - End of program
    EndOfProgram,
    /// Dnn - Select aperture, opens a layer tagged with the code.
    SelectAperture { id: u32, code: String },
    /// Nnn - Line number
    LineNumber,
    /// `X<x>Y<y>D<nn>`; the digit runs are decoded once the format is known.
    Coordinate { x: String, y: String, draw: String },
}

/// Characters allowed in a coordinate word.
const COORDINATE_ALPHABET: &str = "XYD0123456789-";

/// Interpret one parameter statement.
pub fn parse_parameter(code: &str, blocks: &[String]) -> Result<Parameter, MergeError> {
    match code {
        "MO" => {
            let unit = single_block(code, blocks)?;
            Units::from_code(unit)
                .map(Parameter::Units)
                .ok_or_else(|| MergeError::unknown("unit", unit))
        }
        "FS" => parse_format_spec(single_block(code, blocks)?).map(Parameter::FormatSpec),
        "AM" => {
            let (name, body) = blocks
                .split_first()
                .ok_or_else(|| MergeError::malformed("aperture macro", code))?;
            Ok(Parameter::MacroDefine {
                name: name.clone(),
                body: body.join("*"),
            })
        }
        "AD" => parse_aperture_define(single_block(code, blocks)?),
        _ => Ok(Parameter::PassThrough {
            code: code.to_string(),
            blocks: blocks.to_vec(),
        }),
    }
}

fn single_block<'a>(code: &str, blocks: &'a [String]) -> Result<&'a str, MergeError> {
    match blocks {
        [block] => Ok(block.as_str()),
        _ => Err(MergeError::malformed(
            "parameter",
            format!("{code}{}", blocks.join("*")),
        )),
    }
}

/// Parse the body of %FS. Example: `TAX24Y24`
fn parse_format_spec(spec: &str) -> Result<FormatSpec, MergeError> {
    let upper = spec.to_ascii_uppercase();
    let bad = || MergeError::malformed("format specification", spec);

    let zeros = match upper.chars().next() {
        Some('L') => ZeroSuppression::Leading,
        Some('T') => ZeroSuppression::Trailing,
        _ => return Err(bad()),
    };
    match upper.chars().nth(1) {
        Some('A') => {}
        Some('I') => {
            return Err(MergeError::UnsupportedMode(
                "incremental coordinates".into(),
            ))
        }
        _ => return Err(bad()),
    }

    let rest = upper.get(2..).ok_or_else(bad)?;
    let rest = rest.strip_prefix('X').ok_or_else(bad)?;
    let x = rest.get(..2).ok_or_else(bad)?;
    let rest = rest.get(2..).and_then(|r| r.strip_prefix('Y')).ok_or_else(bad)?;
    let y = rest.get(..2).ok_or_else(bad)?;

    Ok(FormatSpec {
        zeros,
        x: FixedPointFormat::from_digit_pair(x)?,
        y: FixedPointFormat::from_digit_pair(y)?,
    })
}

/// Parse the body of %AD. Example: `D10C,0.020` or `D11R,0.040X0.020`
fn parse_aperture_define(desc: &str) -> Result<Parameter, MergeError> {
    let bad = || MergeError::malformed("aperture descriptor", desc);
    let rest = desc.strip_prefix('D').ok_or_else(bad)?;
    let split = rest
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(bad)?;
    let (id, definition) = rest.split_at(split);
    let id = id.parse().map_err(|_| bad())?;
    Ok(Parameter::ApertureDefine {
        id,
        definition: definition.to_string(),
    })
}

/// Interpret one upper-cased word.
pub fn parse_word(word: &str) -> Result<Command, MergeError> {
    match word.chars().next() {
        Some('G') => parse_g_code(word),
        Some('M') if word == "M02" => Ok(Command::EndOfProgram),
        Some('M') => Err(MergeError::unknown("M", word)),
        Some('D') => {
            let id = word[1..]
                .parse()
                .map_err(|_| MergeError::malformed("aperture select", word))?;
            Ok(Command::SelectAperture {
                id,
                code: word.to_string(),
            })
        }
        Some('N') => Ok(Command::LineNumber),
        Some('X') => parse_coordinate(word),
        _ => Err(MergeError::unknown("command", word)),
    }
}

fn parse_g_code(word: &str) -> Result<Command, MergeError> {
    match word {
        "G75" | "G01" => Ok(Command::Ignored),
        "G36" | "G37" => Ok(Command::Region(word.to_string())),
        _ if word.starts_with("G04") => Ok(Command::Ignored),
        _ => Err(MergeError::unknown("G", word)),
    }
}

/// Split `X12300Y-4560D02` into its digit runs.
fn parse_coordinate(word: &str) -> Result<Command, MergeError> {
    if let Some(ch) = word.chars().find(|c| !COORDINATE_ALPHABET.contains(*c)) {
        return Err(MergeError::InvalidCharacter {
            ch,
            token: word.to_string(),
        });
    }

    let bad = || MergeError::malformed("coordinate", word);
    let (coord, draw) = word.rsplit_once('D').ok_or_else(bad)?;
    if draw.is_empty() || !draw.chars().all(|c| c.is_ascii_digit()) {
        return Err(bad());
    }
    let (x, y) = coord.split_once('Y').ok_or_else(bad)?;
    let x = x.strip_prefix('X').ok_or_else(bad)?;

    Ok(Command::Coordinate {
        x: x.to_string(),
        y: y.to_string(),
        draw: format!("D{draw}"),
    })
}
