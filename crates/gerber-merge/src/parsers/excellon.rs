use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::path::Path;

use log::{error, info};

use crate::error::MergeError;
use crate::geometry::{self, BBox, ClipMode, PointGroup, Positioned};
use crate::parsers::coord::{FixedPointFormat, Units};

/// Characters allowed in a coordinate line.
const COORDINATE_ALPHABET: &str = "XYD0123456789-";

/// Zero handling declared next to the units (`METRIC,TZ,...`).
///
/// Only `Retained` (`TZ`) coordinates can be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZeroMode {
    Retained,
    Omitted,
}

impl ZeroMode {
    fn from_token(token: Option<&str>) -> Self {
        match token {
            Some("TZ") => Self::Retained,
            _ => Self::Omitted,
        }
    }

    pub fn token(&self) -> &'static str {
        match self {
            Self::Retained => "TZ",
            Self::Omitted => "LZ",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hole {
    pub x: f64,
    pub y: f64,
}

impl Positioned for Hole {
    fn position(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    fn set_position(&mut self, x: f64, y: f64) {
        self.x = x;
        self.y = y;
    }
}

/// Holes drilled after one tool select, tagged with the select code (`T01`).
#[derive(Debug, Clone, PartialEq)]
pub struct HoleGroup {
    pub tool: String,
    pub holes: Vec<Hole>,
}

impl PointGroup for HoleGroup {
    type Point = Hole;

    fn points(&self) -> &[Hole] {
        &self.holes
    }

    fn points_mut(&mut self) -> &mut Vec<Hole> {
        &mut self.holes
    }
}

/// A parsed Excellon drill file.
#[derive(Debug, Clone, PartialEq)]
pub struct ExcellonDocument {
    pub name: String,
    pub units: Option<Units>,
    pub format: Option<FixedPointFormat>,
    pub zeros: ZeroMode,
    pub tools: BTreeMap<u32, String>,
    pub holes: Vec<HoleGroup>,
    pub bbox: Option<BBox>,
}

/// A header line, before `%` or `M95`.
#[derive(Debug, Clone, PartialEq)]
enum HeaderCommand {
    Start,
    EndOfHeader,
    FormatVersion(String),
    IncrementalMode(String),
    Units {
        units: Units,
        zeros: ZeroMode,
        template: Option<String>,
    },
    ToolDefine {
        id: u32,
        definition: String,
    },
}

/// A body line.
#[derive(Debug, Clone, PartialEq)]
enum BodyCommand {
    Absolute,
    AssertUnits(Units),
    EndOfProgram,
    SelectTool { id: u32, code: String },
    Coordinate { x: String, y: String },
}

impl ExcellonDocument {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            units: None,
            format: None,
            zeros: ZeroMode::Retained,
            tools: BTreeMap::new(),
            holes: Vec::new(),
            bbox: None,
        }
    }

    /// Parse drill text. `name` identifies the document in status lines.
    pub fn parse(name: &str, content: &str) -> Result<Self, MergeError> {
        let mut doc = ExcellonDocument::new(name);
        let mut reading_header = true;

        for line in content.lines() {
            let line = line.trim().to_uppercase();
            if line.is_empty() || line.starts_with(';') {
                continue;
            }

            if reading_header {
                match parse_header_line(&line)? {
                    HeaderCommand::Start => {}
                    HeaderCommand::EndOfHeader => reading_header = false,
                    HeaderCommand::FormatVersion(version) => {
                        if version != "2" {
                            return Err(MergeError::UnsupportedMode(format!(
                                "format version {version}"
                            )));
                        }
                    }
                    HeaderCommand::IncrementalMode(setting) => {
                        if setting != "OFF" {
                            return Err(MergeError::UnsupportedMode(
                                "incremental coordinates".into(),
                            ));
                        }
                    }
                    HeaderCommand::Units {
                        units,
                        zeros,
                        template,
                    } => {
                        doc.units = Some(units);
                        doc.zeros = zeros;
                        if let Some(template) = template {
                            doc.format = Some(FixedPointFormat::from_template(&template)?);
                        }
                    }
                    HeaderCommand::ToolDefine { id, definition } => {
                        doc.tools.insert(id, definition);
                    }
                }
            } else {
                doc.apply_body(parse_body_line(&line)?, &line)?;
            }
        }

        doc.finish()
    }

    pub fn from_path(path: &Path) -> Result<Self, MergeError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&path.display().to_string(), &content)
    }

    fn apply_body(&mut self, cmd: BodyCommand, line: &str) -> Result<(), MergeError> {
        match cmd {
            BodyCommand::Absolute | BodyCommand::EndOfProgram => {}
            BodyCommand::AssertUnits(expected) => {
                if self.units != Some(expected) {
                    let declared = self.units.map_or("none".to_string(), |u| u.to_string());
                    return Err(MergeError::UnsupportedMode(format!(
                        "{line} expects {expected} but the header declared {declared}"
                    )));
                }
            }
            BodyCommand::SelectTool { id, code } => {
                if !self.tools.contains_key(&id) {
                    return Err(MergeError::UndefinedReference { kind: "tool", id: code });
                }
                self.holes.push(HoleGroup {
                    tool: code,
                    holes: Vec::new(),
                });
            }
            BodyCommand::Coordinate { x, y } => {
                let format = self.coordinate_format()?;
                let hole = Hole {
                    x: format.decode(&x)?,
                    y: format.decode(&y)?,
                };
                self.holes
                    .last_mut()
                    .ok_or_else(|| MergeError::NoOpenLayer(line.to_string()))?
                    .holes
                    .push(hole);
            }
        }
        Ok(())
    }

    fn coordinate_format(&self) -> Result<FixedPointFormat, MergeError> {
        let missing = self.missing_parameters();
        if !missing.is_empty() {
            return Err(MergeError::MissingParameter {
                document: self.name.clone(),
                missing,
            });
        }
        match (self.zeros, self.format) {
            (ZeroMode::Retained, Some(format)) => Ok(format),
            _ => Err(MergeError::UnsupportedMode("omitted trailing zeros".into())),
        }
    }

    fn missing_parameters(&self) -> String {
        let mut missing = Vec::new();
        if self.units.is_none() {
            missing.push("units");
        }
        if self.format.is_none() {
            missing.push("format");
        }
        missing.join(", ")
    }

    fn finish(mut self) -> Result<Self, MergeError> {
        let missing = self.missing_parameters();
        if !missing.is_empty() {
            error!("{self}");
            return Err(MergeError::MissingParameter {
                document: self.name,
                missing,
            });
        }

        self.calc_bbox();
        if self.tools.is_empty() && self.holes.is_empty() {
            info!("{}: empty", self.name);
        } else {
            match &self.bbox {
                Some(bbox) => info!("{}: OK {bbox}", self.name),
                None => info!("{}: OK (no holes)", self.name),
            }
        }
        Ok(self)
    }

    pub fn calc_bbox(&mut self) {
        self.bbox = geometry::bbox(&self.holes);
    }

    pub fn rotate90ccw(&mut self) {
        geometry::rotate90ccw(&mut self.holes);
        self.bbox = self.bbox.map(|b| b.rotate90ccw());
    }

    pub fn rotate90cw(&mut self) {
        geometry::rotate90cw(&mut self.holes);
        self.bbox = self.bbox.map(|b| b.rotate90cw());
    }

    pub fn translate(&mut self, dx: f64, dy: f64) {
        geometry::translate(&mut self.holes, dx, dy);
        self.bbox = self.bbox.map(|b| b.translate(dx, dy));
    }

    /// Clip the holes to the document's own `bbox`.
    pub fn clip_to_bbox(&mut self, mode: ClipMode) -> usize {
        match self.bbox {
            Some(bbox) => geometry::clip_to_box(&mut self.holes, &bbox, mode),
            None => 0,
        }
    }

    pub fn point_count(&self) -> usize {
        self.holes.iter().map(|g| g.holes.len()).sum()
    }

    /// Serialize back to Excellon: a header with format, units and tools,
    /// then every hole group under its tool select.
    pub fn write<W: Write>(&self, out: &mut W) -> Result<(), MergeError> {
        let (Some(units), Some(format)) = (self.units, self.format) else {
            return Err(MergeError::MissingParameter {
                document: self.name.clone(),
                missing: "units or format".into(),
            });
        };
        let (keyword, assertion) = match units {
            Units::Millimetre => ("METRIC", "M71"),
            Units::Inch => ("INCH", "M72"),
        };

        writeln!(out, "M48")?;
        writeln!(out, "FMAT,2")?;
        writeln!(out, "ICI,OFF")?;
        writeln!(out, "{keyword},{},{}", self.zeros.token(), format.template())?;
        for (id, definition) in &self.tools {
            writeln!(out, "T{id}{definition}")?;
        }
        writeln!(out, "%")?;
        writeln!(out, "G90")?;
        writeln!(out, "{assertion}")?;
        for group in &self.holes {
            writeln!(out, "{}", group.tool)?;
            for hole in &group.holes {
                writeln!(out, "X{}Y{}", format.encode(hole.x), format.encode(hole.y))?;
            }
        }
        writeln!(out, "M30")?;
        Ok(())
    }
}

impl fmt::Display for ExcellonDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let units = self.units.map_or("unset".to_string(), |u| u.to_string());
        let format = self.format.map_or("unset".to_string(), |f| f.to_string());
        write!(
            f,
            "{}:  Units: {units}, Zeros: {}, Format: {format}, Tools: {}, Holes: {}",
            self.name,
            self.zeros.token(),
            self.tools.len(),
            self.point_count()
        )
    }
}

fn parse_header_line(line: &str) -> Result<HeaderCommand, MergeError> {
    if line == "M48" {
        return Ok(HeaderCommand::Start);
    }
    if line == "%" || line == "M95" {
        return Ok(HeaderCommand::EndOfHeader);
    }

    if let Some((name, rest)) = line.split_once(',') {
        let args: Vec<&str> = rest.split(',').collect();
        let first = || {
            args.first()
                .map(|a| a.to_string())
                .ok_or_else(|| MergeError::malformed("header command", line))
        };
        return match name {
            "FMAT" => Ok(HeaderCommand::FormatVersion(first()?)),
            "ICI" => Ok(HeaderCommand::IncrementalMode(first()?)),
            "METRIC" | "INCH" => Ok(HeaderCommand::Units {
                units: if name == "METRIC" {
                    Units::Millimetre
                } else {
                    Units::Inch
                },
                zeros: ZeroMode::from_token(args.first().copied()),
                template: args.get(1).map(|t| t.to_string()),
            }),
            _ => Err(MergeError::unknown("header", line)),
        };
    }

    if let Some(rest) = line.strip_prefix('T') {
        let bad = || MergeError::malformed("tool definition", line);
        let split = rest.find(|c: char| !c.is_ascii_digit()).ok_or_else(bad)?;
        let (id, definition) = rest.split_at(split);
        return Ok(HeaderCommand::ToolDefine {
            id: id.parse().map_err(|_| bad())?,
            definition: definition.to_string(),
        });
    }

    Err(MergeError::unknown("header", line))
}

fn parse_body_line(line: &str) -> Result<BodyCommand, MergeError> {
    match line.chars().next() {
        Some('G') if line == "G90" => Ok(BodyCommand::Absolute),
        Some('G') => Err(MergeError::unknown("G", line)),
        Some('M') => match line {
            "M71" => Ok(BodyCommand::AssertUnits(Units::Millimetre)),
            "M72" => Ok(BodyCommand::AssertUnits(Units::Inch)),
            "M30" => Ok(BodyCommand::EndOfProgram),
            _ => Err(MergeError::unknown("M", line)),
        },
        Some('T') => Ok(BodyCommand::SelectTool {
            id: line[1..]
                .parse()
                .map_err(|_| MergeError::malformed("tool select", line))?,
            code: line.to_string(),
        }),
        Some('X') => {
            if let Some(ch) = line.chars().find(|c| !COORDINATE_ALPHABET.contains(*c)) {
                return Err(MergeError::InvalidCharacter {
                    ch,
                    token: line.to_string(),
                });
            }
            let (x, y) = line
                .split_once('Y')
                .ok_or_else(|| MergeError::malformed("coordinate", line))?;
            Ok(BodyCommand::Coordinate {
                x: x.trim_start_matches('X').to_string(),
                y: y.to_string(),
            })
        }
        _ => Err(MergeError::unknown("command", line)),
    }
}
