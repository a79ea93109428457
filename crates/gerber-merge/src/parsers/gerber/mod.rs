pub mod commands;
pub mod lexer;
mod writer;

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use log::{debug, error, info, warn};

use crate::error::MergeError;
use crate::geometry::{self, BBox, ClipMode, PointGroup, Positioned};
use crate::parsers::coord::Units;

use self::commands::{Command, FormatSpec, Parameter, ZeroSuppression};
use self::lexer::GerberToken;

/// Words skipped outright until the first aperture is defined, matched on
/// their first three characters.
const PREAMBLE_CODES: [&str; 3] = ["G04", "G75", "G01"];

/// One stroke or flash: a position plus the draw code (`D01`, `D02`, `D03`).
#[derive(Debug, Clone, PartialEq)]
pub struct DrawEvent {
    pub x: f64,
    pub y: f64,
    pub code: String,
}

impl Positioned for DrawEvent {
    fn position(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    fn set_position(&mut self, x: f64, y: f64) {
        self.x = x;
        self.y = y;
    }
}

/// Events drawn after one aperture select (`D10`) or region boundary
/// (`G36`/`G37`), tagged with that code.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawLayer {
    pub mode: String,
    pub events: Vec<DrawEvent>,
}

impl PointGroup for DrawLayer {
    type Point = DrawEvent;

    fn points(&self) -> &[DrawEvent] {
        &self.events
    }

    fn points_mut(&mut self) -> &mut Vec<DrawEvent> {
        &mut self.events
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApertureMacro {
    pub name: String,
    pub body: String,
}

/// A parameter this crate does not interpret, kept for the output.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtraParam {
    pub code: String,
    pub blocks: Vec<String>,
}

/// A parsed RS-274X file.
#[derive(Debug, Clone, PartialEq)]
pub struct GerberDocument {
    pub name: String,
    pub units: Option<Units>,
    pub format: Option<FormatSpec>,
    pub aperture_macros: Vec<ApertureMacro>,
    pub aperture_descriptors: BTreeMap<u32, String>,
    pub extra_params: Vec<ExtraParam>,
    pub layers: Vec<DrawLayer>,
    pub bbox: Option<BBox>,
}

impl GerberDocument {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            units: None,
            format: None,
            aperture_macros: Vec::new(),
            aperture_descriptors: BTreeMap::new(),
            extra_params: Vec::new(),
            layers: Vec::new(),
            bbox: None,
        }
    }

    /// Parse Gerber text. `name` identifies the document in status lines.
    pub fn parse(name: &str, content: &str) -> Result<Self, MergeError> {
        let mut parser = Parser {
            doc: GerberDocument::new(name),
            current: None,
        };
        for token in lexer::tokenize(content)? {
            parser.process(token)?;
        }
        parser.finish()
    }

    pub fn from_path(path: &Path) -> Result<Self, MergeError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&path.display().to_string(), &content)
    }

    pub fn calc_bbox(&mut self) {
        self.bbox = geometry::bbox(&self.layers);
    }

    pub fn rotate90ccw(&mut self) {
        geometry::rotate90ccw(&mut self.layers);
        self.bbox = self.bbox.map(|b| b.rotate90ccw());
    }

    pub fn rotate90cw(&mut self) {
        geometry::rotate90cw(&mut self.layers);
        self.bbox = self.bbox.map(|b| b.rotate90cw());
    }

    pub fn translate(&mut self, dx: f64, dy: f64) {
        geometry::translate(&mut self.layers, dx, dy);
        self.bbox = self.bbox.map(|b| b.translate(dx, dy));
    }

    /// Clip the geometry to the document's own `bbox`.
    pub fn clip_to_bbox(&mut self, mode: ClipMode) -> usize {
        match self.bbox {
            Some(bbox) => geometry::clip_to_box(&mut self.layers, &bbox, mode),
            None => 0,
        }
    }

    pub fn point_count(&self) -> usize {
        self.layers.iter().map(|l| l.events.len()).sum()
    }

    fn set_macro(&mut self, name: String, body: String) {
        match self.aperture_macros.iter_mut().find(|m| m.name == name) {
            Some(existing) => existing.body = body,
            None => self.aperture_macros.push(ApertureMacro { name, body }),
        }
    }

    fn set_extra(&mut self, code: String, blocks: Vec<String>) {
        match self.extra_params.iter_mut().find(|p| p.code == code) {
            Some(existing) => existing.blocks = blocks,
            None => self.extra_params.push(ExtraParam { code, blocks }),
        }
    }
}

impl fmt::Display for GerberDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let units = self.units.map_or("unset".to_string(), |u| u.to_string());
        match &self.format {
            Some(spec) => write!(
                f,
                "{}:  Units: {units}, Zero suppression: {}, Format: x{} y{}",
                self.name,
                spec.zeros.code(),
                spec.x,
                spec.y
            )?,
            None => write!(f, "{}:  Units: {units}, Format: unset", self.name)?,
        }
        write!(
            f,
            ", AP macros: {}, AP descs: {}",
            self.aperture_macros.len(),
            self.aperture_descriptors.len()
        )?;
        for param in &self.extra_params {
            write!(f, "\n  {}: {:?}", param.code, param.blocks)?;
        }
        Ok(())
    }
}

/// Interpreter state while a document is being built.
struct Parser {
    doc: GerberDocument,
    /// Layer that coordinate events append to.
    current: Option<usize>,
}

impl Parser {
    fn process(&mut self, token: GerberToken) -> Result<(), MergeError> {
        match token {
            GerberToken::Parameter { code, blocks } => {
                self.apply_parameter(commands::parse_parameter(&code, &blocks)?)
            }
            GerberToken::Word(word) => {
                if self.in_preamble(&word) {
                    debug!("{}: skipping preamble word {word}", self.doc.name);
                    return Ok(());
                }
                self.apply_command(commands::parse_word(&word)?, &word)
            }
        }
    }

    fn in_preamble(&self, word: &str) -> bool {
        self.doc.aperture_descriptors.is_empty()
            && PREAMBLE_CODES.iter().any(|code| word.starts_with(code))
    }

    fn apply_parameter(&mut self, param: Parameter) -> Result<(), MergeError> {
        match param {
            Parameter::Units(units) => match self.doc.units {
                None => self.doc.units = Some(units),
                Some(declared) if declared == units => {
                    warn!("{}: units declared again ({units})", self.doc.name);
                }
                Some(declared) => {
                    return Err(MergeError::UnsupportedMode(format!(
                        "units changed from {declared} to {units}"
                    )));
                }
            },
            Parameter::FormatSpec(spec) => self.doc.format = Some(spec),
            Parameter::MacroDefine { name, body } => self.doc.set_macro(name, body),
            Parameter::ApertureDefine { id, definition } => {
                self.doc.aperture_descriptors.insert(id, definition);
            }
            Parameter::PassThrough { code, blocks } => self.doc.set_extra(code, blocks),
        }
        Ok(())
    }

    fn apply_command(&mut self, cmd: Command, word: &str) -> Result<(), MergeError> {
        match cmd {
            Command::Ignored | Command::LineNumber | Command::EndOfProgram => {}
            Command::Region(code) => self.open_layer(code),
            Command::SelectAperture { id, code } => {
                if !self.doc.aperture_descriptors.contains_key(&id) {
                    return Err(MergeError::UndefinedReference {
                        kind: "aperture",
                        id: code,
                    });
                }
                self.open_layer(code);
            }
            Command::Coordinate { x, y, draw } => {
                let spec = self.coordinate_format()?;
                let event = DrawEvent {
                    x: spec.x.decode(&x)?,
                    y: spec.y.decode(&y)?,
                    code: draw,
                };
                let index = self
                    .current
                    .ok_or_else(|| MergeError::NoOpenLayer(word.to_string()))?;
                self.doc.layers[index].events.push(event);
            }
        }
        Ok(())
    }

    fn open_layer(&mut self, mode: String) {
        self.doc.layers.push(DrawLayer {
            mode,
            events: Vec::new(),
        });
        self.current = Some(self.doc.layers.len() - 1);
    }

    /// Format to decode a coordinate with, once units and format are known.
    fn coordinate_format(&self) -> Result<FormatSpec, MergeError> {
        let missing = missing_parameters(&self.doc);
        if !missing.is_empty() {
            return Err(MergeError::MissingParameter {
                document: self.doc.name.clone(),
                missing,
            });
        }
        match self.doc.format {
            Some(spec) if spec.zeros == ZeroSuppression::Trailing => Ok(spec),
            _ => Err(MergeError::UnsupportedMode(
                "leading zero suppression".into(),
            )),
        }
    }

    fn finish(self) -> Result<GerberDocument, MergeError> {
        let mut doc = self.doc;
        let missing = missing_parameters(&doc);
        if !missing.is_empty() {
            error!("{doc}");
            return Err(MergeError::MissingParameter {
                document: doc.name,
                missing,
            });
        }

        doc.calc_bbox();
        if doc.aperture_descriptors.is_empty() && doc.layers.is_empty() {
            info!("{}: empty", doc.name);
        } else {
            match &doc.bbox {
                Some(bbox) => info!("{}: OK {bbox}", doc.name),
                None => info!("{}: OK (no coordinates)", doc.name),
            }
        }
        Ok(doc)
    }
}

fn missing_parameters(doc: &GerberDocument) -> String {
    let mut missing = Vec::new();
    if doc.units.is_none() {
        missing.push("units");
    }
    if doc.format.is_none() {
        missing.push("format");
    }
    missing.join(", ")
}
