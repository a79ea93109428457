use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::Serialize;

use crate::error::MergeError;
use crate::geometry::{BBox, ClipMode};
use crate::layers::{self, LayerRole};
use crate::parsers::excellon::ExcellonDocument;
use crate::parsers::gerber::GerberDocument;

/// Margin added around the union of all layers when there is no outline.
pub const NO_OUTLINE_MARGIN: f64 = 5.0;

/// The parsed contents of one layer file.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerDocument {
    Gerber(GerberDocument),
    Excellon(ExcellonDocument),
}

impl LayerDocument {
    /// Parse `path` with the parser its role calls for.
    pub fn load(role: LayerRole, path: &Path) -> Result<Self, MergeError> {
        if role.is_drill() {
            ExcellonDocument::from_path(path).map(LayerDocument::Excellon)
        } else {
            GerberDocument::from_path(path).map(LayerDocument::Gerber)
        }
    }

    pub fn name(&self) -> &str {
        match self {
            LayerDocument::Gerber(doc) => &doc.name,
            LayerDocument::Excellon(doc) => &doc.name,
        }
    }

    pub fn bbox(&self) -> Option<BBox> {
        match self {
            LayerDocument::Gerber(doc) => doc.bbox,
            LayerDocument::Excellon(doc) => doc.bbox,
        }
    }

    pub fn set_bbox(&mut self, bbox: Option<BBox>) {
        match self {
            LayerDocument::Gerber(doc) => doc.bbox = bbox,
            LayerDocument::Excellon(doc) => doc.bbox = bbox,
        }
    }

    pub fn calc_bbox(&mut self) {
        match self {
            LayerDocument::Gerber(doc) => doc.calc_bbox(),
            LayerDocument::Excellon(doc) => doc.calc_bbox(),
        }
    }

    pub fn rotate90ccw(&mut self) {
        match self {
            LayerDocument::Gerber(doc) => doc.rotate90ccw(),
            LayerDocument::Excellon(doc) => doc.rotate90ccw(),
        }
    }

    pub fn rotate90cw(&mut self) {
        match self {
            LayerDocument::Gerber(doc) => doc.rotate90cw(),
            LayerDocument::Excellon(doc) => doc.rotate90cw(),
        }
    }

    pub fn translate(&mut self, dx: f64, dy: f64) {
        match self {
            LayerDocument::Gerber(doc) => doc.translate(dx, dy),
            LayerDocument::Excellon(doc) => doc.translate(dx, dy),
        }
    }

    pub fn clip_to_bbox(&mut self, mode: ClipMode) -> usize {
        match self {
            LayerDocument::Gerber(doc) => doc.clip_to_bbox(mode),
            LayerDocument::Excellon(doc) => doc.clip_to_bbox(mode),
        }
    }

    /// Number of draw layers or hole groups.
    pub fn group_count(&self) -> usize {
        match self {
            LayerDocument::Gerber(doc) => doc.layers.len(),
            LayerDocument::Excellon(doc) => doc.holes.len(),
        }
    }

    pub fn point_count(&self) -> usize {
        match self {
            LayerDocument::Gerber(doc) => doc.point_count(),
            LayerDocument::Excellon(doc) => doc.point_count(),
        }
    }

    pub fn write<W: Write>(&self, out: &mut W) -> Result<(), MergeError> {
        match self {
            LayerDocument::Gerber(doc) => doc.write(out),
            LayerDocument::Excellon(doc) => doc.write(out),
        }
    }
}

/// Outcome of deciding a board's box, before anything is changed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reconciliation {
    /// The box every layer is held to.
    pub bbox: BBox,
    /// Plain union of every layer's box.
    pub union: BBox,
    /// True when no outline was found and `bbox` is the padded union.
    pub padded: bool,
    pub out_of_bounds: Vec<LayerRole>,
}

/// Decide the board's authoritative box from each layer's own box.
///
/// An outline with geometry defines the box. Without one, the union of
/// all layers grown by [`NO_OUTLINE_MARGIN`] is used. Returns `None` when
/// no layer has any geometry.
pub fn reconcile(boxes: &[(LayerRole, Option<BBox>)]) -> Option<Reconciliation> {
    let union = boxes
        .iter()
        .filter_map(|(_, b)| *b)
        .reduce(|a, b| a.union(&b))?;
    let outline = boxes
        .iter()
        .find(|(role, _)| *role == LayerRole::Outline)
        .and_then(|(_, b)| *b);

    let (bbox, padded) = match outline {
        Some(outline) => (outline, false),
        None => (union.pad(NO_OUTLINE_MARGIN), true),
    };
    let out_of_bounds = boxes
        .iter()
        .filter_map(|(role, b)| match b {
            Some(b) if b.exceeds(&bbox) => Some(*role),
            _ => None,
        })
        .collect();

    Some(Reconciliation {
        bbox,
        union,
        padded,
        out_of_bounds,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClippedLayer {
    pub role: LayerRole,
    pub points: usize,
}

/// What [`Board::reconcile`] did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconcileReport {
    /// Authoritative box in the coordinates the layers were read in.
    pub bbox: BBox,
    /// Translation applied to bring the box's minimum corner to the origin.
    pub offset: (f64, f64),
    pub padded: bool,
    pub out_of_bounds: Vec<LayerRole>,
    pub clipped: Vec<ClippedLayer>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerSummary {
    pub role: LayerRole,
    pub source: String,
    pub groups: usize,
    pub points: usize,
}

/// All layers of one board.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Board {
    pub layers: BTreeMap<LayerRole, LayerDocument>,
    pub bbox: Option<BBox>,
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, role: LayerRole, doc: LayerDocument) {
        self.layers.insert(role, doc);
    }

    /// Discover and parse every layer file in `dir`. Any parse failure
    /// fails the whole board.
    pub fn load(dir: &Path) -> Result<Self, MergeError> {
        let mut board = Board::new();
        for (role, path) in layers::discover(dir)? {
            info!("{role}:");
            let doc = LayerDocument::load(role, &path).map_err(|e| e.in_file(&path))?;
            board.insert(role, doc);
        }
        Ok(board)
    }

    /// Hold every layer to one box and move the board to the origin.
    ///
    /// Layer boxes are recomputed from geometry first, so running this on
    /// a board that is already normalized leaves it unchanged. Afterwards
    /// every layer's `bbox` is the board's `bbox`.
    pub fn reconcile(&mut self) -> Option<ReconcileReport> {
        for doc in self.layers.values_mut() {
            doc.calc_bbox();
        }
        let boxes: Vec<(LayerRole, Option<BBox>)> = self
            .layers
            .iter()
            .map(|(role, doc)| (*role, doc.bbox()))
            .collect();

        let Some(plan) = reconcile(&boxes) else {
            warn!("No geometry on any layer, nothing to reconcile");
            self.bbox = None;
            return None;
        };

        if plan.padded {
            warn!("No outline layer, padding bbox by {NO_OUTLINE_MARGIN}");
        } else if !plan.out_of_bounds.is_empty() {
            let names: Vec<&str> = plan.out_of_bounds.iter().map(|r| r.name()).collect();
            warn!(
                "Layers {} have elements outside of outline",
                names.join(", ")
            );
        }

        for doc in self.layers.values_mut() {
            doc.set_bbox(Some(plan.bbox));
        }

        let mut clipped = Vec::new();
        for role in &plan.out_of_bounds {
            if let Some(doc) = self.layers.get_mut(role) {
                let points = doc.clip_to_bbox(ClipMode::Clamp);
                warn!("Clipped layer {role}, {points} coordinates moved onto the outline");
                clipped.push(ClippedLayer {
                    role: *role,
                    points,
                });
            }
        }

        self.bbox = Some(plan.bbox);
        let offset = (-plan.bbox.minx, -plan.bbox.miny);
        self.translate(offset.0, offset.1);

        Some(ReconcileReport {
            bbox: plan.bbox,
            offset,
            padded: plan.padded,
            out_of_bounds: plan.out_of_bounds,
            clipped,
        })
    }

    pub fn translate(&mut self, dx: f64, dy: f64) {
        for doc in self.layers.values_mut() {
            doc.translate(dx, dy);
        }
        self.bbox = self.bbox.map(|b| b.translate(dx, dy));
    }

    /// Rotate a quarter turn counter-clockwise, then move back to the origin.
    pub fn rotate90ccw(&mut self) {
        for doc in self.layers.values_mut() {
            doc.rotate90ccw();
        }
        self.bbox = self.bbox.map(|b| b.rotate90ccw());
        self.move_to_origin();
    }

    /// Rotate a quarter turn clockwise, then move back to the origin.
    pub fn rotate90cw(&mut self) {
        for doc in self.layers.values_mut() {
            doc.rotate90cw();
        }
        self.bbox = self.bbox.map(|b| b.rotate90cw());
        self.move_to_origin();
    }

    fn move_to_origin(&mut self) {
        if let Some(bbox) = self.bbox {
            self.translate(-bbox.minx, -bbox.miny);
        }
    }

    /// Write each layer to `<prefix><extension>`; returns the paths written.
    ///
    /// If any layer fails, every file this call created is removed again.
    pub fn save(&self, prefix: &Path) -> Result<Vec<PathBuf>, MergeError> {
        let mut written = Vec::new();
        for (role, doc) in &self.layers {
            let mut name = prefix.as_os_str().to_owned();
            name.push(role.extension());
            let path = PathBuf::from(name);

            written.push(path.clone());
            if let Err(e) = write_layer(doc, &path) {
                for done in &written {
                    if let Err(remove) = fs::remove_file(done) {
                        if remove.kind() != ErrorKind::NotFound {
                            warn!("Could not remove {}: {remove}", done.display());
                        }
                    }
                }
                return Err(e.in_file(&path));
            }
        }
        Ok(written)
    }

    pub fn summary(&self) -> Vec<LayerSummary> {
        self.layers
            .iter()
            .map(|(role, doc)| LayerSummary {
                role: *role,
                source: doc.name().to_string(),
                groups: doc.group_count(),
                points: doc.point_count(),
            })
            .collect()
    }
}

fn write_layer(doc: &LayerDocument, path: &Path) -> Result<(), MergeError> {
    let mut out = BufWriter::new(File::create(path)?);
    doc.write(&mut out)?;
    out.flush()?;
    Ok(())
}
