use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::Serialize;

use crate::error::MergeError;

/// What role a fabrication file plays in the board stackup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayerRole {
    CopperTop,
    CopperBottom,
    MaskTop,
    MaskBottom,
    SilkTop,
    SilkBottom,
    PasteTop,
    PasteBottom,
    Outline,
    Holes,
}

impl LayerRole {
    pub const ALL: [LayerRole; 10] = [
        LayerRole::CopperTop,
        LayerRole::CopperBottom,
        LayerRole::MaskTop,
        LayerRole::MaskBottom,
        LayerRole::SilkTop,
        LayerRole::SilkBottom,
        LayerRole::PasteTop,
        LayerRole::PasteBottom,
        LayerRole::Outline,
        LayerRole::Holes,
    ];

    /// Canonical file extension (Altium/Protel conventions), with the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            LayerRole::CopperTop => ".GTL",
            LayerRole::CopperBottom => ".GBL",
            LayerRole::MaskTop => ".GTS",
            LayerRole::MaskBottom => ".GBS",
            LayerRole::SilkTop => ".GTO",
            LayerRole::SilkBottom => ".GBO",
            LayerRole::PasteTop => ".GTP",
            LayerRole::PasteBottom => ".GBP",
            LayerRole::Outline => ".GKO",
            LayerRole::Holes => ".XLN",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LayerRole::CopperTop => "copper-top",
            LayerRole::CopperBottom => "copper-bottom",
            LayerRole::MaskTop => "mask-top",
            LayerRole::MaskBottom => "mask-bottom",
            LayerRole::SilkTop => "silk-top",
            LayerRole::SilkBottom => "silk-bottom",
            LayerRole::PasteTop => "paste-top",
            LayerRole::PasteBottom => "paste-bottom",
            LayerRole::Outline => "outline",
            LayerRole::Holes => "holes",
        }
    }

    /// Holes are Excellon; every other role is Gerber.
    pub fn is_drill(&self) -> bool {
        matches!(self, LayerRole::Holes)
    }
}

impl fmt::Display for LayerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Identify a layer role from a file name's extension, case-insensitively.
pub fn identify_from_filename(path: &Path) -> Option<LayerRole> {
    let ext = path.extension()?.to_str()?.to_uppercase();
    LayerRole::ALL
        .into_iter()
        .find(|role| role.extension()[1..] == ext)
}

/// Map each layer role to a file in `dir`.
///
/// Entries are visited in sorted order. When several files match one role
/// the first one wins and the rest are reported.
pub fn discover(dir: &Path) -> Result<BTreeMap<LayerRole, PathBuf>, MergeError> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    let mut files: BTreeMap<LayerRole, PathBuf> = BTreeMap::new();
    for path in paths {
        let Some(role) = identify_from_filename(&path) else {
            debug!("{}: not a known layer file", path.display());
            continue;
        };
        match files.get(&role) {
            Some(first) => warn!(
                "Multiple files for layer {role}: {}, {}",
                first.display(),
                path.display()
            ),
            None => {
                files.insert(role, path);
            }
        }
    }
    Ok(files)
}
