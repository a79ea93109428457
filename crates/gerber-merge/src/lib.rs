pub mod board;
pub mod error;
pub mod geometry;
pub mod layers;
pub mod parsers;

pub use board::{Board, LayerDocument, ReconcileReport};
pub use error::MergeError;
pub use layers::LayerRole;
