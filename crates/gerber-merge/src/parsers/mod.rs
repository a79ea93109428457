pub mod coord;
pub mod excellon;
pub mod gerber;
