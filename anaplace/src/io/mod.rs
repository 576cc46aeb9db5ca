mod export;
mod import;

pub use export::write_placement;
pub use import::{Instance, parse_instance};
