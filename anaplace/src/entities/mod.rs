mod module;
mod net;
mod symmetry;

pub use module::Module;
pub use net::Net;
pub use symmetry::{SymmetryAxis, SymmetryGroup};

/// Modules keyed by name. Names are the canonical identity across the engine;
/// the ordered map keeps iteration deterministic.
pub type ModuleMap = std::collections::BTreeMap<String, Module>;
