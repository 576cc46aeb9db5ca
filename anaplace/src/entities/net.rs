use anyhow::{Result, ensure};

/// A named net connecting two or more modules, referenced by module name.
/// Used only for half-perimeter wirelength evaluation.
#[derive(Clone, Debug)]
pub struct Net {
    pub name: String,
    pub pins: Vec<String>,
}

impl Net {
    pub fn new(name: impl Into<String>, pins: Vec<String>) -> Result<Self> {
        let name = name.into();
        ensure!(pins.len() >= 2, "net {name} connects fewer than two modules");
        Ok(Net { name, pins })
    }
}
