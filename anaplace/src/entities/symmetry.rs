use anyhow::{Result, ensure};

/// Orientation of a symmetry axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SymmetryAxis {
    Vertical,
    Horizontal,
}

impl SymmetryAxis {
    pub fn flipped(self) -> SymmetryAxis {
        match self {
            SymmetryAxis::Vertical => SymmetryAxis::Horizontal,
            SymmetryAxis::Horizontal => SymmetryAxis::Vertical,
        }
    }
}

/// Declaration of one symmetry group: an ordered set of symmetry pairs plus a
/// set of self-symmetric modules, all sharing a single common axis.
///
/// A module may appear in at most one group; membership uniqueness across
/// groups is enforced by the engine at registration.
#[derive(Clone, Debug)]
pub struct SymmetryGroup {
    pub name: String,
    pub axis: SymmetryAxis,
    pairs: Vec<(String, String)>,
    self_symmetric: Vec<String>,
}

impl SymmetryGroup {
    pub fn new(name: impl Into<String>, axis: SymmetryAxis) -> Self {
        SymmetryGroup {
            name: name.into(),
            axis,
            pairs: Vec::new(),
            self_symmetric: Vec::new(),
        }
    }

    pub fn add_pair(&mut self, a: impl Into<String>, b: impl Into<String>) -> Result<()> {
        let (a, b) = (a.into(), b.into());
        ensure!(a != b, "symmetry pair in group {} repeats module {a}", self.name);
        for m in [&a, &b] {
            ensure!(
                !self.contains(m),
                "module {m} appears twice in symmetry group {}",
                self.name
            );
        }
        self.pairs.push((a, b));
        Ok(())
    }

    pub fn add_self_symmetric(&mut self, m: impl Into<String>) -> Result<()> {
        let m = m.into();
        ensure!(
            !self.contains(&m),
            "module {m} appears twice in symmetry group {}",
            self.name
        );
        self.self_symmetric.push(m);
        Ok(())
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn self_symmetric(&self) -> &[String] {
        &self.self_symmetric
    }

    /// All member module names: pair members first, then the self-symmetric set.
    pub fn members(&self) -> impl Iterator<Item = &str> {
        self.pairs
            .iter()
            .flat_map(|(a, b)| [a.as_str(), b.as_str()])
            .chain(self.self_symmetric.iter().map(String::as_str))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.members().any(|m| m == name)
    }

    pub fn is_self_symmetric(&self, name: &str) -> bool {
        self.self_symmetric.iter().any(|m| m == name)
    }

    /// Index of the pair containing `name`, if any.
    pub fn pair_containing(&self, name: &str) -> Option<usize> {
        self.pairs.iter().position(|(a, b)| a == name || b == name)
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty() && self.self_symmetric.is_empty()
    }

    pub fn toggle_axis(&mut self) {
        self.axis = self.axis.flipped();
    }
}
