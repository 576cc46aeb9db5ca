use anyhow::{Context, Result, bail, ensure};

use crate::entities::{Module, Net, SymmetryAxis, SymmetryGroup};

/// A parsed floorplanning instance, not yet registered with an engine.
#[derive(Debug, Clone, Default)]
pub struct Instance {
    pub modules: Vec<Module>,
    pub symmetry_groups: Vec<SymmetryGroup>,
    pub nets: Vec<Net>,
}

/// Parses the plain-text instance format.
///
/// Records, one per line:
/// - `MODULE <name> <width> <height>`
/// - `SYMMETRY <group> { PAIR <a> <b> | SELF <m> }* [AXIS VERTICAL|HORIZONTAL]`
/// - `NET <name> <module> <module>+`
///
/// The symmetry axis defaults to vertical. `#` starts a comment; blank lines
/// are ignored.
pub fn parse_instance(input: &str) -> Result<Instance> {
    let mut instance = Instance::default();
    for (line_no, raw) in input.lines().enumerate() {
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let mut tokens = line.split_whitespace();
        let record = tokens.next().expect("line is non-empty");
        let parsed = match record {
            "MODULE" => parse_module(&mut tokens).map(|m| instance.modules.push(m)),
            "SYMMETRY" => parse_symmetry(&mut tokens).map(|g| instance.symmetry_groups.push(g)),
            "NET" => parse_net(&mut tokens).map(|n| instance.nets.push(n)),
            other => Err(anyhow::anyhow!("unknown record type {other}")),
        };
        parsed.with_context(|| format!("line {}: {line}", line_no + 1))?;
    }
    Ok(instance)
}

fn parse_module<'a>(tokens: &mut impl Iterator<Item = &'a str>) -> Result<Module> {
    let name = tokens.next().context("missing module name")?;
    let width: f64 = tokens
        .next()
        .context("missing width")?
        .parse()
        .context("width is not a number")?;
    let height: f64 = tokens
        .next()
        .context("missing height")?
        .parse()
        .context("height is not a number")?;
    ensure!(tokens.next().is_none(), "trailing tokens after MODULE record");
    Module::new(name, width, height)
}

fn parse_symmetry<'a>(tokens: &mut impl Iterator<Item = &'a str>) -> Result<SymmetryGroup> {
    let name = tokens.next().context("missing group name")?;
    let mut group = SymmetryGroup::new(name, SymmetryAxis::Vertical);
    while let Some(token) = tokens.next() {
        match token {
            "PAIR" => {
                let a = tokens.next().context("PAIR is missing its first module")?;
                let b = tokens.next().context("PAIR is missing its second module")?;
                group.add_pair(a, b)?;
            }
            "SELF" => {
                let m = tokens.next().context("SELF is missing its module")?;
                group.add_self_symmetric(m)?;
            }
            "AXIS" => {
                group.axis = match tokens.next().context("missing axis kind")? {
                    "VERTICAL" => SymmetryAxis::Vertical,
                    "HORIZONTAL" => SymmetryAxis::Horizontal,
                    other => bail!("unknown axis kind {other}"),
                };
            }
            other => bail!("unknown token {other} in SYMMETRY record"),
        }
    }
    ensure!(!group.is_empty(), "symmetry group {name} has no members");
    Ok(group)
}

fn parse_net<'a>(tokens: &mut impl Iterator<Item = &'a str>) -> Result<Net> {
    let name = tokens.next().context("missing net name")?;
    let pins: Vec<String> = tokens.map(str::to_string).collect();
    Net::new(name, pins)
}
