use std::io::Write;

use anyhow::Result;

use crate::floorplan::HBTree;

/// Writes the placement: one `<name> <x> <y> <rotated>` line per module,
/// followed by a final `AREA` line.
pub fn write_placement(out: &mut impl Write, tree: &HBTree) -> Result<()> {
    for m in tree.modules().values() {
        writeln!(out, "{} {} {} {}", m.name(), m.x(), m.y(), u8::from(m.rotated()))?;
    }
    writeln!(out, "AREA {}", tree.area())?;
    Ok(())
}
