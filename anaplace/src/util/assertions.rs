use itertools::Itertools;

use crate::floorplan::HBTree;
use crate::geometry::Rect;

//Various checks to verify correctness of the engine state
//Used in debug_assert!() blocks and tests

const EPS: f64 = 1e-6;

/// No two placed modules overlap with positive area.
pub fn no_module_overlap(tree: &HBTree) -> bool {
    tree.modules()
        .values()
        .tuple_combinations()
        .all(|(a, b)| !interiors_overlap(a.rect(), b.rect()))
}

/// Every symmetry island satisfies the feasibility predicate, including the
/// exact mirror equations of its packed coordinates.
pub fn symmetry_equations_hold(tree: &HBTree) -> bool {
    tree.islands()
        .all(|island| island.is_symmetric_feasible(tree.modules()))
}

/// Every island occupies a contiguous rectangle free of foreign modules.
pub fn islands_are_contiguous(tree: &HBTree) -> bool {
    tree.islands().all(|island| {
        let Some(bbox) = island.bounding_box() else {
            return true;
        };
        let group = island.group();
        tree.modules()
            .values()
            .filter(|m| !group.contains(m.name()))
            .all(|m| !interiors_overlap(bbox, m.rect()))
    })
}

fn interiors_overlap(a: Rect, b: Rect) -> bool {
    a.x_max > b.x_min + EPS
        && b.x_max > a.x_min + EPS
        && a.y_max > b.y_min + EPS
        && b.y_max > a.y_min + EPS
}
