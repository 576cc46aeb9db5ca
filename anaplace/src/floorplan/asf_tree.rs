use std::collections::HashMap;

use anyhow::{Result, ensure};
use ordered_float::OrderedFloat;
use slotmap::{SlotMap, new_key_type};

use crate::entities::{ModuleMap, SymmetryAxis, SymmetryGroup};
use crate::floorplan::contour::Contour;
use crate::geometry::Rect;

new_key_type! {
    /// Key of an [`ASFNode`] in the island arena.
    pub struct ASFKey;
}

/// Node of an ASF-B*-tree: one representative of the island.
///
/// `x`/`y` hold the position of the (half-)representative in the local
/// packing frame and are only meaningful after [`ASFTree::pack`].
#[derive(Debug, Clone)]
struct ASFNode {
    module: String,
    self_symmetric: bool,
    left: Option<ASFKey>,
    right: Option<ASFKey>,
    parent: Option<ASFKey>,
    x: f64,
    y: f64,
}

/// Automatically symmetric-feasible B*-tree of one symmetry island.
///
/// Only representatives are stored: one member per symmetry pair and every
/// self-symmetric module at half its axis-facing dimension. Self-symmetric
/// nodes live on the spine adjacent to the axis (right children for a
/// vertical axis, left children for a horizontal one), so packing the
/// representatives against a local contour and mirroring them about the
/// derived axis always completes a valid symmetric island.
#[derive(Debug, Clone)]
pub struct ASFTree {
    group: SymmetryGroup,
    nodes: SlotMap<ASFKey, ASFNode>,
    node_index: HashMap<String, ASFKey>,
    /// Current representative per pair, aligned with `group.pairs()`.
    representatives: Vec<String>,
    root: Option<ASFKey>,
    contour: Contour,
    /// Axis coordinate in the same frame as the member module positions.
    axis: f64,
    bbox: Option<Rect>,
}

impl ASFTree {
    /// Validates the group against the module set and builds the initial tree.
    ///
    /// The representative of a pair `(a, b)` defaults to `b`. Fails when the
    /// group is empty, references unknown modules, or contains a pair whose
    /// members differ in size (the mirror equations cannot hold then).
    pub fn construct_initial(group: SymmetryGroup, modules: &ModuleMap) -> Result<Self> {
        ensure!(!group.is_empty(), "symmetry group {} has no members", group.name);
        for name in group.members() {
            ensure!(
                modules.contains_key(name),
                "symmetry group {} references unknown module {name}",
                group.name
            );
        }
        for (a, b) in group.pairs() {
            let (ma, mb) = (&modules[a.as_str()], &modules[b.as_str()]);
            ensure!(
                ma.width() == mb.width() && ma.height() == mb.height(),
                "symmetry pair ({a}, {b}) in group {} has mismatched dimensions",
                group.name
            );
        }

        let representatives = group.pairs().iter().map(|(_, b)| b.clone()).collect();
        let mut tree = ASFTree {
            group,
            nodes: SlotMap::with_key(),
            node_index: HashMap::new(),
            representatives,
            root: None,
            contour: Contour::new(),
            axis: 0.0,
            bbox: None,
        };
        tree.rebuild_structure();
        Ok(tree)
    }

    pub fn group(&self) -> &SymmetryGroup {
        &self.group
    }

    /// Axis position in the same frame as the member module coordinates.
    pub fn axis_position(&self) -> f64 {
        self.axis
    }

    /// Island bounding box; `None` until the first `pack`.
    pub fn bounding_box(&self) -> Option<Rect> {
        self.bbox
    }

    pub fn representatives(&self) -> &[String] {
        &self.representatives
    }

    /// Packs the representatives against a fresh local contour, derives the
    /// axis position and mirrors the island into a frame anchored at the
    /// origin. Member module coordinates are written back. Idempotent.
    pub fn pack(&mut self, modules: &mut ModuleMap) {
        let Some(root) = self.root else { return };
        self.contour.clear();

        // standard B*-tree placement of the representatives, pre-order
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![root];
        while let Some(key) = stack.pop() {
            order.push(key);
            let x = match self.nodes[key].parent {
                None => 0.0,
                Some(p) => {
                    let (pw, _) = self.effective_dims_of(p, modules);
                    if self.nodes[p].left == Some(key) {
                        self.nodes[p].x + pw
                    } else {
                        self.nodes[p].x
                    }
                }
            };
            let (w, h) = self.effective_dims_of(key, modules);
            let y = self.contour.height(x, x + w);
            {
                let node = &mut self.nodes[key];
                node.x = x;
                node.y = y;
            }
            self.contour.add_segment(x, x + w, y + h);

            let node = &self.nodes[key];
            if let Some(r) = node.right {
                stack.push(r);
            }
            if let Some(l) = node.left {
                stack.push(l);
            }
        }

        // the axis sits at the furthest representative extent; self-symmetric
        // halves contribute their half extent, which keeps the axis at the
        // module centers they straddle
        let axis = order
            .iter()
            .map(|&key| {
                let node = &self.nodes[key];
                let (w, h) = self.effective_dims_of(key, modules);
                match self.group.axis {
                    SymmetryAxis::Vertical => node.x + w,
                    SymmetryAxis::Horizontal => node.y + h,
                }
            })
            .max_by_key(|&extent| OrderedFloat(extent))
            .expect("island tree is non-empty");

        // write representatives and their mirrored partners into the island frame
        for &key in &order {
            let (name, nx, ny, self_symmetric) = {
                let node = &self.nodes[key];
                (node.module.clone(), node.x, node.y, node.self_symmetric)
            };
            let (w, h) = {
                let m = &modules[name.as_str()];
                (m.width(), m.height())
            };
            match self.group.axis {
                SymmetryAxis::Vertical => {
                    if self_symmetric {
                        let m = modules.get_mut(&name).expect("member registered");
                        m.set_position(nx + axis - w / 2.0, ny);
                    } else {
                        let partner = self
                            .pair_partner(&name)
                            .expect("representative belongs to a pair")
                            .to_string();
                        modules
                            .get_mut(&name)
                            .expect("member registered")
                            .set_position(nx + axis, ny);
                        modules
                            .get_mut(&partner)
                            .expect("member registered")
                            .set_position(axis - nx - w, ny);
                    }
                }
                SymmetryAxis::Horizontal => {
                    if self_symmetric {
                        let m = modules.get_mut(&name).expect("member registered");
                        m.set_position(nx, ny + axis - h / 2.0);
                    } else {
                        let partner = self
                            .pair_partner(&name)
                            .expect("representative belongs to a pair")
                            .to_string();
                        modules
                            .get_mut(&name)
                            .expect("member registered")
                            .set_position(nx, ny + axis);
                        modules
                            .get_mut(&partner)
                            .expect("member registered")
                            .set_position(nx, axis - ny - h);
                    }
                }
            }
        }
        self.axis = axis;

        let mut bbox: Option<Rect> = None;
        for name in self.group.members() {
            let r = modules[name].rect();
            bbox = Some(match bbox {
                None => r,
                Some(b) => Rect::bounding_rect(b, r),
            });
        }
        self.bbox = bbox;
    }

    /// Shifts the island, its axis and its bounding box into a new frame.
    pub(crate) fn translate(&mut self, dx: f64, dy: f64, modules: &mut ModuleMap) {
        for name in self.group.members() {
            let m = modules.get_mut(name).expect("member registered");
            let (x, y) = (m.x(), m.y());
            m.set_position(x + dx, y + dy);
        }
        match self.group.axis {
            SymmetryAxis::Vertical => self.axis += dx,
            SymmetryAxis::Horizontal => self.axis += dy,
        }
        if let Some(b) = self.bbox {
            self.bbox = Some(b.translated(dx, dy));
        }
    }

    /// Rotates a member module; pair members rotate together so the pair
    /// stays dimension-matched. Self-symmetric modules cannot rotate: the
    /// module's own mirror line would tilt off the group axis.
    pub fn rotate_module(&mut self, name: &str, modules: &mut ModuleMap) -> bool {
        if self.group.is_self_symmetric(name) {
            return false;
        }
        let Some(idx) = self.group.pair_containing(name) else {
            return false;
        };
        let (a, b) = self.group.pairs()[idx].clone();
        modules.get_mut(&a).expect("member registered").rotate();
        modules.get_mut(&b).expect("member registered").rotate();
        true
    }

    /// Makes the other member of the pair containing `name` the representative.
    pub fn change_representative(&mut self, name: &str) -> bool {
        let Some(idx) = self.group.pair_containing(name) else {
            return false;
        };
        let (a, b) = self.group.pairs()[idx].clone();
        let old = self.representatives[idx].clone();
        let new = if old == a { b } else { a };

        let key = self.node_index.remove(&old).expect("representative indexed");
        self.nodes[key].module = new.clone();
        self.node_index.insert(new.clone(), key);
        self.representatives[idx] = new;
        true
    }

    /// Switches between vertical and horizontal symmetry and re-aligns the
    /// self-symmetric spine to the new axis. Representative choices survive.
    pub fn convert_symmetry_type(&mut self) -> bool {
        self.group.toggle_axis();
        self.rebuild_structure();
        true
    }

    /// Verifies that every pair is represented exactly once, that the
    /// self-symmetric spine discipline holds, and, once packed, that the
    /// placement satisfies the mirror equations.
    pub fn is_symmetric_feasible(&self, modules: &ModuleMap) -> bool {
        if self.representatives.len() != self.group.pairs().len() {
            return false;
        }
        for (idx, rep) in self.representatives.iter().enumerate() {
            let (a, b) = &self.group.pairs()[idx];
            if rep != a && rep != b {
                return false;
            }
            if !self.node_index.contains_key(rep) {
                return false;
            }
        }
        for name in self.group.self_symmetric() {
            let Some(&key) = self.node_index.get(name) else {
                return false;
            };
            if !self.on_axis_spine(key) {
                return false;
            }
        }
        if self.bbox.is_some() {
            self.mirror_equations_hold(modules)
        } else {
            true
        }
    }

    /// Checks the packed coordinates against the exact mirror equations.
    pub fn mirror_equations_hold(&self, modules: &ModuleMap) -> bool {
        const EPS: f64 = 1e-6;
        match self.group.axis {
            SymmetryAxis::Vertical => {
                self.group.pairs().iter().all(|(a, b)| {
                    let (ma, mb) = (&modules[a.as_str()], &modules[b.as_str()]);
                    (ma.center_x() + mb.center_x() - 2.0 * self.axis).abs() < EPS
                        && (ma.center_y() - mb.center_y()).abs() < EPS
                }) && self
                    .group
                    .self_symmetric()
                    .iter()
                    .all(|m| (modules[m.as_str()].center_x() - self.axis).abs() < EPS)
            }
            SymmetryAxis::Horizontal => {
                self.group.pairs().iter().all(|(a, b)| {
                    let (ma, mb) = (&modules[a.as_str()], &modules[b.as_str()]);
                    (ma.center_y() + mb.center_y() - 2.0 * self.axis).abs() < EPS
                        && (ma.center_x() - mb.center_x()).abs() < EPS
                }) && self
                    .group
                    .self_symmetric()
                    .iter()
                    .all(|m| (modules[m.as_str()].center_y() - self.axis).abs() < EPS)
            }
        }
    }

    /// Rebuilds the node structure for the current axis and representatives:
    /// the self-symmetric spine hangs off the root on the axis-adjacent side,
    /// the representative chain on the other.
    fn rebuild_structure(&mut self) {
        self.nodes.clear();
        self.node_index.clear();
        self.root = None;
        self.bbox = None;
        self.axis = 0.0;

        let self_symmetric = self.group.self_symmetric().to_vec();
        let representatives = self.representatives.clone();
        let axis = self.group.axis;

        let mut spine_tail: Option<ASFKey> = None;
        for name in self_symmetric {
            let key = self.insert_node(name, true);
            match spine_tail {
                None => self.root = Some(key),
                Some(tail) => {
                    match axis {
                        SymmetryAxis::Vertical => self.nodes[tail].right = Some(key),
                        SymmetryAxis::Horizontal => self.nodes[tail].left = Some(key),
                    }
                    self.nodes[key].parent = Some(tail);
                }
            }
            spine_tail = Some(key);
        }

        let mut prev: Option<ASFKey> = None;
        for name in representatives {
            let key = self.insert_node(name, false);
            // the chain hangs off the root on the non-spine side and keeps
            // extending on that side
            match prev.or(self.root) {
                None => self.root = Some(key),
                Some(p) => {
                    match axis {
                        SymmetryAxis::Vertical => self.nodes[p].left = Some(key),
                        SymmetryAxis::Horizontal => self.nodes[p].right = Some(key),
                    }
                    self.nodes[key].parent = Some(p);
                }
            }
            prev = Some(key);
        }
    }

    fn insert_node(&mut self, module: String, self_symmetric: bool) -> ASFKey {
        let key = self.nodes.insert(ASFNode {
            module: module.clone(),
            self_symmetric,
            left: None,
            right: None,
            parent: None,
            x: 0.0,
            y: 0.0,
        });
        self.node_index.insert(module, key);
        key
    }

    /// Packed footprint of the node: self-symmetric representatives occupy
    /// half their axis-facing dimension, the mirrored half completes them.
    fn effective_dims_of(&self, key: ASFKey, modules: &ModuleMap) -> (f64, f64) {
        let node = &self.nodes[key];
        let m = &modules[node.module.as_str()];
        match (self.group.axis, node.self_symmetric) {
            (SymmetryAxis::Vertical, true) => (m.width() / 2.0, m.height()),
            (SymmetryAxis::Horizontal, true) => (m.width(), m.height() / 2.0),
            (_, false) => (m.width(), m.height()),
        }
    }

    /// True when the path from the root consists solely of axis-adjacent
    /// links, pinning the node to the axis.
    fn on_axis_spine(&self, key: ASFKey) -> bool {
        let mut cur = key;
        while let Some(p) = self.nodes[cur].parent {
            let on_spine = match self.group.axis {
                SymmetryAxis::Vertical => self.nodes[p].right == Some(cur),
                SymmetryAxis::Horizontal => self.nodes[p].left == Some(cur),
            };
            if !on_spine {
                return false;
            }
            cur = p;
        }
        Some(cur) == self.root
    }

    fn pair_partner(&self, name: &str) -> Option<&str> {
        self.group.pairs().iter().find_map(|(a, b)| {
            if a == name {
                Some(b.as_str())
            } else if b == name {
                Some(a.as_str())
            } else {
                None
            }
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::entities::Module;

    fn modules(specs: &[(&str, f64, f64)]) -> ModuleMap {
        specs
            .iter()
            .map(|&(name, w, h)| (name.to_string(), Module::new(name, w, h).unwrap()))
            .collect()
    }

    fn pair_group(axis: SymmetryAxis) -> SymmetryGroup {
        let mut g = SymmetryGroup::new("g", axis);
        g.add_pair("L", "R").unwrap();
        g
    }

    #[test]
    fn vertical_pair_packs_around_the_axis() {
        let mut mods = modules(&[("L", 2.0, 3.0), ("R", 2.0, 3.0)]);
        let mut tree =
            ASFTree::construct_initial(pair_group(SymmetryAxis::Vertical), &mods).unwrap();
        tree.pack(&mut mods);

        assert_eq!((mods["L"].x(), mods["L"].y()), (0.0, 0.0));
        assert_eq!((mods["R"].x(), mods["R"].y()), (2.0, 0.0));
        assert_eq!(tree.axis_position(), 2.0);
        let bbox = tree.bounding_box().unwrap();
        assert_eq!((bbox.width(), bbox.height()), (4.0, 3.0));
        assert!(tree.is_symmetric_feasible(&mods));
    }

    #[test]
    fn single_self_symmetric_module_centers_on_the_axis() {
        let mut g = SymmetryGroup::new("g", SymmetryAxis::Vertical);
        g.add_self_symmetric("M").unwrap();
        let mut mods = modules(&[("M", 4.0, 2.0)]);

        let mut tree = ASFTree::construct_initial(g, &mods).unwrap();
        tree.pack(&mut mods);

        assert_eq!((mods["M"].x(), mods["M"].y()), (0.0, 0.0));
        assert_eq!(tree.axis_position(), 2.0);
        assert_eq!(tree.bounding_box().unwrap().area(), 8.0);
        assert!(tree.is_symmetric_feasible(&mods));
    }

    #[test]
    fn pairs_and_self_symmetric_modules_share_one_axis() {
        let mut g = SymmetryGroup::new("g", SymmetryAxis::Vertical);
        g.add_pair("P", "Q").unwrap();
        g.add_self_symmetric("S").unwrap();
        let mut mods = modules(&[("P", 2.0, 2.0), ("Q", 2.0, 2.0), ("S", 4.0, 2.0)]);

        let mut tree = ASFTree::construct_initial(g, &mods).unwrap();
        tree.pack(&mut mods);

        let axis = tree.axis_position();
        assert_eq!(axis, 4.0);
        assert_eq!(mods["S"].center_x(), axis);
        assert_eq!(mods["P"].center_x() + mods["Q"].center_x(), 2.0 * axis);
        assert_eq!(mods["P"].center_y(), mods["Q"].center_y());
        assert!(tree.is_symmetric_feasible(&mods));

        let bbox = tree.bounding_box().unwrap();
        assert_eq!((bbox.x_min, bbox.y_min), (0.0, 0.0));
        assert_eq!((bbox.width(), bbox.height()), (8.0, 2.0));
    }

    #[test]
    fn horizontal_axis_mirrors_in_y() {
        let mut mods = modules(&[("L", 2.0, 3.0), ("R", 2.0, 3.0)]);
        let mut tree =
            ASFTree::construct_initial(pair_group(SymmetryAxis::Horizontal), &mods).unwrap();
        tree.pack(&mut mods);

        assert_eq!(tree.axis_position(), 3.0);
        assert_eq!(mods["L"].center_x(), mods["R"].center_x());
        assert_eq!(mods["L"].center_y() + mods["R"].center_y(), 6.0);
        assert!(tree.is_symmetric_feasible(&mods));
    }

    #[test]
    fn horizontal_self_symmetric_module_centers_on_the_axis() {
        let mut g = SymmetryGroup::new("g", SymmetryAxis::Horizontal);
        g.add_self_symmetric("M").unwrap();
        let mut mods = modules(&[("M", 4.0, 2.0)]);

        let mut tree = ASFTree::construct_initial(g, &mods).unwrap();
        tree.pack(&mut mods);

        assert_eq!(tree.axis_position(), 1.0);
        assert_eq!(mods["M"].center_y(), 1.0);
        assert_eq!((mods["M"].x(), mods["M"].y()), (0.0, 0.0));
        assert!(tree.is_symmetric_feasible(&mods));
    }

    #[test]
    fn mismatched_pair_dimensions_are_infeasible() {
        let mods = modules(&[("L", 2.0, 3.0), ("R", 3.0, 2.0)]);
        assert!(ASFTree::construct_initial(pair_group(SymmetryAxis::Vertical), &mods).is_err());
    }

    #[test]
    fn unknown_members_are_rejected() {
        let mods = modules(&[("L", 2.0, 3.0)]);
        assert!(ASFTree::construct_initial(pair_group(SymmetryAxis::Vertical), &mods).is_err());
    }

    #[test]
    fn empty_groups_are_rejected() {
        let mods = modules(&[]);
        let g = SymmetryGroup::new("g", SymmetryAxis::Vertical);
        assert!(ASFTree::construct_initial(g, &mods).is_err());
    }

    #[test]
    fn rotating_a_pair_member_rotates_both() {
        let mut mods = modules(&[("L", 2.0, 3.0), ("R", 2.0, 3.0)]);
        let mut tree =
            ASFTree::construct_initial(pair_group(SymmetryAxis::Vertical), &mods).unwrap();

        assert!(tree.rotate_module("L", &mut mods));
        assert_eq!((mods["L"].width(), mods["L"].height()), (3.0, 2.0));
        assert_eq!((mods["R"].width(), mods["R"].height()), (3.0, 2.0));

        tree.pack(&mut mods);
        assert!(tree.is_symmetric_feasible(&mods));
    }

    #[test]
    fn self_symmetric_modules_cannot_rotate() {
        let mut g = SymmetryGroup::new("g", SymmetryAxis::Vertical);
        g.add_self_symmetric("M").unwrap();
        let mut mods = modules(&[("M", 4.0, 2.0)]);
        let mut tree = ASFTree::construct_initial(g, &mods).unwrap();

        assert!(!tree.rotate_module("M", &mut mods));
        assert_eq!((mods["M"].width(), mods["M"].height()), (4.0, 2.0));
        assert!(!tree.rotate_module("nope", &mut mods));
    }

    #[test]
    fn changing_the_representative_swaps_sides() {
        let mut mods = modules(&[("L", 2.0, 3.0), ("R", 2.0, 3.0)]);
        let mut tree =
            ASFTree::construct_initial(pair_group(SymmetryAxis::Vertical), &mods).unwrap();
        tree.pack(&mut mods);
        assert_eq!(mods["R"].x(), 2.0);

        assert!(tree.change_representative("R"));
        assert_eq!(tree.representatives(), ["L"]);
        tree.pack(&mut mods);
        assert_eq!(mods["L"].x(), 2.0);
        assert_eq!(mods["R"].x(), 0.0);
        assert!(tree.is_symmetric_feasible(&mods));

        assert!(!tree.change_representative("nope"));
    }

    #[test]
    fn converting_the_symmetry_type_realigns_the_spine() {
        let mut g = SymmetryGroup::new("g", SymmetryAxis::Vertical);
        g.add_pair("P", "Q").unwrap();
        g.add_self_symmetric("S").unwrap();
        let mut mods = modules(&[("P", 2.0, 2.0), ("Q", 2.0, 2.0), ("S", 4.0, 2.0)]);

        let mut tree = ASFTree::construct_initial(g, &mods).unwrap();
        tree.pack(&mut mods);
        assert!(tree.is_symmetric_feasible(&mods));

        assert!(tree.convert_symmetry_type());
        assert_eq!(tree.group().axis, SymmetryAxis::Horizontal);
        tree.pack(&mut mods);
        assert!(tree.is_symmetric_feasible(&mods));
        assert_eq!(mods["S"].center_y(), tree.axis_position());
        assert_eq!(
            mods["P"].center_y() + mods["Q"].center_y(),
            2.0 * tree.axis_position()
        );
    }

    #[test]
    fn pack_is_idempotent() {
        let mut g = SymmetryGroup::new("g", SymmetryAxis::Vertical);
        g.add_pair("P", "Q").unwrap();
        g.add_self_symmetric("S").unwrap();
        let mut mods = modules(&[("P", 2.0, 2.0), ("Q", 2.0, 2.0), ("S", 4.0, 2.0)]);

        let mut tree = ASFTree::construct_initial(g, &mods).unwrap();
        tree.pack(&mut mods);
        let first: Vec<(f64, f64)> = mods.values().map(|m| (m.x(), m.y())).collect();
        tree.pack(&mut mods);
        let second: Vec<(f64, f64)> = mods.values().map(|m| (m.x(), m.y())).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn clone_is_independent() {
        let mut mods = modules(&[("L", 2.0, 3.0), ("R", 2.0, 3.0)]);
        let mut tree =
            ASFTree::construct_initial(pair_group(SymmetryAxis::Vertical), &mods).unwrap();
        tree.pack(&mut mods);

        let clone = tree.clone();
        tree.change_representative("R");
        assert_eq!(clone.representatives(), ["R"]);
        assert_eq!(tree.representatives(), ["L"]);
    }
}
