use slotmap::new_key_type;

use crate::floorplan::asf_tree::ASFTree;

new_key_type! {
    /// Key of an [`HBNode`] in the tree arena.
    pub struct HBKey;
}

/// Coordinates of one top-contour segment of a symmetry island, mirrored as a
/// bookkeeping node so later modules can attach to the island surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContourSpan {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

/// Payload of an [`HBNode`].
#[derive(Debug, Clone)]
pub enum HBNodeKind {
    /// A free module; the node name links it to the module map.
    Module,
    /// A symmetry island; owns the ASF-B*-tree of its group.
    Hierarchy(ASFTree),
    /// One segment of the top contour of the parent hierarchy's island.
    Contour(ContourSpan),
}

/// Node of the hierarchical B*-tree.
///
/// Kind and name are fixed at construction. Children are owned along the tree
/// spine; `parent` is a non-owning back-reference into the arena.
#[derive(Debug, Clone)]
pub struct HBNode {
    name: String,
    kind: HBNodeKind,
    pub(crate) left: Option<HBKey>,
    pub(crate) right: Option<HBKey>,
    pub(crate) parent: Option<HBKey>,
}

impl HBNode {
    pub fn new(name: impl Into<String>, kind: HBNodeKind) -> Self {
        HBNode {
            name: name.into(),
            kind,
            left: None,
            right: None,
            parent: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &HBNodeKind {
        &self.kind
    }

    pub(crate) fn kind_mut(&mut self) -> &mut HBNodeKind {
        &mut self.kind
    }

    pub fn left(&self) -> Option<HBKey> {
        self.left
    }

    pub fn right(&self) -> Option<HBKey> {
        self.right
    }

    pub fn parent(&self) -> Option<HBKey> {
        self.parent
    }

    pub fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }

    pub fn is_module(&self) -> bool {
        matches!(self.kind, HBNodeKind::Module)
    }

    pub fn is_hierarchy(&self) -> bool {
        matches!(self.kind, HBNodeKind::Hierarchy(_))
    }

    pub fn is_contour(&self) -> bool {
        matches!(self.kind, HBNodeKind::Contour(_))
    }

    /// The island tree, for hierarchy nodes.
    pub fn asf_tree(&self) -> Option<&ASFTree> {
        match &self.kind {
            HBNodeKind::Hierarchy(asf) => Some(asf),
            _ => None,
        }
    }

    /// The mirrored contour segment, for contour nodes.
    pub fn contour_span(&self) -> Option<ContourSpan> {
        match self.kind {
            HBNodeKind::Contour(span) => Some(span),
            _ => None,
        }
    }
}
