mod asf_tree;
mod contour;
mod hb_node;
mod hb_tree;

pub use asf_tree::{ASFKey, ASFTree};
pub use contour::{Contour, ContourSegment};
pub use hb_node::{ContourSpan, HBKey, HBNode, HBNodeKind};
pub use hb_tree::HBTree;
