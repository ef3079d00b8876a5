pub mod analysis;
pub mod builder;

pub use builder::{DependencyEdge, DependencyGraph, GraphNode, GraphView, NodeState, build};
