//! # astdiff
//!
//! Edit scripts and change classification for abstract syntax trees.
//!
//! Given two versions of a parsed file and a node correspondence produced by
//! an external matcher, astdiff computes:
//!
//! - an ordered edit script (insert, delete, update, move, whole-subtree
//!   insert/delete, cross-file move in/out) that turns the src tree into the
//!   dst tree, using Chawathe's algorithm (1996) as popularised by GumTree
//! - a `MultiMove` for every group of nodes that correspond many-to-many,
//!   i.e. code that was duplicated or merged
//! - a root-only classification reporting each changed region once, at its
//!   topmost node
//!
//! ## Usage
//!
//! ```
//! use std::sync::Arc;
//! use astdiff::{AstNode, Diff, DiffConfig, DiffInput, MultiMappingStore, TreeContext};
//!
//! let mut src = TreeContext::new(AstNode::unlabeled("Block"));
//! let foo = src.add_child(src.root(), AstNode::new("Call", "foo"));
//!
//! let mut dst = TreeContext::new(AstNode::unlabeled("Block"));
//! let foo2 = dst.add_child(dst.root(), AstNode::new("Call", "foo"));
//! let bar = dst.add_child(dst.root(), AstNode::new("Call", "bar"));
//!
//! let mut mappings = MultiMappingStore::new();
//! mappings.add_mapping(src.root(), dst.root());
//! mappings.add_mapping(foo, foo2);
//!
//! let input = DiffInput::new("A.java", "A.java", Arc::new(src), Arc::new(dst), mappings);
//! let diff = Diff::compute(input, &DiffConfig::default());
//!
//! assert_eq!(diff.edit_script().len(), 1);
//! assert!(diff.classifier().inserted_dsts().contains(&bar));
//! ```

#![warn(missing_docs)]
#![warn(clippy::std_instead_of_core)]

pub use indextree;

mod tracing_macros;
pub(crate) use tracing_macros::{debug, trace};

mod action;
mod apply;
mod chawathe;
/// Root-only change classification
pub mod classifier;
mod diff;
/// Node correspondence stores
pub mod mapping;
mod multi_move;
mod simplify;
/// Arena-backed AST model
pub mod tree;

pub use action::*;
pub use apply::*;
pub use chawathe::*;
pub use classifier::{ActionIndex, TreeClassifier};
pub use diff::*;
pub use mapping::{MonoMappingStore, MultiMappingStore, Partners};
pub use multi_move::*;
pub use simplify::*;
pub use tree::{AstNode, TreeContext};
