//! Evaluation of fields defined by composing operators over a finite element domain.
//!
//! A [`FieldModule`] owns a graph of [`Field`]s. Leaf fields hold constants or interpolate
//! node values over elements, and every other field applies an operator to its source fields.
//! Fields are evaluated at the current location of an [`EvaluationContext`], which caches the
//! values, and optionally the derivatives with respect to the element reference coordinates,
//! of every field evaluated there.
//!
//! ```
//! use femfield::{ElementId, FieldModule, LagrangeBasis, NodeId};
//!
//! let mut module = FieldModule::new();
//! let coordinates = module.create_finite_element(2).unwrap();
//! for (node, x) in [[0.0, 0.0], [1.0, 0.0], [0.0, 2.0], [1.0, 2.0]].iter().enumerate() {
//!     module.set_node_parameters(coordinates, NodeId(node as u32), x).unwrap();
//! }
//! let nodes = [NodeId(0), NodeId(1), NodeId(2), NodeId(3)];
//! module
//!     .define_element(coordinates, ElementId(0), None, LagrangeBasis::BilinearSquare, &nodes)
//!     .unwrap();
//!
//! let mut ctx = module.create_evaluation_context();
//! ctx.set_element_location(ElementId(0), &[0.25, 0.75]);
//! assert_eq!(module.evaluate_real(&mut ctx, coordinates).unwrap(), vec![0.25, 1.5]);
//! ```

pub mod basis;
pub mod cache;
pub mod change;
pub mod context;
pub mod error;
pub mod field;
pub mod import;
pub mod location;
pub mod module;

pub mod linalg {
    pub use femfield_linalg::*;
}

pub extern crate nalgebra;

pub use basis::{ElementBasis, LagrangeBasis};
pub use cache::{CacheState, Scratch, ValueCache};
pub use change::{ChangeBatch, ChangeFlags};
pub use context::EvaluationContext;
pub use error::{AssignmentError, ConstructionError, EvaluationError};
pub use field::{Field, FieldId, Operator};
pub use location::{CoordinateSystem, DomainLocation, ElementId, Location, NodeId};
pub use module::{FieldModule, FieldModuleSettings, ObserverId};
