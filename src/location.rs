//! Identifiers and locations in the finite element domain.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Display;

/// Identifier of a node, as assigned by the mesh provider.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

/// Identifier of an element, as assigned by the mesh provider.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ElementId(pub u32);

impl Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The part of the domain at which fields are evaluated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DomainLocation {
    /// No location has been set. Only fields that do not depend on the domain can be evaluated.
    Unset,
    /// A point inside an element, given by its reference coordinates in `[0, 1]^d`.
    Element { element: ElementId, xi: Vec<f64> },
    Node(NodeId),
}

impl Default for DomainLocation {
    fn default() -> Self {
        DomainLocation::Unset
    }
}

/// A location in the domain together with a time.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Location {
    pub domain: DomainLocation,
    pub time: f64,
}

impl Location {
    pub fn element(element: ElementId, xi: &[f64], time: f64) -> Self {
        Self {
            domain: DomainLocation::Element {
                element,
                xi: xi.to_vec(),
            },
            time,
        }
    }

    pub fn node(node: NodeId, time: f64) -> Self {
        Self {
            domain: DomainLocation::Node(node),
            time,
        }
    }

    /// Reference coordinates of an element location, `None` otherwise.
    pub fn xi(&self) -> Option<&[f64]> {
        match &self.domain {
            DomainLocation::Element { xi, .. } => Some(xi),
            _ => None,
        }
    }
}

/// Interpretation of the components of a coordinate field.
///
/// The engine only carries the tag along with each field. Conversion between coordinate
/// systems is left to consumers.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum CoordinateSystem {
    RectangularCartesian,
    CylindricalPolar,
    SphericalPolar,
    ProlateSpheroidal { focus: f64 },
    OblateSpheroidal { focus: f64 },
    FibreAxes,
}

impl Default for CoordinateSystem {
    fn default() -> Self {
        CoordinateSystem::RectangularCartesian
    }
}

impl CoordinateSystem {
    pub fn keyword(&self) -> &'static str {
        match self {
            CoordinateSystem::RectangularCartesian => "rectangular_cartesian",
            CoordinateSystem::CylindricalPolar => "cylindrical_polar",
            CoordinateSystem::SphericalPolar => "spherical_polar",
            CoordinateSystem::ProlateSpheroidal { .. } => "prolate_spheroidal",
            CoordinateSystem::OblateSpheroidal { .. } => "oblate_spheroidal",
            CoordinateSystem::FibreAxes => "fibre",
        }
    }
}

impl Display for CoordinateSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordinateSystem::ProlateSpheroidal { focus } | CoordinateSystem::OblateSpheroidal { focus } => {
                write!(f, "{} focus {}", self.keyword(), focus)
            }
            _ => write!(f, "{}", self.keyword()),
        }
    }
}
