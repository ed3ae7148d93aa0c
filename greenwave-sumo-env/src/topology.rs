//! Static road network read from a SUMO `.net.xml` file.
//!
//! Only the parts needed for signal control are kept: junctions with their incoming
//! and outgoing edges, and edges with their end junctions. Internal junctions and
//! edges, which SUMO synthesizes inside intersections and prefixes with `:`, are
//! dropped.
use log::debug;
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

/// Errors raised while reading a network file.
#[derive(Error, Debug)]
pub enum TopologyError {
    /// The network file could not be read.
    #[error("failed to read network file {path:?}: {source}")]
    Io {
        /// Path of the network file.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The network file is not well-formed XML.
    #[error("malformed network file: {0}")]
    Xml(#[from] roxmltree::Error),

    /// A required attribute is missing on an element.
    #[error("<{element}> element (id = {id:?}) has no `{attribute}` attribute")]
    MissingAttribute {
        /// Tag name of the element.
        element: &'static str,
        /// Name of the missing attribute.
        attribute: &'static str,
        /// Identifier of the element if it has one.
        id: Option<String>,
    },
}

/// A junction of the network.
#[derive(Debug, Clone, PartialEq)]
pub struct Intersection {
    /// Junction id.
    pub id: String,

    /// Edges entering the junction, in the order of the junction's `incLanes`.
    pub incoming: Vec<String>,

    /// Edges leaving the junction, in document order.
    pub outgoing: Vec<String>,
}

/// A directed edge of the network.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    /// Edge id.
    pub id: String,

    /// Junction the edge starts from.
    pub from: String,

    /// Junction the edge leads to.
    pub to: String,
}

/// Junctions and edges of a network, indexed by id.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    intersections: Vec<Intersection>,
    intersection_ix: HashMap<String, usize>,
    links: Vec<Link>,
    link_ix: HashMap<String, usize>,
}

/// Returns the id of the edge a lane belongs to.
///
/// SUMO names lanes `<edge id>_<lane index>`; edge ids may contain `_` themselves,
/// so only the last numeric suffix is removed.
pub fn lane_to_edge(lane: &str) -> &str {
    match lane.rsplit_once('_') {
        Some((edge, ix)) if !edge.is_empty() && ix.chars().all(|c| c.is_ascii_digit()) => edge,
        _ => lane,
    }
}

fn is_internal_id(id: &str) -> bool {
    id.starts_with(':')
}

impl Topology {
    /// Reads and parses a network file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TopologyError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| TopologyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let topology = Self::parse(&text)?;
        debug!(
            "Loaded {:?}: {} intersections, {} links",
            path,
            topology.intersections.len(),
            topology.links.len()
        );
        Ok(topology)
    }

    /// Parses the content of a network file.
    pub fn parse(xml: &str) -> Result<Self, TopologyError> {
        let doc = roxmltree::Document::parse(xml)?;
        let root = doc.root_element();
        let mut topology = Self::default();

        for node in root.children().filter(|n| n.has_tag_name("junction")) {
            let id = node
                .attribute("id")
                .ok_or(TopologyError::MissingAttribute {
                    element: "junction",
                    attribute: "id",
                    id: None,
                })?;
            if is_internal_id(id) || node.attribute("type") == Some("internal") {
                continue;
            }

            let mut incoming: Vec<String> = Vec::new();
            for lane in node.attribute("incLanes").unwrap_or("").split_whitespace() {
                if is_internal_id(lane) {
                    continue;
                }
                let edge = lane_to_edge(lane);
                if !incoming.iter().any(|e| e == edge) {
                    incoming.push(edge.to_string());
                }
            }

            topology
                .intersection_ix
                .insert(id.to_string(), topology.intersections.len());
            topology.intersections.push(Intersection {
                id: id.to_string(),
                incoming,
                outgoing: vec![],
            });
        }

        for node in root.children().filter(|n| n.has_tag_name("edge")) {
            let id = node.attribute("id").ok_or(TopologyError::MissingAttribute {
                element: "edge",
                attribute: "id",
                id: None,
            })?;
            if is_internal_id(id) || node.attribute("function") == Some("internal") {
                continue;
            }
            let missing = |attribute| TopologyError::MissingAttribute {
                element: "edge",
                attribute,
                id: Some(id.to_string()),
            };
            let from = node.attribute("from").ok_or_else(|| missing("from"))?;
            let to = node.attribute("to").ok_or_else(|| missing("to"))?;

            if let Some(&ix) = topology.intersection_ix.get(from) {
                topology.intersections[ix].outgoing.push(id.to_string());
            }
            topology.link_ix.insert(id.to_string(), topology.links.len());
            topology.links.push(Link {
                id: id.to_string(),
                from: from.to_string(),
                to: to.to_string(),
            });
        }

        Ok(topology)
    }

    /// Intersections in document order.
    pub fn intersections(&self) -> &[Intersection] {
        &self.intersections
    }

    /// Links in document order.
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Returns the intersection at the given index.
    pub fn intersection(&self, ix: usize) -> Option<&Intersection> {
        self.intersections.get(ix)
    }

    /// Returns the index of the intersection with the given id.
    pub fn intersection_index(&self, id: &str) -> Option<usize> {
        self.intersection_ix.get(id).copied()
    }

    /// Returns the link with the given id.
    pub fn link(&self, id: &str) -> Option<&Link> {
        self.link_ix.get(id).map(|&ix| &self.links[ix])
    }

    /// Resolves the intersection a lane leads into.
    ///
    /// Returns `None` if the lane's edge is unknown or its destination is not an
    /// intersection of the network.
    pub fn destination_of_lane(&self, lane: &str) -> Option<usize> {
        self.link(lane_to_edge(lane))
            .and_then(|link| self.intersection_index(&link.to))
    }
}
