use std::collections::{BTreeMap, HashSet};

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Free-form property bag attached to nodes and relationships.
pub type Properties = BTreeMap<String, Value>;

#[derive(Debug, Error)]
pub enum DocumentError {
	#[error("graph document is not valid JSON: {0}")]
	Json(#[from] serde_json::Error),
	#[error("duplicate {kind} id `{id}`")]
	DuplicateId { kind: &'static str, id: String },
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq)]
pub struct Position {
	pub x: f64,
	pub y: f64,
	#[serde(default)]
	pub fixed: bool,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
	pub id: String,
	pub label: String,
	#[serde(rename = "type")]
	pub node_type: String,
	#[serde(default)]
	pub properties: Properties,
	#[serde(default)]
	pub position: Option<Position>,
	#[serde(default)]
	pub animation_stage: Option<usize>,
	#[serde(default)]
	pub animation_order: Option<usize>,
	#[serde(default)]
	pub animation_delay: Option<f64>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphRelationship {
	pub id: String,
	pub source: String,
	pub target: String,
	#[serde(rename = "type")]
	pub rel_type: String,
	#[serde(default)]
	pub properties: Properties,
	#[serde(default)]
	pub animation_stage: Option<usize>,
	#[serde(default)]
	pub animation_order: Option<usize>,
	#[serde(default)]
	pub animation_delay: Option<f64>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphMetadata {
	#[serde(default)]
	pub version: String,
	#[serde(default)]
	pub created: String,
	#[serde(default)]
	pub description: String,
	#[serde(default)]
	pub node_types: Vec<String>,
	#[serde(default)]
	pub relationship_types: Vec<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct GraphDocument {
	pub nodes: Vec<GraphNode>,
	pub relationships: Vec<GraphRelationship>,
	#[serde(default)]
	pub metadata: GraphMetadata,
}

impl GraphDocument {
	/// Parse a document and reject duplicate node or relationship ids.
	pub fn from_json(raw: &str) -> Result<Self, DocumentError> {
		let doc: GraphDocument = serde_json::from_str(raw)?;
		doc.check_unique_ids()?;
		Ok(doc)
	}

	fn check_unique_ids(&self) -> Result<(), DocumentError> {
		let mut seen = HashSet::new();
		for node in &self.nodes {
			if !seen.insert(node.id.as_str()) {
				return Err(DocumentError::DuplicateId {
					kind: "node",
					id: node.id.clone(),
				});
			}
		}
		seen.clear();
		for rel in &self.relationships {
			if !seen.insert(rel.id.as_str()) {
				return Err(DocumentError::DuplicateId {
					kind: "relationship",
					id: rel.id.clone(),
				});
			}
		}
		Ok(())
	}

	pub fn node(&self, id: &str) -> Option<&GraphNode> {
		self.nodes.iter().find(|n| n.id == id)
	}

	pub fn relationship(&self, id: &str) -> Option<&GraphRelationship> {
		self.relationships.iter().find(|r| r.id == id)
	}

	/// Palette slot for a node type, following the metadata's declared order.
	pub fn type_index(&self, node_type: &str) -> usize {
		self.metadata
			.node_types
			.iter()
			.position(|t| t == node_type)
			.unwrap_or(self.metadata.node_types.len())
	}

	/// Highest declared stage; 0 for a document without stages.
	pub fn max_stage(&self) -> usize {
		let nodes = self.nodes.iter().map(|n| n.animation_stage);
		let rels = self.relationships.iter().map(|r| r.animation_stage);
		nodes.chain(rels).flatten().max().unwrap_or(0)
	}
}

/// Handle for one revealable element of a document.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementRef {
	Node(String),
	Edge(String),
}

impl ElementRef {
	pub fn id(&self) -> &str {
		match self {
			ElementRef::Node(id) | ElementRef::Edge(id) => id,
		}
	}
}
