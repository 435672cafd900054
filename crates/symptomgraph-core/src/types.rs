use serde::{Deserialize, Serialize};
use std::fmt;

/// Semantic type label that marks a concept as a symptom.
pub const SIGN_OR_SYMPTOM: &str = "Sign or Symptom";

/// Granularity of an ontology entity reachable through a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    AtomCluster,
    Atom,
    Concept,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntityKind::AtomCluster => "atom cluster",
            EntityKind::Atom => "atom",
            EntityKind::Concept => "concept",
        };
        write!(f, "{}", s)
    }
}

/// `classType` of a relation as reported by the ontology service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RelationKind {
    AtomClusterRelation,
    AtomRelation,
    ConceptRelation,
    Other(String),
}

impl RelationKind {
    /// Entity kind the relation points at; `None` means the relation is not traversed.
    pub fn target(&self) -> Option<EntityKind> {
        match self {
            RelationKind::AtomClusterRelation => Some(EntityKind::AtomCluster),
            RelationKind::AtomRelation => Some(EntityKind::Atom),
            RelationKind::ConceptRelation => Some(EntityKind::Concept),
            RelationKind::Other(_) => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            RelationKind::AtomClusterRelation => "AtomClusterRelation",
            RelationKind::AtomRelation => "AtomRelation",
            RelationKind::ConceptRelation => "ConceptRelation",
            RelationKind::Other(s) => s.as_str(),
        }
    }
}

impl Default for RelationKind {
    fn default() -> Self {
        RelationKind::Other(String::new())
    }
}

impl From<String> for RelationKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "AtomClusterRelation" => RelationKind::AtomClusterRelation,
            "AtomRelation" => RelationKind::AtomRelation,
            "ConceptRelation" => RelationKind::ConceptRelation,
            _ => RelationKind::Other(s),
        }
    }
}

impl From<RelationKind> for String {
    fn from(kind: RelationKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Back-reference to the entity that first led the traversal to another entity.
///
/// Holds only the discoverer's id, never the discoverer itself, so entity
/// records stay acyclic and cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Provenance {
    Relation(String),
    AtomCluster(String),
    Atom(String),
}

/// Common surface of the entities flowing through the traversal.
pub trait OntologyEntity {
    /// Stable remote identifier ("UI"), the dedup key.
    fn id(&self) -> &str;

    fn provenance(&self) -> Option<&Provenance>;

    /// Sets provenance unless it is already set. Returns whether this call set it.
    fn attach_provenance(&mut self, provenance: Provenance) -> bool;
}

macro_rules! impl_ontology_entity {
    ($ty:ty) => {
        impl OntologyEntity for $ty {
            fn id(&self) -> &str {
                &self.id
            }

            fn provenance(&self) -> Option<&Provenance> {
                self.discovered_by.as_ref()
            }

            fn attach_provenance(&mut self, provenance: Provenance) -> bool {
                if self.discovered_by.is_some() {
                    return false;
                }
                self.discovered_by = Some(provenance);
                true
            }
        }
    };
}

/// Candidate returned by the root concept search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootConcept {
    #[serde(rename = "ui")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "rootSource")]
    pub root_source: String,
    #[serde(default)]
    pub uri: String,
}

/// One edge discovered from a source concept.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relation {
    #[serde(rename = "ui")]
    pub id: String,
    #[serde(rename = "classType", default)]
    pub kind: RelationKind,
    /// Locator (URL) of the entity the relation points at.
    #[serde(default)]
    pub related_id: String,
    #[serde(default)]
    pub related_id_name: String,
    /// Locator of the concept the relation was listed for.
    #[serde(rename = "relatedFromId", default)]
    pub source_id: String,
    #[serde(default)]
    pub related_from_id_name: String,
    #[serde(default)]
    pub source_ui: String,
    #[serde(default)]
    pub relation_label: String,
    #[serde(default)]
    pub additional_relation_label: String,
    #[serde(default)]
    pub root_source: String,
    #[serde(default)]
    pub group_id: String,
    #[serde(default)]
    pub attribute_count: u32,
    #[serde(default)]
    pub suppressible: bool,
    #[serde(default)]
    pub obsolete: bool,
    #[serde(default)]
    pub source_originated: bool,
}

/// Intermediate grouping node.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtomCluster {
    #[serde(rename = "ui")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Locator of the atom expanded next.
    #[serde(rename = "defaultPreferredAtom", default)]
    pub default_preferred_atom: String,
    #[serde(default)]
    pub class_type: String,
    #[serde(default)]
    pub root_source: String,
    #[serde(default)]
    pub atom_count: u32,
    #[serde(default)]
    pub suppressible: bool,
    #[serde(default)]
    pub obsolete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovered_by: Option<Provenance>,
}

/// Concrete lexical entry from a source vocabulary.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Atom {
    #[serde(rename = "ui")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Locator of the concept this atom belongs to.
    #[serde(rename = "concept", default)]
    pub concept: String,
    #[serde(default)]
    pub class_type: String,
    #[serde(default)]
    pub root_source: String,
    #[serde(default)]
    pub term_type: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub source_concept: String,
    #[serde(default)]
    pub source_descriptor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovered_by: Option<Provenance>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SemanticType {
    pub name: String,
    #[serde(default)]
    pub uri: String,
}

/// Terminal node of the traversal.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Concept {
    #[serde(rename = "ui")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Ordered; the first entry is the concept's primary category.
    #[serde(default)]
    pub semantic_types: Vec<SemanticType>,
    #[serde(default)]
    pub class_type: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub date_added: String,
    #[serde(default)]
    pub major_revision_date: String,
    #[serde(default)]
    pub default_preferred_atom: String,
    #[serde(default)]
    pub atom_count: u32,
    #[serde(default)]
    pub relation_count: u32,
    #[serde(default)]
    pub suppressible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovered_by: Option<Provenance>,
}

impl Concept {
    pub fn primary_semantic_type(&self) -> Option<&str> {
        self.semantic_types.first().map(|t| t.name.as_str())
    }
}

impl_ontology_entity!(AtomCluster);
impl_ontology_entity!(Atom);
impl_ontology_entity!(Concept);

/// A fetched entity, typed by the kind the caller asked for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Entity {
    AtomCluster(AtomCluster),
    Atom(Atom),
    Concept(Concept),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::AtomCluster(_) => EntityKind::AtomCluster,
            Entity::Atom(_) => EntityKind::Atom,
            Entity::Concept(_) => EntityKind::Concept,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Entity::AtomCluster(e) => e.id(),
            Entity::Atom(e) => e.id(),
            Entity::Concept(e) => e.id(),
        }
    }

    pub fn attach_provenance(&mut self, provenance: Provenance) -> bool {
        match self {
            Entity::AtomCluster(e) => e.attach_provenance(provenance),
            Entity::Atom(e) => e.attach_provenance(provenance),
            Entity::Concept(e) => e.attach_provenance(provenance),
        }
    }

    /// Decodes a raw `result` payload into the entity kind the caller expects.
    pub fn from_value(kind: EntityKind, value: serde_json::Value) -> crate::Result<Self> {
        Ok(match kind {
            EntityKind::AtomCluster => Entity::AtomCluster(serde_json::from_value(value)?),
            EntityKind::Atom => Entity::Atom(serde_json::from_value(value)?),
            EntityKind::Concept => Entity::Concept(serde_json::from_value(value)?),
        })
    }
}
