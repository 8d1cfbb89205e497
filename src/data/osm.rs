#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    Node,
    Way,
    Relation,
}

impl ElementType {
    pub fn from_tag_name(name: &[u8]) -> Option<ElementType> {
        match name {
            b"node" => Some(ElementType::Node),
            b"way" => Some(ElementType::Way),
            b"relation" => Some(ElementType::Relation),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ElementType::Node => "node",
            ElementType::Way => "way",
            ElementType::Relation => "relation",
        }
    }

    /// Relations are streamed for their tags but never turned into records.
    pub fn is_shapeable(&self) -> bool {
        matches!(self, ElementType::Node | ElementType::Way)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Tag {
        Tag {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Who created an element and when, copied verbatim from the element attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Provenance {
    pub changeset: Option<String>,
    pub uid: Option<String>,
    pub user: Option<String>,
    pub version: Option<String>,
    pub timestamp: Option<String>,
}

impl Provenance {
    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("changeset", &self.changeset),
            ("uid", &self.uid),
            ("user", &self.user),
            ("version", &self.version),
            ("timestamp", &self.timestamp),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.as_deref().map(|value| (name, value)))
    }
}

/// A node, way or relation as it appears in the .osm file. Attribute values are
/// kept as raw strings; coercion happens when the element is shaped.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub element_type: ElementType,
    pub id: Option<String>,
    pub lat: Option<String>,
    pub lon: Option<String>,
    pub visible: Option<String>,
    pub created: Provenance,
    pub node_refs: Vec<String>,
    pub tags: Vec<Tag>,
}

impl Element {
    pub fn new(element_type: ElementType) -> Element {
        Element {
            element_type,
            id: None,
            lat: None,
            lon: None,
            visible: None,
            created: Provenance::default(),
            node_refs: Vec::new(),
            tags: Vec::new(),
        }
    }
}

#[cfg(test)]
impl Element {
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.iter()
            .find(|tag| tag.key == key)
            .map(|tag| tag.value.as_str())
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Element {
        self.id = Some(id.into());
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Element {
        self.tags.push(Tag::new(key, value));
        self
    }
}
