use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::Error;

const VERSION_TAG: &str = "v1";

/// Mask applied when folding an instance id into an item id.
const UNPACK_MASK: u64 = 0x7fff_ffff_ffff_ffff;

/// What a durable identifier points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IdentifierKind {
    /// No durable backing (transient or unsaved item)
    Null,
    /// An asset imported into the project
    ImportedAsset,
    /// An entity living inside a container (document or template)
    ContainerEntity,
    /// A source asset that is not imported
    SourceAsset,
}

impl IdentifierKind {
    pub fn tag(self) -> u8 {
        match self {
            IdentifierKind::Null => 0,
            IdentifierKind::ImportedAsset => 1,
            IdentifierKind::ContainerEntity => 2,
            IdentifierKind::SourceAsset => 3,
        }
    }

    pub fn from_tag(tag: u8) -> Result<Self, Error> {
        match tag {
            0 => Ok(IdentifierKind::Null),
            1 => Ok(IdentifierKind::ImportedAsset),
            2 => Ok(IdentifierKind::ContainerEntity),
            3 => Ok(IdentifierKind::SourceAsset),
            other => Err(Error::Identifier(format!(
                "Unknown identifier kind tag: {}",
                other
            ))),
        }
    }
}

/// 128-bit container identifier, rendered as 32 lowercase hex chars
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ContainerGuid([u8; 16]);

impl ContainerGuid {
    pub const NIL: ContainerGuid = ContainerGuid([0; 16]);

    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        ContainerGuid(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    pub fn is_nil(&self) -> bool {
        *self == Self::NIL
    }

    pub fn parse(s: &str) -> Result<Self, Error> {
        let bytes = hex::decode(s)
            .map_err(|e| Error::Identifier(format!("Invalid container guid {:?}: {}", s, e)))?;
        let bytes: [u8; 16] = bytes.try_into().map_err(|_| {
            Error::Identifier(format!("Container guid must be 32 hex chars: {:?}", s))
        })?;
        Ok(ContainerGuid(bytes))
    }
}

impl fmt::Display for ContainerGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Durable, comparable identifier of an item.
///
/// Encoded as `v1-{kind}-{container}-{item_id}-{instance_id}`:
/// - `kind`: [`IdentifierKind`] tag
/// - `container`: guid of the asset/document/template that holds the item
/// - `item_id`: stable per-item id
/// - `instance_id`: non-zero only for items inside an instantiated copy of a template
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DurableId {
    kind: IdentifierKind,
    container: ContainerGuid,
    item_id: u64,
    instance_id: u64,
}

impl DurableId {
    /// Sentinel for handles without durable backing
    pub const NULL: DurableId = DurableId {
        kind: IdentifierKind::Null,
        container: ContainerGuid::NIL,
        item_id: 0,
        instance_id: 0,
    };

    pub fn new(kind: IdentifierKind, container: ContainerGuid, item_id: u64, instance_id: u64) -> Self {
        DurableId {
            kind,
            container,
            item_id,
            instance_id,
        }
    }

    pub fn kind(&self) -> IdentifierKind {
        self.kind
    }

    pub fn container(&self) -> ContainerGuid {
        self.container
    }

    pub fn item_id(&self) -> u64 {
        self.item_id
    }

    pub fn instance_id(&self) -> u64 {
        self.instance_id
    }

    pub fn is_null(&self) -> bool {
        self.kind == IdentifierKind::Null
    }

    /// Parse the string form produced by [`DurableId::encode`]
    pub fn parse(s: &str) -> Result<Self, Error> {
        let parts: Vec<&str> = s.split('-').collect();
        if parts.len() != 5 || parts[0] != VERSION_TAG {
            return Err(Error::Identifier(format!("Invalid durable id format: {}", s)));
        }

        let tag = parts[1]
            .parse::<u8>()
            .map_err(|_| Error::Identifier(format!("Invalid kind in durable id: {}", parts[1])))?;
        let kind = IdentifierKind::from_tag(tag)?;
        let container = ContainerGuid::parse(parts[2])?;
        let item_id = parts[3]
            .parse::<u64>()
            .map_err(|_| Error::Identifier(format!("Invalid item id in durable id: {}", parts[3])))?;
        let instance_id = parts[4].parse::<u64>().map_err(|_| {
            Error::Identifier(format!("Invalid instance id in durable id: {}", parts[4]))
        })?;

        Ok(DurableId {
            kind,
            container,
            item_id,
            instance_id,
        })
    }

    pub fn encode(&self) -> String {
        format!(
            "{}-{}-{}-{}-{}",
            VERSION_TAG,
            self.kind.tag(),
            self.container,
            self.item_id,
            self.instance_id
        )
    }

    /// Whether both ids denote the same logical item across scopes.
    ///
    /// Only `item_id` is compared: the container guid and the instance id are
    /// ignored so that an item recorded while editing a template matches the
    /// corresponding item of an instance of that template in a document. This
    /// rule is provisional; unrelated items sharing an item id will also match.
    pub fn same_logical_item(&self, other: &DurableId) -> bool {
        self.item_id == other.item_id
    }

    /// The same item re-scoped into another container
    pub fn with_container(&self, container: ContainerGuid) -> Self {
        DurableId {
            container,
            ..*self
        }
    }

    /// Fold the instance id into the item id, yielding the id the item has
    /// once its instance is unpacked into the enclosing container.
    pub fn unpacked(&self) -> Self {
        DurableId {
            item_id: (self.item_id ^ self.instance_id) & UNPACK_MASK,
            instance_id: 0,
            ..*self
        }
    }
}

impl Default for DurableId {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Display for DurableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for DurableId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DurableId::parse(s)
    }
}

impl TryFrom<String> for DurableId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        DurableId::parse(&s)
    }
}

impl From<DurableId> for String {
    fn from(id: DurableId) -> Self {
        id.encode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guid(byte: u8) -> ContainerGuid {
        ContainerGuid::from_bytes([byte; 16])
    }

    #[test]
    fn test_parse_entity_id() {
        let s = "v1-2-2fd19a05ecb802843bd51e0f33d4a32b-4983886930841126834-1308519948";
        let id = DurableId::parse(s).unwrap();

        assert_eq!(id.kind(), IdentifierKind::ContainerEntity);
        assert_eq!(id.container().to_string(), "2fd19a05ecb802843bd51e0f33d4a32b");
        assert_eq!(id.item_id(), 4983886930841126834);
        assert_eq!(id.instance_id(), 1308519948);
        assert_eq!(id.encode(), s);
    }

    #[test]
    fn test_null_sentinel() {
        let encoded = DurableId::NULL.encode();
        assert_eq!(encoded, "v1-0-00000000000000000000000000000000-0-0");

        let parsed = DurableId::parse(&encoded).unwrap();
        assert!(parsed.is_null());
        assert_eq!(parsed, DurableId::default());
    }

    #[test]
    fn test_parse_invalid_format() {
        assert!(DurableId::parse("").is_err());
        assert!(DurableId::parse("v1-2-abc").is_err());
        assert!(DurableId::parse("v2-1-00000000000000000000000000000000-1-0").is_err());
        assert!(DurableId::parse("v1-9-00000000000000000000000000000000-1-0").is_err());
        assert!(DurableId::parse("v1-1-zz000000000000000000000000000000-1-0").is_err());
        assert!(DurableId::parse("v1-1-0000-1-0").is_err());
        assert!(DurableId::parse("v1-1-00000000000000000000000000000000-x-0").is_err());
    }

    #[test]
    fn test_same_logical_item_ignores_container_and_instance() {
        let in_template = DurableId::new(IdentifierKind::ContainerEntity, guid(1), 42, 0);
        let in_document = DurableId::new(IdentifierKind::ContainerEntity, guid(2), 42, 77);
        let other = DurableId::new(IdentifierKind::ContainerEntity, guid(1), 43, 0);

        assert!(in_template.same_logical_item(&in_document));
        assert!(!in_template.same_logical_item(&other));
        assert_ne!(in_template, in_document);
    }

    #[test]
    fn test_with_container() {
        let id = DurableId::new(IdentifierKind::ContainerEntity, guid(2), 42, 77);
        let rescoped = id.with_container(guid(9));

        assert_eq!(rescoped.container(), guid(9));
        assert_eq!(rescoped.item_id(), 42);
        assert_eq!(rescoped.instance_id(), 77);
    }

    #[test]
    fn test_unpacked() {
        let id = DurableId::new(IdentifierKind::ContainerEntity, guid(3), 0b1100, 0b1010);
        let unpacked = id.unpacked();

        assert_eq!(unpacked.item_id(), 0b0110);
        assert_eq!(unpacked.instance_id(), 0);

        let high = DurableId::new(IdentifierKind::ContainerEntity, guid(3), u64::MAX, 0);
        assert_eq!(high.unpacked().item_id(), UNPACK_MASK);
    }

    #[test]
    fn test_serde_as_string() {
        let id = DurableId::new(IdentifierKind::ImportedAsset, guid(0xab), 7, 0);
        let yaml = serde_yaml::to_string(&id).unwrap();
        assert_eq!(yaml.trim(), id.encode());

        let back: DurableId = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_ordering_is_total() {
        let mut ids = vec![
            DurableId::new(IdentifierKind::ContainerEntity, guid(2), 1, 0),
            DurableId::new(IdentifierKind::ImportedAsset, guid(9), 5, 0),
            DurableId::new(IdentifierKind::ContainerEntity, guid(1), 8, 0),
        ];
        ids.sort();

        assert_eq!(ids[0].kind(), IdentifierKind::ImportedAsset);
        assert_eq!(ids[1].container(), guid(1));
        assert_eq!(ids[2].container(), guid(2));
    }
}
