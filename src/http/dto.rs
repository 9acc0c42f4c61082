//! Wire types for the discovery HTTP surface.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::store::link_store::Link;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReferenceKey {
    #[serde(rename = "type")]
    pub key_type: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reference {
    #[serde(rename = "type")]
    pub reference_type: String,
    pub keys: Vec<ReferenceKey>,
    #[serde(rename = "referredSemanticId", skip_serializing_if = "Option::is_none")]
    pub referred_semantic_id: Option<Box<Reference>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpecificAssetId {
    pub name: String,
    pub value: String,
    #[serde(rename = "externalSubjectId", skip_serializing_if = "Option::is_none")]
    pub external_subject_id: Option<Reference>,
    #[serde(rename = "semanticId", skip_serializing_if = "Option::is_none")]
    pub semantic_id: Option<Reference>,
}

impl From<&SpecificAssetId> for Link {
    fn from(id: &SpecificAssetId) -> Self {
        Link {
            name: id.name.clone(),
            value: id.value.clone(),
        }
    }
}

impl From<Link> for SpecificAssetId {
    fn from(link: Link) -> Self {
        SpecificAssetId {
            name: link.name,
            value: link.value,
            external_subject_id: None,
            semantic_id: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PagingMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LookupResult {
    #[serde(rename = "pagingMetadata")]
    pub paging_metadata: PagingMetadata,
    pub result: Vec<String>,
}

/// Decodes a base64url `aasIdentifier` path segment into its original
/// string form.
pub fn decode_aas_identifier(encoded: &str) -> Result<String, AppError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|e| AppError::bad_request("http", "decode_identifier", format!("invalid base64url: {e}")))?;
    String::from_utf8(bytes)
        .map_err(|e| AppError::bad_request("http", "decode_identifier", format!("invalid utf-8: {e}")))
}

pub fn encode_aas_identifier(aas_id: &str) -> String {
    URL_SAFE_NO_PAD.encode(aas_id.as_bytes())
}

/// Decodes one `assetIds` query entry: the base64url encoding of a
/// JSON-serialized `SpecificAssetId` (or any object with at least
/// `name` and `value`).
pub fn decode_asset_id(encoded: &str) -> Result<SpecificAssetId, AppError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|e| AppError::bad_request("http", "decode_asset_id", format!("invalid base64url: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| AppError::bad_request("http", "decode_asset_id", format!("invalid asset id json: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aas_identifier_roundtrips() {
        let id = "https://example.com/ids/aas/42";
        let encoded = encode_aas_identifier(id);
        assert_eq!(decode_aas_identifier(&encoded).unwrap(), id);
    }

    #[test]
    fn asset_id_decodes_minimal_object() {
        let encoded = URL_SAFE_NO_PAD.encode(br#"{"name":"globalAssetId","value":"urn:asset:7"}"#);
        let decoded = decode_asset_id(&encoded).unwrap();
        assert_eq!(decoded.name, "globalAssetId");
        assert_eq!(decoded.value, "urn:asset:7");
    }

    #[test]
    fn bad_base64_is_bad_request() {
        assert!(decode_aas_identifier("not-valid-base64!!!").is_err());
    }
}
