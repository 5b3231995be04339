//! Binary snapshot format for the vector store.
//!
//! Layout:
//!   - 4 bytes: magic `DAVS`
//!   - 1 byte: format version
//!   - 1 byte: flags (bit 0 = zstd-compressed body)
//!   - N bytes: msgpack-encoded collections, optionally zstd-compressed

use serde::{Deserialize, Serialize};

use crate::collection::Collection;
use crate::error::StoreError;

const MAGIC: &[u8; 4] = b"DAVS";
const VERSION: u8 = 1;
const FLAG_ZSTD: u8 = 0b0000_0001;
const HEADER_LEN: usize = 6;
const ZSTD_LEVEL: i32 = 3;

#[derive(Serialize, Deserialize)]
struct SnapshotBody {
    collections: Vec<Collection>,
}

pub fn encode(collections: Vec<Collection>, compress: bool) -> Result<Vec<u8>, StoreError> {
    let body = rmp_serde::to_vec_named(&SnapshotBody { collections })
        .map_err(|e| StoreError::Snapshot(e.to_string()))?;

    let (flags, payload) = if compress {
        (FLAG_ZSTD, zstd::encode_all(body.as_slice(), ZSTD_LEVEL)?)
    } else {
        (0, body)
    };

    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(MAGIC);
    out.push(VERSION);
    out.push(flags);
    out.extend_from_slice(&payload);
    Ok(out)
}

pub fn decode(bytes: &[u8]) -> Result<Vec<Collection>, StoreError> {
    if bytes.len() < HEADER_LEN || &bytes[..4] != MAGIC {
        return Err(StoreError::Snapshot("not a vector store snapshot".to_string()));
    }
    let version = bytes[4];
    if version != VERSION {
        return Err(StoreError::Snapshot(format!("unsupported snapshot version {version}")));
    }

    let payload = &bytes[HEADER_LEN..];
    let body = if bytes[5] & FLAG_ZSTD != 0 {
        zstd::decode_all(payload)?
    } else {
        payload.to_vec()
    };

    let snapshot: SnapshotBody =
        rmp_serde::from_slice(&body).map_err(|e| StoreError::Snapshot(e.to_string()))?;

    Ok(snapshot
        .collections
        .into_iter()
        .map(|mut c| {
            c.reindex();
            c
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::StoredDocument;

    fn sample() -> Vec<Collection> {
        let mut c = Collection::new("docs");
        let mut metadata = indexmap::IndexMap::new();
        metadata.insert("section".to_string(), "Scope".to_string());
        metadata.insert("level".to_string(), "2".to_string());
        c.upsert(StoredDocument {
            id: "abc".into(),
            content: "text".into(),
            metadata,
            embedding: vec![0.6, 0.8],
        });
        vec![c]
    }

    #[test]
    fn compressed_snapshot_restores_lookup() {
        let bytes = encode(sample(), true).unwrap();
        assert_eq!(&bytes[..4], MAGIC);
        assert_eq!(bytes[5], FLAG_ZSTD);

        let restored = decode(&bytes).unwrap();
        assert_eq!(restored[0].name(), "docs");
        let doc = restored[0].get("abc").unwrap();
        let keys: Vec<&str> = doc.metadata.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["section", "level"]);
    }

    #[test]
    fn rejects_foreign_bytes() {
        assert!(matches!(decode(b"PK\x03\x04rest"), Err(StoreError::Snapshot(_))));
        assert!(matches!(decode(b"DA"), Err(StoreError::Snapshot(_))));
    }

    #[test]
    fn rejects_future_version() {
        let mut bytes = encode(sample(), false).unwrap();
        bytes[4] = VERSION + 1;
        assert!(matches!(decode(&bytes), Err(StoreError::Snapshot(_))));
    }
}
