//! Persistence for prebuilt HNSW graphs.
//!
//! A built [`HnswGraph`] can be encoded into a portable, versioned binary
//! blob and later reconstructed without re-running the construction
//! algorithm. Decoding reproduces the graph topology bit-for-bit, so a
//! decoded graph paired with its original dataset yields search results
//! identical to the graph it was encoded from.
//!
//! # Blob Layout
//!
//! ```text
//! [MAGIC 8B "SWPREBLT"][VERSION u32][PAYLOAD_LEN u32][CHECKSUM u32]
//! [PAYLOAD bincode: dimension, count, metric, max_connections,
//!  layer_scale, entry_point, per-layer (node, neighbors) lists]
//! ```
//!
//! The construction parameters recorded in the blob describe how the graph
//! was built; decoding does not depend on them beyond validation.

mod format;

pub use format::{BlobHeader, FORMAT_VERSION, MAGIC};

use crate::error::{Result, SmallworldError};
use crate::index::hnsw::HnswGraph;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::path::Path;

/// Serialized graph payload. Field order mirrors the documented layout.
#[derive(Serialize, Deserialize)]
struct GraphRecord {
    dimension: u64,
    count: u64,
    metric: String,
    max_connections: u32,
    layer_scale: f64,
    entry_point: Option<u32>,
    /// Per layer (ascending from 0): nodes present at that layer, in
    /// ascending id order, each with its neighbor list.
    layers: Vec<Vec<(u32, Vec<u32>)>>,
}

/// Encode a graph into a self-contained blob.
pub fn encode_graph(graph: &HnswGraph) -> Result<Vec<u8>> {
    let layer_count = if graph.is_empty() {
        0
    } else {
        graph.max_layer() + 1
    };

    let mut layers = Vec::with_capacity(layer_count);
    for layer in 0..layer_count {
        let mut entries = Vec::new();
        for node in 0..graph.len() as u32 {
            if graph.node_top_layer(node) >= layer {
                entries.push((node, graph.neighbors(node, layer).to_vec()));
            }
        }
        layers.push(entries);
    }

    let record = GraphRecord {
        dimension: graph.dimension() as u64,
        count: graph.len() as u64,
        metric: graph.metric().to_string(),
        max_connections: graph.max_connections() as u32,
        layer_scale: graph.layer_scale(),
        entry_point: graph.entry_point(),
        layers,
    };

    let payload = bincode::serialize(&record)?;
    let payload_len = u32::try_from(payload.len())
        .map_err(|_| SmallworldError::corrupt_prebuilt("payload exceeds format limits"))?;
    let header = BlobHeader::new(payload_len, crc32fast::hash(&payload));

    let mut blob = Vec::with_capacity(BlobHeader::SIZE + payload.len());
    blob.extend_from_slice(&header.to_bytes());
    blob.extend_from_slice(&payload);
    Ok(blob)
}

/// Decode a blob back into a graph.
///
/// This is a direct structural reconstruction; the construction algorithm is
/// never re-run. All structural invariants are revalidated, and any
/// violation fails the whole decode with `CorruptPrebuilt`; no partial
/// graph is ever returned. Blobs from a newer format version fail with
/// `UnsupportedVersion`.
pub fn decode_graph(blob: &[u8]) -> Result<HnswGraph> {
    let header = BlobHeader::from_bytes(blob)?;
    let payload = &blob[BlobHeader::SIZE..];
    if payload.len() != header.payload_len as usize {
        return Err(SmallworldError::corrupt_prebuilt(format!(
            "payload length {} does not match header ({})",
            payload.len(),
            header.payload_len
        )));
    }
    if crc32fast::hash(payload) != header.checksum {
        return Err(SmallworldError::corrupt_prebuilt("checksum mismatch"));
    }

    let record: GraphRecord = bincode::deserialize(payload)?;
    reconstruct(record)
}

fn reconstruct(record: GraphRecord) -> Result<HnswGraph> {
    let count = usize::try_from(record.count)
        .map_err(|_| SmallworldError::corrupt_prebuilt("node count exceeds address space"))?;

    let mut nodes = vec![crate::index::hnsw::NodeLinks::default(); count];
    for (layer, entries) in record.layers.iter().enumerate() {
        for (node, neighbors) in entries {
            let idx = *node as usize;
            if idx >= count {
                return Err(SmallworldError::corrupt_prebuilt(format!(
                    "layer {} lists out-of-range node {}",
                    layer, node
                )));
            }
            // Membership must be contiguous from layer 0 up to the node's
            // top layer; a gap or repeat means the stored per-node layer
            // assignment is inconsistent
            if nodes[idx].layers.len() != layer {
                return Err(SmallworldError::corrupt_prebuilt(format!(
                    "node {} has inconsistent layer assignments",
                    node
                )));
            }
            nodes[idx]
                .layers
                .push(SmallVec::from_iter(neighbors.iter().copied()));
        }
    }

    let layer0_count = record.layers.first().map(|l| l.len()).unwrap_or(0);
    if layer0_count != count {
        return Err(SmallworldError::corrupt_prebuilt(format!(
            "declared node count {} does not match {} layer-0 entries",
            count, layer0_count
        )));
    }

    let graph = HnswGraph {
        dimension: record.dimension as usize,
        metric: record.metric,
        max_connections: record.max_connections as usize,
        layer_scale: record.layer_scale,
        entry_point: record.entry_point,
        max_layer: record.layers.len().saturating_sub(1),
        nodes,
    };
    graph.validate()?;
    Ok(graph)
}

/// Encode `graph` and write the blob to `path`.
pub fn save_graph(path: impl AsRef<Path>, graph: &HnswGraph) -> Result<()> {
    use std::io::Write;

    let blob = encode_graph(graph)?;
    let mut file = std::fs::File::create(path)?;
    file.write_all(&blob)?;
    file.sync_all()?;
    Ok(())
}

/// Read a blob from `path` and decode it.
pub fn load_graph(path: impl AsRef<Path>) -> Result<HnswGraph> {
    let blob = std::fs::read(path)?;
    decode_graph(&blob)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::MetricRegistry;
    use crate::index::hnsw::{HnswBuilder, HnswConfig, NodeId};
    use crate::matrix::DenseMatrix;

    fn build_graph(rows: usize) -> HnswGraph {
        let data = DenseMatrix::from_flat(
            4,
            (0..rows * 4).map(|x| (x as f32).sin()).collect(),
        )
        .unwrap();
        let builder = HnswBuilder::new(HnswConfig::default()).unwrap();
        let index = builder
            .build(&MetricRegistry::with_builtins(), data)
            .unwrap();
        index.graph().clone()
    }

    fn assert_same_topology(a: &HnswGraph, b: &HnswGraph) {
        assert_eq!(a.len(), b.len());
        assert_eq!(a.dimension(), b.dimension());
        assert_eq!(a.metric(), b.metric());
        assert_eq!(a.max_connections(), b.max_connections());
        assert_eq!(a.layer_scale(), b.layer_scale());
        assert_eq!(a.entry_point(), b.entry_point());
        assert_eq!(a.max_layer(), b.max_layer());
        for node in 0..a.len() as NodeId {
            assert_eq!(a.node_top_layer(node), b.node_top_layer(node));
            for layer in 0..=a.node_top_layer(node) {
                assert_eq!(a.neighbors(node, layer), b.neighbors(node, layer));
            }
        }
    }

    #[test]
    fn test_roundtrip_preserves_topology() {
        let graph = build_graph(150);
        let blob = encode_graph(&graph).unwrap();
        let decoded = decode_graph(&blob).unwrap();
        assert_same_topology(&graph, &decoded);
    }

    #[test]
    fn test_roundtrip_empty_graph() {
        let graph = build_graph(0);
        assert!(graph.entry_point().is_none());
        let blob = encode_graph(&graph).unwrap();
        let decoded = decode_graph(&blob).unwrap();
        assert!(decoded.is_empty());
        assert!(decoded.entry_point().is_none());
    }

    #[test]
    fn test_corrupt_payload_detected() {
        let graph = build_graph(50);
        let mut blob = encode_graph(&graph).unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0xFF;
        let err = decode_graph(&blob).unwrap_err();
        assert!(matches!(err, SmallworldError::CorruptPrebuilt(_)));
    }

    #[test]
    fn test_truncated_blob_detected() {
        let graph = build_graph(50);
        let blob = encode_graph(&graph).unwrap();
        let err = decode_graph(&blob[..blob.len() - 8]).unwrap_err();
        assert!(matches!(err, SmallworldError::CorruptPrebuilt(_)));
    }

    #[test]
    fn test_newer_version_rejected() {
        let graph = build_graph(10);
        let mut blob = encode_graph(&graph).unwrap();
        blob[8..12].copy_from_slice(&(FORMAT_VERSION + 1).to_le_bytes());
        let err = decode_graph(&blob).unwrap_err();
        assert!(matches!(err, SmallworldError::UnsupportedVersion { .. }));
    }

    fn seal(record: &GraphRecord) -> Vec<u8> {
        let payload = bincode::serialize(record).unwrap();
        let header = BlobHeader::new(payload.len() as u32, crc32fast::hash(&payload));
        let mut blob = header.to_bytes().to_vec();
        blob.extend_from_slice(&payload);
        blob
    }

    #[test]
    fn test_out_of_range_neighbor_rejected() {
        let record = GraphRecord {
            dimension: 2,
            count: 2,
            metric: "squared_euclidean".to_string(),
            max_connections: 4,
            layer_scale: 0.5,
            entry_point: Some(0),
            layers: vec![vec![(0, vec![9]), (1, vec![0])]],
        };
        let err = decode_graph(&seal(&record)).unwrap_err();
        assert!(matches!(err, SmallworldError::CorruptPrebuilt(_)));
    }

    #[test]
    fn test_inconsistent_layer_assignment_rejected() {
        // Node 1 appears at layer 1 without appearing at layer 0
        let record = GraphRecord {
            dimension: 2,
            count: 2,
            metric: "squared_euclidean".to_string(),
            max_connections: 4,
            layer_scale: 0.5,
            entry_point: Some(0),
            layers: vec![vec![(0, vec![])], vec![(1, vec![])]],
        };
        let err = decode_graph(&seal(&record)).unwrap_err();
        assert!(matches!(err, SmallworldError::CorruptPrebuilt(_)));
    }

    #[test]
    fn test_count_mismatch_rejected() {
        let record = GraphRecord {
            dimension: 2,
            count: 3,
            metric: "squared_euclidean".to_string(),
            max_connections: 4,
            layer_scale: 0.5,
            entry_point: Some(0),
            layers: vec![vec![(0, vec![1]), (1, vec![0])]],
        };
        let err = decode_graph(&seal(&record)).unwrap_err();
        assert!(matches!(err, SmallworldError::CorruptPrebuilt(_)));
    }

    #[test]
    fn test_file_roundtrip() {
        let graph = build_graph(80);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.swp");

        save_graph(&path, &graph).unwrap();
        let loaded = load_graph(&path).unwrap();
        assert_same_topology(&graph, &loaded);
    }
}
