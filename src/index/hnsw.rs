//! HNSW (Hierarchical Navigable Small World) index for approximate nearest
//! neighbor search.
//!
//! HNSW is a graph-based algorithm that provides excellent speed/recall
//! tradeoffs. It builds a multi-layer graph where higher layers contain fewer
//! nodes and enable fast long-range traversal.
//!
//! # Algorithm Overview
//!
//! - Each node is assigned a top layer drawn from an exponential distribution
//! - Layer 0 contains all nodes; higher layers are progressively sparser
//! - Search starts at the top layer and greedily descends to layer 0
//! - At layer 0, a bounded beam search collects the best candidates
//!
//! # Parameters
//!
//! - `max_connections` (M): neighbor cap per node above layer 0; layer 0
//!   allows 2M. Higher = better recall, more memory
//! - `ef_construction`: beam width during index building
//! - `ef_search`: beam width during search (effective width is at least k)
//!
//! The graph itself stores topology only; it borrows vectors from a
//! [`VectorSource`] and never copies the dataset.

use crate::constants::hnsw as defaults;
use crate::distance::{Distance, MetricRegistry, SQUARED_EUCLIDEAN};
use crate::error::{Result, SmallworldError};
use crate::index::traits::{Neighbor, VectorIndex};
use crate::matrix::VectorSource;
use parking_lot::RwLock;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use smallvec::SmallVec;
use std::cmp::{Ordering, Reverse};
use std::fmt;
use std::collections::BinaryHeap;
use std::sync::Arc;

/// Node identifier within a graph. Dense, `0..N`, in dataset row order.
pub type NodeId = u32;

/// A node with its computed distance, used for heap operations.
///
/// Orders by (distance, node id) so that heaps pop deterministically when
/// distances tie.
#[derive(Clone, Copy)]
struct Candidate {
    node: NodeId,
    distance: f32,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.distance == other.distance && self.node == other.node
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .partial_cmp(&other.distance)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.node.cmp(&other.node))
    }
}

/// Generation-stamped visited set for graph traversal.
///
/// Replaces `HashSet<NodeId>` with O(1) array indexing. Each `clear()`
/// increments a generation counter instead of zeroing the array, so repeated
/// searches only pay for a full memset every 255 clears.
struct VisitedSet {
    marks: Vec<u8>,
    generation: u8,
}

impl VisitedSet {
    fn new(capacity: usize) -> Self {
        Self {
            marks: vec![0u8; capacity],
            generation: 1,
        }
    }

    fn clear(&mut self) {
        if self.generation == u8::MAX {
            self.marks.fill(0);
            self.generation = 1;
        } else {
            self.generation += 1;
        }
    }

    /// Mark `node` as visited; returns true if it was not previously visited.
    #[inline]
    fn insert(&mut self, node: NodeId) -> bool {
        let mark = &mut self.marks[node as usize];
        if *mark == self.generation {
            false
        } else {
            *mark = self.generation;
            true
        }
    }
}

/// Per-node adjacency across layers. Index = layer; a node's fixed top layer
/// is `layers.len() - 1`.
#[derive(Debug, Clone, Default)]
pub(crate) struct NodeLinks {
    pub(crate) layers: Vec<SmallVec<[NodeId; 32]>>,
}

impl NodeLinks {
    fn with_top_layer(top: usize) -> Self {
        Self {
            layers: vec![SmallVec::new(); top + 1],
        }
    }
}

/// Configuration for HNSW graph construction.
#[derive(Debug, Clone)]
pub struct HnswConfig {
    /// Neighbor cap per node above layer 0 (the `M` parameter). Layer 0
    /// allows twice this many connections.
    pub max_connections: usize,
    /// Candidate-list size during construction.
    pub ef_construction: usize,
    /// Default candidate-list size during search; the effective beam width
    /// for a query is always at least k.
    pub ef_search: usize,
    /// Registered name of the distance metric.
    pub metric: String,
    /// Scale of the exponential layer distribution. `None` uses 1/ln(M).
    pub layer_scale: Option<f64>,
    /// Seed for the layer-assignment random stream. Builds with the same
    /// seed and dataset produce bit-identical topology.
    pub seed: u64,
    /// Construction parallelism hint. Values above 1 parallelize distance
    /// scoring within each insertion without changing the emitted topology.
    pub num_threads: usize,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            max_connections: defaults::DEFAULT_MAX_CONNECTIONS,
            ef_construction: defaults::DEFAULT_EF_CONSTRUCTION,
            ef_search: defaults::DEFAULT_EF_SEARCH,
            metric: SQUARED_EUCLIDEAN.to_string(),
            layer_scale: None,
            seed: defaults::DEFAULT_SEED,
            num_threads: 1,
        }
    }
}

impl HnswConfig {
    fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(SmallworldError::invalid_config(
                "max_connections must be at least 1",
            ));
        }
        if self.ef_construction == 0 {
            return Err(SmallworldError::invalid_config(
                "ef_construction must be at least 1",
            ));
        }
        if self.ef_search == 0 {
            return Err(SmallworldError::invalid_config(
                "ef_search must be at least 1",
            ));
        }
        if let Some(scale) = self.layer_scale {
            if !(scale > 0.0) || !scale.is_finite() {
                return Err(SmallworldError::invalid_config(
                    "layer_scale must be finite and positive",
                ));
            }
        }
        if self.metric.is_empty() {
            return Err(SmallworldError::invalid_config("metric name is empty"));
        }
        Ok(())
    }

    fn effective_layer_scale(&self) -> f64 {
        self.layer_scale
            .unwrap_or_else(|| 1.0 / (self.max_connections.max(2) as f64).ln())
    }
}

/// Immutable multi-layer navigable graph topology.
///
/// Owns node adjacency and the entry point, but no vector data; pair it with
/// the originating [`VectorSource`] via [`HnswIndex::from_graph`] to answer
/// queries. Once built (or decoded), a graph is never mutated.
#[derive(Debug, Clone)]
pub struct HnswGraph {
    pub(crate) dimension: usize,
    pub(crate) metric: String,
    pub(crate) max_connections: usize,
    pub(crate) layer_scale: f64,
    pub(crate) entry_point: Option<NodeId>,
    pub(crate) max_layer: usize,
    pub(crate) nodes: Vec<NodeLinks>,
}

impl HnswGraph {
    /// Number of nodes in the graph.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Return true if the graph holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Dimensionality the graph was built for.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Registered name of the construction metric.
    pub fn metric(&self) -> &str {
        &self.metric
    }

    /// The `M` construction parameter.
    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    /// Scale of the exponential layer distribution used at build time.
    pub fn layer_scale(&self) -> f64 {
        self.layer_scale
    }

    /// The node every search starts from, if any.
    pub fn entry_point(&self) -> Option<NodeId> {
        self.entry_point
    }

    /// Highest populated layer.
    pub fn max_layer(&self) -> usize {
        self.max_layer
    }

    /// The fixed top layer assigned to `node` at insertion time.
    pub fn node_top_layer(&self, node: NodeId) -> usize {
        self.nodes[node as usize].layers.len() - 1
    }

    /// Neighbors of `node` at `layer`; empty when the node does not reach
    /// that layer.
    #[inline]
    pub fn neighbors(&self, node: NodeId, layer: usize) -> &[NodeId] {
        self.nodes[node as usize]
            .layers
            .get(layer)
            .map(|l| l.as_slice())
            .unwrap_or(&[])
    }

    /// Revalidate structural invariants, as done when decoding a prebuilt
    /// blob. Violations surface as `CorruptPrebuilt`.
    pub(crate) fn validate(&self) -> Result<()> {
        let count = self.nodes.len() as u64;
        if self.nodes.is_empty() {
            if self.entry_point.is_some() {
                return Err(SmallworldError::corrupt_prebuilt(
                    "entry point set on an empty graph",
                ));
            }
            return Ok(());
        }

        let entry = match self.entry_point {
            Some(entry) => entry,
            None => {
                return Err(SmallworldError::corrupt_prebuilt(
                    "non-empty graph has no entry point",
                ))
            }
        };
        if u64::from(entry) >= count {
            return Err(SmallworldError::corrupt_prebuilt(format!(
                "entry point {} out of range (count {})",
                entry, count
            )));
        }
        if self.node_top_layer(entry) != self.max_layer {
            return Err(SmallworldError::corrupt_prebuilt(
                "entry point is not on the top layer",
            ));
        }

        let mut observed_max = 0usize;
        for (id, node) in self.nodes.iter().enumerate() {
            if node.layers.is_empty() {
                return Err(SmallworldError::corrupt_prebuilt(format!(
                    "node {} is missing from layer 0",
                    id
                )));
            }
            observed_max = observed_max.max(node.layers.len() - 1);
            for (layer, neighbors) in node.layers.iter().enumerate() {
                let mut seen: Vec<NodeId> = Vec::with_capacity(neighbors.len());
                for &nb in neighbors {
                    if u64::from(nb) >= count {
                        return Err(SmallworldError::corrupt_prebuilt(format!(
                            "node {} layer {} references out-of-range neighbor {}",
                            id, layer, nb
                        )));
                    }
                    if nb as usize == id {
                        return Err(SmallworldError::corrupt_prebuilt(format!(
                            "node {} layer {} contains a self-loop",
                            id, layer
                        )));
                    }
                    if seen.contains(&nb) {
                        return Err(SmallworldError::corrupt_prebuilt(format!(
                            "node {} layer {} contains duplicate neighbor {}",
                            id, layer, nb
                        )));
                    }
                    // A link at this layer implies the neighbor reaches it
                    if self.nodes[nb as usize].layers.len() <= layer {
                        return Err(SmallworldError::corrupt_prebuilt(format!(
                            "node {} layer {} links to neighbor {} whose top layer is lower",
                            id, layer, nb
                        )));
                    }
                    seen.push(nb);
                }
            }
        }
        if observed_max != self.max_layer {
            return Err(SmallworldError::corrupt_prebuilt(format!(
                "declared max layer {} does not match observed {}",
                self.max_layer, observed_max
            )));
        }
        Ok(())
    }
}

/// Builds an [`HnswGraph`] from a vector source plus configuration.
///
/// Nodes are inserted strictly sequentially in row order; later placements
/// depend on the graph as built by all earlier insertions, so builds with the
/// same config and data reproduce the same topology.
pub struct HnswBuilder {
    config: HnswConfig,
    pool: Option<rayon::ThreadPool>,
}

impl fmt::Debug for HnswBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HnswBuilder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl HnswBuilder {
    /// Create a builder, validating the configuration.
    pub fn new(config: HnswConfig) -> Result<Self> {
        config.validate()?;
        let pool = if config.num_threads > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(config.num_threads)
                .build()
                .map_err(|e| SmallworldError::invalid_config(e.to_string()))?;
            Some(pool)
        } else {
            None
        };
        Ok(Self { config, pool })
    }

    /// The validated configuration.
    pub fn config(&self) -> &HnswConfig {
        &self.config
    }

    /// Build an index over `data`.
    ///
    /// Zero rows yield a valid empty graph with no entry point; queries
    /// against it return empty results.
    pub fn build<M: VectorSource>(
        &self,
        registry: &MetricRegistry,
        data: M,
    ) -> Result<HnswIndex<M>> {
        let metric = registry.resolve(&self.config.metric, data.dimension())?;
        let graph = self.build_graph(&data, metric.as_ref())?;
        Ok(HnswIndex {
            graph,
            data,
            metric,
            ef_search: self.config.ef_search,
        })
    }

    fn build_graph<M: VectorSource>(&self, data: &M, metric: &dyn Distance) -> Result<HnswGraph> {
        let count = data.len();
        let scale = self.config.effective_layer_scale();

        let mut graph = ConstructionGraph {
            nodes: Vec::with_capacity(count),
            data,
            metric,
            m: self.config.max_connections,
            ef_construction: self.config.ef_construction,
            pool: self.pool.as_ref(),
            entry_point: None,
            max_layer: 0,
        };

        let mut visited = VisitedSet::new(count);
        for node in 0..count {
            let top = self.sample_layer(node, scale);
            graph.insert(node as NodeId, top, &mut visited);
        }

        Ok(HnswGraph {
            dimension: data.dimension(),
            metric: metric.name().to_string(),
            max_connections: self.config.max_connections,
            layer_scale: scale,
            entry_point: graph.entry_point,
            max_layer: graph.max_layer,
            nodes: graph
                .nodes
                .into_iter()
                .map(RwLock::into_inner)
                .collect(),
        })
    }

    /// Draw a node's top layer from the exponential distribution.
    ///
    /// The stream is seeded from (config seed, node id) so each node's layer
    /// is independent of insertion batching and reproducible across builds.
    fn sample_layer(&self, node: usize, scale: f64) -> usize {
        let mut rng = rand::rngs::StdRng::seed_from_u64(
            self.config
                .seed
                .wrapping_add((node as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)),
        );
        let u: f64 = rng.gen_range(f64::MIN_POSITIVE..1.0);
        (-u.ln() * scale).floor() as usize
    }
}

/// Mutable graph state during construction. One lock per node, held only for
/// that adjacency list's read-modify-write window.
struct ConstructionGraph<'a, M: VectorSource> {
    nodes: Vec<RwLock<NodeLinks>>,
    data: &'a M,
    metric: &'a dyn Distance,
    m: usize,
    ef_construction: usize,
    pool: Option<&'a rayon::ThreadPool>,
    entry_point: Option<NodeId>,
    max_layer: usize,
}

impl<M: VectorSource> ConstructionGraph<'_, M> {
    #[inline]
    fn cap(&self, layer: usize) -> usize {
        if layer == 0 {
            self.m * 2
        } else {
            self.m
        }
    }

    #[inline]
    fn distance(&self, a: NodeId, b: NodeId) -> f32 {
        self.metric
            .compute(self.data.vector(a as usize), self.data.vector(b as usize))
    }

    fn insert(&mut self, node: NodeId, top_layer: usize, visited: &mut VisitedSet) {
        self.nodes
            .push(RwLock::new(NodeLinks::with_top_layer(top_layer)));

        let entry = match self.entry_point {
            Some(entry) => entry,
            None => {
                // First node: becomes the entry point with no edges
                self.entry_point = Some(node);
                self.max_layer = top_layer;
                return;
            }
        };

        let data = self.data;
        let query = data.vector(node as usize);
        let mut eps = vec![Candidate {
            node: entry,
            distance: self.metric.compute(query, data.vector(entry as usize)),
        }];

        // Greedy descent with beam width 1 above the node's own top layer
        let mut layer = self.max_layer;
        while layer > top_layer {
            eps = self.search_layer(query, &eps, 1, layer, visited);
            layer -= 1;
        }

        // Connect at each layer from the top layer (clamped) down to 0
        for lc in (0..=top_layer.min(self.max_layer)).rev() {
            let candidates = self.search_layer(query, &eps, self.ef_construction, lc, visited);
            let cap = self.cap(lc);
            let selected = self.select_diverse(&candidates, cap);

            for &chosen in &selected {
                self.link(node, chosen.node, lc);
                self.link(chosen.node, node, lc);
                self.prune(chosen.node, lc);
            }

            eps = selected;
        }

        if top_layer > self.max_layer {
            self.entry_point = Some(node);
            self.max_layer = top_layer;
        }
    }

    /// Best-first search within one layer, returning up to `ef` candidates
    /// sorted ascending. Entry points double as the fallback result when a
    /// layer exposes no further neighbors.
    fn search_layer(
        &self,
        query: &[f32],
        entry_points: &[Candidate],
        ef: usize,
        layer: usize,
        visited: &mut VisitedSet,
    ) -> Vec<Candidate> {
        visited.clear();

        let mut frontier: BinaryHeap<Reverse<Candidate>> = BinaryHeap::with_capacity(ef);
        let mut results: BinaryHeap<Candidate> = BinaryHeap::with_capacity(ef + 1);

        for &ep in entry_points {
            if visited.insert(ep.node) {
                frontier.push(Reverse(ep));
                results.push(ep);
            }
        }

        while let Some(Reverse(current)) = frontier.pop() {
            let worst = results.peek().map(|c| c.distance).unwrap_or(f32::MAX);
            if current.distance > worst && results.len() >= ef {
                break;
            }

            let neighbors: SmallVec<[NodeId; 32]> = {
                let node = self.nodes[current.node as usize].read();
                node.layers
                    .get(layer)
                    .cloned()
                    .unwrap_or_default()
            };

            for nb in neighbors {
                if !visited.insert(nb) {
                    continue;
                }
                let distance = self.metric.compute(query, self.data.vector(nb as usize));
                let worst = results.peek().map(|c| c.distance).unwrap_or(f32::MAX);
                if distance < worst || results.len() < ef {
                    let candidate = Candidate { node: nb, distance };
                    frontier.push(Reverse(candidate));
                    results.push(candidate);
                    if results.len() > ef {
                        results.pop();
                    }
                }
            }
        }

        let mut out = results.into_vec();
        out.sort();
        out
    }

    /// Relative-neighborhood selection: scanning candidates by ascending
    /// distance, keep one only if it is closer to the new node than to every
    /// already-kept neighbor. This spreads edges across directions instead of
    /// piling them into one cluster.
    fn select_diverse(&self, candidates: &[Candidate], cap: usize) -> Vec<Candidate> {
        let mut selected: Vec<Candidate> = Vec::with_capacity(cap);
        for &candidate in candidates {
            if selected.len() >= cap {
                break;
            }
            let dominated = selected
                .iter()
                .any(|kept| self.distance(candidate.node, kept.node) < candidate.distance);
            if !dominated {
                selected.push(candidate);
            }
        }
        selected
    }

    /// Add a directed edge, ignoring duplicates.
    fn link(&self, from: NodeId, to: NodeId, layer: usize) {
        if from == to {
            return;
        }
        let mut node = self.nodes[from as usize].write();
        if let Some(neighbors) = node.layers.get_mut(layer) {
            if !neighbors.contains(&to) {
                neighbors.push(to);
            }
        }
    }

    /// Re-prune a node's adjacency list back to its cap with the same
    /// diversity heuristic, possibly evicting a previously kept edge.
    fn prune(&self, node: NodeId, layer: usize) {
        let cap = self.cap(layer);
        let current: Vec<NodeId> = {
            let guard = self.nodes[node as usize].read();
            match guard.layers.get(layer) {
                Some(neighbors) if neighbors.len() > cap => neighbors.iter().copied().collect(),
                _ => return,
            }
        };

        let mut scored = self.score_against(node, &current);
        scored.sort();
        let kept = self.select_diverse(&scored, cap);

        let mut guard = self.nodes[node as usize].write();
        if let Some(neighbors) = guard.layers.get_mut(layer) {
            neighbors.clear();
            neighbors.extend(kept.into_iter().map(|c| c.node));
        }
    }

    /// Score `targets` by distance to `node`, on the configured pool when
    /// one is available. Output order matches input order either way, so the
    /// emitted topology is identical to a single-threaded build.
    fn score_against(&self, node: NodeId, targets: &[NodeId]) -> Vec<Candidate> {
        let score = |&target: &NodeId| Candidate {
            node: target,
            distance: self.distance(node, target),
        };
        match self.pool {
            Some(pool) if targets.len() >= 64 => {
                pool.install(|| targets.par_iter().map(score).collect())
            }
            _ => targets.iter().map(score).collect(),
        }
    }
}

/// A searchable HNSW index: immutable graph topology plus the vector source
/// it was built over and the resolved metric.
///
/// Safe for unbounded concurrent reads; every query uses private scratch
/// state. The index is rebuild-only: there is no insertion after build.
pub struct HnswIndex<M> {
    graph: HnswGraph,
    data: M,
    metric: Arc<dyn Distance>,
    ef_search: usize,
}

impl<M> fmt::Debug for HnswIndex<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HnswIndex")
            .field("graph", &self.graph)
            .field("metric", &self.metric.name())
            .field("ef_search", &self.ef_search)
            .finish_non_exhaustive()
    }
}

impl<M: VectorSource> HnswIndex<M> {
    /// Pair a previously built or decoded graph with its dataset.
    ///
    /// Validates that the dataset matches the graph (row count and
    /// dimensionality) and resolves the graph's recorded metric. A decoded
    /// graph paired with its original dataset yields search results
    /// identical to the graph it was encoded from.
    pub fn from_graph(graph: HnswGraph, data: M, registry: &MetricRegistry) -> Result<Self> {
        if data.dimension() != graph.dimension {
            return Err(SmallworldError::dimension_mismatch(
                graph.dimension,
                data.dimension(),
            ));
        }
        if data.len() != graph.len() {
            return Err(SmallworldError::corrupt_prebuilt(format!(
                "graph holds {} nodes but dataset has {} rows",
                graph.len(),
                data.len()
            )));
        }
        let metric = registry.resolve(&graph.metric, graph.dimension)?;
        Ok(Self {
            graph,
            data,
            metric,
            ef_search: defaults::DEFAULT_EF_SEARCH,
        })
    }

    /// The graph topology (for encoding or inspection).
    pub fn graph(&self) -> &HnswGraph {
        &self.graph
    }

    /// The underlying vector source.
    pub fn data(&self) -> &M {
        &self.data
    }

    /// Set the default beam width for subsequent searches.
    pub fn set_ef_search(&mut self, ef: usize) {
        self.ef_search = ef.max(1);
    }

    /// The current default search beam width.
    pub fn ef_search(&self) -> usize {
        self.ef_search
    }

    /// Create a searcher with its own reusable scratch state.
    ///
    /// One searcher serves one query at a time; create one per thread for
    /// concurrent querying.
    pub fn searcher(&self) -> HnswSearcher<'_, M> {
        HnswSearcher {
            index: self,
            visited: VisitedSet::new(self.graph.len()),
        }
    }

    fn check_query(&self, query: &[f32]) -> Result<()> {
        if query.len() != self.graph.dimension {
            return Err(SmallworldError::dimension_mismatch(
                self.graph.dimension,
                query.len(),
            ));
        }
        Ok(())
    }
}

impl<M: VectorSource> VectorIndex for HnswIndex<M> {
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        self.searcher().search(query, k)
    }

    fn search_by_id(&self, id: usize, k: usize) -> Result<Vec<Neighbor>> {
        self.searcher().search_by_id(id, k)
    }

    fn search_all(&self, query: &[f32], radius: f32) -> Result<Vec<Neighbor>> {
        self.searcher().search_all(query, radius)
    }

    fn len(&self) -> usize {
        self.graph.len()
    }

    fn dimension(&self) -> usize {
        self.graph.dimension
    }
}

/// Executes queries against a borrowed [`HnswIndex`], owning per-query
/// scratch state (frontier and result heaps, visited marks).
///
/// Scratch is reset between queries and never shared, so distinct searchers
/// may run on distinct threads against the same index without coordination.
pub struct HnswSearcher<'a, M> {
    index: &'a HnswIndex<M>,
    visited: VisitedSet,
}

impl<M: VectorSource> HnswSearcher<'_, M> {
    /// k-nearest-neighbor query.
    ///
    /// Returns exactly `min(k, len)` results sorted by ascending distance,
    /// ties by ascending index. Distances are reported under the index's
    /// configured metric; with squared Euclidean selected, callers wanting
    /// true Euclidean distances must take the square root themselves.
    pub fn search(&mut self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        self.index.check_query(query)?;
        let k = k.min(self.index.graph.len());
        if k == 0 {
            return Ok(Vec::new());
        }

        let ef = self.index.ef_search.max(k);
        let mut results = self.beam_search(query, ef);
        results.sort();
        results.truncate(k);
        Ok(results
            .into_iter()
            .map(|c| Neighbor::new(c.node as usize, c.distance))
            .collect())
    }

    /// k-nearest-neighbor query for a vector already in the index, excluding
    /// the query node itself from the results.
    pub fn search_by_id(&mut self, id: usize, k: usize) -> Result<Vec<Neighbor>> {
        let count = self.index.graph.len();
        if id >= count {
            return Err(SmallworldError::invalid_node_id(id, count));
        }
        // Owned copy: the scratch borrow below would otherwise conflict
        let query: Vec<f32> = self.index.data.vector(id).to_vec();

        // Over-fetch by one so the self match can be dropped
        let budget = k.saturating_add(1).min(count);
        let ef = self.index.ef_search.max(budget);
        let mut results = self.beam_search(&query, ef);
        results.sort();
        Ok(results
            .into_iter()
            .filter(|c| c.node as usize != id)
            .take(k)
            .map(|c| Neighbor::new(c.node as usize, c.distance))
            .collect())
    }

    /// Radius query: every node found within `radius` of the query, sorted
    /// by ascending distance.
    ///
    /// Implemented as a kNN beam of doubling width: the beam is rerun until
    /// its worst candidate already lies outside the radius (so the ball is
    /// covered) or the width reaches the node count, and the final beam is
    /// filtered down to in-range nodes. This search is **approximate**: a
    /// beam can miss in-range nodes the kNN search itself would miss, but a
    /// node whose distance exceeds `radius` is never returned.
    pub fn search_all(&mut self, query: &[f32], radius: f32) -> Result<Vec<Neighbor>> {
        self.index.check_query(query)?;
        let count = self.index.graph.len();
        if count == 0 {
            return Ok(Vec::new());
        }

        let mut ef = self.index.ef_search.max(1).min(count);
        let mut results = loop {
            let candidates = self.beam_search(query, ef);
            // A beam shorter than ef exhausted the reachable component; a
            // worst candidate beyond the radius means widening further can
            // only add nodes that rank behind it
            let covered = candidates.len() < ef
                || candidates.iter().any(|c| c.distance > radius);
            if covered || ef >= count {
                break candidates;
            }
            ef = (ef * 2).min(count);
        };

        results.retain(|c| c.distance <= radius);
        results.sort();
        Ok(results
            .into_iter()
            .map(|c| Neighbor::new(c.node as usize, c.distance))
            .collect())
    }

    /// Greedy descent from the entry point to layer 0 with beam width 1.
    fn greedy_descent(&self, query: &[f32], entry: NodeId) -> (NodeId, f32) {
        let index = self.index;
        let graph = &index.graph;
        let metric = index.metric.as_ref();
        let data = &index.data;

        let mut best = entry;
        let mut best_dist = metric.compute(query, data.vector(entry as usize));

        for layer in (1..=graph.max_layer).rev() {
            let mut improved = true;
            while improved {
                improved = false;
                for &nb in graph.neighbors(best, layer) {
                    let distance = metric.compute(query, data.vector(nb as usize));
                    if distance < best_dist || (distance == best_dist && nb < best) {
                        best = nb;
                        best_dist = distance;
                        improved = true;
                    }
                }
            }
        }
        (best, best_dist)
    }

    /// Layer-0 beam search with width `ef`; returns up to `ef` candidates,
    /// unsorted.
    fn beam_search(&mut self, query: &[f32], ef: usize) -> Vec<Candidate> {
        let index = self.index;
        let graph = &index.graph;
        let entry = match graph.entry_point {
            Some(entry) => entry,
            None => return Vec::new(),
        };
        let metric = index.metric.as_ref();
        let data = &index.data;

        let (seed, seed_dist) = self.greedy_descent(query, entry);

        self.visited.clear();
        self.visited.insert(seed);

        let mut frontier: BinaryHeap<Reverse<Candidate>> = BinaryHeap::with_capacity(ef);
        let mut results: BinaryHeap<Candidate> = BinaryHeap::with_capacity(ef + 1);
        let seed = Candidate {
            node: seed,
            distance: seed_dist,
        };
        frontier.push(Reverse(seed));
        results.push(seed);

        while let Some(Reverse(current)) = frontier.pop() {
            let worst = results.peek().map(|c| c.distance).unwrap_or(f32::MAX);
            if current.distance > worst && results.len() >= ef {
                break;
            }

            for &nb in graph.neighbors(current.node, 0) {
                if !self.visited.insert(nb) {
                    continue;
                }
                let distance = metric.compute(query, data.vector(nb as usize));
                let worst = results.peek().map(|c| c.distance).unwrap_or(f32::MAX);
                if distance < worst || results.len() < ef {
                    let candidate = Candidate { node: nb, distance };
                    frontier.push(Reverse(candidate));
                    results.push(candidate);
                    if results.len() > ef {
                        results.pop();
                    }
                }
            }
        }

        results.into_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dataset;
    use crate::matrix::DenseMatrix;

    fn registry() -> MetricRegistry {
        MetricRegistry::with_builtins()
    }

    fn square_corners() -> DenseMatrix {
        DenseMatrix::from_rows(
            2,
            &[
                vec![0.0, 0.0],
                vec![0.0, 1.0],
                vec![1.0, 0.0],
                vec![1.0, 1.0],
            ],
        )
        .unwrap()
    }

    fn small_config() -> HnswConfig {
        HnswConfig {
            max_connections: 4,
            ef_construction: 10,
            ..HnswConfig::default()
        }
    }

    #[test]
    fn test_empty_index() {
        let builder = HnswBuilder::new(HnswConfig::default()).unwrap();
        let index = builder
            .build(&registry(), DenseMatrix::empty(8))
            .unwrap();

        assert!(index.is_empty());
        assert!(index.graph().entry_point().is_none());
        assert!(index.search(&[0.0; 8], 10).unwrap().is_empty());
        assert!(index.search_all(&[0.0; 8], 100.0).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_config() {
        for config in [
            HnswConfig {
                max_connections: 0,
                ..HnswConfig::default()
            },
            HnswConfig {
                ef_construction: 0,
                ..HnswConfig::default()
            },
            HnswConfig {
                layer_scale: Some(-1.0),
                ..HnswConfig::default()
            },
        ] {
            assert!(matches!(
                HnswBuilder::new(config).unwrap_err(),
                SmallworldError::InvalidConfig(_)
            ));
        }
    }

    #[test]
    fn test_unknown_metric_at_build() {
        let config = HnswConfig {
            metric: "no_such_metric".to_string(),
            ..HnswConfig::default()
        };
        let builder = HnswBuilder::new(config).unwrap();
        let err = builder.build(&registry(), square_corners()).unwrap_err();
        assert!(matches!(err, SmallworldError::UnknownMetric(_)));
    }

    #[test]
    fn test_square_corner_scenario() {
        let builder = HnswBuilder::new(small_config()).unwrap();
        let index = builder.build(&registry(), square_corners()).unwrap();

        let results = index.search(&[0.1, 0.1], 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].index, 0);
        assert!((results[0].distance - 0.02).abs() < 1e-6);
        // Rows 1 and 2 tie at 0.82; ascending index breaks the tie
        assert_eq!(results[1].index, 1);
        assert!((results[1].distance - 0.82).abs() < 1e-6);
    }

    #[test]
    fn test_distances_non_decreasing() {
        let dataset = Dataset::generate(500, 1, 16, 7);
        let builder = HnswBuilder::new(HnswConfig::default()).unwrap();
        let index = builder.build(&registry(), dataset.vectors).unwrap();

        let results = index.search(&dataset.queries.vector(0).to_vec(), 20).unwrap();
        assert_eq!(results.len(), 20);
        for pair in results.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
    }

    #[test]
    fn test_k_clamped_to_count() {
        let builder = HnswBuilder::new(small_config()).unwrap();
        let index = builder.build(&registry(), square_corners()).unwrap();

        assert_eq!(index.search(&[0.5, 0.5], 100).unwrap().len(), 4);
        assert!(index.search(&[0.5, 0.5], 0).unwrap().is_empty());
    }

    #[test]
    fn test_self_query_excludes_self() {
        let dataset = Dataset::generate(200, 0, 8, 3);
        let builder = HnswBuilder::new(HnswConfig::default()).unwrap();
        let index = builder.build(&registry(), dataset.vectors).unwrap();

        let mut searcher = index.searcher();
        for id in 0..index.len() {
            let results = searcher.search_by_id(id, 5).unwrap();
            assert_eq!(results.len(), 5);
            assert!(results.iter().all(|n| n.index != id));
        }

        assert!(matches!(
            searcher.search_by_id(1000, 5).unwrap_err(),
            SmallworldError::InvalidNodeId { id: 1000, count: 200 }
        ));
    }

    #[test]
    fn test_search_all_no_false_positives() {
        let dataset = Dataset::generate(300, 0, 4, 11);
        let builder = HnswBuilder::new(HnswConfig::default()).unwrap();
        let query = dataset.vectors.vector(0).to_vec();
        let index = builder.build(&registry(), dataset.vectors).unwrap();

        let radius = 0.5;
        let results = index.search_all(&query, radius).unwrap();
        assert!(!results.is_empty()); // the query point itself is in range
        for n in &results {
            assert!(n.distance <= radius);
        }
        for pair in results.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
    }

    #[test]
    fn test_query_dimension_mismatch() {
        let builder = HnswBuilder::new(small_config()).unwrap();
        let index = builder.build(&registry(), square_corners()).unwrap();
        assert!(matches!(
            index.search(&[0.0, 0.0, 0.0], 1).unwrap_err(),
            SmallworldError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_deterministic_rebuild() {
        let dataset = Dataset::generate(300, 0, 8, 42);
        let builder = HnswBuilder::new(HnswConfig::default()).unwrap();

        let a = builder.build(&registry(), dataset.vectors.clone()).unwrap();
        let b = builder.build(&registry(), dataset.vectors).unwrap();

        assert_eq!(a.graph().entry_point(), b.graph().entry_point());
        assert_eq!(a.graph().max_layer(), b.graph().max_layer());
        for node in 0..a.len() as NodeId {
            assert_eq!(a.graph().node_top_layer(node), b.graph().node_top_layer(node));
            for layer in 0..=a.graph().node_top_layer(node) {
                assert_eq!(
                    a.graph().neighbors(node, layer),
                    b.graph().neighbors(node, layer),
                    "adjacency differs at node {} layer {}",
                    node,
                    layer
                );
            }
        }
    }

    #[test]
    fn test_parallel_scoring_same_topology() {
        let dataset = Dataset::generate(200, 0, 8, 9);
        let sequential = HnswBuilder::new(HnswConfig::default()).unwrap();
        let threaded = HnswBuilder::new(HnswConfig {
            num_threads: 4,
            ..HnswConfig::default()
        })
        .unwrap();

        let a = sequential
            .build(&registry(), dataset.vectors.clone())
            .unwrap();
        let b = threaded.build(&registry(), dataset.vectors).unwrap();

        for node in 0..a.len() as NodeId {
            for layer in 0..=a.graph().node_top_layer(node) {
                assert_eq!(a.graph().neighbors(node, layer), b.graph().neighbors(node, layer));
            }
        }
    }

    #[test]
    fn test_adjacency_invariants() {
        let dataset = Dataset::generate(400, 0, 8, 5);
        let builder = HnswBuilder::new(HnswConfig::default()).unwrap();
        let index = builder.build(&registry(), dataset.vectors).unwrap();
        let graph = index.graph();

        assert!(graph.validate().is_ok());
        let m = graph.max_connections();
        for node in 0..graph.len() as NodeId {
            for layer in 0..=graph.node_top_layer(node) {
                let cap = if layer == 0 { 2 * m } else { m };
                assert!(graph.neighbors(node, layer).len() <= cap);
            }
        }
    }

    #[test]
    fn test_exact_match_found() {
        let dataset = Dataset::generate(500, 0, 32, 21);
        let builder = HnswBuilder::new(HnswConfig::default()).unwrap();
        let target = dataset.vectors.vector(123).to_vec();
        let index = builder.build(&registry(), dataset.vectors).unwrap();

        let results = index.search(&target, 1).unwrap();
        assert_eq!(results[0].index, 123);
        assert!(results[0].distance < 1e-6);
    }
}
