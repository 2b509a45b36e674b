//! Topology registry: every memory shape the inspector has to understand.
//!
//! `shapes` defines the types, `registry` owns the static items and the
//! runtime-built `Topology` that the sequencer publishes once per process.

pub mod registry;
pub mod shapes;


#[cfg(feature = "extended")]
pub use registry::OwnedSlots;
pub use registry::{
    have_extended, link_pointer_graphs, publish, registry, Topology, CHAIN_HEAD, CHAIN_TAIL,
    CYCLE_A, CYCLE_B, GLOBAL_DERIVED, GLOBAL_SAMPLE, HAVE_EXTENDED, LONG_TEXT, MATRIX, ORDINAL,
    OVERLAY, OWNED_INT, PALETTE, SHORT_TEXT,
};
pub use shapes::{DerivedSample, DerivedSample2, Ordinal, Overlay, Sample, SampleRef, Variant};
