// Topology registry
//
// Two kinds of storage make up the fixture:
// - `static` items, const-initialized and present before `main` runs
// - `Topology`, assembled at runtime by the sequencer and published once into
//   `TOPOLOGY`
//
// Nothing in here is mutated after `publish` returns, with the exception of
// the pointer-graph links, which are written exactly once before publication.

use std::collections::{BTreeMap, BTreeSet, LinkedList};
#[cfg(feature = "extended")]
use std::collections::{HashMap, HashSet};
#[cfg(feature = "extended")]
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use once_cell::sync::OnceCell;

use super::shapes::{DerivedSample2, Ordinal, Overlay, Sample, SampleRef, Variant};
use crate::error::FixtureError;
use crate::observe;

/// Whether the extended (smart pointer and worker) subset has been built
pub static HAVE_EXTENDED: AtomicBool = AtomicBool::new(false);

pub static GLOBAL_SAMPLE: Sample = Sample::new();

// Acyclic non-owning chain: head -> tail
pub static CHAIN_HEAD: Sample = Sample::labelled("top");
pub static CHAIN_TAIL: Sample = Sample::labelled("bottom");

// Non-owning cycle: A <-> B
pub static CYCLE_A: Sample = Sample::labelled("class A");
pub static CYCLE_B: Sample = Sample::labelled("class B");

pub static SHORT_TEXT: &str = "bye";

pub static PALETTE: [u16; 8] = [4, 3, 2, 1, 8, 7, 6, 5];
pub static MATRIX: [[u64; 3]; 2] = [
    [1, 2, 3],
    [999_999_999_999, 888_888_888_888, 777_777_777_777],
];

pub static OVERLAY: Overlay = Overlay::zeroed();

pub static ORDINAL: Ordinal = Ordinal::Hundred;

pub static GLOBAL_DERIVED: DerivedSample2 = DerivedSample2::new();

pub const LONG_TEXT: &str =
    "The quick brown fox jumps over the lazy dog multiple times to do this string longer...";

pub const OWNED_INT: i32 = 66;

static TOPOLOGY: OnceCell<Topology> = OnceCell::new();

/// Values assembled at runtime
#[derive(Debug)]
pub struct Topology {
    pub long_text: String,
    pub ints: Vec<i32>,
    pub samples: Vec<Sample>,
    pub list: LinkedList<i32>,
    pub ordered_map: BTreeMap<i32, i32>,
    pub ordered_set: BTreeSet<i32>,
    pub variants: [Variant; 3],
    pub reference: SampleRef<'static>,
    #[cfg(feature = "extended")]
    pub owned: OwnedSlots,
}

/// Owning slots, each kind present both populated and empty
#[cfg(feature = "extended")]
#[derive(Debug)]
pub struct OwnedSlots {
    pub hashed_map: HashMap<i32, i32>,
    pub hashed_set: HashSet<i32>,
    pub unique_int: Option<Box<i32>>,
    pub unique_int_null: Option<Box<i32>>,
    pub unique_sample: Option<Box<Sample>>,
    pub unique_sample_null: Option<Box<Sample>>,
    pub shared_int: Option<Arc<i32>>,
    pub shared_sample: Option<Arc<Sample>>,
    pub shared_sample_peer: Option<Arc<Sample>>,
    pub shared_sample_null: Option<Arc<Sample>>,
    pub reader: fn(&Sample) -> i32,
}

impl Topology {
    /// Builds every runtime value in dependency order.
    ///
    /// Scalars first, then aggregates, containers, pointer graphs and finally
    /// the owning slots. Static items already exist; this touches them so they
    /// stay observable and wires the pointer graphs between them.
    pub fn build() -> Self {
        touch_scalars();
        let (variants, reference) = build_aggregates();
        let mut topology = build_containers(variants, reference);
        link_pointer_graphs();
        attach_owned_slots(&mut topology);
        topology
    }
}

fn touch_scalars() {
    observe::pin(&SHORT_TEXT);
    observe::pin(&PALETTE[5]);
    observe::pin(&MATRIX);
    observe::pin(&ORDINAL);
    tracing::debug!("[Registry] Scalars and arrays pinned");
}

fn build_aggregates() -> ([Variant; 3], SampleRef<'static>) {
    GLOBAL_SAMPLE.pinned_value();
    GLOBAL_DERIVED.pinned_value();
    observe::pin(&OVERLAY);

    let variants = [
        Variant::Int(7),
        Variant::Float(0.5),
        Variant::Text("variant"),
    ];
    let reference = SampleRef::new(&GLOBAL_SAMPLE);
    reference.pinned_value();
    tracing::debug!("[Registry] Aggregates, unions and enums ready");
    (variants, reference)
}

fn build_containers(variants: [Variant; 3], reference: SampleRef<'static>) -> Topology {
    let ints = vec![1, 7, -100];

    let mut samples: Vec<Sample> = (0..2).map(|_| Sample::new()).collect();
    samples[0].int = 999;
    samples[1].int = 1001;

    let mut list = LinkedList::new();
    list.push_back(7);
    list.push_front(49);

    let ordered_map = keyed_pairs().into_iter().collect();
    let ordered_set = set_members().into_iter().collect();

    tracing::debug!(
        "[Registry] Containers populated: {} ints, {} samples, {} list nodes",
        ints.len(),
        samples.len(),
        list.len()
    );

    Topology {
        long_text: LONG_TEXT.to_string(),
        ints,
        samples,
        list,
        ordered_map,
        ordered_set,
        variants,
        reference,
        #[cfg(feature = "extended")]
        owned: OwnedSlots::empty(),
    }
}

/// Wires the chain and the cycle. Both ends of each relation already exist.
///
/// Repeated calls store the same addresses again.
pub fn link_pointer_graphs() {
    CHAIN_HEAD.pinned_value();
    CHAIN_HEAD.link_to(&CHAIN_TAIL);

    CYCLE_A.pinned_value();
    CYCLE_A.link_to(&CYCLE_B);
    CYCLE_B.link_to(&CYCLE_A);
    tracing::debug!("[Registry] Pointer chain and cycle linked");
}

fn keyed_pairs() -> [(i32, i32); 3] {
    [(99, -99), (999, -999), (9999, -9999)]
}

fn set_members() -> [i32; 2] {
    [-9, -91]
}

cfg_if::cfg_if! {
    if #[cfg(feature = "extended")] {
        impl OwnedSlots {
            fn empty() -> Self {
                Self {
                    hashed_map: HashMap::new(),
                    hashed_set: HashSet::new(),
                    unique_int: None,
                    unique_int_null: None,
                    unique_sample: None,
                    unique_sample_null: None,
                    shared_int: None,
                    shared_sample: None,
                    shared_sample_peer: None,
                    shared_sample_null: None,
                    reader: Sample::pinned_value,
                }
            }
        }

        fn attach_owned_slots(topology: &mut Topology) {
            observe::raise(&HAVE_EXTENDED, true);

            let owned = &mut topology.owned;
            owned.hashed_map.extend(keyed_pairs());
            owned.hashed_set.extend(set_members());

            owned.unique_int = Some(Box::new(OWNED_INT));
            owned.unique_sample = Some(Box::new(Sample::new()));

            owned.shared_int = Some(Arc::new(OWNED_INT));
            let shared = Arc::new(Sample::new());
            owned.shared_sample_peer = Some(Arc::clone(&shared));
            owned.shared_sample = Some(shared);

            tracing::debug!("[Registry] Owning slots attached");
        }
    } else {
        fn attach_owned_slots(_topology: &mut Topology) {
            tracing::debug!("[Registry] Extended subset disabled; no owning slots");
        }
    }
}

/// Publishes `topology` as the process-wide registry.
///
/// The registry is frozen from here on. A second call fails: one session per
/// process.
pub fn publish(topology: Topology) -> Result<&'static Topology, FixtureError> {
    TOPOLOGY
        .set(topology)
        .map_err(|_| FixtureError::AlreadyPublished)?;
    let published = TOPOLOGY.get().ok_or(FixtureError::AlreadyPublished)?;
    observe::keep(published);
    Ok(published)
}

/// The published registry, if any
pub fn registry() -> Option<&'static Topology> {
    TOPOLOGY.get()
}

/// Current value of the capability flag
pub fn have_extended() -> bool {
    HAVE_EXTENDED.load(Ordering::SeqCst)
}
