// Shape types exercised by the inspector
//
// Each type here stands for one category of memory layout. Field values are
// fixed so the inspector can compare what it reads against known constants.

use std::ops::Deref;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

use crate::observe;

pub const SAMPLE_INT: i32 = 33;
pub const SAMPLE_BOOL: bool = true;
pub const SAMPLE_FLOAT: f32 = 42.42;
pub const SAMPLE_DOUBLE: f64 = -42.42;
pub const SAMPLE_CHAR: char = 'f';
pub const SAMPLE_TEXT: &str = "hello world";

/// Scalar aggregate with an optional string slot and a non-owning link.
///
/// `link` never owns its target. Only `'static` samples can be linked, so a
/// non-null link always points at a live object and dropping a sample never
/// touches whatever it links to.
#[derive(Debug)]
pub struct Sample {
    pub int: i32,
    pub boolean: bool,
    pub float: f32,
    pub double: f64,
    pub character: char,
    pub text: Option<&'static str>,
    link: AtomicPtr<Sample>,
}

impl Sample {
    pub const fn new() -> Self {
        Self::labelled(SAMPLE_TEXT)
    }

    pub const fn labelled(text: &'static str) -> Self {
        Self {
            int: SAMPLE_INT,
            boolean: SAMPLE_BOOL,
            float: SAMPLE_FLOAT,
            double: SAMPLE_DOUBLE,
            character: SAMPLE_CHAR,
            text: Some(text),
            link: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Sample whose string slot is left empty
    pub const fn unlabelled() -> Self {
        Self {
            text: None,
            ..Self::new()
        }
    }

    /// Points this sample at `target` without taking ownership.
    pub fn link_to(&self, target: &'static Sample) {
        self.link
            .store(ptr::from_ref(target).cast_mut(), Ordering::Release);
    }

    pub fn linked(&self) -> Option<&'static Sample> {
        let target = self.link.load(Ordering::Acquire);
        // SAFETY: `link_to` is the only writer and only stores `'static` references.
        unsafe { target.as_ref() }
    }

    pub fn is_linked(&self) -> bool {
        !self.link.load(Ordering::Acquire).is_null()
    }

    /// Keeps the sample in memory and returns its integer field.
    #[inline(never)]
    pub fn pinned_value(&self) -> i32 {
        observe::keep(self);
        observe::pin(&self.int)
    }
}

impl Default for Sample {
    fn default() -> Self {
        Self::new()
    }
}

/// Reference binding to a sample owned elsewhere
#[derive(Debug, Clone, Copy)]
pub struct SampleRef<'a> {
    pub target: &'a Sample,
}

impl<'a> SampleRef<'a> {
    pub const fn new(target: &'a Sample) -> Self {
        Self { target }
    }

    #[inline(never)]
    pub fn pinned_value(&self) -> i32 {
        observe::pin(&self.target.int)
    }
}

/// First level of the inheritance chain: a `Sample` base plus its own fields
#[derive(Debug, Default)]
pub struct DerivedSample {
    pub base: Sample,
    pub extra_int: i32,
    pub extra_float: f32,
}

impl DerivedSample {
    pub const fn new() -> Self {
        Self {
            base: Sample::new(),
            extra_int: 0,
            extra_float: 0.0,
        }
    }
}

impl Deref for DerivedSample {
    type Target = Sample;

    fn deref(&self) -> &Sample {
        &self.base
    }
}

/// Second level of the inheritance chain, adding no fields of its own
#[derive(Debug, Default)]
pub struct DerivedSample2 {
    pub base: DerivedSample,
}

impl DerivedSample2 {
    pub const fn new() -> Self {
        Self {
            base: DerivedSample::new(),
        }
    }
}

impl Deref for DerivedSample2 {
    type Target = DerivedSample;

    fn deref(&self) -> &DerivedSample {
        &self.base
    }
}

/// Untagged union: every field aliases the same bytes
#[repr(C)]
#[derive(Clone, Copy)]
pub union Overlay {
    pub int: i32,
    pub float: f32,
    pub bytes: [u8; 8],
}

impl Overlay {
    pub const fn zeroed() -> Self {
        Overlay { bytes: [0; 8] }
    }
}

/// Tagged union
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Variant {
    Int(i32),
    Float(f32),
    Text(&'static str),
}

/// Enumeration mixing implicit and explicit discriminants
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ordinal {
    Zero,
    One,
    Hundred = 100,
}
