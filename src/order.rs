//! Canonical ordering of credential records.
//!
//! Folding is sequential, so prover and verifier must agree on one record
//! order without exchanging ordering metadata. The order is derived from the
//! records themselves: each record's fingerprint is the Poseidon hash of its
//! signed 13-field tuple, and records are sorted by fingerprint ascending.
//!
//! Fingerprints are compared as arbitrary-precision unsigned integers, never
//! as native numerics: field elements exceed every fixed-width integer type
//! and a lossy comparator would make the order implementation-dependent.

use num_bigint::BigUint;
use rayon::prelude::*;
use thiserror::Error;

use crate::{encoding, record::CanonicalRecord, ScalarField};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OrderError {
    #[error("duplicate record: fingerprint {0} appears more than once")]
    DuplicateRecord(String),
}

/// What to do when two records hash to the same fingerprint, i.e. are
/// structurally identical.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Reject the batch: folding the same record twice would inflate the
    /// proven count.
    #[default]
    Reject,
    /// Keep duplicates, stable order among equals.
    Allow,
}

/// A record's deterministic ordering key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint(pub ScalarField);

impl Fingerprint {
    pub fn of(record: &CanonicalRecord) -> Self {
        Fingerprint(record.message_hash())
    }

    pub fn to_biguint(&self) -> BigUint {
        encoding::field_to_biguint(&self.0)
    }
}

/// Records sorted ascending by fingerprint and re-indexed from 1. Index 0 is
/// reserved: the folding step loop treats it as the "no previous step"
/// marker.
#[derive(Debug, Clone)]
pub struct OrderedRecordSequence {
    entries: Vec<(Fingerprint, CanonicalRecord)>,
}

impl OrderedRecordSequence {
    /// 1-based step index paired with each record, in folding order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &CanonicalRecord)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, (_, record))| (i as u64 + 1, record))
    }

    pub fn fingerprints(&self) -> Vec<Fingerprint> {
        self.entries.iter().map(|(fp, _)| fp.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Compute the canonical sequence for a set of records. Given the same input
/// set, the output is identical regardless of arrival order.
///
/// Fingerprinting is pure and runs in parallel; the sort is a global barrier
/// after the parallel map.
pub fn order(
    records: Vec<CanonicalRecord>,
    policy: DuplicatePolicy,
) -> Result<OrderedRecordSequence, OrderError> {
    let mut keyed: Vec<(BigUint, CanonicalRecord)> = records
        .into_par_iter()
        .map(|record| (Fingerprint::of(&record).to_biguint(), record))
        .collect();

    keyed.sort_by(|(a, _), (b, _)| a.cmp(b));

    if policy == DuplicatePolicy::Reject {
        for window in keyed.windows(2) {
            if window[0].0 == window[1].0 {
                return Err(OrderError::DuplicateRecord(window[0].0.to_string()));
            }
        }
    }

    let entries = keyed
        .into_iter()
        .map(|(_, record)| (Fingerprint::of(&record), record))
        .collect();
    Ok(OrderedRecordSequence { entries })
}
