//! Version-gated equality between two observations of a definition

use crate::context::{ProbeContext, ProbeResult, Timing};
use crate::profile::Requirement;
use metadata_collection::Definition;

/// How two observations of the same definition relate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consistency {
    /// Deep-equal
    Identical,
    /// Versions differ, so content may legitimately differ
    VersionSkew { expected: u64, retrieved: u64 },
    /// Content differs where it must not
    Divergent,
}

impl Consistency {
    pub fn is_acceptable(&self) -> bool {
        !matches!(self, Consistency::Divergent)
    }
}

/// Compare a retrieved definition against the one already held
///
/// Mutable families must be equal only when their versions agree; immutable
/// families must always be equal.
pub fn compare<D: Definition>(expected: &D, retrieved: &D) -> Consistency {
    if expected == retrieved {
        return Consistency::Identical;
    }
    if D::MUTABLE && expected.version() != retrieved.version() {
        return Consistency::VersionSkew {
            expected: expected.version(),
            retrieved: retrieved.version(),
        };
    }
    Consistency::Divergent
}

/// Hard check that a retrieval is consistent with the definition under test
pub(crate) fn assert_consistent<D: Definition>(
    probe: &ProbeContext<'_>,
    assertion_id: &str,
    expected: &D,
    retrieved: &D,
    requirement: Requirement,
    timing: &Timing,
) -> ProbeResult<Consistency> {
    let consistency = compare(expected, retrieved);
    let message = match consistency {
        Consistency::Identical => format!(
            "{} returned a definition identical to {}",
            timing.operation,
            describe(expected)
        ),
        Consistency::VersionSkew {
            expected: wanted,
            retrieved: got,
        } => format!(
            "{} returned version {} of {} while version {} was expected",
            timing.operation,
            got,
            describe(expected),
            wanted
        ),
        Consistency::Divergent => format!(
            "{} returned a definition that differs from {} at the same version",
            timing.operation,
            describe(expected)
        ),
    };
    probe.assert_timed(
        consistency.is_acceptable(),
        assertion_id,
        message,
        requirement,
        timing,
    )?;
    Ok(consistency)
}

pub(crate) fn describe<D: Definition>(definition: &D) -> String {
    format!(
        "{} ({}) v{}",
        definition.name().unwrap_or("<unnamed>"),
        definition.guid().unwrap_or("<no guid>"),
        definition.version()
    )
}
