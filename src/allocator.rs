// src/allocator.rs

//! Value reference allocation
//!
//! Variables may pin their FMI value reference explicitly or carry the
//! automatic sentinel. Allocation walks the variables in declaration order
//! and gives every automatic variable the smallest positive integer not yet
//! taken, so the same model always produces the same assignment.

use std::collections::HashSet;

use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{AUTO_VALUE_REF, ModelSpec};

/// Assign value references to every variable still carrying the automatic
/// sentinel. Explicit references are left untouched and act as holes the
/// scan skips over.
///
/// The scan cursor never moves backwards: each allocation resumes from the
/// previously assigned reference, which keeps the pass linear over the
/// combined variable and reference range.
pub fn allocate_value_references(model: &mut ModelSpec) -> Result<()> {
    let mut used: HashSet<i32> = model
        .variables
        .iter()
        .map(|v| v.value_ref)
        .filter(|&r| r != AUTO_VALUE_REF)
        .collect();

    let mut cursor: i32 = 1;
    for var in &mut model.variables {
        if var.value_ref != AUTO_VALUE_REF {
            continue;
        }
        while used.contains(&cursor) {
            cursor = cursor
                .checked_add(1)
                .ok_or(Error::ValueReferencesExhausted)?;
        }
        var.value_ref = cursor;
        used.insert(cursor);
        debug!(name = %var.name, value_ref = cursor, "allocated value reference");
    }
    Ok(())
}
