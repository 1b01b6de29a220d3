// Copyright (C) 2024 Ethan Uppal.
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! Building hierarchical net names.
//!
//! Synthesized netlists flatten multi-bit wires into one name per bit (`A_3`),
//! but the simulator only knows them by their bit-select (`A[3]`).
//!
//! [`crate::NetControl`] takes names verbatim apart from [`qualify`]. The other
//! helpers are for fault-injection drivers that read net names out of a
//! netlist or a sampled fault list and need the simulator's spelling.

/// `base[index]`.
pub fn bit_select(base: &str, index: usize) -> String {
    format!("{base}[{index}]")
}

/// Turns a flattened bit name such as `sum_12` back into `sum[12]`. Returns
/// `None` if `flat` does not end in `_<index>` or has an empty base.
pub fn unflatten(flat: &str) -> Option<String> {
    let (base, index) = flat.rsplit_once('_')?;
    if base.is_empty() || index.is_empty() {
        return None;
    }
    let index = index.parse::<usize>().ok()?;
    Some(bit_select(base, index))
}

/// Prefixes `name` with the hierarchy `scope`, unless `name` is already
/// rooted there.
pub fn qualify(scope: Option<&str>, name: &str) -> String {
    match scope.map(|scope| scope.trim_end_matches('.')) {
        Some(scope) if !scope.is_empty() => {
            let rooted = name
                .strip_prefix(scope)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'));
            if rooted {
                name.to_string()
            } else {
                format!("{scope}.{name}")
            }
        }
        _ => name.to_string(),
    }
}
