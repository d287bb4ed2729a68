use crate::core::models::structure::Structure;

/// Padded sequence length for a structure of `real_len` residues.
///
/// The result is at least `window_size` and a multiple of `window_step`, and
/// one extra step of slack is always added, even when `max(window_size,
/// real_len)` is already aligned. `window_step` must be non-zero; configs
/// reject zero steps before this is called.
pub fn compute_pad_len(real_len: usize, window_size: usize, window_step: usize) -> usize {
    debug_assert!(window_step > 0);
    let pad_len = window_size.max(real_len);
    pad_len + (window_step - pad_len % window_step)
}

/// Residue count of a structure, counted as its alpha carbons.
pub fn real_len_of_structure(structure: &Structure) -> usize {
    structure.ca_count()
}
