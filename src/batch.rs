/// Split an ordered list of record indices into submission chunks.
///
/// Indices keep their store identity, so a filtered subset (e.g. only
/// records missing a field) still merges back to the right rows.
pub fn plan(indices: &[usize], size: usize) -> impl Iterator<Item = &[usize]> + '_ {
    assert!(size > 0, "chunk size must be positive");
    indices.chunks(size)
}

pub fn chunk_count(total: usize, size: usize) -> usize {
    total.div_ceil(size)
}

// ── Tests ──
