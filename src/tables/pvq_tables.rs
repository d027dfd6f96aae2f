//! Combinatorial tables backing the PVQ enumeration (§ 4.3): the number of
//! length-`n` integer vectors whose absolute values sum to exactly `k`,
//! `pyramid_count(n, k)`, from which the `A(n,k)`/`U(n,k)` pair and
//! the enumeration size `1 + U(N,K) + H(N,K+1)` are all derived. Computed by
//! dynamic programming and cached, rather than a giant literal table, since
//! `(n, k)` pairs used by SNS/TNS-adjacent PVQ searches vary with frame
//! duration and band count.

use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::sync::Mutex;

/// Number of length-`n` integer vectors with `sum(|x_i|) == k`. This is the
/// `A(n,k)` combinatorial offset table of § 4.3: `A(n,0) = 1` for all `n`
/// (the zero vector), `A(1,k) = 2` for `k > 0` (one magnitude, two signs),
/// and `A(n,k) = A(n-1,k) + 2 * sum_{j=1}^{k} A(n-1,k-j)` for `n > 1`.
pub fn pyramid_count(n: usize, k: usize) -> u64 {
    if n == 0 {
        return if k == 0 { 1 } else { 0 };
    }
    cache()
        .lock()
        .expect("pvq table cache poisoned")
        .entry((n, k))
        .or_insert_with(|| compute(n, k))
        .to_owned()
}

fn compute(n: usize, k: usize) -> u64 {
    if n == 1 {
        return if k == 0 { 1 } else { 2 };
    }
    if k == 0 {
        return 1;
    }
    let mut total = pyramid_count(n - 1, k);
    for j in 1..=k {
        total = total.saturating_add(2 * pyramid_count(n - 1, k - j));
    }
    total
}

fn cache() -> &'static Mutex<HashMap<(usize, usize), u64>> {
    static CACHE: OnceCell<Mutex<HashMap<(usize, usize), u64>>> = OnceCell::new();
    CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// `U(n,k) = (A(n,k) + 1) / 2`, the "unsigned" half of the enumeration used
/// when building offsets for the leading-sign-then-magnitude index layout.
pub fn u_table(n: usize, k: usize) -> u64 {
    (pyramid_count(n, k) + 1) / 2
}
