//! Basis precisions and the round-robin candidate order

/// Per-basis weight precisions together with the active mask
///
/// A basis is active exactly when its precision is finite; inactive bases
/// hold `f64::INFINITY`, which pins their weight to zero. Mutation goes
/// through [`activate`](Self::activate) and [`deactivate`](Self::deactivate)
/// so the two views cannot drift apart.
#[derive(Debug, Clone, PartialEq)]
pub struct PrecisionVector {
    alpha: Vec<f64>,
    active: Vec<bool>,
}

impl PrecisionVector {
    /// All `n_bases` bases inactive
    pub fn new(n_bases: usize) -> Self {
        Self {
            alpha: vec![f64::INFINITY; n_bases],
            active: vec![false; n_bases],
        }
    }

    /// Number of candidate bases
    pub fn len(&self) -> usize {
        self.alpha.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alpha.is_empty()
    }

    /// Precision of basis `i` (infinite when inactive)
    pub fn get(&self, i: usize) -> f64 {
        self.alpha[i]
    }

    pub fn is_active(&self, i: usize) -> bool {
        self.active[i]
    }

    /// Include basis `i` with the given finite, positive precision
    ///
    /// Also used to re-estimate an already active basis.
    ///
    /// # Panics
    /// Panics if `alpha` is not finite and positive
    pub fn activate(&mut self, i: usize, alpha: f64) {
        assert!(
            alpha.is_finite() && alpha > 0.0,
            "Active precision must be finite and positive, got: {alpha}"
        );
        self.alpha[i] = alpha;
        self.active[i] = true;
    }

    /// Exclude basis `i`
    pub fn deactivate(&mut self, i: usize) {
        self.alpha[i] = f64::INFINITY;
        self.active[i] = false;
    }

    /// Number of active bases
    pub fn n_active(&self) -> usize {
        self.active.iter().filter(|&&a| a).count()
    }

    /// Indices of active bases in ascending order
    pub fn active_indices(&self) -> Vec<usize> {
        self.active
            .iter()
            .enumerate()
            .filter_map(|(i, &a)| a.then_some(i))
            .collect()
    }

    /// Indices of inactive bases in ascending order
    pub fn inactive_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.active
            .iter()
            .enumerate()
            .filter_map(|(i, &a)| (!a).then_some(i))
    }

    /// Full precision vector, infinite entries included
    pub fn as_slice(&self) -> &[f64] {
        &self.alpha
    }

    /// Active mask
    pub fn mask(&self) -> &[bool] {
        &self.active
    }
}

/// Cyclic visiting order over candidate bases
///
/// Taking the head and requeueing it at the tail of a full-length queue is a
/// rotation, so a fixed index array with a moving head is enough.
#[derive(Debug, Clone)]
pub struct CandidateQueue {
    order: Vec<usize>,
    head: usize,
}

impl CandidateQueue {
    /// Visit bases `0..n_bases` in ascending order, then wrap around
    pub fn new(n_bases: usize) -> Self {
        Self::with_order((0..n_bases).collect())
    }

    /// Visit bases in the given order, then wrap around
    ///
    /// # Panics
    /// Panics if `order` is empty
    pub fn with_order(order: Vec<usize>) -> Self {
        assert!(!order.is_empty(), "Candidate order must not be empty");
        Self { order, head: 0 }
    }

    /// Take the head candidate and move it to the tail
    pub fn next_candidate(&mut self) -> usize {
        let candidate = self.order[self.head];
        self.head = (self.head + 1) % self.order.len();
        candidate
    }

    /// Candidate that the next call will return
    pub fn peek(&self) -> usize {
        self.order[self.head]
    }
}
