pub mod ops;
pub mod scenario;

use tree::{Action, FlatView, Mutation, RecordId, Root};

pub fn diff_lines(expected: &[String], actual: &[String]) -> String {
    let max = expected.len().max(actual.len());
    let mut out = String::new();
    use std::fmt::Write;
    let missing = "<missing>";
    let mismatch = (0..max).find(|&i| expected.get(i) != actual.get(i));
    if let Some(i) = mismatch {
        let start = i.saturating_sub(2);
        let end = (i + 3).min(max);
        let _ = writeln!(
            &mut out,
            "first mismatch at line {} (showing {}..={}):",
            i + 1,
            start + 1,
            end
        );
        for line_idx in start..end {
            let left = expected
                .get(line_idx)
                .map(String::as_str)
                .unwrap_or(missing);
            let right = actual.get(line_idx).map(String::as_str).unwrap_or(missing);
            let marker = if line_idx == i { ">" } else { " " };
            let _ = writeln!(&mut out, "{marker} {:>4}  expected: {left}", line_idx + 1);
            let _ = writeln!(&mut out, "{marker} {:>4}    actual: {right}", line_idx + 1);
        }
    }
    let _ = writeln!(
        &mut out,
        "expected {} lines, actual {} lines",
        expected.len(),
        actual.len()
    );
    out
}

/// Deterministic generator for randomized operation streams.
pub struct Lcg {
    state: u64,
}

impl Lcg {
    pub fn new(seed: u64) -> Self {
        let state = if seed == 0 { 0x9e3779b97f4a7c15 } else { seed };
        Self { state }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.state
    }

    /// Uniform-ish value in `0..upper`; 0 when `upper` is 0.
    pub fn below(&mut self, upper: usize) -> usize {
        if upper == 0 {
            return 0;
        }
        ((self.next_u64() >> 33) % upper as u64) as usize
    }

    pub fn chance(&mut self, percent: u64) -> bool {
        (self.next_u64() >> 33) % 100 < percent
    }
}

/// Consumer-side copy of the view, kept current only from emitted
/// mutations.
#[derive(Clone, Debug, Default)]
pub struct ViewMirror {
    rows: Vec<RecordId>,
}

impl ViewMirror {
    pub fn new(view: &FlatView) -> Self {
        Self {
            rows: view.rows().to_vec(),
        }
    }

    pub fn rows(&self) -> &[RecordId] {
        &self.rows
    }

    /// Replays the view-rooted splices of `mutations` in order. A replace
    /// re-reads `view`. Deleted ids must match the mirrored rows.
    pub fn replay(&mut self, mutations: &[Mutation], view: &FlatView) -> Result<(), String> {
        for (n, mutation) in mutations.iter().enumerate() {
            if mutation.root() != Root::View || !mutation.path.is_root() {
                continue;
            }
            match &mutation.action {
                Action::Splice {
                    index,
                    added,
                    deleted,
                } => {
                    let end = index + deleted.len();
                    if end > self.rows.len() {
                        return Err(format!(
                            "mutation {n}: splice {index}..{end} past mirror length {}",
                            self.rows.len()
                        ));
                    }
                    if self.rows[*index..end] != deleted[..] {
                        return Err(format!(
                            "mutation {n}: deleted {deleted:?}, mirror holds {:?}",
                            &self.rows[*index..end]
                        ));
                    }
                    self.rows.splice(*index..end, added.iter().copied());
                }
                Action::Replace => self.rows = view.rows().to_vec(),
                _ => {}
            }
        }
        Ok(())
    }
}
