/// Number of progress batches for `file_count` files: `log2(file_count)`, at least one.
#[must_use]
pub fn progress_granularity(file_count: usize) -> usize {
    file_count.checked_ilog2().unwrap_or(0).max(1) as usize
}

/// Reports progress once per batch instead of once per item.
///
/// With `granularity` batches the callback fires at most `granularity - 1` times while work
/// is in flight and exactly once more from [`ProgressBatcher::finish`] with `1.0`.
pub struct ProgressBatcher<'a> {
    total: usize,
    batch_size: usize,
    done: usize,
    on_progress: &'a mut dyn FnMut(f32),
}

impl<'a> ProgressBatcher<'a> {
    pub fn new(total: usize, granularity: usize, on_progress: &'a mut dyn FnMut(f32)) -> Self {
        let batches = granularity.max(1);
        Self {
            total,
            batch_size: total.div_ceil(batches).max(1),
            done: 0,
            on_progress,
        }
    }

    pub fn advance(&mut self) {
        self.done += 1;
        if self.done < self.total && self.done % self.batch_size == 0 {
            (self.on_progress)(self.done as f32 / self.total as f32);
        }
    }

    pub fn finish(self) {
        (self.on_progress)(1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn granularity_is_log2_with_floor_of_one() {
        assert_eq!(progress_granularity(0), 1);
        assert_eq!(progress_granularity(1), 1);
        assert_eq!(progress_granularity(2), 1);
        assert_eq!(progress_granularity(1024), 10);
        assert_eq!(progress_granularity(1500), 10);
    }

    #[test]
    fn callbacks_are_bounded_by_granularity() {
        for (total, granularity) in [(0, 3), (1, 1), (7, 3), (100, 6), (1000, 9)] {
            let mut calls = Vec::new();
            let mut record = |p: f32| calls.push(p);
            let mut batcher = ProgressBatcher::new(total, granularity, &mut record);
            for _ in 0..total {
                batcher.advance();
            }
            batcher.finish();

            assert!(calls.len() <= granularity + 1, "{total}/{granularity}: {calls:?}");
            assert_eq!(calls.last().copied(), Some(1.0));
            assert!(calls.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
