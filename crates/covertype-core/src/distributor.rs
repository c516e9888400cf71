//! Batch distribution: validation, time gate, sampling and persistence
//!
//! Every request runs read ledger -> decide gate -> sample -> persist under
//! a single lock, so concurrent requests for the same group cannot both
//! observe an open gate and double-advance the counter.

use crate::clock::Clock;
use crate::dataset::{Dataset, Record};
use crate::error::{Error, Result};
use crate::ledger::{LedgerEntry, LedgerStore};
use crate::partition::Partitions;
use crate::rng::SampleRng;
use crate::GROUP_COUNT;
use serde::Serialize;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// A sample handed out to a group
#[derive(Debug, Clone, Serialize)]
pub struct Batch {
    pub group_number: usize,
    pub batch_number: i64,
    pub data: Vec<Record>,
}

/// Mutable state guarded by the distributor lock
struct State {
    ledger: LedgerStore,
    rng: SampleRng,
}

/// The batch distribution service
pub struct Distributor {
    dataset: Dataset,
    partitions: Partitions,
    clock: Box<dyn Clock>,
    state: Mutex<State>,
}

impl Distributor {
    /// Create a distributor over a loaded dataset and ledger
    pub fn new(
        dataset: Dataset,
        ledger: LedgerStore,
        clock: impl Clock + 'static,
        rng: SampleRng,
    ) -> Self {
        let partitions = Partitions::new(dataset.len());
        info!(
            rows = dataset.len(),
            batch_size = partitions.batch_size(),
            sample_size = partitions.required_sample_size(),
            "partitioned dataset"
        );
        Self {
            dataset,
            partitions,
            clock: Box::new(clock),
            state: Mutex::new(State { ledger, rng }),
        }
    }

    /// Partition layout in use
    pub fn partitions(&self) -> &Partitions {
        &self.partitions
    }

    /// Copy of every group's ledger entry, index 0 is group 1
    pub fn snapshot(&self) -> Vec<LedgerEntry> {
        self.lock().ledger.entries().to_vec()
    }

    /// Hand out a random sample from the group's current batch
    ///
    /// The batch counter advances only when more than
    /// [`MIN_UPDATE_SECS`](crate::MIN_UPDATE_SECS) have passed since the
    /// last advance; inside that window the same batch number is reported
    /// with freshly drawn rows.
    pub fn get_batch(&self, group_number: i64) -> Result<Batch> {
        let group = validate_group(group_number)?;
        let mut state = self.lock();

        let current = state.ledger.entry(group);
        if current.is_exhausted() {
            debug!(group, "group already exhausted");
            return Err(Error::AlreadyExhausted(group));
        }

        let now = self.clock.now();
        let next = if current.gate_open(now) {
            current.advanced(now)
        } else {
            current
        };

        let data = self.sample(group, &mut state.rng)?;
        state.ledger.update(group, next)?;

        if next.batch_count != current.batch_count {
            info!(group, batch = next.batch_count, "advanced batch");
        }
        debug!(group, batch = next.batch_count, rows = data.len(), "served sample");

        Ok(Batch {
            group_number: group,
            batch_number: next.batch_count,
            data,
        })
    }

    /// Put a group back to its never-served state
    pub fn reset_group(&self, group_number: i64) -> Result<()> {
        let group = validate_group(group_number)?;
        self.lock().ledger.update(group, LedgerEntry::FRESH)?;
        info!(group, "reset group");
        Ok(())
    }

    /// Draw the required number of rows from the group's partition
    fn sample(&self, group: usize, rng: &mut SampleRng) -> Result<Vec<Record>> {
        let range = self.partitions.range(group);
        let required = self.partitions.required_sample_size();
        if range.len() < required {
            return Err(Error::InsufficientData {
                group,
                available: range.len(),
                required,
            });
        }

        let partition = &self.dataset.records()[range];
        Ok(rng
            .sample_indices(partition.len(), required)
            .into_iter()
            .map(|i| partition[i].clone())
            .collect())
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn validate_group(group_number: i64) -> Result<usize> {
    if (1..=GROUP_COUNT as i64).contains(&group_number) {
        Ok(group_number as usize)
    } else {
        Err(Error::InvalidGroup(group_number))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::MAX_BATCH_COUNT;
    use std::collections::HashSet;
    use std::fs;
    use std::sync::Arc;
    use tempfile::{tempdir, TempDir};

    const START: f64 = 1_700_000_000.0;

    fn dataset(rows: usize) -> Dataset {
        let records = (0..rows)
            .map(|i| vec![i.to_string(), format!("label-{}", i % 7)])
            .collect();
        Dataset::from_records(vec!["id".to_string(), "label".to_string()], records)
    }

    struct Fixture {
        dir: TempDir,
        clock: Arc<ManualClock>,
        distributor: Distributor,
    }

    impl Fixture {
        fn new(rows: usize) -> Self {
            let dir = tempdir().unwrap();
            let clock = Arc::new(ManualClock::new(START));
            let ledger = LedgerStore::open(dir.path().join("timestamps.json")).unwrap();
            let distributor =
                Distributor::new(dataset(rows), ledger, clock.clone(), SampleRng::new(42));
            Self {
                dir,
                clock,
                distributor,
            }
        }

        fn ledger_bytes(&self) -> Vec<u8> {
            fs::read(self.dir.path().join("timestamps.json")).unwrap()
        }
    }

    #[test]
    fn test_invalid_groups_rejected_without_mutation() {
        let fx = Fixture::new(1000);
        let before = fx.ledger_bytes();
        for group in [-1, 0, 11, 100] {
            assert!(matches!(
                fx.distributor.get_batch(group),
                Err(Error::InvalidGroup(g)) if g == group
            ));
            assert!(matches!(
                fx.distributor.reset_group(group),
                Err(Error::InvalidGroup(_))
            ));
        }
        assert_eq!(fx.ledger_bytes(), before);
        assert!(fx.distributor.snapshot().iter().all(|e| *e == LedgerEntry::FRESH));
    }

    #[test]
    fn test_first_call_and_throttle_window() {
        let fx = Fixture::new(1000);

        let first = fx.distributor.get_batch(3).unwrap();
        assert_eq!(first.group_number, 3);
        assert_eq!(first.batch_number, 1);
        assert_eq!(first.data.len(), 10);

        fx.clock.advance(1.0);
        let second = fx.distributor.get_batch(3).unwrap();
        assert_eq!(second.batch_number, 1);
        assert_eq!(second.data.len(), 10);

        fx.clock.set(START + 301.0);
        let third = fx.distributor.get_batch(3).unwrap();
        assert_eq!(third.batch_number, 2);
    }

    #[test]
    fn test_window_keeps_last_update_time() {
        let fx = Fixture::new(1000);
        fx.distributor.get_batch(5).unwrap();
        fx.clock.advance(299.0);
        fx.distributor.get_batch(5).unwrap();
        assert_eq!(fx.distributor.snapshot()[4].last_update_time, START);

        // Still measured from the first advance, not the last request
        fx.clock.advance(2.0);
        assert_eq!(fx.distributor.get_batch(5).unwrap().batch_number, 2);
    }

    #[test]
    fn test_samples_come_from_own_partition() {
        let fx = Fixture::new(1000);
        for _ in 0..20 {
            let batch = fx.distributor.get_batch(4).unwrap();
            let ids: HashSet<usize> = batch
                .data
                .iter()
                .map(|row| row[0].parse().unwrap())
                .collect();
            assert_eq!(ids.len(), 10);
            assert!(ids.iter().all(|id| (300..400).contains(id)));
        }
    }

    #[test]
    fn test_window_draws_fresh_rows() {
        let fx = Fixture::new(1000);
        let first = fx.distributor.get_batch(1).unwrap();
        let second = fx.distributor.get_batch(1).unwrap();
        assert_eq!(first.batch_number, second.batch_number);
        assert_ne!(first.data, second.data);
    }

    #[test]
    fn test_exhaustion_after_nine_advances() {
        let fx = Fixture::new(1000);
        let mut numbers = Vec::new();
        for _ in 0..10 {
            match fx.distributor.get_batch(3) {
                Ok(batch) => numbers.push(batch.batch_number),
                Err(Error::AlreadyExhausted(3)) => break,
                Err(other) => panic!("unexpected error: {other}"),
            }
            fx.clock.advance(301.0);
        }
        assert_eq!(numbers, (1..=MAX_BATCH_COUNT).collect::<Vec<_>>());

        let before = fx.ledger_bytes();
        for _ in 0..3 {
            fx.clock.advance(1_000.0);
            assert!(matches!(
                fx.distributor.get_batch(3),
                Err(Error::AlreadyExhausted(3))
            ));
        }
        assert_eq!(fx.ledger_bytes(), before);
    }

    #[test]
    fn test_reset_round_trip() {
        let fx = Fixture::new(1000);
        fx.distributor.get_batch(2).unwrap();
        fx.clock.advance(400.0);
        assert_eq!(fx.distributor.get_batch(2).unwrap().batch_number, 2);

        fx.distributor.reset_group(2).unwrap();
        assert_eq!(fx.distributor.snapshot()[1], LedgerEntry::FRESH);
        assert_eq!(fx.distributor.get_batch(2).unwrap().batch_number, 1);
    }

    #[test]
    fn test_reset_revives_exhausted_group() {
        let fx = Fixture::new(1000);
        for _ in 0..10 {
            let _ = fx.distributor.get_batch(9);
            fx.clock.advance(301.0);
        }
        assert!(fx.distributor.snapshot()[8].is_exhausted());
        fx.distributor.reset_group(9).unwrap();
        assert_eq!(fx.distributor.get_batch(9).unwrap().batch_number, 1);
    }

    #[test]
    fn test_groups_are_independent() {
        let fx = Fixture::new(1000);
        fx.distributor.get_batch(1).unwrap();
        fx.clock.advance(10.0);
        fx.distributor.get_batch(2).unwrap();

        let snapshot = fx.distributor.snapshot();
        assert_eq!(snapshot[0].last_update_time, START);
        assert_eq!(snapshot[1].last_update_time, START + 10.0);
        assert!(snapshot[2..].iter().all(|e| *e == LedgerEntry::FRESH));
    }

    #[test]
    fn test_sample_size_small_dataset() {
        let fx = Fixture::new(50);
        let batch = fx.distributor.get_batch(10).unwrap();
        assert_eq!(batch.data.len(), 1);
    }

    #[test]
    fn test_insufficient_data_leaves_ledger_untouched() {
        let fx = Fixture::new(9);
        let before = fx.ledger_bytes();
        assert!(matches!(
            fx.distributor.get_batch(1),
            Err(Error::InsufficientData {
                group: 1,
                available: 0,
                required: 1
            })
        ));
        assert_eq!(fx.ledger_bytes(), before);
        assert_eq!(fx.distributor.snapshot()[0], LedgerEntry::FRESH);
    }

    #[test]
    fn test_restart_preserves_gating() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("timestamps.json");
        let clock = Arc::new(ManualClock::new(START));

        let distributor = Distributor::new(
            dataset(1000),
            LedgerStore::open(&path).unwrap(),
            clock.clone(),
            SampleRng::new(1),
        );
        distributor.get_batch(6).unwrap();
        drop(distributor);

        let restarted = Distributor::new(
            dataset(1000),
            LedgerStore::open(&path).unwrap(),
            clock.clone(),
            SampleRng::new(2),
        );
        clock.advance(5.0);
        assert_eq!(restarted.get_batch(6).unwrap().batch_number, 1);
        clock.advance(300.0);
        assert_eq!(restarted.get_batch(6).unwrap().batch_number, 2);
    }

    #[test]
    fn test_persistence_failure_surfaces() {
        let fx = Fixture::new(1000);
        let path = fx.dir.path().join("timestamps.json");
        fs::remove_file(&path).unwrap();
        fs::create_dir(&path).unwrap();

        assert!(matches!(
            fx.distributor.get_batch(1),
            Err(Error::Persistence(_))
        ));
        assert_eq!(fx.distributor.snapshot()[0], LedgerEntry::FRESH);
    }

    #[test]
    fn test_concurrent_requests_advance_once() {
        let fx = Fixture::new(1000);
        let distributor = Arc::new(fx.distributor);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let distributor = distributor.clone();
                std::thread::spawn(move || distributor.get_batch(7).unwrap().batch_number)
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), 1);
        }
        assert_eq!(distributor.snapshot()[6].batch_count, 1);
    }
}
