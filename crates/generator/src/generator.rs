//! EventGenerator - produces banking events at maximum rate

use std::collections::HashMap;

use chrono::Utc;
use contracts::{
    Channel, ContractError, Event, EventType, META_COUNTRY_CODE, META_CURRENCY, META_STATUS,
    META_TRANSACTION_ID,
};
use metrics::counter;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, instrument};

use crate::config::{GeneratorConfig, AMOUNT_RANGE, COUNTRY_CODES, CURRENCIES, STATUSES};

/// Banking event generator
///
/// Owns the monotonic counters behind `Event::id` and `Event::timestamp_us`.
/// Every stream obtained from one generator continues those counters, so ids
/// stay unique for the lifetime of the generator.
pub struct EventGenerator {
    config: GeneratorConfig,
    rng: StdRng,
    next_id: u64,
    last_timestamp_us: i64,
}

impl EventGenerator {
    /// Create a new generator
    ///
    /// # Errors
    /// `ContractError::Production` if the account pool is empty.
    pub fn new(config: GeneratorConfig) -> Result<Self, ContractError> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Ok(Self {
            config,
            rng,
            next_id: 1,
            last_timestamp_us: i64::MIN,
        })
    }

    /// Finite lazy stream of `count` events
    ///
    /// # Errors
    /// `ContractError::Production` if `count == 0`. Fails before anything is generated.
    #[instrument(name = "generator_generate", skip(self))]
    pub fn generate(&mut self, count: u64) -> Result<EventStream<'_>, ContractError> {
        if count == 0 {
            return Err(ContractError::production("event count must be > 0"));
        }
        debug!(count, first_id = self.next_id, "event stream opened");
        Ok(EventStream {
            generator: self,
            remaining: Some(count),
        })
    }

    /// Unbounded lazy stream
    pub fn generate_unbounded(&mut self) -> EventStream<'_> {
        EventStream {
            generator: self,
            remaining: None,
        }
    }

    /// Generate exactly `n` events in one call
    pub fn generate_batch(&mut self, n: usize) -> Result<Vec<Event>, ContractError> {
        let mut stream = self.generate(n as u64)?;
        Ok(stream.next_batch(n))
    }

    /// Id the next event will receive
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    /// Events produced so far by this generator
    pub fn produced(&self) -> u64 {
        self.next_id - 1
    }

    fn next_event(&mut self) -> Event {
        let id = self.next_id;
        self.next_id += 1;

        // Wall clock may step backwards; clamp so timestamps never decrease.
        let now = Utc::now().timestamp_micros();
        self.last_timestamp_us = self.last_timestamp_us.max(now);

        let rng = &mut self.rng;
        let event_type = EventType::ALL[rng.random_range(0..EventType::ALL.len())];
        let channel = Channel::ALL[rng.random_range(0..Channel::ALL.len())];
        let account_id = rng.random_range(1..=self.config.account_pool);

        let magnitude = rng.random_range(AMOUNT_RANGE.0..AMOUNT_RANGE.1);
        let magnitude = (magnitude * 100.0).round() / 100.0;
        let amount = if event_type.is_debit() {
            -magnitude
        } else {
            magnitude
        };

        let mut metadata = HashMap::with_capacity(4);
        metadata.insert(META_CURRENCY.to_string(), pick(rng, CURRENCIES));
        metadata.insert(META_STATUS.to_string(), pick(rng, STATUSES));
        metadata.insert(META_COUNTRY_CODE.to_string(), pick(rng, COUNTRY_CODES));
        metadata.insert(META_TRANSACTION_ID.to_string(), format!("TXN{id:010}"));

        Event {
            id,
            event_type,
            account_id,
            amount,
            timestamp_us: self.last_timestamp_us,
            channel,
            metadata,
        }
    }
}

fn pick(rng: &mut StdRng, values: &[&str]) -> String {
    values.choose(rng).copied().unwrap_or_default().to_string()
}

/// Lazy event sequence borrowed from an [`EventGenerator`]
///
/// Not restartable: a new call to `generate` opens a new logical stream.
pub struct EventStream<'a> {
    generator: &'a mut EventGenerator,
    remaining: Option<u64>,
}

impl EventStream<'_> {
    /// Generate up to `n` events in one call, in id order
    ///
    /// Returns fewer than `n` only when a bounded stream runs out.
    pub fn next_batch(&mut self, n: usize) -> Vec<Event> {
        let take = match self.remaining {
            Some(remaining) => n.min(remaining as usize),
            None => n,
        };
        let mut batch = Vec::with_capacity(take);
        for _ in 0..take {
            batch.push(self.generator.next_event());
        }
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= take as u64;
        }
        counter!("dispatch_bench_events_generated_total").increment(take as u64);
        batch
    }

    /// Events still to come, `None` for an unbounded stream
    pub fn remaining(&self) -> Option<u64> {
        self.remaining
    }
}

impl Iterator for EventStream<'_> {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        match self.remaining.as_mut() {
            Some(0) => return None,
            Some(remaining) => *remaining -= 1,
            None => {}
        }
        counter!("dispatch_bench_events_generated_total").increment(1);
        Some(self.generator.next_event())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self.remaining {
            Some(n) => (n as usize, Some(n as usize)),
            None => (usize::MAX, None),
        }
    }
}
