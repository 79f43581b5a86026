//! Scripted aggregation client for unit testing.
//!
//! Records every request and answers from per-window scripts, falling back
//! to a default answer.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, TimeZone};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::{
    aggregation::{fixed, record, Aggregation, AggregationClient, AggregationRequest},
    error::AggregationError,
};

/// What a scripted call answers with.
#[derive(Debug, Clone, PartialEq)]
pub enum MockOutcome {
    /// Rows of `(key, count)`, keyed with the request's grouping field.
    Rows(Vec<(String, u64)>),
    NoResults,
    /// Fails with `AggregationError::Unavailable`.
    Fail(String),
}

impl MockOutcome {
    pub fn rows(pairs: &[(&str, u64)]) -> Self {
        MockOutcome::Rows(pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect())
    }
}

#[derive(Debug, Clone)]
struct Scripted {
    outcome: MockOutcome,
    delay: Duration,
}

/// Mock implementation of `AggregationClient`.
pub struct MockAggregationClient {
    calls: Mutex<Vec<AggregationRequest>>,
    scripts: Mutex<HashMap<DateTime<FixedOffset>, VecDeque<Scripted>>>,
    default: Mutex<MockOutcome>,
}

impl Default for MockAggregationClient {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl MockAggregationClient {
    /// Answers `no_results` to anything not scripted.
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            scripts: Mutex::new(HashMap::new()),
            default: Mutex::new(MockOutcome::NoResults),
        }
    }

    /// Answer for windows without a script of their own.
    pub fn with_default(self, outcome: MockOutcome) -> Self {
        *lock(&self.default) = outcome;
        self
    }

    /// Queue an answer for the window starting at `start`.
    pub fn with_response<Tz: TimeZone>(self, start: &DateTime<Tz>, outcome: MockOutcome) -> Self {
        self.with_delayed_response(start, outcome, Duration::ZERO)
    }

    /// Queue an answer that arrives only after `delay`.
    pub fn with_delayed_response<Tz: TimeZone>(
        self,
        start: &DateTime<Tz>,
        outcome: MockOutcome,
        delay: Duration,
    ) -> Self {
        lock(&self.scripts)
            .entry(fixed(start))
            .or_default()
            .push_back(Scripted { outcome, delay });
        self
    }

    /// Every request received so far, in order.
    pub fn calls(&self) -> Vec<AggregationRequest> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Period labels of every request so far.
    pub fn labels(&self) -> Vec<String> {
        lock(&self.calls).iter().map(AggregationRequest::label).collect()
    }

    fn next_answer(&self, request: &AggregationRequest) -> Scripted {
        let scripted = lock(&self.scripts)
            .get_mut(&request.from)
            .and_then(VecDeque::pop_front);
        scripted.unwrap_or_else(|| Scripted {
            outcome: lock(&self.default).clone(),
            delay: Duration::ZERO,
        })
    }
}

#[async_trait]
impl AggregationClient for MockAggregationClient {
    async fn fetch(&self, request: &AggregationRequest) -> Result<Aggregation, AggregationError> {
        lock(&self.calls).push(request.clone());
        let answer = self.next_answer(request);
        if !answer.delay.is_zero() {
            tokio::time::sleep(answer.delay).await;
        }
        let key_field = request.group_by.key_field();
        match answer.outcome {
            MockOutcome::Rows(rows) => Ok(Aggregation::Records(
                rows.iter()
                    .map(|(key, count)| record(key_field, key, *count))
                    .collect(),
            )),
            MockOutcome::NoResults => Ok(Aggregation::NoResults),
            MockOutcome::Fail(message) => Err(AggregationError::Unavailable(message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        aggregation::GroupBy,
        ranking::Entry,
        scale::ScaleUnit,
        window::compute_window,
    };
    use chrono::Utc;

    fn request(year: i32, group_by: GroupBy) -> AggregationRequest {
        let anchor = Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).unwrap();
        let window = compute_window(&anchor, ScaleUnit::Year).unwrap();
        AggregationRequest::for_window(&window, group_by, "prodaccepted", false)
    }

    #[tokio::test]
    async fn test_scripts_are_consumed_in_order() {
        let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let mock = MockAggregationClient::new()
            .with_response(&start, MockOutcome::rows(&[("a", 1)]))
            .with_response(&start, MockOutcome::Fail("down".to_string()));

        let first = mock.fetch(&request(2020, GroupBy::SpId)).await.unwrap();
        assert_eq!(first.counts("sp_entity_id"), vec![Entry::new("a", 1)]);
        let second = mock.fetch(&request(2020, GroupBy::SpId)).await;
        assert!(matches!(second, Err(AggregationError::Unavailable(_))));
        let third = mock.fetch(&request(2020, GroupBy::SpId)).await.unwrap();
        assert_eq!(third, Aggregation::NoResults);
        assert_eq!(mock.labels(), vec!["2020", "2020", "2020"]);
    }

    #[tokio::test]
    async fn test_rows_use_the_requested_grouping_field() {
        let mock = MockAggregationClient::new().with_default(MockOutcome::rows(&[("x", 4)]));
        let answer = mock.fetch(&request(2021, GroupBy::IdpId)).await.unwrap();
        assert_eq!(answer.counts("idp_entity_id"), vec![Entry::new("x", 4)]);
        assert!(answer.counts("sp_entity_id").is_empty());
        assert_eq!(mock.call_count(), 1);
        assert_eq!(mock.calls()[0].group_by, GroupBy::IdpId);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delayed_response() {
        let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let mock = MockAggregationClient::new().with_delayed_response(
            &start,
            MockOutcome::NoResults,
            Duration::from_secs(3),
        );
        let before = tokio::time::Instant::now();
        mock.fetch(&request(2020, GroupBy::SpId)).await.unwrap();
        assert!(before.elapsed() >= Duration::from_secs(3));
    }
}
