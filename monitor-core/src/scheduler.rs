use anyhow::{Context, Result};
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    Alert, AlertEngine, ChartSink, FetchError, FetchFailure, Reading, ReadingStore, Summary,
    WeatherSource, summary::summarize,
};

/// What one FETCHING -> STORING -> REPORTING pass produced.
#[derive(Debug)]
pub struct CycleReport {
    pub cycle: u64,
    /// Successful readings, in configured city order.
    pub readings: Vec<Reading>,
    pub failures: Vec<FetchFailure>,
    pub summary: Option<Summary>,
    pub alerts: Vec<Alert>,
}

/// Drives the poll loop. Owns the store for as long as it runs.
pub struct Scheduler {
    source: Arc<dyn WeatherSource>,
    store: ReadingStore,
    alerts: AlertEngine,
    chart: Option<Box<dyn ChartSink>>,
    cities: Vec<String>,
    interval: Duration,
    cycle: u64,
}

impl Scheduler {
    pub fn new(
        source: Arc<dyn WeatherSource>,
        store: ReadingStore,
        alerts: AlertEngine,
        cities: Vec<String>,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            store,
            alerts,
            chart: None,
            cities,
            interval,
            cycle: 0,
        }
    }

    pub fn with_chart(mut self, chart: Box<dyn ChartSink>) -> Self {
        self.chart = Some(chart);
        self
    }

    pub fn store(&self) -> &ReadingStore {
        &self.store
    }

    pub fn into_store(self) -> ReadingStore {
        self.store
    }

    /// Fetch every city concurrently; results come back in configured order.
    async fn fetch_all(&self) -> (Vec<Reading>, Vec<FetchFailure>) {
        let handles: Vec<_> = self
            .cities
            .iter()
            .map(|city| {
                let source = Arc::clone(&self.source);
                let city = city.clone();
                (city.clone(), tokio::spawn(async move { source.fetch(&city).await }))
            })
            .collect();

        let mut readings = Vec::with_capacity(handles.len());
        let mut failures = Vec::new();
        for (city, handle) in handles {
            match handle.await {
                Ok(Ok(reading)) => readings.push(reading),
                Ok(Err(failure)) => {
                    warn!(city = %failure.city, "Error fetching data: {}", failure.error);
                    failures.push(failure);
                }
                Err(join_err) => {
                    warn!(city = %city, "Fetch task failed: {join_err}");
                    failures.push(FetchFailure::new(city, FetchError::Task(join_err.to_string())));
                }
            }
        }
        (readings, failures)
    }

    /// Run a single cycle. Only a failed insert aborts it; alerts are evaluated
    /// as soon as the batch is stored.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        self.cycle += 1;
        let cycle = self.cycle;

        let (readings, failures) = self.fetch_all().await;

        self.store.insert_batch(&readings).with_context(|| {
            format!("cycle {cycle}: {} readings were dropped", readings.len())
        })?;

        let alerts = self.alerts.evaluate(&readings);

        let summary = match summarize(&self.store) {
            Ok(summary) => summary,
            Err(err) => {
                error!(cycle, "Daily summary unavailable, readings are stored: {err:#}");
                None
            }
        };

        if let Some(chart) = &self.chart {
            match self.store.query_all() {
                Ok(history) => {
                    if let Err(err) = chart.render(&history) {
                        warn!("Chart rendering failed: {err:#}");
                    }
                }
                Err(err) => warn!("Could not load history for chart: {err:#}"),
            }
        }

        info!(
            cycle,
            stored = readings.len(),
            failed = failures.len(),
            alerts = alerts.len(),
            "Data fetched and stored"
        );

        Ok(CycleReport { cycle, readings, failures, summary, alerts })
    }

    /// Loop until `cancel` fires or `max_cycles` have run, sleeping between cycles.
    ///
    /// A cycle whose data could not be stored is logged and skipped; the loop keeps going.
    pub async fn run<F>(
        &mut self,
        cancel: CancellationToken,
        max_cycles: Option<u64>,
        mut on_cycle: F,
    ) where
        F: FnMut(&CycleReport),
    {
        info!(
            cities = self.cities.len(),
            interval_secs = self.interval.as_secs(),
            "Starting weather monitor"
        );

        let mut completed = 0u64;
        loop {
            if cancel.is_cancelled() {
                break;
            }

            tokio::select! {
                result = self.run_cycle() => match result {
                    Ok(report) => on_cycle(&report),
                    Err(err) => error!("Cycle skipped: {err:#}"),
                },
                _ = cancel.cancelled() => break,
            }

            completed += 1;
            if max_cycles.is_some_and(|max| completed >= max) {
                break;
            }

            info!("Sleeping for {} seconds", self.interval.as_secs());
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = cancel.cancelled() => break,
            }
        }

        info!(cycles = completed, "Weather monitor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BreachScope;
    use async_trait::async_trait;
    use std::{
        collections::HashMap,
        sync::{
            Mutex,
            atomic::{AtomicUsize, Ordering},
        },
    };

    /// Serves canned (temperature, condition) pairs per city; unknown cities fail.
    #[derive(Debug, Default)]
    struct FakeSource {
        data: HashMap<String, (f64, String)>,
        calls: AtomicUsize,
    }

    impl FakeSource {
        fn with(mut self, city: &str, temp: f64, condition: &str) -> Self {
            self.data.insert(city.to_string(), (temp, condition.to_string()));
            self
        }
    }

    #[async_trait]
    impl WeatherSource for FakeSource {
        async fn fetch(&self, city: &str) -> Result<Reading, FetchFailure> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) as i64;
            match self.data.get(city) {
                Some((temp, condition)) => {
                    Ok(Reading::new(city, condition.as_str(), *temp, *temp, 50.0, 1.0, 1_700_000_000 + n)
                        .expect("valid timestamp"))
                }
                None => Err(FetchFailure::new(city, FetchError::Status { status: 404, body: "city not found".into() })),
            }
        }
    }

    struct RecordingChart {
        renders: Arc<Mutex<Vec<usize>>>,
    }

    impl ChartSink for RecordingChart {
        fn render(&self, readings: &[Reading]) -> Result<()> {
            self.renders.lock().unwrap().push(readings.len());
            Ok(())
        }
    }

    struct FailingChart;

    impl ChartSink for FailingChart {
        fn render(&self, _readings: &[Reading]) -> Result<()> {
            anyhow::bail!("no display")
        }
    }

    fn cities(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn scheduler(source: FakeSource, names: &[&str]) -> Scheduler {
        Scheduler::new(
            Arc::new(source),
            ReadingStore::open_in_memory().unwrap(),
            AlertEngine::new(35.0, 2, ["Rain", "Snow"], BreachScope::PerCity),
            cities(names),
            Duration::from_millis(1),
        )
    }

    #[tokio::test]
    async fn failed_city_does_not_block_the_others() {
        let source = FakeSource::default()
            .with("Delhi", 30.0, "Clear")
            .with("Mumbai", 28.0, "Rain");
        let mut sched = scheduler(source, &["Delhi", "Atlantis", "Mumbai"]);

        let report = sched.run_cycle().await.unwrap();

        assert_eq!(report.cycle, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].city, "Atlantis");
        let stored: Vec<_> = report.readings.iter().map(|r| r.city().to_string()).collect();
        assert_eq!(stored, vec!["Delhi", "Mumbai"]);
        assert_eq!(sched.store().count().unwrap(), 2);
        assert_eq!(report.alerts, vec![Alert::Hazard { city: "Mumbai".into(), condition: "Rain".into() }]);
        assert_eq!(report.summary.unwrap().readings, 2);
    }

    #[tokio::test]
    async fn heat_alert_needs_consecutive_cycles() {
        let source = FakeSource::default().with("Delhi", 40.0, "Clear");
        let mut sched = scheduler(source, &["Delhi"]);

        assert!(sched.run_cycle().await.unwrap().alerts.is_empty());
        let second = sched.run_cycle().await.unwrap();

        assert_eq!(second.alerts.len(), 1);
        assert_eq!(second.alerts[0].city(), "Delhi");
    }

    #[tokio::test]
    async fn all_fetches_failing_still_completes_the_cycle() {
        let mut sched = scheduler(FakeSource::default(), &["Nowhere"]);

        let report = sched.run_cycle().await.unwrap();

        assert!(report.readings.is_empty());
        assert!(report.summary.is_none());
        assert!(report.alerts.is_empty());
    }

    #[tokio::test]
    async fn run_stops_after_max_cycles_and_renders_each_cycle() {
        let renders = Arc::new(Mutex::new(Vec::new()));
        let source = FakeSource::default().with("Chennai", 31.0, "Clouds");
        let mut sched = scheduler(source, &["Chennai"])
            .with_chart(Box::new(RecordingChart { renders: Arc::clone(&renders) }));

        let mut seen = Vec::new();
        sched.run(CancellationToken::new(), Some(3), |r| seen.push(r.cycle)).await;

        assert_eq!(seen, vec![1, 2, 3]);
        assert_eq!(*renders.lock().unwrap(), vec![1, 2, 3]);
        assert_eq!(sched.into_store().count().unwrap(), 3);
    }

    #[tokio::test]
    async fn chart_failure_does_not_abort_the_cycle() {
        let source = FakeSource::default().with("Delhi", 20.0, "Clear");
        let mut sched = scheduler(source, &["Delhi"]).with_chart(Box::new(FailingChart));

        let report = sched.run_cycle().await.unwrap();
        assert_eq!(report.readings.len(), 1);
    }

    #[tokio::test]
    async fn cancelled_token_runs_no_cycles() {
        let source = FakeSource::default().with("Delhi", 20.0, "Clear");
        let mut sched = scheduler(source, &["Delhi"]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut cycles = 0;
        sched.run(cancel, None, |_| cycles += 1).await;

        assert_eq!(cycles, 0);
        assert_eq!(sched.store().count().unwrap(), 0);
    }

    #[tokio::test]
    async fn cancel_during_sleep_ends_the_loop() {
        let source = FakeSource::default().with("Delhi", 20.0, "Clear");
        let mut sched = Scheduler::new(
            Arc::new(source),
            ReadingStore::open_in_memory().unwrap(),
            AlertEngine::new(35.0, 2, ["Rain"], BreachScope::PerCity),
            cities(&["Delhi"]),
            Duration::from_secs(3600),
        );
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();

        let mut cycles = 0;
        sched
            .run(cancel, None, |_| {
                cycles += 1;
                trigger.cancel();
            })
            .await;

        assert_eq!(cycles, 1);
    }

    #[tokio::test]
    async fn unreadable_history_still_alerts_and_keeps_the_batch() {
        let source = FakeSource::default().with("Delhi", 40.0, "Rain");
        let mut sched = scheduler(source, &["Delhi"]);
        sched
            .store()
            .execute_raw(
                "INSERT INTO weather VALUES ('Delhi', 'Clear', 30.0, 30.0, 50.0, 1.0, 9223372036854775807, '9999-12-31')",
            )
            .unwrap();

        for cycle in 1..=2 {
            let report = sched.run_cycle().await.expect("insert succeeded, cycle must not fail");

            assert!(report.summary.is_none());
            assert!(report.alerts.contains(&Alert::Hazard { city: "Delhi".into(), condition: "Rain".into() }));
            if cycle == 2 {
                assert!(report.alerts.iter().any(|a| matches!(a, Alert::SustainedHeat { .. })));
            }
        }
        assert_eq!(sched.store().count().unwrap(), 3);
    }

    #[tokio::test]
    async fn failed_insert_reports_dropped_count() {
        let source = FakeSource::default()
            .with("Delhi", 40.0, "Rain")
            .with("Mumbai", 30.0, "Clear");
        let mut sched = scheduler(source, &["Delhi", "Mumbai"]);
        sched.store().execute_raw("DROP TABLE weather").unwrap();

        let err = sched.run_cycle().await.unwrap_err();

        assert!(format!("{err:#}").contains("2 readings were dropped"), "{err:#}");
    }

    #[tokio::test]
    async fn loop_continues_after_a_failed_insert() {
        let source = Arc::new(FakeSource::default().with("Delhi", 20.0, "Clear"));
        let mut sched = Scheduler::new(
            Arc::clone(&source) as Arc<dyn WeatherSource>,
            ReadingStore::open_in_memory().unwrap(),
            AlertEngine::new(35.0, 2, ["Rain"], BreachScope::PerCity),
            cities(&["Delhi"]),
            Duration::from_millis(1),
        );
        sched.store().execute_raw("DROP TABLE weather").unwrap();

        let mut reported = 0;
        sched.run(CancellationToken::new(), Some(2), |_| reported += 1).await;

        assert_eq!(reported, 0);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }
}
