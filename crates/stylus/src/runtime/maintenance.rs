// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2024 Jonathan Lee
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.

use crate::config::MaintenanceConfig;
use crate::learning::LearningEngine;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceSummary {
    pub continuous_ticks: u64,
    pub evaluations: u64,
    pub snapshots: u64,
    pub failed_snapshots: u64,
}
/// Background loop driving the engine's self-improvement passes and
/// optional periodic snapshots.
#[derive(Debug)]
pub struct MaintenanceWorker {
    engine: Arc<LearningEngine>,
    continuous: Duration,
    evaluation: Duration,
    snapshot: Option<Duration>,
    knowledge_path: Option<PathBuf>,
    cancel: CancellationToken,
}
/// Handle to a spawned worker.
#[derive(Debug)]
pub struct MaintenanceHandle {
    cancel: CancellationToken,
    join: JoinHandle<MaintenanceSummary>,
}
impl MaintenanceHandle {
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
    /// Cancels the worker and waits for its final save.
    pub async fn shutdown(self) -> Result<MaintenanceSummary, tokio::task::JoinError> {
        self.cancel.cancel();
        self.join.await
    }
}
fn ticker(period: Duration) -> Interval {
    let period = period.max(Duration::from_millis(1));
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}
async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
impl MaintenanceWorker {
    pub fn new(engine: Arc<LearningEngine>, config: &MaintenanceConfig) -> Self {
        Self {
            engine,
            continuous: config.continuous_interval(),
            evaluation: config.evaluation_interval(),
            snapshot: config.snapshot_interval(),
            knowledge_path: None,
            cancel: CancellationToken::new(),
        }
    }
    pub fn with_intervals(mut self, continuous: Duration, evaluation: Duration) -> Self {
        self.continuous = continuous;
        self.evaluation = evaluation;
        self
    }
    pub fn with_snapshot_interval(mut self, snapshot: Option<Duration>) -> Self {
        self.snapshot = snapshot;
        self
    }
    /// Enables the final save on shutdown and, with a snapshot interval,
    /// periodic saves.
    pub fn with_knowledge_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.knowledge_path = Some(path.into());
        self
    }
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
    pub fn spawn(self) -> MaintenanceHandle {
        let cancel = self.cancel.clone();
        let join = tokio::spawn(self.run());
        MaintenanceHandle { cancel, join }
    }
    pub async fn run(self) -> MaintenanceSummary {
        info!(
            target: "stylus::runtime",
            continuous = ?self.continuous,
            evaluation = ?self.evaluation,
            snapshot = ?self.snapshot,
            "maintenance.started"
        );
        let mut summary = MaintenanceSummary::default();
        let mut continuous = ticker(self.continuous);
        let mut evaluation = ticker(self.evaluation);
        let mut snapshot = match (&self.knowledge_path, self.snapshot) {
            (Some(_), Some(period)) => Some(ticker(period)),
            _ => None,
        };
        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                _ = continuous.tick() => {
                    if self.engine.continuous_learning() {
                        summary.continuous_ticks += 1;
                    }
                }
                _ = evaluation.tick() => {
                    let review = self.engine.evaluate_performance();
                    debug!(
                        target: "stylus::runtime",
                        average_confidence = review.average_confidence,
                        "maintenance.evaluated"
                    );
                    summary.evaluations += 1;
                }
                () = next_tick(&mut snapshot) => {
                    self.persist(&mut summary).await;
                }
            }
        }
        if self.knowledge_path.is_some() {
            self.persist(&mut summary).await;
        }
        info!(
            target: "stylus::runtime",
            continuous_ticks = summary.continuous_ticks,
            evaluations = summary.evaluations,
            snapshots = summary.snapshots,
            "maintenance.stopped"
        );
        summary
    }
    async fn persist(&self, summary: &mut MaintenanceSummary) {
        let Some(path) = self.knowledge_path.clone() else {
            return;
        };
        let engine = self.engine.clone();
        match tokio::task::spawn_blocking(move || engine.save(&path)).await {
            Ok(Ok(())) => summary.snapshots += 1,
            Ok(Err(e)) => {
                error!(target: "stylus::runtime", error = %e, "maintenance.snapshot_failed");
                summary.failed_snapshots += 1;
            }
            Err(e) => {
                error!(target: "stylus::runtime", error = %e, "maintenance.snapshot_panicked");
                summary.failed_snapshots += 1;
            }
        }
    }
}
