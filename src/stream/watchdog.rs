// Copyright 2026 BadCompany
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Liveness watchdog.
//!
//! Armed with a timeout, reset by activity, and expiring at most once per
//! arm. The owner awaits [`Watchdog::expired`] next to its other event
//! sources and reacts when it completes; nothing fires again until the
//! owner arms it anew. Deadlines use the monotonic tokio clock.

use std::time::Duration;
use tokio::time::{sleep_until, Instant};

#[derive(Debug)]
pub struct Watchdog {
    timeout: Duration,
    last_activity: Instant,
    deadline: Option<Instant>,
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new()
    }
}

impl Watchdog {
    /// A disarmed watchdog.
    pub fn new() -> Self {
        Self {
            timeout: Duration::ZERO,
            last_activity: Instant::now(),
            deadline: None,
        }
    }

    /// Start, or restart, the countdown.
    pub fn arm(&mut self, timeout: Duration) {
        let now = Instant::now();
        self.timeout = timeout;
        self.last_activity = now;
        self.deadline = Some(now + timeout);
    }

    /// Record activity. Pushes the deadline out by a full timeout; does
    /// nothing while disarmed.
    pub fn trigger(&mut self) {
        if self.deadline.is_some() {
            let now = Instant::now();
            self.last_activity = now;
            self.deadline = Some(now + self.timeout);
        }
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Completes when the deadline passes, yielding the time since the last
    /// activity, and disarms. Pending forever while disarmed.
    ///
    /// Cancel safe: dropping the future leaves the watchdog untouched.
    pub async fn expired(&mut self) -> Duration {
        let Some(deadline) = self.deadline else {
            return std::future::pending().await;
        };
        sleep_until(deadline).await;
        self.deadline = None;
        self.last_activity.elapsed()
    }
}
