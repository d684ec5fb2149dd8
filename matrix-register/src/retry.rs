// solana-matrix-register — client library registering participants in the
//                          referral matrix program
// © 2024 by Composable Foundation
// © 2025 by Michał Nazarewicz <mina86@mina86.com>
//
// This program is free software; you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation; either version 2 of the License, or (at your option) any later
// version.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program; if not, see <https://www.gnu.org/licenses/>.

use core::future::Future;
use core::time::Duration;

use crate::Error;


/// Bounded retry of a fallible asynchronous operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Retry {
    /// Total number of attempts including the first one.  Zero is treated
    /// as one.
    pub attempts: u32,
    pub delay: Delay,
}

/// Pause between consecutive attempts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delay {
    Fixed(Duration),
    /// Doubles after every attempt starting at `base` up to `cap`.
    Exponential { base: Duration, cap: Duration },
}

/// Error returned once all attempts were used up.  `last` is the output of
/// the final attempt.
#[derive(Debug)]
pub struct Exhausted<T = Error> {
    pub attempts: u32,
    pub last: T,
}

impl Retry {
    pub const fn fixed(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay: Delay::Fixed(delay) }
    }

    /// Calls `op` until `accept` holds for its output or attempts run out.
    /// `op` is passed zero-based attempt number.  There’s no pause after
    /// the last attempt.
    pub async fn poll<T, F, Fut, A>(
        &self,
        what: &str,
        mut op: F,
        mut accept: A,
    ) -> Result<T, Exhausted<T>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = T>,
        A: FnMut(&T) -> bool,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 0;
        loop {
            let output = op(attempt).await;
            if accept(&output) {
                return Ok(output);
            }
            attempt += 1;
            if attempt >= attempts {
                return Err(Exhausted { attempts, last: output });
            }
            let delay = self.delay.after(attempt);
            tracing::debug!(what, attempt, ?delay, "not yet");
            tokio::time::sleep(delay).await;
        }
    }

    /// Runs fallible `op` until it succeeds or attempts run out.
    pub async fn run<T, F, Fut>(
        &self,
        what: &str,
        op: F,
    ) -> Result<T, Exhausted>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = crate::Result<T>>,
    {
        let accept = |res: &crate::Result<T>| match res {
            Ok(_) => true,
            Err(err) => {
                tracing::warn!(what, %err, "attempt failed");
                false
            }
        };
        let attempts = self.attempts.max(1);
        self.poll(what, op, accept)
            .await
            .unwrap_or_else(|exhausted| exhausted.last)
            .map_err(|last| Exhausted { attempts, last })
    }
}

impl Delay {
    /// Returns pause following `attempt`-th failed attempt (one-based).
    fn after(&self, attempt: u32) -> Duration {
        match *self {
            Self::Fixed(delay) => delay,
            Self::Exponential { base, cap } => {
                let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
                base.saturating_mul(factor).min(cap)
            }
        }
    }
}
