// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Domain-creation harness.

use boundary_core::{measure, BenchResult, IsolatedDomain, IsolationPlatform};

use crate::metrics::{CycleAverage, Measurement};
use crate::session::BenchmarkSession;

/// Time domain creation. Each domain is destroyed, untimed, before the
/// next one is created.
pub fn run_domain_creation<P: IsolationPlatform>(
    session: &mut BenchmarkSession,
    platform: &P,
) -> BenchResult<()> {
    let iterations = session.config().create_domain.iterations.value();
    let mut total: u64 = 0;

    for i in 0..iterations {
        let (created, sample) = measure(|| platform.create_domain());
        let domain = created?;
        total = total.saturating_add(sample.cost());

        tracing::debug!(iteration = i, domain = %domain.id(), cycles = sample.cost(), "Domain created");
        domain.destroy()?;
    }

    let average = CycleAverage::compute(total, iterations)?;
    session.record(Measurement::measured("create_domain", average));
    Ok(())
}
