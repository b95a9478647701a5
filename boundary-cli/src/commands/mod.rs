// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Benchmark dispatch.
//!
//! Each family establishes the isolated domain it needs, runs its harness
//! and destroys the domain exactly once, whether the harness succeeded or
//! not.

use boundary_benchmark::{
    run_domain_creation, run_memory_access, run_memory_management, run_switching,
    BenchmarkCategory, BenchmarkReport, BenchmarkSession,
};
use boundary_core::{
    BenchConfig, BenchResult, EmulatedDomain, EmulatedPlatform, IsolatedDomain,
    IsolationPlatform, PageCount, RegionCount, UsageError,
};

/// A validated benchmark invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BenchmarkCommand {
    Switching,
    MemoryManagement { pages: PageCount, count: RegionCount },
    MemoryAccess,
    CreateDomain,
}

impl BenchmarkCommand {
    /// Build the memory-management command from its optional positional
    /// arguments; both are required.
    pub fn memory_management(
        page_count: Option<u32>,
        region_count: Option<u32>,
    ) -> Result<Self, UsageError> {
        const HINT: &str = "memory_management needs <page_count> <region_count>";
        let pages = page_count.ok_or(UsageError::MissingArgument {
            argument: "page_count",
            hint: HINT,
        })?;
        let count = region_count.ok_or(UsageError::MissingArgument {
            argument: "region_count",
            hint: HINT,
        })?;

        Ok(BenchmarkCommand::MemoryManagement {
            pages: PageCount::new(pages)?,
            count: RegionCount::new(count)?,
        })
    }

    pub fn category(&self) -> BenchmarkCategory {
        match self {
            BenchmarkCommand::Switching => BenchmarkCategory::Switching,
            BenchmarkCommand::MemoryManagement { .. } => BenchmarkCategory::MemoryManagement,
            BenchmarkCommand::MemoryAccess => BenchmarkCategory::MemoryAccess,
            BenchmarkCommand::CreateDomain => BenchmarkCategory::CreateDomain,
        }
    }
}

/// Run `command` against the emulated isolation platform.
pub fn execute(command: BenchmarkCommand, config: BenchConfig) -> BenchResult<BenchmarkReport> {
    let platform = EmulatedPlatform::new(config.domain.clone());
    let mut session = BenchmarkSession::new(config, command.category());
    tracing::info!(benchmark = %command.category(), platform = platform.name(), "Starting benchmark");

    match command {
        BenchmarkCommand::Switching => {
            with_domain(&platform, |domain| run_switching(&mut session, domain))?
        }
        BenchmarkCommand::MemoryManagement { pages, count } => with_domain(&platform, |domain| {
            run_memory_management(&mut session, domain, pages, count)
        })?,
        BenchmarkCommand::MemoryAccess => {
            with_domain(&platform, |domain| run_memory_access(&mut session, domain))?
        }
        BenchmarkCommand::CreateDomain => run_domain_creation(&mut session, &platform)?,
    }

    Ok(session.into_report())
}

/// Create one domain, run `work` against it, then destroy it.
fn with_domain<F>(platform: &EmulatedPlatform, work: F) -> BenchResult<()>
where
    F: FnOnce(&mut EmulatedDomain) -> BenchResult<()>,
{
    let mut domain = platform.create_domain()?;
    tracing::debug!(domain = %domain.id(), "Isolated domain established");

    let outcome = work(&mut domain);
    let destroyed = domain.destroy();

    outcome?;
    destroyed?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_config() -> BenchConfig {
        boundary_core::ConfigLoader::load_string(
            "switching:\n  loop_count: 10\n  buffer_len: 4\ncreate_domain:\n  iterations: 2\ndomain:\n  heap_capacity_mb: 4\n  reserved_capacity_mb: 4\n",
        )
        .unwrap()
    }

    #[test]
    fn test_memory_management_requires_both_arguments() {
        assert!(matches!(
            BenchmarkCommand::memory_management(None, Some(10)),
            Err(UsageError::MissingArgument {
                argument: "page_count",
                ..
            })
        ));
        assert!(matches!(
            BenchmarkCommand::memory_management(Some(4), None),
            Err(UsageError::MissingArgument {
                argument: "region_count",
                ..
            })
        ));
        assert!(BenchmarkCommand::memory_management(Some(0), Some(10)).is_err());
        assert!(BenchmarkCommand::memory_management(Some(4), Some(100)).is_ok());
    }

    #[test]
    fn test_execute_switching() {
        let report = execute(BenchmarkCommand::Switching, tiny_config()).unwrap();
        assert_eq!(report.category, BenchmarkCategory::Switching);
        assert_eq!(report.measurements().count(), 8);
    }

    #[test]
    fn test_execute_create_domain() {
        let report = execute(BenchmarkCommand::CreateDomain, tiny_config()).unwrap();
        assert!(report.measurement("create_domain").is_some());
    }
}
