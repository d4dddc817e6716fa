// Copyright 2022 F4PGA Authors
// Licensed under the Apache License, Version 2.0.

//! # fpga-perf-tasks
//!
//! Enumerate FPGA toolchain benchmark tasks and scan the reports they produce.
//!
//! Use [`TaskGenerator`] with a [`Catalog`] of projects and vendors to compute every valid
//! (project, toolchain, board) [`Combination`], then call [`TaskGenerator::tasks`] to filter
//! them and expand each into [`RunTask`]s carrying a seed, an option and a build number.
//!
//! Once a toolchain run has finished, [`parse_timing_report`] extracts the achieved and
//! requested clock frequencies from a timing report and [`parse_cell_stats`] extracts cell
//! usage from a synthesis log.

pub mod catalog;
mod display;
pub mod report;
pub mod tasks;
pub mod util;

pub use catalog::{Catalog, CatalogError, JsonCatalog, MemoryCatalog, Project, Vendor};
pub use report::{
    parse_cell_stats, parse_cell_stats_file, parse_timing_report, parse_timing_report_file,
    ClockTiming, ErrLoc, ReportError,
};
pub use tasks::{cross_expand, last_value_append, Filter, TaskGenerator, TaskParams};

use serde::Serialize;

/// A valid pairing of a project with one of its vendors' toolchains and boards.
///
/// Ordering is lexicographic over the fields in declaration order, which is the
/// iteration order of the generator's combination set.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Combination {
    /// Identifier of the project descriptor the combination was built from.
    pub project_file: String,

    /// Human-readable project name.
    pub project_name: String,

    pub toolchain: String,

    pub board: String,
}

impl Combination {
    pub fn new(
        project_file: impl Into<String>,
        project_name: impl Into<String>,
        toolchain: impl Into<String>,
        board: impl Into<String>,
    ) -> Self {
        Combination {
            project_file: project_file.into(),
            project_name: project_name.into(),
            toolchain: toolchain.into(),
            board: board.into(),
        }
    }

    /// All four fields, in tuple order, as matched by a [`Filter`].
    pub fn fields(&self) -> [&str; 4] {
        [
            self.project_file.as_str(),
            self.project_name.as_str(),
            self.toolchain.as_str(),
            self.board.as_str(),
        ]
    }
}

/// One benchmark run: a combination without its project name, plus the
/// parameters attached by task expansion.
///
/// Each parameter is `None` until its expansion axis has been applied.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct RunTask {
    /// Identifier of the project descriptor.
    pub project: String,

    pub toolchain: String,

    pub board: String,

    /// Seed passed to the toolchain's placer.
    pub seed: Option<u64>,

    /// Toolchain option set name. Attached from the last entry of the options list.
    pub option: Option<String>,

    /// Build number distinguishing repeated runs of the same configuration.
    pub build_number: Option<u32>,
}

impl RunTask {
    /// A task with no expansion parameters attached.
    pub fn new(
        project: impl Into<String>,
        toolchain: impl Into<String>,
        board: impl Into<String>,
    ) -> Self {
        RunTask {
            project: project.into(),
            toolchain: toolchain.into(),
            board: board.into(),
            seed: None,
            option: None,
            build_number: None,
        }
    }
}

impl From<&Combination> for RunTask {
    fn from(combination: &Combination) -> Self {
        RunTask::new(
            combination.project_file.clone(),
            combination.toolchain.clone(),
            combination.board.clone(),
        )
    }
}
