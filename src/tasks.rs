// Copyright 2022 F4PGA Authors
// Licensed under the Apache License, Version 2.0.

//! Enumeration of benchmark combinations and their expansion into run tasks.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::catalog::{Catalog, CatalogError};
use crate::{Combination, RunTask};

/// Pair every task with every value, producing `tasks.len() * values.len()` tasks.
///
/// The output is value-major: all tasks paired with the first value come first,
/// then all tasks paired with the second value, and so on.
pub fn cross_expand<T, V, F>(tasks: &[T], values: &[V], attach: F) -> Vec<T>
where
    F: Fn(&T, &V) -> T,
{
    values.iter().flat_map(|value| tasks.iter().map(|task| attach(task, value))).collect()
}

/// Pair every task with the last value only, leaving the task count unchanged.
///
/// With no values at all the tasks are returned unmodified.
pub fn last_value_append<T, V, F>(tasks: Vec<T>, values: &[V], attach: F) -> Vec<T>
where
    F: Fn(&T, &V) -> T,
{
    match values.last() {
        Some(value) => tasks.iter().map(|task| attach(task, value)).collect(),
        None => tasks,
    }
}

/// Selection criteria applied to combinations before expansion.
///
/// Each criterion is either unconstrained or a list of accepted values. A combination
/// passes a criterion when any of its four fields equals any accepted value, and it is
/// kept only when it passes every constrained criterion.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Filter {
    criteria: BTreeMap<String, Option<Vec<String>>>,
}

impl Filter {
    /// A filter accepting every combination.
    pub fn new() -> Self {
        Self::default()
    }

    /// Constrain `key` to the given values.
    pub fn require<I, S>(mut self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.criteria.insert(key.into(), Some(values.into_iter().map(Into::into).collect()));
        self
    }

    /// Record `key` without constraining it.
    pub fn unconstrained(mut self, key: impl Into<String>) -> Self {
        self.criteria.insert(key.into(), None);
        self
    }

    pub fn matches(&self, combination: &Combination) -> bool {
        let fields = combination.fields();
        self.criteria.values().flatten().all(|accepted| {
            fields.iter().any(|field| accepted.iter().any(|value| value.as_str() == *field))
        })
    }
}

impl<K: Into<String>> FromIterator<(K, Option<Vec<String>>)> for Filter {
    fn from_iter<I: IntoIterator<Item = (K, Option<Vec<String>>)>>(iter: I) -> Self {
        Filter { criteria: iter.into_iter().map(|(k, v)| (k.into(), v)).collect() }
    }
}

/// Expansion parameters for [`TaskGenerator::tasks`].
#[derive(Clone, Debug, PartialEq)]
pub struct TaskParams {
    /// Each seed creates a new copy of every task.
    pub seeds: Vec<u64>,

    /// Each build number creates a new copy of every task.
    pub build_numbers: Vec<u32>,

    /// Only the last option is attached; options never create tasks.
    pub options: Vec<Option<String>>,

    /// Keep only combinations whose toolchain is required by their project.
    pub only_required: bool,
}

impl Default for TaskParams {
    fn default() -> Self {
        TaskParams {
            seeds: vec![0],
            build_numbers: vec![0],
            options: vec![None],
            only_required: false,
        }
    }
}

impl TaskParams {
    pub fn with_seeds(mut self, seeds: Vec<u64>) -> Self {
        self.seeds = seeds;
        self
    }

    pub fn with_build_numbers(mut self, build_numbers: Vec<u32>) -> Self {
        self.build_numbers = build_numbers;
        self
    }

    pub fn with_options(mut self, options: Vec<Option<String>>) -> Self {
        self.options = options;
        self
    }

    pub fn only_required(mut self, only_required: bool) -> Self {
        self.only_required = only_required;
        self
    }
}

/// Generates and holds the benchmark combinations of a catalog.
///
/// The combination set is computed once, when the generator is created.
#[derive(Debug)]
pub struct TaskGenerator<C> {
    root_dir: PathBuf,
    src_dir: PathBuf,
    catalog: C,
    combinations: BTreeSet<Combination>,
}

impl<C: Catalog> TaskGenerator<C> {
    pub fn new(root_dir: impl Into<PathBuf>, catalog: C) -> Result<Self, CatalogError> {
        let root_dir = root_dir.into();
        let src_dir = root_dir.join("src");
        let mut generator = TaskGenerator {
            root_dir,
            src_dir,
            catalog,
            combinations: BTreeSet::new(),
        };
        generator.combinations = generator.iter_options(false)?;
        log::debug!("generated {} combinations", generator.combinations.len());
        Ok(generator)
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Directory holding the project sources, `<root>/src`.
    pub fn src_dir(&self) -> &Path {
        &self.src_dir
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    /// The combinations computed at construction, honoring skip lists and declared boards.
    pub fn combinations(&self) -> &BTreeSet<Combination> {
        &self.combinations
    }

    /// Compute every (project, toolchain, board) combination of the catalog.
    ///
    /// Normally a project is paired with the boards it declares that its vendor also
    /// recognizes, and toolchains on its skip list are left out. With `all_combinations`
    /// set, the project is paired with every board of each of its vendors and skip lists
    /// are ignored.
    pub fn iter_options(
        &self,
        all_combinations: bool,
    ) -> Result<BTreeSet<Combination>, CatalogError> {
        let mut combinations = BTreeSet::new();
        let vendors = self.catalog.vendors()?;

        for project_file in self.catalog.projects()? {
            let project = self.catalog.project(&project_file)?;
            if project.vendors.is_empty() {
                log::warn!("project '{}' declares no vendors", project_file);
            }

            for (vendor_name, project_boards) in &project.vendors {
                let vendor = vendors.get(vendor_name).ok_or_else(|| CatalogError::UnknownVendor {
                    project: project_file.clone(),
                    vendor: vendor_name.clone(),
                })?;

                let boards: Vec<&String> = if all_combinations {
                    vendor.boards.iter().collect()
                } else {
                    project_boards
                        .iter()
                        .filter(|board| {
                            let known = vendor.boards.contains(*board);
                            if !known {
                                log::debug!(
                                    "project '{}' board '{}' is not a {} board",
                                    project_file, board, vendor_name
                                );
                            }
                            known
                        })
                        .collect()
                };

                for toolchain in &vendor.toolchains {
                    if !all_combinations && project.skip_toolchains.contains(toolchain) {
                        continue;
                    }
                    for board in &boards {
                        combinations.insert(Combination::new(
                            project_file.as_str(),
                            project.name.as_str(),
                            toolchain.as_str(),
                            board.as_str(),
                        ));
                    }
                }
            }
        }

        Ok(combinations)
    }

    /// Every combination, ignoring declared board subsets and skip lists.
    pub fn all_combinations(&self) -> Result<BTreeSet<Combination>, CatalogError> {
        self.iter_options(true)
    }

    /// Select the combinations matching `filter` and expand them into run tasks.
    ///
    /// Seeds and build numbers each multiply the task list, while only the last of
    /// `params.options` is attached. The result holds
    /// `selected * params.seeds.len() * params.build_numbers.len()` tasks.
    pub fn tasks(&self, filter: &Filter, params: &TaskParams) -> Result<Vec<RunTask>, CatalogError> {
        let mut tasks = Vec::new();

        for combination in self.combinations.iter().filter(|c| filter.matches(c)) {
            if params.only_required {
                let project = self.catalog.project(&combination.project_file)?;
                if !project.required_toolchains.contains(&combination.toolchain) {
                    continue;
                }
            }
            tasks.push(RunTask::from(combination));
        }

        let tasks = cross_expand(&tasks, &params.seeds, |task, &seed| RunTask {
            seed: Some(seed),
            ..task.clone()
        });
        let tasks = last_value_append(tasks, &params.options, |task, option| RunTask {
            option: option.clone(),
            ..task.clone()
        });
        let tasks = cross_expand(&tasks, &params.build_numbers, |task, &build_number| RunTask {
            build_number: Some(build_number),
            ..task.clone()
        });

        log::debug!("selected {} tasks", tasks.len());
        Ok(tasks)
    }
}
