// Copyright 2022 F4PGA Authors
// Licensed under the Apache License, Version 2.0.

//! Project and vendor metadata consumed by the task generator.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A benchmark design and the boards it supports for each vendor.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Project {
    /// Human-readable project name.
    pub name: String,

    /// Boards the project supports, keyed by vendor name.
    pub vendors: BTreeMap<String, Vec<String>>,

    /// Toolchains never to be run for this project, unless all combinations are requested.
    #[serde(default)]
    pub skip_toolchains: Vec<String>,

    /// Toolchains that must be run for this project.
    #[serde(default)]
    pub required_toolchains: Vec<String>,
}

/// The toolchains an FPGA vendor offers and the boards it recognizes.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct Vendor {
    pub toolchains: Vec<String>,
    pub boards: Vec<String>,
}

/// Metadata lookup error.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("unknown project '{0}'")]
    UnknownProject(String),
    #[error("project '{project}' references unknown vendor '{vendor}'")]
    UnknownVendor { project: String, vendor: String },
    #[error("failed to read {path:?}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("failed to parse {path:?}: {source}")]
    Json { path: PathBuf, source: serde_json::Error },
}

/// Source of project and vendor metadata.
pub trait Catalog {
    /// Identifiers of every known project, used as the project-file field of combinations.
    fn projects(&self) -> Result<Vec<String>, CatalogError>;

    /// Load the project with identifier `id`.
    fn project(&self, id: &str) -> Result<Project, CatalogError>;

    /// Every known vendor, keyed by name.
    fn vendors(&self) -> Result<BTreeMap<String, Vendor>, CatalogError>;
}

impl<C: Catalog + ?Sized> Catalog for &C {
    fn projects(&self) -> Result<Vec<String>, CatalogError> {
        (**self).projects()
    }

    fn project(&self, id: &str) -> Result<Project, CatalogError> {
        (**self).project(id)
    }

    fn vendors(&self) -> Result<BTreeMap<String, Vendor>, CatalogError> {
        (**self).vendors()
    }
}

/// Catalog held entirely in memory.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MemoryCatalog {
    projects: BTreeMap<String, Project>,
    vendors: BTreeMap<String, Vendor>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_project(mut self, id: impl Into<String>, project: Project) -> Self {
        self.projects.insert(id.into(), project);
        self
    }

    pub fn with_vendor(mut self, name: impl Into<String>, vendor: Vendor) -> Self {
        self.vendors.insert(name.into(), vendor);
        self
    }
}

impl Catalog for MemoryCatalog {
    fn projects(&self) -> Result<Vec<String>, CatalogError> {
        Ok(self.projects.keys().cloned().collect())
    }

    fn project(&self, id: &str) -> Result<Project, CatalogError> {
        self.projects.get(id).cloned().ok_or_else(|| CatalogError::UnknownProject(id.to_string()))
    }

    fn vendors(&self) -> Result<BTreeMap<String, Vendor>, CatalogError> {
        Ok(self.vendors.clone())
    }
}

/// Catalog backed by JSON descriptors on disk.
///
/// Every `<id>.json` file in the project directory is one project, and the vendors file
/// holds a JSON object mapping vendor names to their toolchains and boards.
#[derive(Clone, Debug, PartialEq)]
pub struct JsonCatalog {
    project_dir: PathBuf,
    vendors_file: PathBuf,
}

impl JsonCatalog {
    pub fn new(project_dir: impl Into<PathBuf>, vendors_file: impl Into<PathBuf>) -> Self {
        JsonCatalog { project_dir: project_dir.into(), vendors_file: vendors_file.into() }
    }

    /// Use the standard layout below `root`: `project/*.json` and `other/vendors.json`.
    pub fn from_root(root: &Path) -> Self {
        Self::new(root.join("project"), root.join("other").join("vendors.json"))
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn vendors_file(&self) -> &Path {
        &self.vendors_file
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, CatalogError> {
    let content = std::fs::read_to_string(path)
        .map_err(|source| CatalogError::Io { path: path.to_path_buf(), source })?;
    serde_json::from_str(&content)
        .map_err(|source| CatalogError::Json { path: path.to_path_buf(), source })
}

impl Catalog for JsonCatalog {
    fn projects(&self) -> Result<Vec<String>, CatalogError> {
        let io_err = |source: std::io::Error| CatalogError::Io { path: self.project_dir.clone(), source };
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&self.project_dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.extension().map_or(false, |ext| ext == "json") {
                if let Some(stem) = path.file_stem() {
                    ids.push(stem.to_string_lossy().into_owned());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn project(&self, id: &str) -> Result<Project, CatalogError> {
        let path = self.project_dir.join(format!("{id}.json"));
        if !path.is_file() {
            return Err(CatalogError::UnknownProject(id.to_string()));
        }
        read_json(&path)
    }

    fn vendors(&self) -> Result<BTreeMap<String, Vendor>, CatalogError> {
        read_json(&self.vendors_file)
    }
}
