//! Grade and project catalog
//! Read-only lookup table shipped with the binary. Each project maps to the
//! command code the board runs for it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::bluetooth::Command;

const BUILTIN_CATALOG: &str = include_str!("../assets/catalog.json");

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Invalid catalog: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Grade {0} not found")]
    GradeNotFound(u32),

    #[error("Project {project_id} not found in grade {grade_id}")]
    ProjectNotFound { grade_id: u32, project_id: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: u32,
    pub name: String,
    pub command: Command,
    pub procedure: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grade {
    pub id: u32,
    pub label: String,
    pub color: String,
    pub color_dark: String,
    pub icon: String,
    pub projects: Vec<Project>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    stop_command: Command,
    grades: Vec<Grade>,
}

impl Catalog {
    /// The catalog embedded at build time
    pub fn builtin() -> Result<Self, CatalogError> {
        Ok(serde_json::from_str(BUILTIN_CATALOG)?)
    }

    pub fn grades(&self) -> &[Grade] {
        &self.grades
    }

    pub fn stop_command(&self) -> &Command {
        &self.stop_command
    }

    pub fn grade(&self, grade_id: u32) -> Result<&Grade, CatalogError> {
        self.grades
            .iter()
            .find(|grade| grade.id == grade_id)
            .ok_or(CatalogError::GradeNotFound(grade_id))
    }

    pub fn project(&self, grade_id: u32, project_id: u32) -> Result<&Project, CatalogError> {
        self.grade(grade_id)?
            .projects
            .iter()
            .find(|project| project.id == project_id)
            .ok_or(CatalogError::ProjectNotFound { grade_id, project_id })
    }

    /// Reverse lookup, used to label raw codes.
    pub fn find_by_command(&self, command: &Command) -> Option<(&Grade, &Project)> {
        self.grades.iter().find_map(|grade| {
            grade
                .projects
                .iter()
                .find(|project| &project.command == command)
                .map(|project| (grade, project))
        })
    }
}
