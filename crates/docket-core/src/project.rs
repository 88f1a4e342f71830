//! Read-only view of the project registry.
//!
//! The engine never creates or edits projects; it only resolves the id stored
//! on a task to something displayable.

use serde::{
  Deserialize,
  Serialize
};

/// Project assigned to tasks created without one.
pub const DEFAULT_PROJECT_ID: &str =
  "1";

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct Project {
  pub id:    String,
  pub name:  String,
  /// Opaque tag; mapping it to a colour is up to the caller.
  pub color: String
}

impl Project {
  pub fn new(
    id: &str,
    name: &str,
    color: &str
  ) -> Self {
    Self {
      id:    id.to_string(),
      name:  name.to_string(),
      color: color.to_string()
    }
  }

  /// Stand-in returned for ids the registry does not know.
  pub fn no_project() -> Self {
    Self::new(
      "default",
      "No Project",
      "default"
    )
  }
}

pub trait ProjectRegistry {
  fn list_projects(&self) -> Vec<Project>;

  fn find_project(
    &self,
    id: &str
  ) -> Option<Project>;

  fn get_project(
    &self,
    id: &str
  ) -> Project {
    self.find_project(id).unwrap_or_else(
      || {
        tracing::debug!(
          project_id = id,
          "unresolved project id"
        );
        Project::no_project()
      }
    )
  }
}

#[derive(Debug, Clone)]
pub struct StaticRegistry {
  projects: Vec<Project>
}

impl StaticRegistry {
  pub fn new(
    projects: Vec<Project>
  ) -> Self {
    Self {
      projects
    }
  }
}

impl Default for StaticRegistry {
  fn default() -> Self {
    Self::new(vec![
      Project::new(
        "1", "Personal", "blue"
      ),
      Project::new("2", "Work", "green"),
      Project::new(
        "3",
        "Education",
        "purple"
      ),
      Project::new(
        "4",
        "Home Improvement",
        "amber"
      ),
    ])
  }
}

impl ProjectRegistry for StaticRegistry {
  fn list_projects(&self) -> Vec<Project> {
    self.projects.clone()
  }

  fn find_project(
    &self,
    id: &str
  ) -> Option<Project> {
    self
      .projects
      .iter()
      .find(|p| p.id == id)
      .cloned()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_registry_resolves_default_project()
  {
    let registry =
      StaticRegistry::default();
    assert_eq!(
      registry
        .get_project(DEFAULT_PROJECT_ID)
        .name,
      "Personal"
    );
    assert_eq!(
      registry.list_projects().len(),
      4
    );
  }

  #[test]
  fn orphaned_id_resolves_to_no_project()
  {
    let registry = StaticRegistry::new(
      vec![Project::new(
        "2", "Work", "green"
      )]
    );
    assert_eq!(
      registry.get_project("1"),
      Project::no_project()
    );
    assert_eq!(
      registry.get_project("").name,
      "No Project"
    );
  }
}
