use crate::domain::error::BackendError;
use crate::domain::models::*;

use super::records::numeric_suffix;
use super::{Backend, require};

impl Backend {
    pub fn get_projects(&self) -> Result<Vec<Project>, BackendError> {
        self.list()
    }

    pub fn get_project(&self, id: &str) -> Result<Project, BackendError> {
        self.find(id)
    }

    pub fn add_project(&self, mut project: Project) -> Result<Project, BackendError> {
        self.prepare_project(&mut project)?;
        if project.code.trim().is_empty() {
            let next = self
                .get_projects()?
                .iter()
                .filter_map(|other| numeric_suffix(&other.code, "PRJ-"))
                .max()
                .unwrap_or(0)
                + 1;
            project.code = format!("PRJ-{next:03}");
        }
        project.used_hours = 0.0;
        project.billable_hours = 0.0;
        let project = self.insert(project)?;
        self.recompute_rollups()?;
        self.get_project(&project.id)
    }

    pub fn update_project(&self, mut project: Project) -> Result<Project, BackendError> {
        self.prepare_project(&mut project)?;
        let project = self.replace(project)?;
        self.recompute_rollups()?;
        self.get_project(&project.id)
    }

    /// Projects are never removed: deleting archives them.
    pub fn delete_project(&self, id: &str) -> Result<Project, BackendError> {
        self.set_project_status(id, ProjectStatus::Archived)
    }

    pub fn restore_project(&self, id: &str) -> Result<Project, BackendError> {
        self.set_project_status(id, ProjectStatus::Active)
    }

    fn set_project_status(&self, id: &str, status: ProjectStatus) -> Result<Project, BackendError> {
        let mut project = self.get_project(id)?;
        project.status = status;
        self.replace(project)?;
        self.recompute_rollups()?;
        self.get_project(id)
    }

    // Validates and refreshes the denormalized client name.
    fn prepare_project(&self, project: &mut Project) -> Result<(), BackendError> {
        require(!project.name.trim().is_empty(), "project name is required")?;
        require(project.budget_amount >= 0.0, "budget cannot be negative")?;
        require(project.global_rate >= 0.0, "rate cannot be negative")?;
        require(
            project.entry_rules.max_hours_per_day > 0.0,
            "max hours per day must be positive",
        )?;
        let client = self
            .get_client(&project.client_id)
            .map_err(|_| BackendError::invalid(format!("unknown client: {}", project.client_id)))?;
        project.client_name = client.name;
        Ok(())
    }

    pub fn get_clients(&self) -> Result<Vec<Client>, BackendError> {
        self.list()
    }

    pub fn get_client(&self, id: &str) -> Result<Client, BackendError> {
        self.find(id)
    }

    pub fn add_client(&self, mut client: Client) -> Result<Client, BackendError> {
        validate_client(&client)?;
        client.total_projects = 0;
        self.insert(client)
    }

    /// Renames propagate to the projects that carry the client name.
    pub fn update_client(&self, client: Client) -> Result<Client, BackendError> {
        validate_client(&client)?;
        let client = self.replace(client)?;
        let mut projects = self.get_projects()?;
        let mut touched = false;
        for project in projects.iter_mut().filter(|p| p.client_id == client.id) {
            if project.client_name != client.name {
                project.client_name = client.name.clone();
                touched = true;
            }
        }
        if touched {
            self.save(&projects)?;
        }
        self.recompute_rollups()?;
        self.get_client(&client.id)
    }

    pub fn delete_client(&self, id: &str) -> Result<Client, BackendError> {
        self.remove(id)
    }

    pub fn get_task_categories(&self) -> Result<Vec<TaskCategory>, BackendError> {
        self.list()
    }

    pub fn get_task_category(&self, id: &str) -> Result<TaskCategory, BackendError> {
        self.find(id)
    }

    pub fn add_task_category(&self, category: TaskCategory) -> Result<TaskCategory, BackendError> {
        self.validate_category(&category, None)?;
        self.insert(category)
    }

    pub fn update_task_category(&self, category: TaskCategory) -> Result<TaskCategory, BackendError> {
        self.validate_category(&category, Some(&category.id))?;
        self.replace(category)
    }

    pub fn delete_task_category(&self, id: &str) -> Result<TaskCategory, BackendError> {
        self.remove(id)
    }

    fn validate_category(&self, category: &TaskCategory, own_id: Option<&str>) -> Result<(), BackendError> {
        let name = category.name.trim();
        require(!name.is_empty(), "category name is required")?;
        let taken = self.get_task_categories()?.iter().any(|other| {
            Some(other.id.as_str()) != own_id && other.name.trim().eq_ignore_ascii_case(name)
        });
        require(!taken, format!("category already exists: {name}"))
    }

    pub fn get_tasks(&self) -> Result<Vec<Task>, BackendError> {
        self.list()
    }

    pub fn add_task(&self, task: Task) -> Result<Task, BackendError> {
        self.validate_task(&task)?;
        self.insert(task)
    }

    pub fn update_task(&self, task: Task) -> Result<Task, BackendError> {
        self.validate_task(&task)?;
        self.replace(task)
    }

    pub fn delete_task(&self, id: &str) -> Result<Task, BackendError> {
        self.remove(id)
    }

    fn validate_task(&self, task: &Task) -> Result<(), BackendError> {
        require(!task.name.trim().is_empty(), "task name is required")?;
        require(task.estimated_hours >= 0.0, "estimate cannot be negative")?;
        self.get_project(&task.project_id)
            .map_err(|_| BackendError::invalid(format!("unknown project: {}", task.project_id)))?;
        if let Some(assignee) = &task.assignee_id {
            self.get_user(assignee)
                .map_err(|_| BackendError::invalid(format!("unknown assignee: {assignee}")))?;
        }
        Ok(())
    }
}

fn validate_client(client: &Client) -> Result<(), BackendError> {
    require(!client.name.trim().is_empty(), "client name is required")?;
    require(
        client.email.is_empty() || client.email.contains('@'),
        format!("invalid email: {}", client.email),
    )?;
    require(client.currency.trim().len() == 3, "currency must be a 3-letter code")
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{empty_backend, seeded_backend};
    use super::*;

    fn client(name: &str) -> Client {
        Client {
            id: String::new(),
            name: name.to_string(),
            company_name: String::new(),
            email: String::new(),
            status: ActiveStatus::Active,
            currency: "USD".into(),
            total_projects: 99,
            contacts: Vec::new(),
        }
    }

    fn project(name: &str, client_id: &str) -> Project {
        let mut project = crate::domain::seed::projects().remove(0);
        project.id = String::new();
        project.code = String::new();
        project.name = name.to_string();
        project.client_id = client_id.to_string();
        project.client_name = "stale".into();
        project
    }

    #[test]
    fn client_project_count_is_derived() {
        let (backend, _) = empty_backend();
        let acme = backend.add_client(client("Acme")).unwrap();
        assert_eq!(acme.total_projects, 0);
        let first = backend.add_project(project("Site", &acme.id)).unwrap();
        backend.add_project(project("App", &acme.id)).unwrap();
        assert_eq!(first.client_name, "Acme");
        assert_eq!(first.code, "PRJ-001");
        assert_eq!(backend.get_client(&acme.id).unwrap().total_projects, 2);

        backend.delete_project(&first.id).unwrap();
        assert_eq!(backend.get_client(&acme.id).unwrap().total_projects, 1);
        backend.restore_project(&first.id).unwrap();
        assert_eq!(backend.get_client(&acme.id).unwrap().total_projects, 2);
    }

    #[test]
    fn project_needs_known_client() {
        let (backend, _) = empty_backend();
        let err = backend.add_project(project("Orphan", "cl-404")).unwrap_err();
        assert!(matches!(err, BackendError::ValidationFailed(_)));
    }

    #[test]
    fn client_rename_reaches_projects() {
        let backend = seeded_backend();
        let mut northwind = backend.get_client("cl-1").unwrap();
        northwind.name = "Northwind Global".into();
        backend.update_client(northwind).unwrap();
        let portal = backend.get_project("prj-1").unwrap();
        assert_eq!(portal.client_name, "Northwind Global");
    }

    #[test]
    fn category_names_are_unique() {
        let backend = seeded_backend();
        let mut dup = backend.get_task_category("cat-1").unwrap();
        dup.id = String::new();
        dup.name = " development ".into();
        assert!(backend.add_task_category(dup).is_err());
    }

    #[test]
    fn generated_codes_skip_past_imported_ones() {
        let backend = seeded_backend();
        let mut imported = project("Migration", "cl-2");
        imported.code = "PRJ-007".into();
        backend.add_project(imported).unwrap();
        let next = backend.add_project(project("Reporting", "cl-2")).unwrap();
        assert_eq!(next.code, "PRJ-008");
    }
}
