use crate::domain::error::BackendError;
use crate::domain::models::*;
use crate::utils::parsing::normalize_date;

use super::records::user_id_for;
use super::{Backend, Record, require};

impl Backend {
    pub fn get_users(&self) -> Result<Vec<User>, BackendError> {
        self.list()
    }

    pub fn get_user(&self, id: &str) -> Result<User, BackendError> {
        self.find(id)
    }

    pub fn add_user(&self, mut user: User) -> Result<User, BackendError> {
        let mut users = self.get_users()?;
        validate_user(&user, &users, None)?;
        user.id = user_id_for(&users, user.joining_date.as_deref(), self.now());
        user.avatar_initials = avatar_initials(&user.name);
        users.push(user.clone());
        self.save(&users)?;
        self.audit("CREATE", User::ENTITY, &user.id, &user.email);
        Ok(user)
    }

    pub fn update_user(&self, mut user: User) -> Result<User, BackendError> {
        let users = self.get_users()?;
        validate_user(&user, &users, Some(&user.id))?;
        user.avatar_initials = avatar_initials(&user.name);
        self.replace(user)
    }

    /// Removes the user only; their entries and assignments stay behind.
    pub fn delete_user(&self, id: &str) -> Result<User, BackendError> {
        self.remove(id)
    }

    pub fn get_user_assignments(&self) -> Result<Vec<UserAssignment>, BackendError> {
        self.list()
    }

    pub fn assign_user(&self, mut assignment: UserAssignment) -> Result<UserAssignment, BackendError> {
        self.get_user(&assignment.user_id)?;
        self.get_project(&assignment.project_id)?;
        let duplicate = self.get_user_assignments()?.iter().any(|existing| {
            existing.user_id == assignment.user_id && existing.project_id == assignment.project_id
        });
        require(!duplicate, "user is already assigned to this project")?;
        assignment.assigned_at.get_or_insert(self.now());
        self.insert(assignment)
    }

    pub fn update_user_assignment(&self, assignment: UserAssignment) -> Result<UserAssignment, BackendError> {
        self.replace(assignment)
    }

    pub fn delete_user_assignment(&self, id: &str) -> Result<UserAssignment, BackendError> {
        self.remove(id)
    }

    pub fn get_availability(&self) -> Result<Vec<AvailabilityEvent>, BackendError> {
        self.list()
    }

    pub fn add_availability(&self, mut event: AvailabilityEvent) -> Result<AvailabilityEvent, BackendError> {
        self.get_user(&event.user_id)?;
        event.date = normalize_date(&event.date)
            .ok_or_else(|| BackendError::invalid(format!("invalid date: {}", event.date)))?;
        self.insert(event)
    }

    pub fn update_availability(&self, mut event: AvailabilityEvent) -> Result<AvailabilityEvent, BackendError> {
        event.date = normalize_date(&event.date)
            .ok_or_else(|| BackendError::invalid(format!("invalid date: {}", event.date)))?;
        self.replace(event)
    }

    pub fn delete_availability(&self, id: &str) -> Result<AvailabilityEvent, BackendError> {
        self.remove(id)
    }

    pub fn get_notifications(&self, user_id: &str) -> Result<Vec<Notification>, BackendError> {
        Ok(self
            .list::<Notification>()?
            .into_iter()
            .filter(|notification| notification.user_id == user_id)
            .collect())
    }

    pub fn notify(&self, user_id: &str, title: &str, message: &str) -> Result<Notification, BackendError> {
        require(!title.trim().is_empty(), "notification title is required")?;
        self.insert(Notification {
            id: String::new(),
            user_id: user_id.to_string(),
            title: title.to_string(),
            message: message.to_string(),
            read: false,
            created_at: Some(self.now()),
        })
    }

    pub fn mark_notification_read(&self, id: &str) -> Result<Notification, BackendError> {
        let mut notification: Notification = self.find(id)?;
        notification.read = true;
        self.replace(notification)
    }

    pub fn delete_notification(&self, id: &str) -> Result<Notification, BackendError> {
        self.remove(id)
    }

    pub fn unread_count(&self, user_id: &str) -> Result<usize, BackendError> {
        Ok(self
            .get_notifications(user_id)?
            .iter()
            .filter(|notification| !notification.read)
            .count())
    }
}

fn validate_user(user: &User, users: &[User], own_id: Option<&str>) -> Result<(), BackendError> {
    require(!user.name.trim().is_empty(), "user name is required")?;
    require(user.email.contains('@'), format!("invalid email: {}", user.email))?;
    if let Some(rate) = user.hourly_cost_rate {
        require(rate >= 0.0, "hourly cost rate cannot be negative")?;
    }
    let taken = users.iter().any(|other| {
        Some(other.id.as_str()) != own_id && other.email.eq_ignore_ascii_case(&user.email)
    });
    require(!taken, format!("email already in use: {}", user.email))
}
