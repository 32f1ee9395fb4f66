use std::sync::Arc;

use chrono::{TimeZone, Utc};
use credence_ops::application::backend::Backend;
use credence_ops::domain::error::BackendError;
use credence_ops::domain::models::*;
use credence_ops::infrastructure::clock::ManualClock;
use credence_ops::infrastructure::store::MemoryStore;

fn seeded() -> Backend {
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 10, 9, 0, 0).unwrap()));
    Backend::with_clock(Arc::new(MemoryStore::new()), clock)
}

fn category(name: &str) -> TaskCategory {
    TaskCategory {
        id: String::new(),
        name: name.to_string(),
        is_billable: true,
        is_proof_required: false,
        is_notes_required: false,
        restricted_to_projects: Vec::new(),
        status: ActiveStatus::Active,
    }
}

#[test]
fn added_records_get_fresh_ids() {
    let backend = seeded();
    let before: Vec<String> = backend
        .get_task_categories()
        .unwrap()
        .into_iter()
        .map(|c| c.id)
        .collect();

    let first = backend.add_task_category(category("Research")).unwrap();
    let second = backend.add_task_category(category("Training")).unwrap();
    assert!(!before.contains(&first.id));
    assert!(!before.contains(&second.id));
    assert_ne!(first.id, second.id);
    assert_eq!(backend.get_task_category(&first.id).unwrap().name, "Research");

    let client = backend
        .add_client(Client {
            id: "ignored".into(),
            name: "Harbor Labs".into(),
            company_name: "Harbor Labs LLC".into(),
            email: "ap@harbor.example".into(),
            status: ActiveStatus::Active,
            currency: "EUR".into(),
            total_projects: 9,
            contacts: Vec::new(),
        })
        .unwrap();
    assert_eq!(client.id, "cl-3");
    assert_eq!(client.total_projects, 0);

    let invoice = backend
        .add_invoice(Invoice {
            id: String::new(),
            invoice_no: String::new(),
            client_id: client.id.clone(),
            client_name: String::new(),
            project_id: None,
            project_name: String::new(),
            issue_date: "2024-06-10".into(),
            due_date: "2024-07-10".into(),
            items: vec![InvoiceItem {
                description: "Discovery workshop".into(),
                quantity: 2.0,
                unit_price: 150.0,
                amount: 0.0,
            }],
            tax_rate: 0.0,
            subtotal: 0.0,
            tax_amount: 0.0,
            total_amount: 0.0,
            paid_amount: 0.0,
            balance_amount: 0.0,
            status: InvoiceStatus::Draft,
            payments: Vec::new(),
        })
        .unwrap();
    assert_eq!(invoice.id, "inv-2");
    assert_eq!(invoice.client_name, "Harbor Labs");
    assert_eq!(invoice.total_amount, 300.0);
}

#[test]
fn user_ids_follow_joining_date() {
    let backend = seeded();
    let user = backend
        .add_user(User {
            id: String::new(),
            name: "Divya Nair".into(),
            email: "divya@credence.example".into(),
            role: Role::Employee,
            department: "Design".into(),
            designation: "Illustrator".into(),
            avatar_initials: String::new(),
            status: ActiveStatus::Active,
            hourly_cost_rate: Some(30.0),
            joining_date: Some("2024-05-20".into()),
        })
        .unwrap();
    assert_eq!(user.id, "CRED005/05-24");
    assert_eq!(user.avatar_initials, "DN");
    assert!(backend.get_users().unwrap().iter().any(|u| u.id == user.id));
}

#[test]
fn update_replaces_only_the_target() {
    let backend = seeded();
    let others_before: Vec<TaskCategory> = backend
        .get_task_categories()
        .unwrap()
        .into_iter()
        .filter(|c| c.id != "cat-2")
        .collect();

    let mut design = backend.get_task_category("cat-2").unwrap();
    design.is_proof_required = true;
    design.restricted_to_projects = vec!["prj-2".into()];
    let updated = backend.update_task_category(design.clone()).unwrap();
    assert_eq!(updated, design);
    assert_eq!(backend.get_task_category("cat-2").unwrap(), design);

    let others_after: Vec<TaskCategory> = backend
        .get_task_categories()
        .unwrap()
        .into_iter()
        .filter(|c| c.id != "cat-2")
        .collect();
    assert_eq!(others_before, others_after);
}

#[test]
fn missing_ids_report_not_found_everywhere() {
    let backend = seeded();
    let mut ghost = category("Ghost");
    ghost.id = "cat-99".into();
    assert!(matches!(
        backend.update_task_category(ghost),
        Err(BackendError::NotFound { .. })
    ));
    assert!(backend.delete_client("cl-99").unwrap_err().is_not_found());
    assert!(backend.delete_time_entry("te-99").unwrap_err().is_not_found());
    assert!(backend.restore_project("prj-99").unwrap_err().is_not_found());
}

#[test]
fn delete_removes_but_projects_archive() {
    let backend = seeded();
    backend.delete_task_category("cat-3").unwrap();
    assert!(backend.get_task_category("cat-3").unwrap_err().is_not_found());
    assert!(backend.get_task_categories().unwrap().iter().all(|c| c.id != "cat-3"));

    let archived = backend.delete_project("prj-2").unwrap();
    assert_eq!(archived.status, ProjectStatus::Archived);
    assert_eq!(backend.get_project("prj-2").unwrap().status, ProjectStatus::Archived);
    // archived projects no longer count toward the client
    assert_eq!(backend.get_client("cl-1").unwrap().total_projects, 1);

    let restored = backend.restore_project("prj-2").unwrap();
    assert_eq!(restored.status, ProjectStatus::Active);
    assert_eq!(backend.get_client("cl-1").unwrap().total_projects, 2);
}

#[test]
fn deleting_a_user_keeps_their_entries() {
    let backend = seeded();
    backend.delete_user("CRED004/08-22").unwrap();
    let orphaned = backend
        .get_time_entries()
        .unwrap()
        .into_iter()
        .filter(|entry| entry.user_id == "CRED004/08-22")
        .count();
    assert_eq!(orphaned, 2);
}

#[test]
fn locked_entries_are_frozen() {
    let backend = seeded();
    backend.approve_request("apr-1").unwrap();
    backend.set_entry_status("te-1", EntryStatus::Locked).unwrap();
    assert!(matches!(
        backend.set_entry_status("te-1", EntryStatus::Draft),
        Err(BackendError::ValidationFailed(_))
    ));
    assert!(backend.delete_time_entry("te-1").is_err());
    // approved entries cannot be rejected afterwards
    assert!(backend.set_entry_status("te-2", EntryStatus::Rejected).is_err());
}

fn task(project_id: &str, name: &str) -> Task {
    Task {
        id: String::new(),
        project_id: project_id.into(),
        name: name.into(),
        assignee_id: Some("CRED002/03-22".into()),
        estimated_hours: 4.0,
        status: TaskStatus::Todo,
    }
}

#[test]
fn tasks_add_update_delete() {
    let backend = seeded();
    let login = backend.add_task(task("prj-1", "Login flow")).unwrap();
    let billing = backend.add_task(task("prj-1", "Billing page")).unwrap();
    assert_eq!(login.id, "tsk-1");
    assert_eq!(billing.id, "tsk-2");

    let mut started = login.clone();
    started.status = TaskStatus::InProgress;
    started.estimated_hours = 6.0;
    backend.update_task(started.clone()).unwrap();
    let tasks = backend.get_tasks().unwrap();
    assert!(tasks.contains(&started));
    assert!(tasks.contains(&billing));

    assert!(backend.add_task(task("prj-99", "Orphan")).is_err());

    backend.delete_task(&login.id).unwrap();
    assert_eq!(backend.get_tasks().unwrap(), vec![billing]);
    assert!(backend.delete_task(&login.id).unwrap_err().is_not_found());
    assert!(backend.update_task(started).unwrap_err().is_not_found());
}

#[test]
fn availability_add_update_delete() {
    let backend = seeded();
    let leave = backend
        .add_availability(AvailabilityEvent {
            id: String::new(),
            user_id: "CRED003/06-22".into(),
            date: "2024/06/14".into(),
            kind: AvailabilityKind::Leave,
            note: "family trip".into(),
        })
        .unwrap();
    assert_eq!(leave.date, "2024-06-14");
    let holiday = backend
        .add_availability(AvailabilityEvent {
            id: String::new(),
            user_id: "CRED002/03-22".into(),
            date: "2024-06-17".into(),
            kind: AvailabilityKind::Holiday,
            note: String::new(),
        })
        .unwrap();

    let mut half = leave.clone();
    half.kind = AvailabilityKind::HalfDay;
    backend.update_availability(half.clone()).unwrap();
    let events = backend.get_availability().unwrap();
    assert!(events.contains(&half));
    assert!(events.contains(&holiday));

    backend.delete_availability(&leave.id).unwrap();
    assert_eq!(backend.get_availability().unwrap(), vec![holiday]);
    assert!(backend.delete_availability(&leave.id).unwrap_err().is_not_found());
}

#[test]
fn assignments_add_update_delete() {
    let backend = seeded();
    let assignment = backend
        .assign_user(UserAssignment {
            id: String::new(),
            user_id: "CRED002/03-22".into(),
            project_id: "prj-3".into(),
            role: "Reviewer".into(),
            assigned_at: None,
        })
        .unwrap();
    assert_eq!(assignment.assigned_at, Some(backend.now()));

    let duplicate = UserAssignment {
        id: String::new(),
        ..assignment.clone()
    };
    assert!(matches!(
        backend.assign_user(duplicate),
        Err(BackendError::ValidationFailed(_))
    ));

    let mut lead = assignment.clone();
    lead.role = "Lead".into();
    backend.update_user_assignment(lead.clone()).unwrap();
    assert_eq!(backend.get_user_assignments().unwrap(), vec![lead]);

    backend.delete_user_assignment(&assignment.id).unwrap();
    assert!(backend.get_user_assignments().unwrap().is_empty());
    assert!(
        backend
            .delete_user_assignment(&assignment.id)
            .unwrap_err()
            .is_not_found()
    );
}

#[test]
fn user_update_refreshes_initials() {
    let backend = seeded();
    let others_before: Vec<User> = backend
        .get_users()
        .unwrap()
        .into_iter()
        .filter(|u| u.id != "CRED003/06-22")
        .collect();

    let mut meera = backend.get_user("CRED003/06-22").unwrap();
    meera.name = "meera krishnan".into();
    meera.avatar_initials = "ZZ".into();
    let updated = backend.update_user(meera).unwrap();
    assert_eq!(updated.avatar_initials, "MK");
    assert_eq!(backend.get_user("CRED003/06-22").unwrap(), updated);

    let others_after: Vec<User> = backend
        .get_users()
        .unwrap()
        .into_iter()
        .filter(|u| u.id != "CRED003/06-22")
        .collect();
    assert_eq!(others_before, others_after);

    let mut ghost = updated.clone();
    ghost.id = "CRED099/01-20".into();
    ghost.email = "ghost@credence.example".into();
    assert!(backend.update_user(ghost).unwrap_err().is_not_found());
}

#[test]
fn invoice_update_recomputes_totals_and_delete_removes() {
    let backend = seeded();
    let mut invoice = backend.get_invoice("inv-1").unwrap();
    invoice.items = vec![InvoiceItem {
        description: "Pipeline support, June".into(),
        quantity: 10.0,
        unit_price: 120.0,
        amount: 0.0,
    }];
    invoice.total_amount = 1.0;
    let updated = backend.update_invoice(invoice).unwrap();
    assert_eq!(updated.subtotal, 1200.0);
    assert_eq!(updated.tax_amount, 216.0);
    assert_eq!(updated.total_amount, 1416.0);
    assert_eq!(updated.balance_amount, 1416.0);
    assert_eq!(backend.get_invoice("inv-1").unwrap(), updated);

    backend.delete_invoice("inv-1").unwrap();
    assert!(backend.get_invoice("inv-1").unwrap_err().is_not_found());
    assert!(backend.delete_invoice("inv-1").unwrap_err().is_not_found());
    assert!(backend.update_invoice(updated).unwrap_err().is_not_found());
}

#[test]
fn approvals_and_notifications_delete() {
    let backend = seeded();
    backend.delete_approval("apr-1").unwrap();
    assert!(backend.get_approval("apr-1").unwrap_err().is_not_found());
    assert!(backend.delete_approval("apr-1").unwrap_err().is_not_found());

    let note = backend
        .notify("CRED002/03-22", "Timesheet due", "Submit by Friday")
        .unwrap();
    backend.delete_notification(&note.id).unwrap();
    assert!(backend.get_notifications("CRED002/03-22").unwrap().is_empty());
    assert!(backend.delete_notification(&note.id).unwrap_err().is_not_found());
}
