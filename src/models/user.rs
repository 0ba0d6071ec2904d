use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Merchant,
    Driver,
    SuperAdmin,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Customer, Role::Merchant, Role::Driver, Role::SuperAdmin];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Merchant => "merchant",
            Role::Driver => "driver",
            Role::SuperAdmin => "super_admin",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriverStatus {
    Pending,
    Approved,
    Rejected,
    Banned,
}

/// Uploaded identity images of a driver applicant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverDocuments {
    pub cni_front: String,
    pub cni_back: String,
    pub driver_document: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub roles: Vec<Role>,
    pub driver_status: Option<DriverStatus>,
    pub driver_documents: Option<DriverDocuments>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: String, phone: String, email: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            phone,
            email,
            roles: vec![Role::Customer],
            driver_status: None,
            driver_documents: None,
            created_at: Utc::now(),
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn grant(&mut self, role: Role) {
        if !self.has_role(role) {
            self.roles.push(role);
        }
    }

    pub fn revoke(&mut self, role: Role) {
        self.roles.retain(|r| *r != role);
    }

    pub fn is_approved_driver(&self) -> bool {
        self.has_role(Role::Driver) && self.driver_status == Some(DriverStatus::Approved)
    }
}
