#![forbid(unsafe_code)]

use serde::Serialize;

use crate::{ContractViolation, SchemaVersion, Validate};

pub const DIRECTORY_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

fn validate_id(field: &'static str, s: &str, max_len: usize) -> Result<(), ContractViolation> {
    if s.trim().is_empty() {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "must not be empty",
        });
    }
    if s.len() > max_len {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "too long",
        });
    }
    if !s.is_ascii() {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "must be ASCII",
        });
    }
    Ok(())
}

fn validate_text(field: &'static str, s: &str, max_len: usize) -> Result<(), ContractViolation> {
    if s.trim().is_empty() {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "must not be empty",
        });
    }
    if s.len() > max_len {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "too long",
        });
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OrganizationId(String);

impl OrganizationId {
    pub fn new(id: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(id.into());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for OrganizationId {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_id("organization_id", &self.0, 64)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct EmployeeId(String);

impl EmployeeId {
    pub fn new(id: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(id.into());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for EmployeeId {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_id("employee_id", &self.0, 64)
    }
}

/// The engine's view of one directory row. The HR directory owns this data;
/// the review engine never mutates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmployeeRecord {
    pub schema_version: SchemaVersion,
    pub employee_id: EmployeeId,
    pub organization_id: OrganizationId,
    pub full_name: String,
    pub email: Option<String>,
    pub job_title: String,
    pub department: String,
    pub hierarchy_level: u8,
    pub manager_id: Option<EmployeeId>,
    pub is_active: bool,
}

impl EmployeeRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn v1(
        employee_id: EmployeeId,
        organization_id: OrganizationId,
        full_name: String,
        email: Option<String>,
        job_title: String,
        department: String,
        hierarchy_level: u8,
        manager_id: Option<EmployeeId>,
        is_active: bool,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            schema_version: DIRECTORY_CONTRACT_VERSION,
            employee_id,
            organization_id,
            full_name,
            email,
            job_title,
            department,
            hierarchy_level,
            manager_id,
            is_active,
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for EmployeeRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != DIRECTORY_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "employee_record.schema_version",
                reason: "must match DIRECTORY_CONTRACT_VERSION",
            });
        }
        self.employee_id.validate()?;
        self.organization_id.validate()?;
        validate_text("employee_record.full_name", &self.full_name, 128)?;
        if let Some(email) = &self.email {
            validate_text("employee_record.email", email, 128)?;
            if !email.contains('@') {
                return Err(ContractViolation::InvalidValue {
                    field: "employee_record.email",
                    reason: "must contain '@'",
                });
            }
        }
        validate_text("employee_record.job_title", &self.job_title, 128)?;
        validate_text("employee_record.department", &self.department, 128)?;
        if let Some(manager_id) = &self.manager_id {
            manager_id.validate()?;
            if manager_id == &self.employee_id {
                return Err(ContractViolation::InvalidValue {
                    field: "employee_record.manager_id",
                    reason: "must not reference the employee itself",
                });
            }
        }
        Ok(())
    }
}
