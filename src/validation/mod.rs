//! Input validation module
//!
//! Field-format rules on the auth and user DTOs live as `validator` derives
//! in `models`; this module holds the checks those derives cannot express.

use crate::models::{CreateFacility, CreateResource, UpdateResource, UserRole};
use thiserror::Error;

#[derive(Debug, Error)]
#[allow(dead_code)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    Required { field: String },

    #[error("Field '{field}' is too long (max {max} characters)")]
    TooLong { field: String, max: usize },

    #[error("Role '{role}' cannot be self-registered")]
    RestrictedRole { role: String },
}

/// Roles that may be taken through open registration. Privileged accounts
/// (admin, maintenance) are created by an admin through user management.
pub fn validate_registration_role(role: UserRole) -> Result<(), ValidationError> {
    match role {
        UserRole::Student | UserRole::Faculty => Ok(()),
        UserRole::Admin | UserRole::Maintenance => Err(ValidationError::RestrictedRole {
            role: format!("{:?}", role).to_lowercase(),
        }),
    }
}

/// Validate a resource creation request
pub fn validate_create_resource(input: &CreateResource) -> Result<(), ValidationError> {
    validate_resource_name(&input.name)?;
    validate_facilities(&input.facilities)?;
    Ok(())
}

/// Validate a resource update request
pub fn validate_update_resource(input: &UpdateResource) -> Result<(), ValidationError> {
    validate_resource_name(&input.name)?;
    if let Some(ref facilities) = input.facilities {
        validate_facilities(facilities)?;
    }
    Ok(())
}

fn validate_resource_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }
    if name.len() > 255 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 255,
        });
    }
    Ok(())
}

fn validate_facilities(facilities: &[CreateFacility]) -> Result<(), ValidationError> {
    for facility in facilities {
        if facility.name.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "facilities.name".to_string(),
            });
        }
        if facility.name.len() > 255 {
            return Err(ValidationError::TooLong {
                field: "facilities.name".to_string(),
                max: 255,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn resource_input(name: &str) -> CreateResource {
        CreateResource {
            name: name.to_string(),
            resource_type_id: Uuid::new_v4(),
            building_id: Some(Uuid::new_v4()),
            floor_number: Some(1),
            description: None,
            facilities: Vec::new(),
            initial_allocation: None,
        }
    }

    #[test]
    fn test_registration_role_open() {
        assert!(validate_registration_role(UserRole::Student).is_ok());
        assert!(validate_registration_role(UserRole::Faculty).is_ok());
    }

    #[test]
    fn test_registration_role_restricted() {
        assert!(matches!(
            validate_registration_role(UserRole::Admin),
            Err(ValidationError::RestrictedRole { .. })
        ));
        assert!(matches!(
            validate_registration_role(UserRole::Maintenance),
            Err(ValidationError::RestrictedRole { .. })
        ));
    }

    #[test]
    fn test_validate_create_resource_valid() {
        let mut input = resource_input("Classroom 101");
        input.facilities.push(CreateFacility {
            name: "Projector".to_string(),
            details: Some("HD projector".to_string()),
        });
        assert!(validate_create_resource(&input).is_ok());
    }

    #[test]
    fn test_validate_create_resource_empty_name() {
        let input = resource_input("   ");
        assert!(matches!(
            validate_create_resource(&input),
            Err(ValidationError::Required { .. })
        ));
    }

    #[test]
    fn test_validate_create_resource_name_too_long() {
        let input = resource_input(&"x".repeat(256));
        assert!(matches!(
            validate_create_resource(&input),
            Err(ValidationError::TooLong { .. })
        ));
    }

    #[test]
    fn test_validate_create_resource_blank_facility() {
        let mut input = resource_input("Computer Lab A");
        input.facilities.push(CreateFacility {
            name: "".to_string(),
            details: None,
        });
        assert!(matches!(
            validate_create_resource(&input),
            Err(ValidationError::Required { .. })
        ));
    }

    #[test]
    fn test_validate_update_resource_valid() {
        let input = UpdateResource {
            name: "Classroom 102".to_string(),
            resource_type_id: Uuid::new_v4(),
            building_id: None,
            floor_number: None,
            description: None,
            facilities: None,
        };
        assert!(validate_update_resource(&input).is_ok());
    }

    #[test]
    fn test_validate_update_resource_rejects_blank_name() {
        let input = UpdateResource {
            name: "".to_string(),
            resource_type_id: Uuid::new_v4(),
            building_id: None,
            floor_number: None,
            description: None,
            facilities: None,
        };
        assert!(matches!(
            validate_update_resource(&input),
            Err(ValidationError::Required { .. })
        ));
    }
}
