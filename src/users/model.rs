use crate::error_handler::CustomError;
use crate::schema::users;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Identifiable, Queryable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: i32,
    pub email: String,
    // Stored and returned in plain text, matching the system this
    // replaces. A real deployment must hash this.
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub email: String,
    pub password: String,
}

/// Raw request body; both fields must be present and non-empty.
#[derive(Debug, Deserialize)]
pub struct UserPayload {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl UserPayload {
    pub fn validate(self) -> Result<NewUser, CustomError> {
        let email = self.email.filter(|email| !email.is_empty());
        let password = self.password.filter(|password| !password.is_empty());
        match (email, password) {
            (Some(email), Some(password)) => Ok(NewUser { email, password }),
            _ => Err(CustomError::validation(
                "Invalid input data. Email and password are required.",
            )),
        }
    }
}

impl User {
    pub fn list(conn: &mut PgConnection) -> Result<Vec<User>, CustomError> {
        let all_users = users::table.order(users::id.asc()).load(conn)?;
        Ok(all_users)
    }

    pub fn create(conn: &mut PgConnection, new_user: NewUser) -> Result<User, CustomError> {
        let user = diesel::insert_into(users::table)
            .values(new_user)
            .get_result(conn)?;
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_with_both_fields_passes() {
        let payload = UserPayload {
            email: Some("ada@example.com".into()),
            password: Some("hunter2".into()),
        };
        let new_user = payload.validate().unwrap();
        assert_eq!(new_user.email, "ada@example.com");
    }

    #[test]
    fn missing_or_empty_fields_are_rejected() {
        let missing = UserPayload {
            email: Some("ada@example.com".into()),
            password: None,
        };
        assert_eq!(missing.validate().unwrap_err().error_status_code, 400);

        let empty = UserPayload {
            email: Some("".into()),
            password: Some("hunter2".into()),
        };
        assert_eq!(empty.validate().unwrap_err().error_status_code, 400);
    }
}
