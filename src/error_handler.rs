use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use diesel::result::Error as DieselError;
use serde::Serialize;
use serde_json::json;
use std::fmt;

/// Machine-readable error codes, stable across releases. Clients should
/// branch on `code`, never on the text of `error`.
pub mod codes {
    pub const VALIDATION: &str = "validation_error";
    pub const NOT_FOUND: &str = "not_found";
    pub const DATABASE: &str = "database_error";
    pub const UNSUPPORTED_FORMAT: &str = "unsupported_format";
    pub const INTERNAL: &str = "internal_error";
}

#[derive(Debug, Serialize)]
pub struct CustomError {
    pub error_status_code: u16,
    pub error_code: &'static str,
    pub error_message: String,
}

impl CustomError {
    pub fn new(
        error_status_code: u16,
        error_code: &'static str,
        error_message: String,
    ) -> CustomError {
        CustomError {
            error_status_code,
            error_code,
            error_message,
        }
    }

    pub fn validation(error_message: impl Into<String>) -> CustomError {
        CustomError::new(400, codes::VALIDATION, error_message.into())
    }

    pub fn not_found(error_message: impl Into<String>) -> CustomError {
        CustomError::new(404, codes::NOT_FOUND, error_message.into())
    }

    pub fn database(error_message: impl Into<String>) -> CustomError {
        CustomError::new(500, codes::DATABASE, error_message.into())
    }

    pub fn unsupported_format(error_message: impl Into<String>) -> CustomError {
        CustomError::new(400, codes::UNSUPPORTED_FORMAT, error_message.into())
    }

    pub fn internal(error_message: impl Into<String>) -> CustomError {
        CustomError::new(500, codes::INTERNAL, error_message.into())
    }
}

impl fmt::Display for CustomError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.error_message.as_str())
    }
}

impl From<DieselError> for CustomError {
    fn from(error: DieselError) -> CustomError {
        match error {
            DieselError::DatabaseError(_, err) => {
                log::warn!("Database error: {}", err.message());
                CustomError::database(err.message().to_string())
            }
            DieselError::NotFound => CustomError::not_found("The record is not found"),
            err => CustomError::database(format!("Unknown Diesel error: {}", err)),
        }
    }
}

impl From<std::io::Error> for CustomError {
    fn from(error: std::io::Error) -> CustomError {
        log::error!("Internal server IO error: {:#?}", error);
        CustomError::internal(format!("IO error: {}", error))
    }
}

impl From<actix_web::error::BlockingError> for CustomError {
    fn from(error: actix_web::error::BlockingError) -> CustomError {
        log::error!("Blocking pool error: {:#?}", error);
        CustomError::internal("Internal server error")
    }
}

impl From<actix_multipart::MultipartError> for CustomError {
    fn from(error: actix_multipart::MultipartError) -> CustomError {
        log::trace!("Encountered MultipartError: {:?}", error);
        CustomError::validation(format!("Multipart Upload Error: {}", error))
    }
}

impl From<csv::Error> for CustomError {
    fn from(error: csv::Error) -> CustomError {
        log::warn!("Csv Error: {:?}", error);
        CustomError::validation(format!("Csv Error: {}", error))
    }
}

impl From<serde_json::Error> for CustomError {
    fn from(error: serde_json::Error) -> CustomError {
        log::warn!("Json Error: {:?}", error);
        CustomError::validation(format!("Json Error: {}", error))
    }
}

impl From<roxmltree::Error> for CustomError {
    fn from(error: roxmltree::Error) -> CustomError {
        log::warn!("Xml Error: {:?}", error);
        CustomError::validation(format!("Xml Error: {}", error))
    }
}

impl From<calamine::Error> for CustomError {
    fn from(error: calamine::Error) -> CustomError {
        log::warn!("Excel Error: {:?}", error);
        CustomError::validation(format!("Excel Error: {}", error))
    }
}

impl ResponseError for CustomError {
    fn error_response(&self) -> HttpResponse {
        let status_code = match StatusCode::from_u16(self.error_status_code) {
            Ok(status_code) => status_code,
            Err(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Database error text is surfaced verbatim; `code` is the stable
        // field clients are expected to branch on.
        HttpResponse::build(status_code).json(json!({
            "error": self.error_message,
            "code": self.error_code,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diesel_not_found_maps_to_404() {
        let err = CustomError::from(DieselError::NotFound);
        assert_eq!(err.error_status_code, 404);
        assert_eq!(err.error_code, codes::NOT_FOUND);
    }

    #[test]
    fn validation_errors_are_400() {
        let err = CustomError::validation("email is required");
        assert_eq!(err.error_status_code, 400);
        assert_eq!(err.error_code, codes::VALIDATION);
        assert_eq!(err.to_string(), "email is required");
    }

    #[test]
    fn unsupported_format_is_400() {
        let err = CustomError::unsupported_format("Unsupported file extension");
        assert_eq!(err.error_status_code, 400);
        assert_eq!(err.error_code, codes::UNSUPPORTED_FORMAT);
    }

    #[test]
    fn database_errors_keep_the_message() {
        let err = CustomError::database("duplicate key value violates unique constraint");
        assert_eq!(err.error_status_code, 500);
        assert!(err.error_message.contains("duplicate key"));
    }
}
