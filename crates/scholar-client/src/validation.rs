//! Field-level checks run before anything is sent to the server.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use scholar_types::api::CompleteProfileRequest;

pub const MAX_RESULT_BYTES: u64 = 5 * 1024 * 1024;

static CONTROL_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{12}$").expect("control number pattern"));
static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern")
});
static PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\+255[0-9]{9}|0[67][0-9]{8})$").expect("phone pattern")
});
static SPECIAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[!@#$%^&*(),.?":{}|<>]"#).expect("special char pattern"));
static CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{6}$").expect("verification code pattern"));

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please enter a valid 12-digit control number")]
    ControlNumber,
    #[error("Please enter a valid email address")]
    Email,
    #[error("Password is required")]
    PasswordRequired,
    #[error("Password must be at least 8 characters long")]
    PasswordTooShort,
    #[error("Password must contain at least one uppercase letter")]
    PasswordUppercase,
    #[error("Password must contain at least one lowercase letter")]
    PasswordLowercase,
    #[error("Password must contain at least one number")]
    PasswordDigit,
    #[error("Password must contain at least one special character")]
    PasswordSpecial,
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("Please enter a valid phone number starting with 06, 07, or +255")]
    Phone,
    #[error("{0} is required")]
    Required(&'static str),
    #[error("Batch number must be a positive number")]
    BatchNumber,
    #[error("Please enter the 6-digit verification code")]
    VerificationCode,
    #[error("Please upload a PDF file")]
    NotPdf,
    #[error("File size should be less than 5MB")]
    FileTooLarge,
    #[error("The selected file is empty")]
    EmptyFile,
    #[error("Message cannot be empty")]
    EmptyMessage,
}

/// Exactly twelve ASCII digits, no surrounding whitespace.
pub fn control_number(value: &str) -> Result<(), ValidationError> {
    if CONTROL_NUMBER.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError::ControlNumber)
    }
}

pub fn email(value: &str) -> Result<(), ValidationError> {
    if EMAIL.is_match(value.trim()) {
        Ok(())
    } else {
        Err(ValidationError::Email)
    }
}

/// Strength rules, checked in order so the first unmet rule is reported.
pub fn password(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::PasswordRequired);
    }
    if value.chars().count() < 8 {
        return Err(ValidationError::PasswordTooShort);
    }
    if !value.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(ValidationError::PasswordUppercase);
    }
    if !value.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(ValidationError::PasswordLowercase);
    }
    if !value.chars().any(|c| c.is_ascii_digit()) {
        return Err(ValidationError::PasswordDigit);
    }
    if !SPECIAL.is_match(value) {
        return Err(ValidationError::PasswordSpecial);
    }
    Ok(())
}

pub fn password_pair(value: &str, confirmation: &str) -> Result<(), ValidationError> {
    password(value)?;
    if value != confirmation {
        return Err(ValidationError::PasswordMismatch);
    }
    Ok(())
}

pub fn phone(value: &str) -> Result<(), ValidationError> {
    if PHONE.is_match(value.trim()) {
        Ok(())
    } else {
        Err(ValidationError::Phone)
    }
}

pub fn verification_code(value: &str) -> Result<(), ValidationError> {
    if CODE.is_match(value.trim()) {
        Ok(())
    } else {
        Err(ValidationError::VerificationCode)
    }
}

pub fn required(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::Required(field))
    } else {
        Ok(())
    }
}

/// The profile-completion form: every field present and a valid phone.
pub fn completion_form(form: &CompleteProfileRequest) -> Result<(), ValidationError> {
    required("Full name", &form.name)?;
    required("Sex", &form.sex)?;
    required("Mobile phone", &form.mobile_phone)?;
    phone(&form.mobile_phone)?;
    required("University name", &form.university_name)?;
    required("University registration ID", &form.university_registration_id)?;
    required("Program name", &form.program_name)?;
    required("Enrolled year", &form.enrolled_year)?;
    if form.batch_number == 0 {
        return Err(ValidationError::BatchNumber);
    }
    Ok(())
}

/// Results uploads must be non-empty PDFs no larger than 5 MB.
pub fn result_file(file_name: &str, mime_type: &str, size: u64) -> Result<(), ValidationError> {
    let is_pdf = mime_type.contains("pdf") && file_name.to_ascii_lowercase().ends_with(".pdf");
    if !is_pdf {
        return Err(ValidationError::NotPdf);
    }
    if size == 0 {
        return Err(ValidationError::EmptyFile);
    }
    if size > MAX_RESULT_BYTES {
        return Err(ValidationError::FileTooLarge);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_number() {
        assert!(control_number("123456789012").is_ok());
        assert_eq!(control_number(" 123456789012 "), Err(ValidationError::ControlNumber));
        assert_eq!(control_number("12345678901"), Err(ValidationError::ControlNumber));
        assert_eq!(control_number("1234567890123"), Err(ValidationError::ControlNumber));
        assert_eq!(control_number("12345678901x"), Err(ValidationError::ControlNumber));
        assert_eq!(control_number(""), Err(ValidationError::ControlNumber));
    }

    #[test]
    fn test_non_ascii_digits_rejected() {
        // Arabic-Indic and fullwidth digits are Unicode \d but not accepted
        assert_eq!(
            control_number("\u{661}\u{662}\u{663}\u{664}\u{665}\u{666}\u{667}\u{668}\u{669}\u{660}\u{661}\u{662}"),
            Err(ValidationError::ControlNumber)
        );
        assert_eq!(
            verification_code("\u{ff11}\u{ff12}\u{ff13}\u{ff14}\u{ff15}\u{ff16}"),
            Err(ValidationError::VerificationCode)
        );
        assert_eq!(
            verification_code("\u{661}\u{662}\u{663}\u{664}\u{665}\u{666}"),
            Err(ValidationError::VerificationCode)
        );
    }

    #[test]
    fn test_password_rules_in_order() {
        assert_eq!(password(""), Err(ValidationError::PasswordRequired));
        assert_eq!(password("Ab1!"), Err(ValidationError::PasswordTooShort));
        assert_eq!(password("abcdefg1!"), Err(ValidationError::PasswordUppercase));
        assert_eq!(password("ABCDEFG1!"), Err(ValidationError::PasswordLowercase));
        assert_eq!(password("Abcdefgh!"), Err(ValidationError::PasswordDigit));
        assert_eq!(password("Abcdefgh1"), Err(ValidationError::PasswordSpecial));
        assert!(password("Abcdefg1!").is_ok());
        assert_eq!(
            password_pair("Abcdefg1!", "Abcdefg1?"),
            Err(ValidationError::PasswordMismatch)
        );
    }

    #[test]
    fn test_phone_numbers() {
        assert!(phone("0712345678").is_ok());
        assert!(phone("0612345678").is_ok());
        assert!(phone("+255712345678").is_ok());
        assert!(phone("0812345678").is_err());
        assert!(phone("071234567").is_err());
        assert!(phone("+25571234567").is_err());
    }

    #[test]
    fn test_email_and_code() {
        assert!(email("asha@example.com").is_ok());
        assert!(email("asha@example").is_err());
        assert!(email("asha example.com").is_err());
        assert!(verification_code("042137").is_ok());
        assert!(verification_code("42137").is_err());
    }

    #[test]
    fn test_result_file() {
        assert!(result_file("sem1.pdf", "application/pdf", 1024).is_ok());
        assert_eq!(
            result_file("sem1.docx", "application/msword", 1024),
            Err(ValidationError::NotPdf)
        );
        assert_eq!(
            result_file("sem1.pdf", "application/pdf", MAX_RESULT_BYTES + 1),
            Err(ValidationError::FileTooLarge)
        );
        assert!(result_file("sem1.pdf", "application/pdf", MAX_RESULT_BYTES).is_ok());
    }

    #[test]
    fn test_completion_form_reports_first_gap() {
        let mut form = CompleteProfileRequest {
            email: "asha@example.com".into(),
            name: "Asha".into(),
            sex: "Female".into(),
            mobile_phone: "0712345678".into(),
            university_name: "UDSM".into(),
            university_registration_id: "2022-04-0001".into(),
            program_name: "BSc Computer Engineering".into(),
            enrolled_year: "2022".into(),
            batch_number: 3,
        };
        assert!(completion_form(&form).is_ok());

        form.program_name.clear();
        assert_eq!(
            completion_form(&form),
            Err(ValidationError::Required("Program name"))
        );

        form.program_name = "BSc".into();
        form.mobile_phone = "12345".into();
        assert_eq!(completion_form(&form), Err(ValidationError::Phone));
    }
}
