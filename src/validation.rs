use lazy_static::lazy_static;
use regex::Regex;
use uuid::Uuid;

use crate::error::AppError;

lazy_static! {
    static ref EMAIL_LOCAL_RE: Regex =
        Regex::new(r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+$").unwrap();
    static ref DOMAIN_LABEL_RE: Regex = Regex::new(r"^[a-zA-Z0-9-]+$").unwrap();
    static ref UUID_RE: Regex = Regex::new(
        r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[1-5][0-9a-fA-F]{3}-[89abAB][0-9a-fA-F]{3}-[0-9a-fA-F]{12}$"
    )
    .unwrap();
}

/// RFC-lite email check: exactly one `@`, permissive local part, and a
/// domain with at least two labels, none of them empty or hyphen-edged.
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();

    let mut parts = email.split('@');
    let (local, domain) = match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => (local, domain),
        _ => return false,
    };

    if local.is_empty() || !EMAIL_LOCAL_RE.is_match(local) {
        return false;
    }

    if domain.is_empty() || !domain.contains('.') {
        return false;
    }
    let edges = (domain.chars().next(), domain.chars().last());
    if matches!(edges.0, Some('-') | Some('.')) || matches!(edges.1, Some('-') | Some('.')) {
        return false;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return false;
    }
    labels.iter().all(|label| {
        !label.is_empty()
            && DOMAIN_LABEL_RE.is_match(label)
            && !label.starts_with('-')
            && !label.ends_with('-')
    })
}

/// Strips formatting from a CPF, keeping digits only.
pub fn normalize_cpf(cpf: &str) -> String {
    cpf.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn cpf_check_digit(digits: &[u32], first_weight: u32) -> u32 {
    let sum: u32 = digits
        .iter()
        .enumerate()
        .map(|(i, d)| d * (first_weight - i as u32))
        .sum();
    let rest = sum % 11;
    if rest < 2 {
        0
    } else {
        11 - rest
    }
}

/// Brazilian CPF check: 11 digits, not a repeated-digit sequence, and both
/// mod-11 verifier digits must match.
pub fn is_valid_cpf(cpf: &str) -> bool {
    let normalized = normalize_cpf(cpf);
    if normalized.len() != 11 {
        return false;
    }

    let digits: Vec<u32> = normalized
        .chars()
        .filter_map(|c| c.to_digit(10))
        .collect();

    // Sequences like 111.111.111-11 pass the checksum but are not real CPFs.
    if digits.iter().all(|&d| d == digits[0]) {
        return false;
    }

    cpf_check_digit(&digits[..9], 10) == digits[9]
        && cpf_check_digit(&digits[..10], 11) == digits[10]
}

const PASSWORD_SYMBOLS: &str = "!@#$%^&*()_+-=[]{};':\"\\|,.<>/?";

/// Password policy: at least 8 chars, one uppercase letter, one digit and one
/// symbol from the fixed punctuation set.
pub fn is_valid_password(password: &str) -> bool {
    password.len() >= 8
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| PASSWORD_SYMBOLS.contains(c))
}

/// Parses a canonical UUID (version 1-5, RFC variant), rejecting anything
/// else with a 400.
pub fn validate_uuid(id: &str) -> Result<Uuid, AppError> {
    if !UUID_RE.is_match(id) {
        return Err(AppError::validation("ID inválido, deve ser um UUID válido"));
    }
    Uuid::parse_str(id)
        .map_err(|_| AppError::validation("ID inválido, deve ser um UUID válido"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn accepts_plain_emails() {
        assert!(is_valid_email("a@test.com"));
        assert!(is_valid_email("luiz.guilherme+tag@sub.example.org"));
        assert!(is_valid_email("  padded@example.com  "));
    }

    #[test]
    fn rejects_malformed_emails() {
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("no-at-sign.com"));
        assert!(!is_valid_email("two@@signs.com"));
        assert!(!is_valid_email("@nodomain.com"));
        assert!(!is_valid_email("nolocal@"));
        assert!(!is_valid_email("user@nodot"));
        assert!(!is_valid_email("user@.leading.dot"));
        assert!(!is_valid_email("user@trailing.dot."));
        assert!(!is_valid_email("user@-hyphen.com"));
        assert!(!is_valid_email("user@domain.-label"));
        assert!(!is_valid_email("user@domain..double"));
        assert!(!is_valid_email("us er@domain.com"));
    }

    #[test]
    fn accepts_valid_cpfs_with_or_without_formatting() {
        assert!(is_valid_cpf("918.390.300-38"));
        assert!(is_valid_cpf("91839030038"));
        assert!(is_valid_cpf("529.982.247-25"));
    }

    #[test]
    fn rejects_cpf_with_mutated_check_digit() {
        assert!(!is_valid_cpf("918.390.300-39"));
        assert!(!is_valid_cpf("918.390.300-48"));
    }

    #[test]
    fn rejects_repeated_digit_cpfs() {
        assert!(!is_valid_cpf("111.111.111-11"));
        assert!(!is_valid_cpf("00000000000"));
    }

    #[test]
    fn rejects_wrong_length_cpfs() {
        assert!(!is_valid_cpf("9183903003"));
        assert!(!is_valid_cpf("918390300381"));
        assert!(!is_valid_cpf(""));
    }

    #[test]
    fn normalize_strips_punctuation() {
        assert_eq!(normalize_cpf("918.390.300-38"), "91839030038");
    }

    #[test]
    fn password_policy() {
        assert!(is_valid_password("Admin@12341"));
        assert!(is_valid_password("Teste123@"));
        assert!(!is_valid_password("short1@"));
        assert!(!is_valid_password("alllower1@"));
        assert!(!is_valid_password("NoDigits@@"));
        assert!(!is_valid_password("NoSymbol123"));
    }

    #[test]
    fn uuid_shape_is_enforced() {
        let id = Uuid::new_v4();
        assert_eq!(validate_uuid(&id.to_string()).unwrap(), id);

        let err = validate_uuid("not-a-uuid").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);

        // Nil UUID has version 0, outside the accepted 1-5 range.
        assert!(validate_uuid("00000000-0000-0000-0000-000000000000").is_err());
    }
}
