use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::accounts::repo_types::{Account, Role};

time::serde::format_description!(birth_date_format, Date, "[year]-[month]-[day]");

/// Request body for account creation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub cpf: String,
    #[serde(with = "birth_date_format")]
    pub birth_date: Date,
    pub role: Role,
}

/// Request body for a profile update. Password changes go through
/// `UpdatePasswordRequest`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAccountRequest {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub cpf: String,
    #[serde(with = "birth_date_format")]
    pub birth_date: Date,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePasswordRequest {
    pub id: Uuid,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteAccountRequest {
    pub id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Response returned after a successful login.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: LoginUser,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub token_version: i32,
}

/// Public projection of an account. The password hash never appears here.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicAccount {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub cpf: String,
    #[serde(with = "birth_date_format")]
    pub birth_date: Date,
    pub role: Role,
    pub token_version: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<Account> for PublicAccount {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            first_name: account.first_name,
            last_name: account.last_name,
            email: account.email,
            cpf: account.cpf,
            birth_date: account.birth_date,
            role: account.role,
            token_version: account.token_version,
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn public_account_never_serializes_a_password() {
        let account = Account {
            id: Uuid::new_v4(),
            first_name: "Luiz".into(),
            last_name: "Lins".into(),
            email: "luiz@test.com".into(),
            password_hash: "$argon2id$v=19$secret".into(),
            cpf: "91839030038".into(),
            birth_date: time::macros::date!(1990 - 04 - 12),
            role: Role::Visitor,
            token_version: 1,
            created_at: datetime!(2024-01-01 00:00 UTC),
            updated_at: datetime!(2024-01-01 00:00 UTC),
        };

        let json = serde_json::to_string(&PublicAccount::from(account.clone())).unwrap();
        assert!(!json.contains("argon2"));
        assert!(!json.contains("password"));
        assert!(json.contains("\"birthDate\":\"1990-04-12\""));
        assert!(json.contains("\"role\":\"VISITOR\""));

        // The raw row skips the hash too.
        let row_json = serde_json::to_string(&account).unwrap();
        assert!(!row_json.contains("argon2"));
    }
}
