use async_trait::async_trait;
use sqlx::PgPool;
use tracing::error;
use uuid::Uuid;

use crate::accounts::repo_types::{Account, AccountUpdate, NewAccount};
use crate::error::AppError;

/// Persistence contract for accounts. Owns the uniqueness constraints
/// (email, CPF) and the token-version counter; implementations must apply
/// the version bump atomically with the row update.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn create(&self, data: NewAccount) -> Result<Account, AppError>;

    /// Updates profile fields. When `bump_token_version` is set the stored
    /// counter is incremented in the same statement, so concurrent updates
    /// cannot lose an increment.
    async fn update(
        &self,
        data: AccountUpdate,
        bump_token_version: bool,
    ) -> Result<Account, AppError>;

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<Account, AppError>;

    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, AppError>;

    /// Public-projection lookup. Callers expose the result through
    /// `PublicAccount`, never the raw row.
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, AppError>;

    /// Privileged lookup for authentication: the returned row's hash and
    /// token_version are consumed by the login path only.
    async fn find_login_user(&self, email: &str) -> Result<Option<Account>, AppError>;
}

const ACCOUNT_COLUMNS: &str = "id, first_name, last_name, email, password_hash, cpf, \
     birth_date, role, token_version, created_at, updated_at";

pub struct PgAccountRepository {
    db: PgPool,
}

impl PgAccountRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn pg_error_code(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db) => db.code().map(|c| c.to_string()),
        _ => None,
    }
}

fn map_create_error(err: sqlx::Error) -> AppError {
    match pg_error_code(&err).as_deref() {
        // unique_violation: email or cpf already taken
        Some("23505") => AppError::conflict("Existem campos duplicados"),
        // not_null_violation: required field absent
        Some("23502") => AppError::validation("Existem campos faltando"),
        _ => {
            error!(error = %err, "account insert failed");
            AppError::internal("Erro ao criar usuário")
        }
    }
}

fn map_update_error(err: sqlx::Error) -> AppError {
    match pg_error_code(&err).as_deref() {
        Some("23505") => AppError::conflict("Existem campos duplicados"),
        _ => {
            error!(error = %err, "account update failed");
            AppError::internal("Erro ao atualizar o usuário")
        }
    }
}

#[async_trait]
impl AccountRepository for PgAccountRepository {
    async fn create(&self, data: NewAccount) -> Result<Account, AppError> {
        let account = sqlx::query_as::<_, Account>(&format!(
            r#"
            INSERT INTO accounts (first_name, last_name, email, password_hash, cpf, birth_date, role)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(&data.first_name)
        .bind(&data.last_name)
        .bind(&data.email)
        .bind(&data.password_hash)
        .bind(&data.cpf)
        .bind(data.birth_date)
        .bind(data.role)
        .fetch_one(&self.db)
        .await
        .map_err(map_create_error)?;
        Ok(account)
    }

    async fn update(
        &self,
        data: AccountUpdate,
        bump_token_version: bool,
    ) -> Result<Account, AppError> {
        // The CASE keeps the increment inside the UPDATE so the store
        // serializes racing bumps on the same row.
        let account = sqlx::query_as::<_, Account>(&format!(
            r#"
            UPDATE accounts
            SET first_name = $2,
                last_name = $3,
                email = $4,
                cpf = $5,
                birth_date = $6,
                role = $7,
                token_version = token_version + CASE WHEN $8 THEN 1 ELSE 0 END,
                updated_at = now()
            WHERE id = $1
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(data.id)
        .bind(&data.first_name)
        .bind(&data.last_name)
        .bind(&data.email)
        .bind(&data.cpf)
        .bind(data.birth_date)
        .bind(data.role)
        .bind(bump_token_version)
        .fetch_optional(&self.db)
        .await
        .map_err(map_update_error)?;

        account.ok_or_else(|| AppError::not_found("Conta não encontrada"))
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<Account, AppError> {
        let account = sqlx::query_as::<_, Account>(&format!(
            r#"
            UPDATE accounts
            SET password_hash = $2, updated_at = now()
            WHERE id = $1
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(password_hash)
        .fetch_optional(&self.db)
        .await
        .map_err(map_update_error)?;

        account.ok_or_else(|| AppError::not_found("Conta não encontrada"))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(|err| {
                error!(error = %err, %id, "account delete failed");
                AppError::internal(format!("Erro ao remover o usuário: {id}"))
            })?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, AppError> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .map_err(|err| {
            error!(error = %err, %id, "account lookup failed");
            AppError::internal("Erro ao buscar o usuário")
        })?;
        Ok(account)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, AppError> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .map_err(|err| {
            error!(error = %err, "account lookup failed");
            AppError::internal("Erro ao buscar o usuário")
        })?;
        Ok(account)
    }

    async fn find_login_user(&self, email: &str) -> Result<Option<Account>, AppError> {
        self.find_by_email(email).await
    }
}

pub mod memory {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use time::OffsetDateTime;
    use uuid::Uuid;

    use super::AccountRepository;
    use crate::accounts::repo_types::{Account, AccountUpdate, NewAccount};
    use crate::error::AppError;

    /// In-memory implementation backing `AppState::fake()` and the service
    /// tests. The mutex plays the role of the store's row lock: the
    /// token-version increment happens under it, so increments are never
    /// lost.
    #[derive(Default)]
    pub struct MemoryAccountRepository {
        accounts: Mutex<HashMap<Uuid, Account>>,
    }

    impl MemoryAccountRepository {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn len(&self) -> usize {
            self.accounts.lock().unwrap().len()
        }

        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }
    }

    #[async_trait]
    impl AccountRepository for MemoryAccountRepository {
        async fn create(&self, data: NewAccount) -> Result<Account, AppError> {
            let mut accounts = self.accounts.lock().unwrap();

            if data.first_name.is_empty() || data.last_name.is_empty() {
                return Err(AppError::validation("Existem campos faltando"));
            }
            let duplicated = accounts
                .values()
                .any(|a| a.email == data.email || a.cpf == data.cpf);
            if duplicated {
                return Err(AppError::conflict("Existem campos duplicados"));
            }

            let now = OffsetDateTime::now_utc();
            let account = Account {
                id: Uuid::new_v4(),
                first_name: data.first_name,
                last_name: data.last_name,
                email: data.email,
                password_hash: data.password_hash,
                cpf: data.cpf,
                birth_date: data.birth_date,
                role: data.role,
                token_version: 1,
                created_at: now,
                updated_at: now,
            };
            accounts.insert(account.id, account.clone());
            Ok(account)
        }

        async fn update(
            &self,
            data: AccountUpdate,
            bump_token_version: bool,
        ) -> Result<Account, AppError> {
            let mut accounts = self.accounts.lock().unwrap();

            let duplicated = accounts.values().any(|a| {
                a.id != data.id && (a.email == data.email || a.cpf == data.cpf)
            });
            if duplicated {
                return Err(AppError::conflict("Existem campos duplicados"));
            }

            let account = accounts
                .get_mut(&data.id)
                .ok_or_else(|| AppError::not_found("Conta não encontrada"))?;
            account.first_name = data.first_name;
            account.last_name = data.last_name;
            account.email = data.email;
            account.cpf = data.cpf;
            account.birth_date = data.birth_date;
            account.role = data.role;
            if bump_token_version {
                account.token_version += 1;
            }
            account.updated_at = OffsetDateTime::now_utc();
            Ok(account.clone())
        }

        async fn update_password(
            &self,
            id: Uuid,
            password_hash: &str,
        ) -> Result<Account, AppError> {
            let mut accounts = self.accounts.lock().unwrap();
            let account = accounts
                .get_mut(&id)
                .ok_or_else(|| AppError::not_found("Conta não encontrada"))?;
            account.password_hash = password_hash.to_string();
            account.updated_at = OffsetDateTime::now_utc();
            Ok(account.clone())
        }

        async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
            Ok(self.accounts.lock().unwrap().remove(&id).is_some())
        }

        async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, AppError> {
            Ok(self.accounts.lock().unwrap().get(&id).cloned())
        }

        async fn find_by_email(&self, email: &str) -> Result<Option<Account>, AppError> {
            Ok(self
                .accounts
                .lock()
                .unwrap()
                .values()
                .find(|a| a.email == email)
                .cloned())
        }

        async fn find_login_user(&self, email: &str) -> Result<Option<Account>, AppError> {
            self.find_by_email(email).await
        }
    }
}
