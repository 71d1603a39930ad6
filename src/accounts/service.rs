use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::accounts::dto::{
    CreateAccountRequest, PublicAccount, UpdateAccountRequest, UpdatePasswordRequest,
};
use crate::accounts::repo::AccountRepository;
use crate::accounts::repo_types::{AccountUpdate, NewAccount};
use crate::auth::password::hash_password;
use crate::error::AppError;
use crate::validation::{is_valid_cpf, is_valid_email, is_valid_password, normalize_cpf};

const NAME_MAX_LEN: usize = 255;

/// Orchestrates validation and persistence for account operations, and
/// decides when the token-version counter must be bumped.
#[derive(Clone)]
pub struct AccountService {
    repo: Arc<dyn AccountRepository>,
}

impl AccountService {
    pub fn new(repo: Arc<dyn AccountRepository>) -> Self {
        Self { repo }
    }

    /// Shared email + CPF shape check used by create and update.
    pub fn email_and_cpf_valid(email: &str, cpf: &str) -> Result<(), AppError> {
        if !is_valid_email(email) {
            return Err(AppError::domain_rule("Email inválido"));
        }
        if !is_valid_cpf(cpf) {
            return Err(AppError::domain_rule("CPF inválido"));
        }
        Ok(())
    }

    fn names_valid(first_name: &str, last_name: &str) -> Result<(), AppError> {
        if first_name.trim().is_empty() || last_name.trim().is_empty() {
            return Err(AppError::validation("Existem campos faltando"));
        }
        if first_name.len() > NAME_MAX_LEN || last_name.len() > NAME_MAX_LEN {
            return Err(AppError::validation("Campos excedem o tamanho máximo"));
        }
        Ok(())
    }

    pub async fn create_user(&self, data: CreateAccountRequest) -> Result<PublicAccount, AppError> {
        Self::names_valid(&data.first_name, &data.last_name)?;
        Self::email_and_cpf_valid(&data.email, &data.cpf)?;
        if !is_valid_password(&data.password) {
            return Err(AppError::domain_rule("Senha em formato inválido"));
        }

        let password_hash = hash_password(&data.password)?;
        let account = self
            .repo
            .create(NewAccount {
                first_name: data.first_name,
                last_name: data.last_name,
                email: data.email.trim().to_lowercase(),
                password_hash,
                cpf: normalize_cpf(&data.cpf),
                birth_date: data.birth_date,
                role: data.role,
            })
            .await?;

        info!(account_id = %account.id, "account created");
        Ok(account.into())
    }

    /// Updates profile fields. A role change invalidates every previously
    /// issued token: the repository increments `token_version` atomically
    /// with the update, forcing re-authentication at the new privilege
    /// level.
    pub async fn update_user(&self, data: UpdateAccountRequest) -> Result<PublicAccount, AppError> {
        Self::names_valid(&data.first_name, &data.last_name)?;
        Self::email_and_cpf_valid(&data.email, &data.cpf)?;

        let current = self
            .repo
            .find_by_id(data.id)
            .await?
            .ok_or_else(|| AppError::not_found("Conta não encontrada"))?;

        let role_changed = current.role != data.role;
        let account = self
            .repo
            .update(
                AccountUpdate {
                    id: data.id,
                    first_name: data.first_name,
                    last_name: data.last_name,
                    email: data.email.trim().to_lowercase(),
                    cpf: normalize_cpf(&data.cpf),
                    birth_date: data.birth_date,
                    role: data.role,
                },
                role_changed,
            )
            .await?;

        if role_changed {
            info!(
                account_id = %account.id,
                token_version = account.token_version,
                "role changed, sessions invalidated"
            );
        }
        Ok(account.into())
    }

    /// Rehashes and stores a new password. Does not bump `token_version`:
    /// previously issued tokens stay valid across a password change (see
    /// the open-question notes in DESIGN.md).
    pub async fn update_password(
        &self,
        data: UpdatePasswordRequest,
    ) -> Result<PublicAccount, AppError> {
        self.repo
            .find_by_id(data.id)
            .await?
            .ok_or_else(|| AppError::not_found("Conta não encontrada"))?;

        if !is_valid_password(&data.password) {
            return Err(AppError::domain_rule("Senha em formato inválido"));
        }

        let password_hash = hash_password(&data.password)?;
        let account = self.repo.update_password(data.id, &password_hash).await?;
        info!(account_id = %account.id, "password updated");
        Ok(account.into())
    }

    pub async fn delete_user(&self, id: Uuid) -> Result<bool, AppError> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("Conta não encontrada"))?;

        let deleted = self.repo.delete(id).await?;
        info!(account_id = %id, "account deleted");
        Ok(deleted)
    }

    pub async fn get_user_by_id(&self, id: Uuid) -> Result<Option<PublicAccount>, AppError> {
        Ok(self.repo.find_by_id(id).await?.map(Into::into))
    }

    pub async fn get_user_by_email(
        &self,
        email: &str,
    ) -> Result<Option<PublicAccount>, AppError> {
        if !is_valid_email(email) {
            return Err(AppError::domain_rule("Email inválido"));
        }
        Ok(self.repo.find_by_email(email).await?.map(Into::into))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::repo::memory::MemoryAccountRepository;
    use crate::accounts::repo_types::Role;
    use crate::auth::password::verify_password;
    use crate::error::ErrorKind;
    use time::macros::date;

    fn create_request(email: &str, cpf: &str, password: &str) -> CreateAccountRequest {
        CreateAccountRequest {
            first_name: "Luiz Guilherme".into(),
            last_name: "Rodrigues Lins".into(),
            email: email.into(),
            password: password.into(),
            cpf: cpf.into(),
            birth_date: date!(1998 - 07 - 21),
            role: Role::Visitor,
        }
    }

    fn service_with_repo() -> (AccountService, Arc<MemoryAccountRepository>) {
        let repo = Arc::new(MemoryAccountRepository::new());
        (AccountService::new(repo.clone()), repo)
    }

    #[tokio::test]
    async fn create_rejects_invalid_email() {
        let (service, _repo) = service_with_repo();
        let err = service
            .create_user(create_request("not-an-email", "918.390.300-38", "Teste123@"))
            .await
            .unwrap_err();
        assert_eq!(err.message, "Email inválido");
        assert_eq!(err.status().as_u16(), 400);
    }

    #[tokio::test]
    async fn create_rejects_invalid_cpf() {
        let (service, _repo) = service_with_repo();
        let err = service
            .create_user(create_request("luiz@test.com", "918.390.300-39", "Teste123@"))
            .await
            .unwrap_err();
        assert_eq!(err.message, "CPF inválido");
    }

    #[tokio::test]
    async fn create_rejects_weak_passwords_regardless_of_other_fields() {
        let (service, _repo) = service_with_repo();
        for weak in ["nouppercase1@", "NoDigits!!", "NoSymbol12", "Sh0rt!@"] {
            let err = service
                .create_user(create_request("luiz@test.com", "918.390.300-38", weak))
                .await
                .unwrap_err();
            assert_eq!(err.message, "Senha em formato inválido");
            assert_eq!(err.status().as_u16(), 400);
        }
    }

    #[tokio::test]
    async fn create_rejects_empty_names() {
        let (service, _repo) = service_with_repo();
        let mut request = create_request("luiz@test.com", "918.390.300-38", "Teste123@");
        request.first_name = "  ".into();
        let err = service.create_user(request).await.unwrap_err();
        assert_eq!(err.message, "Existem campos faltando");
    }

    #[tokio::test]
    async fn duplicate_email_conflicts_and_store_is_unchanged() {
        let (service, repo) = service_with_repo();
        service
            .create_user(create_request("luiz@test.com", "918.390.300-38", "Teste123@"))
            .await
            .unwrap();

        let err = service
            .create_user(create_request("luiz@test.com", "529.982.247-25", "Teste123@"))
            .await
            .unwrap_err();
        assert_eq!(err.message, "Existem campos duplicados");
        assert_eq!(err.status().as_u16(), 409);
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn create_then_get_round_trips_with_normalized_cpf() {
        let (service, _repo) = service_with_repo();
        let created = service
            .create_user(create_request("Luiz@Test.com ", "918.390.300-38", "Teste123@"))
            .await
            .unwrap();

        let fetched = service.get_user_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.email, "luiz@test.com");
        assert_eq!(fetched.cpf, "91839030038");
        assert_eq!(fetched.role, Role::Visitor);
        assert_eq!(fetched.token_version, 1);
    }

    #[tokio::test]
    async fn stored_password_is_hashed_not_plaintext() {
        let (service, repo) = service_with_repo();
        let created = service
            .create_user(create_request("luiz@test.com", "918.390.300-38", "Teste123@"))
            .await
            .unwrap();

        let row = repo.find_by_id(created.id).await.unwrap().unwrap();
        assert_ne!(row.password_hash, "Teste123@");
        assert!(verify_password("Teste123@", &row.password_hash).unwrap());
    }

    #[tokio::test]
    async fn role_change_bumps_token_version_by_one() {
        let (service, _repo) = service_with_repo();
        let created = service
            .create_user(create_request("luiz@test.com", "918.390.300-38", "Teste123@"))
            .await
            .unwrap();
        assert_eq!(created.token_version, 1);

        let updated = service
            .update_user(UpdateAccountRequest {
                id: created.id,
                first_name: created.first_name.clone(),
                last_name: created.last_name.clone(),
                email: created.email.clone(),
                cpf: created.cpf.clone(),
                birth_date: created.birth_date,
                role: Role::Admin,
            })
            .await
            .unwrap();
        assert_eq!(updated.token_version, 2);
    }

    #[tokio::test]
    async fn same_role_update_leaves_token_version_alone() {
        let (service, _repo) = service_with_repo();
        let created = service
            .create_user(create_request("luiz@test.com", "918.390.300-38", "Teste123@"))
            .await
            .unwrap();

        let updated = service
            .update_user(UpdateAccountRequest {
                id: created.id,
                first_name: "Renamed".into(),
                last_name: created.last_name.clone(),
                email: created.email.clone(),
                cpf: created.cpf.clone(),
                birth_date: created.birth_date,
                role: Role::Visitor,
            })
            .await
            .unwrap();
        assert_eq!(updated.token_version, 1);
        assert_eq!(updated.first_name, "Renamed");
    }

    #[tokio::test]
    async fn update_of_missing_account_is_not_found() {
        let (service, _repo) = service_with_repo();
        let err = service
            .update_user(UpdateAccountRequest {
                id: Uuid::new_v4(),
                first_name: "A".into(),
                last_name: "B".into(),
                email: "a@test.com".into(),
                cpf: "918.390.300-38".into(),
                birth_date: date!(1990 - 01 - 01),
                role: Role::Visitor,
            })
            .await
            .unwrap_err();
        assert_eq!(err.message, "Conta não encontrada");
        assert_eq!(err.status().as_u16(), 400);
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn update_password_rehashes_without_bumping_token_version() {
        let (service, repo) = service_with_repo();
        let created = service
            .create_user(create_request("luiz@test.com", "918.390.300-38", "Teste123@"))
            .await
            .unwrap();

        let updated = service
            .update_password(UpdatePasswordRequest {
                id: created.id,
                password: "NovaSenha1!".into(),
            })
            .await
            .unwrap();
        assert_eq!(updated.token_version, 1);

        let row = repo.find_by_id(created.id).await.unwrap().unwrap();
        assert!(verify_password("NovaSenha1!", &row.password_hash).unwrap());
        assert!(!verify_password("Teste123@", &row.password_hash).unwrap());
    }

    #[tokio::test]
    async fn update_password_enforces_the_policy() {
        let (service, _repo) = service_with_repo();
        let created = service
            .create_user(create_request("luiz@test.com", "918.390.300-38", "Teste123@"))
            .await
            .unwrap();

        let err = service
            .update_password(UpdatePasswordRequest {
                id: created.id,
                password: "weak".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.message, "Senha em formato inválido");
    }

    #[tokio::test]
    async fn delete_missing_account_fails_and_leaves_store_alone() {
        let (service, repo) = service_with_repo();
        service
            .create_user(create_request("luiz@test.com", "918.390.300-38", "Teste123@"))
            .await
            .unwrap();

        let err = service.delete_user(Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.message, "Conta não encontrada");
        assert_eq!(err.status().as_u16(), 400);
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn delete_removes_the_account() {
        let (service, repo) = service_with_repo();
        let created = service
            .create_user(create_request("luiz@test.com", "918.390.300-38", "Teste123@"))
            .await
            .unwrap();

        assert!(service.delete_user(created.id).await.unwrap());
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn get_by_email_rejects_malformed_argument() {
        let (service, _repo) = service_with_repo();
        let err = service.get_user_by_email("not-an-email").await.unwrap_err();
        assert_eq!(err.message, "Email inválido");
    }
}
