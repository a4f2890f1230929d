use anyhow::{anyhow, Result};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use pasetors::claims::{Claims, ClaimsValidationRules};
use pasetors::keys::SymmetricKey;
use pasetors::token::UntrustedToken;
use pasetors::{local, Local, version4::V4};
use sha2::{Digest, Sha256};
use sqlx::Row;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::app::users::{user_from_row, USER_COLUMNS};
use crate::app::validation::Registration;
use crate::domain::user::User;
use crate::infra::db::Db;

const TOKEN_ISSUER: &str = "findit";

#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: OffsetDateTime,
    pub refresh_expires_at: OffsetDateTime,
}

#[derive(Clone)]
pub struct AuthService {
    db: Db,
    access_key: [u8; 32],
    refresh_key: [u8; 32],
    access_ttl_minutes: u64,
    refresh_ttl_days: u64,
}

impl AuthService {
    pub fn new(
        db: Db,
        access_key: [u8; 32],
        refresh_key: [u8; 32],
        access_ttl_minutes: u64,
        refresh_ttl_days: u64,
    ) -> Self {
        Self {
            db,
            access_key,
            refresh_key,
            access_ttl_minutes,
            refresh_ttl_days,
        }
    }

    pub async fn register(&self, registration: Registration) -> Result<User> {
        let password_hash = hash_password(&registration.password)?;
        let sql = format!(
            "INSERT INTO users (username, email, first_name, last_name, phone_number, gender, password_hash) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {}",
            USER_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(registration.username)
            .bind(registration.email)
            .bind(registration.first_name)
            .bind(registration.last_name)
            .bind(registration.phone_number)
            .bind(registration.gender.as_db())
            .bind(password_hash)
            .fetch_one(self.db.pool())
            .await?;

        Ok(user_from_row(&row))
    }

    /// `identifier` is a username or an email address.
    pub async fn login(&self, identifier: &str, password: &str) -> Result<Option<TokenPair>> {
        let row = sqlx::query(
            "SELECT id, password_hash \
             FROM users WHERE username = $1 OR email = lower($1)",
        )
        .bind(identifier.trim())
        .fetch_optional(self.db.pool())
        .await?;

        let row = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        let user_id: Uuid = row.get("id");
        let password_hash: String = row.get("password_hash");
        if password_hash.is_empty() {
            return Ok(None);
        }

        if !verify_password(password, &password_hash)? {
            return Ok(None);
        }

        let tokens = self.issue_token_pair(user_id).await?;
        Ok(Some(tokens))
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<Option<TokenPair>> {
        let (user_id, refresh_id) = match self.verify_refresh_token(refresh_token) {
            Ok((user_id, refresh_id)) => (user_id, refresh_id),
            Err(_) => return Ok(None),
        };
        let token_hash = hash_token(refresh_token);

        let mut tx = self.db.pool().begin().await?;
        let row = sqlx::query(
            "SELECT id \
             FROM refresh_tokens \
             WHERE id = $1 \
               AND user_id = $2 \
               AND token_hash = $3 \
               AND revoked_at IS NULL \
               AND expires_at > now()",
        )
        .bind(refresh_id)
        .bind(user_id)
        .bind(&token_hash)
        .fetch_optional(&mut *tx)
        .await?;

        if row.is_none() {
            tx.rollback().await?;
            return Ok(None);
        }

        let tokens = self.issue_token_pair_with_tx(user_id, &mut tx).await?;
        sqlx::query(
            "UPDATE refresh_tokens \
             SET revoked_at = now(), replaced_by = $1 \
             WHERE id = $2 AND revoked_at IS NULL",
        )
        .bind(tokens.refresh_id)
        .bind(refresh_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(tokens.pair))
    }

    pub async fn revoke_refresh_token(&self, refresh_token: &str) -> Result<bool> {
        let (user_id, refresh_id) = match self.verify_refresh_token(refresh_token) {
            Ok((user_id, refresh_id)) => (user_id, refresh_id),
            Err(_) => return Ok(false),
        };
        let token_hash = hash_token(refresh_token);

        let result = sqlx::query(
            "UPDATE refresh_tokens \
             SET revoked_at = now() \
             WHERE id = $1 AND user_id = $2 AND token_hash = $3 AND revoked_at IS NULL",
        )
        .bind(refresh_id)
        .bind(user_id)
        .bind(token_hash)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub fn authenticate_access_token(&self, token: &str) -> Result<Option<AuthSession>> {
        let Some(claims) = decrypt_claims(token, &self.access_key)? else {
            return Ok(None);
        };
        if !has_token_type(&claims, TokenType::Access) {
            return Ok(None);
        }
        let user_id = claim_uuid(&claims, "sub")?;
        Ok(Some(AuthSession { user_id }))
    }

    pub async fn issue_token_pair(&self, user_id: Uuid) -> Result<TokenPair> {
        let mut tx = self.db.pool().begin().await?;
        let tokens = self.issue_token_pair_with_tx(user_id, &mut tx).await?;
        tx.commit().await?;
        Ok(tokens.pair)
    }

    async fn issue_token_pair_with_tx(
        &self,
        user_id: Uuid,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ) -> Result<IssuedTokens> {
        let access_ttl = Duration::minutes(self.access_ttl_minutes as i64);
        let access_claims = build_claims(user_id, TokenType::Access, access_ttl, None)?;
        let access_token = encrypt_claims(&access_claims, &self.access_key)?;

        let refresh_id = Uuid::new_v4();
        let refresh_ttl = Duration::days(self.refresh_ttl_days as i64);
        let refresh_claims = build_claims(user_id, TokenType::Refresh, refresh_ttl, Some(refresh_id))?;
        let refresh_token = encrypt_claims(&refresh_claims, &self.refresh_key)?;

        let now = OffsetDateTime::now_utc();
        let refresh_expires_at = now + refresh_ttl;

        sqlx::query(
            "INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(refresh_id)
        .bind(user_id)
        .bind(hash_token(&refresh_token))
        .bind(refresh_expires_at)
        .execute(&mut **tx)
        .await?;

        Ok(IssuedTokens {
            refresh_id,
            pair: TokenPair {
                access_token,
                refresh_token,
                access_expires_at: now + access_ttl,
                refresh_expires_at,
            },
        })
    }

    /// Returns `(user_id, refresh_id)` for a well-formed refresh token.
    fn verify_refresh_token(&self, token: &str) -> Result<(Uuid, Uuid)> {
        let claims = decrypt_claims(token, &self.refresh_key)?
            .filter(|claims| has_token_type(claims, TokenType::Refresh))
            .ok_or_else(|| anyhow!("invalid refresh token"))?;
        let user_id = claim_uuid(&claims, "sub")?;
        let refresh_id = claim_uuid(&claims, "jti")?;
        Ok((user_id, refresh_id))
    }
}

struct IssuedTokens {
    refresh_id: Uuid,
    pair: TokenPair,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

fn build_claims(
    user_id: Uuid,
    token_type: TokenType,
    ttl: Duration,
    token_id: Option<Uuid>,
) -> Result<Claims> {
    let ttl = std::time::Duration::try_from(ttl)
        .map_err(|err| anyhow!("invalid token ttl: {}", err))?;
    let mut claims = Claims::new_expires_in(&ttl)?;
    claims.issuer(TOKEN_ISSUER)?;
    claims.audience(TOKEN_ISSUER)?;
    claims.subject(&user_id.to_string())?;
    if let Some(token_id) = token_id {
        claims.token_identifier(&token_id.to_string())?;
    }
    claims.add_additional("typ", token_type.as_str())?;
    Ok(claims)
}

fn encrypt_claims(claims: &Claims, key_bytes: &[u8; 32]) -> Result<String> {
    let key = SymmetricKey::<V4>::from(key_bytes)?;
    Ok(local::encrypt(&key, claims, None, None)?)
}

/// `Ok(None)` for anything that is not a valid token for this key.
fn decrypt_claims(token: &str, key_bytes: &[u8; 32]) -> Result<Option<Claims>> {
    let key = SymmetricKey::<V4>::from(key_bytes)?;
    let mut rules = ClaimsValidationRules::new();
    rules.validate_issuer_with(TOKEN_ISSUER);
    rules.validate_audience_with(TOKEN_ISSUER);

    let Ok(untrusted) = UntrustedToken::<Local, V4>::try_from(token) else {
        return Ok(None);
    };
    let Ok(trusted) = local::decrypt(&key, &untrusted, &rules, None, None) else {
        return Ok(None);
    };
    Ok(trusted.payload_claims().cloned())
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("failed to hash password: {}", err))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|err| anyhow!("failed to parse password hash: {}", err))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn claim_uuid(claims: &Claims, name: &str) -> Result<Uuid> {
    let value = claims
        .get_claim(name)
        .and_then(|value| value.as_str())
        .ok_or_else(|| anyhow!("missing {} claim", name))?;
    Ok(Uuid::parse_str(value)?)
}

fn has_token_type(claims: &Claims, expected: TokenType) -> bool {
    claims
        .get_claim("typ")
        .and_then(|value| value.as_str())
        .is_some_and(|value| value == expected.as_str())
}
