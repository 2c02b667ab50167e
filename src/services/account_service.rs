use tracing::{info, warn};

use crate::auth::{self, Claims};
use crate::database::DocumentStore;
use crate::models::{AccountRole, LoginUser};

use super::{ServiceError, ServiceResult};

/// Profile plus the claims to sign for it
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: LoginUser,
    pub claims: Claims,
}

/// Check credentials against the role's account collection
pub async fn login(
    store: &dyn DocumentStore,
    role: AccountRole,
    school_code: &str,
    user_code: &str,
    password: &str,
    domain: &str,
    expiry_hours: u64,
) -> ServiceResult<LoginOutcome> {
    let filter = role.lookup_filter(user_code, school_code, domain);
    let Some(account) = store.find_one(role.collection(), &filter).await? else {
        warn!("Login failed for {} {} in school {}: no active account", role.as_str(), user_code, school_code);
        return Err(ServiceError::unauthorized("Invalid credentials"));
    };

    let stored = account.get_str("password").unwrap_or_default();
    if stored.is_empty() || !auth::verify_password(stored, password) {
        warn!("Login failed for {} {} in school {}: bad password", role.as_str(), user_code, school_code);
        return Err(ServiceError::unauthorized("Invalid credentials"));
    }

    let user = LoginUser::from_account(role, &account, domain);
    let claims = claims_for(&user, expiry_hours);
    info!("{} {} logged in to {}", role.as_str(), user.username, user.domain);

    Ok(LoginOutcome { user, claims })
}

pub fn claims_for(user: &LoginUser, expiry_hours: u64) -> Claims {
    let mut claims = Claims::new(
        user.id.clone(),
        user.domain.clone(),
        user.school_code.clone(),
        user.role.clone(),
        user.username.clone(),
        expiry_hours,
    );
    claims.user_type = user.user_type.clone();
    claims.name = (!user.name.is_empty()).then(|| user.name.clone());
    claims.class_codes = user.class_code.iter().map(|c| c.value.clone()).collect();
    claims.groups = user.groups.iter().map(|g| g.value.clone()).collect();
    claims
}
