//! One-shot deployment provisioning: the bootstrap organization and its
//! super admin. Safe to run any number of times.

use crate::auth::{hash_password, Role};
use crate::config::BootstrapConfig;
use crate::models::{
    organization::{NewOrganization, Organization},
    user::{NewUser, User},
};
use crate::store::Store;

#[derive(Debug)]
pub struct BootstrapOutcome {
    pub organization: Organization,
    pub organization_created: bool,
    pub admin: User,
    pub admin_created: bool,
}

pub async fn ensure_bootstrap(store: &dyn Store, cfg: &BootstrapConfig) -> anyhow::Result<BootstrapOutcome> {
    let (organization, organization_created) = match store.find_organization_by_slug(&cfg.org_slug).await? {
        Some(org) => (org, false),
        None => {
            let org = store
                .create_organization(NewOrganization {
                    name: cfg.org_name.clone(),
                    slug: cfg.org_slug.clone(),
                    timezone: cfg.org_timezone.clone(),
                })
                .await?;
            tracing::info!(org_id = %org.id, slug = %org.slug, "bootstrap organization created");
            (org, true)
        }
    };

    let (admin, admin_created) = match store.find_user_by_email(&cfg.admin_email).await? {
        Some(user) => {
            if user.org_id != organization.id || user.role != Role::SuperAdmin {
                tracing::warn!(
                    user_id = %user.id,
                    "bootstrap admin e-mail already belongs to a different account, leaving it untouched"
                );
            }
            (user, false)
        }
        None => {
            let user = store
                .create_user(NewUser {
                    org_id: organization.id,
                    email: cfg.admin_email.trim().to_lowercase(),
                    password_hash: hash_password(&cfg.admin_password)?,
                    full_name: cfg.admin_name.clone(),
                    position: Some("Administrator".into()),
                    role: Role::SuperAdmin,
                })
                .await?;
            tracing::info!(user_id = %user.id, "bootstrap super admin created");
            (user, true)
        }
    };

    Ok(BootstrapOutcome {
        organization,
        organization_created,
        admin,
        admin_created,
    })
}
