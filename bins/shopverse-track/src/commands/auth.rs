//! Sign-in, sign-out and session status

use crate::context::AppContext;
use crate::output::{format_duration, json_line, Format, Status};
use chrono::Utc;
use serde_json::json;
use shopverse_core::Result;
use tracing::info;

pub async fn login(ctx: &AppContext, email: &str, password: &str, format: Format) -> Result<()> {
    let credential = ctx.auth.sign_in_with_password(email, password).await?;
    let expires_at = credential.expires_at;
    ctx.session.login(credential)?;
    info!(email, "Signed in");

    if format.is_json() {
        json_line(&json!({ "signed_in": true, "email": email, "expires_at": expires_at }));
    } else {
        Status::success(&format!("Signed in as {email}"));
    }
    Ok(())
}

pub async fn logout(ctx: &AppContext, format: Format) -> Result<()> {
    let was_signed_in = ctx.session.is_authenticated();
    ctx.session.logout().await?;

    if format.is_json() {
        json_line(&json!({ "signed_out": was_signed_in }));
    } else if was_signed_in {
        Status::success("Signed out");
    } else {
        Status::info("No session to sign out of");
    }
    Ok(())
}

pub fn status(ctx: &AppContext, format: Format) -> Result<()> {
    let credential = ctx.session.current()?;
    let now = Utc::now();

    if format.is_json() {
        json_line(&json!({
            "config": ctx.config.path,
            "storage_dir": ctx.storage_dir,
            "backend": ctx.client.base_url(),
            "key_fingerprint": ctx.key_fingerprint,
            "signed_in": credential.is_some(),
            "expires_at": credential.as_ref().map(|c| c.expires_at),
            "expired": credential.as_ref().map(|c| c.is_expired(now)),
        }));
        return Ok(());
    }

    Status::header("ShopVerse session");
    Status::field(
        "Config",
        ctx.config
            .path
            .as_ref()
            .map_or_else(|| "defaults".to_string(), |p| p.display().to_string()),
    );
    Status::field("Storage", ctx.storage_dir.display());
    Status::field("Backend", ctx.client.base_url());
    Status::field("Key", &ctx.key_fingerprint);

    match credential {
        Some(c) if c.is_expired(now) => {
            Status::field("Session", "expired, refreshed on next use");
        }
        Some(c) => {
            let left = (c.expires_at - now).to_std().unwrap_or_default();
            Status::field("Session", format!("signed in, expires in {}", format_duration(left)));
        }
        None => Status::field("Session", "signed out"),
    }
    Ok(())
}
