use async_graphql::Context;

use crate::{
    auth::{Claims, Role},
    errors::{AppError, AppResult},
};

pub fn require_role(claims: &Claims, allowed: &[Role]) -> AppResult<()> {
    if !allowed.contains(&claims.role) {
        return Err(AppError::Unauthorized(
            "Your role cannot perform this action".to_string(),
        ));
    }
    Ok(())
}

pub fn require_admin(claims: &Claims) -> AppResult<()> {
    if !claims.role.is_admin() {
        return Err(AppError::Unauthorized(
            "Only admins can perform this action".to_string(),
        ));
    }
    Ok(())
}

pub fn extract_claims_from_context(ctx: &Context<'_>) -> AppResult<Claims> {
    ctx.data::<Claims>()
        .cloned()
        .map_err(|_| AppError::Unauthorized("Authentication required".to_string()))
}
