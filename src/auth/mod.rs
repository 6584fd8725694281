pub mod claims;
pub mod jwt;
pub mod middleware;
pub mod utils;

pub use claims::{Claims, Role};
pub use jwt::JwtService;
pub use middleware::{AuthMiddleware, AuthenticatedUser};
pub use utils::{extract_claims_from_context, require_admin, require_role};
