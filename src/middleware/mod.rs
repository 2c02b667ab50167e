pub mod response;
pub mod session;
pub mod tenant;

pub use response::{ApiResponse, ApiResult};
pub use session::{AuthUser, CurrentUser, SessionResolver, SessionUser};
pub use tenant::{TenantScope, DOMAIN_HEADER};
