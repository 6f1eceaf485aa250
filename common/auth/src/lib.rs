pub mod claims;
pub mod config;
pub mod error;
pub mod extractors;
pub mod guards;
pub mod roles;
pub mod verifier;

pub use claims::{Claims, IdentityClaim};
pub use config::JwtConfig;
pub use error::{AuthError, AuthResult};
pub use extractors::AuthContext;
pub use guards::{ensure_owner, ensure_role, GuardError};
pub use roles::ROLE_ADMIN;
pub use verifier::JwtVerifier;
