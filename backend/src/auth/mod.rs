pub mod jwt;
pub mod middleware;
pub mod models;
pub mod password;
pub mod routes;

pub use jwt::{JwtError, JwtService};
pub use middleware::{AuthMiddleware, AuthenticatedUser};
pub use password::PasswordHasher;
