/// Router Module Index
///
/// Splits the `/api/v1` surface by who may call it. Authentication is applied at the
/// router level in `create_router`; role checks live in the services, so a route placed
/// in the wrong module still cannot leak an admin operation.

/// Routes open to anonymous clients: health, registration and login.
pub mod public;

/// Routes behind the session-token middleware, available to every role.
pub mod authenticated;

/// Routes behind the same middleware whose handlers only succeed for admins.
pub mod admin;
