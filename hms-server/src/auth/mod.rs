//! Authentication primitives: tokens, password hashes and the RBAC catalog

pub mod jwt;
pub mod password;
pub mod permissions;

pub use jwt::{Claims, IssuedToken, JwtService, TokenError};
pub use password::{hash_password, verify_password};

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Render a permission list the way the 403 body has always shown it: `['a', 'b']`
pub fn format_permission_list(perms: &[String]) -> String {
    let quoted: Vec<String> = perms.iter().map(|p| format!("'{}'", p)).collect();
    format!("[{}]", quoted.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_list_format() {
        assert_eq!(format_permission_list(&[]), "[]");
        assert_eq!(
            format_permission_list(&["task:create".into(), "note:read".into()]),
            "['task:create', 'note:read']"
        );
    }
}
