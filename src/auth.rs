use argon2::password_hash::{PasswordHash, SaltString, rand_core::OsRng};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};

use crate::error::WorkflowError;
use crate::model::{Role, Session};

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let phc = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("failed to hash password: {}", e))?
        .to_string();
    Ok(phc)
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        let argon2 = Argon2::default();
        argon2.verify_password(password.as_bytes(), &parsed).is_ok()
    } else {
        false
    }
}

/// The access gate. Side-effect-free: checks that a session exists and that
/// its role belongs to the allowed set for the operation. Every workflow
/// operation calls this before touching a store.
pub fn authorize(session: Option<&Session>, allowed: &[Role]) -> Result<(), WorkflowError> {
    let session = session.ok_or(WorkflowError::Unauthenticated)?;
    if !allowed.contains(&session.role) {
        return Err(WorkflowError::Forbidden {
            actor: session.role,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(role: Role) -> Session {
        Session {
            username: "t".to_string(),
            role,
        }
    }

    #[test]
    fn password_hash_verifies_and_rejects() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password(&hash, "correct horse"));
        assert!(!verify_password(&hash, "battery staple"));
        assert!(!verify_password("not a phc string", "correct horse"));
    }

    #[test]
    fn two_hashes_of_same_password_differ() {
        let a = hash_password("x").unwrap();
        let b = hash_password("x").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn gate_requires_a_session() {
        let err = authorize(None, &[Role::Admin]).unwrap_err();
        assert!(matches!(err, WorkflowError::Unauthenticated));
    }

    #[test]
    fn gate_matches_role_against_allowed_set() {
        let all = [Role::Admin, Role::Editor, Role::Archiver, Role::Viewer];
        let ops: &[&[Role]] = &[
            &[Role::Admin],
            &[Role::Admin, Role::Editor],
            &[Role::Admin, Role::Archiver],
            &[Role::Admin, Role::Editor, Role::Archiver],
            &[Role::Admin, Role::Editor, Role::Archiver, Role::Viewer],
        ];
        for allowed in ops {
            for role in all {
                let result = authorize(Some(&session(role)), allowed);
                if allowed.contains(&role) {
                    assert!(result.is_ok());
                } else {
                    assert!(matches!(result, Err(WorkflowError::Forbidden { .. })));
                }
            }
        }
    }
}
