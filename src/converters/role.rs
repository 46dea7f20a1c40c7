#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
    System,
    Function,
}

impl Role {
    /// Roles travel as free strings on the wire; anything else is rejected later.
    pub fn parse(role: &str) -> Option<Role> {
        match role {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            "system" => Some(Role::System),
            "function" => Some(Role::Function),
            _ => None,
        }
    }
}
