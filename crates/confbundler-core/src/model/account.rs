use serde::Serialize;

/// A named account reference with its numeric id (file owner or group).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Principal {
    pub name: String,
    pub id: u32,
}

impl Principal {
    pub fn new(name: impl Into<String>, id: u32) -> Self {
        Self {
            name: name.into(),
            id,
        }
    }

    pub fn root() -> Self {
        Self::new("root", 0)
    }
}

impl Default for Principal {
    fn default() -> Self {
        Self::root()
    }
}

/// A package that must be installed on the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Package {
    pub name: String,
}

/// A user account that must be present on the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<Principal>,
}
