use serde::{Deserialize, Serialize};

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceUserStatus {
    Pending = 0,
    ReassignmentInProgress = 1,
    Completed = 2,
}

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    Guest = 10,
    Planner = 15,
    Reporter = 20,
    Developer = 30,
    Maintainer = 40,
    Owner = 50,
}

#[derive(Debug)]
pub struct EnumParseError {
    enum_name: &'static str,
    value: String,
}

impl EnumParseError {
    pub(crate) fn new(enum_name: &'static str, value: impl Into<String>) -> Self {
        Self {
            enum_name,
            value: value.into(),
        }
    }
}

impl std::fmt::Display for EnumParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid {} value: {}", self.enum_name, self.value)
    }
}

impl std::error::Error for EnumParseError {}

impl SourceUserStatus {
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::ReassignmentInProgress => "reassignment_in_progress",
            Self::Completed => "completed",
        }
    }
}

impl From<SourceUserStatus> for i32 {
    fn from(value: SourceUserStatus) -> Self {
        value as i32
    }
}

impl TryFrom<i32> for SourceUserStatus {
    type Error = EnumParseError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Pending),
            1 => Ok(Self::ReassignmentInProgress),
            2 => Ok(Self::Completed),
            _ => Err(EnumParseError::new("source_user_status", value.to_string())),
        }
    }
}

impl AccessLevel {
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }
}

impl From<AccessLevel> for i32 {
    fn from(value: AccessLevel) -> Self {
        value as i32
    }
}

impl TryFrom<i32> for AccessLevel {
    type Error = EnumParseError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            10 => Ok(Self::Guest),
            15 => Ok(Self::Planner),
            20 => Ok(Self::Reporter),
            30 => Ok(Self::Developer),
            40 => Ok(Self::Maintainer),
            50 => Ok(Self::Owner),
            _ => Err(EnumParseError::new("access_level", value.to_string())),
        }
    }
}
