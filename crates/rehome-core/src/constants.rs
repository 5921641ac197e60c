pub const DEFAULT_ALIAS_VERSION: i32 = 1;

pub const MEMBER_SOURCE_PROJECT: &str = "Project";
pub const MEMBER_SOURCE_NAMESPACE: &str = "Namespace";
