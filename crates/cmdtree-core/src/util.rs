//! Small helpers shared by command construction and dispatch.

/// A command name is non-empty ASCII alphanumerics, dashes, and underscores.
///
/// Enforced when a command is constructed, never at dispatch time.
pub fn is_valid_command_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Join resolved path segments into a display prefix.
///
/// Carries a trailing space when non-empty so it can sit directly in front
/// of a command name (`"config get"` renders as `"config "` + `"get"`).
pub fn parent_path_string(segments: &[String]) -> String {
    let mut joined = segments.join(" ");
    if !joined.is_empty() {
        joined.push(' ');
    }
    joined
}
