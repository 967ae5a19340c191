use std::path::{Component, Path, PathBuf};

use crate::sync::message::MessageType;

/// Media subdirectories created for every member.
pub const MEDIA_DIRS: &[&str] = &["picture", "video", "voice"];

/// Make a group or member name safe to use as a single path component:
/// spaces and `/` become `_`, surrounding whitespace is trimmed.
pub fn sanitize_name(name: &str) -> String {
    name.replace([' ', '/'], "_").trim().to_string()
}

/// `{output}/{group_id}_{group_name}`
pub fn group_dir(output_dir: &Path, group_id: i64, group_name: &str) -> PathBuf {
    output_dir.join(format!("{}_{}", group_id, sanitize_name(group_name)))
}

/// `{output}/{group_id}_{group_name}/{member_id}_{member_name}`
pub fn member_dir(
    output_dir: &Path,
    group_id: i64,
    group_name: &str,
    member_id: i64,
    member_name: &str,
) -> PathBuf {
    group_dir(output_dir, group_id, group_name)
        .join(format!("{}_{}", member_id, sanitize_name(member_name)))
}

/// `{member_dir}/{kind_dir}/{message_id}.{ext}`
pub fn media_path(member_dir: &Path, kind: MessageType, message_id: i64, extension: &str) -> PathBuf {
    member_dir
        .join(kind.media_dir())
        .join(format!("{}.{}", message_id, extension))
}

/// Render `path` relative to `output_dir` with `/` separators, as stored in
/// `messages.json`. Returns `None` when `path` is not inside `output_dir`.
pub fn relative_media_path(output_dir: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(output_dir).ok()?;
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

/// Temporary path a download streams into before being renamed into place.
pub fn part_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    destination.with_file_name(name)
}
