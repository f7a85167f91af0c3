use std::path::{Component, Path, PathBuf};

/// Renders a path for messages: canonical when the path exists, otherwise
/// made absolute and lexically normalized so that missing roots still read
/// as full paths.
pub fn best_effort_path_display(path: &Path) -> String {
    if let Ok(canonical) = path.canonicalize() {
        return canonical.display().to_string();
    }

    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    normalize_path(&absolute).display().to_string()
}

fn normalize_path(path: &Path) -> PathBuf {
    path.components()
        .fold(Vec::new(), |mut kept: Vec<Component>, component| {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    if matches!(kept.last(), Some(Component::Normal(_))) {
                        kept.pop();
                    }
                }
                other => kept.push(other),
            }
            kept
        })
        .iter()
        .collect()
}

pub trait BestEffortPathExt {
    fn best_effort_path_display(&self) -> String;
}

impl<P: AsRef<Path> + ?Sized> BestEffortPathExt for P {
    fn best_effort_path_display(&self) -> String {
        best_effort_path_display(self.as_ref())
    }
}
