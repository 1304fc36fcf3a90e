//! `crew init`: write the built-in AutoML pipeline to disk as a starting point.

use std::path::Path;

use crew_core::workflow::builtin::AUTOML_PIPELINE_YAML;

pub fn init(path: &str, force: bool) -> Result<(), String> {
    let path = Path::new(path);
    if path.exists() && !force {
        return Err(format!(
            "'{}' already exists (use --force to overwrite)",
            path.display()
        ));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create '{}': {}", parent.display(), e))?;
    }
    std::fs::write(path, AUTOML_PIPELINE_YAML)
        .map_err(|e| format!("Failed to write '{}': {}", path.display(), e))?;

    println!("📄 Wrote AutoML pipeline to {}", path.display());
    println!("   Validate it with: crew validate {}", path.display());
    Ok(())
}
